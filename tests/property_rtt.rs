use neoscan::application::rtt::RttEstimator;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    /// Whatever sequence of sampled latencies (in microseconds, to avoid
    /// absurdly long wall-clock durations) it sees, the estimator's timeout
    /// always stays within `[100ms, 10s]`.
    #[test]
    fn prop_timeout_always_clamped(samples in proptest::collection::vec(1u64..20_000_000, 0..50)) {
        let mut est = RttEstimator::new();
        prop_assert!(est.timeout() >= Duration::from_millis(100));
        for micros in samples {
            est.update(Duration::from_micros(micros));
            let timeout = est.timeout();
            prop_assert!(timeout >= Duration::from_millis(100));
            prop_assert!(timeout <= Duration::from_secs(10));
        }
    }

    /// A constant stream of identical samples converges the smoothed RTT
    /// to that sample value, driving the timeout down towards (but never
    /// below) the floor implied by the sample plus its vanishing variance.
    #[test]
    fn prop_constant_samples_stabilize_timeout(micros in 1_000u64..5_000_000) {
        let mut est = RttEstimator::new();
        let sample = Duration::from_micros(micros);
        for _ in 0..200 {
            est.update(sample);
        }
        let late = est.timeout();
        est.update(sample);
        let later = est.timeout();
        let delta = if late > later { late - later } else { later - late };
        prop_assert!(delta <= Duration::from_micros(10));
    }
}
