//! Adaptive concurrency limiter (AIMD) for network-bound probes.
//!
//! Wraps a `tokio::sync::Semaphore` sized to `current_limit` with a
//! `Mutex`-guarded bookkeeping struct for the streak/debt counters,
//! following the same shared-mutable-state shape the resource monitor
//! uses for its cached status (`Arc<RwLock<...>>` there, `Arc<Mutex<...>>`
//! here since every access mutates).

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DECREASE_FACTOR: f64 = 0.7;

#[derive(Debug, Clone)]
struct LimiterState {
    current_limit: u32,
    min: u32,
    max: u32,
    streak: u32,
    reduction_debt: u32,
}

/// AIMD concurrency governor. `acquire` blocks until a token is free or
/// the given `CancellationToken` fires; `OnSuccess`/`OnFailure` adjust
/// `current_limit` between `min` and `max`.
pub struct AdaptiveLimiter {
    semaphore: Arc<Semaphore>,
    state: Mutex<LimiterState>,
}

/// A token borrowed from the limiter. Dropping it without calling
/// `release` would leak capacity, so release is explicit and required —
/// callers pair every successful `acquire` with exactly one `release`.
pub struct LimiterPermit<'a> {
    permit: Option<SemaphorePermit<'a>>,
}

impl AdaptiveLimiter {
    pub fn new(initial: u32, min: u32, max: u32) -> Self {
        assert!(min <= initial && initial <= max, "initial must be within [min, max]");
        Self {
            semaphore: Arc::new(Semaphore::new(initial as usize)),
            state: Mutex::new(LimiterState {
                current_limit: initial,
                min,
                max,
                streak: 0,
                reduction_debt: 0,
            }),
        }
    }

    pub async fn current_limit(&self) -> u32 {
        self.state.lock().await.current_limit
    }

    pub async fn reduction_debt(&self) -> u32 {
        self.state.lock().await.reduction_debt
    }

    /// Acquires a token, or returns `None` if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<LimiterPermit<'_>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.semaphore.acquire() => {
                let permit = permit.expect("semaphore never closed");
                Some(LimiterPermit { permit: Some(permit) })
            }
        }
    }

    /// Releases a previously acquired token. If `reduction_debt > 0`, the
    /// token is destroyed instead of returned to the pool and debt is
    /// decremented — this is how a downsize drains outstanding tokens
    /// without ever going negative on the semaphore.
    pub async fn release(&self, mut permit: LimiterPermit<'_>) {
        let mut state = self.state.lock().await;
        if state.reduction_debt > 0 {
            state.reduction_debt -= 1;
            if let Some(p) = permit.permit.take() {
                p.forget();
            }
            debug!(remaining_debt = state.reduction_debt, "destroyed token to pay down reduction debt");
        }
        // else: permit drops here, returning the token to the pool.
    }

    /// Records a successful probe. Every `current_limit` consecutive
    /// successes raises the limit by one additive step, capped at `max`.
    pub async fn on_success(&self) {
        let mut state = self.state.lock().await;
        state.streak += 1;
        if state.streak >= state.current_limit {
            state.streak = 0;
            if state.current_limit < state.max {
                state.current_limit += 1;
                self.semaphore.add_permits(1);
                debug!(new_limit = state.current_limit, "AIMD additive increase");
            }
        }
    }

    /// Records a failed probe. Multiplicatively shrinks the limit by
    /// `DECREASE_FACTOR`, draining as many tokens as are non-blockingly
    /// available and carrying any shortfall as `reduction_debt` to be
    /// paid down by future releases.
    pub async fn on_failure(&self) {
        let mut state = self.state.lock().await;
        state.streak = 0;
        let new_limit = state.min.max((f64::from(state.current_limit) * DECREASE_FACTOR).floor() as u32);
        let reduction = state.current_limit.saturating_sub(new_limit);
        state.current_limit = new_limit;

        let mut drained = 0;
        for _ in 0..reduction {
            match self.semaphore.try_acquire() {
                Ok(permit) => {
                    permit.forget();
                    drained += 1;
                }
                Err(_) => break,
            }
        }
        let shortfall = reduction - drained;
        state.reduction_debt += shortfall;
        warn!(
            new_limit,
            drained, shortfall, "AIMD multiplicative decrease"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn additive_increase_after_streak() {
        let limiter = AdaptiveLimiter::new(10, 1, 20);
        for _ in 0..10 {
            limiter.on_success().await;
        }
        assert_eq!(limiter.current_limit().await, 11);
        for _ in 0..11 {
            limiter.on_success().await;
        }
        assert_eq!(limiter.current_limit().await, 12);
    }

    #[tokio::test]
    async fn multiplicative_decrease_with_debt() {
        let limiter = AdaptiveLimiter::new(5, 1, 100);
        let cancel = CancellationToken::new();
        let mut permits = Vec::new();
        for _ in 0..5 {
            permits.push(limiter.acquire(&cancel).await.expect("token available"));
        }

        limiter.on_failure().await;
        assert_eq!(limiter.current_limit().await, 3);
        assert_eq!(limiter.reduction_debt().await, 2);

        limiter.release(permits.pop().unwrap()).await;
        assert_eq!(limiter.reduction_debt().await, 1);
        assert_eq!(limiter.semaphore.available_permits(), 0);

        limiter.release(permits.pop().unwrap()).await;
        assert_eq!(limiter.reduction_debt().await, 0);
        assert_eq!(limiter.semaphore.available_permits(), 0);

        limiter.release(permits.pop().unwrap()).await;
        assert_eq!(limiter.reduction_debt().await, 0);
        assert_eq!(limiter.semaphore.available_permits(), 1);
    }

    #[tokio::test]
    async fn acquire_respects_cancellation() {
        let limiter = AdaptiveLimiter::new(0, 0, 1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(limiter.acquire(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn limit_never_drops_below_min() {
        let limiter = AdaptiveLimiter::new(1, 1, 10);
        limiter.on_failure().await;
        assert_eq!(limiter.current_limit().await, 1);
    }
}
