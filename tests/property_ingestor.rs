use chrono::Utc;
use neoscan::domain::error::IngestError;
use neoscan::domain::models::StageResult;
use neoscan::services::ingestor::ResultQueue;
use proptest::prelude::*;
use uuid::Uuid;

fn sample_result() -> StageResult {
    StageResult {
        task_id: Uuid::new_v4(),
        agent_id: "agent-1".to_string(),
        result_type: "port_service".to_string(),
        target_value: "10.0.0.1".to_string(),
        attributes: serde_json::json!({}),
        evidence: serde_json::json!({"raw": "banner"}),
        produced_at: Utc::now(),
    }
}

proptest! {
    /// Pushing exactly `capacity` results always succeeds; every push past
    /// that point is rejected with `Busy` until a `pop` frees a slot.
    #[test]
    fn prop_queue_rejects_past_capacity_and_recovers_after_pop(
        capacity in 1usize..20,
        overflow in 1usize..10,
    ) {
        let queue = ResultQueue::new(capacity);

        for _ in 0..capacity {
            prop_assert!(queue.push(sample_result()).is_ok());
        }
        for _ in 0..overflow {
            prop_assert!(matches!(queue.push(sample_result()), Err(IngestError::Busy)));
        }

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            for _ in 0..overflow {
                prop_assert!(queue.pop().await.is_some());
                prop_assert!(queue.push(sample_result()).is_ok());
            }
            Ok(())
        })?;
    }

    /// However many results are pushed (bounded by capacity) and then
    /// popped, every pop yields a result and the queue never yields more
    /// pops than pushes.
    #[test]
    fn prop_pop_count_never_exceeds_push_count(capacity in 1usize..20, pushes in 0usize..20) {
        let queue = ResultQueue::new(capacity);
        let accepted = (0..pushes).filter(|_| queue.push(sample_result()).is_ok()).count();
        prop_assert!(accepted <= capacity);

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            for _ in 0..accepted {
                prop_assert!(queue.pop().await.is_some());
            }
            Ok(())
        })?;
    }
}
