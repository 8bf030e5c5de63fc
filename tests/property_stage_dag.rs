use neoscan::domain::models::{ScanStage, StageDag};
use proptest::prelude::*;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Builds a linear chain of `size` stages, each depending on the previous
/// one — always acyclic by construction.
fn linear_chain(workflow_id: Uuid, size: usize) -> Vec<ScanStage> {
    let mut stages = Vec::with_capacity(size);
    let mut prev: Option<Uuid> = None;
    for _ in 0..size {
        let mut stage = ScanStage::new(workflow_id, "port", Value::Null);
        if let Some(p) = prev {
            stage = stage.with_predecessors(vec![p]);
        }
        prev = Some(stage.id);
        stages.push(stage);
    }
    stages
}

proptest! {
    /// Topological order of an acyclic chain always places every
    /// predecessor strictly before its dependents.
    #[test]
    fn prop_topo_order_respects_predecessors(size in 1usize..30) {
        let workflow_id = Uuid::new_v4();
        let stages = linear_chain(workflow_id, size);
        let by_id: HashMap<Uuid, ScanStage> = stages.iter().map(|s| (s.id, s.clone())).collect();
        let dag = StageDag::build(stages).expect("linear chain is always acyclic");

        let order = dag.topological_order();
        let position: HashMap<Uuid, usize> = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        for (id, stage) in &by_id {
            for pred in &stage.predecessors {
                prop_assert!(position[pred] < position[id]);
            }
        }
    }

    /// Topological order never drops or duplicates a stage id.
    #[test]
    fn prop_topo_order_preserves_all_ids(size in 1usize..30) {
        let workflow_id = Uuid::new_v4();
        let stages = linear_chain(workflow_id, size);
        let input_ids: HashSet<Uuid> = stages.iter().map(|s| s.id).collect();
        let dag = StageDag::build(stages).unwrap();

        let order = dag.topological_order();
        prop_assert_eq!(order.len(), input_ids.len());
        let output_ids: HashSet<Uuid> = order.into_iter().collect();
        prop_assert_eq!(output_ids, input_ids);
    }

    /// A stage graph with a predecessor cycle is always rejected, whatever
    /// the cycle's length.
    #[test]
    fn prop_cycle_of_any_length_is_rejected(size in 2usize..15) {
        let workflow_id = Uuid::new_v4();
        let mut stages: Vec<ScanStage> = (0..size).map(|_| ScanStage::new(workflow_id, "port", Value::Null)).collect();
        for i in 0..size {
            let next = (i + 1) % size;
            let next_id = stages[next].id;
            stages[i].predecessors = vec![next_id];
        }
        prop_assert!(StageDag::build(stages).is_err());
    }
}
