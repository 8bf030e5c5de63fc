//! StageDag: validates a Workflow's stage graph is acyclic and that every
//! predecessor id actually names a stage in the same workflow. Cycle
//! detection is DFS + recursion stack; ordering is Kahn's algorithm over
//! `ScanStage` predecessor lists.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;
use uuid::Uuid;

use super::stage::ScanStage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageDagError {
    #[error("stage {0} lists itself as a predecessor")]
    SelfPredecessor(Uuid),

    #[error("stage {0} names unknown predecessor {1}")]
    UnknownPredecessor(Uuid, Uuid),

    #[error("workflow stage graph contains a cycle")]
    CycleDetected,
}

pub struct StageDag {
    stages: HashMap<Uuid, ScanStage>,
}

impl StageDag {
    /// Validate and build a DAG from a workflow's stages.
    ///
    /// Invariant (spec §3): no stage may list itself as a predecessor, and
    /// the DAG must be acyclic within the workflow.
    pub fn build(stages: Vec<ScanStage>) -> Result<Self, StageDagError> {
        let by_id: HashMap<Uuid, ScanStage> = stages.into_iter().map(|s| (s.id, s)).collect();

        for stage in by_id.values() {
            if stage.predecessors.contains(&stage.id) {
                return Err(StageDagError::SelfPredecessor(stage.id));
            }
            for pred in &stage.predecessors {
                if !by_id.contains_key(pred) {
                    return Err(StageDagError::UnknownPredecessor(stage.id, *pred));
                }
            }
        }

        let dag = Self { stages: by_id };
        if dag.has_cycle() {
            return Err(StageDagError::CycleDetected);
        }
        Ok(dag)
    }

    fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        for id in self.stages.keys() {
            if self.dfs_cycle(*id, &mut visited, &mut rec_stack) {
                return true;
            }
        }
        false
    }

    fn dfs_cycle(&self, id: Uuid, visited: &mut HashSet<Uuid>, rec_stack: &mut HashSet<Uuid>) -> bool {
        if rec_stack.contains(&id) {
            return true;
        }
        if visited.contains(&id) {
            return false;
        }
        visited.insert(id);
        rec_stack.insert(id);
        if let Some(stage) = self.stages.get(&id) {
            for pred in &stage.predecessors {
                if self.dfs_cycle(*pred, visited, rec_stack) {
                    return true;
                }
            }
        }
        rec_stack.remove(&id);
        false
    }

    /// Topologically ordered stage ids, predecessors before dependents.
    pub fn topological_order(&self) -> Vec<Uuid> {
        let mut in_degree: HashMap<Uuid, usize> = HashMap::new();
        let mut dependents: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

        for (id, stage) in &self.stages {
            in_degree.entry(*id).or_insert(0);
            for pred in &stage.predecessors {
                *in_degree.entry(*id).or_insert(0) += 1;
                dependents.entry(*pred).or_default().push(*id);
            }
        }

        let mut queue: VecDeque<Uuid> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::new();

        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(deps) = dependents.get(&id) {
                for &dep in deps {
                    let degree = in_degree.get_mut(&dep).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dep);
                    }
                }
            }
        }
        order
    }

    pub fn stage(&self, id: Uuid) -> Option<&ScanStage> {
        self.stages.get(&id)
    }

    pub fn stages(&self) -> impl Iterator<Item = &ScanStage> {
        self.stages.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn stage(workflow_id: Uuid) -> ScanStage {
        ScanStage::new(workflow_id, "port", Value::Null)
    }

    #[test]
    fn rejects_self_predecessor() {
        let wf = Uuid::new_v4();
        let mut s = stage(wf);
        s.predecessors = vec![s.id];
        let err = StageDag::build(vec![s]).unwrap_err();
        assert!(matches!(err, StageDagError::SelfPredecessor(_)));
    }

    #[test]
    fn rejects_unknown_predecessor() {
        let wf = Uuid::new_v4();
        let mut s = stage(wf);
        s.predecessors = vec![Uuid::new_v4()];
        let err = StageDag::build(vec![s]).unwrap_err();
        assert!(matches!(err, StageDagError::UnknownPredecessor(_, _)));
    }

    #[test]
    fn rejects_cycle() {
        let wf = Uuid::new_v4();
        let mut a = stage(wf);
        let mut b = stage(wf);
        a.predecessors = vec![b.id];
        b.predecessors = vec![a.id];
        let err = StageDag::build(vec![a, b]).unwrap_err();
        assert_eq!(err, StageDagError::CycleDetected);
    }

    #[test]
    fn topological_order_respects_predecessors() {
        let wf = Uuid::new_v4();
        let a = stage(wf);
        let mut b = stage(wf);
        b.predecessors = vec![a.id];
        let a_id = a.id;
        let b_id = b.id;
        let dag = StageDag::build(vec![a, b]).unwrap();
        let order = dag.topological_order();
        let pos_a = order.iter().position(|&x| x == a_id).unwrap();
        let pos_b = order.iter().position(|&x| x == b_id).unwrap();
        assert!(pos_a < pos_b);
    }
}
