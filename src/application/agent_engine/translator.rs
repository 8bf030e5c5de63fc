//! TaskTranslator: pure mapping from the wire `WireTask` the Master
//! hands out to the domain `Task` a `Runner` actually executes.

use std::time::Duration;

use serde_json::Value;

use crate::domain::models::{Task, TaskType};
use crate::domain::ports::WireTask;

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("input_target must be a string, got: {0}")]
    InvalidTarget(Value),
}

pub struct TaskTranslator;

impl TaskTranslator {
    /// Translates one `WireTask` into a domain `Task`. The domain `Task`
    /// keeps the same `task_id` as the wire task so status reports can
    /// reference it without a side-table.
    pub fn translate(wire: WireTask) -> Result<Task, TranslateError> {
        let task_type = TaskType::parse_str(&wire.task_type)
            .ok_or_else(|| TranslateError::UnknownTaskType(wire.task_type.clone()))?;

        let target = wire
            .input_target
            .as_str()
            .ok_or_else(|| TranslateError::InvalidTarget(wire.input_target.clone()))?
            .to_string();

        let mut task = Task::new(task_type, target);
        task.id = wire.task_id;
        task.timeout = Duration::from_secs(wire.timeout_secs);

        if let Value::Object(map) = wire.tool_params {
            if let Some(Value::String(range)) = map.get("port_range") {
                task.port_range = Some(range.clone());
            }
            for (k, v) in map {
                task.params.insert(k, v);
            }
        }

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn wire(task_type: &str, target: Value) -> WireTask {
        WireTask {
            task_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            task_type: task_type.to_string(),
            tool_name: task_type.to_string(),
            tool_params: Value::Object(Default::default()),
            input_target: target,
            timeout_secs: 30,
        }
    }

    #[test]
    fn translates_valid_wire_task() {
        let w = wire("alive", Value::String("10.0.0.1".into()));
        let task_id = w.task_id;
        let task = TaskTranslator::translate(w).unwrap();
        assert_eq!(task.id, task_id);
        assert_eq!(task.task_type, TaskType::Alive);
        assert_eq!(task.target, "10.0.0.1");
    }

    #[test]
    fn rejects_unknown_task_type() {
        let w = wire("teleport", Value::String("10.0.0.1".into()));
        assert!(matches!(TaskTranslator::translate(w), Err(TranslateError::UnknownTaskType(_))));
    }

    #[test]
    fn rejects_non_string_target() {
        let w = wire("alive", Value::Number(1.into()));
        assert!(matches!(TaskTranslator::translate(w), Err(TranslateError::InvalidTarget(_))));
    }

    #[test]
    fn carries_port_range_out_of_tool_params() {
        let mut w = wire("port", Value::String("10.0.0.1".into()));
        w.tool_params = serde_json::json!({"port_range": "22,80,443"});
        let task = TaskTranslator::translate(w).unwrap();
        assert_eq!(task.port_range.as_deref(), Some("22,80,443"));
    }
}
