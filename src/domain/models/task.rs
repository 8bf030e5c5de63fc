//! Task: the unifying domain object executed by a Runner on an Agent.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The concrete scan type a Task requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Alive,
    Port,
    Service,
    Os,
    Brute,
    Web,
    Vuln,
    Proxy,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Port => "port",
            Self::Service => "service",
            Self::Os => "os",
            Self::Brute => "brute",
            Self::Web => "web",
            Self::Vuln => "vuln",
            Self::Proxy => "proxy",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "alive" => Some(Self::Alive),
            "port" => Some(Self::Port),
            "service" => Some(Self::Service),
            "os" => Some(Self::Os),
            "brute" => Some(Self::Brute),
            "web" => Some(Self::Web),
            "vuln" => Some(Self::Vuln),
            "proxy" => Some(Self::Proxy),
            _ => None,
        }
    }
}

/// A single unit of scan work. Immutable after dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub target: String,
    pub port_range: Option<String>,
    pub params: HashMap<String, Value>,
    pub timeout: std::time::Duration,
    pub priority: u8,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(task_type: TaskType, target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type,
            target: target.into(),
            port_range: None,
            params: HashMap::new(),
            timeout: std::time::Duration::from_secs(30),
            priority: 5,
            created_at: Utc::now(),
        }
    }

    pub fn with_port_range(mut self, range: impl Into<String>) -> Self {
        self.port_range = Some(range.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn param_bool(&self, key: &str, default: bool) -> bool {
        self.params.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_roundtrips_through_string() {
        for t in [
            TaskType::Alive,
            TaskType::Port,
            TaskType::Service,
            TaskType::Os,
            TaskType::Brute,
            TaskType::Web,
            TaskType::Vuln,
            TaskType::Proxy,
        ] {
            assert_eq!(TaskType::parse_str(t.as_str()), Some(t));
        }
    }

    #[test]
    fn unknown_task_type_is_none() {
        assert_eq!(TaskType::parse_str("nope"), None);
    }

    #[test]
    fn param_accessors() {
        let t = Task::new(TaskType::Port, "10.0.0.1").with_param("service_detect", Value::Bool(true));
        assert!(t.param_bool("service_detect", false));
        assert!(!t.param_bool("missing", false));
    }
}
