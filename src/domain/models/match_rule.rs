//! MatchRule: binds a boolean rule tree (see `services::matcher::Rule`) to a
//! Tag for a given entity type, with a priority and enabled flag.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Agent,
    Service,
    Host,
    Web,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Service => "service",
            Self::Host => "host",
            Self::Web => "web",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "agent" => Some(Self::Agent),
            "service" => Some(Self::Service),
            "host" => Some(Self::Host),
            "web" => Some(Self::Web),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRule {
    pub id: Uuid,
    pub tag_id: Uuid,
    pub entity_type: EntityType,
    pub priority: i32,
    /// Serialized `services::matcher::Rule`.
    pub rule_json: Value,
    pub enabled: bool,
}
