//! EntityTag: links a Tag to an arbitrary entity, tracking provenance so
//! auto-tag reevaluation can remove stale auto-tags without touching
//! manually-applied ones.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::match_rule::EntityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSource {
    Manual,
    Auto,
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTag {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub tag_id: Uuid,
    pub source: TagSource,
    pub rule_id: Option<Uuid>,
}

impl EntityTag {
    pub fn manual(entity_type: EntityType, entity_id: impl Into<String>, tag_id: Uuid) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            tag_id,
            source: TagSource::Manual,
            rule_id: None,
        }
    }

    pub fn auto(entity_type: EntityType, entity_id: impl Into<String>, tag_id: Uuid, rule_id: Uuid) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            tag_id,
            source: TagSource::Auto,
            rule_id: Some(rule_id),
        }
    }
}
