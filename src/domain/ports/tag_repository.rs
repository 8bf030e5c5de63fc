//! Tag / MatchRule / EntityTag repository ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EntityTag, EntityType, MatchRule, Tag};

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create_tag(&self, tag: &Tag) -> DomainResult<()>;
    async fn get_tag(&self, id: Uuid) -> DomainResult<Option<Tag>>;
    async fn list_tags(&self) -> DomainResult<Vec<Tag>>;

    async fn create_rule(&self, rule: &MatchRule) -> DomainResult<()>;
    async fn list_rules_for(&self, entity_type: EntityType) -> DomainResult<Vec<MatchRule>>;

    async fn link(&self, entity_tag: &EntityTag) -> DomainResult<()>;
    async fn unlink(&self, entity_type: EntityType, entity_id: &str, tag_id: Uuid) -> DomainResult<()>;
    async fn list_for_entity(&self, entity_type: EntityType, entity_id: &str) -> DomainResult<Vec<EntityTag>>;
}
