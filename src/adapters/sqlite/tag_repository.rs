//! SQLite implementation of `TagRepository` (Tag / MatchRule / EntityTag).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EntityTag, EntityType, MatchRule, Tag, TagSource};
use crate::domain::ports::TagRepository;

#[derive(sqlx::FromRow)]
struct TagRow {
    id: String,
    name: String,
    parent_id: Option<String>,
    path: String,
    level: i64,
}

impl TryFrom<TagRow> for Tag {
    type Error = anyhow::Error;

    fn try_from(row: TagRow) -> Result<Self, Self::Error> {
        Ok(Tag {
            id: Uuid::parse_str(&row.id)?,
            name: row.name,
            parent_id: row.parent_id.map(|p| Uuid::parse_str(&p)).transpose()?,
            path: row.path,
            level: row.level as u32,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MatchRuleRow {
    id: String,
    tag_id: String,
    entity_type: String,
    priority: i64,
    rule_json: String,
    enabled: bool,
}

impl TryFrom<MatchRuleRow> for MatchRule {
    type Error = anyhow::Error;

    fn try_from(row: MatchRuleRow) -> Result<Self, Self::Error> {
        Ok(MatchRule {
            id: Uuid::parse_str(&row.id)?,
            tag_id: Uuid::parse_str(&row.tag_id)?,
            entity_type: EntityType::parse_str(&row.entity_type).ok_or_else(|| anyhow::anyhow!("bad entity_type"))?,
            priority: row.priority as i32,
            rule_json: serde_json::from_str::<Value>(&row.rule_json)?,
            enabled: row.enabled,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EntityTagRow {
    entity_type: String,
    entity_id: String,
    tag_id: String,
    source: String,
    rule_id: Option<String>,
}

impl TryFrom<EntityTagRow> for EntityTag {
    type Error = anyhow::Error;

    fn try_from(row: EntityTagRow) -> Result<Self, Self::Error> {
        Ok(EntityTag {
            entity_type: EntityType::parse_str(&row.entity_type).ok_or_else(|| anyhow::anyhow!("bad entity_type"))?,
            entity_id: row.entity_id,
            tag_id: Uuid::parse_str(&row.tag_id)?,
            source: match row.source.as_str() {
                "auto" => TagSource::Auto,
                "api" => TagSource::Api,
                _ => TagSource::Manual,
            },
            rule_id: row.rule_id.map(|r| Uuid::parse_str(&r)).transpose()?,
        })
    }
}

fn tag_source_str(source: TagSource) -> &'static str {
    match source {
        TagSource::Manual => "manual",
        TagSource::Auto => "auto",
        TagSource::Api => "api",
    }
}

pub struct SqliteTagRepository {
    pool: SqlitePool,
}

impl SqliteTagRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for SqliteTagRepository {
    async fn create_tag(&self, tag: &Tag) -> DomainResult<()> {
        sqlx::query("INSERT INTO tags (id, name, parent_id, path, level) VALUES (?, ?, ?, ?, ?)")
            .bind(tag.id.to_string())
            .bind(&tag.name)
            .bind(tag.parent_id.map(|p| p.to_string()))
            .bind(&tag.path)
            .bind(tag.level as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_tag(&self, id: Uuid) -> DomainResult<Option<Tag>> {
        let row: Option<TagRow> = sqlx::query_as("SELECT * FROM tags WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Tag::try_from(r).map_err(|e| DomainError::ValidationFailed(e.to_string()))).transpose()
    }

    async fn list_tags(&self) -> DomainResult<Vec<Tag>> {
        let rows: Vec<TagRow> = sqlx::query_as("SELECT * FROM tags").fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| Tag::try_from(r).map_err(|e| DomainError::ValidationFailed(e.to_string()))).collect()
    }

    async fn create_rule(&self, rule: &MatchRule) -> DomainResult<()> {
        let rule_json = serde_json::to_string(&rule.rule_json)?;
        sqlx::query(
            "INSERT INTO match_rules (id, tag_id, entity_type, priority, rule_json, enabled) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(rule.id.to_string())
        .bind(rule.tag_id.to_string())
        .bind(rule.entity_type.as_str())
        .bind(rule.priority as i64)
        .bind(&rule_json)
        .bind(rule.enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_rules_for(&self, entity_type: EntityType) -> DomainResult<Vec<MatchRule>> {
        let rows: Vec<MatchRuleRow> = sqlx::query_as("SELECT * FROM match_rules WHERE entity_type = ? AND enabled = 1")
            .bind(entity_type.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| MatchRule::try_from(r).map_err(|e| DomainError::ValidationFailed(e.to_string())))
            .collect()
    }

    async fn link(&self, entity_tag: &EntityTag) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO entity_tags (entity_type, entity_id, tag_id, source, rule_id)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(entity_type, entity_id, tag_id) DO UPDATE SET
                 source = excluded.source, rule_id = excluded.rule_id"#,
        )
        .bind(entity_tag.entity_type.as_str())
        .bind(&entity_tag.entity_id)
        .bind(entity_tag.tag_id.to_string())
        .bind(tag_source_str(entity_tag.source))
        .bind(entity_tag.rule_id.map(|r| r.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unlink(&self, entity_type: EntityType, entity_id: &str, tag_id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM entity_tags WHERE entity_type = ? AND entity_id = ? AND tag_id = ?")
            .bind(entity_type.as_str())
            .bind(entity_id)
            .bind(tag_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_for_entity(&self, entity_type: EntityType, entity_id: &str) -> DomainResult<Vec<EntityTag>> {
        let rows: Vec<EntityTagRow> =
            sqlx::query_as("SELECT * FROM entity_tags WHERE entity_type = ? AND entity_id = ?")
                .bind(entity_type.as_str())
                .bind(entity_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|r| EntityTag::try_from(r).map_err(|e| DomainError::ValidationFailed(e.to_string())))
            .collect()
    }
}
