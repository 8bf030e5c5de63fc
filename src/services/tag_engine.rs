//! Auto-tag evaluation (§4.7 step 5, §8 idempotence invariant). Runs the
//! generic matcher (`services::matcher`) against an entity's flattened
//! attribute map for every enabled rule of its `EntityType`, then
//! reconciles the `auto`-sourced `EntityTag` rows: add newly matching
//! rules, remove auto-tags whose rule no longer matches. Manual and api
//! tags are never touched.

use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;

use crate::domain::error::MatchError;
use crate::domain::models::{EntityTag, EntityType, MatchRule, TagSource};
use crate::services::matcher::Rule;

/// Evaluates every enabled rule against `attributes` and reconciles the
/// entity's auto-tags, returning the tags that changed (added + removed).
pub fn reevaluate(
    entity_type: EntityType,
    entity_id: &str,
    attributes: &Value,
    rules: &[MatchRule],
    existing_tags: &[EntityTag],
) -> Result<(Vec<EntityTag>, Vec<Uuid>), MatchError> {
    let matched_rule_ids: HashSet<Uuid> = rules
        .iter()
        .filter(|r| r.enabled && r.entity_type == entity_type)
        .filter_map(|r| {
            let rule: Rule = serde_json::from_value(r.rule_json.clone()).ok()?;
            match rule.evaluate(attributes) {
                Ok(true) => Some(Ok(r.id)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            }
        })
        .collect::<Result<HashSet<_>, MatchError>>()?;

    let current_auto: HashSet<Uuid> = existing_tags
        .iter()
        .filter(|t| t.source == TagSource::Auto)
        .filter_map(|t| t.rule_id)
        .collect();

    let to_add: Vec<EntityTag> = rules
        .iter()
        .filter(|r| matched_rule_ids.contains(&r.id) && !current_auto.contains(&r.id))
        .map(|r| EntityTag::auto(entity_type, entity_id.to_string(), r.tag_id, r.id))
        .collect();

    let to_remove: Vec<Uuid> = existing_tags
        .iter()
        .filter(|t| t.source == TagSource::Auto)
        .filter(|t| t.rule_id.is_some_and(|rid| !matched_rule_ids.contains(&rid)))
        .map(|t| t.tag_id)
        .collect();

    Ok((to_add, to_remove))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(entity_type: EntityType, tag_id: Uuid, rule_json: Value) -> MatchRule {
        MatchRule {
            id: Uuid::new_v4(),
            tag_id,
            entity_type,
            priority: 0,
            rule_json,
            enabled: true,
        }
    }

    #[test]
    fn matching_rule_adds_auto_tag() {
        let tag_id = Uuid::new_v4();
        let r = rule(
            EntityType::Service,
            tag_id,
            json!({"field": "port", "operator": "equals", "value": 22}),
        );
        let attrs = json!({"port": 22});
        let (added, removed) = reevaluate(EntityType::Service, "svc-1", &attrs, &[r], &[]).unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].tag_id, tag_id);
        assert!(removed.is_empty());
    }

    #[test]
    fn reevaluation_is_idempotent() {
        let tag_id = Uuid::new_v4();
        let r = rule(
            EntityType::Service,
            tag_id,
            json!({"field": "port", "operator": "equals", "value": 22}),
        );
        let attrs = json!({"port": 22});
        let (added, _) = reevaluate(EntityType::Service, "svc-1", &attrs, &[r.clone()], &[]).unwrap();
        let existing = added;
        let (added_again, removed_again) =
            reevaluate(EntityType::Service, "svc-1", &attrs, &[r], &existing).unwrap();
        assert!(added_again.is_empty());
        assert!(removed_again.is_empty());
    }

    #[test]
    fn changed_attributes_remove_stale_auto_tag_but_keep_manual() {
        let tag_id = Uuid::new_v4();
        let r = rule(
            EntityType::Service,
            tag_id,
            json!({"field": "port", "operator": "equals", "value": 22}),
        );
        let auto_tag = EntityTag::auto(EntityType::Service, "svc-1", tag_id, r.id);
        let manual_tag = EntityTag::manual(EntityType::Service, "svc-1", Uuid::new_v4());
        let existing = vec![auto_tag, manual_tag.clone()];

        let attrs = json!({"port": 443});
        let (added, removed) = reevaluate(EntityType::Service, "svc-1", &attrs, &[r], &existing).unwrap();
        assert!(added.is_empty());
        assert_eq!(removed, vec![tag_id]);
        assert!(existing.iter().any(|t| t.tag_id == manual_tag.tag_id));
    }
}
