use neoscan::domain::models::{EntityType, MatchRule};
use neoscan::services::tag_engine::reevaluate;
use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

fn port_rule(tag_id: Uuid, port: i64) -> MatchRule {
    MatchRule {
        id: Uuid::new_v4(),
        tag_id,
        entity_type: EntityType::Service,
        priority: 0,
        rule_json: json!({"field": "port", "operator": "equals", "value": port}),
        enabled: true,
    }
}

proptest! {
    /// Re-running `reevaluate` against its own previous output (as the new
    /// `existing_tags`) for an unchanged document always yields no further
    /// additions or removals — auto-tagging is idempotent.
    #[test]
    fn prop_reevaluate_is_idempotent(rule_port in 1i64..65535, doc_port in 1i64..65535) {
        let tag_id = Uuid::new_v4();
        let rules = vec![port_rule(tag_id, rule_port)];
        let doc = json!({"port": doc_port});

        let (added, removed) = reevaluate(EntityType::Service, "svc", &doc, &rules, &[]).unwrap();
        prop_assert!(removed.is_empty());

        let (added_again, removed_again) =
            reevaluate(EntityType::Service, "svc", &doc, &rules, &added).unwrap();
        prop_assert!(added_again.is_empty());
        prop_assert!(removed_again.is_empty());
    }

    /// A rule that matches the document always appears in `added` exactly
    /// once when starting from no existing tags, whether or not other
    /// non-matching rules are present.
    #[test]
    fn prop_matching_rule_always_added_once(
        rule_port in 1i64..65535,
        other_ports in proptest::collection::vec(1i64..65535, 0..5),
    ) {
        let tag_id = Uuid::new_v4();
        let doc = json!({"port": rule_port});

        let mut rules = vec![port_rule(tag_id, rule_port)];
        for p in other_ports {
            if p != rule_port {
                rules.push(port_rule(Uuid::new_v4(), p));
            }
        }

        let (added, removed) = reevaluate(EntityType::Service, "svc", &doc, &rules, &[]).unwrap();
        prop_assert!(removed.is_empty());
        prop_assert_eq!(added.iter().filter(|t| t.tag_id == tag_id).count(), 1);
    }
}
