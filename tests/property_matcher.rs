use neoscan::services::matcher::{Leaf, Operator, Rule};
use proptest::prelude::*;
use serde_json::json;

fn port_leaf(value: i64) -> Rule {
    Rule::Leaf(Leaf {
        field: "port".to_string(),
        operator: Operator::Equals,
        value: json!(value),
        ignore_case: false,
    })
}

proptest! {
    /// `Not { not: r }` always evaluates to the opposite of `r`, for any
    /// leaf predicate over an integer equality check.
    #[test]
    fn prop_not_is_boolean_negation(doc_port in 0i64..100, rule_port in 0i64..100) {
        let doc = json!({"port": doc_port});
        let leaf = port_leaf(rule_port);
        let negated = Rule::Not { not: Box::new(leaf.clone()) };

        let direct = leaf.evaluate(&doc).unwrap();
        let via_not = negated.evaluate(&doc).unwrap();
        prop_assert_eq!(direct, !via_not);
    }

    /// `And` over a set of equality leaves is true exactly when every
    /// individual leaf matches.
    #[test]
    fn prop_and_matches_iff_all_leaves_match(
        doc_port in 0i64..20,
        rule_ports in proptest::collection::vec(0i64..20, 1..6),
    ) {
        let doc = json!({"port": doc_port});
        let leaves: Vec<Rule> = rule_ports.iter().map(|&p| port_leaf(p)).collect();
        let all_match = rule_ports.iter().all(|&p| p == doc_port);

        let and_rule = Rule::And { and: leaves };
        prop_assert_eq!(and_rule.evaluate(&doc).unwrap(), all_match);
    }

    /// `Or` over a set of equality leaves is true exactly when at least one
    /// leaf matches.
    #[test]
    fn prop_or_matches_iff_any_leaf_matches(
        doc_port in 0i64..20,
        rule_ports in proptest::collection::vec(0i64..20, 1..6),
    ) {
        let doc = json!({"port": doc_port});
        let leaves: Vec<Rule> = rule_ports.iter().map(|&p| port_leaf(p)).collect();
        let any_match = rule_ports.iter().any(|&p| p == doc_port);

        let or_rule = Rule::Or { or: leaves };
        prop_assert_eq!(or_rule.evaluate(&doc).unwrap(), any_match);
    }

    /// A CIDR check against an address built from the same network always
    /// matches; an address one network away (differing octet) never does,
    /// for /24 networks confined to private space.
    #[test]
    fn prop_cidr_matches_within_network_only(
        a in 1u8..255, b in 0u8..255, c in 0u8..255, last in 0u8..255, other_c in 0u8..255,
    ) {
        prop_assume!(other_c != c);
        let network = format!("10.{a}.{c}.0/24");
        let inside = json!({"ip": format!("10.{a}.{c}.{last}")});
        let outside = json!({"ip": format!("10.{a}.{other_c}.{last}")});

        let rule = Rule::Leaf(Leaf {
            field: "ip".to_string(),
            operator: Operator::Cidr,
            value: json!(network),
            ignore_case: false,
        });

        prop_assert!(rule.evaluate(&inside).unwrap());
        prop_assert!(!rule.evaluate(&outside).unwrap());
        let _ = b;
    }
}
