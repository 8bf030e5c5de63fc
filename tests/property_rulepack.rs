use neoscan::services::rulepack::{package, RuleFile};
use proptest::prelude::*;

fn shuffled(files: &[(String, Vec<u8>)], perm: &[usize]) -> Vec<RuleFile> {
    perm.iter()
        .map(|&i| RuleFile {
            relative_path: files[i].0.clone(),
            contents: files[i].1.clone(),
        })
        .collect()
}

proptest! {
    /// Packaging the same set of files in any input order always produces
    /// the same version hash.
    #[test]
    fn prop_hash_is_order_independent(
        names in proptest::collection::hash_set("[a-z][a-z0-9_]{0,8}\\.json", 1..8),
        seed in 0u64..1000,
    ) {
        let files: Vec<(String, Vec<u8>)> = names
            .into_iter()
            .enumerate()
            .map(|(i, n)| (n, format!("{{\"i\":{i}}}").into_bytes()))
            .collect();

        let identity: Vec<usize> = (0..files.len()).collect();
        let mut shuffled_order = identity.clone();
        // deterministic pseudo-shuffle from `seed`, no RNG crate needed here
        for i in (1..shuffled_order.len()).rev() {
            let j = (seed as usize).wrapping_add(i * 2654435761) % (i + 1);
            shuffled_order.swap(i, j);
        }

        let (_, hash_a) = package(shuffled(&files, &identity)).unwrap();
        let (_, hash_b) = package(shuffled(&files, &shuffled_order)).unwrap();
        prop_assert_eq!(hash_a, hash_b);
    }

    /// Changing any single file's contents always changes the resulting
    /// hash.
    #[test]
    fn prop_any_content_change_changes_hash(
        path in "[a-z][a-z0-9_]{0,8}\\.json",
        original in proptest::collection::vec(any::<u8>(), 1..16),
        changed_byte in any::<u8>(),
        change_idx in 0usize..16,
    ) {
        let idx = change_idx.min(original.len() - 1);
        prop_assume!(original[idx] != changed_byte);

        let mut modified = original.clone();
        modified[idx] = changed_byte;

        let (_, hash_a) = package(vec![RuleFile { relative_path: path.clone(), contents: original }]).unwrap();
        let (_, hash_b) = package(vec![RuleFile { relative_path: path, contents: modified }]).unwrap();
        prop_assert_ne!(hash_a, hash_b);
    }
}
