//! Property tests for the profiling math and the databases-file merge.

use dbcontext_core::context::{ContextGenerator, ContextOptions, resolve_default_database};
use dbcontext_core::enrichment::{
    MAX_SAMPLE_VALUE_LENGTH, MAX_SAMPLE_VALUES, is_vector_type, normalize_sample_values,
    percent_of_total, truncate_value,
};
use dbcontext_core::models::DatabaseType;
use proptest::prelude::*;
use tempfile::TempDir;

proptest! {
    #[test]
    fn percent_is_bounded(numerator in any::<i64>(), denominator in 0i64..=i64::MAX) {
        let pct = percent_of_total(numerator, denominator);
        prop_assert!((0.0..=100.0).contains(&pct));
        if denominator == 0 {
            prop_assert_eq!(pct, 0.0);
        }
    }

    #[test]
    fn truncation_respects_limit(value in "\\PC{0,300}", max_length in 3usize..200) {
        let truncated = truncate_value(&value, max_length);
        if value.chars().count() <= max_length {
            prop_assert_eq!(truncated, value);
        } else {
            prop_assert_eq!(truncated.chars().count(), max_length);
            prop_assert!(truncated.ends_with("..."));
        }
    }

    #[test]
    fn normalization_is_idempotent(values in prop::collection::vec("\\PC{0,150}", 0..30)) {
        let once = normalize_sample_values(&values);
        let twice = normalize_sample_values(&once);
        prop_assert!(once.len() <= MAX_SAMPLE_VALUES);
        prop_assert!(once.iter().all(|v| v.chars().count() <= MAX_SAMPLE_VALUE_LENGTH));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn vector_detection_ignores_case(prefix in "[a-z_]{0,8}", upper in any::<bool>()) {
        let name = if upper { "VECTOR" } else { "Vector" };
        let data_type = format!("{}{}(768)", prefix, name);
        prop_assert!(is_vector_type(&data_type));
    }

    #[test]
    fn configured_database_always_wins(
        configured in "[a-z]{1,12}",
        known in prop::collection::vec("[a-z]{1,12}", 0..5),
        previous in proptest::option::of("[a-z]{1,12}"),
    ) {
        let resolved = resolve_default_database(Some(&configured), &known, previous.as_deref());
        prop_assert_eq!(resolved, configured);
    }
}

#[test]
fn merge_keeps_existing_order() {
    let dir = TempDir::new().unwrap();
    let generator = ContextGenerator::new(ContextOptions {
        connection_name: "warehouse".to_string(),
        database_name: None,
        database_type: DatabaseType::PostgreSQL,
        base_dir: dir.path().to_path_buf(),
    });
    let names = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();

    generator.update_databases_file(&names(&["a", "b"])).unwrap();
    let update = generator
        .update_databases_file(&names(&["b", "c", "a"]))
        .unwrap();
    assert_eq!(update.added, names(&["c"]));

    let text = std::fs::read_to_string(&update.path).unwrap();
    let file: dbcontext_core::context::DatabasesFile = serde_yaml::from_str(&text).unwrap();
    let listed: Vec<&str> = file.databases.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(listed, ["a", "b", "c"]);
}
