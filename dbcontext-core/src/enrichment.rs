//! Column enrichment engine.
//!
//! Computes a fixed statistical profile for one column: row, null and
//! distinct counts, derived percentages and a short list of example values.
//! The SQL comes from the backend through [`ProfileSource`]; everything else
//! is shared.
//!
//! The failure unit is a single column. Any query, decode or deadline
//! failure is returned as an `Enrichment` error naming the column, schema
//! and table, and the caller decides whether to continue with the next
//! column.

use crate::deadline::{COLUMN_ENRICHMENT_TIMEOUT, with_deadline};
use crate::error::DbContextError;
use crate::format::{SqlValue, format_value, parse_count};
use crate::models::{ColumnInfo, EnrichedColumnInfo};
use crate::Result;
use async_trait::async_trait;

/// Maximum number of example values kept per column.
pub const MAX_SAMPLE_VALUES: usize = 5;

/// Number of distinct values requested from the source before
/// normalization trims the list down to [`MAX_SAMPLE_VALUES`].
pub const SAMPLE_OVERSAMPLE_LIMIT: usize = 20;

/// Maximum length of one example value in characters, ellipsis included.
pub const MAX_SAMPLE_VALUE_LENGTH: usize = 100;

const ELLIPSIS: &str = "...";

/// Backend-specific SQL and execution for column profiling.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// SQL returning one row of four counts: total rows, nulls, non-nulls and
    /// distinct non-null values.
    fn stats_sql(&self, schema: &str, table: &str, column: &ColumnInfo) -> String;

    /// SQL returning up to `limit` distinct non-null values of the column as
    /// a single result column.
    fn sample_values_sql(
        &self,
        schema: &str,
        table: &str,
        column: &ColumnInfo,
        limit: usize,
    ) -> String;

    /// Executes `sql` and returns the cells of its first row.
    async fn fetch_row(&self, sql: &str) -> Result<Vec<SqlValue>>;

    /// Executes `sql` and returns the first cell of every row.
    async fn fetch_column(&self, sql: &str) -> Result<Vec<SqlValue>>;
}

/// Profiles one column under the per-column deadline.
///
/// # Errors
/// Returns `DbContextError::Enrichment` wrapping the underlying failure.
pub async fn profile_column<S>(
    source: &S,
    schema: &str,
    table: &str,
    column: &ColumnInfo,
) -> Result<EnrichedColumnInfo>
where
    S: ProfileSource + ?Sized,
{
    let operation = format!("Profiling {}.{}.{}", schema, table, column.name);
    with_deadline(
        COLUMN_ENRICHMENT_TIMEOUT,
        &operation,
        compute_profile(source, schema, table, column),
    )
    .await
    .map_err(|e| DbContextError::enrichment_failed(&column.name, schema, table, e))
}

async fn compute_profile<S>(
    source: &S,
    schema: &str,
    table: &str,
    column: &ColumnInfo,
) -> Result<EnrichedColumnInfo>
where
    S: ProfileSource + ?Sized,
{
    let sql = source.stats_sql(schema, table, column);
    tracing::debug!("Column stats query: {}", sql);
    let row = source.fetch_row(&sql).await?;
    if row.len() < 4 {
        return Err(DbContextError::parse(format!(
            "stats query returned {} values, expected 4",
            row.len()
        )));
    }

    let total_rows = parse_count(&row[0])?;
    let null_count = parse_count(&row[1])?;
    let non_null_count = parse_count(&row[2])?;
    let distinct_non_null_count = parse_count(&row[3])?;

    let sample_values = if is_vector_type(&column.data_type) {
        tracing::debug!(
            "Skipping sample values for vector column {}.{}.{}",
            schema,
            table,
            column.name
        );
        Vec::new()
    } else {
        let sql = source.sample_values_sql(schema, table, column, SAMPLE_OVERSAMPLE_LIMIT);
        tracing::debug!("Column sample query: {}", sql);
        let raw: Vec<String> = source
            .fetch_column(&sql)
            .await?
            .iter()
            .filter(|v| !v.is_null())
            .map(format_value)
            .collect();
        normalize_sample_values(&raw)
    };

    Ok(EnrichedColumnInfo {
        column: column.clone(),
        ai_description: String::new(),
        db_description: String::new(),
        total_rows,
        null_count,
        non_null_count,
        distinct_non_null_count,
        distinct_of_non_null_pct: percent_of_total(distinct_non_null_count, non_null_count),
        null_of_total_rows_pct: percent_of_total(null_count, total_rows),
        non_null_of_total_rows_pct: percent_of_total(non_null_count, total_rows),
        sample_values,
    })
}

/// `numerator / denominator * 100`, clamped to `[0, 100]` and rounded to 4
/// decimal places. A non-positive denominator yields exactly `0`.
#[allow(clippy::cast_precision_loss)]
pub fn percent_of_total(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        return 0.0;
    }
    let pct = (numerator as f64 / denominator as f64) * 100.0;
    round4(pct.clamp(0.0, 100.0))
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Whether a declared type is a vector type (case-insensitive substring).
pub fn is_vector_type(data_type: &str) -> bool {
    data_type.to_lowercase().contains("vector")
}

/// Truncates `value` to at most `max_length` characters.
///
/// Longer values are cut to exactly `max_length` characters, the last three
/// of which are `...`.
pub fn truncate_value(value: &str, max_length: usize) -> String {
    if value.chars().count() <= max_length {
        return value.to_string();
    }
    if max_length < ELLIPSIS.len() {
        return value.chars().take(max_length).collect();
    }
    let mut truncated: String = value
        .chars()
        .take(max_length.saturating_sub(ELLIPSIS.len()))
        .collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Truncates, trims, drops empties, deduplicates (first seen wins) and caps
/// the list at [`MAX_SAMPLE_VALUES`]. Applying it twice changes nothing.
///
/// Truncation runs on the raw value: the source query already cut it one
/// character past the limit, so trimming first could hide that cut.
pub fn normalize_sample_values(values: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(MAX_SAMPLE_VALUES);
    for value in values {
        let truncated = truncate_value(value, MAX_SAMPLE_VALUE_LENGTH);
        let trimmed = truncated.trim();
        if trimmed.is_empty() || normalized.iter().any(|v| v == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
        if normalized.len() == MAX_SAMPLE_VALUES {
            break;
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct MockSource {
        stats: Vec<SqlValue>,
        samples: Vec<SqlValue>,
        fail_samples: bool,
        delay: Option<Duration>,
    }

    impl MockSource {
        fn new(stats: Vec<SqlValue>, samples: Vec<SqlValue>) -> Self {
            Self {
                stats,
                samples,
                fail_samples: false,
                delay: None,
            }
        }
    }

    #[async_trait]
    impl ProfileSource for MockSource {
        fn stats_sql(&self, schema: &str, table: &str, column: &ColumnInfo) -> String {
            format!("stats {schema}.{table}.{}", column.name)
        }

        fn sample_values_sql(
            &self,
            schema: &str,
            table: &str,
            column: &ColumnInfo,
            limit: usize,
        ) -> String {
            format!("samples {schema}.{table}.{} {limit}", column.name)
        }

        async fn fetch_row(&self, _sql: &str) -> Result<Vec<SqlValue>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.stats.clone())
        }

        async fn fetch_column(&self, _sql: &str) -> Result<Vec<SqlValue>> {
            if self.fail_samples {
                return Err(DbContextError::parse("boom"));
            }
            Ok(self.samples.clone())
        }
    }

    fn column(name: &str, data_type: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: "YES".to_string(),
            ordinal_position: 1,
            column_default: None,
        }
    }

    #[test]
    fn test_percent_of_total() {
        assert_eq!(percent_of_total(1, 3), 33.3333);
        assert_eq!(percent_of_total(2, 3), 66.6667);
        assert_eq!(percent_of_total(2, 2), 100.0);
        assert_eq!(percent_of_total(5, 0), 0.0);
        assert_eq!(percent_of_total(0, 0), 0.0);
        assert_eq!(percent_of_total(7, 3), 100.0);
    }

    #[test]
    fn test_truncate_value() {
        assert_eq!(truncate_value("short", 10), "short");
        assert_eq!(truncate_value("exactly10!", 10), "exactly10!");
        let long = "x".repeat(150);
        let truncated = truncate_value(&long, MAX_SAMPLE_VALUE_LENGTH);
        assert_eq!(truncated.chars().count(), MAX_SAMPLE_VALUE_LENGTH);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let value = "é".repeat(12);
        let truncated = truncate_value(&value, 10);
        assert_eq!(truncated.chars().count(), 10);
        assert_eq!(truncated, format!("{}...", "é".repeat(7)));
    }

    #[test]
    fn test_normalize_sample_values() {
        let values: Vec<String> = ["  a ", "a", "", "   ", "b", "c", "d", "e", "f"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(normalize_sample_values(&values), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_normalize_dedups_after_truncation() {
        let prefix = "p".repeat(120);
        let values = vec![format!("{prefix}1"), format!("{prefix}2")];
        let normalized = normalize_sample_values(&values);
        assert_eq!(normalized.len(), 1);
        assert!(normalized[0].ends_with("..."));
    }

    #[test]
    fn test_normalize_marks_cut_values_with_leading_whitespace() {
        // The source query hands over at most one character past the limit.
        let raw = format!("{}{}", " ".repeat(10), "x".repeat(200));
        let cut: String = raw.chars().take(MAX_SAMPLE_VALUE_LENGTH + 1).collect();
        let normalized = normalize_sample_values(&[cut]);
        assert_eq!(normalized, vec![format!("{}...", "x".repeat(87))]);
        assert_eq!(normalize_sample_values(&normalized), normalized);
    }

    #[test]
    fn test_vector_detection_is_case_insensitive() {
        assert!(is_vector_type("vector(1536)"));
        assert!(is_vector_type("VECTOR(FLOAT, 256)"));
        assert!(is_vector_type("halfVector"));
        assert!(!is_vector_type("varchar"));
    }

    #[tokio::test]
    async fn test_profile_column_computes_percentages() {
        let source = MockSource::new(
            vec![
                SqlValue::Int(3),
                SqlValue::Text("1".to_string()),
                SqlValue::Float(2.0),
                SqlValue::Bytes(b"2".to_vec()),
            ],
            vec![
                SqlValue::Text("a@x.com".to_string()),
                SqlValue::Null,
                SqlValue::Text("c@x.com".to_string()),
            ],
        );

        let profile = profile_column(&source, "main", "users", &column("email", "TEXT"))
            .await
            .unwrap();

        assert_eq!(profile.total_rows, 3);
        assert_eq!(profile.null_count, 1);
        assert_eq!(profile.non_null_count, 2);
        assert_eq!(profile.distinct_non_null_count, 2);
        assert_eq!(profile.null_of_total_rows_pct, 33.3333);
        assert_eq!(profile.non_null_of_total_rows_pct, 66.6667);
        assert_eq!(profile.distinct_of_non_null_pct, 100.0);
        assert_eq!(profile.sample_values, vec!["a@x.com", "c@x.com"]);
        assert!(profile.ai_description.is_empty());
    }

    #[tokio::test]
    async fn test_vector_column_has_no_samples() {
        let mut source = MockSource::new(
            vec![SqlValue::Int(1), SqlValue::Int(0), SqlValue::Int(1), SqlValue::Int(1)],
            vec![SqlValue::Text("[1,2,3]".to_string())],
        );
        source.fail_samples = true;

        let profile = profile_column(&source, "public", "items", &column("embedding", "Vector(3)"))
            .await
            .unwrap();
        assert!(profile.sample_values.is_empty());
    }

    #[tokio::test]
    async fn test_failure_names_column_schema_and_table() {
        let mut source = MockSource::new(
            vec![SqlValue::Int(1), SqlValue::Int(0), SqlValue::Int(1), SqlValue::Int(1)],
            Vec::new(),
        );
        source.fail_samples = true;

        let err = profile_column(&source, "sales", "orders", &column("note", "text"))
            .await
            .unwrap_err();
        match err {
            DbContextError::Enrichment {
                column,
                schema,
                table,
                ..
            } => {
                assert_eq!(column, "note");
                assert_eq!(schema, "sales");
                assert_eq!(table, "orders");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_short_stats_row_is_parse_error() {
        let source = MockSource::new(vec![SqlValue::Int(1)], Vec::new());
        let err = profile_column(&source, "s", "t", &column("c", "int"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'c'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_is_enrichment_error() {
        let mut source = MockSource::new(
            vec![SqlValue::Int(1), SqlValue::Int(0), SqlValue::Int(1), SqlValue::Int(1)],
            Vec::new(),
        );
        source.delay = Some(COLUMN_ENRICHMENT_TIMEOUT + Duration::from_secs(1));

        let err = profile_column(&source, "s", "t", &column("slow", "int"))
            .await
            .unwrap_err();
        match err {
            DbContextError::Enrichment { source, .. } => {
                assert!(matches!(*source, DbContextError::Timeout { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
