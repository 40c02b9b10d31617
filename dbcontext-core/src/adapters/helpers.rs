//! Helper utilities shared by the backend adapters.

use crate::models::{SchemaInfo, TableInfo};
use std::collections::BTreeMap;

/// Groups `(schema, table)` rows under their schemas.
///
/// Every name in `schema_names` produces a `SchemaInfo`, even when it has no
/// tables; tables of schemas not listed there are added too. Schemas and the
/// tables inside them come back sorted by name.
pub fn assemble_schemas<I>(schema_names: I, tables: Vec<(String, TableInfo)>) -> Vec<SchemaInfo>
where
    I: IntoIterator<Item = String>,
{
    let mut grouped: BTreeMap<String, Vec<TableInfo>> = schema_names
        .into_iter()
        .map(|name| (name, Vec::new()))
        .collect();

    for (schema, table) in tables {
        grouped.entry(schema).or_default().push(table);
    }

    grouped
        .into_iter()
        .map(|(name, mut tables)| {
            tables.sort_by(|a, b| a.name.cmp(&b.name));
            tables.dedup_by(|a, b| a.name == b.name);
            SchemaInfo { name, tables }
        })
        .collect()
}

/// Builds the four-count profile query shared by every SQL dialect.
///
/// `column` is the quoted column, `distinct_expr` the backend's text cast of
/// it and `from` the quoted, qualified relation.
pub fn stats_query(column: &str, distinct_expr: &str, from: &str) -> String {
    format!(
        "SELECT COUNT(*) AS total_rows, \
         COUNT(*) - COUNT({column}) AS null_count, \
         COUNT({column}) AS non_null_count, \
         COUNT(DISTINCT {distinct_expr}) AS distinct_non_null_count \
         FROM {from}"
    )
}

/// Builds a distinct non-null values query over a text expression.
pub fn distinct_values_query(column: &str, value_expr: &str, from: &str, limit: usize) -> String {
    format!(
        "SELECT DISTINCT {value_expr} AS sample_value FROM {from} \
         WHERE {column} IS NOT NULL LIMIT {limit}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_keeps_empty_schemas_and_sorts() {
        let schemas = assemble_schemas(
            vec!["public".to_string(), "empty".to_string()],
            vec![
                ("public".to_string(), TableInfo::new("zeta", "BASE TABLE")),
                ("public".to_string(), TableInfo::new("alpha", "VIEW")),
            ],
        );

        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].name, "empty");
        assert!(schemas[0].tables.is_empty());
        assert_eq!(schemas[1].name, "public");
        assert_eq!(schemas[1].tables[0].name, "alpha");
        assert_eq!(schemas[1].tables[1].name, "zeta");
    }

    #[test]
    fn test_assemble_adds_unlisted_schema() {
        let schemas = assemble_schemas(
            Vec::new(),
            vec![("sales".to_string(), TableInfo::new("orders", "table"))],
        );
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].tables[0].table_type, "BASE TABLE");
    }

    #[test]
    fn test_stats_query_shape() {
        let sql = stats_query("\"email\"", "CAST(\"email\" AS TEXT)", "\"main\".\"users\"");
        assert!(sql.starts_with("SELECT COUNT(*) AS total_rows"));
        assert!(sql.contains("COUNT(DISTINCT CAST(\"email\" AS TEXT))"));
        assert!(sql.ends_with("FROM \"main\".\"users\""));
    }

    #[test]
    fn test_distinct_values_query_shape() {
        let sql = distinct_values_query("`c`", "CAST(`c` AS CHAR)", "`db`.`t`", 20);
        assert_eq!(
            sql,
            "SELECT DISTINCT CAST(`c` AS CHAR) AS sample_value FROM `db`.`t` WHERE `c` IS NOT NULL LIMIT 20"
        );
    }
}
