//! Writes discovery results into the context tree.
//!
//! `_databases.yml` is merged so that names and the sticky
//! `default_database` survive repeated runs. Schema and table indexes are
//! always fully replaced. Per-table files are written only when there is
//! something to put in them.

use super::documents::{
    COLUMNS_HEADER, ColumnsFile, DATABASES_HEADER, DatabaseEntry, DatabasesFile,
    ENRICHED_COLUMNS_HEADER, EnrichedColumnsFile, SCHEMAS_HEADER, SchemaEntry, SchemasFile,
    TABLES_HEADER, TableEntry, TablesFile, render_yaml,
};
use super::paths::ContextLayout;
use super::sample::{SampleMetadata, render_sample_xml};
use crate::Result;
use crate::error::DbContextError;
use crate::models::{ColumnInfo, DatabaseType, EnrichedColumnInfo, SampleResult, SchemaInfo};
use chrono::{SecondsFormat, Utc};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default database name used when none can be determined.
pub const SENTINEL_DATABASE: &str = "default";

/// Identifies where and for what a context tree is generated.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Name of the saved connection; used as the connection directory.
    pub connection_name: String,
    /// Database selected explicitly by the caller, if any.
    pub database_name: Option<String>,
    pub database_type: DatabaseType,
    /// Root under which `context/` is created.
    pub base_dir: PathBuf,
}

/// Outcome of merging names into `_databases.yml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasesUpdate {
    pub path: PathBuf,
    /// Names that were not listed before, in the order they were appended.
    pub added: Vec<String>,
    pub default_database: String,
}

/// Picks the default database.
///
/// A non-blank configured name wins. Otherwise a single known database is
/// the default, then a previously recorded default, then the sentinel.
pub fn resolve_default_database(
    configured: Option<&str>,
    databases: &[String],
    previous: Option<&str>,
) -> String {
    if let Some(name) = configured.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    if let [only] = databases {
        return only.clone();
    }
    previous
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(SENTINEL_DATABASE)
        .to_string()
}

/// Rejects the sentinel for backends where it does not name a real database.
///
/// # Errors
/// Returns `MissingDefaultDatabase` when `database` is the sentinel and the
/// backend needs an explicit database.
pub fn require_default_database(database_type: DatabaseType, database: &str) -> Result<()> {
    if database == SENTINEL_DATABASE && database_type.requires_explicit_database() {
        return Err(DbContextError::MissingDefaultDatabase {
            database_type: database_type.to_string(),
        });
    }
    Ok(())
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn ensure_parent(path: &Path) -> Result<&Path> {
    let parent = path
        .parent()
        .ok_or_else(|| DbContextError::configuration(format!("{} has no parent", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        DbContextError::io(format!("Failed to create directory {}", parent.display()), e)
    })?;
    Ok(parent)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, contents)
        .map_err(|e| DbContextError::io(format!("Failed to write {}", path.display()), e))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

/// Writes through a temporary file in the target directory and renames it
/// over `path`, so readers see either the old or the new contents.
fn write_file_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = ensure_parent(path)?;
    let context = || format!("Failed to write {}", path.display());

    let mut temp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| DbContextError::io(context(), e))?;
    temp.write_all(contents.as_bytes())
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| DbContextError::io(context(), e))?;
    temp.persist(path)
        .map_err(|e| DbContextError::io(context(), e.error))?;
    tracing::debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Generates and updates the context tree of one connection.
#[derive(Debug, Clone)]
pub struct ContextGenerator {
    options: ContextOptions,
    layout: ContextLayout,
}

impl ContextGenerator {
    pub fn new(options: ContextOptions) -> Self {
        let layout = ContextLayout::new(&options.base_dir, &options.connection_name);
        Self { options, layout }
    }

    pub fn layout(&self) -> &ContextLayout {
        &self.layout
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    fn configured_database(&self) -> Option<&str> {
        self.options
            .database_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    fn read_databases_file(&self) -> Result<Option<DatabasesFile>> {
        let path = self.layout.databases_file();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| DbContextError::io(format!("Failed to read {}", path.display()), e))?;
        let document = serde_yaml::from_str(&contents).map_err(|e| {
            DbContextError::serialization(format!("Failed to parse {}", path.display()), e)
        })?;
        Ok(Some(document))
    }

    /// Default database recorded in `_databases.yml`, if the file exists.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read_default_database(&self) -> Result<Option<String>> {
        Ok(self
            .read_databases_file()?
            .map(|file| file.default_database)
            .filter(|d| !d.trim().is_empty()))
    }

    /// Database the per-database files are written for: the configured
    /// name, else the recorded default, else the sentinel.
    ///
    /// # Errors
    /// Returns an error if an existing `_databases.yml` cannot be read.
    pub fn target_database(&self) -> Result<String> {
        if let Some(name) = self.configured_database() {
            return Ok(name.to_string());
        }
        Ok(self
            .read_default_database()?
            .unwrap_or_else(|| SENTINEL_DATABASE.to_string()))
    }

    /// Like [`target_database`](Self::target_database), but fails with
    /// guidance when the backend needs a real database and only the
    /// sentinel is known.
    ///
    /// # Errors
    /// Returns `MissingDefaultDatabase` or a read error.
    pub fn require_target_database(&self) -> Result<String> {
        let database = self.target_database()?;
        require_default_database(self.options.database_type, &database)?;
        Ok(database)
    }

    /// Merges `discovered` into `_databases.yml`.
    ///
    /// Existing entries keep their order; new names are appended sorted.
    /// The whole file is rewritten with a recomputed default.
    ///
    /// # Errors
    /// Returns an error if the existing file is unreadable or the write fails.
    pub fn update_databases_file(&self, discovered: &[String]) -> Result<DatabasesUpdate> {
        let existing = self.read_databases_file()?;
        let previous_default = existing.as_ref().map(|f| f.default_database.clone());
        let mut names: Vec<String> = existing
            .map(|f| f.databases.into_iter().map(|d| d.name).collect())
            .unwrap_or_default();

        let known: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut added: Vec<String> = discovered
            .iter()
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        added.sort();
        names.extend(added.iter().cloned());

        let default_database = resolve_default_database(
            self.configured_database(),
            &names,
            previous_default.as_deref(),
        );
        let document = DatabasesFile {
            connection: self.options.connection_name.clone(),
            database_type: self.options.database_type.tag().to_string(),
            default_database: default_database.clone(),
            generated_at: timestamp(),
            databases: names
                .into_iter()
                .map(|name| DatabaseEntry { name })
                .collect(),
        };

        let path = self.layout.databases_file();
        write_file(&path, &render_yaml(DATABASES_HEADER, &document)?)?;
        if !added.is_empty() {
            tracing::info!(
                "Added {} database(s) to {}: {}",
                added.len(),
                path.display(),
                added.join(", ")
            );
        }
        Ok(DatabasesUpdate {
            path,
            added,
            default_database,
        })
    }

    /// Writes the index files for a discovery result and returns their paths.
    ///
    /// The target database is merged into `_databases.yml` unless it is the
    /// sentinel; `_schemas.yml` and every `_tables.yml` are replaced.
    ///
    /// # Errors
    /// Returns the first read, serialization or write error.
    pub fn generate(&self, schemas: &[SchemaInfo]) -> Result<Vec<PathBuf>> {
        let database = self.target_database()?;
        let generated_at = timestamp();
        let mut written = Vec::new();

        if database != SENTINEL_DATABASE {
            written.push(self.update_databases_file(std::slice::from_ref(&database))?.path);
        }

        let mut sorted: Vec<&SchemaInfo> = schemas.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let schemas_file = SchemasFile {
            connection: self.options.connection_name.clone(),
            database: database.clone(),
            database_type: self.options.database_type.tag().to_string(),
            generated_at: generated_at.clone(),
            schema_count: sorted.len(),
            schemas: sorted
                .iter()
                .map(|schema| {
                    let views = schema.tables.iter().filter(|t| t.is_view()).count();
                    SchemaEntry {
                        name: schema.name.clone(),
                        table_count: schema.tables.len().saturating_sub(views),
                        view_count: views,
                        ai_description: String::new(),
                        db_description: String::new(),
                    }
                })
                .collect(),
        };
        let path = self.layout.schemas_file(&database);
        write_file(&path, &render_yaml(SCHEMAS_HEADER, &schemas_file)?)?;
        written.push(path);

        for schema in &sorted {
            let mut tables: Vec<TableEntry> = schema
                .tables
                .iter()
                .map(|table| TableEntry {
                    name: table.name.clone(),
                    table_type: table.table_type.clone(),
                    ai_description: String::new(),
                    db_description: String::new(),
                })
                .collect();
            tables.sort_by(|a, b| a.name.cmp(&b.name));
            let view_count = schema.tables.iter().filter(|t| t.is_view()).count();

            let tables_file = TablesFile {
                connection: self.options.connection_name.clone(),
                database: database.clone(),
                database_type: self.options.database_type.tag().to_string(),
                schema: schema.name.clone(),
                generated_at: generated_at.clone(),
                table_count: tables.len().saturating_sub(view_count),
                view_count,
                tables,
            };
            let path = self.layout.tables_file(&database, &schema.name);
            write_file(&path, &render_yaml(TABLES_HEADER, &tables_file)?)?;
            written.push(path);
        }

        tracing::info!(
            "Generated context for {} schema(s) of database '{}' ({} files)",
            sorted.len(),
            database,
            written.len()
        );
        Ok(written)
    }

    /// Writes the columns file and sample document of one table.
    ///
    /// Each file is skipped when its input is absent or empty.
    ///
    /// # Errors
    /// Returns `MissingDefaultDatabase` when no real database is known for a
    /// backend that needs one, or the first write error.
    pub fn generate_table_details(
        &self,
        schema: &str,
        table: &str,
        columns: Option<&[ColumnInfo]>,
        sample: Option<&SampleResult>,
    ) -> Result<Vec<PathBuf>> {
        let database = self.require_target_database()?;
        let generated_at = timestamp();
        let mut written = Vec::new();

        if let Some(columns) = columns.filter(|c| !c.is_empty()) {
            let document = ColumnsFile {
                connection: self.options.connection_name.clone(),
                database: database.clone(),
                database_type: self.options.database_type.tag().to_string(),
                schema: schema.to_string(),
                table: table.to_string(),
                generated_at: generated_at.clone(),
                column_count: columns.len(),
                columns: columns.to_vec(),
            };
            let path = self.layout.columns_file(&database, schema, table);
            write_file(&path, &render_yaml(COLUMNS_HEADER, &document)?)?;
            written.push(path);
        }

        if let Some(sample) = sample.filter(|s| !s.is_empty()) {
            let metadata = SampleMetadata {
                connection: &self.options.connection_name,
                database: &database,
                schema,
                table,
                generated_at: &generated_at,
            };
            let path = self.layout.sample_file(&database, schema, table);
            write_file(&path, &render_sample_xml(&metadata, sample))?;
            written.push(path);
        }

        Ok(written)
    }

    /// Replaces the columns file of one table with its profiled columns.
    ///
    /// # Errors
    /// Returns `MissingDefaultDatabase`, a serialization error, or an `Io`
    /// error; on any error the previous file is left untouched.
    pub fn write_enriched_columns_file(
        &self,
        schema: &str,
        table: &str,
        columns: &[EnrichedColumnInfo],
    ) -> Result<PathBuf> {
        let database = self.require_target_database()?;
        let document = EnrichedColumnsFile {
            connection: self.options.connection_name.clone(),
            database: database.clone(),
            database_type: self.options.database_type.tag().to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            generated_at: timestamp(),
            enriched: true,
            column_count: columns.len(),
            columns: columns.to_vec(),
        };
        let contents = render_yaml(ENRICHED_COLUMNS_HEADER, &document)?;
        let path = self.layout.columns_file(&database, schema, table);
        write_file_atomic(&path, &contents)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TableInfo;
    use tempfile::TempDir;

    fn generator(dir: &TempDir, database: Option<&str>, db_type: DatabaseType) -> ContextGenerator {
        ContextGenerator::new(ContextOptions {
            connection_name: "prod".to_string(),
            database_name: database.map(str::to_string),
            database_type: db_type,
            base_dir: dir.path().to_path_buf(),
        })
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_resolve_default_database_precedence() {
        let one = names(&["only"]);
        let many = names(&["a", "b"]);
        assert_eq!(resolve_default_database(Some("cfg"), &one, Some("prev")), "cfg");
        assert_eq!(resolve_default_database(Some("  "), &one, Some("prev")), "only");
        assert_eq!(resolve_default_database(None, &many, Some("prev")), "prev");
        assert_eq!(resolve_default_database(None, &many, None), SENTINEL_DATABASE);
        assert_eq!(resolve_default_database(None, &[], Some(" ")), SENTINEL_DATABASE);
    }

    #[test]
    fn test_require_default_database() {
        let err = require_default_database(DatabaseType::PostgreSQL, SENTINEL_DATABASE).unwrap_err();
        assert!(matches!(err, DbContextError::MissingDefaultDatabase { .. }));
        assert!(require_default_database(DatabaseType::SQLite, SENTINEL_DATABASE).is_ok());
        assert!(require_default_database(DatabaseType::MySQL, "app").is_ok());
    }

    #[test]
    fn test_update_databases_file_merges_in_order() {
        let dir = TempDir::new().unwrap();
        let generator = generator(&dir, None, DatabaseType::PostgreSQL);

        let first = generator.update_databases_file(&names(&["b", "a"])).unwrap();
        assert_eq!(first.added, names(&["a", "b"]));
        assert_eq!(first.default_database, SENTINEL_DATABASE);

        let second = generator
            .update_databases_file(&names(&["d", "b", "c", "a", "c"]))
            .unwrap();
        assert_eq!(second.added, names(&["c", "d"]));

        let file = generator.read_databases_file().unwrap().unwrap();
        let listed: Vec<&str> = file.databases.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(listed, ["a", "b", "c", "d"]);
        assert_eq!(file.connection, "prod");
        assert_eq!(file.database_type, "postgres");
    }

    #[test]
    fn test_single_database_becomes_sticky_default() {
        let dir = TempDir::new().unwrap();
        let generator = generator(&dir, None, DatabaseType::MySQL);

        let update = generator.update_databases_file(&names(&["app"])).unwrap();
        assert_eq!(update.default_database, "app");

        let update = generator.update_databases_file(&names(&["other"])).unwrap();
        assert_eq!(update.default_database, "app");
        assert_eq!(generator.read_default_database().unwrap().as_deref(), Some("app"));
    }

    #[test]
    fn test_generate_writes_sorted_indexes() {
        let dir = TempDir::new().unwrap();
        let generator = generator(&dir, Some("app"), DatabaseType::PostgreSQL);
        let mut sales = SchemaInfo::new("sales");
        sales.tables = vec![
            TableInfo::new("orders", "BASE TABLE"),
            TableInfo::new("daily", "MATERIALIZED VIEW"),
            TableInfo::new("active", "VIEW"),
        ];
        let schemas = vec![sales, SchemaInfo::new("audit")];

        let written = generator.generate(&schemas).unwrap();
        assert_eq!(written.len(), 4);

        let text = std::fs::read_to_string(generator.layout().schemas_file("app")).unwrap();
        assert!(text.starts_with('#'));
        let file: SchemasFile = serde_yaml::from_str(&text).unwrap();
        assert_eq!(file.schemas[0].name, "audit");
        assert_eq!(file.schemas[1].table_count, 1);
        assert_eq!(file.schemas[1].view_count, 2);

        let text =
            std::fs::read_to_string(generator.layout().tables_file("app", "sales")).unwrap();
        let file: TablesFile = serde_yaml::from_str(&text).unwrap();
        let listed: Vec<&str> = file.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(listed, ["active", "daily", "orders"]);

        assert_eq!(generator.read_default_database().unwrap().as_deref(), Some("app"));
    }

    #[test]
    fn test_views_only_schema_counts_no_tables() {
        let dir = TempDir::new().unwrap();
        let generator = generator(&dir, Some("app"), DatabaseType::PostgreSQL);
        let mut reporting = SchemaInfo::new("reporting");
        reporting.tables = vec![
            TableInfo::new("weekly", "VIEW"),
            TableInfo::new("monthly", "MATERIALIZED VIEW"),
        ];

        generator.generate(&[reporting]).unwrap();

        let text = std::fs::read_to_string(generator.layout().schemas_file("app")).unwrap();
        let file: SchemasFile = serde_yaml::from_str(&text).unwrap();
        assert_eq!(file.schemas[0].table_count, 0);
        assert_eq!(file.schemas[0].view_count, 2);

        let text =
            std::fs::read_to_string(generator.layout().tables_file("app", "reporting")).unwrap();
        let file: TablesFile = serde_yaml::from_str(&text).unwrap();
        assert_eq!(file.table_count, 0);
        assert_eq!(file.view_count, 2);
    }

    #[test]
    fn test_table_details_skip_empty_inputs() {
        let dir = TempDir::new().unwrap();
        let generator = generator(&dir, Some("app"), DatabaseType::SQLite);
        let columns = vec![ColumnInfo {
            name: "id".to_string(),
            data_type: "INTEGER".to_string(),
            is_nullable: "NO".to_string(),
            ordinal_position: 1,
            column_default: None,
        }];

        let written = generator
            .generate_table_details("main", "users", Some(&columns), Some(&SampleResult::default()))
            .unwrap();
        assert_eq!(written, vec![generator.layout().columns_file("app", "main", "users")]);
        assert!(!generator.layout().sample_file("app", "main", "users").exists());
    }

    #[test]
    fn test_table_details_need_real_database() {
        let dir = TempDir::new().unwrap();
        let generator = generator(&dir, None, DatabaseType::Snowflake);
        let err = generator
            .generate_table_details("public", "users", None, None)
            .unwrap_err();
        assert!(matches!(err, DbContextError::MissingDefaultDatabase { .. }));
    }
}
