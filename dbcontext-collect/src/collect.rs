//! Collection workflow behind each command.
//!
//! Fatal errors (bad configuration, unreachable database, failed discovery)
//! are returned with connection context. Failures of a single table or
//! column are logged, counted in the [`RunSummary`] and skipped.

use crate::{ConnectionArgs, DetailsArgs};
use anyhow::{Context, Result};
use dbcontext_core::adapters::{
    DatabaseConfig, DatabaseLister, Discoverer, TableDetailDiscoverer, create_database_lister,
    create_discoverer,
};
use dbcontext_core::context::{ContextGenerator, ContextOptions, SENTINEL_DATABASE};
use dbcontext_core::models::{ColumnInfo, DatabaseType, SchemaInfo, TableInfo};
use dbcontext_core::progress::{DEFAULT_TICK_INTERVAL, run_with_progress};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Counts of processed and skipped units for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub tables_processed: usize,
    pub tables_skipped: usize,
    pub files_written: usize,
    pub columns_enriched: usize,
    pub columns_failed: usize,
    pub enriched_tables: usize,
}

impl RunSummary {
    /// Whether any unit was skipped.
    pub fn has_failures(&self) -> bool {
        self.tables_skipped > 0 || self.columns_failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tables: {} processed, {} skipped; files written: {}",
            self.tables_processed, self.tables_skipped, self.files_written
        )?;
        if self.columns_enriched > 0 || self.columns_failed > 0 {
            write!(
                f,
                "; columns profiled: {}, failed: {}; enriched tables: {}",
                self.columns_enriched, self.columns_failed, self.enriched_tables
            )?;
        }
        Ok(())
    }
}

fn generator_for(args: &ConnectionArgs) -> Result<(DatabaseConfig, ContextGenerator)> {
    let config = args.to_config();
    let database_type = config
        .validate()
        .with_context(|| format!("Invalid configuration for connection '{}'", args.connection))?;
    let generator = ContextGenerator::new(args.context_options(database_type));
    Ok((config, generator))
}

async fn connect(config: &DatabaseConfig, connection: &str) -> Result<Box<dyn TableDetailDiscoverer>> {
    create_discoverer(config)
        .await
        .with_context(|| format!("Failed to connect '{}' ({})", connection, config))
}

async fn close(discoverer: &dyn TableDetailDiscoverer) {
    if let Err(e) = discoverer.close().await {
        warn!("Failed to close connection: {}", e);
    }
}

/// Connects, verifies the connection and disconnects.
///
/// # Errors
/// Returns an error if the configuration is invalid or the database cannot
/// be reached.
pub async fn test_connection(args: &ConnectionArgs) -> Result<()> {
    let (config, _) = generator_for(args)?;
    info!("Testing connection '{}' ({})", args.connection, config);

    let discoverer = connect(&config, &args.connection).await?;
    let database_type = discoverer.database_type();
    close(discoverer.as_ref()).await;

    info!("Connection test successful");
    println!("Connection to {} database successful", database_type);
    Ok(())
}

/// Lists databases and merges them into `_databases.yml`.
///
/// # Errors
/// Returns an error if listing fails or the file cannot be written.
pub async fn list_databases(args: &ConnectionArgs) -> Result<PathBuf> {
    let (config, generator) = generator_for(args)?;
    let lister = create_database_lister(&config)
        .await
        .with_context(|| format!("Failed to connect '{}' ({})", args.connection, config))?;

    let listed = lister.list_databases().await;
    if let Err(e) = lister.close().await {
        warn!("Failed to close connection: {}", e);
    }
    let databases =
        listed.with_context(|| format!("Failed to list databases of '{}'", args.connection))?;
    info!("Found {} database(s)", databases.len());

    let update = generator
        .update_databases_file(&databases)
        .context("Failed to update the databases file")?;

    if update.added.is_empty() {
        println!("No new databases");
    } else {
        println!("Added databases: {}", update.added.join(", "));
    }
    println!("Default database: {}", update.default_database);
    println!("Output: {}", update.path.display());
    Ok(update.path)
}

async fn discover_schemas(
    discoverer: &dyn TableDetailDiscoverer,
    connection: &str,
) -> Result<Vec<SchemaInfo>> {
    let label = format!("Discovering schemas of '{}'", connection);
    run_with_progress(&label, DEFAULT_TICK_INTERVAL, discoverer.discover())
        .await
        .with_context(|| format!("Discovery failed for '{}'", connection))
}

/// Discovers schemas and tables and writes the index files.
///
/// # Errors
/// Returns an error if discovery or any index write fails.
pub async fn discover(args: &ConnectionArgs) -> Result<Vec<PathBuf>> {
    let (config, generator) = generator_for(args)?;
    let discoverer = connect(&config, &args.connection).await?;
    let discovered = discover_schemas(discoverer.as_ref(), &args.connection).await;
    close(discoverer.as_ref()).await;
    let schemas = discovered?;

    let tables: usize = schemas.iter().map(|s| s.tables.len()).sum();
    info!("Discovered {} schema(s) with {} table(s)", schemas.len(), tables);

    let written = generator
        .generate(&schemas)
        .context("Failed to write context files")?;
    println!("Schemas: {}", schemas.len());
    println!("Tables: {}", tables);
    println!("Files written: {}", written.len());
    Ok(written)
}

/// Points the connection at the resolved default database when the caller
/// did not name one.
fn apply_database(config: &mut DatabaseConfig, database_type: DatabaseType, database: &str) {
    if database == SENTINEL_DATABASE {
        return;
    }
    match database_type {
        DatabaseType::SQLite => {}
        DatabaseType::BigQuery => {
            config.project_id.get_or_insert_with(|| database.to_string());
        }
        _ => {
            config.database.get_or_insert_with(|| database.to_string());
        }
    }
}

fn select_tables<'a>(schemas: &'a [SchemaInfo], args: &DetailsArgs) -> Vec<(&'a str, &'a TableInfo)> {
    schemas
        .iter()
        .filter(|s| args.schema.as_deref().is_none_or(|wanted| s.name == wanted))
        .flat_map(|s| s.tables.iter().map(move |t| (s.name.as_str(), t)))
        .filter(|(_, t)| args.table.as_deref().is_none_or(|wanted| t.name == wanted))
        .collect()
}

/// Writes column and sample files for every selected table and, with
/// `--enrich`, the profiled columns file.
///
/// # Errors
/// Returns an error only for fatal failures: invalid configuration, a
/// missing default database, connection or discovery failure.
pub async fn details(args: &DetailsArgs) -> Result<RunSummary> {
    let (mut config, generator) = generator_for(&args.connection)?;
    let database_type = generator.options().database_type;
    let database = generator
        .require_target_database()
        .with_context(|| format!("Cannot generate table details for '{}'", args.connection.connection))?;
    apply_database(&mut config, database_type, &database);
    let generator = ContextGenerator::new(ContextOptions {
        database_name: Some(database.clone()).filter(|d| d != SENTINEL_DATABASE),
        ..generator.options().clone()
    });

    let discoverer = connect(&config, &args.connection.connection).await?;
    let summary = match discover_schemas(discoverer.as_ref(), &args.connection.connection).await {
        Ok(schemas) => Ok(process_tables(discoverer.as_ref(), &generator, &schemas, args).await),
        Err(e) => Err(e),
    };
    close(discoverer.as_ref()).await;
    let summary = summary?;

    info!("{}", summary);
    println!("{}", summary);
    Ok(summary)
}

async fn process_tables(
    discoverer: &dyn TableDetailDiscoverer,
    generator: &ContextGenerator,
    schemas: &[SchemaInfo],
    args: &DetailsArgs,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let selected = select_tables(schemas, args);
    if selected.is_empty() {
        warn!("No tables matched the schema/table filters");
    }

    for (schema, table) in selected {
        let columns = match discoverer.get_columns(schema, &table.name).await {
            Ok(columns) => columns,
            Err(e) => {
                warn!("Skipping {}.{}: {}", schema, table.name, e);
                summary.tables_skipped += 1;
                continue;
            }
        };

        let sample = if args.sample_rows == 0 {
            None
        } else {
            match discoverer
                .get_sample_rows(schema, &table.name, args.sample_rows)
                .await
            {
                Ok(sample) => Some(sample),
                Err(e) => {
                    warn!("No sample for {}.{}: {}", schema, table.name, e);
                    None
                }
            }
        };

        // With --enrich the columns file is only ever replaced by the
        // atomic enriched write, after every column profiled.
        let plain_columns = (!args.enrich).then_some(columns.as_slice());
        match generator.generate_table_details(schema, &table.name, plain_columns, sample.as_ref())
        {
            Ok(written) => summary.files_written += written.len(),
            Err(e) => {
                warn!("Skipping {}.{}: {}", schema, table.name, e);
                summary.tables_skipped += 1;
                continue;
            }
        }

        if args.enrich {
            enrich_table(discoverer, generator, schema, &table.name, &columns, &mut summary).await;
        }
        summary.tables_processed += 1;
    }
    summary
}

async fn enrich_table(
    discoverer: &dyn TableDetailDiscoverer,
    generator: &ContextGenerator,
    schema: &str,
    table: &str,
    columns: &[ColumnInfo],
    summary: &mut RunSummary,
) {
    let mut enriched = Vec::with_capacity(columns.len());
    let mut failed = 0;
    for column in columns {
        match discoverer.get_column_enrichment(schema, table, column).await {
            Ok(profile) => enriched.push(profile),
            Err(e) => {
                warn!("{}", e);
                failed += 1;
            }
        }
    }
    summary.columns_enriched += enriched.len();
    summary.columns_failed += failed;

    if failed > 0 {
        warn!(
            "Leaving columns file of {}.{} unchanged: {} of {} column(s) failed",
            schema,
            table,
            failed,
            columns.len()
        );
        return;
    }
    match generator.write_enriched_columns_file(schema, table, &enriched) {
        Ok(path) => {
            info!("Wrote {}", path.display());
            summary.files_written += 1;
            summary.enriched_tables += 1;
        }
        Err(e) => warn!("Failed to write enriched columns for {}.{}: {}", schema, table, e),
    }
}
