//! Library module for dbcontext-collect
//!
//! Holds the CLI definition and the collection workflow so both can be
//! exercised from integration tests. The binary entry point is in main.rs.

pub mod collect;

use clap::{Args, Parser, Subcommand};
use dbcontext_core::adapters::DatabaseConfig;
use dbcontext_core::context::ContextOptions;
use dbcontext_core::models::DatabaseType;
use std::convert::Infallible;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// CLI argument structure
#[derive(Parser)]
#[command(name = "dbcontext-collect")]
#[command(about = "Builds agent-readable context files from a live database")]
#[command(version)]
#[command(long_about = "
dbcontext collector - context documents for databases

Connects to a database with read-only access and writes a YAML/XML file
tree describing its databases, schemas, tables and columns:

  <base-dir>/context/connections/<connection>/databases/_databases.yml
  .../databases/<database>/schemas/_schemas.yml
  .../schemas/<schema>/_tables.yml
  .../<table>/<table>__columns.yml and <table>__sample.xml

SUPPORTED DATABASES:
  postgres, redshift, snowflake, mysql, bigquery, sqlite

EXAMPLES:
  dbcontext-collect databases --type postgres --connection prod --host db --user reader
  dbcontext-collect discover --type sqlite --connection local --path app.db
  dbcontext-collect details --type mysql --connection shop --host db --user reader \\
      --database shop --schema shop --enrich
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Connect, verify the connection and disconnect
    Test(ConnectionArgs),
    /// List databases and merge them into _databases.yml
    Databases(ConnectionArgs),
    /// Discover schemas and tables and write the index files
    Discover(ConnectionArgs),
    /// Write column and sample files per table, optionally profiled
    Details(DetailsArgs),
}

/// Global output flags
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,
}

fn parse_secret(value: &str) -> Result<Zeroizing<String>, Infallible> {
    Ok(Zeroizing::new(value.to_string()))
}

/// Connection flags shared by every command
#[derive(Clone, Args)]
pub struct ConnectionArgs {
    /// Backend type
    #[arg(long = "type", value_name = "TYPE", env = "DBCONTEXT_TYPE")]
    pub database_type: String,

    /// Name of the connection; used as its directory in the context tree
    #[arg(long, value_name = "NAME")]
    pub connection: String,

    /// Directory under which `context/` is written
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub base_dir: PathBuf,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Database to connect to; also the default database for context files
    #[arg(long)]
    pub database: Option<String>,

    #[arg(long, env = "DBCONTEXT_USER")]
    pub user: Option<String>,

    /// Password; prefer setting DBCONTEXT_PASSWORD over passing the flag
    #[arg(
        long = "password",
        env = "DBCONTEXT_PASSWORD",
        hide = true,
        hide_env_values = true,
        value_parser = parse_secret
    )]
    pub password: Option<Zeroizing<String>>,

    /// TLS mode in the backend's vocabulary (`require`, `PREFERRED`, ...)
    #[arg(long)]
    pub ssl_mode: Option<String>,

    /// Snowflake account identifier
    #[arg(long)]
    pub account: Option<String>,

    /// Snowflake warehouse
    #[arg(long)]
    pub warehouse: Option<String>,

    /// Snowflake role
    #[arg(long)]
    pub role: Option<String>,

    /// Snowflake session schema
    #[arg(long)]
    pub default_schema: Option<String>,

    /// Snowflake authenticator (`snowflake` or `externalbrowser`)
    #[arg(long)]
    pub authenticator: Option<String>,

    /// BigQuery project id
    #[arg(long)]
    pub project_id: Option<String>,

    /// BigQuery credentials JSON file
    #[arg(long, value_name = "FILE")]
    pub credentials_file: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, value_name = "FILE")]
    pub path: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Builds the adapter configuration. Validation happens in the factory.
    pub fn to_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            database_type: self.database_type.clone(),
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            ssl_mode: self.ssl_mode.clone(),
            account: self.account.clone(),
            warehouse: self.warehouse.clone(),
            role: self.role.clone(),
            schema: self.default_schema.clone(),
            authenticator: self.authenticator.clone(),
            project_id: self.project_id.clone(),
            credentials_file: self.credentials_file.clone(),
            path: self.path.clone(),
        }
    }

    /// Context options for this connection.
    ///
    /// BigQuery projects play the role of databases, so the project id is
    /// used when no database is given.
    pub fn context_options(&self, database_type: DatabaseType) -> ContextOptions {
        let database_name = match database_type {
            DatabaseType::BigQuery => self.database.clone().or_else(|| self.project_id.clone()),
            _ => self.database.clone(),
        };
        ContextOptions {
            connection_name: self.connection.clone(),
            database_name,
            database_type,
            base_dir: self.base_dir.clone(),
        }
    }
}

/// Flags of the `details` command
#[derive(Clone, Args)]
pub struct DetailsArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Only process this schema
    #[arg(long)]
    pub schema: Option<String>,

    /// Only process this table
    #[arg(long)]
    pub table: Option<String>,

    /// Rows to sample per table; 0 disables sampling
    #[arg(long, default_value_t = 10)]
    pub sample_rows: u32,

    /// Profile every column and write the enriched columns file
    #[arg(long)]
    pub enrich: bool,
}
