//! dbcontext collector binary.
//!
//! Connects to a database and writes the context file tree describing it.
//!
//! # Security Guarantees
//! - Read-only database operations only
//! - No credentials stored or logged
//! - Passwords are taken from the environment and zeroized on drop

use anyhow::Result;
use clap::Parser;
use dbcontext_collect::{Cli, Command, collect};
use dbcontext_core::logging::init_logging;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.global.verbose, cli.global.quiet)?;

    match &cli.command {
        Command::Test(args) => collect::test_connection(args).await,
        Command::Databases(args) => collect::list_databases(args).await.map(|_| ()),
        Command::Discover(args) => collect::discover(args).await.map(|_| ()),
        Command::Details(args) => {
            let summary = collect::details(args).await?;
            if summary.has_failures() {
                warn!("Some tables or columns were skipped; see the warnings above");
            }
            Ok(())
        }
    }
}
