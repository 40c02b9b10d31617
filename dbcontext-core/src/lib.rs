//! Core discovery, profiling and context generation for dbcontext.
//!
//! This crate turns a live database connection into a tree of YAML/XML
//! context documents that an agent can read without any other knowledge
//! of the database.
//!
//! # Guarantees
//! - No credentials stored or logged in any data structures
//! - All database operations are read-only
//! - Every network call runs under an explicit deadline
//!
//! # Architecture
//! - [`adapters`]: one backend adapter per database behind three object-safe
//!   traits, selected by a factory from a [`DatabaseConfig`]
//! - [`enrichment`]: per-column statistical profiles
//! - [`context`]: document model, on-disk layout and merge logic
//! - [`deadline`] and [`progress`]: timeouts and elapsed-time feedback

pub mod adapters;
pub mod context;
pub mod deadline;
pub mod enrichment;
pub mod error;
pub mod format;
pub mod logging;
pub mod models;
pub mod progress;

// Re-export commonly used types
pub use adapters::{
    DatabaseConfig, DatabaseLister, Discoverer, TableDetailDiscoverer, create_database_lister,
    create_discoverer,
};
pub use context::{ContextGenerator, ContextOptions, DatabasesUpdate, SENTINEL_DATABASE};
pub use enrichment::{ProfileSource, profile_column};
pub use error::{DbContextError, Result};
pub use models::{
    ColumnInfo, DatabaseType, EnrichedColumnInfo, SampleResult, SchemaInfo, TableInfo,
};
