//! Context documents: the YAML/XML file tree written from discovery results.

pub mod documents;
pub mod generator;
pub mod paths;
pub mod sample;

pub use documents::{
    ColumnsFile, DatabaseEntry, DatabasesFile, EnrichedColumnsFile, SchemaEntry, SchemasFile,
    TableEntry, TablesFile,
};
pub use generator::{
    ContextGenerator, ContextOptions, DatabasesUpdate, SENTINEL_DATABASE,
    require_default_database, resolve_default_database,
};
pub use paths::{ContextLayout, sanitize_name};
pub use sample::{SampleMetadata, escape_xml, render_sample_xml};
