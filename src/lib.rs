// GED Ingest - Core Library
// Streams GEDCOM / PAF files into Person and Family records and fans them
// out to pluggable sinks (JSON, SQLite, family CSV, memory).

pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod record;
pub mod registry;
pub mod sink;
pub mod sinks;

// Re-export commonly used types
pub use cache::{ensure_database, hash_file, CacheStatus};
pub use db::{
    setup_database, clear_entity_tables, insert_people, insert_families,
    get_people_by_id, get_children_by_parents, get_family_reports,
    FamilyReport, PersonSummary,
};
pub use entities::{Entity, Family, Person};
pub use error::{IngestError, Result};
pub use handlers::{FieldValue, PartialDate};
pub use parser::{ingest, ingest_file, parse_stream, Driver, DriverState, ParseStats};
pub use record::{BlockCursor, EntityKind, Record, RecordBuilder};
pub use registry::{Handler, Scope, Tag};
pub use sink::{discard_existing_output, emit, flush_all, Sink};
pub use sinks::{FamilyCsvSink, MemorySink, PrintSink, SqliteSink};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
