// Sinks - concrete outputs for parsed entities
//
// - memory:     keeps every entity (library callers, tests)
// - print:      pretty JSON per record (default CLI output)
// - family_csv: one CSV row per family
// - sqlite:     batched upsert into the people / families tables

pub mod family_csv;
pub mod memory;
pub mod print;
pub mod sqlite;

pub use family_csv::FamilyCsvSink;
pub use memory::MemorySink;
pub use print::PrintSink;
pub use sqlite::SqliteSink;
