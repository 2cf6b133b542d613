//! Reading manuscript tables and writing screening results.

pub mod loader;
pub mod writer;

pub use loader::{
    load_records, load_table, parse_records, parse_table, InputFormat, LoadError, RecordTable,
};
pub use writer::{write_csv, write_json, write_results, OutputError};
