//! Data module
//!
//! Typed tables on polars frames plus the loader that reads, merges and
//! validates them.

pub mod loader;
pub mod table;

// Re-export commonly used types
pub use loader::{
    load_data, load_multimodal, load_multimodal_from, merge_sensor_into_main,
    sample_text_excerpts, validate_data, Modalities,
};
pub use table::{format_number, Column, ColumnKind, Table, MISSING_TOKENS};
