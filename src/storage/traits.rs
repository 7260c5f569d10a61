//! Storage traits and error types
//!
//! This module defines the trait interface for record stores and
//! associated error types.

use crate::storage::{Record, SchemaVariant};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store at {} is not writable: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Record {url} has text that cannot be written as {codepage}")]
    Encoding { url: String, codepage: &'static str },

    #[error("Header mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only sink for extracted records
///
/// Implementations must make each `append` durable on its own: a record is
/// either fully readable afterwards or not present at all.
pub trait RecordStore {
    /// Durably adds one record
    ///
    /// A record whose text cannot be represented in the store fails with
    /// [`StoreError::Encoding`] and leaves the store unchanged.
    fn append(&mut self, record: &Record) -> StoreResult<()>;

    /// Returns every complete record in insertion order
    fn load_all(&self) -> StoreResult<Vec<Record>>;

    /// Returns the values of one column across all complete records
    fn load_column(&self, name: &str) -> StoreResult<Vec<String>>;

    /// Number of records appended through this handle
    fn appended(&self) -> u64;

    /// Column layout of the store
    fn schema(&self) -> SchemaVariant;
}
