//! Core domain errors.

use thiserror::Error;

/// Core domain errors for BenchView.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A row carries a different number of results than there are tools.
    #[error("Row {row}: expected {expected} results (one per tool), found {found}")]
    ResultCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A result carries a different number of values than its tool has columns.
    #[error("Row {row}, tool {tool}: expected {expected} values (one per column), found {found}")]
    ValueCountMismatch {
        row: usize,
        tool: usize,
        expected: usize,
        found: usize,
    },

    /// A column declares a type this crate does not know.
    #[error("Tool {tool}, column {column}: unknown column type '{kind}'")]
    UnknownColumnType {
        tool: usize,
        column: usize,
        kind: String,
    },

    /// The payload is not valid JSON or does not have the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
