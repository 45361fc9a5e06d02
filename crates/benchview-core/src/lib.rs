//! BenchView Core Domain Types
//!
//! This crate contains the pure domain of an interactive benchmark table:
//! - The canonical dataset model and its preparation from a raw payload
//! - The catalog of selectable filter values per column
//! - Compilation and evaluation of row matchers
//! - Statistics over numeric columns
//!
//! Nothing here performs I/O or depends on an async runtime.

pub mod catalog;
pub mod error;
pub mod ids;
pub mod matcher;
pub mod model;
pub mod prepare;
pub mod selection;
pub mod stats;
pub mod status;

// Re-export commonly used types
pub use catalog::{ColumnFilter, DiffColumn, FilterCatalog};
pub use error::CoreError;
pub use ids::{ColIdx, ToolIdx, TransactionId};
pub use matcher::{filter_rows, ColumnGroup, ColumnPredicate, DiffPredicate, Matcher, NumericRange};
pub use model::{CellValue, Column, Dataset, Extensions, RawValue, Row, RunResult, StatBlob, Tool};
pub use prepare::{prepare, RawPayload};
pub use selection::{FilterSelection, FilterTarget};
pub use stats::{column_values, StatValue};
pub use status::{Category, ColumnKind};
