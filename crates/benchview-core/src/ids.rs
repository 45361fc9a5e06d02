//! Newtype wrappers for indices and identifiers to ensure type safety.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a tool in the dataset's tool list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolIdx(usize);

impl ToolIdx {
    /// Create a new ToolIdx.
    pub fn new(idx: usize) -> Self {
        Self(idx)
    }

    /// Get the inner index.
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for ToolIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for ToolIdx {
    fn from(idx: usize) -> Self {
        Self(idx)
    }
}

/// Position of a column within its tool's column list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColIdx(usize);

impl ColIdx {
    /// Create a new ColIdx.
    pub fn new(idx: usize) -> Self {
        Self(idx)
    }

    /// Get the inner index.
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for ColIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for ColIdx {
    fn from(idx: usize) -> Self {
        Self(idx)
    }
}

/// Correlation id pairing a scheduled task with its eventual result.
///
/// Assigned by the scheduler in strictly increasing order and echoed
/// verbatim by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Create a new TransactionId.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// The id following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_next() {
        let id = TransactionId::new(41);
        assert_eq!(id.next(), TransactionId::new(42));
        assert!(id < id.next());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", ToolIdx::new(3)), "3");
        assert_eq!(format!("{}", ColIdx::from(7)), "7");
    }

    #[test]
    fn test_transparent_serde() {
        let json = serde_json::to_string(&TransactionId::new(5)).unwrap();
        assert_eq!(json, "5");
        let idx: ToolIdx = serde_json::from_str("2").unwrap();
        assert_eq!(idx.get(), 2);
    }
}
