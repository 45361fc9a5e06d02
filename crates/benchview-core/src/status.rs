//! Result categories and column kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse correctness bucket of one tool's result for one task.
///
/// Several raw statuses map onto one category, so the two are tracked
/// independently. Categories the producer emits but this crate does not
/// know are kept verbatim in [`Category::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Result matches the expected verdict.
    Correct,
    /// Result matches the expected verdict but a validator did not confirm it.
    CorrectUnconfirmed,
    /// Result contradicts the expected verdict.
    Wrong,
    /// Tool gave up without a verdict.
    Unknown,
    /// Tool crashed, timed out or produced garbage.
    Error,
    /// No result for this task in this run.
    #[default]
    Missing,
    /// Any other category string.
    Other(String),
}

impl Category {
    /// The interchange string of this category.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Correct => "correct",
            Self::CorrectUnconfirmed => "correct-unconfirmed",
            Self::Wrong => "wrong",
            Self::Unknown => "unknown",
            Self::Error => "error",
            Self::Missing => "missing",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        match s.as_str() {
            "correct" => Self::Correct,
            "correct-unconfirmed" => Self::CorrectUnconfirmed,
            "wrong" => Self::Wrong,
            "unknown" => Self::Unknown,
            "error" => Self::Error,
            "missing" => Self::Missing,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        match c {
            Category::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the values of a column are classified for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// The tool's own result classification; filtered by status and category.
    Status,
    /// Free text; filtered by exact value.
    Text,
    /// Counts and measurements; filtered by range.
    Numeric,
}

impl ColumnKind {
    /// Resolve a producer type tag. An absent tag means a plain measure.
    ///
    /// Returns `None` for tags that are not known.
    pub fn from_type_tag(tag: Option<&str>) -> Option<Self> {
        match tag {
            None => Some(Self::Numeric),
            Some("status") | Some("main_status") => Some(Self::Status),
            Some("text") => Some(Self::Text),
            Some("count") | Some("measure") | Some("numeric") => Some(Self::Numeric),
            Some(_) => None,
        }
    }
}
