//! Canonical in-memory model of a benchmark results table.
//!
//! Every object keeps the fields this crate understands as typed struct
//! members and collects everything else in an [`Extensions`] side table, so
//! data the producer adds later survives a load/serialize cycle untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::{Category, ColIdx, ColumnKind, ToolIdx};

/// Opaque attributes keyed by name, preserved but never interpreted.
pub type Extensions = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// RawValue - the raw scalar of one cell
// ---------------------------------------------------------------------------

/// The raw scalar of one cell as produced by the table generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, from = "Value")]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Number(n) => match n.as_f64() {
                Some(f) => RawValue::Number(f),
                None => RawValue::Text(n.to_string()),
            },
            Value::String(s) => RawValue::Text(s),
            other => RawValue::Text(other.to_string()),
        }
    }
}

impl RawValue {
    /// Interpret the value as a finite number.
    ///
    /// Text is accepted when it parses as a float; NaN and infinities are
    /// rejected in both cases.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(n) => write!(f, "{n}"),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One cell of a result. Rendering fields (`html`, links, ...) stay in
/// `extensions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellValue {
    #[serde(default)]
    pub raw: Option<RawValue>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

impl CellValue {
    /// Create a cell holding the given raw value.
    pub fn new(raw: impl Into<RawValue>) -> Self {
        Self {
            raw: Some(raw.into()),
            extensions: Extensions::new(),
        }
    }

    /// Create a cell without a value.
    pub fn absent() -> Self {
        Self::default()
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

/// Result of one tool for one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Coarse correctness bucket.
    #[serde(default)]
    pub category: Category,

    /// One value per column of the tool, in column order.
    #[serde(default)]
    pub values: Vec<CellValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

/// One task with one result per tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Composite task id as ordered path segments.
    #[serde(default)]
    pub id: Vec<String>,

    /// `results[i]` belongs to `tools[i]`.
    #[serde(default)]
    pub results: Vec<RunResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Row {
    /// The task id as one path string.
    pub fn id_path(&self) -> String {
        self.id.join("/")
    }

    /// Result of the given tool, if the row has one.
    pub fn result(&self, tool: ToolIdx) -> Option<&RunResult> {
        self.results.get(tool.get())
    }

    /// Raw value of the given tool and column.
    pub fn raw(&self, tool: ToolIdx, col: ColIdx) -> Option<&RawValue> {
        self.result(tool)?.values.get(col.get())?.raw.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tools and columns
// ---------------------------------------------------------------------------

/// A column of one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub col_idx: ColIdx,
    pub title: String,
    pub kind: ColumnKind,

    /// The producer's type tag, kept so the column serializes back as received.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_significant_digits: Option<u32>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Resource limits a run set was executed with, as displayed by the producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolLimits {
    #[serde(default, deserialize_with = "lenient_string")]
    pub timelimit: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub memlimit: Option<String>,

    #[serde(rename = "cpuCores", default, deserialize_with = "lenient_string")]
    pub cpu_cores: Option<String>,
}

/// One benchmarked configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    pub tool_idx: ToolIdx,

    /// Tool name.
    pub tool: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,

    pub limits: ToolLimits,

    pub columns: Vec<Column>,

    /// Whether the run set carries a score column.
    pub score_based: bool,

    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Tool {
    /// Get a column by index.
    pub fn column(&self, col: ColIdx) -> Option<&Column> {
        self.columns.get(col.get())
    }

    /// Find the first column with the given title.
    pub fn column_by_title(&self, title: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.title == title)
    }
}

/// A precomputed statistics row from the producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatBlob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// The complete prepared dataset of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub head: Value,
    pub tools: Vec<Tool>,
    pub rows: Vec<Row>,
    pub stats: Vec<StatBlob>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Dataset {
    /// Parse and prepare a JSON payload.
    pub fn from_json(json: &str) -> Result<Self, crate::CoreError> {
        let raw: crate::RawPayload = serde_json::from_str(json)?;
        crate::prepare(raw)
    }

    /// Get a tool by index.
    pub fn tool(&self, tool: ToolIdx) -> Option<&Tool> {
        self.tools.get(tool.get())
    }

    /// Get a column by tool and column index.
    pub fn column(&self, tool: ToolIdx, col: ColIdx) -> Option<&Column> {
        self.tool(tool)?.column(col)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Accept a string, a number or null where a display string is expected.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
