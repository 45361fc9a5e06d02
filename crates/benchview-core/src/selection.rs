//! Filter selections as exchanged with the UI and URL layers.
//!
//! A selection is `{ id, value?, values? }`. The `id` names the target:
//! `"id"` for the task id, `"diff"` for a cross-tool diff, and
//! `"<tool>_<title>_<col>"` for a column of a tool.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::model::lenient_string;
use crate::{ColIdx, ToolIdx};

/// Id of the task-id pseudo-column.
pub const TASK_ID_FILTER: &str = "id";

/// Id of the diff pseudo-column.
pub const DIFF_FILTER: &str = "diff";

/// Column compared by a diff selection that does not name one.
pub const DEFAULT_DIFF_COLUMN: &str = "status";

/// One active filter selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_strings")]
    pub values: Option<Vec<String>>,
}

impl FilterSelection {
    /// Selection on a column of a tool.
    pub fn column(tool: usize, title: &str, col: usize) -> Self {
        Self {
            id: format!("{tool}_{title}_{col}"),
            ..Default::default()
        }
    }

    /// Selection on the task id.
    pub fn task_id(text: impl Into<String>) -> Self {
        Self {
            id: TASK_ID_FILTER.to_string(),
            value: Some(text.into()),
            values: None,
        }
    }

    /// Selection of rows where two tools disagree on the column `title`.
    pub fn diff(left: usize, right: usize, title: impl Into<String>) -> Self {
        Self {
            id: DIFF_FILTER.to_string(),
            value: Some(title.into()),
            values: Some(vec![left.to_string(), right.to_string()]),
        }
    }

    /// Builder method to set the single value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Builder method to set the value list.
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Builder method to select a numeric range; `None` leaves a side open.
    pub fn with_range(self, min: Option<f64>, max: Option<f64>) -> Self {
        let side = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        self.with_value(format!("{}:{}", side(min), side(max)))
    }

    /// The parsed target of this selection, if the id is well-formed.
    pub fn target(&self) -> Option<FilterTarget> {
        FilterTarget::parse(&self.id)
    }

    /// All selected values: `value` followed by `values`.
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.value
            .iter()
            .chain(self.values.iter().flatten())
            .map(String::as_str)
    }
}

/// What a selection refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTarget {
    /// A column of a tool. The title is informational only.
    Column {
        tool: ToolIdx,
        column: ColIdx,
        title: String,
    },
    /// The task-id pseudo-column.
    TaskId,
    /// The cross-tool diff pseudo-column.
    Diff,
}

impl FilterTarget {
    /// Parse a selection id. Returns `None` for ids of no known shape.
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            TASK_ID_FILTER => return Some(Self::TaskId),
            DIFF_FILTER => return Some(Self::Diff),
            _ => {}
        }
        // The title sits between the first and last underscore and may
        // itself contain underscores.
        let (rest, col) = id.rsplit_once('_')?;
        let (tool, title) = rest.split_once('_').unwrap_or((rest, ""));
        Some(Self::Column {
            tool: ToolIdx::new(tool.parse().ok()?),
            column: ColIdx::new(col.parse().ok()?),
            title: title.to_owned(),
        })
    }
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(values.map(|vs| {
        vs.into_iter()
            .filter_map(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            })
            .collect()
    }))
}
