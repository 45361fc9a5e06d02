//! Filter catalog: the universe of selectable filter values per column.
//!
//! Built in a single pass over all rows of a [`Dataset`]. The catalog is
//! read-only afterwards and only rebuilt when the dataset changes.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::{ColIdx, ColumnKind, Dataset, RawValue, ToolIdx};

/// Selectable values of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnFilter {
    /// Raw statuses and categories, tracked separately.
    Status {
        statuses: BTreeSet<String>,
        categories: BTreeSet<String>,
    },
    /// Distinct raw strings.
    Text { values: BTreeSet<String> },
    /// Range of all finite values; both `None` if no value was seen.
    Numeric { min: Option<f64>, max: Option<f64> },
}

impl ColumnFilter {
    fn empty(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Status => Self::Status {
                statuses: BTreeSet::new(),
                categories: BTreeSet::new(),
            },
            ColumnKind::Text => Self::Text {
                values: BTreeSet::new(),
            },
            ColumnKind::Numeric => Self::Numeric {
                min: None,
                max: None,
            },
        }
    }

    fn observe(&mut self, raw: Option<&RawValue>, category: &str) {
        match self {
            Self::Status {
                statuses,
                categories,
            } => {
                if let Some(raw) = raw {
                    statuses.insert(raw.to_string());
                }
                categories.insert(category.to_owned());
            }
            Self::Text { values } => {
                if let Some(raw) = raw {
                    values.insert(raw.to_string());
                }
            }
            Self::Numeric { min, max } => {
                // Absent or unparseable values do not contribute to the range.
                let Some(n) = raw.and_then(RawValue::as_number) else {
                    return;
                };
                *min = Some(min.map_or(n, |m| m.min(n)));
                *max = Some(max.map_or(n, |m| m.max(n)));
            }
        }
    }
}

/// A column title shared by several tools, which can be compared across them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffColumn {
    pub title: String,
    pub tools: Vec<ToolIdx>,
}

/// All available filters of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterCatalog {
    /// `columns[tool][col]`, aligned with the dataset's tools and columns.
    pub columns: Vec<Vec<ColumnFilter>>,

    /// Distinct task id segments per segment position.
    pub task_id_segments: Vec<BTreeSet<String>>,

    /// Columns that can be diffed between tools.
    pub diff_columns: Vec<DiffColumn>,
}

impl FilterCatalog {
    /// Derive the catalog from a prepared dataset.
    pub fn build(dataset: &Dataset) -> Self {
        let mut columns: Vec<Vec<ColumnFilter>> = dataset
            .tools
            .iter()
            .map(|t| t.columns.iter().map(|c| ColumnFilter::empty(c.kind)).collect())
            .collect();
        let mut task_id_segments: Vec<BTreeSet<String>> = Vec::new();

        for row in &dataset.rows {
            for (pos, segment) in row.id.iter().enumerate() {
                if task_id_segments.len() <= pos {
                    task_id_segments.push(BTreeSet::new());
                }
                task_id_segments[pos].insert(segment.clone());
            }

            for (filters, result) in columns.iter_mut().zip(&row.results) {
                let category = result.category.as_str();
                for (filter, cell) in filters.iter_mut().zip(&result.values) {
                    filter.observe(cell.raw.as_ref(), category);
                }
            }
        }

        let diff_columns = diff_columns(dataset);

        debug!(
            tools = columns.len(),
            id_positions = task_id_segments.len(),
            diff_columns = diff_columns.len(),
            "Built filter catalog"
        );

        Self {
            columns,
            task_id_segments,
            diff_columns,
        }
    }

    /// Filter values of one column.
    pub fn column(&self, tool: ToolIdx, col: ColIdx) -> Option<&ColumnFilter> {
        self.columns.get(tool.get())?.get(col.get())
    }

    /// `(min, max)` of a numeric column that has at least one value.
    pub fn numeric_range(&self, tool: ToolIdx, col: ColIdx) -> Option<(f64, f64)> {
        match self.column(tool, col)? {
            ColumnFilter::Numeric {
                min: Some(min),
                max: Some(max),
            } => Some((*min, *max)),
            _ => None,
        }
    }

    /// Whether the two tools can be diffed on the column with this title.
    pub fn can_diff(&self, left: ToolIdx, right: ToolIdx, title: &str) -> bool {
        left != right
            && self
                .diff_columns
                .iter()
                .any(|d| d.title == title && d.tools.contains(&left) && d.tools.contains(&right))
    }
}

fn diff_columns(dataset: &Dataset) -> Vec<DiffColumn> {
    let mut by_title: BTreeMap<&str, Vec<ToolIdx>> = BTreeMap::new();
    for tool in &dataset.tools {
        let mut seen = BTreeSet::new();
        for col in &tool.columns {
            if seen.insert(col.title.as_str()) {
                by_title.entry(col.title.as_str()).or_default().push(tool.tool_idx);
            }
        }
    }
    by_title
        .into_iter()
        .filter(|(_, tools)| tools.len() >= 2)
        .map(|(title, tools)| DiffColumn {
            title: title.to_owned(),
            tools,
        })
        .collect()
}
