//! Matcher compilation and row evaluation.
//!
//! A [`Matcher`] is compiled from the active selection list whenever it
//! changes and never mutated afterwards. Within one column, discrete
//! predicates are alternatives; across columns, every group must hold.
//! The diff and task-id predicates are independent of the column groups and
//! are combined with them by AND.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::selection::DEFAULT_DIFF_COLUMN;
use crate::{
    ColIdx, ColumnKind, Dataset, FilterSelection, FilterTarget, RawValue, Row, RunResult, ToolIdx,
};

/// A discrete predicate on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnPredicate {
    /// The result's category equals the value.
    Category { value: String },
    /// The raw status equals the value.
    Status { value: String },
    /// The raw text equals the value.
    Text { value: String },
}

impl ColumnPredicate {
    fn matches(&self, result: Option<&RunResult>, raw: Option<&RawValue>) -> bool {
        match self {
            Self::Category { value } => {
                result.is_some_and(|r| r.category.as_str() == value.as_str())
            }
            Self::Status { value } | Self::Text { value } => {
                raw.is_some_and(|raw| raw.to_string() == *value)
            }
        }
    }
}

/// Inclusive numeric range; an open side is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    /// Create a new range.
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Whether the value is a finite number within the range.
    pub fn contains(&self, raw: Option<&RawValue>) -> bool {
        let Some(n) = raw.and_then(RawValue::as_number) else {
            return false;
        };
        self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max)
    }

    /// Parse a selection: `"min:max"` with optional sides, a `[min, max]`
    /// value pair, or a single exact value.
    fn from_selection(sel: &FilterSelection) -> Option<Self> {
        fn bound(s: &str) -> Option<Option<f64>> {
            let s = s.trim();
            if s.is_empty() {
                return Some(None);
            }
            s.parse::<f64>().ok().filter(|n| !n.is_nan()).map(Some)
        }

        if let Some((min, max)) = sel.value.as_deref().and_then(|v| v.split_once(':')) {
            return Some(Self::new(bound(min)?, bound(max)?));
        }
        let values: Vec<&str> = sel.selected().collect();
        match values.as_slice() {
            [min, max] => Some(Self::new(bound(min)?, bound(max)?)),
            [exact] => {
                let n = bound(exact)??;
                Some(Self::new(Some(n), Some(n)))
            }
            _ => None,
        }
    }
}

/// All constraints on one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnGroup {
    /// At least one predicate must hold.
    Discrete { predicates: Vec<ColumnPredicate> },
    /// The value must lie in the range.
    Range { range: NumericRange },
}

impl ColumnGroup {
    fn matches(&self, result: Option<&RunResult>, raw: Option<&RawValue>) -> bool {
        match self {
            Self::Discrete { predicates } => predicates.iter().any(|p| p.matches(result, raw)),
            Self::Range { range } => range.contains(raw),
        }
    }
}

/// Rows where two tools disagree on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffPredicate {
    pub left: ToolIdx,
    pub right: ToolIdx,
    /// Title of the compared column.
    pub title: String,
    pub left_col: ColIdx,
    pub right_col: ColIdx,
}

impl DiffPredicate {
    /// Whether the two raw values differ. Numbers compare numerically,
    /// everything else as strings; an absent value reads as empty.
    pub fn holds(&self, row: &Row) -> bool {
        let left = row.raw(self.left, self.left_col);
        let right = row.raw(self.right, self.right_col);
        match (
            left.and_then(RawValue::as_number),
            right.and_then(RawValue::as_number),
        ) {
            (Some(l), Some(r)) => l != r,
            _ => display(left) != display(right),
        }
    }
}

fn display(raw: Option<&RawValue>) -> String {
    raw.map(ToString::to_string).unwrap_or_default()
}

/// Compiled form of a selection list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Matcher {
    pub columns: BTreeMap<ToolIdx, BTreeMap<ColIdx, ColumnGroup>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_substring: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffPredicate>,
}

impl Matcher {
    /// Compile selections against the dataset's columns.
    ///
    /// Selections that refer to tools or columns the dataset lacks, or whose
    /// values cannot be interpreted, impose no constraint.
    pub fn compile(selections: &[FilterSelection], dataset: &Dataset) -> Self {
        let mut matcher = Self::default();

        for sel in selections {
            match sel.target() {
                None => debug!(id = %sel.id, "Ignoring selection with unrecognised id"),
                Some(FilterTarget::TaskId) => {
                    matcher.id_substring = sel.value.clone().filter(|v| !v.is_empty());
                }
                Some(FilterTarget::Diff) => {
                    matcher.diff = compile_diff(sel, dataset);
                }
                Some(FilterTarget::Column { tool, column, .. }) => {
                    matcher.add_column_selection(sel, tool, column, dataset);
                }
            }
        }

        matcher
    }

    fn add_column_selection(
        &mut self,
        sel: &FilterSelection,
        tool: ToolIdx,
        col: ColIdx,
        dataset: &Dataset,
    ) {
        let Some(column) = dataset.column(tool, col) else {
            debug!(id = %sel.id, "Ignoring selection for a column not in the dataset");
            return;
        };

        let predicates: Vec<ColumnPredicate> = match column.kind {
            ColumnKind::Numeric => {
                match NumericRange::from_selection(sel) {
                    Some(range) => {
                        // At most one range per column; the latest wins.
                        self.columns
                            .entry(tool)
                            .or_default()
                            .insert(col, ColumnGroup::Range { range });
                    }
                    None => debug!(id = %sel.id, "Ignoring unparseable numeric selection"),
                }
                return;
            }
            ColumnKind::Status => sel
                .selected()
                .map(|v| match v.strip_suffix(' ') {
                    // A trailing space marks a category in the interchange format.
                    Some(category) => ColumnPredicate::Category {
                        value: category.to_owned(),
                    },
                    None => ColumnPredicate::Status {
                        value: v.to_owned(),
                    },
                })
                .collect(),
            ColumnKind::Text => sel
                .selected()
                .map(|v| ColumnPredicate::Text {
                    value: v.to_owned(),
                })
                .collect(),
        };
        if predicates.is_empty() {
            return;
        }

        let group = self
            .columns
            .entry(tool)
            .or_default()
            .entry(col)
            .or_insert_with(|| ColumnGroup::Discrete {
                predicates: Vec::new(),
            });
        if let ColumnGroup::Discrete { predicates: existing } = group {
            existing.extend(predicates);
        }
    }

    /// Whether no predicate is active.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.id_substring.is_none() && self.diff.is_none()
    }

    /// Whether the row passes every active predicate.
    pub fn matches(&self, row: &Row) -> bool {
        if let Some(text) = &self.id_substring {
            if !row.id_path().contains(text.as_str()) {
                return false;
            }
        }
        if let Some(diff) = &self.diff {
            if !diff.holds(row) {
                return false;
            }
        }
        self.columns.iter().all(|(&tool, groups)| {
            let result = row.result(tool);
            groups
                .iter()
                .all(|(&col, group)| group.matches(result, row.raw(tool, col)))
        })
    }

    /// Indices of the matching rows, in dataset order.
    pub fn apply(&self, dataset: &Dataset) -> Vec<usize> {
        dataset
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.matches(row))
            .map(|(i, _)| i)
            .collect()
    }
}

fn compile_diff(sel: &FilterSelection, dataset: &Dataset) -> Option<DiffPredicate> {
    let tools: Vec<ToolIdx> = sel
        .values
        .iter()
        .flatten()
        .filter_map(|v| v.trim().parse().ok().map(ToolIdx::new))
        .collect();
    let [left, right] = tools.as_slice() else {
        debug!(id = %sel.id, "Ignoring diff selection without exactly two tools");
        return None;
    };
    let title = sel.value.as_deref().unwrap_or(DEFAULT_DIFF_COLUMN);

    let column = |tool: ToolIdx| {
        let Some(found) = dataset.tool(tool) else {
            debug!(id = %sel.id, tool = %tool, "Ignoring diff selection for a tool not in the dataset");
            return None;
        };
        let col = found.column_by_title(title).map(|c| c.col_idx);
        if col.is_none() {
            debug!(id = %sel.id, tool = %tool, title = %title, "Ignoring diff selection for a column the tool lacks");
        }
        col
    };
    let left_col = column(*left)?;
    let right_col = column(*right)?;
    Some(DiffPredicate {
        left: *left,
        right: *right,
        title: title.to_owned(),
        left_col,
        right_col,
    })
}

/// Indices of the rows of `dataset` that pass `selections`.
pub fn filter_rows(dataset: &Dataset, selections: &[FilterSelection]) -> Vec<usize> {
    Matcher::compile(selections, dataset).apply(dataset)
}
