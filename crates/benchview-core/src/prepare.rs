//! Dataset preparation: raw payload to canonical [`Dataset`].

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::model::{lenient_string, ToolLimits};
use crate::{
    ColIdx, Column, ColumnKind, CoreError, Dataset, Extensions, Row, StatBlob, Tool, ToolIdx,
};

/// The payload as emitted by the table generator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,

    #[serde(default)]
    pub head: Value,

    #[serde(default)]
    pub tools: Vec<RawTool>,

    #[serde(default)]
    pub rows: Vec<Row>,

    #[serde(default)]
    pub stats: Vec<StatBlob>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

/// A tool before indices and column kinds are assigned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTool {
    #[serde(default)]
    pub tool: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub options: Option<String>,

    #[serde(flatten)]
    pub limits: ToolLimits,

    #[serde(default)]
    pub columns: Vec<RawColumn>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

/// A column with its producer type tag still unresolved.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawColumn {
    #[serde(default)]
    pub title: String,

    #[serde(rename = "type", default)]
    pub type_tag: Option<String>,

    #[serde(default)]
    pub unit: Option<String>,

    #[serde(default)]
    pub number_of_significant_digits: Option<u32>,

    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Normalise a raw payload into the canonical model.
///
/// Tool, column and row order are preserved. Stops at the first row or
/// column that violates the table's shape.
pub fn prepare(raw: RawPayload) -> Result<Dataset, CoreError> {
    let tools = raw
        .tools
        .into_iter()
        .enumerate()
        .map(|(tool_idx, tool)| prepare_tool(tool_idx, tool))
        .collect::<Result<Vec<_>, _>>()?;

    for (row_idx, row) in raw.rows.iter().enumerate() {
        check_row(row_idx, row, &tools)?;
    }

    debug!(
        tools = tools.len(),
        rows = raw.rows.len(),
        stats = raw.stats.len(),
        "Prepared dataset"
    );

    Ok(Dataset {
        version: raw.version,
        head: raw.head,
        tools,
        rows: raw.rows,
        stats: raw.stats,
        extensions: raw.extensions,
    })
}

fn prepare_tool(tool_idx: usize, raw: RawTool) -> Result<Tool, CoreError> {
    let columns = raw
        .columns
        .into_iter()
        .enumerate()
        .map(|(col_idx, col)| {
            let kind = ColumnKind::from_type_tag(col.type_tag.as_deref()).ok_or_else(|| {
                CoreError::UnknownColumnType {
                    tool: tool_idx,
                    column: col_idx,
                    kind: col.type_tag.clone().unwrap_or_default(),
                }
            })?;
            Ok(Column {
                col_idx: ColIdx::new(col_idx),
                title: col.title,
                kind,
                type_tag: col.type_tag,
                unit: col.unit,
                number_of_significant_digits: col.number_of_significant_digits,
                extensions: col.extensions,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    let score_based = columns
        .iter()
        .any(|c| c.title.eq_ignore_ascii_case("score"));

    Ok(Tool {
        tool_idx: ToolIdx::new(tool_idx),
        tool: raw.tool,
        version: raw.version,
        options: raw.options,
        limits: raw.limits,
        columns,
        score_based,
        extensions: raw.extensions,
    })
}

fn check_row(row_idx: usize, row: &Row, tools: &[Tool]) -> Result<(), CoreError> {
    if row.results.len() != tools.len() {
        return Err(CoreError::ResultCountMismatch {
            row: row_idx,
            expected: tools.len(),
            found: row.results.len(),
        });
    }
    for (tool, result) in tools.iter().zip(&row.results) {
        if result.values.len() != tool.columns.len() {
            return Err(CoreError::ValueCountMismatch {
                row: row_idx,
                tool: tool.tool_idx.get(),
                expected: tool.columns.len(),
                found: result.values.len(),
            });
        }
    }
    Ok(())
}
