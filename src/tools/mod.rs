//! The agent-facing operation vocabulary.
//!
//! Each tool has a parameter struct that doubles as its advertised JSON schema.
//! [`Operation::decode`] validates a raw tool-call payload against that struct and
//! produces a closed [`Operation`] value; nothing past this boundary inspects raw
//! JSON. Coordinates stay unclamped here and are resolved against the live sheet
//! bounds at execution time.

pub mod param_enums;

use crate::errors::InvalidParamsError;
use crate::model::{CellContent, ChartSeries, FormatPatch, Scalar, normalize_formula};
use crate::range::{
    self, MAX_SHEET_COLS, MAX_SHEET_ROWS, Range, SheetBounds, cell_label, col_label,
    parse_col_label, parse_range_ref,
};
use crate::styles::normalize_color_hex;
use param_enums::{ChartKind, ConditionalRule, FreezeMode};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolKind {
    WriteCell,
    WriteRange,
    SetFormula,
    FormatCells,
    InsertRow,
    InsertColumn,
    AddSheet,
    RenameSheet,
    ClearRange,
    SetColumnWidth,
    MergeCells,
    FreezePanes,
    ConditionalFormat,
    AddChart,
}

impl ToolKind {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Accepts `write_cell` as well as `writeCell` / `WriteCell`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Ok(kind) = Self::from_str(name) {
            return Some(kind);
        }
        let mut snake = String::with_capacity(name.len() + 4);
        for (idx, ch) in name.chars().enumerate() {
            if ch.is_ascii_uppercase() {
                if idx > 0 {
                    snake.push('_');
                }
                snake.push(ch.to_ascii_lowercase());
            } else if ch == '-' {
                snake.push('_');
            } else {
                snake.push(ch);
            }
        }
        Self::from_str(&snake).ok()
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::WriteCell => {
                "Write a value to one cell. Text starting with '=' is stored as a formula."
            }
            Self::WriteRange => {
                "Write a 2D array of values starting at (startRow, startCol). Ragged rows are padded; null leaves a cell untouched."
            }
            Self::SetFormula => "Write an Excel formula to one cell.",
            Self::FormatCells => {
                "Apply bold, background color and/or text color to a range. Omitted fields are left unchanged."
            }
            Self::InsertRow => "Insert `count` rows before row `index`.",
            Self::InsertColumn => "Insert `count` columns before column `index`.",
            Self::AddSheet => "Add a sheet and make it the active sheet.",
            Self::RenameSheet => "Rename the sheet at index `sheet`, or the active sheet.",
            Self::ClearRange => "Clear values, formulas and formatting in a range.",
            Self::SetColumnWidth => {
                "Set pixel widths for columns, keyed by zero-based index or column letter."
            }
            Self::MergeCells => "Merge a range into one cell, replacing overlapping merges.",
            Self::FreezePanes => {
                "Freeze rows through `row` and/or columns through `column` depending on mode."
            }
            Self::ConditionalFormat => {
                "Color numeric cells in a range by rule: color_scale, highlight_above, highlight_below or highlight_negative."
            }
            Self::AddChart => "Add a chart built from category labels and named numeric series.",
        }
    }

    pub fn input_schema(self) -> Value {
        match self {
            Self::WriteCell => schema_value::<WriteCellParams>(),
            Self::WriteRange => schema_value::<WriteRangeParams>(),
            Self::SetFormula => schema_value::<SetFormulaParams>(),
            Self::FormatCells => schema_value::<FormatCellsParams>(),
            Self::InsertRow | Self::InsertColumn => schema_value::<InsertParams>(),
            Self::AddSheet => schema_value::<AddSheetParams>(),
            Self::RenameSheet => schema_value::<RenameSheetParams>(),
            Self::ClearRange | Self::MergeCells => schema_value::<RangeParams>(),
            Self::SetColumnWidth => schema_value::<SetColumnWidthParams>(),
            Self::FreezePanes => schema_value::<FreezePanesParams>(),
            Self::ConditionalFormat => schema_value::<ConditionalFormatParams>(),
            Self::AddChart => schema_value::<AddChartParams>(),
        }
    }
}

fn schema_value<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

/// What the agent service is told about one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolKind::iter()
        .map(|kind| ToolDefinition {
            name: kind.name(),
            description: kind.description(),
            input_schema: kind.input_schema(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parameter structs (wire shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteCellParams {
    /// Sheet index (0-based); defaults to the active sheet
    #[serde(default)]
    pub sheet: Option<i64>,
    /// Row index (0-based)
    pub row: i64,
    /// Column index (0-based)
    pub col: i64,
    /// Value or formula to write
    pub value: Scalar,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteRangeParams {
    /// Sheet index (0-based); defaults to the active sheet
    #[serde(default)]
    pub sheet: Option<i64>,
    pub start_row: i64,
    pub start_col: i64,
    /// Rows of values; null leaves the target cell untouched
    pub values: Vec<Vec<Option<Scalar>>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetFormulaParams {
    /// Sheet index (0-based); defaults to the active sheet
    #[serde(default)]
    pub sheet: Option<i64>,
    pub row: i64,
    pub col: i64,
    /// Formula text, e.g. `=SUM(B2:B13)`
    pub formula: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RangeCoords {
    pub start_row: i64,
    pub start_col: i64,
    #[serde(default)]
    pub end_row: Option<i64>,
    #[serde(default)]
    pub end_col: Option<i64>,
}

/// A range given either as an A1 reference (`"A1:C4"`) or as coordinates.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RangeInput {
    A1(String),
    Coords(RangeCoords),
}

/// Target range, either nested under `range` or as top-level coordinates.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RangeFields {
    /// Sheet index (0-based); defaults to the active sheet
    #[serde(default)]
    pub sheet: Option<i64>,
    #[serde(default)]
    pub range: Option<RangeInput>,
    #[serde(default)]
    pub start_row: Option<i64>,
    #[serde(default)]
    pub start_col: Option<i64>,
    #[serde(default)]
    pub end_row: Option<i64>,
    #[serde(default)]
    pub end_col: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RangeParams {
    #[serde(flatten)]
    pub target: RangeFields,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormatFields {
    #[serde(default)]
    pub bold: Option<bool>,
    /// Hex fill color, e.g. `#112233`
    #[serde(default, alias = "background", alias = "bg")]
    pub background_color: Option<String>,
    /// Hex font color
    #[serde(default, alias = "color", alias = "fontColor")]
    pub text_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormatCellsParams {
    #[serde(flatten)]
    pub target: RangeFields,
    #[serde(flatten)]
    pub fields: FormatFields,
    /// Nested form `{ bold, color, background }`; top-level fields win.
    #[serde(default)]
    pub format: Option<FormatFields>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertParams {
    /// Sheet index (0-based); defaults to the active sheet
    #[serde(default)]
    pub sheet: Option<i64>,
    /// Insert before this zero-based index
    pub index: i64,
    /// Defaults to 1; at most 1048576 rows or 16384 columns
    #[serde(default)]
    pub count: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddSheetParams {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameSheetParams {
    /// Index of the sheet to rename; defaults to the active sheet
    #[serde(default)]
    pub sheet: Option<i64>,
    pub name: String,
}

/// A column given by zero-based index or by letter.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ColumnKey {
    Index(i64),
    Label(String),
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetColumnWidthParams {
    /// Sheet index (0-based); defaults to the active sheet
    #[serde(default)]
    pub sheet: Option<i64>,
    /// Map of column (index like "0" or letter like "B") to width in pixels
    #[serde(default)]
    pub columns: BTreeMap<String, f64>,
    /// Single-column form
    #[serde(default)]
    pub col: Option<ColumnKey>,
    #[serde(default)]
    pub width: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreezePanesParams {
    /// Sheet index (0-based); defaults to the active sheet
    #[serde(default)]
    pub sheet: Option<i64>,
    #[serde(default)]
    pub mode: FreezeMode,
    /// Last frozen row (0-based)
    #[serde(default)]
    pub row: Option<i64>,
    /// Last frozen column (0-based)
    #[serde(default, alias = "col")]
    pub column: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalFormatParams {
    #[serde(flatten)]
    pub target: RangeFields,
    pub rule: ConditionalRule,
    /// Defaults to 0
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Defaults to #c8e6c9
    #[serde(default)]
    pub color_high: Option<String>,
    /// Defaults to #ffcdd2
    #[serde(default)]
    pub color_low: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddChartParams {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", alias = "chartType")]
    pub kind: ChartKind,
    #[serde(default)]
    pub title: String,
    /// Category labels along the x axis
    #[serde(default, alias = "labels")]
    pub x_labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

// ---------------------------------------------------------------------------
// Decoded operations
// ---------------------------------------------------------------------------

/// An unclamped rectangle as the agent sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSpec {
    pub start_row: i64,
    pub start_col: i64,
    pub end_row: i64,
    pub end_col: i64,
}

impl RangeSpec {
    pub fn clamp(&self, bounds: SheetBounds) -> Range {
        range::clamp(
            bounds,
            self.start_row,
            self.start_col,
            self.end_row,
            self.end_col,
        )
    }

    fn label(&self) -> String {
        self.clamp(SheetBounds::new(u32::MAX, u32::MAX)).to_a1()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalFormatSpec {
    pub sheet: Option<i64>,
    pub range: RangeSpec,
    pub rule: ConditionalRule,
    pub threshold: Option<f64>,
    pub color_high: Option<String>,
    pub color_low: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub id: Option<String>,
    pub kind: ChartKind,
    pub title: String,
    pub x_labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    WriteCell {
        sheet: Option<i64>,
        row: i64,
        col: i64,
        value: CellContent,
    },
    WriteRange {
        sheet: Option<i64>,
        start_row: i64,
        start_col: i64,
        values: Vec<Vec<Option<CellContent>>>,
    },
    SetFormula {
        sheet: Option<i64>,
        row: i64,
        col: i64,
        formula: String,
    },
    FormatCells {
        sheet: Option<i64>,
        range: RangeSpec,
        patch: FormatPatch,
    },
    InsertRow {
        sheet: Option<i64>,
        index: i64,
        count: u32,
    },
    InsertColumn {
        sheet: Option<i64>,
        index: i64,
        count: u32,
    },
    AddSheet {
        name: Option<String>,
    },
    RenameSheet {
        sheet: Option<i64>,
        name: String,
    },
    ClearRange {
        sheet: Option<i64>,
        range: RangeSpec,
    },
    /// Column index to width in pixels.
    SetColumnWidth {
        sheet: Option<i64>,
        widths: BTreeMap<i64, f64>,
    },
    MergeCells {
        sheet: Option<i64>,
        range: RangeSpec,
    },
    FreezePanes {
        sheet: Option<i64>,
        mode: FreezeMode,
        row: Option<i64>,
        column: Option<i64>,
    },
    ConditionalFormat(ConditionalFormatSpec),
    AddChart(ChartSpec),
}

impl Operation {
    /// Validate a raw tool-call payload for `tool_name`.
    pub fn decode(tool_name: &str, input: &Value) -> Result<Self, InvalidParamsError> {
        let kind = ToolKind::parse(tool_name)
            .ok_or_else(|| InvalidParamsError::new(tool_name, "unknown tool"))?;
        let input = unwrap_string_payload(input);

        match kind {
            ToolKind::WriteCell => {
                let params: WriteCellParams = parse_params(kind, input)?;
                Ok(Self::WriteCell {
                    sheet: params.sheet,
                    row: params.row,
                    col: params.col,
                    value: CellContent::from_scalar(params.value),
                })
            }
            ToolKind::WriteRange => {
                let params: WriteRangeParams = parse_params(kind, input)?;
                let values = params
                    .values
                    .into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|value| value.map(CellContent::from_scalar))
                            .collect()
                    })
                    .collect();
                Ok(Self::WriteRange {
                    sheet: params.sheet,
                    start_row: params.start_row,
                    start_col: params.start_col,
                    values,
                })
            }
            ToolKind::SetFormula => {
                let params: SetFormulaParams = parse_params(kind, input)?;
                if params.formula.trim().trim_start_matches('=').is_empty() {
                    return Err(invalid(kind, "formula must not be empty").with_path("formula"));
                }
                Ok(Self::SetFormula {
                    sheet: params.sheet,
                    row: params.row,
                    col: params.col,
                    formula: normalize_formula(&params.formula),
                })
            }
            ToolKind::FormatCells => {
                let params: FormatCellsParams = parse_params(kind, input)?;
                let range = resolve_range(kind, &params.target)?;
                let nested = params.format.unwrap_or_default();
                let patch = FormatPatch {
                    bold: params.fields.bold.or(nested.bold),
                    background_color: color_field(
                        kind,
                        "backgroundColor",
                        params.fields.background_color.or(nested.background_color),
                    )?,
                    text_color: color_field(
                        kind,
                        "textColor",
                        params.fields.text_color.or(nested.text_color),
                    )?,
                };
                Ok(Self::FormatCells {
                    sheet: params.target.sheet,
                    range,
                    patch,
                })
            }
            ToolKind::InsertRow | ToolKind::InsertColumn => {
                let params: InsertParams = parse_params(kind, input)?;
                let limit = if kind == ToolKind::InsertRow {
                    MAX_SHEET_ROWS
                } else {
                    MAX_SHEET_COLS
                };
                let count = params.count.unwrap_or(1).max(1);
                if count > i64::from(limit) {
                    return Err(invalid(
                        kind,
                        format!("count {count} exceeds the sheet limit of {limit}"),
                    )
                    .with_path("count"));
                }
                let count = count as u32;
                if kind == ToolKind::InsertRow {
                    Ok(Self::InsertRow {
                        sheet: params.sheet,
                        index: params.index,
                        count,
                    })
                } else {
                    Ok(Self::InsertColumn {
                        sheet: params.sheet,
                        index: params.index,
                        count,
                    })
                }
            }
            ToolKind::AddSheet => {
                let params: AddSheetParams = if input.is_null() {
                    AddSheetParams::default()
                } else {
                    parse_params(kind, input)?
                };
                let name = params
                    .name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty());
                Ok(Self::AddSheet { name })
            }
            ToolKind::RenameSheet => {
                let params: RenameSheetParams = parse_params(kind, input)?;
                let name = params.name.trim().to_string();
                if name.is_empty() {
                    return Err(invalid(kind, "sheet name must not be empty").with_path("name"));
                }
                Ok(Self::RenameSheet {
                    sheet: params.sheet,
                    name,
                })
            }
            ToolKind::ClearRange | ToolKind::MergeCells => {
                let params: RangeParams = parse_params(kind, input)?;
                let range = resolve_range(kind, &params.target)?;
                let sheet = params.target.sheet;
                if kind == ToolKind::ClearRange {
                    Ok(Self::ClearRange { sheet, range })
                } else {
                    Ok(Self::MergeCells { sheet, range })
                }
            }
            ToolKind::SetColumnWidth => {
                let params: SetColumnWidthParams = parse_params(kind, input)?;
                Ok(Self::SetColumnWidth {
                    sheet: params.sheet,
                    widths: resolve_widths(kind, params)?,
                })
            }
            ToolKind::FreezePanes => {
                let params: FreezePanesParams = parse_params(kind, input)?;
                Ok(Self::FreezePanes {
                    sheet: params.sheet,
                    mode: params.mode,
                    row: params.row,
                    column: params.column,
                })
            }
            ToolKind::ConditionalFormat => {
                let params: ConditionalFormatParams = parse_params(kind, input)?;
                if let Some(threshold) = params.threshold
                    && !threshold.is_finite()
                {
                    return Err(invalid(kind, "threshold must be finite").with_path("threshold"));
                }
                Ok(Self::ConditionalFormat(ConditionalFormatSpec {
                    sheet: params.target.sheet,
                    range: resolve_range(kind, &params.target)?,
                    rule: params.rule,
                    threshold: params.threshold,
                    color_high: color_field(kind, "colorHigh", params.color_high)?,
                    color_low: color_field(kind, "colorLow", params.color_low)?,
                }))
            }
            ToolKind::AddChart => {
                let params: AddChartParams = parse_params(kind, input)?;
                if params.series.is_empty() {
                    return Err(invalid(kind, "at least one series is required").with_path("series"));
                }
                for (idx, series) in params.series.iter().enumerate() {
                    if series.values.iter().any(|value| !value.is_finite()) {
                        return Err(invalid(kind, "series values must be finite numbers")
                            .with_path(format!("series[{idx}].values")));
                    }
                }
                Ok(Self::AddChart(ChartSpec {
                    id: params
                        .id
                        .map(|id| id.trim().to_string())
                        .filter(|id| !id.is_empty()),
                    kind: params.kind,
                    title: params.title,
                    x_labels: params.x_labels,
                    series: params.series,
                }))
            }
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::WriteCell { .. } => ToolKind::WriteCell,
            Self::WriteRange { .. } => ToolKind::WriteRange,
            Self::SetFormula { .. } => ToolKind::SetFormula,
            Self::FormatCells { .. } => ToolKind::FormatCells,
            Self::InsertRow { .. } => ToolKind::InsertRow,
            Self::InsertColumn { .. } => ToolKind::InsertColumn,
            Self::AddSheet { .. } => ToolKind::AddSheet,
            Self::RenameSheet { .. } => ToolKind::RenameSheet,
            Self::ClearRange { .. } => ToolKind::ClearRange,
            Self::SetColumnWidth { .. } => ToolKind::SetColumnWidth,
            Self::MergeCells { .. } => ToolKind::MergeCells,
            Self::FreezePanes { .. } => ToolKind::FreezePanes,
            Self::ConditionalFormat(_) => ToolKind::ConditionalFormat,
            Self::AddChart(_) => ToolKind::AddChart,
        }
    }

    /// Sheet index the agent asked for, if any. `None` means the active sheet.
    pub fn target_sheet(&self) -> Option<i64> {
        match self {
            Self::WriteCell { sheet, .. }
            | Self::WriteRange { sheet, .. }
            | Self::SetFormula { sheet, .. }
            | Self::FormatCells { sheet, .. }
            | Self::InsertRow { sheet, .. }
            | Self::InsertColumn { sheet, .. }
            | Self::RenameSheet { sheet, .. }
            | Self::ClearRange { sheet, .. }
            | Self::SetColumnWidth { sheet, .. }
            | Self::MergeCells { sheet, .. }
            | Self::FreezePanes { sheet, .. } => *sheet,
            Self::ConditionalFormat(spec) => spec.sheet,
            Self::AddSheet { .. } | Self::AddChart(_) => None,
        }
    }

    /// Short progress text shown next to the tool call, e.g. `Writing to B3...`.
    pub fn describe(&self) -> String {
        let label = |row: i64, col: i64| cell_label(coordinate(row), coordinate(col));
        match self {
            Self::WriteCell { row, col, .. } => format!("Writing to {}...", label(*row, *col)),
            Self::WriteRange {
                start_row,
                start_col,
                values,
                ..
            } => {
                let rows = i64::try_from(values.len()).unwrap_or(i64::MAX);
                let cols = values.iter().map(Vec::len).max().unwrap_or(0);
                let cols = i64::try_from(cols).unwrap_or(i64::MAX);
                let spec = RangeSpec {
                    start_row: *start_row,
                    start_col: *start_col,
                    end_row: start_row.saturating_add(rows.max(1) - 1),
                    end_col: start_col.saturating_add(cols.max(1) - 1),
                };
                format!("Writing values to {}...", spec.label())
            }
            Self::SetFormula { row, col, .. } => {
                format!("Adding formula to {}...", label(*row, *col))
            }
            Self::FormatCells { range, .. } => format!("Formatting {}...", range.label()),
            Self::InsertRow { index, count, .. } => format!(
                "Inserting {count} row(s) at row {}...",
                u64::from(coordinate(*index)) + 1
            ),
            Self::InsertColumn { index, count, .. } => format!(
                "Inserting {count} column(s) at column {}...",
                col_label(coordinate(*index))
            ),
            Self::AddSheet { name: Some(name) } => format!("Adding sheet \"{name}\"..."),
            Self::AddSheet { name: None } => "Adding sheet...".to_string(),
            Self::RenameSheet { name, .. } => format!("Renaming sheet to \"{name}\"..."),
            Self::ClearRange { range, .. } => format!("Clearing {}...", range.label()),
            Self::SetColumnWidth { .. } => "Setting column widths...".to_string(),
            Self::MergeCells { range, .. } => format!("Merging {}...", range.label()),
            Self::FreezePanes { mode, .. } => format!("Freezing panes ({mode})..."),
            Self::ConditionalFormat(spec) => {
                format!("Applying {} to {}...", spec.rule, spec.range.label())
            }
            Self::AddChart(spec) if !spec.title.is_empty() => {
                format!("Adding {} chart \"{}\"...", spec.kind, spec.title)
            }
            Self::AddChart(spec) => format!("Adding {} chart...", spec.kind),
        }
    }
}

/// Agent coordinate squeezed into the label space; never panics.
fn coordinate(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

fn invalid(kind: ToolKind, message: impl Into<String>) -> InvalidParamsError {
    InvalidParamsError::new(kind.name(), message)
}

/// Some transports deliver arguments as a JSON-encoded string.
fn unwrap_string_payload(input: &Value) -> std::borrow::Cow<'_, Value> {
    if let Value::String(raw) = input
        && let Ok(parsed) = serde_json::from_str::<Value>(raw)
        && parsed.is_object()
    {
        return std::borrow::Cow::Owned(parsed);
    }
    std::borrow::Cow::Borrowed(input)
}

fn parse_params<T: DeserializeOwned>(
    kind: ToolKind,
    input: std::borrow::Cow<'_, Value>,
) -> Result<T, InvalidParamsError> {
    if !input.is_object() {
        return Err(invalid(kind, "arguments must be a JSON object"));
    }
    serde_json::from_value(input.into_owned()).map_err(|err| invalid(kind, err.to_string()))
}

fn resolve_range(kind: ToolKind, fields: &RangeFields) -> Result<RangeSpec, InvalidParamsError> {
    match &fields.range {
        Some(RangeInput::A1(reference)) => {
            let (start, end) = parse_range_ref(reference).ok_or_else(|| {
                invalid(kind, format!("invalid range reference '{reference}'")).with_path("range")
            })?;
            Ok(RangeSpec {
                start_row: i64::from(start.row),
                start_col: i64::from(start.col),
                end_row: i64::from(end.row),
                end_col: i64::from(end.col),
            })
        }
        Some(RangeInput::Coords(coords)) => Ok(RangeSpec {
            start_row: coords.start_row,
            start_col: coords.start_col,
            end_row: coords.end_row.unwrap_or(coords.start_row),
            end_col: coords.end_col.unwrap_or(coords.start_col),
        }),
        None => match (fields.start_row, fields.start_col) {
            (Some(start_row), Some(start_col)) => Ok(RangeSpec {
                start_row,
                start_col,
                end_row: fields.end_row.unwrap_or(start_row),
                end_col: fields.end_col.unwrap_or(start_col),
            }),
            _ => Err(invalid(
                kind,
                "a range is required: pass `range` as \"A1:C4\" or {startRow, startCol, endRow, endCol}",
            )
            .with_path("range")),
        },
    }
}

fn color_field(
    kind: ToolKind,
    path: &str,
    raw: Option<String>,
) -> Result<Option<String>, InvalidParamsError> {
    match raw {
        None => Ok(None),
        Some(raw) => normalize_color_hex(&raw).map(Some).ok_or_else(|| {
            invalid(kind, format!("invalid color '{raw}'; expected hex like #112233"))
                .with_path(path)
        }),
    }
}

fn resolve_widths(
    kind: ToolKind,
    params: SetColumnWidthParams,
) -> Result<BTreeMap<i64, f64>, InvalidParamsError> {
    let mut widths = BTreeMap::new();

    for (key, width) in params.columns {
        let col = parse_column_key(&key).ok_or_else(|| {
            invalid(kind, format!("invalid column '{key}'")).with_path(format!("columns.{key}"))
        })?;
        widths.insert(col, check_width(kind, &format!("columns.{key}"), width)?);
    }

    match (params.col, params.width) {
        (Some(col), Some(width)) => {
            let col = match col {
                ColumnKey::Index(idx) => idx,
                ColumnKey::Label(label) => parse_column_key(&label).ok_or_else(|| {
                    invalid(kind, format!("invalid column '{label}'")).with_path("col")
                })?,
            };
            widths.insert(col, check_width(kind, "width", width)?);
        }
        (Some(_), None) => return Err(invalid(kind, "width is required").with_path("width")),
        (None, Some(_)) => return Err(invalid(kind, "col is required").with_path("col")),
        (None, None) => {}
    }

    if widths.is_empty() {
        return Err(invalid(kind, "no column widths given").with_path("columns"));
    }
    Ok(widths)
}

fn parse_column_key(key: &str) -> Option<i64> {
    let key = key.trim();
    if let Ok(idx) = key.parse::<i64>() {
        return Some(idx);
    }
    parse_col_label(key).map(i64::from)
}

fn check_width(kind: ToolKind, path: &str, width: f64) -> Result<f64, InvalidParamsError> {
    if width.is_finite() && width > 0.0 {
        Ok(width)
    } else {
        Err(invalid(kind, format!("width must be a positive number, got {width}")).with_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn tool_names_accept_snake_and_camel_case() {
        assert_eq!(ToolKind::parse("write_cell"), Some(ToolKind::WriteCell));
        assert_eq!(ToolKind::parse("writeRange"), Some(ToolKind::WriteRange));
        assert_eq!(ToolKind::parse("FreezePanes"), Some(ToolKind::FreezePanes));
        assert_eq!(ToolKind::parse("read_range"), None);
    }

    #[test]
    fn write_range_keeps_nulls_and_detects_formulas() {
        let op = Operation::decode(
            "write_range",
            &json!({"startRow": 0, "startCol": 1, "values": [["=A1*2", null], [3]]}),
        )
        .unwrap();
        assert_matches!(op, Operation::WriteRange { start_row: 0, start_col: 1, values, .. } => {
            assert_eq!(values[0][0], Some(CellContent::Formula("=A1*2".to_string())));
            assert_eq!(values[0][1], None);
            assert_eq!(values[1], vec![Some(CellContent::Value(Scalar::Number(3.0)))]);
        });
    }

    #[test]
    fn ranges_decode_from_a1_object_or_flat_fields() {
        let a1 = Operation::decode("clear_range", &json!({"range": "B2:C3"})).unwrap();
        let object = Operation::decode(
            "clear_range",
            &json!({"range": {"startRow": 1, "startCol": 1, "endRow": 2, "endCol": 2}}),
        )
        .unwrap();
        let flat = Operation::decode(
            "clear_range",
            &json!({"startRow": 1, "startCol": 1, "endRow": 2, "endCol": 2}),
        )
        .unwrap();
        assert_eq!(a1, object);
        assert_eq!(object, flat);

        let err = Operation::decode("merge_cells", &json!({"range": "nope"})).unwrap_err();
        assert_eq!(err.path(), Some("range"));
    }

    #[test]
    fn format_cells_builds_sparse_patch() {
        let op = Operation::decode(
            "format_cells",
            &json!({"range": "A1:B1", "format": {"bold": true, "background": "#ABC"}}),
        )
        .unwrap();
        assert_matches!(op, Operation::FormatCells { patch, .. } => {
            assert_eq!(patch.bold, Some(true));
            assert_eq!(patch.background_color.as_deref(), Some("#aabbcc"));
            assert_eq!(patch.text_color, None);
        });

        let err = Operation::decode("format_cells", &json!({"range": "A1", "textColor": "blue"}))
            .unwrap_err();
        assert_eq!(err.path(), Some("textColor"));
    }

    #[test]
    fn column_widths_accept_indices_and_letters() {
        let op = Operation::decode(
            "set_column_width",
            &json!({"columns": {"0": 110, "C": 90}}),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::SetColumnWidth {
                sheet: None,
                widths: BTreeMap::from([(0, 110.0), (2, 90.0)])
            }
        );

        let single = Operation::decode("set_column_width", &json!({"col": "B", "width": 80}))
            .unwrap();
        assert_eq!(
            single,
            Operation::SetColumnWidth {
                sheet: None,
                widths: BTreeMap::from([(1, 80.0)])
            }
        );

        assert!(Operation::decode("set_column_width", &json!({"columns": {}})).is_err());
        assert!(Operation::decode("set_column_width", &json!({"columns": {"A": -3}})).is_err());
    }

    #[test]
    fn insert_count_defaults_and_floors_at_one() {
        assert_eq!(
            Operation::decode("insert_row", &json!({"index": 4})).unwrap(),
            Operation::InsertRow {
                sheet: None,
                index: 4,
                count: 1
            }
        );
        assert_eq!(
            Operation::decode("insert_column", &json!({"sheet": 1, "index": 2, "count": 0}))
                .unwrap(),
            Operation::InsertColumn {
                sheet: Some(1),
                index: 2,
                count: 1
            }
        );
    }

    #[test]
    fn insert_count_is_capped_at_the_sheet_limit() {
        assert_matches!(
            Operation::decode("insert_row", &json!({"index": 0, "count": 1_048_576})),
            Ok(Operation::InsertRow { count: 1_048_576, .. })
        );
        let err = Operation::decode("insert_column", &json!({"index": 0, "count": 16_385}))
            .unwrap_err();
        assert_eq!(err.path(), Some("count"));
        assert!(Operation::decode("insert_row", &json!({"index": 0, "count": i64::MAX})).is_err());
    }

    #[test]
    fn descriptions_survive_extreme_coordinates() {
        let cases = [
            ("write_cell", json!({"row": i64::MAX, "col": i64::MIN, "value": 1})),
            ("write_range", json!({"startRow": i64::MAX, "startCol": i64::MAX, "values": [["x", "y"]]})),
            ("write_range", json!({"startRow": i64::MIN, "startCol": 0, "values": [["x"]]})),
            ("set_formula", json!({"row": i64::MIN, "col": i64::MAX, "formula": "=1"})),
            ("format_cells", json!({"startRow": i64::MIN, "startCol": 0, "endRow": i64::MAX, "endCol": i64::MAX, "bold": true})),
            ("insert_row", json!({"index": i64::MAX})),
            ("insert_column", json!({"index": i64::MIN})),
            ("clear_range", json!({"startRow": i64::MAX, "startCol": i64::MAX})),
            ("merge_cells", json!({"range": {"startRow": i64::MIN, "startCol": i64::MIN, "endRow": i64::MAX, "endCol": i64::MAX}})),
            ("conditional_format", json!({"startRow": 0, "startCol": 0, "endRow": i64::MAX, "endCol": i64::MAX, "rule": "color_scale"})),
        ];
        for (tool, input) in cases {
            let op = Operation::decode(tool, &input).unwrap();
            assert!(op.describe().ends_with("..."), "{tool}");
        }
        let op = Operation::decode("insert_row", &json!({"index": i64::MAX})).unwrap();
        assert_eq!(op.describe(), "Inserting 1 row(s) at row 4294967296...");
    }

    #[test]
    fn malformed_payloads_are_rejected_at_the_boundary() {
        assert!(Operation::decode("write_cell", &json!({"row": 1})).is_err());
        assert!(Operation::decode("write_cell", &json!("not an object")).is_err());
        assert!(Operation::decode("add_chart", &json!({"type": "bar", "series": []})).is_err());
        let err = Operation::decode("teleport", &json!({})).unwrap_err();
        assert_eq!(err.tool(), "teleport");
    }

    #[test]
    fn string_encoded_arguments_are_accepted() {
        let op = Operation::decode(
            "set_formula",
            &json!("{\"row\": 2, \"col\": 1, \"formula\": \"SUM(B1:B2)\"}"),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::SetFormula {
                sheet: None,
                row: 2,
                col: 1,
                formula: "=SUM(B1:B2)".to_string()
            }
        );
        assert_eq!(op.describe(), "Adding formula to B3...");
    }

    #[test]
    fn every_tool_has_an_object_schema() {
        let defs = tool_definitions();
        assert_eq!(defs.len(), 14);
        for def in defs {
            assert!(def.input_schema.is_object(), "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }
}
