use crate::tools::param_enums::ChartKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single agent-supplied cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view used by conditional formatting. Text is parsed after stripping
    /// thousands separators; booleans and unparsable text are not numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if n.is_finite() => Some(*n),
            Scalar::Number(_) | Scalar::Bool(_) => None,
            Scalar::Text(text) => {
                let cleaned: String = text.trim().chars().filter(|ch| *ch != ',').collect();
                if cleaned.is_empty() {
                    return None;
                }
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Text(text) if text.is_empty())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(true) => f.write_str("TRUE"),
            Scalar::Bool(false) => f.write_str("FALSE"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(f64::from(value))
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// What gets written into one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Value(Scalar),
    Formula(String),
}

impl CellContent {
    /// Text starting with `=` is a formula; everything else is a literal value.
    pub fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Text(text) if text.trim_start().starts_with('=') => {
                CellContent::Formula(text.trim_start().to_string())
            }
            other => CellContent::Value(other),
        }
    }

    pub fn formula(text: &str) -> Self {
        CellContent::Formula(normalize_formula(text))
    }
}

/// Formulas are stored with exactly one leading `=`.
pub fn normalize_formula(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with('=') {
        trimmed.to_string()
    } else {
        format!("={trimmed}")
    }
}

/// A cell as read back from the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cell {
    pub value: Option<Scalar>,
    pub formula: Option<String>,
}

impl Cell {
    pub fn value(value: impl Into<Scalar>) -> Self {
        Self {
            value: Some(value.into()),
            formula: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.formula.as_deref().is_none_or(str::is_empty)
            && self.value.as_ref().is_none_or(Scalar::is_blank)
    }

    /// Formula text wins over the value; an empty cell has no text.
    pub fn display_text(&self) -> Option<String> {
        if let Some(formula) = self.formula.as_deref()
            && !formula.is_empty()
        {
            return Some(formula.to_string());
        }
        self.value
            .as_ref()
            .map(Scalar::to_string)
            .filter(|text| !text.is_empty())
    }

    pub fn as_number(&self) -> Option<f64> {
        self.value.as_ref().and_then(Scalar::as_number)
    }
}

/// Formatting state of one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
}

impl CellFormat {
    pub fn is_default(&self) -> bool {
        *self == CellFormat::default()
    }
}

/// Sparse formatting update: `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatPatch {
    pub bold: Option<bool>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
}

impl FormatPatch {
    pub fn background(color: impl Into<String>) -> Self {
        Self {
            background_color: Some(color.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bold.is_none() && self.background_color.is_none() && self.text_color.is_none()
    }

    pub fn apply_to(&self, format: &mut CellFormat) {
        if let Some(bold) = self.bold {
            format.bold = bold;
        }
        if let Some(color) = &self.background_color {
            format.background_color = Some(color.clone());
        }
        if let Some(color) = &self.text_color {
            format.text_color = Some(color.clone());
        }
    }
}

/// Frozen pane counts; zero leaves that axis unfrozen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrozenPanes {
    pub rows: u32,
    pub cols: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChartSeries {
    pub name: String,
    #[serde(default)]
    pub values: Vec<f64>,
}

/// Chart produced by `add_chart`, consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
    pub x_labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}
