use schemars::JsonSchema;
use serde::de;
use serde::{Deserialize, Serialize};
use std::fmt;

fn normalize_literal(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .flat_map(|ch| ch.to_lowercase())
        .collect()
}

fn levenshtein_distance(left: &str, right: &str) -> usize {
    if left.is_empty() {
        return right.chars().count();
    }
    if right.is_empty() {
        return left.chars().count();
    }

    let right_chars: Vec<char> = right.chars().collect();
    let mut previous: Vec<usize> = (0..=right_chars.len()).collect();
    let mut current = vec![0; right_chars.len() + 1];

    for (i, left_ch) in left.chars().enumerate() {
        current[0] = i + 1;
        for (j, right_ch) in right_chars.iter().enumerate() {
            let substitution_cost = usize::from(left_ch != *right_ch);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + substitution_cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right_chars.len()]
}

fn suggest_literal<'a>(input: &str, valid: &'a [&'a str]) -> Option<&'a str> {
    let normalized_input = normalize_literal(input);
    let mut best: Option<(&str, usize)> = None;

    for candidate in valid {
        let distance = levenshtein_distance(&normalized_input, &normalize_literal(candidate));
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    match best {
        Some((candidate, distance)) if distance <= 4 => Some(candidate),
        _ => None,
    }
}

fn enum_value_error(label: &str, input: &str, valid: &[&str], suggestion: Option<&str>) -> String {
    let valid_list = valid.join("|");
    match suggestion {
        Some(candidate) if !candidate.eq_ignore_ascii_case(input) => {
            format!("invalid {label} '{input}'. Did you mean '{candidate}'? valid: {valid_list}")
        }
        _ => format!("invalid {label} '{input}'. valid: {valid_list}"),
    }
}

fn unknown_literal<E: de::Error>(label: &str, input: &str, valid: &[&str]) -> E {
    E::custom(enum_value_error(
        label,
        input,
        valid,
        suggest_literal(input, valid),
    ))
}

/// Which panes `freeze_panes` locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum FreezeMode {
    Row,
    Column,
    #[default]
    Both,
}

impl FreezeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Column => "column",
            Self::Both => "both",
        }
    }

    pub fn freezes_rows(self) -> bool {
        matches!(self, Self::Row | Self::Both)
    }

    pub fn freezes_columns(self) -> bool {
        matches!(self, Self::Column | Self::Both)
    }
}

impl fmt::Display for FreezeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FreezeMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match normalize_literal(&s).as_str() {
            "row" | "rows" => Ok(Self::Row),
            "column" | "columns" | "col" | "cols" => Ok(Self::Column),
            "both" | "all" => Ok(Self::Both),
            _ => Err(unknown_literal("freeze mode", &s, &["row", "column", "both"])),
        }
    }
}

/// Rule applied by `conditional_format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalRule {
    ColorScale,
    HighlightAbove,
    HighlightBelow,
    HighlightNegative,
}

impl ConditionalRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ColorScale => "color_scale",
            Self::HighlightAbove => "highlight_above",
            Self::HighlightBelow => "highlight_below",
            Self::HighlightNegative => "highlight_negative",
        }
    }
}

impl fmt::Display for ConditionalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConditionalRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        // colorScale, color-scale and color_scale all normalize the same way.
        match normalize_literal(&s).as_str() {
            "colorscale" => Ok(Self::ColorScale),
            "highlightabove" | "above" => Ok(Self::HighlightAbove),
            "highlightbelow" | "below" => Ok(Self::HighlightBelow),
            "highlightnegative" | "negative" => Ok(Self::HighlightNegative),
            _ => Err(unknown_literal(
                "conditional format rule",
                &s,
                &[
                    "color_scale",
                    "highlight_above",
                    "highlight_below",
                    "highlight_negative",
                ],
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Area,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Pie => "pie",
            Self::Area => "area",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChartKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match normalize_literal(&s).as_str() {
            "bar" | "column" => Ok(Self::Bar),
            "line" => Ok(Self::Line),
            "pie" => Ok(Self::Pie),
            "area" => Ok(Self::Area),
            _ => Err(unknown_literal(
                "chart type",
                &s,
                &["bar", "line", "pie", "area"],
            )),
        }
    }
}
