use crate::model::FormatPatch;
use crate::range::Range;
use crate::tools::ConditionalFormatSpec;
use crate::tools::param_enums::ConditionalRule;
use crate::workbook::{Workbook, WorkbookResult};

pub const DEFAULT_COLOR_HIGH: &str = "#c8e6c9";
pub const DEFAULT_COLOR_LOW: &str = "#ffcdd2";
pub const DEFAULT_THRESHOLD: f64 = 0.0;

/// Which background a numeric cell should receive, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    High,
    Low,
}

/// Resolved rule parameters with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleParams {
    pub rule: ConditionalRule,
    pub threshold: f64,
    pub color_high: String,
    pub color_low: String,
}

impl RuleParams {
    pub fn from_spec(spec: &ConditionalFormatSpec) -> Self {
        Self {
            rule: spec.rule,
            threshold: spec.threshold.unwrap_or(DEFAULT_THRESHOLD),
            color_high: spec
                .color_high
                .clone()
                .unwrap_or_else(|| DEFAULT_COLOR_HIGH.to_string()),
            color_low: spec
                .color_low
                .clone()
                .unwrap_or_else(|| DEFAULT_COLOR_LOW.to_string()),
        }
    }

    fn color(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::High => &self.color_high,
            Bucket::Low => &self.color_low,
        }
    }
}

/// Assign buckets to the numeric values of a range.
///
/// `values` holds one entry per cell; `None` marks a non-numeric cell, which is
/// never touched. `color_scale` is a two-bucket split at the midpoint of the
/// numeric min and max, and does nothing when every number is equal.
pub fn classify(rule: ConditionalRule, threshold: f64, values: &[Option<f64>]) -> Vec<Option<Bucket>> {
    match rule {
        ConditionalRule::HighlightAbove => values
            .iter()
            .map(|value| value.filter(|v| *v > threshold).map(|_| Bucket::High))
            .collect(),
        ConditionalRule::HighlightBelow => values
            .iter()
            .map(|value| value.filter(|v| *v < threshold).map(|_| Bucket::Low))
            .collect(),
        ConditionalRule::HighlightNegative => values
            .iter()
            .map(|value| match value {
                Some(v) if *v < 0.0 => Some(Bucket::Low),
                Some(v) if *v > 0.0 => Some(Bucket::High),
                _ => None,
            })
            .collect(),
        ConditionalRule::ColorScale => {
            let numbers = values.iter().flatten().copied();
            let (min, max) = numbers.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
            if !min.is_finite() || !max.is_finite() || min == max {
                return vec![None; values.len()];
            }
            let mid = (min + max) / 2.0;
            values
                .iter()
                .map(|value| value.map(|v| if v >= mid { Bucket::High } else { Bucket::Low }))
                .collect()
        }
    }
}

/// Apply the rule to an already-clamped `range` on `sheet`.
///
/// Empty cells are never numeric, so only populated cells inside the range are
/// read. Returns how many cells received a background.
pub fn apply(
    workbook: &mut dyn Workbook,
    sheet: usize,
    range: Range,
    params: &RuleParams,
) -> WorkbookResult<usize> {
    let (coords, values): (Vec<_>, Vec<_>) = workbook
        .populated_cells(sheet)?
        .into_iter()
        .filter(|entry| range.contains(entry.row, entry.col))
        .map(|entry| ((entry.row, entry.col), entry.cell.as_number()))
        .unzip();

    let buckets = classify(params.rule, params.threshold, &values);
    let mut formatted = 0;
    for ((row, col), bucket) in coords.into_iter().zip(buckets) {
        let Some(bucket) = bucket else {
            continue;
        };
        let patch = FormatPatch::background(params.color(bucket));
        workbook.apply_format(sheet, Range::cell(row, col), &patch)?;
        formatted += 1;
    }

    Ok(formatted)
}
