//! Applies decoded operations to the active sheet of a workbook.
//!
//! Every operation runs inside its own failure boundary: host errors are logged
//! and reported through [`ExecutionOutcome`], never propagated, so one bad call
//! does not stop the rest of a turn.

use crate::highlight::HighlightScheduler;
use crate::model::{CellContent, ChartRecord, FrozenPanes};
use crate::range::{self, Range, SheetBounds, clamp_cell, rectangularize};
use crate::rules::conditional_format::{self, RuleParams};
use crate::tools::{ChartSpec, Operation};
use crate::utils::make_short_random_id;
use crate::workbook::{Workbook, WorkbookResult};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Applied,
    /// Nothing to do; the document is unchanged.
    Skipped { reason: String },
    /// The bulk write failed and the per-cell fallback wrote what it could.
    Recovered { written: usize, skipped: usize },
    Failed { error: String },
}

impl ExecutionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// The mutable state one operation may touch.
pub struct Workspace<'a> {
    pub workbook: &'a mut dyn Workbook,
    pub charts: &'a mut Vec<ChartRecord>,
    pub highlights: &'a mut HighlightScheduler,
}

pub fn execute(ws: &mut Workspace<'_>, op: &Operation, now: Instant) -> ExecutionOutcome {
    let tool = op.kind().name();
    let sheet = target_sheet(&*ws.workbook, op.target_sheet());
    match apply(ws, sheet, op, now) {
        Ok(outcome) => {
            match &outcome {
                ExecutionOutcome::Applied => info!(tool, sheet, "operation applied"),
                ExecutionOutcome::Skipped { reason } => {
                    debug!(tool, sheet, reason = %reason, "operation skipped")
                }
                ExecutionOutcome::Recovered { written, skipped } => {
                    warn!(tool, sheet, written, skipped, "bulk write recovered cell by cell")
                }
                ExecutionOutcome::Failed { error } => {
                    warn!(tool, sheet, error = %error, "operation failed")
                }
            }
            outcome
        }
        Err(err) => {
            warn!(tool, sheet, error = %err, "operation failed");
            ExecutionOutcome::Failed {
                error: err.to_string(),
            }
        }
    }
}

/// Requested sheet index clamped to the sheets that exist; the active sheet otherwise.
fn target_sheet(workbook: &dyn Workbook, requested: Option<i64>) -> usize {
    let last = workbook.sheet_count().saturating_sub(1);
    match requested {
        Some(index) => usize::try_from(index.max(0)).map_or(last, |index| index.min(last)),
        None => workbook.active_sheet(),
    }
}

fn apply(
    ws: &mut Workspace<'_>,
    sheet: usize,
    op: &Operation,
    now: Instant,
) -> WorkbookResult<ExecutionOutcome> {
    // AddChart never touches the document.
    if let Operation::AddChart(spec) = op {
        add_chart(ws.charts, spec);
        return Ok(ExecutionOutcome::Applied);
    }

    let bounds = ws.workbook.bounds(sheet)?;
    match op {
        Operation::WriteCell { row, col, value, .. } => {
            let target = clamp_cell(bounds, *row, *col);
            ws.workbook
                .set_cell(sheet, target.start_row, target.start_col, value.clone())?;
            ws.highlights.schedule(sheet, target, now);
            Ok(ExecutionOutcome::Applied)
        }
        Operation::SetFormula {
            row, col, formula, ..
        } => {
            let target = clamp_cell(bounds, *row, *col);
            ws.workbook.set_cell(
                sheet,
                target.start_row,
                target.start_col,
                CellContent::Formula(formula.clone()),
            )?;
            ws.highlights.schedule(sheet, target, now);
            Ok(ExecutionOutcome::Applied)
        }
        Operation::WriteRange {
            start_row,
            start_col,
            values,
            ..
        } => write_range(ws, sheet, bounds, *start_row, *start_col, values, now),
        Operation::FormatCells { range, patch, .. } => {
            if patch.is_empty() {
                return Ok(ExecutionOutcome::skipped("no formatting fields given"));
            }
            ws.workbook
                .apply_format(sheet, range.clamp(bounds), patch)?;
            Ok(ExecutionOutcome::Applied)
        }
        Operation::InsertRow { index, count, .. } => {
            let index = (*index).clamp(0, i64::from(bounds.rows)) as u32;
            ws.workbook.insert_rows(sheet, index, *count)?;
            Ok(ExecutionOutcome::Applied)
        }
        Operation::InsertColumn { index, count, .. } => {
            let index = (*index).clamp(0, i64::from(bounds.cols)) as u32;
            ws.workbook.insert_columns(sheet, index, *count)?;
            Ok(ExecutionOutcome::Applied)
        }
        Operation::AddSheet { name } => {
            let name = match name {
                Some(name) => unique_sheet_name(&*ws.workbook, name),
                None => ws.workbook.next_sheet_name(),
            };
            let created = ws.workbook.add_sheet(&name)?;
            ws.workbook.set_active_sheet(created)?;
            Ok(ExecutionOutcome::Applied)
        }
        Operation::RenameSheet { name, .. } => {
            ws.workbook.rename_sheet(sheet, name)?;
            Ok(ExecutionOutcome::Applied)
        }
        Operation::ClearRange { range, .. } => {
            ws.workbook.clear(sheet, range.clamp(bounds))?;
            Ok(ExecutionOutcome::Applied)
        }
        Operation::SetColumnWidth { widths, .. } => {
            for (col, width) in widths {
                let col = (*col).clamp(0, i64::from(bounds.max_col())) as u32;
                ws.workbook.set_column_width(sheet, col, *width)?;
            }
            Ok(ExecutionOutcome::Applied)
        }
        Operation::MergeCells { range, .. } => {
            let target = range.clamp(bounds);
            if target.is_single_cell() {
                return Ok(ExecutionOutcome::skipped(format!(
                    "{target} is a single cell; nothing to merge"
                )));
            }
            ws.workbook.merge(sheet, target)?;
            Ok(ExecutionOutcome::Applied)
        }
        Operation::FreezePanes {
            mode, row, column, ..
        } => {
            let panes = FrozenPanes {
                rows: if mode.freezes_rows() {
                    row.unwrap_or(0).clamp(0, i64::from(bounds.max_row())) as u32 + 1
                } else {
                    0
                },
                cols: if mode.freezes_columns() {
                    column.unwrap_or(0).clamp(0, i64::from(bounds.max_col())) as u32 + 1
                } else {
                    0
                },
            };
            ws.workbook.freeze(sheet, panes)?;
            Ok(ExecutionOutcome::Applied)
        }
        Operation::ConditionalFormat(spec) => {
            let target = spec.range.clamp(bounds);
            let params = RuleParams::from_spec(spec);
            let formatted = conditional_format::apply(ws.workbook, sheet, target, &params)?;
            debug!(rule = %spec.rule, range = %target, formatted, "conditional format evaluated");
            Ok(ExecutionOutcome::Applied)
        }
        Operation::AddChart(_) => Ok(ExecutionOutcome::Applied),
    }
}

fn write_range(
    ws: &mut Workspace<'_>,
    sheet: usize,
    bounds: SheetBounds,
    start_row: i64,
    start_col: i64,
    values: &[Vec<Option<CellContent>>],
    now: Instant,
) -> WorkbookResult<ExecutionOutcome> {
    let rect = rectangularize(values.to_vec());
    if rect.is_empty() {
        return Ok(ExecutionOutcome::skipped("no values to write"));
    }

    let anchor = clamp_cell(bounds, start_row, start_col);
    let rows = rect.rows().min((bounds.rows - anchor.start_row) as usize);
    let cols = rect.cols.min((bounds.cols - anchor.start_col) as usize);
    if rows < rect.rows() || cols < rect.cols {
        debug!(
            sheet,
            requested_rows = rect.rows(),
            requested_cols = rect.cols,
            rows,
            cols,
            "write_range payload truncated to sheet bounds"
        );
    }

    let grid: Vec<Vec<Option<CellContent>>> = rect
        .grid
        .into_iter()
        .take(rows)
        .map(|row| row.into_iter().take(cols).collect())
        .collect();
    let target = range::clamp(
        bounds,
        i64::from(anchor.start_row),
        i64::from(anchor.start_col),
        i64::from(anchor.start_row) + rows as i64 - 1,
        i64::from(anchor.start_col) + cols as i64 - 1,
    );

    match ws
        .workbook
        .set_cells(sheet, target.start_row, target.start_col, &grid)
    {
        Ok(()) => {
            ws.highlights.schedule(sheet, target, now);
            Ok(ExecutionOutcome::Applied)
        }
        Err(bulk_err) => {
            warn!(sheet, range = %target, error = %bulk_err, "bulk write rejected, falling back to per-cell writes");
            let (written, skipped) = write_cells_individually(ws.workbook, sheet, target, grid);
            if written == 0 {
                return Err(bulk_err);
            }
            ws.highlights.schedule(sheet, target, now);
            Ok(ExecutionOutcome::Recovered { written, skipped })
        }
    }
}

fn write_cells_individually(
    workbook: &mut dyn Workbook,
    sheet: usize,
    target: Range,
    grid: Vec<Vec<Option<CellContent>>>,
) -> (usize, usize) {
    let mut written = 0;
    let mut skipped = 0;
    for (dr, row) in grid.into_iter().enumerate() {
        for (dc, content) in row.into_iter().enumerate() {
            let Some(content) = content else {
                continue;
            };
            let (r, c) = (target.start_row + dr as u32, target.start_col + dc as u32);
            match workbook.set_cell(sheet, r, c, content) {
                Ok(()) => written += 1,
                Err(err) => {
                    debug!(sheet, cell = %range::cell_label(r, c), error = %err, "cell write skipped");
                    skipped += 1;
                }
            }
        }
    }
    (written, skipped)
}

fn unique_sheet_name(workbook: &dyn Workbook, requested: &str) -> String {
    if !workbook.has_sheet_named(requested) {
        return requested.to_string();
    }
    (2..)
        .map(|n| format!("{requested} ({n})"))
        .find(|candidate| !workbook.has_sheet_named(candidate))
        .unwrap_or_else(|| requested.to_string())
}

fn add_chart(charts: &mut Vec<ChartRecord>, spec: &ChartSpec) {
    let id = spec
        .id
        .clone()
        .unwrap_or_else(|| make_short_random_id("chart"));
    let record = ChartRecord {
        id,
        kind: spec.kind,
        title: spec.title.clone(),
        x_labels: spec.x_labels.clone(),
        series: spec.series.clone(),
    };
    // An agent reusing an id updates that chart in place.
    match charts.iter_mut().find(|existing| existing.id == record.id) {
        Some(existing) => *existing = record,
        None => charts.push(record),
    }
}
