//! Size-bounded text projection of the workbook, sent to the agent every turn.
//!
//! ```text
//! Sheet "Budget" (3 rows × 2 cols):
//!   A1: Month | Amount
//!   A3: Total | =SUM(B2:B2)
//! Sheet "Notes": empty
//! ```
//!
//! Every emitted character, newlines included, counts against `max_chars`. The
//! first line that would overflow is replaced by a truncation marker and nothing
//! further is emitted, so later sheets may be omitted entirely.

use crate::range::col_label;
use crate::workbook::{Workbook, WorkbookResult};
use ahash::AHashMap;

pub const EMPTY_SENTINEL: &str = "Empty spreadsheet.";
pub const TRUNCATION_MARKER: &str = "  ... (truncated for context limit)";

pub const MAX_TOKEN_ESTIMATE: usize = 6_000;
pub const AVG_CHARS_PER_TOKEN: usize = 4;
pub const DEFAULT_MAX_CHARS: usize = MAX_TOKEN_ESTIMATE * AVG_CHARS_PER_TOKEN;
pub const DEFAULT_ROW_CAP: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLimits {
    pub max_chars: usize,
    /// Rows at or past this index are never scanned.
    pub row_cap: u32,
}

impl Default for SnapshotLimits {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            row_cap: DEFAULT_ROW_CAP,
        }
    }
}

/// Never fails; host errors collapse to [`EMPTY_SENTINEL`].
pub fn serialize(workbook: &dyn Workbook, limits: SnapshotLimits) -> String {
    match try_serialize(workbook, limits) {
        Ok(text) if !text.is_empty() => text,
        Ok(_) => EMPTY_SENTINEL.to_string(),
        Err(err) => {
            tracing::warn!(error = %err, "snapshot failed; sending empty sentinel");
            EMPTY_SENTINEL.to_string()
        }
    }
}

struct Budget {
    out: String,
    used: usize,
    max: usize,
    truncated: bool,
}

impl Budget {
    fn new(max: usize) -> Self {
        Self {
            out: String::new(),
            used: 0,
            max,
            truncated: false,
        }
    }

    /// Characters the next line may use, after its leading newline.
    fn remaining(&self) -> usize {
        let separator = usize::from(!self.out.is_empty());
        self.max.saturating_sub(self.used + separator)
    }

    fn truncate(&mut self) {
        if self.truncated {
            return;
        }
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        self.out.push_str(TRUNCATION_MARKER);
        self.truncated = true;
    }

    /// Append one line, or the marker if it would not fit. Returns false once truncated.
    fn push_line(&mut self, line: &str) -> bool {
        if self.truncated {
            return false;
        }
        let separator = usize::from(!self.out.is_empty());
        let cost = separator + line.chars().count();
        if self.used + cost > self.max {
            self.truncate();
            return false;
        }
        if separator == 1 {
            self.out.push('\n');
        }
        self.out.push_str(line);
        self.used += cost;
        true
    }
}

fn try_serialize(workbook: &dyn Workbook, limits: SnapshotLimits) -> WorkbookResult<String> {
    let mut budget = Budget::new(limits.max_chars);

    for sheet in 0..workbook.sheet_count() {
        let name = workbook.sheet_name(sheet)?;
        let name = if name.is_empty() {
            format!("Sheet{}", sheet + 1)
        } else {
            name
        };

        let mut rows: AHashMap<u32, Vec<(u32, String)>> = AHashMap::new();
        let mut extent: Option<(u32, u32)> = None;
        for entry in workbook.populated_cells(sheet)? {
            let Some(text) = entry.cell.display_text() else {
                continue;
            };
            let (max_row, max_col) = extent.unwrap_or((0, 0));
            extent = Some((max_row.max(entry.row), max_col.max(entry.col)));
            if entry.row < limits.row_cap {
                rows.entry(entry.row).or_default().push((entry.col, text));
            }
        }

        let Some((max_row, max_col)) = extent else {
            if !budget.push_line(&format!("Sheet \"{name}\": empty")) {
                break;
            }
            continue;
        };

        let header = format!(
            "Sheet \"{name}\" ({} rows × {} cols):",
            u64::from(max_row) + 1,
            u64::from(max_col) + 1
        );
        if !budget.push_line(&header) {
            break;
        }

        let mut row_keys: Vec<u32> = rows.keys().copied().collect();
        row_keys.sort_unstable();
        for row in row_keys {
            let mut cells = rows.remove(&row).unwrap_or_default();
            cells.sort_unstable_by_key(|(col, _)| *col);
            let Some(line) = render_row(row, &cells, max_col, budget.remaining()) else {
                budget.truncate();
                break;
            };
            if !budget.push_line(&line) {
                break;
            }
        }

        if budget.truncated {
            break;
        }
    }

    Ok(budget.out)
}

/// One row line padded with empty fields out to `max_col`, or `None` as soon as
/// it grows past `limit` characters. Sparse rows on very wide sheets are never
/// expanded further than the budget allows.
fn render_row(row: u32, cells: &[(u32, String)], max_col: u32, limit: usize) -> Option<String> {
    let mut line = format!("  {}{}: ", col_label(0), u64::from(row) + 1);
    let mut len = line.chars().count();
    let mut next = cells.iter().peekable();
    for col in 0..=max_col {
        if col > 0 {
            line.push_str(" | ");
            len += 3;
        }
        if let Some((_, text)) = next.next_if(|(c, _)| *c == col) {
            line.push_str(text);
            len += text.chars().count();
        }
        if len > limit {
            return None;
        }
    }
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryWorkbook;
    use crate::model::{CellContent, Scalar};

    fn write(book: &mut MemoryWorkbook, row: u32, col: u32, value: &str) {
        book.set_cell(0, row, col, CellContent::from_scalar(Scalar::from(value)))
            .unwrap();
    }

    #[test]
    fn renders_headers_rows_and_empty_sheets() {
        let mut book = MemoryWorkbook::new(10, 5);
        write(&mut book, 0, 0, "Month");
        write(&mut book, 0, 1, "Amount");
        write(&mut book, 2, 1, "=SUM(B2:B2)");
        book.add_sheet("Notes").unwrap();

        let text = serialize(&book, SnapshotLimits::default());
        assert_eq!(
            text,
            "Sheet \"Sheet1\" (3 rows × 2 cols):\n  A1: Month | Amount\n  A3:  | =SUM(B2:B2)\nSheet \"Notes\": empty"
        );
    }

    #[test]
    fn truncates_with_single_marker_inside_budget() {
        let mut book = MemoryWorkbook::new(200, 5);
        for row in 0..150 {
            write(&mut book, row, 0, "some fairly long value to fill the budget");
        }
        let limits = SnapshotLimits {
            max_chars: 500,
            row_cap: 200,
        };
        let text = serialize(&book, limits);
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(text.matches("truncated").count(), 1);
        assert!(text.chars().count() <= 500 + 1 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn rows_past_cap_are_not_scanned() {
        let mut book = MemoryWorkbook::new(300, 2);
        write(&mut book, 0, 0, "top");
        write(&mut book, 250, 0, "deep");
        let text = serialize(
            &book,
            SnapshotLimits {
                max_chars: 10_000,
                row_cap: 200,
            },
        );
        assert!(text.contains("(251 rows × 1 cols)"));
        assert!(text.contains("top"));
        assert!(!text.contains("deep"));
    }

    #[test]
    fn workbook_without_sheets_yields_sentinel() {
        let book = MemoryWorkbook::empty(10, 10);
        assert_eq!(serialize(&book, SnapshotLimits::default()), EMPTY_SENTINEL);
    }

    #[test]
    fn far_right_cell_on_a_maximal_sheet_stops_at_the_budget() {
        use crate::range::{MAX_SHEET_COLS, MAX_SHEET_ROWS};

        let mut book = MemoryWorkbook::new(MAX_SHEET_ROWS, MAX_SHEET_COLS);
        for row in 0..200 {
            write(&mut book, row, MAX_SHEET_COLS - 1, "edge");
        }
        let text = serialize(&book, SnapshotLimits::default());
        assert!(text.starts_with("Sheet \"Sheet1\" (200 rows × 16384 cols):"));
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert!(text.chars().count() <= DEFAULT_MAX_CHARS + 1 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn padded_row_that_fits_is_kept_whole() {
        let mut book = MemoryWorkbook::new(5, 5);
        write(&mut book, 0, 3, "d");
        let text = serialize(&book, SnapshotLimits::default());
        assert_eq!(text, "Sheet \"Sheet1\" (1 rows × 4 cols):\n  A1:  |  |  | d");
    }
}
