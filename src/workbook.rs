//! The interface the executor and serializer need from the host spreadsheet engine.
//!
//! Sheets are addressed by position. Every coordinate handed to a mutating method
//! has already been clamped against [`Workbook::bounds`], but implementations still
//! reject out-of-bounds writes instead of growing silently.

use crate::errors::WorkbookError;
use crate::model::{Cell, CellContent, CellFormat, FormatPatch, FrozenPanes};
use crate::range::{Range, SheetBounds};

pub type WorkbookResult<T> = Result<T, WorkbookError>;

/// One populated cell as listed by [`Workbook::populated_cells`].
#[derive(Debug, Clone, PartialEq)]
pub struct CellEntry {
    pub row: u32,
    pub col: u32,
    pub cell: Cell,
}

pub trait Workbook {
    fn sheet_count(&self) -> usize;
    fn sheet_name(&self, sheet: usize) -> WorkbookResult<String>;
    fn active_sheet(&self) -> usize;
    fn set_active_sheet(&mut self, sheet: usize) -> WorkbookResult<()>;

    /// Current dimensions; these change with row/column insertion.
    fn bounds(&self, sheet: usize) -> WorkbookResult<SheetBounds>;

    fn cell(&self, sheet: usize, row: u32, col: u32) -> WorkbookResult<Cell>;
    /// Every non-empty cell of the sheet, in no particular order.
    fn populated_cells(&self, sheet: usize) -> WorkbookResult<Vec<CellEntry>>;
    fn format(&self, sheet: usize, row: u32, col: u32) -> WorkbookResult<CellFormat>;
    /// Cells whose formatting differs from the default.
    fn formatted_cells(&self, sheet: usize) -> WorkbookResult<Vec<(u32, u32, CellFormat)>>;
    fn column_widths(&self, sheet: usize) -> WorkbookResult<Vec<(u32, f64)>>;
    fn merged_ranges(&self, sheet: usize) -> WorkbookResult<Vec<Range>>;
    fn frozen_panes(&self, sheet: usize) -> WorkbookResult<FrozenPanes>;

    fn set_cell(&mut self, sheet: usize, row: u32, col: u32, content: CellContent)
    -> WorkbookResult<()>;
    /// Bulk write anchored at `(row, col)`. `None` entries leave the target untouched.
    fn set_cells(
        &mut self,
        sheet: usize,
        row: u32,
        col: u32,
        grid: &[Vec<Option<CellContent>>],
    ) -> WorkbookResult<()>;

    fn apply_format(&mut self, sheet: usize, range: Range, patch: &FormatPatch)
    -> WorkbookResult<()>;
    /// Remove values, formulas and formatting from every cell in `range`.
    fn clear(&mut self, sheet: usize, range: Range) -> WorkbookResult<()>;

    fn insert_rows(&mut self, sheet: usize, index: u32, count: u32) -> WorkbookResult<()>;
    fn insert_columns(&mut self, sheet: usize, index: u32, count: u32) -> WorkbookResult<()>;

    /// Append a sheet and return its index.
    fn add_sheet(&mut self, name: &str) -> WorkbookResult<usize>;
    fn rename_sheet(&mut self, sheet: usize, name: &str) -> WorkbookResult<()>;

    fn set_column_width(&mut self, sheet: usize, col: u32, width: f64) -> WorkbookResult<()>;
    /// Merge `range`, dropping any existing merge it overlaps.
    fn merge(&mut self, sheet: usize, range: Range) -> WorkbookResult<()>;
    fn freeze(&mut self, sheet: usize, panes: FrozenPanes) -> WorkbookResult<()>;

    fn sheet_names(&self) -> Vec<String> {
        (0..self.sheet_count())
            .filter_map(|idx| self.sheet_name(idx).ok())
            .collect()
    }

    fn has_sheet_named(&self, name: &str) -> bool {
        self.sheet_names()
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(name))
    }

    /// First `SheetN` name not already taken.
    fn next_sheet_name(&self) -> String {
        let mut n = self.sheet_count() + 1;
        loop {
            let candidate = format!("Sheet{n}");
            if !self.has_sheet_named(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
