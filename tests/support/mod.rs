#![allow(dead_code)]
pub mod builders;

use spreadsheet_agent::errors::WorkbookError;
use spreadsheet_agent::model::{Cell, CellContent, CellFormat, FormatPatch, FrozenPanes};
use spreadsheet_agent::range::{Range, SheetBounds};
use spreadsheet_agent::workbook::{CellEntry, WorkbookResult};
use spreadsheet_agent::{MemoryWorkbook, Workbook};

/// Host whose bulk writes always fail and whose single-cell writes fail at
/// the listed coordinates. Everything else goes to a [`MemoryWorkbook`].
pub struct FlakyWorkbook {
    pub inner: MemoryWorkbook,
    pub rejected_cells: Vec<(u32, u32)>,
}

impl FlakyWorkbook {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            inner: MemoryWorkbook::new(rows, cols),
            rejected_cells: Vec::new(),
        }
    }

    pub fn rejecting(mut self, row: u32, col: u32) -> Self {
        self.rejected_cells.push((row, col));
        self
    }
}

impl Workbook for FlakyWorkbook {
    fn sheet_count(&self) -> usize {
        self.inner.sheet_count()
    }

    fn sheet_name(&self, sheet: usize) -> WorkbookResult<String> {
        self.inner.sheet_name(sheet)
    }

    fn active_sheet(&self) -> usize {
        self.inner.active_sheet()
    }

    fn set_active_sheet(&mut self, sheet: usize) -> WorkbookResult<()> {
        self.inner.set_active_sheet(sheet)
    }

    fn bounds(&self, sheet: usize) -> WorkbookResult<SheetBounds> {
        self.inner.bounds(sheet)
    }

    fn cell(&self, sheet: usize, row: u32, col: u32) -> WorkbookResult<Cell> {
        self.inner.cell(sheet, row, col)
    }

    fn populated_cells(&self, sheet: usize) -> WorkbookResult<Vec<CellEntry>> {
        self.inner.populated_cells(sheet)
    }

    fn format(&self, sheet: usize, row: u32, col: u32) -> WorkbookResult<CellFormat> {
        self.inner.format(sheet, row, col)
    }

    fn formatted_cells(&self, sheet: usize) -> WorkbookResult<Vec<(u32, u32, CellFormat)>> {
        self.inner.formatted_cells(sheet)
    }

    fn column_widths(&self, sheet: usize) -> WorkbookResult<Vec<(u32, f64)>> {
        self.inner.column_widths(sheet)
    }

    fn merged_ranges(&self, sheet: usize) -> WorkbookResult<Vec<Range>> {
        self.inner.merged_ranges(sheet)
    }

    fn frozen_panes(&self, sheet: usize) -> WorkbookResult<FrozenPanes> {
        self.inner.frozen_panes(sheet)
    }

    fn set_cell(
        &mut self,
        sheet: usize,
        row: u32,
        col: u32,
        content: CellContent,
    ) -> WorkbookResult<()> {
        if self.rejected_cells.contains(&(row, col)) {
            return Err(WorkbookError::Rejected(format!("cell {row},{col} is locked")));
        }
        self.inner.set_cell(sheet, row, col, content)
    }

    fn set_cells(
        &mut self,
        _sheet: usize,
        _row: u32,
        _col: u32,
        _grid: &[Vec<Option<CellContent>>],
    ) -> WorkbookResult<()> {
        Err(WorkbookError::Rejected("bulk writes unavailable".to_string()))
    }

    fn apply_format(&mut self, sheet: usize, range: Range, patch: &FormatPatch) -> WorkbookResult<()> {
        self.inner.apply_format(sheet, range, patch)
    }

    fn clear(&mut self, sheet: usize, range: Range) -> WorkbookResult<()> {
        self.inner.clear(sheet, range)
    }

    fn insert_rows(&mut self, sheet: usize, index: u32, count: u32) -> WorkbookResult<()> {
        self.inner.insert_rows(sheet, index, count)
    }

    fn insert_columns(&mut self, sheet: usize, index: u32, count: u32) -> WorkbookResult<()> {
        self.inner.insert_columns(sheet, index, count)
    }

    fn add_sheet(&mut self, name: &str) -> WorkbookResult<usize> {
        self.inner.add_sheet(name)
    }

    fn rename_sheet(&mut self, sheet: usize, name: &str) -> WorkbookResult<()> {
        self.inner.rename_sheet(sheet, name)
    }

    fn set_column_width(&mut self, sheet: usize, col: u32, width: f64) -> WorkbookResult<()> {
        self.inner.set_column_width(sheet, col, width)
    }

    fn merge(&mut self, sheet: usize, range: Range) -> WorkbookResult<()> {
        self.inner.merge(sheet, range)
    }

    fn freeze(&mut self, sheet: usize, panes: FrozenPanes) -> WorkbookResult<()> {
        self.inner.freeze(sheet, panes)
    }
}
