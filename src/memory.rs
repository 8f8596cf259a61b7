//! In-process host engine: sparse sheets with values, formulas, formatting,
//! column widths, merges and frozen panes. No formula evaluation.

use crate::errors::WorkbookError;
use crate::model::{Cell, CellContent, CellFormat, FormatPatch, FrozenPanes};
use crate::range::{MAX_SHEET_COLS, MAX_SHEET_ROWS, Range, SheetBounds, cell_label, col_label};
use crate::workbook::{CellEntry, Workbook, WorkbookResult};
use std::collections::BTreeMap;

/// Largest range a single format patch may materialize cell by cell.
pub const MAX_FORMAT_CELLS: u64 = MAX_SHEET_ROWS as u64;

#[derive(Debug, Clone)]
pub struct MemorySheet {
    name: String,
    rows: u32,
    cols: u32,
    cells: BTreeMap<(u32, u32), Cell>,
    formats: BTreeMap<(u32, u32), CellFormat>,
    column_widths: BTreeMap<u32, f64>,
    merges: Vec<Range>,
    frozen: FrozenPanes,
}

impl MemorySheet {
    fn new(name: &str, rows: u32, cols: u32) -> Self {
        let bounds = SheetBounds::new(rows.min(MAX_SHEET_ROWS), cols.min(MAX_SHEET_COLS));
        Self {
            name: name.to_string(),
            rows: bounds.rows,
            cols: bounds.cols,
            cells: BTreeMap::new(),
            formats: BTreeMap::new(),
            column_widths: BTreeMap::new(),
            merges: Vec::new(),
            frozen: FrozenPanes::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> SheetBounds {
        SheetBounds::new(self.rows, self.cols)
    }

    pub fn merges(&self) -> &[Range] {
        &self.merges
    }

    pub fn frozen(&self) -> FrozenPanes {
        self.frozen
    }

    fn check(&self, row: u32, col: u32) -> WorkbookResult<()> {
        if self.bounds().contains(row, col) {
            Ok(())
        } else {
            Err(WorkbookError::OutOfBounds {
                address: cell_label(row, col),
            })
        }
    }

    fn write(&mut self, row: u32, col: u32, content: CellContent) {
        let cell = match content {
            CellContent::Value(value) => Cell {
                value: Some(value),
                formula: None,
            },
            CellContent::Formula(formula) => Cell {
                value: None,
                formula: Some(formula),
            },
        };
        if cell.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), cell);
        }
    }

    fn shift_rows(&mut self, index: u32, count: u32) {
        let shift = |(row, col): (u32, u32)| {
            if row >= index {
                (row.saturating_add(count), col)
            } else {
                (row, col)
            }
        };
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .map(|(key, cell)| (shift(key), cell))
            .collect();
        self.formats = std::mem::take(&mut self.formats)
            .into_iter()
            .map(|(key, format)| (shift(key), format))
            .collect();
        for merge in &mut self.merges {
            if merge.start_row >= index {
                merge.start_row = merge.start_row.saturating_add(count);
                merge.end_row = merge.end_row.saturating_add(count);
            } else if merge.end_row >= index {
                merge.end_row = merge.end_row.saturating_add(count);
            }
        }
        self.rows = self.rows.saturating_add(count);
    }

    fn shift_cols(&mut self, index: u32, count: u32) {
        let shift = |(row, col): (u32, u32)| {
            if col >= index {
                (row, col.saturating_add(count))
            } else {
                (row, col)
            }
        };
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .map(|(key, cell)| (shift(key), cell))
            .collect();
        self.formats = std::mem::take(&mut self.formats)
            .into_iter()
            .map(|(key, format)| (shift(key), format))
            .collect();
        self.column_widths = std::mem::take(&mut self.column_widths)
            .into_iter()
            .map(|(col, width)| {
                if col >= index {
                    (col.saturating_add(count), width)
                } else {
                    (col, width)
                }
            })
            .collect();
        for merge in &mut self.merges {
            if merge.start_col >= index {
                merge.start_col = merge.start_col.saturating_add(count);
                merge.end_col = merge.end_col.saturating_add(count);
            } else if merge.end_col >= index {
                merge.end_col = merge.end_col.saturating_add(count);
            }
        }
        self.cols = self.cols.saturating_add(count);
    }
}

#[derive(Debug, Clone)]
pub struct MemoryWorkbook {
    sheets: Vec<MemorySheet>,
    active: usize,
    default_rows: u32,
    default_cols: u32,
}

impl MemoryWorkbook {
    /// A workbook with a single empty `Sheet1`.
    pub fn new(default_rows: u32, default_cols: u32) -> Self {
        Self {
            sheets: vec![MemorySheet::new("Sheet1", default_rows, default_cols)],
            active: 0,
            default_rows,
            default_cols,
        }
    }

    /// A workbook with no sheets yet, for importers that add their own.
    pub fn empty(default_rows: u32, default_cols: u32) -> Self {
        Self {
            sheets: Vec::new(),
            active: 0,
            default_rows,
            default_cols,
        }
    }

    pub fn sheet(&self, sheet: usize) -> Option<&MemorySheet> {
        self.sheets.get(sheet)
    }

    /// Add a sheet with explicit dimensions without changing the active sheet.
    pub fn push_sheet(&mut self, name: &str, rows: u32, cols: u32) -> WorkbookResult<usize> {
        self.validate_new_name(name, None)?;
        self.sheets.push(MemorySheet::new(name, rows, cols));
        Ok(self.sheets.len() - 1)
    }

    fn sheet_ref(&self, sheet: usize) -> WorkbookResult<&MemorySheet> {
        self.sheets
            .get(sheet)
            .ok_or(WorkbookError::SheetNotFound(sheet))
    }

    fn sheet_mut(&mut self, sheet: usize) -> WorkbookResult<&mut MemorySheet> {
        self.sheets
            .get_mut(sheet)
            .ok_or(WorkbookError::SheetNotFound(sheet))
    }

    fn validate_new_name(&self, name: &str, except: Option<usize>) -> WorkbookResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkbookError::EmptySheetName);
        }
        let taken = self
            .sheets
            .iter()
            .enumerate()
            .any(|(idx, sheet)| Some(idx) != except && sheet.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(WorkbookError::DuplicateSheetName(name.to_string()));
        }
        Ok(())
    }
}

impl Workbook for MemoryWorkbook {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet_name(&self, sheet: usize) -> WorkbookResult<String> {
        Ok(self.sheet_ref(sheet)?.name.clone())
    }

    fn active_sheet(&self) -> usize {
        self.active
    }

    fn set_active_sheet(&mut self, sheet: usize) -> WorkbookResult<()> {
        self.sheet_ref(sheet)?;
        self.active = sheet;
        Ok(())
    }

    fn bounds(&self, sheet: usize) -> WorkbookResult<SheetBounds> {
        Ok(self.sheet_ref(sheet)?.bounds())
    }

    fn cell(&self, sheet: usize, row: u32, col: u32) -> WorkbookResult<Cell> {
        Ok(self
            .sheet_ref(sheet)?
            .cells
            .get(&(row, col))
            .cloned()
            .unwrap_or_default())
    }

    fn populated_cells(&self, sheet: usize) -> WorkbookResult<Vec<CellEntry>> {
        Ok(self
            .sheet_ref(sheet)?
            .cells
            .iter()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(&(row, col), cell)| CellEntry {
                row,
                col,
                cell: cell.clone(),
            })
            .collect())
    }

    fn format(&self, sheet: usize, row: u32, col: u32) -> WorkbookResult<CellFormat> {
        Ok(self
            .sheet_ref(sheet)?
            .formats
            .get(&(row, col))
            .cloned()
            .unwrap_or_default())
    }

    fn formatted_cells(&self, sheet: usize) -> WorkbookResult<Vec<(u32, u32, CellFormat)>> {
        Ok(self
            .sheet_ref(sheet)?
            .formats
            .iter()
            .map(|(&(row, col), format)| (row, col, format.clone()))
            .collect())
    }

    fn column_widths(&self, sheet: usize) -> WorkbookResult<Vec<(u32, f64)>> {
        Ok(self
            .sheet_ref(sheet)?
            .column_widths
            .iter()
            .map(|(&col, &width)| (col, width))
            .collect())
    }

    fn merged_ranges(&self, sheet: usize) -> WorkbookResult<Vec<Range>> {
        Ok(self.sheet_ref(sheet)?.merges.clone())
    }

    fn frozen_panes(&self, sheet: usize) -> WorkbookResult<FrozenPanes> {
        Ok(self.sheet_ref(sheet)?.frozen)
    }

    fn set_cell(
        &mut self,
        sheet: usize,
        row: u32,
        col: u32,
        content: CellContent,
    ) -> WorkbookResult<()> {
        let target = self.sheet_mut(sheet)?;
        target.check(row, col)?;
        target.write(row, col, content);
        Ok(())
    }

    fn set_cells(
        &mut self,
        sheet: usize,
        row: u32,
        col: u32,
        grid: &[Vec<Option<CellContent>>],
    ) -> WorkbookResult<()> {
        let target = self.sheet_mut(sheet)?;
        let height = grid.len();
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        if height == 0 || width == 0 {
            return Ok(());
        }
        // All-or-nothing: validate the far corner before touching anything.
        target.check(row, col)?;
        let far_row = u32::try_from(height - 1)
            .ok()
            .and_then(|dr| row.checked_add(dr));
        let far_col = u32::try_from(width - 1)
            .ok()
            .and_then(|dc| col.checked_add(dc));
        let (Some(far_row), Some(far_col)) = (far_row, far_col) else {
            return Err(WorkbookError::OutOfBounds {
                address: format!("{} + {height}x{width}", cell_label(row, col)),
            });
        };
        target.check(far_row, far_col)?;

        for (dr, values) in grid.iter().enumerate() {
            for (dc, content) in values.iter().enumerate() {
                if let Some(content) = content {
                    target.write(row + dr as u32, col + dc as u32, content.clone());
                }
            }
        }
        Ok(())
    }

    fn apply_format(
        &mut self,
        sheet: usize,
        range: Range,
        patch: &FormatPatch,
    ) -> WorkbookResult<()> {
        let target = self.sheet_mut(sheet)?;
        target.check(range.end_row, range.end_col)?;

        let mut fresh = CellFormat::default();
        patch.apply_to(&mut fresh);
        if fresh.is_default() {
            // Unformatted cells stay unformatted; only existing entries change.
            for (_, format) in target
                .formats
                .iter_mut()
                .filter(|((row, col), _)| range.contains(*row, *col))
            {
                patch.apply_to(format);
            }
            target.formats.retain(|_, format| !format.is_default());
            return Ok(());
        }

        if range.area() > MAX_FORMAT_CELLS {
            return Err(WorkbookError::Rejected(format!(
                "cannot format {range}: {} cells exceeds the limit of {MAX_FORMAT_CELLS}",
                range.area()
            )));
        }
        for key in range.cells() {
            let format = target.formats.entry(key).or_default();
            patch.apply_to(format);
            if format.is_default() {
                target.formats.remove(&key);
            }
        }
        Ok(())
    }

    fn clear(&mut self, sheet: usize, range: Range) -> WorkbookResult<()> {
        let target = self.sheet_mut(sheet)?;
        target.check(range.end_row, range.end_col)?;
        target
            .cells
            .retain(|(row, col), _| !range.contains(*row, *col));
        target
            .formats
            .retain(|(row, col), _| !range.contains(*row, *col));
        Ok(())
    }

    fn insert_rows(&mut self, sheet: usize, index: u32, count: u32) -> WorkbookResult<()> {
        let target = self.sheet_mut(sheet)?;
        if index > target.rows {
            return Err(WorkbookError::OutOfBounds {
                address: format!("row {}", u64::from(index) + 1),
            });
        }
        if u64::from(target.rows) + u64::from(count) > u64::from(MAX_SHEET_ROWS) {
            return Err(WorkbookError::Rejected(format!(
                "inserting {count} rows would grow the sheet past {MAX_SHEET_ROWS} rows"
            )));
        }
        target.shift_rows(index, count);
        Ok(())
    }

    fn insert_columns(&mut self, sheet: usize, index: u32, count: u32) -> WorkbookResult<()> {
        let target = self.sheet_mut(sheet)?;
        if index > target.cols {
            return Err(WorkbookError::OutOfBounds {
                address: format!("column {}", col_label(index)),
            });
        }
        if u64::from(target.cols) + u64::from(count) > u64::from(MAX_SHEET_COLS) {
            return Err(WorkbookError::Rejected(format!(
                "inserting {count} columns would grow the sheet past {MAX_SHEET_COLS} columns"
            )));
        }
        target.shift_cols(index, count);
        Ok(())
    }

    fn add_sheet(&mut self, name: &str) -> WorkbookResult<usize> {
        let (rows, cols) = (self.default_rows, self.default_cols);
        self.push_sheet(name.trim(), rows, cols)
    }

    fn rename_sheet(&mut self, sheet: usize, name: &str) -> WorkbookResult<()> {
        self.sheet_ref(sheet)?;
        self.validate_new_name(name, Some(sheet))?;
        self.sheet_mut(sheet)?.name = name.trim().to_string();
        Ok(())
    }

    fn set_column_width(&mut self, sheet: usize, col: u32, width: f64) -> WorkbookResult<()> {
        let target = self.sheet_mut(sheet)?;
        target.check(0, col)?;
        if !width.is_finite() || width < 0.0 {
            return Err(WorkbookError::Rejected(format!(
                "invalid width {width} for column {}",
                col_label(col)
            )));
        }
        target.column_widths.insert(col, width);
        Ok(())
    }

    fn merge(&mut self, sheet: usize, range: Range) -> WorkbookResult<()> {
        let target = self.sheet_mut(sheet)?;
        target.check(range.end_row, range.end_col)?;
        target.merges.retain(|existing| !existing.intersects(&range));
        target.merges.push(range);
        Ok(())
    }

    fn freeze(&mut self, sheet: usize, panes: FrozenPanes) -> WorkbookResult<()> {
        let target = self.sheet_mut(sheet)?;
        let bounds = target.bounds();
        if panes.rows > bounds.rows || panes.cols > bounds.cols {
            return Err(WorkbookError::OutOfBounds {
                address: cell_label(panes.rows, panes.cols),
            });
        }
        target.frozen = panes;
        Ok(())
    }
}
