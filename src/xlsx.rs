//! xlsx import and export of a [`MemoryWorkbook`].
//!
//! Only what the in-memory model carries survives a round trip: values, formulas,
//! bold, fill and font colors, column widths, merges and sheet names.

use crate::memory::MemoryWorkbook;
use crate::model::{Cell, CellContent, FormatPatch, Scalar, normalize_formula};
use crate::range::{Range, parse_range_ref};
use crate::styles::{argb_to_hex, hex_to_argb};
use crate::workbook::Workbook;
use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use umya_spreadsheet::structs::PatternValues;
use umya_spreadsheet::Worksheet;

const DEFAULT_FONT_ARGB: &str = "FF000000";

pub fn import(path: &Path, default_rows: u32, default_cols: u32) -> Result<MemoryWorkbook> {
    let book = umya_spreadsheet::reader::xlsx::read(path)
        .map_err(|e| anyhow!("failed to read workbook {:?}: {}", path, e))?;

    let mut workbook = MemoryWorkbook::empty(default_rows, default_cols);
    for sheet in book.get_sheet_collection_no_check() {
        import_sheet(&mut workbook, sheet, default_rows, default_cols)
            .with_context(|| format!("failed to import sheet '{}'", sheet.get_name()))?;
    }
    if workbook.sheet_count() == 0 {
        workbook.push_sheet("Sheet1", default_rows, default_cols)?;
    }
    info!(path = %path.display(), sheets = workbook.sheet_count(), "workbook imported");
    Ok(workbook)
}

fn import_sheet(
    workbook: &mut MemoryWorkbook,
    sheet: &Worksheet,
    default_rows: u32,
    default_cols: u32,
) -> Result<()> {
    let (highest_col, highest_row) = sheet.get_highest_column_and_row();
    let rows = default_rows.max(highest_row);
    let cols = default_cols.max(highest_col);
    let index = workbook.push_sheet(sheet.get_name(), rows, cols)?;

    for cell in sheet.get_cell_collection() {
        let coordinate = cell.get_coordinate();
        let (Some(row), Some(col)) = (
            coordinate.get_row_num().checked_sub(1),
            coordinate.get_col_num().checked_sub(1),
        ) else {
            continue;
        };

        if let Some(content) = read_content(cell) {
            workbook.set_cell(index, row, col, content)?;
        }
        let patch = read_format(cell.get_style());
        if !patch.is_empty() {
            workbook.apply_format(index, Range::cell(row, col), &patch)?;
        }
    }

    for column in sheet.get_column_dimensions() {
        let width = *column.get_width();
        if let Some(col) = column.get_col_num().checked_sub(1)
            && width > 0.0
            && col < cols
        {
            workbook.set_column_width(index, col, width)?;
        }
    }

    for merged in sheet.get_merge_cells() {
        let Some((start, end)) = parse_range_ref(&merged.get_range()) else {
            debug!(range = %merged.get_range(), "skipping unparsable merge");
            continue;
        };
        let range = Range {
            start_row: start.row.min(end.row),
            start_col: start.col.min(end.col),
            end_row: start.row.max(end.row),
            end_col: start.col.max(end.col),
        };
        if !range.is_single_cell() {
            workbook.merge(index, range)?;
        }
    }
    Ok(())
}

fn read_content(cell: &umya_spreadsheet::Cell) -> Option<CellContent> {
    if cell.is_formula() {
        return Some(CellContent::Formula(normalize_formula(cell.get_formula())));
    }
    let value = cell.get_value();
    if value.is_empty() {
        return None;
    }
    let scalar = match cell.get_data_type() {
        "b" => Scalar::Bool(value.eq_ignore_ascii_case("true") || value == "1"),
        "n" => cell
            .get_value_number()
            .map(Scalar::Number)
            .unwrap_or_else(|| Scalar::Text(value.to_string())),
        _ => Scalar::Text(value.to_string()),
    };
    Some(CellContent::Value(scalar))
}

fn read_format(style: &umya_spreadsheet::Style) -> FormatPatch {
    let mut patch = FormatPatch::default();
    if let Some(font) = style.get_font() {
        if *font.get_bold() {
            patch.bold = Some(true);
        }
        let argb = font.get_color().get_argb();
        if !argb.is_empty() && !argb.eq_ignore_ascii_case(DEFAULT_FONT_ARGB) {
            patch.text_color = argb_to_hex(argb);
        }
    }
    if let Some(pattern) = style.get_fill().and_then(|fill| fill.get_pattern_fill())
        && matches!(pattern.get_pattern_type(), PatternValues::Solid)
    {
        patch.background_color = pattern
            .get_foreground_color()
            .and_then(|color| argb_to_hex(color.get_argb()));
    }
    patch
}

/// Write `workbook` to `path`, replacing any existing file only once the new one is complete.
pub fn export(workbook: &dyn Workbook, path: &Path) -> Result<()> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();

    for index in 0..workbook.sheet_count() {
        let name = workbook.sheet_name(index)?;
        let sheet = book
            .new_sheet(name.as_str())
            .map_err(|e| anyhow!("failed to create sheet '{}': {}", name, e))?;

        for entry in workbook.populated_cells(index)? {
            write_cell(sheet, entry.row, entry.col, &entry.cell);
        }

        for (row, col, format) in workbook.formatted_cells(index)? {
            let style = sheet.get_style_mut((col + 1, row + 1));
            if format.bold {
                style.get_font_mut().set_bold(true);
            }
            if let Some(argb) = format.text_color.as_deref().and_then(hex_to_argb) {
                style.get_font_mut().get_color_mut().set_argb(argb);
            }
            if let Some(argb) = format.background_color.as_deref().and_then(hex_to_argb) {
                style
                    .get_fill_mut()
                    .get_pattern_fill_mut()
                    .set_pattern_type(PatternValues::Solid)
                    .get_foreground_color_mut()
                    .set_argb(argb);
            }
        }

        for (col, width) in workbook.column_widths(index)? {
            let col_num = col + 1;
            let dimension = sheet.get_column_dimension_by_number_mut(&col_num);
            dimension.set_width(width);
            dimension.set_best_fit(false);
            dimension.set_auto_width(false);
        }

        for merged in workbook.merged_ranges(index)? {
            sheet.add_merge_cells(merged.to_a1());
        }
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {:?}", dir))?;
    umya_spreadsheet::writer::xlsx::write(&book, tmp.path())
        .map_err(|e| anyhow!("failed to write workbook {:?}: {}", path, e))?;
    tmp.persist(path)
        .with_context(|| format!("failed to move workbook into place at {:?}", path))?;
    info!(path = %path.display(), sheets = workbook.sheet_count(), "workbook exported");
    Ok(())
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u32, cell: &Cell) {
    let target = sheet.get_cell_mut((col + 1, row + 1));
    if let Some(formula) = cell.formula.as_deref() {
        target.set_formula(formula.trim_start_matches('=').to_string());
        return;
    }
    match &cell.value {
        Some(Scalar::Number(n)) => {
            target.set_value_number(*n);
        }
        Some(Scalar::Bool(b)) => {
            target.set_value_bool(*b);
        }
        Some(Scalar::Text(text)) => {
            target.set_value(text.clone());
        }
        None => {}
    }
}
