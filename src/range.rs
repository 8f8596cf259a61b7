//! Range normalization: clamping agent-supplied coordinates against sheet bounds,
//! squaring off ragged value grids, and A1-style label conversion.
//!
//! Everything here is pure. Coordinates are zero-based; labels are one-based rows
//! with bijective base-26 columns (`A` = 0, `Z` = 25, `AA` = 26).

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest sheet a host is expected to hold; matches the xlsx grid.
pub const MAX_SHEET_ROWS: u32 = 1_048_576;
pub const MAX_SHEET_COLS: u32 = 16_384;

static CELL_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$?([A-Za-z]{1,4})\$?([0-9]{1,7})$").expect("valid cell ref regex"));

/// Row/column counts of one sheet as currently reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetBounds {
    pub rows: u32,
    pub cols: u32,
}

impl SheetBounds {
    /// A sheet always has at least one addressable cell.
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows: rows.max(1),
            cols: cols.max(1),
        }
    }

    pub fn max_row(&self) -> u32 {
        self.rows.max(1) - 1
    }

    pub fn max_col(&self) -> u32 {
        self.cols.max(1) - 1
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row < self.rows && col < self.cols
    }
}

/// Inclusive rectangular region, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl Range {
    pub fn cell(row: u32, col: u32) -> Self {
        Self {
            start_row: row,
            start_col: col,
            end_row: row,
            end_col: col,
        }
    }

    pub fn row_count(&self) -> u64 {
        u64::from(self.end_row) - u64::from(self.start_row) + 1
    }

    pub fn col_count(&self) -> u64 {
        u64::from(self.end_col) - u64::from(self.start_col) + 1
    }

    pub fn area(&self) -> u64 {
        self.row_count() * self.col_count()
    }

    pub fn is_single_cell(&self) -> bool {
        self.start_row == self.end_row && self.start_col == self.end_col
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.start_row..=self.end_row).contains(&row)
            && (self.start_col..=self.end_col).contains(&col)
    }

    pub fn intersects(&self, other: &Range) -> bool {
        self.start_row <= other.end_row
            && other.start_row <= self.end_row
            && self.start_col <= other.end_col
            && other.start_col <= self.end_col
    }

    /// Row-major iteration over every cell in the range.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.start_row..=self.end_row)
            .flat_map(move |row| (self.start_col..=self.end_col).map(move |col| (row, col)))
    }

    pub fn to_a1(&self) -> String {
        let start = cell_label(self.start_row, self.start_col);
        if self.is_single_cell() {
            start
        } else {
            format!("{start}:{}", cell_label(self.end_row, self.end_col))
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Clamp untrusted coordinates into `bounds`.
///
/// Each coordinate is clamped independently into `[0, max_row]` / `[0, max_col]`.
/// If either clamped end precedes its clamped start the result collapses to the
/// single cell at the clamped start. Never fails and never returns an empty range.
pub fn clamp(bounds: SheetBounds, start_row: i64, start_col: i64, end_row: i64, end_col: i64) -> Range {
    let clamp_axis = |value: i64, max: u32| -> u32 { value.clamp(0, i64::from(max)) as u32 };

    let start_row = clamp_axis(start_row, bounds.max_row());
    let start_col = clamp_axis(start_col, bounds.max_col());
    let end_row = clamp_axis(end_row, bounds.max_row());
    let end_col = clamp_axis(end_col, bounds.max_col());

    if end_row < start_row || end_col < start_col {
        return Range::cell(start_row, start_col);
    }

    Range {
        start_row,
        start_col,
        end_row,
        end_col,
    }
}

/// Single-cell convenience wrapper around [`clamp`].
pub fn clamp_cell(bounds: SheetBounds, row: i64, col: i64) -> Range {
    clamp(bounds, row, col, row, col)
}

/// A ragged grid squared off to a uniform width.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangular<T> {
    pub grid: Vec<Vec<Option<T>>>,
    pub cols: usize,
}

impl<T> Rectangular<T> {
    /// An empty grid tells the caller to skip the write entirely.
    pub fn is_empty(&self) -> bool {
        self.cols == 0 || self.grid.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.grid.len()
    }
}

/// Pad every row to the widest row's length with `None`.
pub fn rectangularize<T>(values: Vec<Vec<Option<T>>>) -> Rectangular<T> {
    let cols = values.iter().map(Vec::len).max().unwrap_or(0);
    if cols == 0 {
        return Rectangular {
            grid: Vec::new(),
            cols: 0,
        };
    }

    let grid = values
        .into_iter()
        .map(|mut row| {
            row.resize_with(cols, || None);
            row
        })
        .collect();

    Rectangular { grid, cols }
}

/// Zero-based column index to its letter label (`0` -> `A`, `26` -> `AA`).
pub fn col_label(col: u32) -> String {
    let mut label = Vec::new();
    let mut n = i64::from(col);
    while n >= 0 {
        label.push(b'A' + (n % 26) as u8);
        n = n / 26 - 1;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

/// Inverse of [`col_label`]. Case-insensitive; rejects anything but letters.
pub fn parse_col_label(label: &str) -> Option<u32> {
    let label = label.trim();
    if label.is_empty() || label.len() > 4 {
        return None;
    }
    let mut acc: u32 = 0;
    for ch in label.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        acc = acc * 26 + digit;
    }
    Some(acc - 1)
}

pub fn cell_label(row: u32, col: u32) -> String {
    format!("{}{}", col_label(col), u64::from(row) + 1)
}

/// Zero-based coordinates of a parsed A1 reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

/// Parse `B3` (optionally `$B$3`) into zero-based coordinates.
pub fn parse_cell_ref(reference: &str) -> Option<CellRef> {
    let caps = CELL_REF_RE.captures(reference.trim())?;
    let col = parse_col_label(caps.get(1)?.as_str())?;
    let row: u32 = caps.get(2)?.as_str().parse().ok()?;
    if row == 0 {
        return None;
    }
    Some(CellRef { row: row - 1, col })
}

/// Parse `A1:C10` or a lone `B2` into its corner references, in the order written.
pub fn parse_range_ref(reference: &str) -> Option<(CellRef, CellRef)> {
    let reference = reference.trim();
    // Sheet-qualified refs are accepted but the qualifier is ignored.
    let reference = reference.rsplit_once('!').map_or(reference, |(_, r)| r);
    match reference.split_once(':') {
        Some((start, end)) => Some((parse_cell_ref(start)?, parse_cell_ref(end)?)),
        None => {
            let cell = parse_cell_ref(reference)?;
            Some((cell, cell))
        }
    }
}
