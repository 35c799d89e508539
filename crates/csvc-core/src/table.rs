//! Core table types for parsed and combined CSV data

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Provenance column appended in typed header mode
pub const SOURCE_COLUMN: &str = "source_file";

/// Provenance column inserted first in raw positional mode
pub const RAW_SOURCE_COLUMN: &str = "Source_File";

/// A parsed table from a single CSV stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Row data, each row exactly `columns.len()` cells wide
    pub rows: Vec<Row>,
    /// Logical name of the originating file
    pub source: String,
    /// Name of the column carrying `source` on every row
    pub provenance_column: String,
}

impl Table {
    /// Create a new empty table
    pub fn new(source: impl Into<String>, provenance_column: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            source: source.into(),
            provenance_column: provenance_column.into(),
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// The result of reconciling many tables. Provenance lives per row in
/// `provenance_column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedTable {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Rows in file order, then intra-file order
    pub rows: Vec<Row>,
    /// Name of the per-row provenance column
    pub provenance_column: String,
    /// Files that contributed to this table, in merge order
    pub sources: Vec<String>,
}

impl CombinedTable {
    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of distinct values in the provenance column, if it is still present
    pub fn source_count(&self) -> Option<usize> {
        let col = self.find_column(&self.provenance_column)?;
        let distinct: BTreeSet<String> = self
            .rows
            .iter()
            .filter_map(|r| r.get(col.index))
            .filter(|c| !c.is_null())
            .map(CellValue::to_string_value)
            .collect();
        Some(distinct.len())
    }

    /// First `n` rows, for previews
    pub fn head(&self, n: usize) -> &[Row] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Get the value of a named column in a row
    pub fn value(&self, row_idx: usize, column: &str) -> Option<&CellValue> {
        let col = self.find_column(column)?;
        self.rows.get(row_idx).and_then(|r| r.get(col.index))
    }
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column index (0-based)
    pub index: usize,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// Build a column list from names, indexing by position
pub fn columns_from_names<I, S>(names: I) -> Vec<Column>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| Column::new(name, i))
        .collect()
}

/// A row of data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Cell values for each column
    pub cells: Vec<CellValue>,
}

impl Row {
    /// Create a new row
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }

    /// True when every cell is null
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_null)
    }
}

/// A cell value with type detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Integer value
    Integer(i64),
    /// Floating-point value (always finite)
    Float(f64),
    /// String value
    String(String),
    /// Missing cell
    Null,
}

impl CellValue {
    /// Parse a string into a CellValue, detecting the type
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return CellValue::Null;
        }

        // Try parsing as integer first
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Integer(i);
        }

        // NaN and infinities stay text so equality stays total
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return CellValue::Float(f);
            }
        }

        CellValue::String(trimmed.to_string())
    }

    /// Keep a field verbatim; only an empty field is missing
    pub fn raw(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Null
        } else {
            CellValue::String(s.to_string())
        }
    }

    /// Check if the cell is missing
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Convert to a display string
    pub fn to_string_value(&self) -> String {
        self.to_string()
    }

    /// Total order used for sorting: null first, then numbers by value, then text.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &CellValue) -> u8 {
            match v {
                CellValue::Null => 0,
                CellValue::Integer(_) | CellValue::Float(_) => 1,
                CellValue::String(_) => 2,
            }
        }

        match (self, other) {
            (CellValue::Integer(a), CellValue::Integer(b)) => a.cmp(b),
            (CellValue::Integer(a), CellValue::Float(b)) => (*a as f64).total_cmp(b),
            (CellValue::Float(a), CellValue::Integer(b)) => a.total_cmp(&(*b as f64)),
            (CellValue::Float(a), CellValue::Float(b)) => a.total_cmp(b),
            (CellValue::String(a), CellValue::String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }

    /// Hashable identity of the cell, for duplicate detection
    pub(crate) fn key(&self) -> CellKey<'_> {
        match self {
            CellValue::Integer(i) => CellKey::Integer(*i),
            // Whole floats share the integer key, so 2 and 2.0 (and -0.0) are one value
            CellValue::Float(f) if f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(f) => {
                CellKey::Integer(*f as i64)
            }
            CellValue::Float(f) => CellKey::Float(f.to_bits()),
            CellValue::String(s) => CellKey::String(s),
            CellValue::Null => CellKey::Null,
        }
    }
}

/// 2^63, the first float past `i64::MAX`
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CellKey<'a> {
    Integer(i64),
    Float(u64),
    String(&'a str),
    Null,
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{}", i),
            // Whole floats keep a decimal point or exponent so they read back as floats
            CellValue::Float(fl) if fl.fract() == 0.0 => write!(f, "{:?}", fl),
            CellValue::Float(fl) => write!(f, "{}", fl),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Null => write!(f, ""),
        }
    }
}
