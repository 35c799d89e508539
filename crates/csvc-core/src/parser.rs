//! CSV reader turning one byte stream into a [`Table`]

use crate::error::{Error, Result};
use crate::table::{
    columns_from_names, CellValue, Column, Row, Table, RAW_SOURCE_COLUMN, SOURCE_COLUMN,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// How the first row and the cells of a file are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadMode {
    /// First row names the columns; cells are type-inferred
    #[default]
    #[serde(rename = "typed", alias = "typed_header")]
    TypedHeader,
    /// No header; cells kept as literal text under `Column_k` placeholders
    #[serde(rename = "raw", alias = "raw_positional")]
    RawPositional,
}

impl ReadMode {
    /// Suggested file name for the exported result
    pub fn default_output_name(self) -> &'static str {
        match self {
            ReadMode::TypedHeader => "combined_dataset.csv",
            ReadMode::RawPositional => "stacked_data.csv",
        }
    }

    /// Placeholder column names are meaningless to consumers of raw output
    pub fn default_include_header(self) -> bool {
        matches!(self, ReadMode::TypedHeader)
    }
}

impl FromStr for ReadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "typed" | "typed_header" => Ok(ReadMode::TypedHeader),
            "raw" | "raw_positional" => Ok(ReadMode::RawPositional),
            _ => Err(Error::InvalidOption {
                kind: "read mode",
                value: s.to_string(),
                expected: "typed, raw",
            }),
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadMode::TypedHeader => write!(f, "typed"),
            ReadMode::RawPositional => write!(f, "raw"),
        }
    }
}

/// Options for [`read_table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub mode: ReadMode,
    /// Raw mode only: drop all-null rows and columns before naming columns
    pub clean_empty: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            mode: ReadMode::TypedHeader,
            clean_empty: true,
        }
    }
}

impl ReadOptions {
    pub fn typed() -> Self {
        Self {
            mode: ReadMode::TypedHeader,
            ..Self::default()
        }
    }

    pub fn raw(clean_empty: bool) -> Self {
        Self {
            mode: ReadMode::RawPositional,
            clean_empty,
        }
    }
}

/// Parse one CSV stream.
///
/// Returns `Ok(None)` only for a blank file read in raw mode with cleaning enabled.
pub fn read_table(name: &str, bytes: &[u8], options: &ReadOptions) -> Result<Option<Table>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    match options.mode {
        ReadMode::TypedHeader => read_typed(name, bytes).map(Some),
        ReadMode::RawPositional => read_raw(name, bytes, options.clean_empty),
    }
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Table> {
    read_typed(source_name, content.as_bytes())
}

fn read_typed(name: &str, bytes: &[u8]) -> Result<Table> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::EmptyInput(name.to_string()));
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Short rows are padded below
        .from_reader(bytes);

    let headers = csv_reader.headers().map_err(|e| Error::Csv {
        name: name.to_string(),
        source: e,
    })?;

    let mut columns = columns_from_names(dedupe_headers(headers.iter()));

    if columns.is_empty() {
        return Err(Error::UnreadableFile {
            name: name.to_string(),
            message: "no columns to parse from file".to_string(),
        });
    }

    let width = columns.len();
    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::Csv {
            name: name.to_string(),
            source: e,
        })?;

        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(Error::UnreadableFile {
                name: name.to_string(),
                message: format!(
                    "expected {} fields in line {}, saw {}",
                    width,
                    line,
                    record.len()
                ),
            });
        }

        let mut cells: Vec<CellValue> = record.iter().map(CellValue::parse).collect();
        cells.resize(width, CellValue::Null);
        rows.push(Row::new(cells));
    }

    // Stamp provenance, overwriting a column that already uses the reserved name
    let provenance = CellValue::String(name.to_string());
    match columns.iter().position(|c| c.name == SOURCE_COLUMN) {
        Some(idx) => {
            for row in &mut rows {
                row.cells[idx] = provenance.clone();
            }
        }
        None => {
            columns.push(Column::new(SOURCE_COLUMN, width));
            for row in &mut rows {
                row.cells.push(provenance.clone());
            }
        }
    }

    tracing::debug!(file = name, rows = rows.len(), columns = columns.len(), "read typed table");

    Ok(Table {
        columns,
        rows,
        source: name.to_string(),
        provenance_column: SOURCE_COLUMN.to_string(),
    })
}

/// Make header names unique. Blank names become `Unnamed: <index>`; repeats get
/// `.1`, `.2`, ... skipping any name already taken.
pub(crate) fn dedupe_headers<'a, I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let raw: Vec<String> = headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            if h.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(raw.len());
    for name in raw {
        let mut candidate = name.clone();
        let mut suffix = 1;
        while taken.contains(&candidate) {
            candidate = format!("{}.{}", name, suffix);
            suffix += 1;
        }
        taken.insert(candidate.clone());
        names.push(candidate);
    }
    names
}

fn read_raw(name: &str, bytes: &[u8], clean_empty: bool) -> Result<Option<Table>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut grid: Vec<Vec<CellValue>> = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::Csv {
            name: name.to_string(),
            source: e,
        })?;
        grid.push(record.iter().map(CellValue::raw).collect());
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    for cells in &mut grid {
        cells.resize(width, CellValue::Null);
    }

    // Keep original column positions so renaming happens after dropping
    let mut keep: Vec<usize> = (0..width).collect();
    if clean_empty {
        grid.retain(|cells| !cells.iter().all(CellValue::is_null));
        keep.retain(|&c| grid.iter().any(|cells| !cells[c].is_null()));
    }

    if grid.is_empty() || keep.is_empty() {
        if clean_empty {
            tracing::debug!(file = name, "skipping blank file");
            return Ok(None);
        }
        return Err(Error::EmptyInput(name.to_string()));
    }

    let names = std::iter::once(RAW_SOURCE_COLUMN.to_string())
        .chain((1..=keep.len()).map(|k| format!("Column_{}", k)));
    let columns = columns_from_names(names);

    let rows = grid
        .into_iter()
        .map(|cells| {
            let mut out = Vec::with_capacity(keep.len() + 1);
            out.push(CellValue::String(name.to_string()));
            out.extend(keep.iter().map(|&c| cells[c].clone()));
            Row::new(out)
        })
        .collect::<Vec<_>>();

    tracing::debug!(file = name, rows = rows.len(), columns = columns.len(), "read raw table");

    Ok(Some(Table {
        columns,
        rows,
        source: name.to_string(),
        provenance_column: RAW_SOURCE_COLUMN.to_string(),
    }))
}
