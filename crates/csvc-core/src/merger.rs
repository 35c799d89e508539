//! Reconciler combining per-file tables into one table

use crate::error::Error;
use crate::parser::dedupe_headers;
use crate::table::{columns_from_names, CellValue, CombinedTable, Row, Table, RAW_SOURCE_COLUMN};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Rule for aligning differing column sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStrategy {
    /// Every column seen in any file, first-seen order; absent cells are null
    #[default]
    Union,
    /// Only columns present in every file, in the first file's order
    Intersection,
    /// The k-th column of every file lands in the k-th result column
    Positional,
}

impl FromStr for AlignmentStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "union" => Ok(AlignmentStrategy::Union),
            "intersection" => Ok(AlignmentStrategy::Intersection),
            "positional" => Ok(AlignmentStrategy::Positional),
            _ => Err(Error::InvalidOption {
                kind: "alignment strategy",
                value: s.to_string(),
                expected: "union, intersection, positional",
            }),
        }
    }
}

impl fmt::Display for AlignmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlignmentStrategy::Union => "union",
            AlignmentStrategy::Intersection => "intersection",
            AlignmentStrategy::Positional => "positional",
        };
        write!(f, "{}", s)
    }
}

/// Combine tables in the order given. Returns `None` when there is nothing to merge.
///
/// Row order is table order, then each table's own row order. No deduplication,
/// sorting or type coercion happens here.
pub fn reconcile(tables: Vec<Table>, strategy: AlignmentStrategy) -> Option<CombinedTable> {
    let first = tables.first()?;
    let provenance_column = first.provenance_column.clone();
    let sources: Vec<String> = tables.iter().map(|t| t.source.clone()).collect();

    let (column_names, rows) = match strategy {
        AlignmentStrategy::Union => align_by_name(tables, union_columns),
        AlignmentStrategy::Intersection => align_by_name(tables, intersection_columns),
        AlignmentStrategy::Positional => align_by_position(tables),
    };

    tracing::info!(
        %strategy,
        sources = sources.len(),
        rows = rows.len(),
        columns = column_names.len(),
        "reconciled tables"
    );

    Some(CombinedTable {
        columns: columns_from_names(column_names),
        rows,
        provenance_column,
        sources,
    })
}

fn union_columns(tables: &[Table]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for table in tables {
        for col in &table.columns {
            if seen.insert(col.name.as_str()) {
                names.push(col.name.clone());
            }
        }
    }
    names
}

fn intersection_columns(tables: &[Table]) -> Vec<String> {
    let Some((first, rest)) = tables.split_first() else {
        return Vec::new();
    };

    first
        .columns
        .iter()
        .filter(|c| rest.iter().all(|t| t.find_column(&c.name).is_some()))
        .map(|c| c.name.clone())
        .collect()
}

fn align_by_name(
    tables: Vec<Table>,
    target: fn(&[Table]) -> Vec<String>,
) -> (Vec<String>, Vec<Row>) {
    let names = target(&tables);
    let mut rows = Vec::with_capacity(tables.iter().map(Table::row_count).sum());

    for table in tables {
        let table_col_map: HashMap<&str, usize> = table
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.index))
            .collect();

        // Where each target column comes from in this table, if anywhere
        let mapping: Vec<Option<usize>> = names
            .iter()
            .map(|n| table_col_map.get(n.as_str()).copied())
            .collect();

        for row in &table.rows {
            let cells = mapping
                .iter()
                .map(|idx| {
                    idx.and_then(|i| row.get(i).cloned())
                        .unwrap_or(CellValue::Null)
                })
                .collect();
            rows.push(Row::new(cells));
        }
    }

    (names, rows)
}

/// Stack data columns by position. The provenance column is pulled out of every input
/// and put back at one fixed slot: first in raw mode, last otherwise.
fn align_by_position(tables: Vec<Table>) -> (Vec<String>, Vec<Row>) {
    let Some(first) = tables.first() else {
        return (Vec::new(), Vec::new());
    };
    let provenance = first.provenance_column.clone();
    let leading = provenance == RAW_SOURCE_COLUMN;

    // Cell index of provenance, and of each data column in order, per table
    let layouts: Vec<(Option<usize>, Vec<usize>)> = tables
        .iter()
        .map(|t| {
            let origin = t.find_column(&t.provenance_column).map(|c| c.index);
            let data = t
                .columns
                .iter()
                .map(|c| c.index)
                .filter(|&i| Some(i) != origin)
                .collect();
            (origin, data)
        })
        .collect();

    let width = layouts.iter().map(|(_, data)| data.len()).max().unwrap_or(0);

    // Each position takes its name from the first table wide enough to have it
    let data_names: Vec<String> = (0..width)
        .map(|k| {
            tables
                .iter()
                .zip(&layouts)
                .find_map(|(t, (origin, _))| {
                    t.columns.iter().filter(|c| Some(c.index) != *origin).nth(k)
                })
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("Column_{}", k + 1))
        })
        .collect();
    let mut names = dedupe_headers(data_names.iter().map(String::as_str));
    if leading {
        names.insert(0, provenance);
    } else {
        names.push(provenance);
    }

    let mut rows = Vec::with_capacity(tables.iter().map(Table::row_count).sum());
    for (table, (origin, data)) in tables.into_iter().zip(layouts) {
        let source = CellValue::String(table.source);
        for row in table.rows {
            let stamp = origin
                .and_then(|i| row.get(i).cloned())
                .unwrap_or_else(|| source.clone());

            let mut cells = Vec::with_capacity(width + 1);
            cells.extend(data.iter().map(|&i| row.get(i).cloned().unwrap_or(CellValue::Null)));
            cells.resize(width, CellValue::Null);
            if leading {
                cells.insert(0, stamp);
            } else {
                cells.push(stamp);
            }
            rows.push(Row::new(cells));
        }
    }

    (names, rows)
}
