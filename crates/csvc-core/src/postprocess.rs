//! Cleaning and shaping applied to a combined table
//!
//! Steps always run in this order:
//! 1. drop columns whose share of missing cells exceeds the threshold
//! 2. drop rows that repeat an earlier row across the surviving columns
//! 3. stable sort by one column
//!
//! The input table is never modified, so toggling options re-derives from the raw merge.

use crate::error::{Diagnostic, Error, Stage};
use crate::table::{columns_from_names, CellKey, CombinedTable, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Post-processing switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessConfig {
    pub remove_duplicates: bool,
    /// Columns with strictly more than this percentage of nulls are dropped
    pub missing_threshold_percent: f64,
    pub sort_column: Option<String>,
    pub sort_ascending: bool,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            remove_duplicates: false,
            missing_threshold_percent: 100.0,
            sort_column: None,
            sort_ascending: true,
        }
    }
}

/// Result of [`post_process`]
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessed {
    pub table: CombinedTable,
    pub dropped_columns: Vec<String>,
    pub duplicates_removed: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Apply pruning, deduplication and sorting, producing a new table
pub fn post_process(table: &CombinedTable, config: &PostProcessConfig) -> PostProcessed {
    let mut diagnostics = Vec::new();

    let (mut result, dropped_columns) = prune_columns(table, config.missing_threshold_percent);
    if !dropped_columns.is_empty() {
        tracing::info!(columns = ?dropped_columns, "dropped sparse columns");
    }

    let mut duplicates_removed = 0;
    if config.remove_duplicates {
        duplicates_removed = remove_duplicates(&mut result.rows);
        if duplicates_removed > 0 {
            tracing::info!(removed = duplicates_removed, "removed duplicate rows");
        }
    }

    if let Some(column) = &config.sort_column {
        match result.find_column(column).map(|c| c.index) {
            Some(idx) => sort_rows(&mut result.rows, idx, config.sort_ascending),
            None => {
                let err = Error::SortColumnMissing(column.clone());
                tracing::warn!("{}", err);
                diagnostics.push(Diagnostic::from_error(Stage::PostProcess, &err));
            }
        }
    }

    PostProcessed {
        table: result,
        dropped_columns,
        duplicates_removed,
        diagnostics,
    }
}

/// Percentage of null cells per column; an empty table has no missing data
pub fn missing_percentages(table: &CombinedTable) -> Vec<f64> {
    let total = table.row_count();
    table
        .columns
        .iter()
        .map(|col| {
            if total == 0 {
                return 0.0;
            }
            let missing = table
                .rows
                .iter()
                .filter(|r| r.get(col.index).map_or(true, |c| c.is_null()))
                .count();
            missing as f64 / total as f64 * 100.0
        })
        .collect()
}

fn prune_columns(table: &CombinedTable, threshold: f64) -> (CombinedTable, Vec<String>) {
    let percentages = missing_percentages(table);

    let mut keep = Vec::new();
    let mut dropped = Vec::new();
    for (col, pct) in table.columns.iter().zip(percentages) {
        if pct > threshold {
            dropped.push(col.name.clone());
        } else {
            keep.push(col.index);
        }
    }

    let columns = columns_from_names(keep.iter().map(|&i| table.columns[i].name.clone()));
    let rows = table
        .rows
        .iter()
        .map(|r| Row::new(keep.iter().map(|&i| r.cells[i].clone()).collect()))
        .collect();

    let pruned = CombinedTable {
        columns,
        rows,
        provenance_column: table.provenance_column.clone(),
        sources: table.sources.clone(),
    };
    (pruned, dropped)
}

/// Keep the first occurrence of every distinct row; returns how many were dropped
pub fn remove_duplicates(rows: &mut Vec<Row>) -> usize {
    let before = rows.len();
    let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(before);
    let mut keep = Vec::with_capacity(before);
    for row in rows.iter() {
        keep.push(seen.insert(row.cells.iter().map(|c| c.key()).collect()));
    }
    drop(seen);

    let mut flags = keep.into_iter();
    rows.retain(|_| flags.next().unwrap_or(true));
    before - rows.len()
}

fn sort_rows(rows: &mut [Row], idx: usize, ascending: bool) {
    rows.sort_by(|a, b| {
        let ord = a.cells[idx].sort_cmp(&b.cells[idx]);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use crate::merger::{reconcile, AlignmentStrategy};
    use crate::parser::parse_csv_str;
    use crate::table::{CellValue, SOURCE_COLUMN};

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn sample() -> CombinedTable {
        CombinedTable {
            columns: columns_from_names(["id", "note", "sparse", SOURCE_COLUMN]),
            rows: vec![
                Row::new(vec![CellValue::Integer(2), s("b"), CellValue::Null, s("a.csv")]),
                Row::new(vec![CellValue::Integer(1), s("a"), CellValue::Null, s("a.csv")]),
                Row::new(vec![CellValue::Integer(2), s("b"), CellValue::Null, s("a.csv")]),
                Row::new(vec![CellValue::Null, CellValue::Null, s("x"), s("b.csv")]),
            ],
            provenance_column: SOURCE_COLUMN.to_string(),
            sources: vec!["a.csv".to_string(), "b.csv".to_string()],
        }
    }

    #[test]
    fn test_default_config_is_identity() {
        let table = sample();
        let out = post_process(&table, &PostProcessConfig::default());

        assert_eq!(out.table, table);
        assert!(out.dropped_columns.is_empty());
        assert_eq!(out.duplicates_removed, 0);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_threshold_zero_drops_any_column_with_nulls() {
        let config = PostProcessConfig {
            missing_threshold_percent: 0.0,
            ..Default::default()
        };
        let out = post_process(&sample(), &config);

        assert_eq!(out.table.column_names(), vec![SOURCE_COLUMN]);
        assert_eq!(out.dropped_columns, vec!["id", "note", "sparse"]);
        assert_eq!(out.table.row_count(), 4);
    }

    #[test]
    fn test_threshold_is_strictly_greater() {
        // "sparse" is 75% missing, "id" and "note" are 25%
        let config = PostProcessConfig {
            missing_threshold_percent: 25.0,
            ..Default::default()
        };
        let out = post_process(&sample(), &config);

        assert_eq!(out.table.column_names(), vec!["id", "note", SOURCE_COLUMN]);
        assert_eq!(out.dropped_columns, vec!["sparse"]);
    }

    #[test]
    fn test_remove_duplicates_keeps_first() {
        let config = PostProcessConfig {
            remove_duplicates: true,
            ..Default::default()
        };
        let out = post_process(&sample(), &config);

        assert_eq!(out.duplicates_removed, 1);
        assert_eq!(out.table.row_count(), 3);
        assert_eq!(out.table.rows[0].cells[0], CellValue::Integer(2));
        assert_eq!(out.table.rows[1].cells[0], CellValue::Integer(1));
    }

    #[test]
    fn test_duplicates_compared_after_pruning() {
        let table = CombinedTable {
            columns: columns_from_names(["k", "noise"]),
            rows: vec![
                Row::new(vec![s("same"), s("1")]),
                Row::new(vec![s("same"), CellValue::Null]),
                Row::new(vec![s("same"), CellValue::Null]),
            ],
            provenance_column: SOURCE_COLUMN.to_string(),
            sources: Vec::new(),
        };
        let config = PostProcessConfig {
            remove_duplicates: true,
            missing_threshold_percent: 50.0,
            ..Default::default()
        };
        let out = post_process(&table, &config);

        assert_eq!(out.dropped_columns, vec!["noise"]);
        assert_eq!(out.table.row_count(), 1);
        assert_eq!(out.duplicates_removed, 2);
    }

    #[test]
    fn test_integer_and_whole_float_are_duplicates() {
        let tables = vec![
            parse_csv_str("amount\n2\n", "a.csv").unwrap(),
            parse_csv_str("amount\n2.0\n", "b.csv").unwrap(),
        ];
        let mut combined = reconcile(tables, AlignmentStrategy::Union).unwrap();
        // Provenance differs per file; compare on the amount alone
        combined.columns.truncate(1);
        for row in &mut combined.rows {
            row.cells.truncate(1);
        }

        let config = PostProcessConfig {
            remove_duplicates: true,
            ..Default::default()
        };
        let out = post_process(&combined, &config);

        assert_eq!(out.duplicates_removed, 1);
        assert_eq!(out.table.rows, vec![Row::new(vec![CellValue::Integer(2)])]);
    }

    #[test]
    fn test_remove_duplicates_is_idempotent() {
        let mut once = sample().rows;
        remove_duplicates(&mut once);
        let mut twice = once.clone();
        assert_eq!(remove_duplicates(&mut twice), 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sort_ascending_nulls_first_and_stable() {
        let config = PostProcessConfig {
            sort_column: Some("id".to_string()),
            ..Default::default()
        };
        let out = post_process(&sample(), &config);

        let ids: Vec<CellValue> = out.table.rows.iter().map(|r| r.cells[0].clone()).collect();
        assert_eq!(
            ids,
            vec![
                CellValue::Null,
                CellValue::Integer(1),
                CellValue::Integer(2),
                CellValue::Integer(2),
            ]
        );
    }

    #[test]
    fn test_sort_descending() {
        let config = PostProcessConfig {
            sort_column: Some("note".to_string()),
            sort_ascending: false,
            ..Default::default()
        };
        let out = post_process(&sample(), &config);

        assert_eq!(out.table.rows[0].cells[1], s("b"));
        assert_eq!(out.table.rows[3].cells[1], CellValue::Null);
    }

    #[test]
    fn test_sort_on_pruned_column_is_skipped_with_diagnostic() {
        let config = PostProcessConfig {
            missing_threshold_percent: 50.0,
            sort_column: Some("sparse".to_string()),
            ..Default::default()
        };
        let table = sample();
        let out = post_process(&table, &config);

        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::SortColumnMissing);
        assert_eq!(out.table.rows[0], {
            let mut r = table.rows[0].clone();
            r.cells.remove(2);
            r
        });
    }

    #[test]
    fn test_empty_table_prunes_nothing() {
        let table = CombinedTable {
            columns: columns_from_names(["a"]),
            rows: Vec::new(),
            provenance_column: SOURCE_COLUMN.to_string(),
            sources: Vec::new(),
        };
        let config = PostProcessConfig {
            missing_threshold_percent: 0.0,
            ..Default::default()
        };
        assert_eq!(post_process(&table, &config).table.column_count(), 1);
    }
}
