//! Job files describing a whole merge run, and the report written after one

use crate::batch::BatchOptions;
use crate::error::{Diagnostic, Error, Result};
use crate::merger::AlignmentStrategy;
use crate::parser::ReadMode;
use crate::postprocess::PostProcessConfig;
use crate::table::CombinedTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A merge run stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeJob {
    /// Files or directories to read
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub options: BatchOptions,
    #[serde(default)]
    pub post_process: PostProcessConfig,
    /// Defaults to the read mode's suggested file name
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Defaults to true in typed mode, false in raw mode
    #[serde(default)]
    pub include_header: Option<bool>,
}

impl MergeJob {
    /// Create a job over `inputs` with default options
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            options: BatchOptions::default(),
            post_process: PostProcessConfig::default(),
            output: None,
            include_header: None,
        }
    }

    /// Load a job file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the job file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.options.read.mode.default_output_name()))
    }

    pub fn include_header(&self) -> bool {
        self.include_header
            .unwrap_or_else(|| self.options.read.mode.default_include_header())
    }
}

/// Summary of one run, for machine consumption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub inputs: Vec<String>,
    pub tables_read: Vec<String>,
    pub read_mode: ReadMode,
    pub strategy: AlignmentStrategy,
    pub rows: usize,
    pub columns: usize,
    pub source_files: Option<usize>,
    pub duplicates_removed: usize,
    pub dropped_columns: Vec<String>,
    pub output: Option<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// Start a report for a run over `inputs`
    pub fn new(inputs: Vec<String>, options: &BatchOptions) -> Self {
        Self {
            generated_at: Utc::now(),
            inputs,
            tables_read: Vec::new(),
            read_mode: options.read.mode,
            strategy: options.effective_strategy(),
            rows: 0,
            columns: 0,
            source_files: None,
            duplicates_removed: 0,
            dropped_columns: Vec::new(),
            output: None,
            diagnostics: Vec::new(),
        }
    }

    /// Record the shape of the final table
    pub fn record_table(&mut self, table: &CombinedTable) {
        self.rows = table.row_count();
        self.columns = table.column_count();
        self.source_files = table.source_count();
    }

    /// Save the report to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ReadOptions;

    #[test]
    fn test_job_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");

        let mut job = MergeJob::new(vec![PathBuf::from("data")]);
        job.options.strategy = AlignmentStrategy::Intersection;
        job.post_process.sort_column = Some("id".to_string());
        job.save(&path).unwrap();

        assert_eq!(MergeJob::load(&path).unwrap(), job);
    }

    #[test]
    fn test_minimal_job_uses_defaults() {
        let job: MergeJob = serde_json::from_str(r#"{"inputs": ["a.csv"]}"#).unwrap();

        assert_eq!(job.options, BatchOptions::default());
        assert_eq!(job.output_path(), PathBuf::from("combined_dataset.csv"));
        assert!(job.include_header());
    }

    #[test]
    fn test_raw_job_defaults() {
        let json = r#"{
            "inputs": ["dir"],
            "options": {"read": {"mode": "raw", "clean_empty": true}, "strategy": "union"}
        }"#;
        let job: MergeJob = serde_json::from_str(json).unwrap();

        assert_eq!(job.options.read, ReadOptions::raw(true));
        assert_eq!(job.options.effective_strategy(), AlignmentStrategy::Positional);
        assert_eq!(job.output_path(), PathBuf::from("stacked_data.csv"));
        assert!(!job.include_header());
    }

    #[test]
    fn test_load_missing_job() {
        assert!(matches!(
            MergeJob::load("/no/such/job.json"),
            Err(Error::FileRead { .. })
        ));
    }

    #[test]
    fn test_report_records_strategy_and_shape() {
        let options = BatchOptions {
            read: ReadOptions::raw(true),
            strategy: AlignmentStrategy::Union,
        };
        let report = RunReport::new(vec!["a.csv".to_string()], &options);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["read_mode"], "raw");
        assert_eq!(json["strategy"], "positional");
        assert_eq!(json["rows"], 0);
    }
}
