//! csvc-core: Core library for combining batches of CSV files
//!
//! This library provides functionality to:
//! - Classify uploads and discover CSV/ZIP files on disk
//! - Expand ZIP archives in memory into their CSV members
//! - Parse CSV streams in typed-header or raw-positional mode
//! - Reconcile many tables into one (union, intersection or positional) with provenance
//! - Prune sparse columns, drop duplicate rows and sort
//! - Export the result back to CSV bytes

pub mod archive;
pub mod batch;
pub mod error;
pub mod export;
pub mod job;
pub mod merger;
pub mod parser;
pub mod postprocess;
pub mod source;
pub mod table;

pub use archive::expand_archive;
pub use batch::{process_batch, process_batch_with_progress, BatchOptions, BatchOutcome};
pub use error::{Diagnostic, DiagnosticKind, Error, Result, Stage};
pub use export::export_csv;
pub use job::{MergeJob, RunReport};
pub use merger::{reconcile, AlignmentStrategy};
pub use parser::{read_table, ReadMode, ReadOptions};
pub use postprocess::{post_process, PostProcessConfig, PostProcessed};
pub use source::{discover_inputs, SourceFile, SourceKind};
pub use table::{CellValue, Column, CombinedTable, Row, Table};
