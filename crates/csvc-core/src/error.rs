//! Error and diagnostic types for csvc-core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in csvc-core
#[derive(Debug, Error)]
pub enum Error {
    /// The archive container could not be opened or listed
    #[error("'{name}' is not a valid ZIP archive: {source}")]
    CorruptArchive {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// An archive member could not be read back out of the container
    #[error("failed to read '{member}' from archive '{name}': {source}")]
    ArchiveMember {
        name: String,
        member: String,
        #[source]
        source: std::io::Error,
    },

    /// The archive held no tabular members
    #[error("no CSV files found inside the ZIP: {0}")]
    NoTabularFilesFound(String),

    /// Malformed tabular content
    #[error("failed to parse CSV '{name}': {message}")]
    UnreadableFile { name: String, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{name}': {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    /// Zero-byte or fully blank input
    #[error("'{0}' is empty")]
    EmptyInput(String),

    /// Input whose name is neither tabular nor an archive
    #[error("skipped unsupported file format: {0}")]
    UnsupportedFile(String),

    /// Nothing survived ingestion
    #[error("no data to merge")]
    NoDataToMerge,

    /// Sort requested on a column that is not present
    #[error("could not sort by column '{0}': column not present")]
    SortColumnMissing(String),

    /// Unknown option spelling
    #[error("invalid {kind} '{value}', expected one of: {expected}")]
    InvalidOption {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pipeline stage a diagnostic was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    Expand,
    Read,
    PostProcess,
}

/// Caller-facing classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    CorruptArchive,
    NoTabularFilesFound,
    UnreadableFile,
    UnsupportedFile,
    NoDataToMerge,
    SortColumnMissing,
    Other,
}

/// A non-fatal problem recorded while processing a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub stage: Stage,
    /// Logical file name the problem belongs to, if any
    pub file: Option<String>,
    pub message: String,
}

impl Diagnostic {
    /// Build a diagnostic from an error raised at `stage`
    pub fn from_error(stage: Stage, error: &Error) -> Self {
        Self {
            kind: error.kind(),
            stage,
            file: error.file_name().map(str::to_string),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.stage, self.message)
    }
}

impl Error {
    /// Classify this error for diagnostics. Blank input outside raw cleaning mode is
    /// reported as an unreadable file.
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Error::CorruptArchive { .. } | Error::ArchiveMember { .. } => {
                DiagnosticKind::CorruptArchive
            }
            Error::NoTabularFilesFound(_) => DiagnosticKind::NoTabularFilesFound,
            Error::UnreadableFile { .. }
            | Error::Csv { .. }
            | Error::EmptyInput(_)
            | Error::FileRead { .. }
            | Error::WalkDir(_) => DiagnosticKind::UnreadableFile,
            Error::UnsupportedFile(_) => DiagnosticKind::UnsupportedFile,
            Error::NoDataToMerge => DiagnosticKind::NoDataToMerge,
            Error::SortColumnMissing(_) => DiagnosticKind::SortColumnMissing,
            _ => DiagnosticKind::Other,
        }
    }

    /// The logical file name carried by this error
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Error::CorruptArchive { name, .. }
            | Error::ArchiveMember { name, .. }
            | Error::UnreadableFile { name, .. }
            | Error::Csv { name, .. } => Some(name.as_str()),
            Error::NoTabularFilesFound(name)
            | Error::EmptyInput(name)
            | Error::UnsupportedFile(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_reported_as_unreadable() {
        let err = Error::EmptyInput("blank.csv".to_string());
        let diag = Diagnostic::from_error(Stage::Read, &err);

        assert_eq!(diag.kind, DiagnosticKind::UnreadableFile);
        assert_eq!(diag.file.as_deref(), Some("blank.csv"));
        assert_eq!(diag.message, "'blank.csv' is empty");
    }

    #[test]
    fn test_diagnostic_serializes_snake_case() {
        let diag = Diagnostic::from_error(
            Stage::PostProcess,
            &Error::SortColumnMissing("price".to_string()),
        );
        let json = serde_json::to_value(&diag).unwrap();

        assert_eq!(json["kind"], "sort_column_missing");
        assert_eq!(json["stage"], "post_process");
        assert!(json["file"].is_null());
    }
}
