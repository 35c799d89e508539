//! Input files: classification by name and discovery on disk

use crate::error::{Diagnostic, Error, Result, Stage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Suffix identifying tabular files
pub const TABULAR_EXTENSION: &str = ".csv";

/// Suffix identifying archives
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// What a named byte stream claims to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Tabular,
    Archive,
    Unsupported,
}

impl SourceKind {
    /// Classify by case-insensitive suffix
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(TABULAR_EXTENSION) {
            SourceKind::Tabular
        } else if lower.ends_with(ARCHIVE_EXTENSION) {
            SourceKind::Archive
        } else {
            SourceKind::Unsupported
        }
    }
}

/// A named, in-memory upload
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub kind: SourceKind,
}

impl SourceFile {
    /// Wrap bytes under a logical name
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let kind = SourceKind::from_name(&name);
        Self { name, bytes, kind }
    }

    /// Read a file from disk; the logical name is its file name
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }
}

/// Expand input paths into the files to process.
///
/// Directories are walked for `.csv` and `.zip` files, sorted by path. Plain file
/// arguments are kept in the order given, even when unsupported, so the batch can
/// report them. Entries the walk cannot reach become diagnostics; the rest of the
/// directory is still returned.
pub fn discover_inputs<P: AsRef<Path>>(paths: &[P]) -> (Vec<PathBuf>, Vec<Diagnostic>) {
    let mut found = Vec::new();
    let mut diagnostics = Vec::new();

    for path in paths {
        let path = path.as_ref();

        if !path.is_dir() {
            found.push(path.to_path_buf());
            continue;
        }

        let mut in_dir: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(path).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let file = e.path().map(|p| p.display().to_string());
                    let error = Error::WalkDir(e);
                    tracing::warn!(dir = %path.display(), "{}", error);

                    let mut diagnostic = Diagnostic::from_error(Stage::Discover, &error);
                    diagnostic.file = file;
                    diagnostics.push(diagnostic);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let kind = SourceKind::from_name(&entry.file_name().to_string_lossy());
            if kind != SourceKind::Unsupported {
                in_dir.push(entry.into_path());
            }
        }
        in_dir.sort();

        tracing::debug!(dir = %path.display(), files = in_dir.len(), "scanned directory");
        found.extend(in_dir);
    }

    (found, diagnostics)
}
