//! Batch driver: uploads in, one combined table plus diagnostics out

use crate::archive::expand_archive;
use crate::error::{Diagnostic, Error, Result, Stage};
use crate::merger::{reconcile, AlignmentStrategy};
use crate::parser::{read_table, ReadMode, ReadOptions};
use crate::source::{SourceFile, SourceKind};
use crate::table::{CombinedTable, Table};
use serde::{Deserialize, Serialize};

/// How a batch is read and aligned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    pub read: ReadOptions,
    pub strategy: AlignmentStrategy,
}

impl BatchOptions {
    /// Raw mode has no meaningful column names, so it always stacks by position
    pub fn effective_strategy(&self) -> AlignmentStrategy {
        match self.read.mode {
            ReadMode::RawPositional => AlignmentStrategy::Positional,
            ReadMode::TypedHeader => self.strategy,
        }
    }
}

/// Everything a batch produced
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// `None` when no table survived ingestion
    pub combined: Option<CombinedTable>,
    /// Logical names of the tables that were merged, in order
    pub tables_read: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BatchOutcome {
    /// Turn an empty outcome into [`Error::NoDataToMerge`]
    pub fn into_result(self) -> Result<CombinedTable> {
        self.combined.ok_or(Error::NoDataToMerge)
    }
}

/// Process uploads in order. Per-file failures become diagnostics and never stop
/// the batch.
pub fn process_batch(sources: &[SourceFile], options: &BatchOptions) -> BatchOutcome {
    process_batch_with_progress(sources, options, |_, _, _| {})
}

/// Like [`process_batch`], calling `progress(done, total, name)` after each upload
pub fn process_batch_with_progress<F>(
    sources: &[SourceFile],
    options: &BatchOptions,
    mut progress: F,
) -> BatchOutcome
where
    F: FnMut(usize, usize, &str),
{
    let mut tables: Vec<Table> = Vec::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    for (i, source) in sources.iter().enumerate() {
        match source.kind {
            SourceKind::Tabular => {
                ingest(&source.name, &source.bytes, &options.read, &mut tables, &mut diagnostics);
            }
            SourceKind::Archive => match expand_archive(&source.name, &source.bytes) {
                Ok(members) if members.is_empty() => {
                    let err = Error::NoTabularFilesFound(source.name.clone());
                    diagnostics.push(Diagnostic::from_error(Stage::Expand, &err));
                }
                Ok(members) => {
                    for member in &members {
                        ingest(
                            &member.name,
                            &member.bytes,
                            &options.read,
                            &mut tables,
                            &mut diagnostics,
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!("{}", err);
                    diagnostics.push(Diagnostic::from_error(Stage::Expand, &err));
                }
            },
            SourceKind::Unsupported => {
                let err = Error::UnsupportedFile(source.name.clone());
                tracing::warn!("{}", err);
                diagnostics.push(Diagnostic::from_error(Stage::Discover, &err));
            }
        }

        progress(i + 1, sources.len(), &source.name);
    }

    let tables_read: Vec<String> = tables.iter().map(|t| t.source.clone()).collect();
    let combined = reconcile(tables, options.effective_strategy());

    if combined.is_none() {
        tracing::warn!(inputs = sources.len(), "no tables survived ingestion");
    }

    BatchOutcome {
        combined,
        tables_read,
        diagnostics,
    }
}

fn ingest(
    name: &str,
    bytes: &[u8],
    read: &ReadOptions,
    tables: &mut Vec<Table>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match read_table(name, bytes, read) {
        Ok(Some(table)) => tables.push(table),
        Ok(None) => {}
        Err(err) => {
            tracing::warn!("{}", err);
            diagnostics.push(Diagnostic::from_error(Stage::Read, &err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::build_zip;
    use crate::error::DiagnosticKind;
    use crate::table::{CellValue, SOURCE_COLUMN};

    fn csv(name: &str, content: &str) -> SourceFile {
        SourceFile::new(name, content.as_bytes().to_vec())
    }

    #[test]
    fn test_mixed_batch_continues_past_failures() {
        let zip = build_zip(&[
            ("inner/sales.csv", b"id,amount\n3,30\n"),
            ("__MACOSX/inner/._sales.csv", b"junk"),
        ]);
        let sources = vec![
            csv("a.csv", "id,amount\n1,10\n2,20\n"),
            SourceFile::new("broken.zip", b"not a zip".to_vec()),
            csv("bad.csv", "id\n1,2,3\n"),
            SourceFile::new("bundle.zip", zip),
            csv("notes.txt", "hello"),
        ];

        let outcome = process_batch(&sources, &BatchOptions::default());

        assert_eq!(outcome.tables_read, vec!["a.csv", "bundle.zip -> sales.csv"]);
        let kinds: Vec<DiagnosticKind> = outcome.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::CorruptArchive,
                DiagnosticKind::UnreadableFile,
                DiagnosticKind::UnsupportedFile,
            ]
        );
        assert_eq!(outcome.diagnostics[1].file.as_deref(), Some("bad.csv"));

        let table = outcome.into_result().unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(
            table.value(2, SOURCE_COLUMN),
            Some(&CellValue::String("bundle.zip -> sales.csv".to_string()))
        );
    }

    #[test]
    fn test_archive_without_csv_is_reported() {
        let zip = build_zip(&[("readme.txt", b"hi")]);
        let sources = vec![SourceFile::new("docs.zip", zip), csv("a.csv", "x\n1\n")];

        let outcome = process_batch(&sources, &BatchOptions::default());

        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::NoTabularFilesFound);
        assert_eq!(outcome.diagnostics[0].stage, Stage::Expand);
        assert!(outcome.combined.is_some());
    }

    #[test]
    fn test_blank_file_in_raw_mode_is_silent() {
        let options = BatchOptions {
            read: ReadOptions::raw(true),
            strategy: AlignmentStrategy::Union,
        };
        let sources = vec![csv("blank.csv", ""), csv("data.csv", "1,2\n")];

        let outcome = process_batch(&sources, &options);

        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.tables_read, vec!["data.csv"]);
        assert_eq!(outcome.combined.unwrap().row_count(), 1);
    }

    #[test]
    fn test_blank_file_in_typed_mode_is_reported() {
        let sources = vec![csv("blank.csv", ""), csv("data.csv", "a\n1\n")];

        let outcome = process_batch(&sources, &BatchOptions::default());

        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::UnreadableFile);
        assert_eq!(outcome.diagnostics[0].file.as_deref(), Some("blank.csv"));
        assert_eq!(outcome.combined.unwrap().row_count(), 1);
    }

    #[test]
    fn test_nothing_to_merge() {
        let outcome = process_batch(&[csv("blank.csv", "")], &BatchOptions::default());

        assert!(outcome.combined.is_none());
        assert!(matches!(outcome.into_result(), Err(Error::NoDataToMerge)));
    }

    #[test]
    fn test_raw_mode_forces_positional() {
        let options = BatchOptions {
            read: ReadOptions::raw(true),
            strategy: AlignmentStrategy::Intersection,
        };
        assert_eq!(options.effective_strategy(), AlignmentStrategy::Positional);

        let sources = vec![csv("one.csv", "a\n"), csv("two.csv", "b,c\n")];
        let table = process_batch(&sources, &options).into_result().unwrap();

        assert_eq!(
            table.column_names(),
            vec!["Source_File", "Column_1", "Column_2"]
        );
        assert_eq!(table.rows[0].cells[2], CellValue::Null);
    }

    #[test]
    fn test_progress_reports_each_upload() {
        let sources = vec![csv("a.csv", "x\n1\n"), csv("b.txt", "")];
        let mut seen = Vec::new();

        process_batch_with_progress(&sources, &BatchOptions::default(), |done, total, name| {
            seen.push(format!("{done}/{total} {name}"));
        });

        assert_eq!(seen, vec!["1/2 a.csv", "2/2 b.txt"]);
    }
}
