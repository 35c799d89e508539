//! In-memory ZIP expansion

use crate::error::{Error, Result};
use crate::source::{SourceFile, SourceKind};
use std::io::{Cursor, Read};

/// Entries under this prefix are platform metadata, never data
pub const METADATA_PREFIX: &str = "__MACOSX/";

/// Separator between archive name and member name in composite names
pub const COMPOSITE_SEPARATOR: &str = " -> ";

/// Check if an archive entry should be handed to the table reader
pub fn is_candidate(entry_name: &str) -> bool {
    !entry_name.starts_with(METADATA_PREFIX)
        && !entry_name.ends_with('/')
        && SourceKind::from_name(entry_name) == SourceKind::Tabular
}

/// `archive -> member`, with directory components of the member dropped
pub fn composite_name(archive_name: &str, entry_name: &str) -> String {
    format!("{archive_name}{COMPOSITE_SEPARATOR}{}", base_name(entry_name))
}

fn base_name(entry_name: &str) -> &str {
    entry_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(entry_name)
}

/// Extract the tabular members of a ZIP held in memory, in archive order.
///
/// An archive with no candidates yields an empty list; the caller decides whether that
/// is worth a diagnostic.
pub fn expand_archive(name: &str, bytes: &[u8]) -> Result<Vec<SourceFile>> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::CorruptArchive {
            name: name.to_string(),
            source: e,
        })?;

    let mut members = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| Error::CorruptArchive {
            name: name.to_string(),
            source: e,
        })?;

        let entry_name = entry.name().to_string();
        if entry.is_dir() || !is_candidate(&entry_name) {
            tracing::debug!(archive = name, entry = %entry_name, "skipping archive entry");
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| Error::ArchiveMember {
                name: name.to_string(),
                member: entry_name.clone(),
                source: e,
            })?;

        members.push(SourceFile::new(composite_name(name, &entry_name), data));
    }

    if members.is_empty() {
        tracing::warn!(archive = name, "no CSV files found inside archive");
    } else {
        tracing::debug!(archive = name, members = members.len(), "expanded archive");
    }

    Ok(members)
}

#[cfg(test)]
pub(crate) fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (entry_name, content) in files {
        if entry_name.ends_with('/') {
            writer.add_directory(entry_name.to_string(), options).unwrap();
        } else {
            writer.start_file(entry_name.to_string(), options).unwrap();
            writer.write_all(content).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}
