//! CSV serialization of a combined table

use crate::error::Result;
use crate::table::CombinedTable;

/// Serialize rows in their current order as UTF-8 CSV.
///
/// Fields holding a comma, quote or line break are quoted, with embedded quotes
/// doubled. Nulls become empty fields.
pub fn export_csv(table: &CombinedTable, include_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    if include_header {
        writer
            .write_record(table.columns.iter().map(|c| c.name.as_str()))
            .map_err(std::io::Error::from)?;
    }

    for row in &table.rows {
        writer
            .write_record(row.cells.iter().map(|c| c.to_string_value()))
            .map_err(std::io::Error::from)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    tracing::debug!(rows = table.row_count(), bytes = bytes.len(), include_header, "exported CSV");
    Ok(bytes)
}
