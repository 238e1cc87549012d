use crate::dataset::cell_text;
use crate::error::ExportError;
use crate::models::Tabular;

/// UTF-8, comma-delimited, header row first. Nulls are written as empty
/// fields, which read back as nulls.
pub fn to_csv<T: Tabular + ?Sized>(table: &T) -> Result<Vec<u8>, ExportError> {
    let mut writer = ::csv::WriterBuilder::new()
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(cell_text))?;
    }
    writer
        .into_inner()
        .map_err(|error| ExportError::Io(error.into_error()))
}
