//! Serializes tabular results into downloadable documents.
//!
//! Every exporter is pure: the same table always produces the same bytes,
//! and a table without rows still produces a valid document with its header.

pub mod csv;
pub mod excel;
pub mod pdf;

pub use self::csv::to_csv;
pub use self::excel::to_excel;
pub use self::pdf::to_pdf;

use crate::error::{ConfigError, ExportError};
use crate::models::Tabular;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Excel,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(ConfigError::Invalid(format!("unknown export format {other:?}"))),
        }
    }
}

/// Renders every column of `table` in `format`.
pub fn export<T: Tabular + ?Sized>(table: &T, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => to_csv(table),
        ExportFormat::Excel => to_excel(table),
        ExportFormat::Pdf => to_pdf(table, table.columns()),
    }
}
