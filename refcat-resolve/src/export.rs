//! CSV export of finalized records
//!
//! Fixed column contract, one row per record in batch order:
//! `paper_title, year, first_author_name, first_author_affiliations,
//! first_author_emails, last_author_name, last_author_affiliations,
//! last_author_emails, reference_raw, notes`

use crate::types::{ReferenceRecord, ResolveError, ResolveResult};
use refcat_common::config::PipelineConfig;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const COLUMNS: [&str; 10] = [
    "paper_title",
    "year",
    "first_author_name",
    "first_author_affiliations",
    "first_author_emails",
    "last_author_name",
    "last_author_affiliations",
    "last_author_emails",
    "reference_raw",
    "notes",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub paper_title: String,
    /// Empty cell when absent
    pub year: String,
    pub first_author_name: String,
    pub first_author_affiliations: String,
    pub first_author_emails: String,
    pub last_author_name: String,
    pub last_author_affiliations: String,
    pub last_author_emails: String,
    pub reference_raw: String,
    pub notes: String,
}

impl ExportRow {
    pub fn from_record(record: &ReferenceRecord, config: &PipelineConfig) -> Self {
        let list = |values: &[String]| values.join(&config.list_delimiter);

        Self {
            paper_title: record.title.clone(),
            year: record.year.map(|y| y.to_string()).unwrap_or_default(),
            first_author_name: record.first_author.name.clone(),
            first_author_affiliations: list(&record.first_author.affiliations),
            first_author_emails: list(&record.first_author.emails),
            last_author_name: record.last_author.name.clone(),
            last_author_affiliations: list(&record.last_author.affiliations),
            last_author_emails: list(&record.last_author.emails),
            reference_raw: record.reference_raw.clone(),
            notes: record.notes.join(&config.notes_delimiter),
        }
    }
}

/// Write records as CSV to any writer
///
/// The header row is written even for an empty batch.
pub fn write_csv<W: Write>(
    writer: W,
    records: &[ReferenceRecord],
    config: &PipelineConfig,
) -> ResolveResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer
        .write_record(COLUMNS)
        .map_err(|e| ResolveError::Export(format!("Failed to write header: {}", e)))?;
    for record in records {
        csv_writer
            .serialize(ExportRow::from_record(record, config))
            .map_err(|e| ResolveError::Export(format!("Failed to write row: {}", e)))?;
    }
    csv_writer
        .flush()
        .map_err(|e| ResolveError::Export(format!("Failed to flush CSV output: {}", e)))?;
    Ok(())
}

/// Write records to a CSV file, creating or truncating it
pub fn export_csv(
    path: &Path,
    records: &[ReferenceRecord],
    config: &PipelineConfig,
) -> ResolveResult<()> {
    let file = std::fs::File::create(path).map_err(|e| {
        ResolveError::Export(format!("Cannot create {}: {}", path.display(), e))
    })?;
    write_csv(std::io::BufWriter::new(file), records, config)?;
    info!(path = %path.display(), rows = records.len(), "Exported records");
    Ok(())
}
