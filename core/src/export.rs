//! CSV export of a scoring snapshot.
//!
//! The file is rebuilt in full on every run and swapped into place, so a
//! reader sees either the previous snapshot or the new one.

use crate::{
    artifact::StagedFile,
    error::{PipelineError, PipelineResult},
    prediction::PredictionRecord,
};
use std::path::Path;

/// Columns the dashboard cannot work without.
pub const REQUIRED_COLUMNS: [&str; 3] = ["contract_id", "cancel_probability", "will_cancel"];

/// Header of an exported snapshot, in `PredictionRecord` field order.
pub const CSV_COLUMNS: [&str; 17] = [
    "contract_id",
    "client_id",
    "insurance_type",
    "gender",
    "education",
    "sales_channel",
    "age",
    "monthly_income",
    "monthly_premium",
    "satisfaction_score",
    "duration_days",
    "auto_renewal",
    "dependents",
    "premium_to_income_ratio",
    "age_income_interaction",
    "cancel_probability",
    "will_cancel",
];

pub fn to_csv_bytes(records: &[PredictionRecord]) -> PipelineResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.into_inner().map_err(|e| PipelineError::Io(e.into_error()))
}

/// Write the snapshot next to `path` without making it visible yet.
/// `StagedFile::commit` publishes it.
pub fn stage_csv(path: &Path, records: &[PredictionRecord]) -> PipelineResult<StagedFile> {
    let bytes = to_csv_bytes(records)?;
    StagedFile::write(path, &bytes)
}

pub fn export_csv(path: &Path, records: &[PredictionRecord]) -> PipelineResult<()> {
    stage_csv(path, records)?.commit()?;
    log::info!("export: wrote {} prediction row(s) to {}", records.len(), path.display());
    Ok(())
}

/// Read a snapshot back, checking the required columns are present.
pub fn read_csv(path: &Path) -> PipelineResult<Vec<PredictionRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(PipelineError::MissingColumn {
                view: path.display().to_string(),
                column: column.to_string(),
            });
        }
    }
    let records = reader.deserialize().collect::<Result<Vec<PredictionRecord>, _>>()?;
    Ok(records)
}
