use super::ChurnStore;
use crate::{
    error::{PipelineError, PipelineResult},
    prediction::PredictionRecord,
    threshold::Cutoff,
};
use rusqlite::params;

/// The stored result of the most recent scoring run.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSnapshot {
    pub scoring_run_id: String,
    pub bundle_id:      String,
    pub cutoff:         f64,
    pub scored_at:      String,
    pub records:        Vec<PredictionRecord>,
}

impl ChurnStore {
    /// Replace the prediction table with one run's records.
    /// Delete and insert share a transaction, so a reader never sees a
    /// half-written snapshot.
    pub fn replace_predictions(
        &self,
        scoring_run_id: &str,
        bundle_id: &str,
        cutoff: Cutoff,
        scored_at: &str,
        records: &[PredictionRecord],
    ) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM contract_prediction", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO contract_prediction (
                    contract_id, client_id, insurance_type, cancel_probability,
                    will_cancel, cutoff, bundle_id, scoring_run_id, scored_at, record_json
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            )?;
            for r in records {
                let json = serde_json::to_string(r)?;
                stmt.execute(params![
                    r.contract_id,
                    r.client_id,
                    r.insurance_type,
                    r.cancel_probability,
                    r.will_cancel as i64,
                    cutoff.value(),
                    bundle_id,
                    scoring_run_id,
                    scored_at,
                    json,
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("store: replaced predictions with {} row(s) run={scoring_run_id}", records.len());
        Ok(())
    }

    /// The stored snapshot, or `None` if no run has been persisted.
    pub fn latest_predictions(&self) -> PipelineResult<Option<PredictionSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT scoring_run_id, bundle_id, cutoff, scored_at, record_json
             FROM contract_prediction
             ORDER BY cancel_probability DESC, contract_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?.collect::<Result<Vec<_>, _>>()?;

        let Some((run_id, bundle_id, cutoff, scored_at, _)) = rows.first().cloned() else {
            return Ok(None);
        };
        let records = rows.iter()
            .map(|(_, _, _, _, json)| serde_json::from_str::<PredictionRecord>(json))
            .collect::<Result<Vec<_>, _>>()
            .map_err(PipelineError::from)?;

        Ok(Some(PredictionSnapshot {
            scoring_run_id: run_id,
            bundle_id,
            cutoff,
            scored_at,
            records,
        }))
    }
}
