//! Prediction records and the summaries consumers read from them.

use crate::{
    error::{PipelineError, PipelineResult},
    features::{FeatureFrame, FeatureRecord},
    schema,
    threshold::Cutoff,
    types::{ClientId, ContractId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One scored contract. `contract_id`, `cancel_probability` and
/// `will_cancel` are the columns every consumer relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub contract_id:             ContractId,
    pub client_id:               ClientId,
    pub insurance_type:          Option<String>,
    pub gender:                  Option<String>,
    pub education:               Option<String>,
    pub sales_channel:           Option<String>,
    pub age:                     Option<f64>,
    pub monthly_income:          Option<f64>,
    pub monthly_premium:         Option<f64>,
    pub satisfaction_score:      Option<f64>,
    pub duration_days:           Option<f64>,
    pub auto_renewal:            Option<f64>,
    pub dependents:              Option<f64>,
    pub premium_to_income_ratio: Option<f64>,
    pub age_income_interaction:  Option<f64>,
    pub cancel_probability:      f64,
    pub will_cancel:             u8,
}

impl PredictionRecord {
    /// Pair every frame row with its probability and decision.
    pub fn from_scores(
        frame: &FeatureFrame,
        probabilities: &[f64],
        cutoff: Cutoff,
    ) -> PipelineResult<Vec<PredictionRecord>> {
        if frame.len() != probabilities.len() {
            return Err(PipelineError::SchemaMismatch(format!(
                "{} rows scored but frame has {}", probabilities.len(), frame.len()
            )));
        }

        let num = |r: &FeatureRecord, name: &str| frame.numeric(r, name).filter(|v| !v.is_nan());
        let cat = |r: &FeatureRecord, name: &str| frame.categorical(r, name).map(str::to_string);

        Ok(frame.records.iter().zip(probabilities).map(|(r, &p)| PredictionRecord {
            contract_id:             r.contract_id.clone(),
            client_id:               r.client_id.clone(),
            insurance_type:          cat(r, schema::INSURANCE_TYPE),
            gender:                  cat(r, schema::GENDER),
            education:               cat(r, schema::EDUCATION),
            sales_channel:           cat(r, schema::SALES_CHANNEL),
            age:                     num(r, schema::AGE),
            monthly_income:          num(r, schema::MONTHLY_INCOME),
            monthly_premium:         num(r, schema::MONTHLY_PREMIUM),
            satisfaction_score:      num(r, schema::SATISFACTION_SCORE),
            duration_days:           num(r, schema::DURATION_DAYS),
            auto_renewal:            num(r, schema::AUTO_RENEWAL),
            dependents:              num(r, schema::DEPENDENTS),
            premium_to_income_ratio: num(r, schema::PREMIUM_TO_INCOME_RATIO),
            age_income_interaction:  num(r, schema::AGE_INCOME_INTERACTION),
            cancel_probability:      p,
            will_cancel:             cutoff.decide(p),
        }).collect())
    }
}

/// Rows flagged at `cutoff`, highest probability first (ties by contract id).
/// The stored flag is ignored; each consumer applies its own cutoff.
pub fn at_risk(records: &[PredictionRecord], cutoff: Cutoff) -> Vec<PredictionRecord> {
    let mut flagged: Vec<PredictionRecord> = records.iter()
        .filter(|r| cutoff.decide(r.cancel_probability) == 1)
        .cloned()
        .map(|mut r| {
            r.will_cancel = 1;
            r
        })
        .collect();
    flagged.sort_by(|a, b| {
        b.cancel_probability.total_cmp(&a.cancel_probability)
            .then_with(|| a.contract_id.cmp(&b.contract_id))
    });
    flagged
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsuranceTypeRisk {
    pub scored:  usize,
    pub at_risk: usize,
}

/// Headline figures for a scoring snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub cutoff:                f64,
    pub contracts_scored:      usize,
    pub contracts_at_risk:     usize,
    pub clients_scored:        usize,
    pub clients_at_risk:       usize,
    pub mean_probability:      f64,
    pub by_insurance_type:     BTreeMap<String, InsuranceTypeRisk>,
}

impl PredictionSummary {
    pub fn compute(records: &[PredictionRecord], cutoff: Cutoff) -> Self {
        let mut by_insurance_type: BTreeMap<String, InsuranceTypeRisk> = BTreeMap::new();
        let mut clients = BTreeSet::new();
        let mut clients_at_risk = BTreeSet::new();
        let mut contracts_at_risk = 0;

        for r in records {
            let flagged = cutoff.decide(r.cancel_probability) == 1;
            let key = r.insurance_type.clone().unwrap_or_else(|| "unknown".into());
            let entry = by_insurance_type.entry(key).or_default();
            entry.scored += 1;
            clients.insert(r.client_id.as_str());
            if flagged {
                entry.at_risk += 1;
                contracts_at_risk += 1;
                clients_at_risk.insert(r.client_id.as_str());
            }
        }

        let mean_probability = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.cancel_probability).sum::<f64>() / records.len() as f64
        };

        Self {
            cutoff: cutoff.value(),
            contracts_scored: records.len(),
            contracts_at_risk,
            clients_scored: clients.len(),
            clients_at_risk: clients_at_risk.len(),
            mean_probability,
            by_insurance_type,
        }
    }
}
