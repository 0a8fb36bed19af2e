//! Feature extraction: raw contract rows to an engineered feature frame.
//!
//! Derived columns:
//!   - `age`: calendar-year difference between the reference date and the
//!     birth date. Birthdays later in the year are NOT accounted for; this
//!     matches how the source has always computed age and is kept on purpose.
//!   - `duration_days`: end date minus start date, in days.
//!   - `premium_to_income_ratio`: premium / income, missing when income is
//!     zero or absent.
//!   - `age_income_interaction`: age * income.
//!
//! Missing numeric values are `f64::NAN`, never zero.

use crate::{
    error::{PipelineError, PipelineResult},
    schema::{self, FeatureSchema},
    source::{ContractRow, ContractSource},
    types::{ClientId, Cohort, ContractId, ContractStatus, Label},
};
use chrono::{Datelike, NaiveDate};

/// One engineered row. Values are aligned with the frame schema:
/// `categorical` follows `schema.categorical_features()`, `numeric`
/// follows `schema.numeric_features()`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub contract_id: ContractId,
    pub client_id:   ClientId,
    pub categorical: Vec<Option<String>>,
    pub numeric:     Vec<f64>,
    pub label:       Option<Label>,
}

#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub schema:  FeatureSchema,
    pub records: Vec<FeatureRecord>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Labels for every row. Fails if any row is unlabeled (active cohort).
    pub fn labels(&self) -> PipelineResult<Vec<Label>> {
        self.records.iter()
            .map(|r| r.label.ok_or_else(|| PipelineError::DataUnavailable(format!(
                "contract {} has no label; only historical contracts can be trained on",
                r.contract_id
            ))))
            .collect()
    }

    /// Value of a numeric feature for one record.
    pub fn numeric(&self, record: &FeatureRecord, name: &str) -> Option<f64> {
        self.schema.numeric_features().iter()
            .position(|n| *n == name)
            .map(|i| record.numeric[i])
    }

    /// Value of a categorical feature for one record.
    pub fn categorical<'a>(&self, record: &'a FeatureRecord, name: &str) -> Option<&'a str> {
        self.schema.categorical_features().iter()
            .position(|n| *n == name)
            .and_then(|i| record.categorical[i].as_deref())
    }

    /// A new frame with only the given rows, in the given order.
    pub fn subset(&self, indices: &[usize]) -> FeatureFrame {
        FeatureFrame {
            schema:  self.schema.clone(),
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }
}

pub struct FeatureExtractor {
    as_of:  NaiveDate,
    schema: FeatureSchema,
}

impl FeatureExtractor {
    /// `as_of` is the reference date ages are computed against.
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of, schema: FeatureSchema::canonical() }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Pull `cohort` from the source and extract it. An empty result is a
    /// data-unavailable error, never an empty frame.
    pub fn extract_from<S: ContractSource + ?Sized>(
        &self,
        source: &S,
        cohort: Cohort,
    ) -> PipelineResult<FeatureFrame> {
        let rows = source.contract_rows(cohort)?;
        if rows.is_empty() {
            return Err(PipelineError::DataUnavailable(format!(
                "{} returned no {cohort:?} contracts",
                source.describe()
            )));
        }
        let frame = self.extract(&rows, cohort)?;
        if frame.is_empty() {
            return Err(PipelineError::DataUnavailable(format!(
                "every {cohort:?} contract from {} lacks a client id",
                source.describe()
            )));
        }
        Ok(frame)
    }

    /// Extract a frame from raw rows. Rows without a client id are dropped;
    /// every other row produces exactly one record.
    pub fn extract(&self, rows: &[ContractRow], cohort: Cohort) -> PipelineResult<FeatureFrame> {
        let categorical_names = self.schema.categorical_features();
        let numeric_names = self.schema.numeric_features();

        let mut records = Vec::with_capacity(rows.len());
        let mut dropped = 0usize;

        for row in rows {
            let client_id = match row.client_id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    dropped += 1;
                    continue;
                }
            };

            let status = ContractStatus::parse(&row.status).ok_or_else(|| {
                invalid(row, "status_contrato", format!("unknown status '{}'", row.status))
            })?;

            let derived = self.derive(row)?;

            let categorical = categorical_names.iter()
                .map(|name| categorical_value(row, name))
                .collect();
            let numeric = numeric_names.iter()
                .map(|name| derived.value(name))
                .collect();

            records.push(FeatureRecord {
                contract_id: row.contract_id.clone(),
                client_id,
                categorical,
                numeric,
                label: match cohort {
                    Cohort::All    => Some(status.label()),
                    Cohort::Active => None,
                },
            });
        }

        if dropped > 0 {
            log::warn!("extract: dropped {dropped} contract(s) without a client id");
        }
        log::debug!("extract: cohort={cohort:?} rows={} as_of={}", records.len(), self.as_of);

        Ok(FeatureFrame { schema: self.schema.clone(), records })
    }

    fn derive(&self, row: &ContractRow) -> PipelineResult<DerivedValues> {
        let start_raw = row.start_date.as_deref()
            .ok_or_else(|| invalid(row, "data_inicio", "start date is required".into()))?;
        let start = parse_date(row, "data_inicio", start_raw)?;

        let duration_days = match row.end_date.as_deref() {
            Some(raw) => (parse_date(row, "data_fim", raw)? - start).num_days() as f64,
            None => f64::NAN,
        };

        let age = match row.birth_date.as_deref() {
            Some(raw) => {
                let birth = parse_date(row, "cliente_data_nascimento", raw)?;
                (self.as_of.year() - birth.year()) as f64
            }
            None => f64::NAN,
        };

        let income = row.monthly_income.unwrap_or(f64::NAN);
        let premium = row.monthly_premium.unwrap_or(f64::NAN);

        Ok(DerivedValues {
            age,
            income,
            premium,
            satisfaction: row.satisfaction.as_deref().map(satisfaction_score).unwrap_or(f64::NAN),
            duration_days,
            auto_renewal: match row.auto_renewal {
                Some(true)  => 1.0,
                Some(false) => 0.0,
                None        => f64::NAN,
            },
            dependents: row.dependents.map(|d| d as f64).unwrap_or(f64::NAN),
            premium_to_income_ratio: premium_to_income_ratio(premium, income),
            age_income_interaction: age * income,
        })
    }
}

struct DerivedValues {
    age:                     f64,
    income:                  f64,
    premium:                 f64,
    satisfaction:            f64,
    duration_days:           f64,
    auto_renewal:            f64,
    dependents:              f64,
    premium_to_income_ratio: f64,
    age_income_interaction:  f64,
}

impl DerivedValues {
    fn value(&self, name: &str) -> f64 {
        match name {
            schema::AGE                     => self.age,
            schema::MONTHLY_INCOME          => self.income,
            schema::MONTHLY_PREMIUM         => self.premium,
            schema::SATISFACTION_SCORE      => self.satisfaction,
            schema::DURATION_DAYS           => self.duration_days,
            schema::AUTO_RENEWAL            => self.auto_renewal,
            schema::DEPENDENTS              => self.dependents,
            schema::PREMIUM_TO_INCOME_RATIO => self.premium_to_income_ratio,
            schema::AGE_INCOME_INTERACTION  => self.age_income_interaction,
            _ => f64::NAN,
        }
    }
}

fn categorical_value(row: &ContractRow, name: &str) -> Option<String> {
    let raw = match name {
        schema::INSURANCE_TYPE => row.insurance_type.as_deref(),
        schema::GENDER         => row.gender.as_deref(),
        schema::EDUCATION      => row.education.as_deref(),
        schema::SALES_CHANNEL  => row.sales_channel.as_deref(),
        _ => None,
    };
    raw.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Premium over income; missing when either side is missing or income is zero.
pub fn premium_to_income_ratio(premium: f64, income: f64) -> f64 {
    if income == 0.0 || income.is_nan() || premium.is_nan() {
        f64::NAN
    } else {
        premium / income
    }
}

/// Map a satisfaction value to the 1..3 ordinal scale.
/// Unrecognized values are missing.
pub fn satisfaction_score(raw: &str) -> f64 {
    let raw = raw.trim();
    match raw.to_lowercase().as_str() {
        "baixa" | "low"                       => return 1.0,
        "média" | "media" | "medium"          => return 2.0,
        "alta" | "high"                       => return 3.0,
        _ => {}
    }
    match raw.parse::<f64>() {
        Ok(v) if (1.0..=3.0).contains(&v) => v,
        _ => f64::NAN,
    }
}

fn parse_date(row: &ContractRow, column: &str, raw: &str) -> PipelineResult<NaiveDate> {
    // Some engines append a time part; only the date matters here.
    let date_part = raw.trim().get(..10).unwrap_or(raw.trim());
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| invalid(row, column, format!("cannot parse date '{raw}': {e}")))
}

fn invalid(row: &ContractRow, column: &str, reason: String) -> PipelineError {
    PipelineError::InvalidValue {
        contract_id: row.contract_id.clone(),
        column: column.to_string(),
        reason,
    }
}
