//! Feature schema: the single ordered column descriptor shared by
//! training and inference.
//!
//! RULE: The extractor builds frames from `FeatureSchema::canonical()`.
//! The schema is persisted inside every artifact bundle, and inference
//! refuses to score a frame whose feature columns differ from it.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Bump whenever a feature column is added, removed, renamed or reordered.
pub const SCHEMA_VERSION: u32 = 1;

pub const CONTRACT_ID: &str = "contract_id";
pub const CLIENT_ID: &str = "client_id";
pub const CANCELLED: &str = "cancelled";

pub const INSURANCE_TYPE: &str = "insurance_type";
pub const GENDER: &str = "gender";
pub const EDUCATION: &str = "education";
pub const SALES_CHANNEL: &str = "sales_channel";

pub const AGE: &str = "age";
pub const MONTHLY_INCOME: &str = "monthly_income";
pub const MONTHLY_PREMIUM: &str = "monthly_premium";
pub const SATISFACTION_SCORE: &str = "satisfaction_score";
pub const DURATION_DAYS: &str = "duration_days";
pub const AUTO_RENEWAL: &str = "auto_renewal";
pub const DEPENDENTS: &str = "dependents";
pub const PREMIUM_TO_INCOME_RATIO: &str = "premium_to_income_ratio";
pub const AGE_INCOME_INTERACTION: &str = "age_income_interaction";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Categorical,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Identifier,
    Feature,
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    pub role: ColumnRole,
}

impl ColumnSpec {
    fn new(name: &str, kind: ColumnKind, role: ColumnRole) -> Self {
        Self { name: name.to_string(), kind, role }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub columns: Vec<ColumnSpec>,
}

impl FeatureSchema {
    /// The one feature set the pipeline trains and scores on.
    pub fn canonical() -> Self {
        use ColumnKind::*;
        use ColumnRole::*;
        Self {
            version: SCHEMA_VERSION,
            columns: vec![
                ColumnSpec::new(CONTRACT_ID,             Categorical, Identifier),
                ColumnSpec::new(CLIENT_ID,               Categorical, Identifier),
                ColumnSpec::new(INSURANCE_TYPE,          Categorical, Feature),
                ColumnSpec::new(GENDER,                  Categorical, Feature),
                ColumnSpec::new(EDUCATION,               Categorical, Feature),
                ColumnSpec::new(SALES_CHANNEL,           Categorical, Feature),
                ColumnSpec::new(AGE,                     Numeric,     Feature),
                ColumnSpec::new(MONTHLY_INCOME,          Numeric,     Feature),
                ColumnSpec::new(MONTHLY_PREMIUM,         Numeric,     Feature),
                ColumnSpec::new(SATISFACTION_SCORE,      Numeric,     Feature),
                ColumnSpec::new(DURATION_DAYS,           Numeric,     Feature),
                ColumnSpec::new(AUTO_RENEWAL,            Numeric,     Feature),
                ColumnSpec::new(DEPENDENTS,              Numeric,     Feature),
                ColumnSpec::new(PREMIUM_TO_INCOME_RATIO, Numeric,     Feature),
                ColumnSpec::new(AGE_INCOME_INTERACTION,  Numeric,     Feature),
                ColumnSpec::new(CANCELLED,               Numeric,     Label),
            ],
        }
    }

    /// Feature columns in schema order.
    pub fn features(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.role == ColumnRole::Feature)
    }

    pub fn categorical_features(&self) -> Vec<&str> {
        self.features()
            .filter(|c| c.kind == ColumnKind::Categorical)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn numeric_features(&self) -> Vec<&str> {
        self.features()
            .filter(|c| c.kind == ColumnKind::Numeric)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Fail unless `actual` has exactly this schema's feature columns,
    /// with the same kinds, in the same order. Label and identifier
    /// columns are not compared.
    pub fn ensure_compatible(&self, actual: &FeatureSchema) -> PipelineResult<()> {
        if self.version != actual.version {
            return Err(PipelineError::SchemaMismatch(format!(
                "schema version {} expected, frame has {}",
                self.version, actual.version
            )));
        }

        let expected: Vec<&ColumnSpec> = self.features().collect();
        let found: Vec<&ColumnSpec> = actual.features().collect();

        let missing: Vec<&str> = expected.iter()
            .filter(|e| !found.iter().any(|f| f.name == e.name))
            .map(|e| e.name.as_str())
            .collect();
        let extra: Vec<&str> = found.iter()
            .filter(|f| !expected.iter().any(|e| e.name == f.name))
            .map(|f| f.name.as_str())
            .collect();
        if !missing.is_empty() || !extra.is_empty() {
            return Err(PipelineError::SchemaMismatch(format!(
                "missing columns {missing:?}, unexpected columns {extra:?}"
            )));
        }

        for (pos, (e, f)) in expected.iter().zip(found.iter()).enumerate() {
            if e.name != f.name {
                return Err(PipelineError::SchemaMismatch(format!(
                    "column order differs at position {pos}: expected '{}', found '{}'",
                    e.name, f.name
                )));
            }
            if e.kind != f.kind {
                return Err(PipelineError::SchemaMismatch(format!(
                    "column '{}' expected {:?}, found {:?}",
                    e.name, e.kind, f.kind
                )));
            }
        }
        Ok(())
    }
}
