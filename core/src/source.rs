//! Read-only tabular data source.
//!
//! The pipeline never talks SQL directly; it asks a ContractSource for
//! raw contract rows and derives everything else itself.

use crate::{error::PipelineResult, types::Cohort};

/// One contract joined with its client's attributes, as the source stores it.
/// Dates are ISO `YYYY-MM-DD` text; parsing happens in the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRow {
    pub contract_id:     String,
    pub client_id:       Option<String>,
    pub insurance_type:  Option<String>,
    pub monthly_premium: Option<f64>,
    pub start_date:      Option<String>,
    pub end_date:        Option<String>,
    pub satisfaction:    Option<String>,
    pub auto_renewal:    Option<bool>,
    pub sales_channel:   Option<String>,
    pub status:          String,
    pub gender:          Option<String>,
    pub education:       Option<String>,
    pub monthly_income:  Option<f64>,
    pub dependents:      Option<i64>,
    pub birth_date:      Option<String>,
}

/// The contract every data provider must fulfill.
pub trait ContractSource {
    /// Short name used in error messages and logs.
    fn describe(&self) -> String;

    /// One row per contract in `cohort`, ordered by contract id.
    fn contract_rows(&self, cohort: Cohort) -> PipelineResult<Vec<ContractRow>>;
}
