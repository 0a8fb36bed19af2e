//! Feature extraction from raw contract rows.

use chrono::NaiveDate;
use churnwatch_core::{
    error::PipelineError,
    features::FeatureExtractor,
    schema,
    source::ContractRow,
    types::Cohort,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn row(contract_id: &str, status: &str) -> ContractRow {
    ContractRow {
        contract_id:     contract_id.into(),
        client_id:       Some("CLI00001".into()),
        insurance_type:  Some("Auto".into()),
        monthly_premium: Some(250.0),
        start_date:      Some("2024-01-01".into()),
        end_date:        Some("2024-06-30".into()),
        satisfaction:    Some("Média".into()),
        auto_renewal:    Some(true),
        sales_channel:   Some("Online".into()),
        status:          status.into(),
        gender:          Some("F".into()),
        education:       Some("Superior".into()),
        monthly_income:  Some(5000.0),
        dependents:      Some(2),
        birth_date:      Some("1984-03-15".into()),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn derived_values_follow_the_contract_dates_and_amounts() {
    let frame = FeatureExtractor::new(as_of())
        .extract(&[row("CTR1", "Ativo")], Cohort::All)
        .unwrap();
    let r = &frame.records[0];

    assert_eq!(frame.numeric(r, schema::DURATION_DAYS), Some(181.0));
    let ratio = frame.numeric(r, schema::PREMIUM_TO_INCOME_RATIO).unwrap();
    assert!((ratio - 0.05).abs() < 1e-12, "ratio={ratio}");
    assert_eq!(frame.numeric(r, schema::AGE), Some(40.0));
    assert_eq!(frame.numeric(r, schema::AGE_INCOME_INTERACTION), Some(200_000.0));
    assert_eq!(frame.numeric(r, schema::SATISFACTION_SCORE), Some(2.0));
    assert_eq!(frame.numeric(r, schema::AUTO_RENEWAL), Some(1.0));
    assert_eq!(frame.categorical(r, schema::INSURANCE_TYPE), Some("Auto"));
    assert_eq!(r.label, Some(0));
}

#[test]
fn zero_income_leaves_the_ratio_missing() {
    let mut zero = row("CTR1", "Ativo");
    zero.monthly_income = Some(0.0);

    let frame = FeatureExtractor::new(as_of()).extract(&[zero], Cohort::All).unwrap();
    let ratio = frame.numeric(&frame.records[0], schema::PREMIUM_TO_INCOME_RATIO).unwrap();
    assert!(ratio.is_nan(), "zero income must give a missing ratio, got {ratio}");
}

#[test]
fn rows_without_a_client_are_dropped() {
    let mut orphan = row("CTR2", "Ativo");
    orphan.client_id = None;
    let mut blank = row("CTR3", "Ativo");
    blank.client_id = Some("  ".into());

    let frame = FeatureExtractor::new(as_of())
        .extract(&[row("CTR1", "Ativo"), orphan, blank], Cohort::All)
        .unwrap();
    assert_eq!(frame.len(), 1);
    assert_eq!(frame.records[0].contract_id, "CTR1");
}

#[test]
fn missing_start_date_is_an_invalid_value() {
    let mut undated = row("CTR9", "Ativo");
    undated.start_date = None;

    let err = FeatureExtractor::new(as_of()).extract(&[undated], Cohort::All).unwrap_err();
    match err {
        PipelineError::InvalidValue { contract_id, column, .. } => {
            assert_eq!(contract_id, "CTR9");
            assert_eq!(column, "data_inicio");
        }
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn unknown_status_is_an_invalid_value() {
    let err = FeatureExtractor::new(as_of())
        .extract(&[row("CTR1", "Suspenso")], Cohort::All)
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidValue { .. }), "got {err:?}");
}

#[test]
fn labels_follow_status_and_active_cohort_is_unlabelled() {
    let rows = [row("CTR1", "Ativo"), row("CTR2", "Cancelado"), row("CTR3", "Encerrado")];
    let extractor = FeatureExtractor::new(as_of());

    let all = extractor.extract(&rows, Cohort::All).unwrap();
    assert_eq!(all.labels().unwrap(), vec![0, 1, 0]);

    let active = extractor.extract(&rows[..1], Cohort::Active).unwrap();
    assert!(active.records.iter().all(|r| r.label.is_none()));
    assert!(active.labels().is_err(), "active frames cannot be trained on");
}

#[test]
fn open_ended_contract_has_missing_duration() {
    let mut open = row("CTR1", "Ativo");
    open.end_date = None;
    open.satisfaction = Some("excelente".into());

    let frame = FeatureExtractor::new(as_of()).extract(&[open], Cohort::Active).unwrap();
    let r = &frame.records[0];
    assert!(frame.numeric(r, schema::DURATION_DAYS).unwrap().is_nan());
    assert!(frame.numeric(r, schema::SATISFACTION_SCORE).unwrap().is_nan());
}
