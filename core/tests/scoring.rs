//! Threshold decisions, at-risk listing and prediction summaries.

use churnwatch_core::{
    error::PipelineError,
    export,
    prediction::{self, PredictionRecord, PredictionSummary},
    threshold::{self, Cutoff},
};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn record(contract_id: &str, client_id: &str, insurance_type: &str, p: f64) -> PredictionRecord {
    PredictionRecord {
        contract_id:             contract_id.into(),
        client_id:               client_id.into(),
        insurance_type:          Some(insurance_type.into()),
        gender:                  Some("M".into()),
        education:               None,
        sales_channel:           Some("Online".into()),
        age:                     Some(45.0),
        monthly_income:          Some(3200.0),
        monthly_premium:         Some(160.0),
        satisfaction_score:      None,
        duration_days:           Some(400.0),
        auto_renewal:            Some(1.0),
        dependents:              Some(2.0),
        premium_to_income_ratio: Some(0.05),
        age_income_interaction:  Some(144_000.0),
        cancel_probability:      p,
        will_cancel:             Cutoff::default().decide(p),
    }
}

fn portfolio() -> Vec<PredictionRecord> {
    vec![
        record("CTR1", "CLI1", "Auto", 0.91),
        record("CTR2", "CLI1", "Vida", 0.45),
        record("CTR3", "CLI2", "Auto", 0.12),
        record("CTR4", "CLI3", "Vida", 0.45),
        record("CTR5", "CLI4", "Saude", 0.39),
    ]
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Raising the cutoff can only remove positives, never add them.
#[test]
fn flagged_set_shrinks_as_cutoff_rises() {
    let probs: Vec<f64> = (0..=100).map(|i| i as f64 / 100.0).collect();
    let mut previous = usize::MAX;
    for step in 1..20 {
        let cutoff = Cutoff::new(step as f64 / 20.0).unwrap();
        let flagged = threshold::decide(&probs, cutoff).iter().filter(|&&d| d == 1).count();
        assert!(flagged <= previous, "cutoff {} flagged {flagged} > {previous}", cutoff.value());
        previous = flagged;
    }
}

#[test]
fn cutoff_must_lie_strictly_inside_the_unit_interval() {
    for bad in [0.0, 1.0, -0.2, 1.3, f64::NAN] {
        assert!(matches!(Cutoff::new(bad), Err(PipelineError::Config(_))), "{bad} accepted");
    }
}

#[test]
fn at_risk_sorts_by_probability_then_contract_id() {
    let flagged = prediction::at_risk(&portfolio(), Cutoff::default());
    let ids: Vec<&str> = flagged.iter().map(|r| r.contract_id.as_str()).collect();
    assert_eq!(ids, ["CTR1", "CTR2", "CTR4"]);
}

#[test]
fn summary_counts_contracts_and_distinct_clients() {
    let summary = PredictionSummary::compute(&portfolio(), Cutoff::default());

    assert_eq!(summary.contracts_scored, 5);
    assert_eq!(summary.contracts_at_risk, 3);
    assert_eq!(summary.clients_scored, 4);
    assert_eq!(summary.clients_at_risk, 2, "CLI1 holds two flagged contracts");
    assert!((summary.mean_probability - 0.464).abs() < 1e-12);
    assert_eq!(summary.by_insurance_type["Auto"].scored, 2);
    assert_eq!(summary.by_insurance_type["Auto"].at_risk, 1);
    assert_eq!(summary.by_insurance_type["Vida"].at_risk, 2);
}

#[test]
fn exported_csv_carries_the_required_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out/scored.csv");
    export::export_csv(&path, &portfolio()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let header = text.lines().next().unwrap();
    for column in export::REQUIRED_COLUMNS {
        assert!(header.split(',').any(|h| h == column), "header lacks {column}: {header}");
    }
    assert_eq!(export::read_csv(&path).unwrap(), portfolio());
}

#[test]
fn csv_without_a_probability_column_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.csv");
    std::fs::write(&path, "contract_id,will_cancel\nCTR1,1\n").unwrap();

    let err = export::read_csv(&path).unwrap_err();
    match err {
        PipelineError::MissingColumn { column, .. } => assert_eq!(column, "cancel_probability"),
        other => panic!("expected MissingColumn, got {other:?}"),
    }
}
