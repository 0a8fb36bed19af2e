//! SQLite source and prediction persistence.

use chrono::NaiveDate;
use churnwatch_core::{
    error::PipelineError,
    features::FeatureExtractor,
    prediction::PredictionRecord,
    source::ContractSource,
    store::{ChurnStore, NewCancellation, NewClient, NewContract},
    threshold::Cutoff,
    types::{Cohort, ContractStatus},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn migrated_store() -> ChurnStore {
    let store = ChurnStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn client(id: &str) -> NewClient {
    NewClient {
        client_id:      id.into(),
        name:           "Ana Silva".into(),
        birth_date:     Some("1980-01-01".into()),
        gender:         Some("F".into()),
        monthly_income: Some(4000.0),
        education:      Some("Superior".into()),
        dependents:     Some(1),
        signup_date:    Some("2019-01-01".into()),
    }
}

fn contract(id: &str, client_id: Option<&str>, status: ContractStatus) -> NewContract {
    NewContract {
        contract_id:     id.into(),
        client_id:       client_id.map(str::to_string),
        insurance_type:  Some("Vida".into()),
        start_date:      Some("2022-01-01".into()),
        end_date:        Some("2025-01-01".into()),
        monthly_premium: Some(100.0),
        satisfaction:    Some("Baixa".into()),
        sales_channel:   Some("Online".into()),
        auto_renewal:    Some(true),
        status,
    }
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn prediction(id: &str, p: f64) -> PredictionRecord {
    PredictionRecord {
        contract_id:             id.into(),
        client_id:               format!("CLI-{id}"),
        insurance_type:          Some("Auto".into()),
        gender:                  None,
        education:               None,
        sales_channel:           None,
        age:                     Some(33.0),
        monthly_income:          None,
        monthly_premium:         Some(99.5),
        satisfaction_score:      Some(1.0),
        duration_days:           None,
        auto_renewal:            Some(0.0),
        dependents:              None,
        premium_to_income_ratio: None,
        age_income_interaction:  None,
        cancel_probability:      p,
        will_cancel:             Cutoff::default().decide(p),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn cancellation_row_overrides_the_stored_status() {
    let store = migrated_store();
    store.insert_client(&client("CLI1")).unwrap();
    store.insert_contract(&contract("CTR1", Some("CLI1"), ContractStatus::Active)).unwrap();
    store.insert_contract(&contract("CTR2", Some("CLI1"), ContractStatus::Active)).unwrap();
    store.insert_cancellation(&NewCancellation {
        contract_id:       "CTR2".into(),
        cancellation_date: "2023-06-01".into(),
        reason:            Some("Preco".into()),
        channel:           None,
    }).unwrap();

    let rows = store.contract_rows(Cohort::All).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].status, "Ativo");
    assert_eq!(rows[1].status, "Cancelado");
    assert_eq!(rows[1].end_date.as_deref(), Some("2023-06-01"), "cancellation date ends the contract");
    assert_eq!(rows[0].satisfaction.as_deref(), Some("Baixa"));
    assert_eq!(rows[0].auto_renewal, Some(true));

    let active = store.contract_rows(Cohort::Active).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].contract_id, "CTR1");
}

#[test]
fn contract_without_client_is_read_then_dropped_by_extraction() {
    let store = migrated_store();
    store.insert_client(&client("CLI1")).unwrap();
    store.insert_contract(&contract("CTR1", Some("CLI1"), ContractStatus::Ended)).unwrap();
    store.insert_contract(&contract("CTR2", None, ContractStatus::Active)).unwrap();

    assert_eq!(store.contract_count(Cohort::All).unwrap(), 2);
    let frame = FeatureExtractor::new(as_of()).extract_from(&store, Cohort::All).unwrap();
    assert_eq!(frame.len(), 1);
    assert_eq!(frame.records[0].label, Some(0));
}

#[test]
fn empty_source_is_data_unavailable() {
    let store = migrated_store();
    let err = FeatureExtractor::new(as_of()).extract_from(&store, Cohort::Active).unwrap_err();
    assert!(matches!(err, PipelineError::DataUnavailable(_)), "got {err:?}");
}

#[test]
fn view_missing_a_required_column_is_reported_by_name() {
    let store = migrated_store();
    store.connection().execute_batch(
        "DROP VIEW v_contratos_detalhados;
         CREATE VIEW v_contratos_detalhados AS
         SELECT id_contrato AS contrato_id, id_cliente AS cliente_id FROM contratos;",
    ).unwrap();

    let err = store.contract_rows(Cohort::All).unwrap_err();
    match err {
        PipelineError::MissingColumn { view, column } => {
            assert_eq!(view, "v_contratos_detalhados");
            assert_eq!(column, "tipo_seguro_nome");
        }
        other => panic!("expected MissingColumn, got {other:?}"),
    }
}

#[test]
fn replacing_predictions_keeps_only_the_latest_run() {
    let store = migrated_store();
    let cutoff = Cutoff::default();

    store.replace_predictions("run-1", "bundle-a", cutoff, "2024-01-01T00:00:00Z",
        &[prediction("CTR1", 0.9), prediction("CTR2", 0.1)]).unwrap();
    store.replace_predictions("run-2", "bundle-a", cutoff, "2024-02-01T00:00:00Z",
        &[prediction("CTR3", 0.2), prediction("CTR4", 0.7)]).unwrap();

    let snapshot = store.latest_predictions().unwrap().expect("a stored run");
    assert_eq!(snapshot.scoring_run_id, "run-2");
    assert_eq!(snapshot.cutoff, 0.4);
    let ids: Vec<&str> = snapshot.records.iter().map(|r| r.contract_id.as_str()).collect();
    assert_eq!(ids, ["CTR4", "CTR3"], "highest probability first");
    assert_eq!(snapshot.records[0], prediction("CTR4", 0.7));
}

#[test]
fn no_stored_run_reads_as_none() {
    let store = migrated_store();
    assert!(store.latest_predictions().unwrap().is_none());
}
