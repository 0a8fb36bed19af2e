//! End-to-end training and scoring on a synthetic portfolio.

use chrono::NaiveDate;
use churnwatch_core::{
    balancer::ClassCounts,
    config::PipelineConfig,
    engine::{self, ChurnEngine},
    error::PipelineError,
    export,
    features::FeatureExtractor,
    store::ChurnStore,
    synthetic::{self, PopulationSpec},
    threshold::Cutoff,
    types::Cohort,
};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
}

fn seeded_store(contracts: usize, cancelled: usize, seed: u64) -> ChurnStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = ChurnStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    synthetic::populate(&store, &PopulationSpec::new(contracts, cancelled, as_of()), seed)
        .expect("populate");
    store
}

fn test_config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        artifact_path: dir.path().join("models/bundle.json"),
        export_path:   dir.path().join("models/scored.csv"),
        ..PipelineConfig::default_test()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// 100 contracts, 10 cancelled, no hold-out: the balancer must raise the
/// cancelled class to exactly 90 before the classifier sees it.
#[test]
fn training_balances_ninety_ten_to_ninety_ninety() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig { holdout_fraction: 0.0, ..test_config(&dir) };
    let engine = ChurnEngine::new(config, seeded_store(100, 10, 42)).unwrap();

    let bundle = engine.train(as_of()).unwrap();
    let s = &bundle.summary;

    assert_eq!(s.class_counts, ClassCounts { negative: 90, positive: 10 });
    assert_eq!(s.balanced_counts, ClassCounts { negative: 90, positive: 90 });
    assert_eq!(s.synthetic_rows, 80);
    assert_eq!(s.holdout_rows, 0);
    assert!(s.holdout.is_none());
    assert_eq!(s.feature_names.len(), 10, "default selection keeps 10 features");
    assert!(engine.artifacts().path().exists(), "bundle must be saved");
}

#[test]
fn cancelled_contracts_score_higher_on_average() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig { holdout_fraction: 0.0, ..test_config(&dir) };
    let store = seeded_store(100, 10, 42);

    let frame = FeatureExtractor::new(as_of()).extract_from(&store, Cohort::All).unwrap();
    let bundle = engine::fit_bundle(&config, &frame).unwrap();
    let probs = bundle.predict_proba(&frame).unwrap();
    let labels = frame.labels().unwrap();

    let mean = |class: u8| {
        let picked: Vec<f64> = probs.iter().zip(&labels)
            .filter(|(_, &l)| l == class)
            .map(|(&p, _)| p)
            .collect();
        picked.iter().sum::<f64>() / picked.len() as f64
    };
    assert!(
        mean(1) > mean(0),
        "mean p(cancel) for cancelled={:.3} should exceed not cancelled={:.3}",
        mean(1), mean(0)
    );
    assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn holdout_partition_is_evaluated_and_kept_out_of_training() {
    let dir = TempDir::new().unwrap();
    let engine = ChurnEngine::new(test_config(&dir), seeded_store(200, 40, 7)).unwrap();

    let bundle = engine.train(as_of()).unwrap();
    let s = &bundle.summary;

    assert_eq!(s.train_rows + s.holdout_rows, 200);
    assert_eq!(s.holdout_rows, 40, "20% of each class is held out");
    assert_eq!(s.class_counts.total(), 200);
    assert_eq!(s.balanced_counts.positive, s.balanced_counts.negative);
    assert_eq!(s.balanced_counts.negative, 128, "only the training negatives are counted");

    let report = s.holdout.as_ref().expect("holdout report");
    assert_eq!(report.rows, 40);
    assert_eq!(report.cutoff, 0.4);
}

#[test]
fn scoring_persists_and_exports_every_active_contract() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(150, 25, 11);
    let active = store.contract_count(Cohort::Active).unwrap() as usize;
    let engine = ChurnEngine::new(test_config(&dir), store).unwrap();

    let bundle = engine.train(as_of()).unwrap();
    let run = engine.score(as_of()).unwrap();

    assert_eq!(run.bundle_id, bundle.bundle_id);
    assert_eq!(run.records.len(), active);
    assert_eq!(run.summary.contracts_scored, active);
    for r in &run.records {
        assert_eq!(r.will_cancel, Cutoff::default().decide(r.cancel_probability));
    }

    let exported = export::read_csv(&engine.config().export_path).unwrap();
    assert_eq!(exported, run.records, "CSV must round-trip the scored rows");

    let stored = engine.store().latest_predictions().unwrap().expect("stored run");
    assert_eq!(stored.scoring_run_id, run.run_id.to_string());
    assert_eq!(stored.records.len(), active);
}

#[test]
fn at_risk_rethresholds_the_stored_run() {
    let dir = TempDir::new().unwrap();
    let engine = ChurnEngine::new(test_config(&dir), seeded_store(150, 25, 11)).unwrap();
    engine.train(as_of()).unwrap();
    let run = engine.score(as_of()).unwrap();

    let strict = Cutoff::new(0.8).unwrap();
    let flagged = engine.at_risk(strict).unwrap();
    let expected = run.records.iter().filter(|r| r.cancel_probability >= 0.8).count();

    assert_eq!(flagged.len(), expected);
    assert!(flagged.windows(2).all(|w| w[0].cancel_probability >= w[1].cancel_probability));
    assert!(flagged.iter().all(|r| r.will_cancel == 1));
}

#[test]
fn scoring_without_a_bundle_fails_with_no_fallback() {
    let dir = TempDir::new().unwrap();
    let engine = ChurnEngine::new(test_config(&dir), seeded_store(60, 10, 3)).unwrap();

    let err = engine.score(as_of()).unwrap_err();
    assert!(matches!(err, PipelineError::ArtifactUnavailable { .. }), "got {err:?}");
    assert!(!engine.config().export_path.exists(), "nothing may be exported");
}

#[test]
fn too_few_cancellations_to_balance_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig { holdout_fraction: 0.0, ..test_config(&dir) };
    let engine = ChurnEngine::new(config, seeded_store(50, 3, 5)).unwrap();

    let err = engine.train(as_of()).unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientMinority { minority: 3, required: 6 }), "got {err:?}");
    assert!(!engine.artifacts().path().exists());
}

#[test]
fn failed_export_leaves_the_previous_snapshot_in_place() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("churn.db").display().to_string();
    let store = ChurnStore::open(&db).unwrap();
    store.migrate().unwrap();
    synthetic::populate(&store, &PopulationSpec::new(120, 20, as_of()), 13).unwrap();

    let engine = ChurnEngine::new(test_config(&dir), store).unwrap();
    engine.train(as_of()).unwrap();
    let first = engine.score(as_of()).unwrap();
    drop(engine);

    // A regular file where the export directory should be.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let config = PipelineConfig {
        export_path: blocker.join("scored.csv"),
        ..test_config(&dir)
    };
    let engine = ChurnEngine::new(config, ChurnStore::open(&db).unwrap()).unwrap();

    assert!(engine.score(as_of()).is_err());
    let stored = engine.store().latest_predictions().unwrap().expect("earlier run");
    assert_eq!(stored.scoring_run_id, first.run_id.to_string(), "a failed run must not replace the snapshot");
    assert_eq!(stored.records.len(), first.records.len());
}
