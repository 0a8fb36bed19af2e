//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Same data, same seed, same config: training must produce the same
//! model and scoring the same probabilities, bit for bit. A saved and
//! reloaded bundle must score exactly like the in-memory one.

use chrono::NaiveDate;
use churnwatch_core::{
    artifact::ArtifactStore,
    config::PipelineConfig,
    engine,
    error::PipelineError,
    features::{FeatureExtractor, FeatureFrame},
    gbdt::GbdtConfig,
    schema,
    selector::{FeatureSelector, SelectionConfig},
    store::ChurnStore,
    synthetic::{self, PopulationSpec},
    types::Cohort,
};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
}

fn frames(seed: u64) -> (FeatureFrame, FeatureFrame) {
    let store = ChurnStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    synthetic::populate(&store, &PopulationSpec::new(160, 30, as_of()), seed).expect("populate");
    let extractor = FeatureExtractor::new(as_of());
    (
        extractor.extract_from(&store, Cohort::All).unwrap(),
        extractor.extract_from(&store, Cohort::Active).unwrap(),
    )
}

fn bits(probs: &[f64]) -> Vec<u64> {
    probs.iter().map(|p| p.to_bits()).collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn same_seed_trains_identical_models() {
    let (train, active) = frames(42);
    let config = PipelineConfig::default_test();

    let a = engine::fit_bundle(&config, &train).unwrap();
    let b = engine::fit_bundle(&config, &train).unwrap();

    assert_eq!(a.classifier, b.classifier, "classifiers diverged");
    assert_eq!(a.selected_features, b.selected_features);
    assert_eq!(a.summary, b.summary);
    assert_eq!(
        bits(&a.predict_proba(&active).unwrap()),
        bits(&b.predict_proba(&active).unwrap()),
    );
}

#[test]
fn different_seeds_produce_different_models() {
    let (train, _) = frames(42);
    let a = engine::fit_bundle(&PipelineConfig { seed: 1, ..PipelineConfig::default_test() }, &train).unwrap();
    let b = engine::fit_bundle(&PipelineConfig { seed: 2, ..PipelineConfig::default_test() }, &train).unwrap();

    assert_ne!(a.classifier, b.classifier, "seed is not reaching the classifier");
}

#[test]
fn reloaded_bundle_scores_bit_identically() {
    let dir = TempDir::new().unwrap();
    let (train, active) = frames(5);
    let bundle = engine::fit_bundle(&PipelineConfig::default_test(), &train).unwrap();

    let store = ArtifactStore::new(dir.path().join("bundle.json"));
    store.save(&bundle).unwrap();
    let reloaded = store.load().unwrap();

    assert_eq!(reloaded, bundle, "bundle must survive serialization unchanged");
    assert_eq!(reloaded.encode(&active).unwrap(), bundle.encode(&active).unwrap());
    assert_eq!(
        bits(&reloaded.predict_proba(&active).unwrap()),
        bits(&bundle.predict_proba(&active).unwrap()),
    );
}

#[test]
fn two_scoring_passes_agree() {
    let (train, active) = frames(9);
    let bundle = engine::fit_bundle(&PipelineConfig::default_test(), &train).unwrap();
    let cutoff = PipelineConfig::default_test().cutoff();

    let first = engine::score_frame(&bundle, &active, cutoff).unwrap();
    let second = engine::score_frame(&bundle, &active, cutoff).unwrap();
    assert_eq!(first, second);
}

#[test]
fn selection_keeps_exactly_k_columns_deterministically() {
    let (train, _) = frames(13);
    let config = PipelineConfig { feature_selection: None, ..PipelineConfig::default_test() };
    let full = engine::fit_bundle(&config, &train).unwrap();
    let x = full.encode(&train).unwrap();
    let y = train.labels().unwrap();

    let selection = SelectionConfig { target_features: 6 };
    let classifier = GbdtConfig { n_trees: 40, log_every: 0, ..GbdtConfig::default() };
    let selector = FeatureSelector::new(&selection, &classifier, 13).unwrap();
    let a = selector.select(&x, &y).unwrap();
    let b = selector.select(&x, &y).unwrap();

    assert_eq!(a.len(), 6);
    assert_eq!(a, b);
    assert!(a.windows(2).all(|w| w[0] < w[1]), "indices must be ascending: {a:?}");
    assert!(a.iter().all(|&c| c < x.n_cols()));
}

#[test]
fn frame_with_a_foreign_schema_is_refused() {
    let (train, active) = frames(21);
    let bundle = engine::fit_bundle(&PipelineConfig::default_test(), &train).unwrap();

    let mut foreign = active.clone();
    foreign.schema.version = schema::SCHEMA_VERSION + 1;
    let err = bundle.predict_proba(&foreign).unwrap_err();
    assert!(matches!(err, PipelineError::SchemaMismatch(_)), "got {err:?}");
}
