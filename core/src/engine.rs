//! The churn pipeline engine.
//!
//! TRAINING ORDER (fixed, never reordered):
//!   1. Extract every labelled contract
//!   2. Stratified train / hold-out split
//!   3. Fit the category encoder on the training partition
//!   4. Balance the training partition
//!   5. Optional recursive feature elimination
//!   6. Fit the classifier
//!   7. Evaluate on the hold-out partition, save the bundle
//!
//! SCORING ORDER:
//!   1. Load the bundle (no fallback if it is unavailable)
//!   2. Extract active contracts with the bundle's schema
//!   3. Score and threshold
//!   4. Stage the CSV export next to its destination
//!   5. Replace the stored snapshot, then publish the staged CSV
//!
//! RULES:
//!   - Hold-out rows never reach the encoder fit, the balancer or the classifier.
//!   - All randomness flows through `PipelineRng` slots derived from one seed.
//!   - Scoring never fits anything.
//!   - A scoring run that fails before step 5 leaves the stored snapshot
//!     and the exported CSV untouched.

use crate::{
    artifact::{ArtifactBundle, ArtifactStore, TrainingSummary},
    balancer::{ClassBalancer, ClassCounts},
    config::PipelineConfig,
    encoder::CategoryEncoder,
    error::{PipelineError, PipelineResult},
    evaluation::{stratified_split, EvaluationReport},
    export,
    features::{FeatureExtractor, FeatureFrame},
    gbdt::GbdtClassifier,
    prediction::{self, PredictionRecord, PredictionSummary},
    rng::{PipelineRng, RngSlot},
    selector::FeatureSelector,
    source::ContractSource,
    store::ChurnStore,
    threshold::Cutoff,
    types::{Cohort, Label},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of one scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRun {
    pub run_id:    Uuid,
    pub bundle_id: Uuid,
    pub scored_at: DateTime<Utc>,
    pub records:   Vec<PredictionRecord>,
    pub summary:   PredictionSummary,
}

pub struct ChurnEngine {
    config:    PipelineConfig,
    store:     ChurnStore,
    artifacts: ArtifactStore,
}

impl ChurnEngine {
    pub fn new(config: PipelineConfig, store: ChurnStore) -> PipelineResult<Self> {
        config.validate()?;
        let artifacts = ArtifactStore::new(config.artifact_path.clone());
        Ok(Self { config, store, artifacts })
    }

    pub fn config(&self) -> &PipelineConfig { &self.config }
    pub fn store(&self) -> &ChurnStore { &self.store }
    pub fn artifacts(&self) -> &ArtifactStore { &self.artifacts }

    /// Fit a fresh bundle on every labelled contract and save it,
    /// replacing the previous one.
    pub fn train(&self, as_of: NaiveDate) -> PipelineResult<ArtifactBundle> {
        log::info!("train: as_of={as_of} seed={} source={}", self.config.seed, self.store.describe());
        let frame = FeatureExtractor::new(as_of).extract_from(&self.store, Cohort::All)?;
        let bundle = fit_bundle(&self.config, &frame)?;
        self.artifacts.save(&bundle)?;
        Ok(bundle)
    }

    /// Score every active contract with the stored bundle.
    pub fn score(&self, as_of: NaiveDate) -> PipelineResult<ScoringRun> {
        let bundle = self.artifacts.load()?;
        let frame = FeatureExtractor::new(as_of).extract_from(&self.store, Cohort::Active)?;
        let cutoff = self.config.cutoff();
        let records = score_frame(&bundle, &frame, cutoff)?;

        let run_id = Uuid::new_v4();
        let scored_at = Utc::now();
        let staged = export::stage_csv(&self.config.export_path, &records)?;
        self.store.replace_predictions(
            &run_id.to_string(),
            &bundle.bundle_id.to_string(),
            cutoff,
            &scored_at.to_rfc3339(),
            &records,
        )?;
        staged.commit()?;
        log::info!(
            "export: wrote {} prediction row(s) to {}",
            records.len(), self.config.export_path.display()
        );

        let summary = PredictionSummary::compute(&records, cutoff);
        log::info!(
            "score: run={run_id} bundle={} contracts={} at_risk={} clients_at_risk={} cutoff={:.2}",
            bundle.bundle_id,
            summary.contracts_scored,
            summary.contracts_at_risk,
            summary.clients_at_risk,
            summary.cutoff,
        );
        Ok(ScoringRun { run_id, bundle_id: bundle.bundle_id, scored_at, records, summary })
    }

    /// At-risk contracts from the last persisted scoring run, re-thresholded
    /// at `cutoff`.
    pub fn at_risk(&self, cutoff: Cutoff) -> PipelineResult<Vec<PredictionRecord>> {
        let snapshot = self.store.latest_predictions()?.ok_or_else(|| {
            PipelineError::DataUnavailable("no scoring run has been persisted yet".into())
        })?;
        Ok(prediction::at_risk(&snapshot.records, cutoff))
    }
}

/// Fit a bundle on a labelled frame. Deterministic for a fixed config
/// (apart from the bundle id and creation time).
pub fn fit_bundle(config: &PipelineConfig, frame: &FeatureFrame) -> PipelineResult<ArtifactBundle> {
    config.validate()?;
    let labels = frame.labels()?;
    let class_counts = ClassCounts::of(&labels);
    if class_counts.positive == 0 || class_counts.negative == 0 {
        return Err(PipelineError::DataUnavailable(format!(
            "training needs both classes, got {} cancelled / {} not cancelled",
            class_counts.positive, class_counts.negative
        )));
    }

    let mut split_rng = PipelineRng::for_slot(config.seed, RngSlot::Split);
    let (train_idx, holdout_idx) = stratified_split(&labels, config.holdout_fraction, &mut split_rng);
    let train_frame = frame.subset(&train_idx);
    let train_labels: Vec<Label> = train_idx.iter().map(|&i| labels[i]).collect();

    let encoder = CategoryEncoder::fit(&train_frame, &config.categorical_columns)?;
    let x_train = encoder.transform(&train_frame)?;

    let mut balance_rng = PipelineRng::for_slot(config.seed, RngSlot::Balancer);
    let balanced = ClassBalancer::new(config.balancer.clone())
        .balance(&x_train, &train_labels, &mut balance_rng)?;
    let balanced_counts = ClassCounts::of(&balanced.labels);

    let selected = match &config.feature_selection {
        Some(selection) => {
            let selector = FeatureSelector::new(selection, &config.classifier, config.seed)?;
            Some(selector.select(&balanced.features, &balanced.labels)?)
        }
        None => None,
    };
    let x_model = match &selected {
        Some(cols) => balanced.features.select_columns(cols),
        None => balanced.features.clone(),
    };

    let mut classifier_rng = PipelineRng::for_slot(config.seed, RngSlot::Classifier);
    let classifier = GbdtClassifier::fit(&config.classifier, &x_model, &balanced.labels, &mut classifier_rng)?;

    let summary = TrainingSummary {
        rows:            frame.len(),
        class_counts,
        train_rows:      train_idx.len(),
        holdout_rows:    holdout_idx.len(),
        balanced_counts,
        synthetic_rows:  balanced.synthetic,
        seed:            config.seed,
        feature_names:   Vec::new(),
        holdout:         None,
    };
    let mut bundle = ArtifactBundle::new(frame.schema.clone(), encoder, classifier, selected, summary);
    bundle.summary.feature_names = bundle.model_feature_names();
    log::info!("train: model features={:?}", bundle.summary.feature_names);

    if !holdout_idx.is_empty() {
        let holdout_frame = frame.subset(&holdout_idx);
        let holdout_labels: Vec<Label> = holdout_idx.iter().map(|&i| labels[i]).collect();
        let probabilities = bundle.predict_proba(&holdout_frame)?;
        let report = EvaluationReport::compute(&holdout_labels, &probabilities, config.cutoff());
        log::info!(
            "train: holdout rows={} precision={:.3} recall={:.3} f1={:.3} auc={}",
            report.rows,
            report.precision,
            report.recall,
            report.f1,
            report.roc_auc.map_or_else(|| "n/a".to_string(), |a| format!("{a:.3}")),
        );
        bundle.summary.holdout = Some(report);
    }

    log::info!(
        "train: bundle={} rows={} train={} holdout={} balanced={}/{} features={}",
        bundle.bundle_id,
        bundle.summary.rows,
        bundle.summary.train_rows,
        bundle.summary.holdout_rows,
        balanced_counts.negative,
        balanced_counts.positive,
        bundle.summary.feature_names.len(),
    );
    Ok(bundle)
}

/// Score a frame with an already fitted bundle.
pub fn score_frame(
    bundle: &ArtifactBundle,
    frame: &FeatureFrame,
    cutoff: Cutoff,
) -> PipelineResult<Vec<PredictionRecord>> {
    let probabilities = bundle.predict_proba(frame)?;
    PredictionRecord::from_scores(frame, &probabilities, cutoff)
}
