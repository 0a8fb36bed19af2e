//! churn-runner: headless driver for the churn pipeline.
//!
//! Usage:
//!   churn-runner seed    --db churn.db --contracts 1000 --cancelled 150 --seed 42
//!   churn-runner train   --db churn.db --config config/pipeline.json
//!   churn-runner score   --db churn.db --config config/pipeline.json --as-of 2026-10-01
//!   churn-runner at-risk --db churn.db --cutoff 0.6 --top 20
//!
//! Add `--json` to print the run summary as JSON instead of text.

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use churnwatch_core::{
    artifact::ArtifactBundle,
    config::PipelineConfig,
    engine::{ChurnEngine, ScoringRun},
    prediction::PredictionRecord,
    store::ChurnStore,
    synthetic::{self, PopulationReport, PopulationSpec},
    threshold::Cutoff,
};
use std::env;

#[derive(serde::Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum RunReport<'a> {
    Seed {
        db:         &'a str,
        population: PopulationReport,
    },
    Train {
        bundle_id:     String,
        artifact_path: String,
        summary:       &'a churnwatch_core::artifact::TrainingSummary,
    },
    Score {
        run_id:      String,
        export_path: String,
        summary:     &'a churnwatch_core::prediction::PredictionSummary,
    },
    AtRisk {
        cutoff:    f64,
        contracts: &'a [PredictionRecord],
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1).map(String::as_str) else {
        print_usage();
        bail!("missing command");
    };
    let db = arg_value(&args, "--db").unwrap_or("churn.db");
    let json = args.iter().any(|a| a == "--json");

    let mut config = match arg_value(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.seed = parse_arg(&args, "--seed", config.seed);
    if let Some(raw) = arg_value(&args, "--cutoff") {
        let value: f64 = raw.parse()
            .map_err(|e| anyhow::anyhow!("Invalid --cutoff {raw}: {e}"))?;
        config.cutoff = Cutoff::new(value)?;
    }
    let as_of = match arg_value(&args, "--as-of") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid --as-of {raw}: {e}"))?,
        None => config.reference_date.unwrap_or_else(|| Utc::now().date_naive()),
    };

    log::info!("churn-runner: command={command} db={db} as_of={as_of} seed={}", config.seed);
    let store = ChurnStore::open(db)?;
    store.migrate()?;

    match command {
        "seed" => {
            let contracts = parse_arg(&args, "--contracts", 1_000usize);
            let cancelled = parse_arg(&args, "--cancelled", contracts * 3 / 20);
            let spec = PopulationSpec::new(contracts, cancelled, as_of);
            let population = synthetic::populate(&store, &spec, config.seed)?;
            if json {
                print_json(&RunReport::Seed { db, population })?;
            } else {
                print_population(db, &population);
            }
        }
        "train" => {
            let engine = ChurnEngine::new(config, store)?;
            let bundle = engine.train(as_of)?;
            if json {
                print_json(&RunReport::Train {
                    bundle_id:     bundle.bundle_id.to_string(),
                    artifact_path: engine.artifacts().path().display().to_string(),
                    summary:       &bundle.summary,
                })?;
            } else {
                print_training(&engine, &bundle);
            }
        }
        "score" => {
            let engine = ChurnEngine::new(config, store)?;
            let run = engine.score(as_of)?;
            if json {
                print_json(&RunReport::Score {
                    run_id:      run.run_id.to_string(),
                    export_path: engine.config().export_path.display().to_string(),
                    summary:     &run.summary,
                })?;
            } else {
                print_scoring(&engine, &run);
            }
        }
        "at-risk" => {
            let top = parse_arg(&args, "--top", 20usize);
            let cutoff = config.cutoff();
            let engine = ChurnEngine::new(config, store)?;
            let flagged = engine.at_risk(cutoff)?;
            let shown = &flagged[..flagged.len().min(top)];
            if json {
                print_json(&RunReport::AtRisk { cutoff: cutoff.value(), contracts: shown })?;
            } else {
                print_at_risk(cutoff, flagged.len(), shown);
            }
        }
        other => {
            print_usage();
            bail!("unknown command {other}");
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("usage: churn-runner <seed|train|score|at-risk> [--db PATH] [--config PATH]");
    eprintln!("       [--seed N] [--contracts N] [--cancelled N] [--cutoff P] [--top N]");
    eprintln!("       [--as-of YYYY-MM-DD] [--json]");
}

fn print_json<T: serde::Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn print_population(db: &str, p: &PopulationReport) {
    println!("=== SEED SUMMARY ===");
    println!("  db:         {db}");
    println!("  clients:    {}", p.clients);
    println!("  contracts:  {}", p.contracts);
    println!("  active:     {}", p.active);
    println!("  cancelled:  {}", p.cancelled);
    println!("  ended:      {}", p.ended);
}

fn print_training(engine: &ChurnEngine, bundle: &ArtifactBundle) {
    let s = &bundle.summary;
    println!("=== TRAINING SUMMARY ===");
    println!("  bundle:         {}", bundle.bundle_id);
    println!("  saved to:       {}", engine.artifacts().path().display());
    println!("  seed:           {}", s.seed);
    println!("  rows:           {} ({} cancelled)", s.rows, s.class_counts.positive);
    println!("  train/holdout:  {}/{}", s.train_rows, s.holdout_rows);
    println!(
        "  balanced:       {}/{} (+{} synthetic)",
        s.balanced_counts.negative, s.balanced_counts.positive, s.synthetic_rows
    );
    println!("  features:       {}", s.feature_names.len());
    for name in &s.feature_names {
        println!("    - {name}");
    }
    match &s.holdout {
        Some(r) => {
            println!();
            println!("=== HOLDOUT (cutoff {:.2}) ===", r.cutoff);
            println!("  precision:  {:.3}", r.precision);
            println!("  recall:     {:.3}", r.recall);
            println!("  f1:         {:.3}", r.f1);
            println!("  accuracy:   {:.3}", r.accuracy);
            match r.roc_auc {
                Some(auc) => println!("  roc_auc:    {auc:.3}"),
                None => println!("  roc_auc:    n/a"),
            }
            println!("  log_loss:   {:.4}", r.log_loss);
        }
        None => println!("  (no holdout partition)"),
    }
}

fn print_scoring(engine: &ChurnEngine, run: &ScoringRun) {
    let s = &run.summary;
    println!("=== SCORING SUMMARY ===");
    println!("  run:              {}", run.run_id);
    println!("  bundle:           {}", run.bundle_id);
    println!("  exported to:      {}", engine.config().export_path.display());
    println!("  cutoff:           {:.2}", s.cutoff);
    println!("  contracts scored: {}", s.contracts_scored);
    println!("  at risk:          {}", s.contracts_at_risk);
    println!("  clients at risk:  {} of {}", s.clients_at_risk, s.clients_scored);
    println!("  mean probability: {:.3}", s.mean_probability);
    for (insurance_type, risk) in &s.by_insurance_type {
        println!("    {insurance_type:<14} {:>4} at risk of {:>5}", risk.at_risk, risk.scored);
    }
}

fn print_at_risk(cutoff: Cutoff, total: usize, shown: &[PredictionRecord]) {
    println!("=== AT RISK (cutoff {:.2}): {total} contract(s) ===", cutoff.value());
    for r in shown {
        println!(
            "  {:<12} client={:<10} {:<14} p={:.3}",
            r.contract_id,
            r.client_id,
            r.insurance_type.as_deref().unwrap_or("-"),
            r.cancel_probability
        );
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
