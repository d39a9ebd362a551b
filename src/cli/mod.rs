//! Command-line front end for the satisfaction pipeline

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::pipeline::PipelineRunner;
use crate::training::ClassificationMetrics;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("  {} {}", ok("✓"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn print_metrics(metrics: &ClassificationMetrics) {
    kv("Accuracy", &format!("{:.4}", metrics.accuracy));
    kv("Precision", &format!("{:.4}", metrics.precision));
    kv("Recall", &format!("{:.4}", metrics.recall));
    kv("F1", &format!("{:.4}", metrics.f1));
    kv("Samples", &metrics.n_samples.to_string());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "satisfaction-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Airline passenger satisfaction training pipeline")]
#[command(long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (JSON); defaults apply to missing keys
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split the raw table into train and test files
    Ingest,

    /// Clean, engineer, select features and tune the configured classifier
    Train,

    /// Score the persisted model on the held-out test file
    Evaluate,

    /// Compare every configured classifier family on the engineered table
    Compare,

    /// Predict satisfaction for new rows with the persisted model
    Predict {
        /// Input CSV with raw survey columns
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV; the input plus a `prediction` column
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ingest, train and evaluate in one go
    Run,
}

/// Load the configuration named on the command line, or the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(p) => PipelineConfig::from_file(p)?,
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_ingest(runner: &PipelineRunner) -> anyhow::Result<()> {
    section("Ingest");
    step_run(&format!("Splitting {}", runner.config().paths.raw_data.display()));
    let start = Instant::now();
    let summary = runner.run_ingestion()?;
    step_done(&format!(
        "{} train / {} test rows × {} cols in {:?}",
        summary.train_rows,
        summary.test_rows,
        summary.columns,
        start.elapsed()
    ));
    println!();
    Ok(())
}

pub fn cmd_train(runner: &PipelineRunner) -> anyhow::Result<()> {
    section("Train");
    let config = runner.config();
    step_run(&format!(
        "Tuning {} with {}-fold CV",
        config.tuning.classifier.cyan(),
        config.tuning.cv_folds
    ));
    let start = Instant::now();
    let outcome = runner.run_training()?;
    step_done(&format!(
        "{} combinations in {:?}",
        outcome.study.trials.len(),
        start.elapsed()
    ));

    println!();
    kv("Best params", &outcome.model.best_params.to_string());
    kv("CV accuracy", &format!("{:.4}", outcome.model.cv_score));
    print_metrics(&outcome.model.metrics);
    kv("Features", &outcome.model.feature_names.join(", "));
    kv("Artifact", &config.paths.model.display().to_string());
    if let Some(e) = &outcome.tracking_error {
        println!("  {} {}", "tracking skipped:".yellow(), e);
    }
    println!();
    Ok(())
}

pub fn cmd_evaluate(runner: &PipelineRunner) -> anyhow::Result<()> {
    section("Evaluate");
    step_run(&format!("Scoring {}", runner.config().paths.test_data.display()));
    let metrics = runner.evaluate_holdout()?;
    step_done("holdout scored");
    println!();
    print_metrics(&metrics);
    println!();
    Ok(())
}

pub fn cmd_compare(runner: &PipelineRunner) -> anyhow::Result<()> {
    section("Compare");
    step_run("Fitting classifiers");
    let start = Instant::now();
    let results = runner.run_comparison()?;
    step_done(&format!("{} models in {:?}", results.len(), start.elapsed()));

    println!();
    println!(
        "  {:<24} {:>10} {:>10} {:>10} {:>10}",
        muted("Model"),
        muted("Accuracy"),
        muted("Precision"),
        muted("Recall"),
        muted("F1")
    );
    println!("  {}", dim(&"─".repeat(68)));
    for (name, m) in &results {
        println!(
            "  {:<24} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            name, m.accuracy, m.precision, m.recall, m.f1
        );
    }
    println!("  {}", dim(&"─".repeat(68)));

    let best = results
        .iter()
        .fold(None::<(&String, f64)>, |best, (name, m)| match best {
            Some((_, score)) if score >= m.accuracy => best,
            _ => Some((name, m.accuracy)),
        });
    if let Some((name, score)) = best {
        println!();
        println!("  {} {} {} {:.4}", ok("best"), name.white().bold(), muted("accuracy:"), score);
    }
    println!();
    Ok(())
}

pub fn cmd_predict(runner: &PipelineRunner, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");
    step_run(&format!("Predicting {}", input.display()));
    let predicted = runner.predict_file(input, output)?;
    step_done(&format!("{} rows", predicted.height()));
    match output {
        Some(path) => kv("Written", &path.display().to_string()),
        None => println!("{}", predicted),
    }
    println!();
    Ok(())
}

pub fn cmd_run(runner: &PipelineRunner) -> anyhow::Result<()> {
    section("Pipeline");
    let start = Instant::now();
    step_run("Ingest → train → evaluate");
    let report = runner.run_all()?;
    step_done(&format!("finished in {:?}", start.elapsed()));

    println!();
    kv("Train rows", &report.ingestion.train_rows.to_string());
    kv("Test rows", &report.ingestion.test_rows.to_string());
    kv("Classifier", &report.training.model.classifier);
    kv("Best params", &report.training.model.best_params.to_string());
    kv("CV accuracy", &format!("{:.4}", report.training.model.cv_score));
    section("Holdout");
    print_metrics(&report.holdout);
    println!();
    Ok(())
}
