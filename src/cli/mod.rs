//! Vehicle price CLI
//!
//! Command-line interface for data generation, training, comparison,
//! prediction, serving and retraining.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::export::ArtifactStore;
use crate::inference::PredictionService;
use crate::preprocessing::CarRecord;
use crate::retrain::{RetrainConfig, RetrainDecision, RetrainWorkflow};
use crate::server::{run_server, ServerConfig};
use crate::synthetic::{generate_csv, GeneratorConfig};
use crate::tracking::ExperimentTracker;
use crate::training::{default_candidates, ModelConfig, ModelKind, TrainingConfig, TrainingPipeline};
use crate::utils::load_examples;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vehicle-price")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Car price regression: train, serve and retrain")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a seeded synthetic dataset
    Generate {
        /// Output CSV file
        #[arg(short, long, default_value = "data/car_data.csv")]
        output: PathBuf,

        #[arg(long, default_value = "1000")]
        rows: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Train a model and publish it
    Train {
        /// Training CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Model kind (random_forest, gradient_boosting, ridge)
        #[arg(short, long, default_value = "random_forest")]
        model: String,

        /// JSON training config; overrides --model
        #[arg(long)]
        config: Option<PathBuf>,

        /// Artifact directory
        #[arg(long, env = "MODELS_DIR", default_value = "./models")]
        models_dir: PathBuf,

        /// Directory for experiment runs
        #[arg(long)]
        tracking_dir: Option<PathBuf>,
    },

    /// Train the default candidates on one split and rank them by RMSE
    Compare {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(long)]
        tracking_dir: Option<PathBuf>,
    },

    /// Price cars with the published model
    Predict {
        /// JSON file with one car or a list of cars; the sample car when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(long, env = "MODELS_DIR", default_value = "./models")]
        models_dir: PathBuf,
    },

    /// Start the HTTP prediction server
    Serve {
        #[arg(short, long, env = "API_PORT", default_value = "8000")]
        port: u16,

        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "MODELS_DIR", default_value = "./models")]
        models_dir: PathBuf,
    },

    /// Retrain, promote on MAE improvement, and signal the server
    Retrain {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(long, env = "MODELS_DIR", default_value = "./models")]
        models_dir: PathBuf,

        /// Staging directory; defaults to <models_dir>/staging
        #[arg(long)]
        staging_dir: Option<PathBuf>,

        /// e.g. http://localhost:8000/model/reload
        #[arg(long)]
        reload_url: Option<String>,

        #[arg(long)]
        tracking_dir: Option<PathBuf>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_generate(output: &Path, rows: usize, seed: u64) -> anyhow::Result<()> {
    section("Generate");

    step_run(&format!("Writing {} rows", rows));
    let start = Instant::now();
    let config = GeneratorConfig::default().with_rows(rows).with_seed(seed);
    let examples = generate_csv(&config, output)?;
    step_done(&format!("{:?}", start.elapsed()));

    let mean = examples.iter().map(|e| e.price).sum::<f64>() / examples.len() as f64;
    kv("Output", &output.display().to_string());
    kv("Seed", &seed.to_string());
    kv("Mean price", &format!("{:.0}", mean));
    println!();
    Ok(())
}

fn training_config(model: &str, config: Option<&Path>) -> anyhow::Result<TrainingConfig> {
    match config {
        Some(path) => Ok(TrainingConfig::from_json_file(path)?),
        None => {
            let kind: ModelKind = model.parse()?;
            let model = match kind {
                ModelKind::EnsembleTrees => ModelConfig::default(),
                other => ModelConfig::for_kind(other),
            };
            Ok(TrainingConfig::new(model))
        }
    }
}

fn with_tracking(pipeline: TrainingPipeline, dir: Option<&Path>) -> TrainingPipeline {
    match dir {
        Some(dir) => {
            let tracker = ExperimentTracker::local(pipeline.config().experiment_name.clone(), dir);
            pipeline.with_tracker(tracker)
        }
        None => pipeline,
    }
}

pub fn cmd_train(
    data: &Path,
    model: &str,
    config: Option<&Path>,
    models_dir: &Path,
    tracking_dir: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");
    let config = training_config(model, config)?;

    step_run("Loading data");
    let start = Instant::now();
    let examples = load_examples(data)?;
    step_done(&format!("{} rows in {:?}", examples.len(), start.elapsed()));

    step_run(&format!("Training {}", config.model.kind.to_string().cyan()));
    let start = Instant::now();
    let pipeline = with_tracking(TrainingPipeline::new(config), tracking_dir);
    let store = ArtifactStore::new(models_dir);
    let (outcome, artifact_id) = pipeline.run_and_publish(&examples, &store)?;
    step_done(&format!("{:?}", start.elapsed()));

    let m = outcome.metrics();
    println!();
    kv("MAE", &format!("{:.2}", m.mae));
    kv("RMSE", &format!("{:.2}", m.rmse));
    kv("R²", &format!("{:.4}", m.r2));
    kv("Train / test", &format!("{} / {}", outcome.report.n_train, outcome.report.n_test));
    kv("Artifact", &artifact_id.to_string());
    kv("Directory", &models_dir.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_compare(data: &Path, tracking_dir: Option<&Path>) -> anyhow::Result<()> {
    section("Compare");

    step_run("Loading data");
    let examples = load_examples(data)?;
    step_done(&format!("{} rows", examples.len()));

    step_run("Training candidates");
    let start = Instant::now();
    let pipeline = with_tracking(TrainingPipeline::new(TrainingConfig::default()), tracking_dir);
    let entries = pipeline.compare(&examples, &default_candidates())?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!(
        "  {:<22} {:>10} {:>10} {:>8} {:>8}",
        muted("Model"),
        muted("MAE"),
        muted("RMSE"),
        muted("R²"),
        muted("Time")
    );
    for (rank, entry) in entries.iter().enumerate() {
        let name = if rank == 0 { ok(&entry.name) } else { entry.name.white() };
        println!(
            "  {:<22} {:>10.2} {:>10.2} {:>8.4} {:>7.2}s",
            name, entry.metrics.mae, entry.metrics.rmse, entry.metrics.r2, entry.training_time_secs
        );
    }
    println!();
    Ok(())
}

pub fn cmd_predict(input: Option<&Path>, models_dir: &Path) -> anyhow::Result<()> {
    section("Predict");

    let cars: Vec<CarRecord> = match input {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            match serde_json::from_str::<Vec<CarRecord>>(&text) {
                Ok(cars) => cars,
                Err(_) => vec![serde_json::from_str::<CarRecord>(&text)?],
            }
        }
        None => vec![CarRecord::example()],
    };

    let service = PredictionService::load(ArtifactStore::new(models_dir))?;
    step_ok(&format!("Loaded artifact {}", service.artifact_id()));
    println!();

    for prediction in service.predict_many(&cars)? {
        let car = &prediction.input;
        println!(
            "  {} {} {} {} {}  {}  {}",
            car.year.to_string().white(),
            car.fuel,
            car.transmission,
            car.owner,
            muted(&format!("{} km", car.km_driven)),
            format!("{:.2}", prediction.price).white().bold(),
            accent(prediction.confidence.as_str())
        );
    }
    println!();
    Ok(())
}

pub async fn cmd_serve(host: &str, port: u16, models_dir: &Path) -> anyhow::Result<()> {
    let config = ServerConfig::default()
        .with_host(host)
        .with_port(port)
        .with_models_dir(models_dir);

    section("Serve");
    kv("Address", &format!("http://{}:{}", host, port));
    kv("Models", &models_dir.display().to_string());
    println!();

    run_server(config).await
}

pub async fn cmd_retrain(
    data: &Path,
    models_dir: &Path,
    staging_dir: Option<&Path>,
    reload_url: Option<&str>,
    tracking_dir: Option<&Path>,
) -> anyhow::Result<()> {
    section("Retrain");

    let mut config = RetrainConfig::new(data, models_dir);
    if let Some(dir) = staging_dir {
        config = config.with_staging_dir(dir);
    }
    if let Some(url) = reload_url {
        config = config.with_reload_url(url);
    }
    if let Some(dir) = tracking_dir {
        config = config.with_tracking_dir(dir);
    }

    step_run("Training candidate");
    let start = Instant::now();
    let decision = RetrainWorkflow::new(config).run_and_signal().await?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    match decision {
        RetrainDecision::DeployedFirst { artifact_id, new_mae } => {
            step_ok(&format!("First deployment {}", artifact_id));
            kv("MAE", &format!("{:.2}", new_mae));
        }
        RetrainDecision::Promoted { artifact_id, new_mae, old_mae } => {
            step_ok(&format!("Promoted {}", artifact_id));
            kv("MAE", &format!("{:.2} → {:.2}", old_mae, new_mae));
        }
        RetrainDecision::Discarded { new_mae, old_mae } => {
            println!("  {} Candidate discarded", "·".yellow());
            kv("MAE", &format!("{:.2} (deployed {:.2})", new_mae, old_mae));
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train() {
        let cli = Cli::try_parse_from(["vehicle-price", "train", "-d", "cars.csv", "-m", "gbt"]).unwrap();
        match cli.command {
            Commands::Train { data, model, config, .. } => {
                assert_eq!(data, PathBuf::from("cars.csv"));
                assert_eq!(model, "gbt");
                assert!(config.is_none());
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_training_config_from_kind() {
        let config = training_config("ridge", None).unwrap();
        assert_eq!(config.model.kind, ModelKind::LinearRidge);
        let config = training_config("rf", None).unwrap();
        assert_eq!(config.model.max_depth, Some(15));
        assert!(training_config("svm", None).is_err());
    }
}
