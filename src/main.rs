//! vehicle-price - main entry point

use clap::Parser;
use vehicle_price::cli::{cmd_compare, cmd_generate, cmd_predict, cmd_retrain, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vehicle_price=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { output, rows, seed } => {
            cmd_generate(&output, rows, seed)?;
        }
        Commands::Train { data, model, config, models_dir, tracking_dir } => {
            cmd_train(&data, &model, config.as_deref(), &models_dir, tracking_dir.as_deref())?;
        }
        Commands::Compare { data, tracking_dir } => {
            cmd_compare(&data, tracking_dir.as_deref())?;
        }
        Commands::Predict { input, models_dir } => {
            cmd_predict(input.as_deref(), &models_dir)?;
        }
        Commands::Serve { port, host, models_dir } => {
            cmd_serve(&host, port, &models_dir).await?;
        }
        Commands::Retrain { data, models_dir, staging_dir, reload_url, tracking_dir } => {
            cmd_retrain(
                &data,
                &models_dir,
                staging_dir.as_deref(),
                reload_url.as_deref(),
                tracking_dir.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}
