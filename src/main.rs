use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use movie_recsys::{
    cli::{Args, Command},
    config::Config,
    db::{FeatureStore, SqliteFeatureStore},
    services::{movie_models, FeaturePipeline, FeaturePipelineConfig, TrainingPipeline},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    // Flag validation happens before the store is opened
    let command = args.into_command(&config)?;

    let store: Arc<dyn FeatureStore> = Arc::new(
        SqliteFeatureStore::connect(&config.database_url)
            .await
            .with_context(|| format!("Failed to open feature store at {}", config.database_url))?,
    );

    match command {
        Command::Feature(pipeline_config) => run_feature(pipeline_config, store.as_ref()).await?,
        Command::Train {
            training_feature_group,
        } => run_train(store, &training_feature_group).await?,
    }

    Ok(())
}

async fn run_feature(config: FeaturePipelineConfig, store: &dyn FeatureStore) -> Result<()> {
    let report = FeaturePipeline::new(config)
        .run(store)
        .await
        .context("Feature pipeline failed")?;

    tracing::info!(
        stored = report.records_stored,
        skipped = report.records_skipped,
        duplicates = report.duplicates_dropped,
        pages_failed = report.pages_failed,
        popular_pages_failed = report.popular_pages_failed,
        details_failed = report.details_failed,
        "Stored movie features"
    );
    Ok(())
}

async fn run_train(store: Arc<dyn FeatureStore>, training_feature_group: &str) -> Result<()> {
    let mut pipeline = movie_models(store, training_feature_group)
        .into_iter()
        .fold(TrainingPipeline::new(), TrainingPipeline::add_step);

    let trained = pipeline
        .save_model_outputs()
        .await
        .context("Training pipeline failed")?;

    for step in trained {
        tracing::info!(
            model = %step.model_name,
            feature_group = %step.feature_group,
            size = step.size,
            "Model outputs saved"
        );
    }
    Ok(())
}
