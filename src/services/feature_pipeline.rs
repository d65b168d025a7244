use std::time::Duration;

use crate::{
    config::LoadMode,
    db::FeatureStore,
    error::AppResult,
    services::catalog::{CatalogClient, CatalogConfig, IngestionReport},
};

#[derive(Debug, Clone)]
pub struct FeaturePipelineConfig {
    pub catalog: CatalogConfig,
    pub load_mode: LoadMode,
}

impl FeaturePipelineConfig {
    /// Fails with `Configuration` when `load_type` is not a known mode
    pub fn new(
        api_token: impl Into<String>,
        feature_group: impl Into<String>,
        load_type: &str,
        pages: u32,
    ) -> AppResult<Self> {
        let load_mode = load_type.parse::<LoadMode>()?;
        let catalog = CatalogConfig {
            pages,
            ..CatalogConfig::new(api_token, feature_group)
        };
        Ok(Self { catalog, load_mode })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.catalog.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.catalog.timeout = timeout;
        self
    }
}

/// Fetches, enriches and stores one run of catalog movies
pub struct FeaturePipeline {
    config: FeaturePipelineConfig,
}

impl FeaturePipeline {
    pub fn new(config: FeaturePipelineConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, store: &dyn FeatureStore) -> AppResult<IngestionReport> {
        let feature_group = &self.config.catalog.feature_group;
        tracing::info!(
            load_mode = %self.config.load_mode,
            feature_group = %feature_group,
            pages = self.config.catalog.pages,
            "Starting feature pipeline"
        );

        let existing_ids = match self.config.load_mode {
            LoadMode::Incremental => {
                let ids = store.fetch_existing_ids(feature_group).await?;
                tracing::info!(existing = ids.len(), "Loaded existing movie IDs");
                Some(ids)
            }
            LoadMode::Initial => None,
        };

        let client = CatalogClient::new(self.config.catalog.clone());
        let batch = client.fetch_movies(existing_ids.as_ref()).await?;
        let batch = client.mark_popular(batch).await;
        let batch = client.fetch_extended_info(batch).await;
        let report = client.persist(batch, store).await?;

        tracing::info!(
            stored = report.records_stored,
            skipped = report.records_skipped,
            pages_failed = report.pages_failed,
            details_failed = report.details_failed,
            "Feature pipeline finished"
        );

        Ok(report)
    }
}
