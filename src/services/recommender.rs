use ndarray::Array2;
use std::sync::Arc;

use crate::{
    db::{FeatureStore, InsertMode},
    error::{AppError, AppResult},
    models::FeatureTable,
    services::{preprocessor::MoviePreprocessor, similarity::SimilarityKernel},
};

/// Columns a movie recommender reads from the training feature group
pub const REQUIRED_FEATURES: [&str; 11] = [
    "original_title",
    "original_language",
    "popularity",
    "vote_average",
    "vote_count",
    "is_popular",
    "runtime",
    "budget",
    "revenue",
    "genres",
    "spoken_languages",
];

#[derive(Debug, Clone)]
pub struct RecommenderModelConfig {
    pub model_name: String,
    pub training_feature_group: String,
    /// Feature group replaced by each `store_outputs` call
    pub similarity_matrix_group: String,
    pub required_features: Vec<String>,
    pub kernel: SimilarityKernel,
}

impl RecommenderModelConfig {
    pub fn new(
        model_name: impl Into<String>,
        training_feature_group: impl Into<String>,
        similarity_matrix_group: impl Into<String>,
        kernel: SimilarityKernel,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            training_feature_group: training_feature_group.into(),
            similarity_matrix_group: similarity_matrix_group.into(),
            required_features: REQUIRED_FEATURES.iter().map(|f| f.to_string()).collect(),
            kernel,
        }
    }
}

/// Item-to-item similarity model over the movie feature group
pub struct RecommenderModel {
    config: RecommenderModelConfig,
    store: Arc<dyn FeatureStore>,
    similarity_matrix: Option<Array2<f64>>,
}

impl RecommenderModel {
    pub fn new(config: RecommenderModelConfig, store: Arc<dyn FeatureStore>) -> Self {
        Self {
            config,
            store,
            similarity_matrix: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.model_name
    }

    pub fn config(&self) -> &RecommenderModelConfig {
        &self.config
    }

    /// `None` until `fit` has succeeded
    pub fn similarity_matrix(&self) -> Option<&Array2<f64>> {
        self.similarity_matrix.as_ref()
    }

    pub async fn fit(&mut self) -> AppResult<()> {
        let features = self
            .store
            .query_features(
                &self.config.training_feature_group,
                Some(self.config.required_features.clone()),
            )
            .await?;

        if features.is_empty() {
            return Err(AppError::NoFeatures(self.config.model_name.clone()));
        }

        let dedup_key = features.numeric_columns()?;
        let deduped = if dedup_key.is_empty() {
            features
        } else {
            features.drop_duplicates(&dedup_key)?
        };
        let deduped = deduped.normalize_types()?;

        let processed = MoviePreprocessor::fit_transform(&deduped)?;
        let similarity = self.config.kernel.compute(&processed, &processed)?;

        tracing::info!(
            model = %self.config.model_name,
            kernel = %self.config.kernel,
            rows = deduped.len(),
            features = processed.ncols(),
            "Model fitted"
        );

        self.similarity_matrix = Some(similarity);
        Ok(())
    }

    /// Replaces the similarity feature group with the fitted matrix
    pub async fn store_outputs(&self) -> AppResult<()> {
        let matrix = self
            .similarity_matrix
            .as_ref()
            .ok_or_else(|| AppError::NotFitted(self.config.model_name.clone()))?;

        self.store
            .insert(
                &self.config.similarity_matrix_group,
                &FeatureTable::from_matrix(matrix),
                InsertMode::Replace,
            )
            .await?;

        tracing::info!(
            model = %self.config.model_name,
            feature_group = %self.config.similarity_matrix_group,
            size = matrix.nrows(),
            "Similarity matrix stored"
        );
        Ok(())
    }
}
