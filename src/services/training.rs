use std::sync::Arc;

use crate::{
    db::FeatureStore,
    error::{AppError, AppResult},
    services::{
        recommender::{RecommenderModel, RecommenderModelConfig},
        similarity::SimilarityKernel,
    },
};

/// Outcome of one trained and stored step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainedStep {
    pub model_name: String,
    pub feature_group: String,
    pub size: usize,
}

/// Ordered set of recommender models, at most one per name
#[derive(Default)]
pub struct TrainingPipeline {
    steps: Vec<RecommenderModel>,
}

impl TrainingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `model`; a model with the same name is replaced in its slot
    pub fn add_step(mut self, model: RecommenderModel) -> Self {
        match self.steps.iter().position(|s| s.name() == model.name()) {
            Some(idx) => {
                tracing::debug!(model = %model.name(), "Replacing training step");
                self.steps[idx] = model;
            }
            None => self.steps.push(model),
        }
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Fits and stores every step in registration order
    ///
    /// Stops at the first failure; outputs already stored stay in place.
    pub async fn save_model_outputs(&mut self) -> AppResult<Vec<TrainedStep>> {
        if self.steps.is_empty() {
            return Err(AppError::NoSteps);
        }

        let mut trained = Vec::with_capacity(self.steps.len());
        for step in self.steps.iter_mut() {
            step.fit().await?;
            step.store_outputs().await?;

            trained.push(TrainedStep {
                model_name: step.name().to_string(),
                feature_group: step.config().similarity_matrix_group.clone(),
                size: step.similarity_matrix().map_or(0, |m| m.nrows()),
            });
        }

        tracing::info!(steps = trained.len(), "Training pipeline finished");
        Ok(trained)
    }
}

/// The two default movie models: cosine similarity and linear kernel
pub fn movie_models(store: Arc<dyn FeatureStore>, training_group: &str) -> Vec<RecommenderModel> {
    vec![
        RecommenderModel::new(
            RecommenderModelConfig::new(
                "cosine-similarity-movies",
                training_group,
                "cosine_similarity_movies",
                SimilarityKernel::Cosine,
            ),
            Arc::clone(&store),
        ),
        RecommenderModel::new(
            RecommenderModelConfig::new(
                "linear-kernel-movies",
                training_group,
                "linear_kernel_similarity_movies",
                SimilarityKernel::Linear,
            ),
            store,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockFeatureStore;
    use crate::models::FeatureTable;

    fn model(name: &str, output: &str, store: Arc<dyn FeatureStore>) -> RecommenderModel {
        RecommenderModel::new(
            RecommenderModelConfig::new(name, "movies", output, SimilarityKernel::Cosine),
            store,
        )
    }

    #[tokio::test]
    async fn test_no_steps() {
        let mut pipeline = TrainingPipeline::new();
        let result = pipeline.save_model_outputs().await;
        assert!(matches!(result, Err(AppError::NoSteps)));
    }

    #[test]
    fn test_same_name_replaces_in_place() {
        let store: Arc<dyn FeatureStore> = Arc::new(MockFeatureStore::new());
        let pipeline = TrainingPipeline::new()
            .add_step(model("a", "out_a", Arc::clone(&store)))
            .add_step(model("b", "out_b", Arc::clone(&store)))
            .add_step(model("a", "out_a2", Arc::clone(&store)));

        assert_eq!(pipeline.step_names(), vec!["a", "b"]);
        assert_eq!(pipeline.steps[0].config().similarity_matrix_group, "out_a2");
    }

    #[test]
    fn test_default_movie_models() {
        let store: Arc<dyn FeatureStore> = Arc::new(MockFeatureStore::new());
        let models = movie_models(store, "movies");
        let names: Vec<&str> = models.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["cosine-similarity-movies", "linear-kernel-movies"]);
        assert_eq!(models[1].config().kernel, SimilarityKernel::Linear);
        assert_eq!(
            models[1].config().similarity_matrix_group,
            "linear_kernel_similarity_movies"
        );
    }

    #[tokio::test]
    async fn test_failure_stops_remaining_steps() {
        let mut store = MockFeatureStore::new();
        store
            .expect_query_features()
            .times(1)
            .returning(|_, _| Ok(FeatureTable::default()));
        store.expect_insert().times(0);
        let store: Arc<dyn FeatureStore> = Arc::new(store);

        let mut pipeline = TrainingPipeline::new()
            .add_step(model("first", "out_first", Arc::clone(&store)))
            .add_step(model("second", "out_second", Arc::clone(&store)));

        let result = pipeline.save_model_outputs().await;
        assert!(matches!(result, Err(AppError::NoFeatures(name)) if name == "first"));
    }
}
