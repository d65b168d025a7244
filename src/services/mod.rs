pub mod catalog;
pub mod feature_pipeline;
pub mod language_families;
pub mod preprocessor;
pub mod recommender;
pub mod similarity;
pub mod training;

pub use catalog::{CatalogClient, CatalogConfig, IngestionReport, MovieBatch};
pub use feature_pipeline::{FeaturePipeline, FeaturePipelineConfig};
pub use language_families::LanguageFamily;
pub use preprocessor::{FittedPreprocessor, MoviePreprocessor};
pub use recommender::{RecommenderModel, RecommenderModelConfig, REQUIRED_FEATURES};
pub use similarity::SimilarityKernel;
pub use training::{movie_models, TrainedStep, TrainingPipeline};
