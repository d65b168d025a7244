/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("No features found for {0} model")]
    NoFeatures(String),

    #[error("Missing state: {0}")]
    MissingState(String),

    #[error("Model {0} has not been fitted yet. Call fit() before storing outputs")]
    NotFitted(String),

    #[error("No training steps have been added to the pipeline")]
    NoSteps,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External API error: {0}")]
    ExternalApi(String),
}

pub type AppResult<T> = Result<T, AppError>;
