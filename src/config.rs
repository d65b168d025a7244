use serde::Deserialize;
use std::{fmt::Display, str::FromStr, time::Duration};

use crate::error::{AppError, AppResult};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// SQLite feature store connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// TMDb API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// TMDb API bearer token, overridden by the CLI flag
    #[serde(default)]
    pub tmdb_api_token: Option<String>,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Feature group holding the enriched movie records
    #[serde(default = "default_movies_feature_group")]
    pub movies_feature_group: String,
}

fn default_database_url() -> String {
    "sqlite://data/feature_store.sqlite".to_string()
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_movies_feature_group() -> String {
    "movies".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            tmdb_api_url: default_tmdb_api_url(),
            tmdb_api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            movies_feature_group: default_movies_feature_group(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
            .map_err(|e| AppError::Configuration(format!("Failed to load config: {}", e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// How the feature pipeline treats movies already in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Fetch everything, ignoring stored IDs
    Initial,
    /// Skip IDs already present in the target feature group
    Incremental,
}

impl LoadMode {
    pub const ALLOWED: [&'static str; 2] = ["initial", "incremental"];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadMode::Initial => "initial",
            LoadMode::Incremental => "incremental",
        }
    }
}

impl Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(LoadMode::Initial),
            "incremental" => Ok(LoadMode::Incremental),
            other => Err(AppError::Configuration(format!(
                "Invalid load type: {}. Must be one of: {}",
                other,
                Self::ALLOWED.join(", ")
            ))),
        }
    }
}
