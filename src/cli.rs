use clap::{Parser, ValueEnum};

use crate::{
    config::{Config, LoadMode},
    error::{AppError, AppResult},
    services::FeaturePipelineConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PipelineKind {
    /// Ingest catalog movies into the feature store
    Feature,
    /// Fit the recommender models and store their similarity matrices
    Train,
}

/// Movie recommendation feature and training pipelines
#[derive(Debug, Parser)]
#[command(name = "movie-recsys", version)]
pub struct Args {
    /// Pipeline to run
    #[arg(long, value_enum)]
    pub pipeline: PipelineKind,

    /// Load type for the feature pipeline: initial or incremental
    #[arg(long = "type")]
    pub load_type: Option<String>,

    /// Number of catalog pages to fetch
    #[arg(long, default_value_t = 400)]
    pub pages: u32,

    /// TMDb API bearer token
    #[arg(long, env = "TMDB_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}

/// Fully validated run request
#[derive(Debug, Clone)]
pub enum Command {
    Feature(FeaturePipelineConfig),
    Train { training_feature_group: String },
}

impl Args {
    /// Validates flag combinations against `config` before any I/O happens
    pub fn into_command(self, config: &Config) -> AppResult<Command> {
        match self.pipeline {
            PipelineKind::Feature => {
                let load_type = self.load_type.ok_or_else(|| {
                    AppError::Configuration(format!(
                        "--type is required for the feature pipeline ({})",
                        LoadMode::ALLOWED.join(", ")
                    ))
                })?;
                let token = self
                    .api_token
                    .or_else(|| config.tmdb_api_token.clone())
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        AppError::Configuration(
                            "--api-token is required for the feature pipeline".to_string(),
                        )
                    })?;

                let pipeline_config = FeaturePipelineConfig::new(
                    token,
                    config.movies_feature_group.clone(),
                    &load_type,
                    self.pages,
                )?
                .with_api_url(config.tmdb_api_url.clone())
                .with_timeout(config.request_timeout());

                Ok(Command::Feature(pipeline_config))
            }
            PipelineKind::Train => Ok(Command::Train {
                training_feature_group: config.movies_feature_group.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("movie-recsys").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_feature_command() {
        let args = parse(&[
            "--pipeline",
            "feature",
            "--type",
            "incremental",
            "--pages",
            "3",
            "--api-token",
            "abc",
        ]);
        let config = Config {
            tmdb_api_url: "http://localhost:9999".to_string(),
            ..Config::default()
        };

        match args.into_command(&config).unwrap() {
            Command::Feature(pipeline) => {
                assert_eq!(pipeline.load_mode, LoadMode::Incremental);
                assert_eq!(pipeline.catalog.pages, 3);
                assert_eq!(pipeline.catalog.token, "abc");
                assert_eq!(pipeline.catalog.api_url, "http://localhost:9999");
                assert_eq!(pipeline.catalog.feature_group, "movies");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_default_pages() {
        let args = parse(&["--pipeline", "train"]);
        assert_eq!(args.pages, 400);
    }

    #[test]
    fn test_feature_requires_type() {
        let args = Args {
            pipeline: PipelineKind::Feature,
            load_type: None,
            pages: 1,
            api_token: Some("abc".to_string()),
        };
        let result = args.into_command(&Config::default());
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_feature_requires_token() {
        let args = Args {
            pipeline: PipelineKind::Feature,
            load_type: Some("initial".to_string()),
            pages: 1,
            api_token: None,
        };
        let result = args.into_command(&Config::default());
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_feature_rejects_unknown_type() {
        let args = Args {
            pipeline: PipelineKind::Feature,
            load_type: Some("full".to_string()),
            pages: 1,
            api_token: Some("abc".to_string()),
        };
        let result = args.into_command(&Config::default());
        assert!(matches!(result, Err(AppError::Configuration(msg)) if msg.contains("full")));
    }

    #[test]
    fn test_train_ignores_feature_flags() {
        let args = Args {
            pipeline: PipelineKind::Train,
            load_type: None,
            pages: 1,
            api_token: None,
        };
        match args.into_command(&Config::default()).unwrap() {
            Command::Train {
                training_feature_group,
            } => assert_eq!(training_feature_group, "movies"),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
