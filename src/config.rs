//! Configuration management for the loan decision pipeline

use crate::error::ConfigError;
use crate::feature_encoder::FEATURE_COUNT;
use crate::policy::{APPROVAL_PROBABILITY_THRESHOLD, MAX_LOAN_PERCENT_INCOME, MIN_CREDIT_SCORE};
use crate::store::DEFAULT_DEDUP_WINDOW_SECS;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable that overrides the configuration file path
pub const CONFIG_PATH_ENV: &str = "LOAN_PIPELINE_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming loan applications (request/reply)
    pub application_subject: String,
    /// Subject for prediction history queries (request/reply)
    pub history_subject: String,
    /// Queue group shared by service instances (none: every instance answers)
    #[serde(default)]
    pub queue_group: Option<String>,
}

/// Classifier artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the ONNX export of the trained classifier
    pub path: String,
    /// Number of columns the model was trained on
    pub feature_count: usize,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Decision policy thresholds
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolicyConfig {
    /// Approve iff P(approve) is strictly above this value
    pub approval_threshold: f64,
    /// Hard floor: lower credit scores are always rejected
    pub min_credit_score: i64,
    /// Hard ceiling: higher loan-to-income ratios are always rejected
    pub max_loan_percent_income: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            approval_threshold: APPROVAL_PROBABILITY_THRESHOLD,
            min_credit_score: MIN_CREDIT_SCORE,
            max_loan_percent_income: MAX_LOAN_PERCENT_INCOME,
        }
    }
}

/// Prediction log configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: String,
    /// Identical applications inside this window are not persisted again
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    /// Number of records returned by history queries
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_dedup_window_secs() -> u64 {
    DEFAULT_DEDUP_WINDOW_SECS
}

fn default_history_limit() -> usize {
    10
}

/// Service loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum requests processed concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `LOAN_PIPELINE_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// `LOAN_PIPELINE__<SECTION>__<KEY>` environment variables override file values.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("LOAN_PIPELINE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Fail fast on settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.feature_count != FEATURE_COUNT {
            return Err(ConfigError::FeatureCountMismatch {
                encoder: FEATURE_COUNT,
                model: self.model.feature_count,
            });
        }

        let unit_range = |name: &'static str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    name,
                    value,
                    min: 0.0,
                    max: 1.0,
                })
            }
        };
        unit_range("policy.approval_threshold", self.policy.approval_threshold)?;
        unit_range(
            "policy.max_loan_percent_income",
            self.policy.max_loan_percent_income,
        )?;

        if self.pipeline.workers == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.workers must be at least 1".to_string(),
            ));
        }
        if self.store.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "store.history_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                application_subject: "loan.applications".to_string(),
                history_subject: "loan.history".to_string(),
                queue_group: Some("loan-decision".to_string()),
            },
            model: ModelConfig {
                path: "models/loan_model.onnx".to_string(),
                feature_count: FEATURE_COUNT,
                onnx_threads: 1,
            },
            policy: PolicyConfig::default(),
            store: StoreConfig {
                path: "data/predictions.db".to_string(),
                dedup_window_secs: DEFAULT_DEDUP_WINDOW_SECS,
                history_limit: 10,
            },
            pipeline: PipelineConfig {
                workers: 4,
                metrics_interval_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
