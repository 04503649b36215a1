//! Loan Decision Pipeline Library
//!
//! Scores loan applications with a pre-trained classifier, applies hard
//! business-rule overrides, explains the outcome, and keeps a deduplicated
//! log of every decision.

pub mod config;
pub mod consumer;
pub mod error;
pub mod explanation;
pub mod feature_encoder;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod policy;
pub mod producer;
pub mod service;
pub mod store;
pub mod types;
pub mod validator;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{InferenceError, PersistenceError, PipelineError, UnknownCategoryError, ValidationError};
pub use feature_encoder::{EncodedFeatureVector, FeatureEncoder};
pub use models::inference::{Classifier, OnnxClassifier};
pub use pipeline::DecisionPipeline;
pub use policy::DecisionPolicy;
pub use producer::ReplyPublisher;
pub use store::PredictionStore;
pub use types::{application::LoanApplication, decision::Decision};
