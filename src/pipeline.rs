//! End-to-end decisioning pipeline.
//!
//! validate -> encode -> infer -> policy -> explain -> persist -> respond
//!
//! Every step before persistence is terminal on failure. Persistence
//! failures are logged and counted but never change the response.

use crate::error::{ConfigError, PipelineError};
use crate::explanation::explain;
use crate::feature_encoder::{FeatureEncoder, FEATURE_COUNT};
use crate::metrics::DecisionMetrics;
use crate::models::inference::Classifier;
use crate::policy::DecisionPolicy;
use crate::store::{PersistOutcome, PredictionStore};
use crate::types::application::{LoanApplication, LoanApplicationRequest};
use crate::types::decision::{Decision, PredictionResponse};
use crate::validator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of handling one request, ready to be sent back
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// HTTP-equivalent status code
    pub status: u16,
    pub response: PredictionResponse,
    /// Full decision (absent on failure)
    pub decision: Option<Decision>,
    /// Store result (absent on failure or when the store was unreachable)
    pub persisted: Option<PersistOutcome>,
}

/// The decisioning pipeline with its injected collaborators
pub struct DecisionPipeline {
    encoder: FeatureEncoder,
    classifier: Arc<dyn Classifier>,
    policy: DecisionPolicy,
    store: Arc<PredictionStore>,
    metrics: Arc<DecisionMetrics>,
}

impl DecisionPipeline {
    /// Assemble the pipeline.
    ///
    /// Fails when the classifier was trained on a different column count
    /// than the encoder produces.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        policy: DecisionPolicy,
        store: Arc<PredictionStore>,
        metrics: Arc<DecisionMetrics>,
    ) -> Result<Self, ConfigError> {
        let encoder = FeatureEncoder::new();
        if classifier.feature_count() != encoder.feature_count() {
            return Err(ConfigError::FeatureCountMismatch {
                encoder: FEATURE_COUNT,
                model: classifier.feature_count(),
            });
        }

        info!(
            classifier = %classifier.name(),
            features = encoder.feature_count(),
            approval_threshold = policy.approval_threshold(),
            "Decision pipeline assembled"
        );

        Ok(Self {
            encoder,
            classifier,
            policy,
            store,
            metrics,
        })
    }

    /// Validate, encode, infer, apply policy, and explain. No side effects.
    pub fn decide(
        &self,
        request: &LoanApplicationRequest,
    ) -> Result<(LoanApplication, Decision), PipelineError> {
        let fields = validator::validate(request)?;
        let app = self.encoder.resolve(&fields)?;
        let features = self.encoder.encode(&app);

        let probabilities = self.classifier.predict_proba(&features)?;
        let outcome = self.policy.decide(&probabilities, &app);
        let explanation = explain(
            outcome.final_label,
            app.credit_score,
            app.loan_percent_income(),
            app.prior_defaults,
        );

        let decision = Decision {
            probabilities,
            raw_label: outcome.raw_label,
            final_label: outcome.final_label,
            overrides: outcome.overrides,
            major_conditions: explanation.major_conditions,
            credit_tips: explanation.credit_tips,
        };
        Ok((app, decision))
    }

    /// Handle one request at the current time.
    pub fn handle(&self, request: &LoanApplicationRequest) -> PipelineOutcome {
        self.handle_at(request, Utc::now())
    }

    /// Handle one request as if received at `now`.
    pub fn handle_at(&self, request: &LoanApplicationRequest, now: DateTime<Utc>) -> PipelineOutcome {
        let start = Instant::now();

        let (app, decision) = match self.decide(request) {
            Ok(result) => result,
            Err(e) => {
                self.metrics.record_failure(e.kind(), start.elapsed());
                warn!(kind = e.kind(), error = %e, "Application rejected as invalid");
                return PipelineOutcome {
                    status: e.status_code(),
                    response: PredictionResponse::failure(e.to_string()),
                    decision: None,
                    persisted: None,
                };
            }
        };

        let persisted = match self.store.record(&app, decision.final_label, now) {
            Ok(outcome) => {
                if let PersistOutcome::Duplicate { previous_id, .. } = outcome {
                    self.metrics.record_duplicate();
                    debug!(previous_id = previous_id, "Duplicate submission not persisted");
                }
                Some(outcome)
            }
            Err(e) => {
                self.metrics.record_persistence_failure();
                error!(error = %e, application = %app.summary(), "Failed to persist prediction");
                None
            }
        };

        let elapsed = start.elapsed();
        self.metrics.record_decision(
            elapsed,
            decision.probabilities.approve,
            decision.final_label,
            &decision.overrides,
            decision.was_overridden(),
        );

        info!(
            application = %app.summary(),
            p_approve = decision.probabilities.approve,
            raw = %decision.raw_label,
            decision = %decision.final_label,
            overridden = decision.was_overridden(),
            processing_time_us = elapsed.as_micros(),
            "Loan application decided"
        );

        PipelineOutcome {
            status: 200,
            response: PredictionResponse::success(&decision),
            decision: Some(decision),
            persisted,
        }
    }

    pub fn store(&self) -> &Arc<PredictionStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<DecisionMetrics> {
        &self.metrics
    }
}
