//! Wire-level request handling for the NATS service.
//!
//! Turns raw message payloads into reply envelopes. Kept free of any I/O
//! so the service loop in `main` only moves bytes.

use crate::error::{PipelineError, ValidationError};
use crate::pipeline::{DecisionPipeline, PipelineOutcome};
use crate::store::{HistorySummary, PredictionStore, MAX_HISTORY_LIMIT};
use crate::types::application::LoanApplicationRequest;
use crate::types::decision::{PredictionRecord, PredictionResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

/// Reply to a loan application request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationReply {
    /// HTTP-equivalent status code
    pub status: u16,
    pub request_id: Uuid,
    #[serde(flatten)]
    pub body: PredictionResponse,
}

impl ApplicationReply {
    fn from_outcome(request_id: Uuid, outcome: PipelineOutcome) -> Self {
        Self {
            status: outcome.status,
            request_id,
            body: outcome.response,
        }
    }
}

/// History query payload. An empty payload means the default limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryRequest {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Reply to a history query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryReply {
    pub status: u16,
    pub request_id: Uuid,
    pub records: Vec<PredictionRecord>,
    pub summary: Option<HistorySummary>,
    pub error: Option<String>,
}

/// Decode a loan application payload and run it through the pipeline.
pub fn handle_application(pipeline: &DecisionPipeline, payload: &[u8]) -> ApplicationReply {
    let request_id = Uuid::new_v4();

    match serde_json::from_slice::<LoanApplicationRequest>(payload) {
        Ok(request) => ApplicationReply::from_outcome(request_id, pipeline.handle(&request)),
        Err(e) => {
            let err = PipelineError::from(ValidationError::new(format!(
                "Invalid request payload: {e}"
            )));
            warn!(request_id = %request_id, error = %err, "Failed to deserialize application");
            pipeline.metrics().record_failure(err.kind(), std::time::Duration::ZERO);
            ApplicationReply {
                status: err.status_code(),
                request_id,
                body: PredictionResponse::failure(err.to_string()),
            }
        }
    }
}

/// Answer a history query from the prediction log.
pub fn handle_history(store: &PredictionStore, payload: &[u8], default_limit: usize) -> HistoryReply {
    let request_id = Uuid::new_v4();

    let request = if payload.iter().all(u8::is_ascii_whitespace) {
        HistoryRequest::default()
    } else {
        match serde_json::from_slice::<HistoryRequest>(payload) {
            Ok(request) => request,
            Err(e) => {
                return HistoryReply {
                    status: 400,
                    request_id,
                    records: Vec::new(),
                    summary: None,
                    error: Some(format!("Invalid history request: {e}")),
                }
            }
        }
    };

    let limit = request
        .limit
        .unwrap_or(default_limit)
        .clamp(1, MAX_HISTORY_LIMIT);
    match store.history(limit) {
        Ok((records, summary)) => HistoryReply {
            status: 200,
            request_id,
            records,
            summary: Some(summary),
            error: None,
        },
        Err(e) => {
            error!(request_id = %request_id, error = %e, "History query failed");
            HistoryReply {
                status: 500,
                request_id,
                records: Vec::new(),
                summary: None,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::feature_encoder::{EncodedFeatureVector, FEATURE_COUNT};
    use crate::metrics::DecisionMetrics;
    use crate::models::inference::{normalize_probabilities, Classifier};
    use crate::policy::DecisionPolicy;
    use crate::types::decision::{DecisionLabel, ProbabilityPair};
    use chrono::Duration;
    use std::sync::Arc;

    struct Approving;

    impl Classifier for Approving {
        fn name(&self) -> &str {
            "approving"
        }

        fn feature_count(&self) -> usize {
            FEATURE_COUNT
        }

        fn predict_proba(&self, _: &EncodedFeatureVector) -> Result<ProbabilityPair, InferenceError> {
            normalize_probabilities(0.25, 0.75)
        }
    }

    fn pipeline() -> DecisionPipeline {
        let store = Arc::new(PredictionStore::in_memory(Duration::seconds(60)).unwrap());
        DecisionPipeline::new(
            Arc::new(Approving),
            DecisionPolicy::default(),
            store,
            Arc::new(DecisionMetrics::new()),
        )
        .unwrap()
    }

    const FORM_STYLE: &str = r#"{
        "person_age": "25", "person_income": "50000", "person_emp_exp": "5",
        "loan_amnt": "5000", "loan_int_rate": "5.0", "credit_score": "750",
        "previous_loan_defaults": "No", "person_gender": "Female",
        "person_education": "High School", "person_home_ownership": "Own",
        "loan_intent": "Personal"
    }"#;

    #[test]
    fn test_application_reply_wire_shape() {
        let pipeline = pipeline();
        let reply = handle_application(&pipeline, FORM_STYLE.as_bytes());

        assert_eq!(reply.status, 200);
        assert_eq!(reply.body.prediction, Some(DecisionLabel::Approved));

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["prediction"], "Approved");
        assert!(value["error"].is_null());
        assert_eq!(value["major_conditions"].as_array().unwrap().len(), 3);
        assert!(value["request_id"].is_string());
    }

    #[test]
    fn test_malformed_payload_is_bad_request() {
        let pipeline = pipeline();
        let reply = handle_application(&pipeline, b"not json");

        assert_eq!(reply.status, 400);
        assert!(reply.body.prediction.is_none());
        assert!(reply
            .body
            .error
            .as_deref()
            .unwrap()
            .starts_with("Invalid request payload"));
    }

    #[test]
    fn test_history_after_duplicates() {
        let pipeline = pipeline();
        handle_application(&pipeline, FORM_STYLE.as_bytes());
        handle_application(&pipeline, FORM_STYLE.as_bytes());

        let reply = handle_history(pipeline.store(), b"", 10);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.records.len(), 1);

        let summary = reply.summary.unwrap();
        assert_eq!(summary.total_records, 1);
        assert!((summary.approval_rate - 100.0).abs() < 1e-9);

        let limited = handle_history(pipeline.store(), br#"{"limit": 0}"#, 10);
        assert_eq!(limited.records.len(), 1);

        let bad = handle_history(pipeline.store(), br#""oops""#, 10);
        assert_eq!(bad.status, 400);
    }

    #[test]
    fn test_history_limit_is_capped() {
        let pipeline = pipeline();
        let store = pipeline.store();
        let mut request = LoanApplicationRequest::from(&store_application());
        for i in 0..(MAX_HISTORY_LIMIT + 5) {
            request.person_income = Some((40_000 + i as i64).into());
            pipeline.handle(&request);
        }
        assert_eq!(store.count().unwrap(), (MAX_HISTORY_LIMIT + 5) as u64);

        let reply = handle_history(store, br#"{"limit": 18446744073709551615}"#, 10);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.records.len(), MAX_HISTORY_LIMIT);

        let summary = reply.summary.unwrap();
        assert_eq!(summary.considered, MAX_HISTORY_LIMIT);
        assert_eq!(summary.total_records, (MAX_HISTORY_LIMIT + 5) as u64);
    }

    fn store_application() -> crate::types::application::LoanApplication {
        use crate::types::application::{
            Education, Gender, HomeOwnership, LoanApplication, LoanIntent, PriorDefaults,
        };
        LoanApplication {
            age: 30,
            income: 40_000,
            employment_experience: 4,
            loan_amount: 4_000,
            interest_rate: 7.5,
            credit_score: 720,
            prior_defaults: PriorDefaults::No,
            gender: Gender::Male,
            education: Education::Bachelor,
            home_ownership: HomeOwnership::Rent,
            loan_intent: LoanIntent::Venture,
        }
    }
}
