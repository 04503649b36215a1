//! Decision, response, and prediction-log data structures

use crate::types::application::LoanApplication;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary loan outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionLabel {
    Approved,
    Rejected,
}

impl DecisionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionLabel::Approved => "Approved",
            DecisionLabel::Rejected => "Rejected",
        }
    }

    /// Parse the stored label back into a decision.
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "Approved" => Some(DecisionLabel::Approved),
            "Rejected" => Some(DecisionLabel::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for DecisionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business rule that forced a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideReason {
    /// Credit score below the hard floor
    CreditScoreFloor,
    /// Loan-to-income ratio above the hard ceiling
    LoanToIncomeCeiling,
}

impl OverrideReason {
    pub fn as_str(self) -> &'static str {
        match self {
            OverrideReason::CreditScoreFloor => "credit_score_floor",
            OverrideReason::LoanToIncomeCeiling => "loan_to_income_ceiling",
        }
    }
}

/// Class probabilities returned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityPair {
    pub reject: f64,
    pub approve: f64,
}

/// Full outcome of the decision policy and explanation generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub probabilities: ProbabilityPair,
    /// Label the model alone would have produced
    pub raw_label: DecisionLabel,
    /// Label after business-rule overrides
    pub final_label: DecisionLabel,
    /// Rules that forced a rejection (empty when none fired)
    pub overrides: Vec<OverrideReason>,
    pub major_conditions: Vec<String>,
    pub credit_tips: Vec<String>,
}

impl Decision {
    pub fn was_overridden(&self) -> bool {
        self.raw_label != self.final_label
    }
}

/// Caller-facing response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: Option<DecisionLabel>,
    pub major_conditions: Vec<String>,
    pub credit_tips: Vec<String>,
    pub error: Option<String>,
}

impl PredictionResponse {
    pub fn success(decision: &Decision) -> Self {
        Self {
            prediction: Some(decision.final_label),
            major_conditions: decision.major_conditions.clone(),
            credit_tips: decision.credit_tips.clone(),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            prediction: None,
            major_conditions: Vec::new(),
            credit_tips: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Append-only prediction log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub application: LoanApplication,
    pub prediction: DecisionLabel,
}
