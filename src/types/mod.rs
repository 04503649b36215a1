//! Type definitions for the loan decision pipeline

pub mod application;
pub mod decision;

pub use application::{
    Category, Education, FieldValue, Gender, HomeOwnership, LoanApplication,
    LoanApplicationRequest, LoanIntent, PriorDefaults,
};
pub use decision::{
    Decision, DecisionLabel, OverrideReason, PredictionRecord, PredictionResponse,
    ProbabilityPair,
};
