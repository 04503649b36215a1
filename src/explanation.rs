//! Human-readable explanation of a final decision.
//!
//! These thresholds restate the business rules in customer terms. They are
//! stricter than the hard overrides in `policy` and kept as separate
//! constants.

use crate::types::application::PriorDefaults;
use crate::types::decision::DecisionLabel;

/// Credit score considered good in explanations.
pub const GOOD_CREDIT_SCORE: i64 = 700;

/// Loan-to-income ratio considered low in explanations.
pub const LOW_RATIO_LIMIT: f64 = 0.3;

pub const NO_TIPS: &str = "No specific tips at this time.";

/// Conditions and tips for one decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub major_conditions: Vec<String>,
    pub credit_tips: Vec<String>,
}

/// Explain a final decision. Pure.
pub fn explain(
    decision: DecisionLabel,
    credit_score: i64,
    loan_percent_income: f64,
    prior_defaults: PriorDefaults,
) -> Explanation {
    let good_credit = credit_score >= GOOD_CREDIT_SCORE;
    let low_ratio = loan_percent_income <= LOW_RATIO_LIMIT;
    let has_defaults = prior_defaults == PriorDefaults::Yes;

    let mut major_conditions = Vec::new();
    let mut credit_tips = Vec::new();

    match decision {
        DecisionLabel::Rejected => {
            if has_defaults {
                major_conditions.push("Previous loan defaults on file (Yes)".to_string());
            }
            if !good_credit {
                major_conditions.push("Low credit score (<700)".to_string());
            }
            if !low_ratio {
                major_conditions.push("High loan-to-income ratio (>30%)".to_string());
            }

            if !good_credit {
                credit_tips.push("Increase your credit score by paying down debts.".to_string());
            }
            if !low_ratio {
                credit_tips.push(
                    "Reduce your loan-to-income ratio by lowering the loan amount or increasing income."
                        .to_string(),
                );
            }
            if has_defaults {
                credit_tips
                    .push("Avoid future defaults and maintain a clean credit history.".to_string());
            }
        }
        DecisionLabel::Approved => {
            if !has_defaults {
                major_conditions.push("No previous loan defaults on file".to_string());
            }
            if good_credit {
                major_conditions.push("Good credit score (>=700)".to_string());
            }
            if low_ratio {
                major_conditions.push("Low loan-to-income ratio (<=30%)".to_string());
            }
        }
    }

    if credit_tips.is_empty() {
        credit_tips.push(NO_TIPS.to_string());
    }

    Explanation {
        major_conditions,
        credit_tips,
    }
}
