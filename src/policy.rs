//! Decision policy: model threshold plus hard business-rule overrides.
//!
//! The model proposes, the overrides dispose. An override can only turn an
//! approval into a rejection, never the other way round.

use crate::config::PolicyConfig;
use crate::types::application::LoanApplication;
use crate::types::decision::{DecisionLabel, OverrideReason, ProbabilityPair};

/// Approve iff P(approve) is strictly above this value.
///
/// Below 0.5: the cut-off the model was tuned for.
pub const APPROVAL_PROBABILITY_THRESHOLD: f64 = 0.4;

/// Applications below this credit score are always rejected.
pub const MIN_CREDIT_SCORE: i64 = 600;

/// Applications whose loan-to-income ratio exceeds this are always rejected.
pub const MAX_LOAN_PERCENT_INCOME: f64 = 0.5;

/// Labels produced by the policy for one application
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutcome {
    pub raw_label: DecisionLabel,
    pub final_label: DecisionLabel,
    pub overrides: Vec<OverrideReason>,
}

/// Two-stage decision policy
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPolicy {
    approval_threshold: f64,
    min_credit_score: i64,
    max_loan_percent_income: f64,
}

impl DecisionPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            approval_threshold: config.approval_threshold,
            min_credit_score: config.min_credit_score,
            max_loan_percent_income: config.max_loan_percent_income,
        }
    }

    /// Label the model output alone would produce.
    pub fn raw_label(&self, probabilities: &ProbabilityPair) -> DecisionLabel {
        if probabilities.approve > self.approval_threshold {
            DecisionLabel::Approved
        } else {
            DecisionLabel::Rejected
        }
    }

    /// Business rules that force a rejection for this application.
    pub fn overrides(&self, app: &LoanApplication) -> Vec<OverrideReason> {
        let mut reasons = Vec::new();
        if app.credit_score < self.min_credit_score {
            reasons.push(OverrideReason::CreditScoreFloor);
        }
        if app.loan_percent_income() > self.max_loan_percent_income {
            reasons.push(OverrideReason::LoanToIncomeCeiling);
        }
        reasons
    }

    /// Combine model output with the overrides. Deterministic.
    pub fn decide(&self, probabilities: &ProbabilityPair, app: &LoanApplication) -> PolicyOutcome {
        let raw_label = self.raw_label(probabilities);
        let overrides = self.overrides(app);

        let final_label = if overrides.is_empty() {
            raw_label
        } else {
            DecisionLabel::Rejected
        };

        PolicyOutcome {
            raw_label,
            final_label,
            overrides,
        }
    }

    pub fn approval_threshold(&self) -> f64 {
        self.approval_threshold
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            approval_threshold: APPROVAL_PROBABILITY_THRESHOLD,
            min_credit_score: MIN_CREDIT_SCORE,
            max_loan_percent_income: MAX_LOAN_PERCENT_INCOME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::application::{Education, Gender, HomeOwnership, LoanIntent, PriorDefaults};

    fn application(credit_score: i64, income: i64, loan_amount: i64) -> LoanApplication {
        LoanApplication {
            age: 35,
            income,
            employment_experience: 8,
            loan_amount,
            interest_rate: 11.0,
            credit_score,
            prior_defaults: PriorDefaults::No,
            gender: Gender::Male,
            education: Education::Bachelor,
            home_ownership: HomeOwnership::Rent,
            loan_intent: LoanIntent::Education,
        }
    }

    fn probs(approve: f64) -> ProbabilityPair {
        ProbabilityPair {
            reject: 1.0 - approve,
            approve,
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        let policy = DecisionPolicy::default();
        assert_eq!(policy.raw_label(&probs(0.4)), DecisionLabel::Rejected);
        assert_eq!(policy.raw_label(&probs(0.41)), DecisionLabel::Approved);
        // below 0.5 still approves
        assert_eq!(policy.raw_label(&probs(0.45)), DecisionLabel::Approved);
    }

    #[test]
    fn test_credit_floor_overrides_confident_model() {
        let policy = DecisionPolicy::default();
        let outcome = policy.decide(&probs(0.99), &application(599, 100000, 10000));

        assert_eq!(outcome.raw_label, DecisionLabel::Approved);
        assert_eq!(outcome.final_label, DecisionLabel::Rejected);
        assert_eq!(outcome.overrides, vec![OverrideReason::CreditScoreFloor]);
    }

    #[test]
    fn test_credit_floor_boundary() {
        let policy = DecisionPolicy::default();
        let outcome = policy.decide(&probs(0.9), &application(600, 100000, 50000));

        assert!(outcome.overrides.is_empty());
        assert_eq!(outcome.final_label, DecisionLabel::Approved);
    }

    #[test]
    fn test_ratio_ceiling() {
        let policy = DecisionPolicy::default();

        // exactly 0.5 is allowed
        let at_limit = policy.decide(&probs(0.9), &application(720, 40000, 20000));
        assert_eq!(at_limit.final_label, DecisionLabel::Approved);

        let above = policy.decide(&probs(0.9), &application(720, 40000, 20001));
        assert_eq!(above.final_label, DecisionLabel::Rejected);
        assert_eq!(above.overrides, vec![OverrideReason::LoanToIncomeCeiling]);
    }

    #[test]
    fn test_both_overrides_reported() {
        let policy = DecisionPolicy::default();
        let outcome = policy.decide(&probs(0.2), &application(550, 10000, 9000));

        assert_eq!(outcome.raw_label, DecisionLabel::Rejected);
        assert_eq!(outcome.final_label, DecisionLabel::Rejected);
        assert_eq!(outcome.overrides.len(), 2);
    }

    #[test]
    fn test_override_sweep_never_approves() {
        let policy = DecisionPolicy::default();
        for credit in (300..600).step_by(7) {
            for approve in [0.0, 0.41, 0.75, 1.0] {
                let outcome = policy.decide(&probs(approve), &application(credit, 80000, 1000));
                assert_eq!(outcome.final_label, DecisionLabel::Rejected);
            }
        }
        for loan in [40001, 60000, 200000] {
            let outcome = policy.decide(&probs(1.0), &application(800, 80000, loan));
            assert_eq!(outcome.final_label, DecisionLabel::Rejected);
        }
    }

    #[test]
    fn test_deterministic() {
        let policy = DecisionPolicy::default();
        let app = application(680, 55000, 12000);
        let first = policy.decide(&probs(0.52), &app);
        for _ in 0..10 {
            assert_eq!(policy.decide(&probs(0.52), &app), first);
        }
    }

    #[test]
    fn test_from_config() {
        let config = PolicyConfig {
            approval_threshold: 0.6,
            min_credit_score: 650,
            max_loan_percent_income: 0.4,
        };
        let policy = DecisionPolicy::new(&config);
        assert_eq!(policy.raw_label(&probs(0.55)), DecisionLabel::Rejected);
        assert_eq!(policy.overrides(&application(640, 50000, 1000)).len(), 1);
    }
}
