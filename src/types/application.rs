//! Loan application data structures

use crate::error::UnknownCategoryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed categorical set with a fixed, declared order.
///
/// The declaration order of `ALL` is the one-hot column order the model
/// was trained with and must never be reshuffled.
pub trait Category: Copy + Eq + Sized + 'static {
    /// Request field name, used in error messages.
    const FIELD: &'static str;
    /// Every member, in encoding order.
    const ALL: &'static [Self];

    /// Wire representation of the value.
    fn as_str(self) -> &'static str;

    /// Total mapping from the wire representation. Matching is exact.
    fn parse(value: &str) -> Result<Self, UnknownCategoryError> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == value)
            .ok_or_else(|| UnknownCategoryError {
                field: Self::FIELD,
                value: value.to_string(),
            })
    }

    /// Position of the value within `ALL`.
    fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|&c| c == self)
            .unwrap_or_default()
    }
}

macro_rules! category {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl Category for $name {
            const FIELD: &'static str = $field;
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

category! {
    /// Whether the applicant has previous loan defaults on file
    PriorDefaults, "previous_loan_defaults" {
        Yes => "Yes",
        No => "No",
    }
}

category! {
    /// Applicant gender
    Gender, "person_gender" {
        Male => "Male",
        Female => "Female",
    }
}

category! {
    /// Highest completed education level
    Education, "person_education" {
        HighSchool => "High School",
        Bachelor => "Bachelor",
        Master => "Master",
        Doctorate => "Doctorate",
    }
}

category! {
    /// Home ownership status
    HomeOwnership, "person_home_ownership" {
        Own => "Own",
        Rent => "Rent",
        Other => "Other",
    }
}

category! {
    /// Declared purpose of the loan
    LoanIntent, "loan_intent" {
        Personal => "Personal",
        Education => "Education",
        Medical => "Medical",
        HomeImprovement => "HomeImprovement",
        Venture => "Venture",
    }
}

/// A raw numeric field as it arrives on the wire.
///
/// JSON clients send numbers; form-style clients send numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Unvalidated loan application request.
///
/// Every field is optional so that a missing field surfaces as a
/// validation message rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanApplicationRequest {
    #[serde(default)]
    pub person_age: Option<FieldValue>,
    #[serde(default)]
    pub person_income: Option<FieldValue>,
    #[serde(default)]
    pub person_emp_exp: Option<FieldValue>,
    #[serde(default)]
    pub loan_amnt: Option<FieldValue>,
    #[serde(default)]
    pub loan_int_rate: Option<FieldValue>,
    #[serde(default)]
    pub credit_score: Option<FieldValue>,
    #[serde(default)]
    pub previous_loan_defaults: Option<String>,
    #[serde(default)]
    pub person_gender: Option<String>,
    #[serde(default)]
    pub person_education: Option<String>,
    #[serde(default)]
    pub person_home_ownership: Option<String>,
    #[serde(default)]
    pub loan_intent: Option<String>,
}

/// A validated, fully typed loan application. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    #[serde(rename = "person_age")]
    pub age: i64,
    #[serde(rename = "person_income")]
    pub income: i64,
    #[serde(rename = "person_emp_exp")]
    pub employment_experience: i64,
    #[serde(rename = "loan_amnt")]
    pub loan_amount: i64,
    #[serde(rename = "loan_int_rate")]
    pub interest_rate: f64,
    pub credit_score: i64,
    #[serde(rename = "previous_loan_defaults")]
    pub prior_defaults: PriorDefaults,
    #[serde(rename = "person_gender")]
    pub gender: Gender,
    #[serde(rename = "person_education")]
    pub education: Education,
    #[serde(rename = "person_home_ownership")]
    pub home_ownership: HomeOwnership,
    pub loan_intent: LoanIntent,
}

impl LoanApplication {
    /// Loan amount divided by annual income.
    ///
    /// Income is positive for every validated application.
    pub fn loan_percent_income(&self) -> f64 {
        self.loan_amount as f64 / self.income as f64
    }

    /// Short human-readable identity used in log fields.
    pub fn summary(&self) -> String {
        format!(
            "age={} income={} loan={} credit={} defaults={}",
            self.age, self.income, self.loan_amount, self.credit_score, self.prior_defaults
        )
    }
}

impl From<&LoanApplication> for LoanApplicationRequest {
    fn from(app: &LoanApplication) -> Self {
        Self {
            person_age: Some(app.age.into()),
            person_income: Some(app.income.into()),
            person_emp_exp: Some(app.employment_experience.into()),
            loan_amnt: Some(app.loan_amount.into()),
            loan_int_rate: Some(app.interest_rate.into()),
            credit_score: Some(app.credit_score.into()),
            previous_loan_defaults: Some(app.prior_defaults.to_string()),
            person_gender: Some(app.gender.to_string()),
            person_education: Some(app.education.to_string()),
            person_home_ownership: Some(app.home_ownership.to_string()),
            loan_intent: Some(app.loan_intent.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_exact() {
        assert_eq!(Education::parse("High School"), Ok(Education::HighSchool));
        assert_eq!(LoanIntent::parse("HomeImprovement"), Ok(LoanIntent::HomeImprovement));

        let err = HomeOwnership::parse("own").unwrap_err();
        assert_eq!(err.field, "person_home_ownership");
        assert_eq!(err.value, "own");
    }

    #[test]
    fn test_category_order_is_declared_order() {
        assert_eq!(Education::Doctorate.index(), 3);
        assert_eq!(HomeOwnership::Rent.index(), 1);
        assert_eq!(LoanIntent::Venture.index(), 4);
        assert_eq!(LoanIntent::ALL.len(), 5);
    }

    #[test]
    fn test_request_accepts_numbers_and_numeric_strings() {
        let json = r#"{
            "person_age": 25,
            "person_income": "50000",
            "loan_int_rate": 5.5,
            "person_education": "Master"
        }"#;
        let request: LoanApplicationRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.person_age, Some(FieldValue::Integer(25)));
        assert_eq!(request.person_income, Some(FieldValue::Text("50000".to_string())));
        assert_eq!(request.loan_int_rate, Some(FieldValue::Float(5.5)));
        assert_eq!(request.person_education.as_deref(), Some("Master"));
        assert!(request.credit_score.is_none());
    }

    #[test]
    fn test_application_wire_names() {
        let app = LoanApplication {
            age: 30,
            income: 40000,
            employment_experience: 2,
            loan_amount: 10000,
            interest_rate: 7.25,
            credit_score: 680,
            prior_defaults: PriorDefaults::No,
            gender: Gender::Male,
            education: Education::HighSchool,
            home_ownership: HomeOwnership::Rent,
            loan_intent: LoanIntent::Medical,
        };

        let value = serde_json::to_value(&app).unwrap();
        assert_eq!(value["person_education"], "High School");
        assert_eq!(value["loan_amnt"], 10000);
        assert!((app.loan_percent_income() - 0.25).abs() < 1e-12);
    }
}
