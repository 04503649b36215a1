//! Raw field validation for incoming loan applications.
//!
//! Numeric fields are type-checked first (missing or non-numeric values),
//! then range-checked in a fixed order. The first violation wins and its
//! message is handed back to the caller unchanged.

use crate::error::ValidationError;
use crate::types::application::{FieldValue, LoanApplicationRequest};

pub const MIN_AGE: i64 = 18;
pub const MAX_AGE: i64 = 100;
pub const MIN_CREDIT_SCORE: i64 = 300;
pub const MAX_CREDIT_SCORE: i64 = 850;
pub const MIN_INTEREST_RATE: f64 = 0.0;
pub const MAX_INTEREST_RATE: f64 = 100.0;

/// Fields that passed type and range checks.
///
/// Categorical values are still raw strings here; they are resolved
/// against their closed sets by the feature encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFields<'a> {
    pub age: i64,
    pub income: i64,
    pub employment_experience: i64,
    pub loan_amount: i64,
    pub interest_rate: f64,
    pub credit_score: i64,
    pub prior_defaults: &'a str,
    pub gender: &'a str,
    pub education: &'a str,
    pub home_ownership: &'a str,
    pub loan_intent: &'a str,
}

/// Validate a raw request.
pub fn validate(request: &LoanApplicationRequest) -> Result<ValidatedFields<'_>, ValidationError> {
    let fields = ValidatedFields {
        age: integer_field("person_age", &request.person_age)?,
        income: integer_field("person_income", &request.person_income)?,
        employment_experience: integer_field("person_emp_exp", &request.person_emp_exp)?,
        loan_amount: integer_field("loan_amnt", &request.loan_amnt)?,
        interest_rate: float_field("loan_int_rate", &request.loan_int_rate)?,
        credit_score: integer_field("credit_score", &request.credit_score)?,
        prior_defaults: text_field("previous_loan_defaults", &request.previous_loan_defaults)?,
        gender: text_field("person_gender", &request.person_gender)?,
        education: text_field("person_education", &request.person_education)?,
        home_ownership: text_field("person_home_ownership", &request.person_home_ownership)?,
        loan_intent: text_field("loan_intent", &request.loan_intent)?,
    };

    check_ranges(&fields)?;
    Ok(fields)
}

fn check_ranges(fields: &ValidatedFields<'_>) -> Result<(), ValidationError> {
    if !(MIN_AGE..=MAX_AGE).contains(&fields.age) {
        return Err(ValidationError::new("Age must be between 18 and 100"));
    }
    if fields.income <= 0 {
        return Err(ValidationError::new("Income must be positive"));
    }
    if !(MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&fields.credit_score) {
        return Err(ValidationError::new("Credit score must be between 300 and 850"));
    }
    if fields.loan_amount <= 0 {
        return Err(ValidationError::new("Loan amount must be positive"));
    }
    if !(MIN_INTEREST_RATE..=MAX_INTEREST_RATE).contains(&fields.interest_rate) {
        return Err(ValidationError::new("Interest rate must be between 0 and 100%"));
    }
    if fields.employment_experience < 0 {
        return Err(ValidationError::new("Employment experience cannot be negative"));
    }
    Ok(())
}

fn missing(field: &str) -> ValidationError {
    ValidationError::new(format!("Missing required field: {field}"))
}

fn integer_field(field: &str, value: &Option<FieldValue>) -> Result<i64, ValidationError> {
    let invalid = |raw: &dyn std::fmt::Display| {
        ValidationError::new(format!(
            "Invalid value for {field}: expected a whole number, got '{raw}'"
        ))
    };

    match value.as_ref().ok_or_else(|| missing(field))? {
        FieldValue::Integer(v) => Ok(*v),
        // 42.0 is accepted, 42.5 is not
        FieldValue::Float(v) if v.is_finite() && v.fract() == 0.0 => Ok(*v as i64),
        FieldValue::Float(v) => Err(invalid(v)),
        FieldValue::Text(s) => s.trim().parse::<i64>().map_err(|_| invalid(s)),
    }
}

fn float_field(field: &str, value: &Option<FieldValue>) -> Result<f64, ValidationError> {
    let invalid = |raw: &dyn std::fmt::Display| {
        ValidationError::new(format!(
            "Invalid value for {field}: expected a number, got '{raw}'"
        ))
    };

    let parsed = match value.as_ref().ok_or_else(|| missing(field))? {
        FieldValue::Integer(v) => *v as f64,
        FieldValue::Float(v) => *v,
        FieldValue::Text(s) => s.trim().parse::<f64>().map_err(|_| invalid(s))?,
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(invalid(&parsed))
    }
}

fn text_field<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, ValidationError> {
    value.as_deref().ok_or_else(|| missing(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> LoanApplicationRequest {
        LoanApplicationRequest {
            person_age: Some(25i64.into()),
            person_income: Some(50000i64.into()),
            person_emp_exp: Some(5i64.into()),
            loan_amnt: Some(5000i64.into()),
            loan_int_rate: Some(5.0f64.into()),
            credit_score: Some(750i64.into()),
            previous_loan_defaults: Some("No".to_string()),
            person_gender: Some("Female".to_string()),
            person_education: Some("High School".to_string()),
            person_home_ownership: Some("Own".to_string()),
            loan_intent: Some("Personal".to_string()),
        }
    }

    fn message(request: &LoanApplicationRequest) -> String {
        validate(request).unwrap_err().message
    }

    #[test]
    fn test_valid_request_passes() {
        let request = valid_request();
        let fields = validate(&request).unwrap();

        assert_eq!(fields.age, 25);
        assert_eq!(fields.income, 50000);
        assert_eq!(fields.interest_rate, 5.0);
        assert_eq!(fields.education, "High School");
    }

    #[test]
    fn test_age_bounds() {
        let mut request = valid_request();
        request.person_age = Some(15i64.into());
        assert_eq!(message(&request), "Age must be between 18 and 100");

        request.person_age = Some(101i64.into());
        assert_eq!(message(&request), "Age must be between 18 and 100");

        request.person_age = Some(18i64.into());
        assert!(validate(&request).is_ok());
        request.person_age = Some(100i64.into());
        assert!(validate(&request).is_ok());
    }

    #[test]
    fn test_range_messages() {
        let mut request = valid_request();
        request.person_income = Some(0i64.into());
        assert_eq!(message(&request), "Income must be positive");

        let mut request = valid_request();
        request.credit_score = Some(299i64.into());
        assert_eq!(message(&request), "Credit score must be between 300 and 850");

        let mut request = valid_request();
        request.credit_score = Some(851i64.into());
        assert_eq!(message(&request), "Credit score must be between 300 and 850");

        let mut request = valid_request();
        request.loan_amnt = Some((-1i64).into());
        assert_eq!(message(&request), "Loan amount must be positive");

        let mut request = valid_request();
        request.loan_int_rate = Some(100.5f64.into());
        assert_eq!(message(&request), "Interest rate must be between 0 and 100%");

        let mut request = valid_request();
        request.person_emp_exp = Some((-2i64).into());
        assert_eq!(message(&request), "Employment experience cannot be negative");
    }

    #[test]
    fn test_first_violation_wins() {
        let mut request = valid_request();
        request.person_age = Some(15i64.into());
        request.person_income = Some(0i64.into());
        assert_eq!(message(&request), "Age must be between 18 and 100");
    }

    #[test]
    fn test_numeric_strings_and_whole_floats() {
        let mut request = valid_request();
        request.person_age = Some("42".into());
        request.credit_score = Some(700.0f64.into());
        request.loan_int_rate = Some(" 12.5 ".into());

        let fields = validate(&request).unwrap();
        assert_eq!(fields.age, 42);
        assert_eq!(fields.credit_score, 700);
        assert_eq!(fields.interest_rate, 12.5);
    }

    #[test]
    fn test_type_errors() {
        let mut request = valid_request();
        request.person_age = Some("abc".into());
        assert_eq!(
            message(&request),
            "Invalid value for person_age: expected a whole number, got 'abc'"
        );

        let mut request = valid_request();
        request.person_income = Some(1234.5f64.into());
        assert!(message(&request).starts_with("Invalid value for person_income"));

        let mut request = valid_request();
        request.loan_int_rate = Some("NaN".into());
        assert!(message(&request).starts_with("Invalid value for loan_int_rate"));
    }

    #[test]
    fn test_missing_fields() {
        let mut request = valid_request();
        request.credit_score = None;
        assert_eq!(message(&request), "Missing required field: credit_score");

        let mut request = valid_request();
        request.loan_intent = None;
        assert_eq!(message(&request), "Missing required field: loan_intent");
    }
}
