//! Feature encoding for loan classifier inference.
//!
//! Turns a validated application into the exact column layout the
//! classifier was trained on: eight numeric columns, two binary flags,
//! then one-hot blocks for education, home ownership, and loan intent.

use crate::error::UnknownCategoryError;
use crate::types::application::{
    Category, Education, Gender, HomeOwnership, LoanApplication, LoanIntent, PriorDefaults,
};
use crate::validator::ValidatedFields;

/// Number of columns the encoder produces.
pub const FEATURE_COUNT: usize = 10
    + Education::ALL.len()
    + HomeOwnership::ALL.len()
    + LoanIntent::ALL.len();

/// Credit-history length sent to the model.
///
/// Fixed stub: the request carries no credit-history field, so every
/// application is encoded with the same value.
pub const CREDIT_HISTORY_LENGTH_STUB: f32 = 3.0;

/// Ordered feature vector. Its length is fixed by the type.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatureVector {
    values: [f32; FEATURE_COUNT],
}

impl EncodedFeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Encoder that transforms applications into model input features.
///
/// Matches the preprocessing done when the model was trained.
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Create a new feature encoder.
    pub fn new() -> Self {
        Self
    }

    /// Resolve the categorical fields of a validated request.
    ///
    /// Fields are resolved in request order; the first unknown value fails.
    pub fn resolve(&self, fields: &ValidatedFields<'_>) -> Result<LoanApplication, UnknownCategoryError> {
        Ok(LoanApplication {
            age: fields.age,
            income: fields.income,
            employment_experience: fields.employment_experience,
            loan_amount: fields.loan_amount,
            interest_rate: fields.interest_rate,
            credit_score: fields.credit_score,
            prior_defaults: PriorDefaults::parse(fields.prior_defaults)?,
            gender: Gender::parse(fields.gender)?,
            education: Education::parse(fields.education)?,
            home_ownership: HomeOwnership::parse(fields.home_ownership)?,
            loan_intent: LoanIntent::parse(fields.loan_intent)?,
        })
    }

    /// Encode an application into the model's column order.
    pub fn encode(&self, app: &LoanApplication) -> EncodedFeatureVector {
        let mut values = [0.0_f32; FEATURE_COUNT];

        // Numeric columns (8)
        values[0] = app.age as f32;
        values[1] = app.income as f32;
        values[2] = app.employment_experience as f32;
        values[3] = app.loan_amount as f32;
        values[4] = app.interest_rate as f32;
        values[5] = app.loan_percent_income() as f32;
        values[6] = CREDIT_HISTORY_LENGTH_STUB;
        values[7] = app.credit_score as f32;

        // Binary flags (2); the training data maps "No" defaults to 1
        values[8] = if app.prior_defaults == PriorDefaults::No { 1.0 } else { 0.0 };
        values[9] = if app.gender == Gender::Male { 1.0 } else { 0.0 };

        // One-hot blocks (4 + 3 + 5)
        let mut offset = 10;
        offset = one_hot(&mut values, offset, app.education);
        offset = one_hot(&mut values, offset, app.home_ownership);
        one_hot(&mut values, offset, app.loan_intent);

        EncodedFeatureVector { values }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in column order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            "person_age",
            "person_income",
            "person_emp_exp",
            "loan_amnt",
            "loan_int_rate",
            "loan_percent_income",
            "cb_person_cred_hist_length",
            "credit_score",
            "previous_loan_defaults_on_file",
            "person_gender_male",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        names.extend(one_hot_names::<Education>());
        names.extend(one_hot_names::<HomeOwnership>());
        names.extend(one_hot_names::<LoanIntent>());
        names
    }
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a one-hot block starting at `offset`; returns the next free offset.
fn one_hot<C: Category>(values: &mut [f32], offset: usize, value: C) -> usize {
    values[offset + value.index()] = 1.0;
    offset + C::ALL.len()
}

fn one_hot_names<C: Category>() -> impl Iterator<Item = String> {
    C::ALL
        .iter()
        .map(|c| format!("{}_{}", C::FIELD, c.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_application() -> LoanApplication {
        LoanApplication {
            age: 25,
            income: 50000,
            employment_experience: 5,
            loan_amount: 5000,
            interest_rate: 5.0,
            credit_score: 750,
            prior_defaults: PriorDefaults::No,
            gender: Gender::Female,
            education: Education::HighSchool,
            home_ownership: HomeOwnership::Own,
            loan_intent: LoanIntent::Personal,
        }
    }

    #[test]
    fn test_feature_count() {
        let encoder = FeatureEncoder::new();
        assert_eq!(encoder.feature_count(), 22);
        assert_eq!(encoder.feature_names().len(), 22);
        assert_eq!(encoder.encode(&reference_application()).len(), 22);
    }

    #[test]
    fn test_reference_encoding() {
        let encoder = FeatureEncoder::new();
        let features = encoder.encode(&reference_application());

        let expected: [f32; 22] = [
            25.0, 50000.0, 5.0, 5000.0, 5.0, 0.1, 3.0, 750.0, // numeric
            1.0, 0.0, // no defaults, female
            1.0, 0.0, 0.0, 0.0, // High School
            1.0, 0.0, 0.0, // Own
            1.0, 0.0, 0.0, 0.0, 0.0, // Personal
        ];
        assert_eq!(features.as_slice(), &expected);
    }

    #[test]
    fn test_one_hot_blocks() {
        let encoder = FeatureEncoder::new();
        let mut app = reference_application();
        app.prior_defaults = PriorDefaults::Yes;
        app.gender = Gender::Male;
        app.education = Education::Doctorate;
        app.home_ownership = HomeOwnership::Other;
        app.loan_intent = LoanIntent::Venture;

        let features = encoder.encode(&app);
        let values = features.as_slice();

        assert_eq!(values[8], 0.0);
        assert_eq!(values[9], 1.0);
        assert_eq!(&values[10..14], &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(&values[14..17], &[0.0, 0.0, 1.0]);
        assert_eq!(&values[17..22], &[0.0, 0.0, 0.0, 0.0, 1.0]);
        // exactly one hot per block
        assert_eq!(values[10..].iter().filter(|&&v| v == 1.0).count(), 3);
    }

    #[test]
    fn test_resolve_unknown_category() {
        let encoder = FeatureEncoder::new();
        let fields = ValidatedFields {
            age: 30,
            income: 60000,
            employment_experience: 3,
            loan_amount: 10000,
            interest_rate: 9.5,
            credit_score: 710,
            prior_defaults: "No",
            gender: "Female",
            education: "Kindergarten",
            home_ownership: "Own",
            loan_intent: "Personal",
        };

        let err = encoder.resolve(&fields).unwrap_err();
        assert_eq!(err.field, "person_education");
        assert_eq!(err.value, "Kindergarten");
    }

    #[test]
    fn test_feature_names_order() {
        let names = FeatureEncoder::new().feature_names();
        assert_eq!(names[5], "loan_percent_income");
        assert_eq!(names[6], "cb_person_cred_hist_length");
        assert_eq!(names[10], "person_education_High School");
        assert_eq!(names[21], "loan_intent_Venture");
    }
}
