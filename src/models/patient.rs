use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::Gender;

/// Upper age bound accepted at intake.
pub const MAX_AGE: i32 = 120;
const MAX_NAME_LENGTH: usize = 200;
const MAX_PHONE_LENGTH: usize = 40;
const MAX_FREE_TEXT_LENGTH: usize = 4_000;

/// Patient data collected at intake.
///
/// Immutable once accepted by the workflow: the controller only ever
/// holds the validated copy returned by [`PatientContext::validated`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientContext {
    pub full_name: String,
    pub age: i32,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub symptoms: Option<String>,
}

/// Why an intake form was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Full name is required")]
    MissingFullName,

    #[error("Age must be between 1 and {MAX_AGE} (got {0})")]
    InvalidAge(i32),

    #[error("{field} exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
}

impl PatientContext {
    pub fn new(full_name: &str, age: i32) -> Self {
        Self {
            full_name: full_name.to_string(),
            age,
            gender: None,
            phone: None,
            medical_history: None,
            symptoms: None,
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_medical_history(mut self, history: &str) -> Self {
        self.medical_history = Some(history.to_string());
        self
    }

    pub fn with_symptoms(mut self, symptoms: &str) -> Self {
        self.symptoms = Some(symptoms.to_string());
        self
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    /// Validate and normalize: trims every field, turns blank optionals
    /// into `None`.
    pub fn validated(self) -> Result<Self, ValidationError> {
        let full_name = self.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(ValidationError::MissingFullName);
        }
        check_length("full_name", &full_name, MAX_NAME_LENGTH)?;

        if self.age <= 0 || self.age > MAX_AGE {
            return Err(ValidationError::InvalidAge(self.age));
        }

        let phone = non_blank(self.phone);
        let medical_history = non_blank(self.medical_history);
        let symptoms = non_blank(self.symptoms);

        if let Some(p) = &phone {
            check_length("phone", p, MAX_PHONE_LENGTH)?;
        }
        if let Some(h) = &medical_history {
            check_length("medical_history", h, MAX_FREE_TEXT_LENGTH)?;
        }
        if let Some(s) = &symptoms {
            check_length("symptoms", s, MAX_FREE_TEXT_LENGTH)?;
        }

        Ok(Self {
            full_name,
            age: self.age,
            gender: self.gender,
            phone,
            medical_history,
            symptoms,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::FieldTooLong { field, max });
    }
    Ok(())
}
