//! Diagnosis wizard: Intake → Upload → Confirm → Result.
//!
//! One `DiagnosisWorkflow` per user session. It owns the transient
//! session data, runs ingestion and the diagnosis pipeline in order, and
//! exposes a snapshot plus progress to whatever renders the wizard.

pub mod controller;
pub mod progress;
pub mod state;

pub use controller::DiagnosisWorkflow;
pub use progress::{DiagnosisPhase, DiagnosisProgress};
pub use state::{WorkflowSnapshot, WorkflowState, WorkflowStep};

use thiserror::Error;

use crate::models::ValidationError;
use crate::pipeline::diagnosis::AnalysisError;
use crate::pipeline::ingestion::UploadError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Invalid patient details: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Cannot {operation} at the {step} step")]
    InvalidTransition {
        operation: &'static str,
        step: WorkflowStep,
    },

    #[error("Another operation is already in progress")]
    Busy,

    #[error("Session was reset while the operation was running")]
    Superseded,
}

impl WorkflowError {
    /// Message for the error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => match e {
                ValidationError::MissingFullName | ValidationError::InvalidAge(_) => {
                    "Please fill in required fields (Name and Age).".into()
                }
                ValidationError::FieldTooLong { .. } => e.to_string(),
            },
            Self::Upload(e) => e.user_message(),
            Self::Analysis(e) => e.user_message(),
            Self::InvalidTransition { .. } => {
                "That action is not available at this step.".into()
            }
            Self::Busy => "Please wait for the current operation to finish.".into(),
            Self::Superseded => "The operation was cancelled.".into(),
        }
    }
}
