//! Diagnosis pipeline: prompt → inference → reconcile.
//!
//! ```text
//! PatientContext + catalog ─▶ prompt ─▶ gateway ─▶ reconcile ─▶ DiagnosisReport
//! ```
//! The gateway is the only place untyped model output exists; everything
//! after it works on `InferenceResult`.

pub mod types;
pub mod schema;
pub mod sanitize;
pub mod prompt;
pub mod gateway;
pub mod reconcile;
pub mod summary;

pub use types::*;
pub use prompt::build_inference_request;
pub use gateway::InferenceGateway;
pub use reconcile::{ReconcileContext, ResultReconciler};
pub use summary::render_summary;

use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Inference response violates the requested schema: {0}")]
    SchemaViolation(String),

    /// The model named a disease that is not in the catalog.
    #[error("AI returned an unknown disease: {label}")]
    UnknownClassification { label: String },

    #[error("Disease catalog is empty")]
    EmptyCatalog,

    #[error("Inference service failed: {0}")]
    Inference(BackendError),

    #[error("Could not load disease catalog: {0}")]
    Catalog(BackendError),

    #[error("Could not register patient: {0}")]
    PatientRegistration(BackendError),

    #[error("Could not save diagnosis report: {0}")]
    ReportStore(BackendError),
}

impl AnalysisError {
    /// Model output that contradicts the reference data.
    pub fn is_data_integrity(&self) -> bool {
        matches!(self, Self::UnknownClassification { .. })
    }

    /// Message shown to the user. Never echoes model text.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownClassification { .. } => {
                "The AI returned an unrecognized result. Please try the analysis again.".into()
            }
            Self::EmptyCatalog => {
                "No diseases are configured for classification. Ask an administrator to add them."
                    .into()
            }
            Self::PatientRegistration(_) | Self::ReportStore(_) | Self::Catalog(_) => {
                "Could not reach the records service. Please try again.".into()
            }
            Self::SchemaViolation(_) | Self::Inference(_) => {
                "Failed to analyze the file. The AI system encountered an issue. Please check the file format or try again."
                    .into()
            }
        }
    }
}
