use serde::Serialize;

use crate::models::{AnalysisType, PatientContext, PatientRef, StoredReport, UploadedArtifact};

/// Where the session is. Each step carries exactly the data it owns.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum WorkflowState {
    #[default]
    Intake,
    Upload {
        patient: PatientContext,
        /// Carried back from `Confirm` when the file is changed.
        patient_ref: Option<PatientRef>,
    },
    Confirm {
        patient: PatientContext,
        artifact: UploadedArtifact,
        /// Set by the first diagnosis attempt so retries reuse the record.
        patient_ref: Option<PatientRef>,
    },
    Result {
        patient: PatientContext,
        report: StoredReport,
    },
}

impl WorkflowState {
    pub fn step(&self) -> WorkflowStep {
        match self {
            Self::Intake => WorkflowStep::Intake,
            Self::Upload { .. } => WorkflowStep::Upload,
            Self::Confirm { .. } => WorkflowStep::Confirm,
            Self::Result { .. } => WorkflowStep::Result,
        }
    }

    pub fn patient(&self) -> Option<&PatientContext> {
        match self {
            Self::Intake => None,
            Self::Upload { patient, .. }
            | Self::Confirm { patient, .. }
            | Self::Result { patient, .. } => Some(patient),
        }
    }

    pub fn artifact(&self) -> Option<&UploadedArtifact> {
        match self {
            Self::Confirm { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&StoredReport> {
        match self {
            Self::Result { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Step indicator shown above the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Intake,
    Upload,
    Confirm,
    Result,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Upload => "upload",
            Self::Confirm => "confirm",
            Self::Result => "result",
        }
    }

    /// 1-based position in the wizard.
    pub fn number(&self) -> u8 {
        match self {
            Self::Intake => 1,
            Self::Upload => 2,
            Self::Confirm => 3,
            Self::Result => 4,
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub analysis_type: AnalysisType,
    pub step: WorkflowStep,
    pub patient: Option<PatientContext>,
    pub artifact: Option<UploadedArtifact>,
    pub report: Option<StoredReport>,
    /// User-facing message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
    pub busy: bool,
}
