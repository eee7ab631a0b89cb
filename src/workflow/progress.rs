use serde::Serialize;

/// Phase of an in-flight diagnosis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisPhase {
    Idle,
    RegisteringPatient,
    LoadingCatalog,
    AwaitingInference,
    Reconciling,
    SavingReport,
    Complete,
    Failed,
}

impl DiagnosisPhase {
    /// Progress bar position for this phase.
    pub fn percent(&self) -> u8 {
        match self {
            Self::Idle | Self::Failed => 0,
            Self::RegisteringPatient => 10,
            Self::LoadingCatalog => 25,
            Self::AwaitingInference => 40,
            Self::Reconciling => 85,
            Self::SavingReport => 90,
            Self::Complete => 100,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::RegisteringPatient => "Creating patient record",
            Self::LoadingCatalog => "Loading disease references",
            Self::AwaitingInference => "Analyzing file",
            Self::Reconciling => "Interpreting results",
            Self::SavingReport => "Saving report",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagnosisProgress {
    pub phase: DiagnosisPhase,
    pub percent: u8,
}

impl DiagnosisProgress {
    pub fn idle() -> Self {
        Self::at(DiagnosisPhase::Idle)
    }

    pub fn at(phase: DiagnosisPhase) -> Self {
        Self {
            phase,
            percent: phase.percent(),
        }
    }
}

impl Default for DiagnosisProgress {
    fn default() -> Self {
        Self::idle()
    }
}
