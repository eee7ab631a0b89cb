use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AnalysisType, Severity};
use super::ids::{PatientRef, RemoteRef, ReportId, UserId};

/// Reconciled outcome of one diagnosis run.
///
/// Built once by the reconciler and never mutated afterwards; the report
/// store assigns its id (see [`StoredReport`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub patient_ref: PatientRef,
    pub analysis_type: AnalysisType,
    pub file_ref: RemoteRef,
    pub diagnosis_text: String,
    pub confidence_score: f64,
    pub detected_conditions: Vec<String>,
    pub severity: Severity,
    pub recommendations: String,
    pub doctor_review_required: bool,
    pub detailed_findings: String,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// A report that the report store has accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    pub id: ReportId,
    #[serde(flatten)]
    pub report: DiagnosisReport,
}

impl DiagnosisReport {
    /// The condition the run settled on, if any.
    pub fn primary_condition(&self) -> Option<&str> {
        self.detected_conditions.first().map(String::as_str)
    }
}
