use serde::{Deserialize, Serialize};

use crate::models::{AnalysisType, RemoteRef, Severity};

/// One structured-inference call, built fresh per diagnosis attempt.
///
/// Serializes to the backend's `InvokeLLM` payload. The analysis type
/// stays local and selects how the response is read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    #[serde(skip)]
    pub analysis_type: AnalysisType,
    #[serde(rename = "prompt")]
    pub prompt_text: String,
    #[serde(rename = "file_urls")]
    pub file_refs: Vec<RemoteRef>,
    #[serde(rename = "response_json_schema")]
    pub output_schema: serde_json::Value,
}

/// Validated, typed inference output. One variant per analysis type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InferenceResult {
    /// Fundus path: closed-set classification.
    Classification {
        primary_label: String,
        confidence_score: f64,
        justification: String,
    },
    /// ERG path: open interpretation, trusted more directly.
    Interpretation {
        primary_diagnosis: String,
        detected_conditions: Vec<String>,
        severity: Option<Severity>,
        confidence_score: Option<f64>,
        recommendations: Option<String>,
        detailed_findings: Option<String>,
        follow_up_required: Option<bool>,
    },
}

impl InferenceResult {
    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            Self::Classification { .. } => AnalysisType::FundusImage,
            Self::Interpretation { .. } => AnalysisType::ErgReport,
        }
    }
}
