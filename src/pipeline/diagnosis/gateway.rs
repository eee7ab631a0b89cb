use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::schema;
use super::types::{InferenceRequest, InferenceResult};
use super::AnalysisError;
use crate::backend::{BackendError, InferenceService};
use crate::models::{AnalysisType, Severity};

/// Calls the inference collaborator and turns its untyped JSON into an
/// [`InferenceResult`].
///
/// Default is one attempt. With `max_attempts > 1` only transport failures
/// are retried; a schema violation is final for the run.
pub struct InferenceGateway {
    service: Arc<dyn InferenceService>,
    max_attempts: u32,
}

impl InferenceGateway {
    pub fn new(service: Arc<dyn InferenceService>) -> Self {
        Self {
            service,
            max_attempts: 1,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub async fn invoke(&self, request: &InferenceRequest) -> Result<InferenceResult, AnalysisError> {
        let analysis_type = request.analysis_type;
        let raw = self.call_with_retry(request).await?;

        schema::validate(&raw, &request.output_schema).map_err(|detail| {
            tracing::warn!(%analysis_type, detail = %detail, "Inference response failed schema validation");
            AnalysisError::SchemaViolation(detail)
        })?;

        match analysis_type {
            AnalysisType::FundusImage => to_classification(raw),
            AnalysisType::ErgReport => to_interpretation(raw),
        }
    }

    async fn call_with_retry(&self, request: &InferenceRequest) -> Result<Value, AnalysisError> {
        let mut attempt = 1;
        loop {
            match self.service.invoke(request).await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) && attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Inference call failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(AnalysisError::Inference(e)),
            }
        }
    }
}

/// Transport-level failures. A rejected request or an auth problem will
/// not get better on a second try.
fn is_retryable(e: &BackendError) -> bool {
    match e {
        BackendError::Connection(_) | BackendError::HttpClient(_) => true,
        BackendError::Status { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

#[derive(Deserialize)]
struct RawClassification {
    disease_name: String,
    confidence_score: f64,
    justification: String,
}

#[derive(Deserialize)]
struct RawInterpretation {
    primary_diagnosis: String,
    #[serde(default)]
    detected_conditions: Option<Vec<String>>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    confidence_score: Option<f64>,
    #[serde(default)]
    recommendations: Option<String>,
    #[serde(default)]
    follow_up_required: Option<bool>,
    #[serde(default)]
    detailed_findings: Option<String>,
}

fn to_classification(raw: Value) -> Result<InferenceResult, AnalysisError> {
    let parsed: RawClassification = serde_json::from_value(raw)
        .map_err(|e| AnalysisError::SchemaViolation(e.to_string()))?;

    let primary_label = parsed.disease_name.trim().to_string();
    if primary_label.is_empty() {
        return Err(AnalysisError::SchemaViolation("disease_name is empty".into()));
    }
    if !parsed.confidence_score.is_finite() {
        return Err(AnalysisError::SchemaViolation(
            "confidence_score is not a finite number".into(),
        ));
    }

    Ok(InferenceResult::Classification {
        primary_label,
        confidence_score: parsed.confidence_score,
        justification: parsed.justification.trim().to_string(),
    })
}

fn to_interpretation(raw: Value) -> Result<InferenceResult, AnalysisError> {
    let parsed: RawInterpretation = serde_json::from_value(raw)
        .map_err(|e| AnalysisError::SchemaViolation(e.to_string()))?;

    let primary_diagnosis = parsed.primary_diagnosis.trim().to_string();
    if primary_diagnosis.is_empty() {
        return Err(AnalysisError::SchemaViolation(
            "primary_diagnosis is empty".into(),
        ));
    }

    let severity = match parsed.severity.as_deref() {
        None => None,
        Some(raw) => {
            let severity = Severity::parse_lenient(raw);
            if severity.is_none() {
                tracing::warn!(value = raw, "Unrecognized ERG severity, treating as absent");
            }
            severity
        }
    };

    Ok(InferenceResult::Interpretation {
        primary_diagnosis,
        detected_conditions: parsed
            .detected_conditions
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        severity,
        confidence_score: parsed.confidence_score.filter(|c| c.is_finite()),
        recommendations: non_blank(parsed.recommendations),
        detailed_findings: non_blank(parsed.detailed_findings),
        follow_up_required: parsed.follow_up_required,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::models::{PatientContext, RemoteRef};
    use crate::pipeline::diagnosis::build_inference_request;
    use serde_json::json;

    fn fundus_request() -> InferenceRequest {
        build_inference_request(
            &PatientContext::new("Jane Doe", 54),
            AnalysisType::FundusImage,
            &["Glaucoma".to_string(), "Normal Fundus".to_string()],
            &RemoteRef::new("blob://abc"),
        )
    }

    fn erg_request() -> InferenceRequest {
        build_inference_request(
            &PatientContext::new("Jane Doe", 54),
            AnalysisType::ErgReport,
            &[],
            &RemoteRef::new("blob://erg"),
        )
    }

    #[tokio::test]
    async fn converts_fundus_response() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.push_inference_response(json!({
            "disease_name": " Glaucoma ",
            "confidence_score": 91.5,
            "justification": "Enlarged optic cup."
        }));
        let gateway = InferenceGateway::new(backend.clone());

        let result = gateway.invoke(&fundus_request()).await.unwrap();
        assert_eq!(
            result,
            InferenceResult::Classification {
                primary_label: "Glaucoma".into(),
                confidence_score: 91.5,
                justification: "Enlarged optic cup.".into(),
            }
        );
        assert_eq!(backend.inference_calls(), 1);
    }

    #[tokio::test]
    async fn missing_field_is_schema_violation() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.push_inference_response(json!({ "disease_name": "Glaucoma" }));
        let gateway = InferenceGateway::new(backend);

        let err = gateway.invoke(&fundus_request()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn empty_label_is_schema_violation() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.push_inference_response(json!({
            "disease_name": "  ",
            "confidence_score": 80,
            "justification": "x"
        }));
        let gateway = InferenceGateway::new(backend);

        let err = gateway.invoke(&fundus_request()).await.unwrap_err();
        assert_eq!(err, AnalysisError::SchemaViolation("disease_name is empty".into()));
    }

    #[tokio::test]
    async fn converts_erg_response_with_gaps() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.push_inference_response(json!({
            "primary_diagnosis": "Rod-cone dystrophy",
            "detected_conditions": ["Reduced b-wave amplitude", " "],
            "severity": "Severe",
            "recommendations": ""
        }));
        let gateway = InferenceGateway::new(backend);

        match gateway.invoke(&erg_request()).await.unwrap() {
            InferenceResult::Interpretation {
                primary_diagnosis,
                detected_conditions,
                severity,
                confidence_score,
                recommendations,
                ..
            } => {
                assert_eq!(primary_diagnosis, "Rod-cone dystrophy");
                assert_eq!(detected_conditions, vec!["Reduced b-wave amplitude".to_string()]);
                assert_eq!(severity, Some(Severity::Severe));
                assert!(confidence_score.is_none());
                assert!(recommendations.is_none());
            }
            other => panic!("expected interpretation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unrecognized_erg_severity_becomes_absent() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.push_inference_response(json!({
            "primary_diagnosis": "Macular dysfunction",
            "severity": "borderline"
        }));
        let gateway = InferenceGateway::new(backend);

        match gateway.invoke(&erg_request()).await.unwrap() {
            InferenceResult::Interpretation { severity, .. } => assert!(severity.is_none()),
            other => panic!("expected interpretation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_attempt_by_default() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.push_inference_error(BackendError::Connection("http://ai".into()));
        backend.push_inference_response(json!({
            "disease_name": "Glaucoma",
            "confidence_score": 90,
            "justification": "x"
        }));
        let gateway = InferenceGateway::new(backend.clone());

        let err = gateway.invoke(&fundus_request()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Inference(BackendError::Connection(_))));
        assert_eq!(backend.inference_calls(), 1);
    }

    #[tokio::test]
    async fn bounded_retry_recovers_from_transport_failure() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.push_inference_error(BackendError::Status {
            status: 503,
            body: "busy".into(),
        });
        backend.push_inference_response(json!({
            "disease_name": "Glaucoma",
            "confidence_score": 90,
            "justification": "x"
        }));
        let gateway = InferenceGateway::new(backend.clone()).with_max_attempts(2);

        assert!(gateway.invoke(&fundus_request()).await.is_ok());
        assert_eq!(backend.inference_calls(), 2);
    }

    #[tokio::test]
    async fn schema_violation_is_not_retried() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.push_inference_response(json!({ "unexpected": true }));
        backend.push_inference_response(json!({
            "disease_name": "Glaucoma",
            "confidence_score": 90,
            "justification": "x"
        }));
        let gateway = InferenceGateway::new(backend.clone()).with_max_attempts(3);

        assert!(gateway.invoke(&fundus_request()).await.is_err());
        assert_eq!(backend.inference_calls(), 1);
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!is_retryable(&BackendError::Status { status: 400, body: String::new() }));
        assert!(!is_retryable(&BackendError::NotAuthenticated));
        assert!(is_retryable(&BackendError::Status { status: 429, body: String::new() }));
    }
}
