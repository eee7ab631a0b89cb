use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use zeroize::Zeroizing;

use super::{BackendError, BlobStorage, DiseaseCatalog, InferenceService, PatientRegistry, ReportStore};
use crate::config::WorkflowConfig;
use crate::models::{
    AnalysisType, DiagnosisReport, DiseaseReference, FileUpload, PatientContext, PatientRef,
    RemoteRef, ReportId,
};
use crate::pipeline::diagnosis::InferenceRequest;
use crate::session::SessionContext;

/// REST client for the hosted backend.
///
/// Every call carries the signed-in user's bearer token, read from the
/// shared [`SessionContext`] at call time.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    session: Arc<SessionContext>,
    timeout_secs: u64,
}

/// Response body from the upload endpoint
#[derive(Deserialize)]
struct UploadResponse {
    file_url: String,
}

/// Response body from entity create endpoints
#[derive(Deserialize)]
struct CreatedEntity {
    id: String,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        session: Arc<SessionContext>,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BackendError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            session,
            timeout_secs,
        })
    }

    pub fn from_config(
        config: &WorkflowConfig,
        session: Arc<SessionContext>,
    ) -> Result<Self, BackendError> {
        Self::new(&config.backend_url, config.request_timeout_secs, session)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn bearer(&self) -> Result<Zeroizing<String>, BackendError> {
        self.session
            .access_token()
            .map_err(|_| BackendError::NotAuthenticated)
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_connect() {
            BackendError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            BackendError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            BackendError::HttpClient(e.to_string())
        }
    }

    /// Send, check status, decode JSON.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let token = self.bearer()?;
        let response = request
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::ResponseParsing(e.to_string()))
    }
}

/// Backend record for a diagnosis report. The file reference goes under
/// a per-analysis key.
fn report_record(report: &DiagnosisReport) -> Value {
    let file_key = match report.analysis_type {
        AnalysisType::FundusImage => "fundus_image_url",
        AnalysisType::ErgReport => "erg_report_url",
    };
    let mut record = json!({
        "patient_id": report.patient_ref,
        "analysis_type": report.analysis_type,
        "diagnosis": report.diagnosis_text,
        "confidence_score": report.confidence_score,
        "detected_conditions": report.detected_conditions,
        "severity": report.severity,
        "recommendations": report.recommendations,
        "doctor_review_required": report.doctor_review_required,
        "detailed_findings": report.detailed_findings,
        "created_by": report.created_by,
        "created_at": report.created_at,
    });
    record[file_key] = json!(report.file_ref);
    record
}

#[async_trait]
impl BlobStorage for HttpBackend {
    async fn upload(&self, file: &FileUpload) -> Result<RemoteRef, BackendError> {
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let request = self
            .client
            .post(self.url("integrations/upload-file"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-file-name", file.file_name.as_str())
            .body(file.bytes.clone());

        let parsed: UploadResponse = self.send(request).await?;
        Ok(RemoteRef::new(parsed.file_url))
    }
}

#[async_trait]
impl InferenceService for HttpBackend {
    async fn invoke(&self, request: &InferenceRequest) -> Result<Value, BackendError> {
        let http = self
            .client
            .post(self.url("integrations/invoke-llm"))
            .json(request);
        self.send(http).await
    }
}

#[async_trait]
impl DiseaseCatalog for HttpBackend {
    async fn list(&self) -> Result<Vec<DiseaseReference>, BackendError> {
        let request = self.client.get(self.url("entities/DiseaseInfo"));
        self.send(request).await
    }
}

#[async_trait]
impl PatientRegistry for HttpBackend {
    async fn register(&self, patient: &PatientContext) -> Result<PatientRef, BackendError> {
        let request = self.client.post(self.url("entities/Patient")).json(patient);
        let created: CreatedEntity = self.send(request).await?;
        Ok(PatientRef::new(created.id))
    }
}

#[async_trait]
impl ReportStore for HttpBackend {
    async fn create(&self, report: &DiagnosisReport) -> Result<ReportId, BackendError> {
        let request = self
            .client
            .post(self.url("entities/DiagnosisReport"))
            .json(&report_record(report));
        let created: CreatedEntity = self.send(request).await?;
        Ok(ReportId::new(created.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Severity, UserId, UserIdentity, UserRole};
    use chrono::Utc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn signed_in() -> Arc<SessionContext> {
        let session = Arc::new(SessionContext::new());
        session
            .login(
                UserIdentity {
                    id: UserId::new("u-1"),
                    email: "dr@example.org".into(),
                    full_name: None,
                    role: UserRole::User,
                },
                "secret-token",
            )
            .unwrap();
        session
    }

    fn report(analysis_type: AnalysisType) -> DiagnosisReport {
        DiagnosisReport {
            patient_ref: PatientRef::new("p-9"),
            analysis_type,
            file_ref: RemoteRef::new("https://files/abc.png"),
            diagnosis_text: "D".into(),
            confidence_score: 88.0,
            detected_conditions: vec!["Glaucoma".into()],
            severity: Severity::Severe,
            recommendations: "P".into(),
            doctor_review_required: true,
            detailed_findings: "J".into(),
            created_by: Some(UserId::new("u-1")),
            created_at: Utc::now(),
        }
    }

    /// Serve exactly one HTTP response; the task yields the raw request.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= pos + 4 + len {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn constructor_trims_trailing_slash() {
        let backend = HttpBackend::new("http://localhost:8080/api/", 30, signed_in()).unwrap();
        assert_eq!(backend.base_url, "http://localhost:8080/api");
        assert_eq!(backend.url("/entities/Patient"), "http://localhost:8080/api/entities/Patient");
    }

    #[test]
    fn fundus_record_uses_image_key() {
        let record = report_record(&report(AnalysisType::FundusImage));
        assert_eq!(record["fundus_image_url"], "https://files/abc.png");
        assert!(record.get("erg_report_url").is_none());
        assert_eq!(record["patient_id"], "p-9");
        assert_eq!(record["diagnosis"], "D");
        assert_eq!(record["severity"], "severe");
        assert_eq!(record["analysis_type"], "fundus_image");
    }

    #[test]
    fn erg_record_uses_report_key() {
        let record = report_record(&report(AnalysisType::ErgReport));
        assert_eq!(record["erg_report_url"], "https://files/abc.png");
        assert!(record.get("fundus_image_url").is_none());
    }

    #[tokio::test]
    async fn lists_catalog_with_bearer_token() {
        let (url, server) = serve_once(
            "200 OK",
            r#"[{"id":"d1","name":"Glaucoma","description":"G","precaution":"P"}]"#,
        )
        .await;
        let backend = HttpBackend::new(&url, 5, signed_in()).unwrap();

        let catalog = backend.list().await.unwrap();
        assert_eq!(catalog, vec![DiseaseReference::new("Glaucoma", "G", "P")]);

        let raw_request = server.await.unwrap();
        assert!(raw_request.starts_with("GET /entities/DiseaseInfo"));
        assert!(raw_request
            .to_lowercase()
            .contains("authorization: bearer secret-token"));
    }

    #[tokio::test]
    async fn creates_report_and_returns_id() {
        let (url, server) = serve_once("201 Created", r#"{"id":"r-77"}"#).await;
        let backend = HttpBackend::new(&url, 5, signed_in()).unwrap();

        let id = backend.create(&report(AnalysisType::FundusImage)).await.unwrap();
        assert_eq!(id, ReportId::new("r-77"));

        let raw_request = server.await.unwrap();
        assert!(raw_request.starts_with("POST /entities/DiagnosisReport"));
        assert!(raw_request.contains("\"fundus_image_url\":\"https://files/abc.png\""));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let backend = HttpBackend::new(&url, 5, signed_in()).unwrap();

        let err = backend
            .register(&PatientContext::new("Jane Doe", 54))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::Status {
                status: 500,
                body: r#"{"error":"boom"}"#.into()
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn requires_signed_in_user() {
        let backend =
            HttpBackend::new("http://127.0.0.1:9", 5, Arc::new(SessionContext::new())).unwrap();
        let err = backend.list().await.unwrap_err();
        assert_eq!(err, BackendError::NotAuthenticated);
    }

    #[tokio::test]
    async fn unreachable_backend_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = HttpBackend::new(&format!("http://{addr}"), 5, signed_in()).unwrap();
        let err = backend.list().await.unwrap_err();
        assert!(matches!(err, BackendError::Connection(_)), "{err:?}");
    }
}
