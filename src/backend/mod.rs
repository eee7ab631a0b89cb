//! Hosted-backend collaborators.
//!
//! The diagnosis core never talks to storage, auth or the AI provider
//! directly. Five narrow traits define the boundary:
//! - BlobStorage: file upload → remote reference
//! - InferenceService: structured LLM call → untyped JSON
//! - DiseaseCatalog: read the disease reference list
//! - PatientRegistry: create the patient record a report links to
//! - ReportStore: append a diagnosis report
//!
//! Each failure collapses to a single `BackendError`; the pipeline decides
//! what it means for the workflow.

pub mod http;
pub mod memory;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    DiagnosisReport, DiseaseReference, FileUpload, PatientContext, PatientRef, RemoteRef,
    ReportId,
};
use crate::pipeline::diagnosis::InferenceRequest;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Backend is not reachable at {0}")]
    Connection(String),

    #[error("Backend returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Request rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store the file; no partial state is exposed on failure.
    async fn upload(&self, file: &FileUpload) -> Result<RemoteRef, BackendError>;
}

#[async_trait]
pub trait InferenceService: Send + Sync {
    /// One structured-inference call. The body is whatever the provider
    /// returned; validation happens in the gateway.
    async fn invoke(&self, request: &InferenceRequest) -> Result<serde_json::Value, BackendError>;
}

#[async_trait]
pub trait DiseaseCatalog: Send + Sync {
    async fn list(&self) -> Result<Vec<DiseaseReference>, BackendError>;
}

#[async_trait]
pub trait PatientRegistry: Send + Sync {
    async fn register(&self, patient: &PatientContext) -> Result<PatientRef, BackendError>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Atomic create: succeeds with an id or fails with nothing written.
    async fn create(&self, report: &DiagnosisReport) -> Result<ReportId, BackendError>;
}

/// The full set of collaborators a workflow needs.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn BlobStorage>,
    pub inference: Arc<dyn InferenceService>,
    pub catalog: Arc<dyn DiseaseCatalog>,
    pub patients: Arc<dyn PatientRegistry>,
    pub reports: Arc<dyn ReportStore>,
}

impl Collaborators {
    /// Use one backend object for every role.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: BlobStorage + InferenceService + DiseaseCatalog + PatientRegistry + ReportStore + 'static,
    {
        Self {
            storage: backend.clone(),
            inference: backend.clone(),
            catalog: backend.clone(),
            patients: backend.clone(),
            reports: backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify traits are object-safe (can be used as `dyn Trait`)
    #[test]
    fn traits_are_object_safe() {
        fn _assert_storage(_: &dyn BlobStorage) {}
        fn _assert_inference(_: &dyn InferenceService) {}
        fn _assert_catalog(_: &dyn DiseaseCatalog) {}
        fn _assert_patients(_: &dyn PatientRegistry) {}
        fn _assert_reports(_: &dyn ReportStore) {}
    }

    #[test]
    fn collaborators_share_one_backend() {
        let backend = Arc::new(InMemoryBackend::new());
        let collaborators = Collaborators::from_backend(backend.clone());
        // Five roles plus the local handle.
        assert_eq!(Arc::strong_count(&backend), 6);
        drop(collaborators);
        assert_eq!(Arc::strong_count(&backend), 1);
    }
}
