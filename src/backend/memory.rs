//! In-process backend.
//!
//! Implements every collaborator trait against plain in-memory state.
//! Inference responses are scripted with `push_inference_*`; each call
//! consumes one. Used by tests and offline demos.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{BackendError, BlobStorage, DiseaseCatalog, InferenceService, PatientRegistry, ReportStore};
use crate::models::{
    DiagnosisReport, DiseaseReference, FileUpload, PatientContext, PatientRef, RemoteRef,
    ReportId, StoredReport,
};
use crate::pipeline::diagnosis::InferenceRequest;

#[derive(Default)]
struct MemoryState {
    blobs: HashMap<RemoteRef, Vec<u8>>,
    catalog: Vec<DiseaseReference>,
    patients: Vec<(PatientRef, PatientContext)>,
    reports: Vec<StoredReport>,
    inference_script: VecDeque<Result<Value, BackendError>>,
    inference_requests: Vec<InferenceRequest>,
    fail_uploads: bool,
    fail_catalog: bool,
    fail_reports: bool,
}

#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(self, catalog: Vec<DiseaseReference>) -> Self {
        self.state().catalog = catalog;
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not take the backend down with it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Scripting ───────────────────────────────────────────

    pub fn push_inference_response(&self, response: Value) {
        self.state().inference_script.push_back(Ok(response));
    }

    pub fn push_inference_error(&self, error: BackendError) {
        self.state().inference_script.push_back(Err(error));
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.state().fail_uploads = fail;
    }

    pub fn fail_catalog(&self, fail: bool) {
        self.state().fail_catalog = fail;
    }

    pub fn fail_reports(&self, fail: bool) {
        self.state().fail_reports = fail;
    }

    // ── Inspection ──────────────────────────────────────────

    pub fn stored_blob(&self, remote_ref: &RemoteRef) -> Option<Vec<u8>> {
        self.state().blobs.get(remote_ref).cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.state().blobs.len()
    }

    pub fn inference_calls(&self) -> usize {
        self.state().inference_requests.len()
    }

    pub fn last_inference_request(&self) -> Option<InferenceRequest> {
        self.state().inference_requests.last().cloned()
    }

    pub fn patients(&self) -> Vec<(PatientRef, PatientContext)> {
        self.state().patients.clone()
    }

    pub fn reports(&self) -> Vec<StoredReport> {
        self.state().reports.clone()
    }
}

#[async_trait]
impl BlobStorage for InMemoryBackend {
    async fn upload(&self, file: &FileUpload) -> Result<RemoteRef, BackendError> {
        let mut state = self.state();
        if state.fail_uploads {
            return Err(BackendError::Rejected("upload refused".into()));
        }
        let remote_ref = RemoteRef::new(format!("memory://blobs/{}/{}", Uuid::new_v4(), file.file_name));
        state.blobs.insert(remote_ref.clone(), file.bytes.clone());
        Ok(remote_ref)
    }
}

#[async_trait]
impl InferenceService for InMemoryBackend {
    async fn invoke(&self, request: &InferenceRequest) -> Result<Value, BackendError> {
        let mut state = self.state();
        state.inference_requests.push(request.clone());
        state
            .inference_script
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Rejected("no scripted inference response".into())))
    }
}

#[async_trait]
impl DiseaseCatalog for InMemoryBackend {
    async fn list(&self) -> Result<Vec<DiseaseReference>, BackendError> {
        let state = self.state();
        if state.fail_catalog {
            return Err(BackendError::Rejected("catalog unavailable".into()));
        }
        Ok(state.catalog.clone())
    }
}

#[async_trait]
impl PatientRegistry for InMemoryBackend {
    async fn register(&self, patient: &PatientContext) -> Result<PatientRef, BackendError> {
        let mut state = self.state();
        let patient_ref = PatientRef::new(format!("patient-{}", state.patients.len() + 1));
        state.patients.push((patient_ref.clone(), patient.clone()));
        Ok(patient_ref)
    }
}

#[async_trait]
impl ReportStore for InMemoryBackend {
    async fn create(&self, report: &DiagnosisReport) -> Result<ReportId, BackendError> {
        let mut state = self.state();
        if state.fail_reports {
            return Err(BackendError::Rejected("report store unavailable".into()));
        }
        let id = ReportId::new(format!("report-{}", Uuid::new_v4()));
        state.reports.push(StoredReport {
            id: id.clone(),
            report: report.clone(),
        });
        Ok(id)
    }
}
