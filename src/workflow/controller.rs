//! Session controller for the diagnosis wizard.
//!
//! All methods take `&self`; session data sits behind a `std::sync::Mutex`
//! that is never held across an await. Two guards keep async work honest:
//!
//! - **In-flight slot**: at most one network operation per session. A
//!   second caller gets `Busy` instead of queueing.
//! - **Generation**: `reset()` bumps a counter. An operation remembers the
//!   generation it started in and commits only if it is unchanged, so a
//!   late response can never write into a newer session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::Instrument;

use super::progress::{DiagnosisPhase, DiagnosisProgress};
use super::state::{WorkflowSnapshot, WorkflowState, WorkflowStep};
use super::WorkflowError;
use crate::backend::Collaborators;
use crate::config::WorkflowConfig;
use crate::models::{
    AnalysisType, FileUpload, PatientContext, PatientRef, StoredReport, UploadedArtifact,
};
use crate::pipeline::diagnosis::{
    build_inference_request, render_summary, AnalysisError, InferenceGateway, ReconcileContext,
    ResultReconciler,
};
use crate::pipeline::ingestion::FileIngestion;
use crate::session::SessionContext;

// ═══════════════════════════════════════════════════════════
// DiagnosisWorkflow
// ═══════════════════════════════════════════════════════════

pub struct DiagnosisWorkflow {
    inner: Mutex<Inner>,
    /// Bumped by `reset()` while `inner` is locked.
    generation: AtomicU64,
    progress: watch::Sender<DiagnosisProgress>,
    collaborators: Collaborators,
    session: Arc<SessionContext>,
    ingestion: FileIngestion,
    gateway: InferenceGateway,
    reconciler: ResultReconciler,
}

struct Inner {
    analysis_type: AnalysisType,
    state: WorkflowState,
    last_error: Option<String>,
    /// Generation of the running network operation, if any.
    in_flight: Option<u64>,
}

impl DiagnosisWorkflow {
    pub fn new(
        analysis_type: AnalysisType,
        collaborators: Collaborators,
        session: Arc<SessionContext>,
        config: &WorkflowConfig,
    ) -> Self {
        let ingestion = FileIngestion::new(collaborators.storage.clone(), config.max_upload_bytes);
        let gateway = InferenceGateway::new(collaborators.inference.clone())
            .with_max_attempts(config.max_inference_attempts);
        let (progress, _) = watch::channel(DiagnosisProgress::idle());

        Self {
            inner: Mutex::new(Inner {
                analysis_type,
                state: WorkflowState::Intake,
                last_error: None,
                in_flight: None,
            }),
            generation: AtomicU64::new(0),
            progress,
            collaborators,
            session,
            ingestion,
            gateway,
            reconciler: ResultReconciler::from_config(config),
        }
    }

    // ── Transitions ─────────────────────────────────────────

    /// Switch between fundus and ERG analysis before a file is uploaded.
    pub fn set_analysis_type(&self, analysis_type: AnalysisType) -> Result<(), WorkflowError> {
        let mut inner = self.lock();
        let step = inner.state.step();
        let result = if inner.in_flight.is_some() {
            Err(WorkflowError::Busy)
        } else if !matches!(step, WorkflowStep::Intake | WorkflowStep::Upload) {
            Err(invalid("change the analysis type", step))
        } else {
            inner.analysis_type = analysis_type;
            Ok(())
        };
        record(&mut inner, &result);
        result
    }

    /// Intake → Upload. The patient is validated and normalized first.
    pub fn submit_patient(&self, patient: PatientContext) -> Result<(), WorkflowError> {
        let mut inner = self.lock();
        let step = inner.state.step();
        let result = if step != WorkflowStep::Intake {
            Err(invalid("submit patient details", step))
        } else {
            match patient.validated() {
                Ok(patient) => {
                    tracing::info!(age = patient.age, "Patient details accepted");
                    inner.state = WorkflowState::Upload {
                        patient,
                        patient_ref: None,
                    };
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        };
        record(&mut inner, &result);
        result
    }

    /// Upload → Confirm. On failure the session stays at Upload.
    pub async fn submit_file(&self, file: FileUpload) -> Result<UploadedArtifact, WorkflowError> {
        let (guard, analysis_type, _) = self.begin("upload a file", WorkflowStep::Upload)?;

        let result = self
            .ingestion
            .upload(file, analysis_type)
            .await
            .map_err(WorkflowError::from);

        let mut inner = self.lock();
        if self.is_stale(guard.generation) {
            tracing::warn!("Session reset during upload, discarding file reference");
            return Err(WorkflowError::Superseded);
        }
        let result = result.map(|artifact| {
            inner.state = match std::mem::take(&mut inner.state) {
                WorkflowState::Upload {
                    patient,
                    patient_ref,
                } => WorkflowState::Confirm {
                    patient,
                    artifact: artifact.clone(),
                    patient_ref,
                },
                other => other,
            };
            artifact
        });
        record(&mut inner, &result);
        result
    }

    /// Confirm → Upload, keeping the patient and any registered record.
    pub fn change_file(&self) -> Result<(), WorkflowError> {
        let mut inner = self.lock();
        let result = if inner.in_flight.is_some() {
            Err(WorkflowError::Busy)
        } else {
            match std::mem::take(&mut inner.state) {
                WorkflowState::Confirm {
                    patient,
                    patient_ref,
                    ..
                } => {
                    inner.state = WorkflowState::Upload {
                        patient,
                        patient_ref,
                    };
                    Ok(())
                }
                other => {
                    let step = other.step();
                    inner.state = other;
                    Err(invalid("change the file", step))
                }
            }
        };
        record(&mut inner, &result);
        result
    }

    /// Confirm → Result. Any failure leaves the session at Confirm with
    /// the artifact intact, so a retry does not need a new upload.
    pub async fn run_diagnosis(&self) -> Result<StoredReport, WorkflowError> {
        let (guard, analysis_type, state) = self.begin("run diagnosis", WorkflowStep::Confirm)?;
        let step = state.step();
        let WorkflowState::Confirm {
            patient,
            artifact,
            patient_ref,
        } = state
        else {
            return Err(invalid("run diagnosis", step));
        };

        let generation = guard.generation;
        let span = tracing::info_span!("diagnosis", %analysis_type, generation);
        let result = self
            .diagnose(generation, analysis_type, &patient, &artifact, patient_ref)
            .instrument(span)
            .await;

        let mut inner = self.lock();
        if self.is_stale(generation) {
            if let Ok(stored) = &result {
                tracing::warn!(report_id = %stored.id, "Report saved after session reset, not shown");
            }
            return Err(WorkflowError::Superseded);
        }

        match &result {
            Ok(stored) => {
                inner.state = WorkflowState::Result {
                    patient,
                    report: stored.clone(),
                };
                self.progress
                    .send_replace(DiagnosisProgress::at(DiagnosisPhase::Complete));
            }
            Err(WorkflowError::Analysis(e)) if e.is_data_integrity() => {
                tracing::error!(%analysis_type, error = %e, "Inference result failed integrity checks");
                self.progress
                    .send_replace(DiagnosisProgress::at(DiagnosisPhase::Failed));
            }
            Err(e) => {
                tracing::warn!(%analysis_type, error = %e, "Diagnosis failed");
                self.progress
                    .send_replace(DiagnosisProgress::at(DiagnosisPhase::Failed));
            }
        }
        record(&mut inner, &result);
        result
    }

    /// Back to Intake from anywhere. In-flight work becomes stale.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        inner.state = WorkflowState::Intake;
        inner.last_error = None;
        inner.in_flight = None;
        self.progress.send_replace(DiagnosisProgress::idle());
        tracing::debug!(generation, "Workflow reset");
    }

    // ── Observers ───────────────────────────────────────────

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let inner = self.lock();
        WorkflowSnapshot {
            analysis_type: inner.analysis_type,
            step: inner.state.step(),
            patient: inner.state.patient().cloned(),
            artifact: inner.state.artifact().cloned(),
            report: inner.state.report().cloned(),
            last_error: inner.last_error.clone(),
            busy: inner.in_flight.is_some(),
        }
    }

    pub fn analysis_type(&self) -> AnalysisType {
        self.lock().analysis_type
    }

    pub fn progress(&self) -> DiagnosisProgress {
        *self.progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<DiagnosisProgress> {
        self.progress.subscribe()
    }

    /// Markdown summary once a report is available.
    pub fn summary(&self) -> Option<String> {
        let inner = self.lock();
        match &inner.state {
            WorkflowState::Result { patient, report } => Some(render_summary(report, patient)),
            _ => None,
        }
    }

    // ── Internal ────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Claim the in-flight slot for an operation allowed only at `expected`.
    fn begin(
        &self,
        operation: &'static str,
        expected: WorkflowStep,
    ) -> Result<(InFlightGuard<'_>, AnalysisType, WorkflowState), WorkflowError> {
        let mut inner = self.lock();
        let step = inner.state.step();
        let refused = if inner.in_flight.is_some() {
            Some(WorkflowError::Busy)
        } else if step != expected {
            Some(invalid(operation, step))
        } else {
            None
        };
        if let Some(e) = refused {
            inner.last_error = Some(e.user_message());
            return Err(e);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        inner.in_flight = Some(generation);
        Ok((
            InFlightGuard {
                workflow: self,
                generation,
            },
            inner.analysis_type,
            inner.state.clone(),
        ))
    }

    fn ensure_current(&self, generation: u64) -> Result<(), WorkflowError> {
        if self.is_stale(generation) {
            tracing::warn!(generation, "Session reset during diagnosis, discarding result");
            return Err(WorkflowError::Superseded);
        }
        Ok(())
    }

    fn publish(&self, generation: u64, phase: DiagnosisPhase) {
        let _inner = self.lock();
        if !self.is_stale(generation) {
            self.progress.send_replace(DiagnosisProgress::at(phase));
        }
    }

    /// Keep the registered patient on the Confirm step for later retries.
    fn remember_patient_ref(
        &self,
        generation: u64,
        patient_ref: &PatientRef,
    ) -> Result<(), WorkflowError> {
        let mut inner = self.lock();
        if self.is_stale(generation) {
            return Err(WorkflowError::Superseded);
        }
        if let WorkflowState::Confirm {
            patient_ref: slot, ..
        } = &mut inner.state
        {
            *slot = Some(patient_ref.clone());
        }
        Ok(())
    }

    async fn diagnose(
        &self,
        generation: u64,
        analysis_type: AnalysisType,
        patient: &PatientContext,
        artifact: &UploadedArtifact,
        patient_ref: Option<PatientRef>,
    ) -> Result<StoredReport, WorkflowError> {
        let patient_ref = match patient_ref {
            Some(existing) => existing,
            None => {
                self.publish(generation, DiagnosisPhase::RegisteringPatient);
                let created = self
                    .collaborators
                    .patients
                    .register(patient)
                    .await
                    .map_err(AnalysisError::PatientRegistration)?;
                self.remember_patient_ref(generation, &created)?;
                tracing::debug!(patient_ref = %created, "Patient registered");
                created
            }
        };

        // ERG interpretation is open-ended and needs no reference list.
        let catalog = match analysis_type {
            AnalysisType::FundusImage => {
                self.publish(generation, DiagnosisPhase::LoadingCatalog);
                let catalog = self
                    .collaborators
                    .catalog
                    .list()
                    .await
                    .map_err(AnalysisError::Catalog)?;
                self.ensure_current(generation)?;
                if catalog.is_empty() {
                    return Err(AnalysisError::EmptyCatalog.into());
                }
                catalog
            }
            AnalysisType::ErgReport => Vec::new(),
        };
        let labels: Vec<String> = catalog.iter().map(|d| d.name.clone()).collect();
        let request = build_inference_request(patient, analysis_type, &labels, &artifact.remote_ref);

        self.publish(generation, DiagnosisPhase::AwaitingInference);
        let result = self.gateway.invoke(&request).await?;
        self.ensure_current(generation)?;
        tracing::debug!(result_kind = %result.analysis_type(), "Inference result received");

        self.publish(generation, DiagnosisPhase::Reconciling);
        let context = ReconcileContext {
            patient_ref,
            file_ref: artifact.remote_ref.clone(),
            created_by: self.session.current_user_id(),
        };
        let report = self.reconciler.reconcile(&result, &context, &catalog)?;

        self.ensure_current(generation)?;
        self.publish(generation, DiagnosisPhase::SavingReport);
        let id = self
            .collaborators
            .reports
            .create(&report)
            .await
            .map_err(AnalysisError::ReportStore)?;

        tracing::info!(
            report_id = %id,
            severity = %report.severity,
            doctor_review_required = report.doctor_review_required,
            "Diagnosis report saved"
        );
        Ok(StoredReport { id, report })
    }
}

fn invalid(operation: &'static str, step: WorkflowStep) -> WorkflowError {
    WorkflowError::InvalidTransition { operation, step }
}

/// Last-error bookkeeping shared by every transition.
fn record<T>(inner: &mut Inner, result: &Result<T, WorkflowError>) {
    match result {
        Ok(_) => inner.last_error = None,
        Err(WorkflowError::Superseded) => {}
        Err(e) => inner.last_error = Some(e.user_message()),
    }
}

// ═══════════════════════════════════════════════════════════
// InFlightGuard
// ═══════════════════════════════════════════════════════════

/// Releases the in-flight slot on drop, unless a reset already did.
struct InFlightGuard<'a> {
    workflow: &'a DiagnosisWorkflow,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.workflow.lock();
        if inner.in_flight == Some(self.generation) {
            inner.in_flight = None;
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
