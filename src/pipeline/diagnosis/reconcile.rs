use chrono::Utc;

use super::types::InferenceResult;
use super::AnalysisError;
use crate::config::WorkflowConfig;
use crate::models::{
    find_disease, AnalysisType, DiagnosisReport, DiseaseReference, PatientRef, RemoteRef,
    Severity, UserId,
};

/// Catalog label reported as a healthy fundus.
const NORMAL_FUNDUS_LABEL: &str = "normal fundus";

/// Lowercased labels that are reported as severe on the fundus path.
const HIGH_RISK_LABELS: &[&str] = &["glaucoma", "armd", "diabetic retinopathy"];

/// Where a reconciled report belongs.
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    pub patient_ref: PatientRef,
    pub file_ref: RemoteRef,
    pub created_by: Option<UserId>,
}

/// Maps typed inference output onto the reporting schema.
#[derive(Debug, Clone)]
pub struct ResultReconciler {
    confidence_threshold: f64,
    erg_default_confidence: f64,
}

impl Default for ResultReconciler {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

impl ResultReconciler {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            erg_default_confidence: config.erg_default_confidence,
        }
    }

    pub fn reconcile(
        &self,
        result: &InferenceResult,
        context: &ReconcileContext,
        catalog: &[DiseaseReference],
    ) -> Result<DiagnosisReport, AnalysisError> {
        match result {
            InferenceResult::Classification {
                primary_label,
                confidence_score,
                justification,
            } => self.reconcile_fundus(primary_label, *confidence_score, justification, context, catalog),
            InferenceResult::Interpretation {
                primary_diagnosis,
                detected_conditions,
                severity,
                confidence_score,
                recommendations,
                detailed_findings,
                follow_up_required,
            } => {
                let severity = severity.unwrap_or_else(|| {
                    tracing::warn!("ERG result has no severity, defaulting to moderate");
                    Severity::Moderate
                });
                let confidence = confidence_score.unwrap_or_else(|| {
                    tracing::warn!(
                        default = self.erg_default_confidence,
                        "ERG result has no confidence score, using default"
                    );
                    self.erg_default_confidence
                });
                let detected_conditions = if detected_conditions.is_empty() {
                    vec![primary_diagnosis.clone()]
                } else {
                    detected_conditions.clone()
                };

                Ok(DiagnosisReport {
                    patient_ref: context.patient_ref.clone(),
                    analysis_type: AnalysisType::ErgReport,
                    file_ref: context.file_ref.clone(),
                    diagnosis_text: primary_diagnosis.clone(),
                    confidence_score: clamp_confidence(confidence),
                    detected_conditions,
                    severity,
                    recommendations: recommendations.clone().unwrap_or_default(),
                    doctor_review_required: follow_up_required
                        .unwrap_or(severity != Severity::Mild),
                    detailed_findings: detailed_findings.clone().unwrap_or_default(),
                    created_by: context.created_by.clone(),
                    created_at: Utc::now(),
                })
            }
        }
    }

    fn reconcile_fundus(
        &self,
        primary_label: &str,
        confidence_score: f64,
        justification: &str,
        context: &ReconcileContext,
        catalog: &[DiseaseReference],
    ) -> Result<DiagnosisReport, AnalysisError> {
        let disease = find_disease(catalog, primary_label).ok_or_else(|| {
            tracing::warn!(label = primary_label, "Classification not found in disease catalog");
            AnalysisError::UnknownClassification {
                label: primary_label.to_string(),
            }
        })?;

        let severity = self.fundus_severity(&disease.name, confidence_score);

        Ok(DiagnosisReport {
            patient_ref: context.patient_ref.clone(),
            analysis_type: AnalysisType::FundusImage,
            file_ref: context.file_ref.clone(),
            diagnosis_text: disease.description.clone(),
            confidence_score: clamp_confidence(confidence_score),
            detected_conditions: vec![disease.name.clone()],
            severity,
            recommendations: disease.precaution.clone(),
            doctor_review_required: severity != Severity::Mild,
            detailed_findings: justification.to_string(),
            created_by: context.created_by.clone(),
            created_at: Utc::now(),
        })
    }

    /// Label decides first; low confidence then forces mild, even for a
    /// high-risk label.
    pub fn fundus_severity(&self, label: &str, confidence_score: f64) -> Severity {
        let label = label.to_lowercase();
        let by_label = if label == NORMAL_FUNDUS_LABEL {
            Severity::Mild
        } else if HIGH_RISK_LABELS.contains(&label.as_str()) {
            Severity::Severe
        } else {
            Severity::Moderate
        };

        if confidence_score < self.confidence_threshold {
            if by_label > Severity::Mild {
                tracing::info!(
                    label = %label,
                    confidence_score,
                    from = %by_label,
                    "Low confidence, reporting severity as mild"
                );
            }
            return Severity::Mild;
        }
        by_label
    }
}

fn clamp_confidence(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}
