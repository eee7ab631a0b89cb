use std::fmt::Write;

use crate::models::{AnalysisType, PatientContext, StoredReport};

/// Markdown summary for the result step.
pub fn render_summary(stored: &StoredReport, patient: &PatientContext) -> String {
    let report = &stored.report;
    let mut out = String::new();

    let _ = writeln!(out, "# {} Analysis Report", report.analysis_type.display_name());
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "**Patient:** {} ({} years)  \n**Report ID:** {}  \n**Date:** {}",
        patient.full_name,
        patient.age,
        stored.id,
        report.created_at.format("%Y-%m-%d %H:%M UTC"),
    );
    let _ = writeln!(out);

    match report.analysis_type {
        AnalysisType::FundusImage => {
            let prediction = report.primary_condition().unwrap_or("Unknown");
            let _ = writeln!(out, "**Prediction: {prediction}**");
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", report.diagnosis_text);
        }
        AnalysisType::ErgReport => {
            let _ = writeln!(out, "**Assessment: {}**", report.diagnosis_text);
            if !report.detected_conditions.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "## Detected Patterns");
                for condition in &report.detected_conditions {
                    let _ = writeln!(out, "- {condition}");
                }
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "**Severity:** {}  \n**Confidence:** {}%",
        report.severity,
        report.confidence_score.round()
    );

    if !report.recommendations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Recommendations");
        let _ = writeln!(out, "{}", report.recommendations);
    }

    if !report.detailed_findings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Detailed Findings");
        let _ = writeln!(out, "{}", report.detailed_findings);
    }

    if report.doctor_review_required {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "> **Doctor review required.** Please consult an eye care specialist about these results."
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiagnosisReport, PatientRef, RemoteRef, ReportId, Severity};
    use chrono::{TimeZone, Utc};

    fn stored(analysis_type: AnalysisType, review: bool) -> StoredReport {
        StoredReport {
            id: ReportId::new("r-42"),
            report: DiagnosisReport {
                patient_ref: PatientRef::new("p-1"),
                analysis_type,
                file_ref: RemoteRef::new("blob://abc"),
                diagnosis_text: "Optic nerve damage.".into(),
                confidence_score: 88.4,
                detected_conditions: vec!["Glaucoma".into()],
                severity: Severity::Severe,
                recommendations: "Measure IOP.".into(),
                doctor_review_required: review,
                detailed_findings: "Enlarged cup.".into(),
                created_by: None,
                created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            },
        }
    }

    #[test]
    fn fundus_summary_has_prediction_block() {
        let md = render_summary(
            &stored(AnalysisType::FundusImage, true),
            &PatientContext::new("Jane Doe", 54),
        );
        assert!(md.starts_with("# Fundus Image Analysis Report"));
        assert!(md.contains("**Prediction: Glaucoma**\n\nOptic nerve damage."));
        assert!(md.contains("**Severity:** severe"));
        assert!(md.contains("**Confidence:** 88%"));
        assert!(md.contains("Jane Doe (54 years)"));
        assert!(md.contains("2026-03-01 09:30 UTC"));
        assert!(md.contains("Doctor review required"));
    }

    #[test]
    fn erg_summary_lists_patterns() {
        let md = render_summary(
            &stored(AnalysisType::ErgReport, false),
            &PatientContext::new("Jane Doe", 54),
        );
        assert!(md.contains("**Assessment: Optic nerve damage.**"));
        assert!(md.contains("## Detected Patterns\n- Glaucoma"));
        assert!(!md.contains("Doctor review required"));
    }
}
