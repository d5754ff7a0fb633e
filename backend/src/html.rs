//! Server-rendered pages for the two front-ends.

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use shared::{ClassificationResult, HistoryRecord, TumorInfo, VisitKind};
use std::fmt::Write;

use crate::session::SessionForm;

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:2em auto;padding:0 1em}\
.error{color:#b00020}.result{background:#f3f6fa;padding:1em;border-radius:6px}\
table{border-collapse:collapse;width:100%}td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}\
img.scan{max-width:320px;display:block;margin-top:1em}label{display:block;margin-top:.5em}";

/// Result shown by the single-shot form.
pub struct FormOutcome<'a> {
    pub result: &'a ClassificationResult,
    pub image_url: &'a str,
}

/// Result shown by the dashboard after an analysis.
pub struct AnalysisOutcome<'a> {
    pub result: &'a ClassificationResult,
    pub info: Option<&'a TumorInfo>,
    pub image_url: &'a str,
    pub report_url: &'a str,
    pub report_name: &'a str,
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title>\
         <style>{}</style></head><body>{}</body></html>",
        text(title),
        STYLE,
        body
    )
}

fn error_block(error: Option<&str>) -> String {
    error
        .map(|e| format!("<p class=\"error\">{}</p>", text(e)))
        .unwrap_or_default()
}

pub fn form_page(outcome: Option<&FormOutcome<'_>>, error: Option<&str>) -> String {
    let mut body = String::from("<h1>Brain Tumor Classifier</h1>");
    body.push_str(&error_block(error));
    body.push_str(
        "<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"file\" accept=\".png,.jpg,.jpeg\">\
         <button type=\"submit\">Predict</button></form>",
    );

    if let Some(outcome) = outcome {
        let _ = write!(
            body,
            "<div class=\"result\"><h2>Prediction: {}</h2><p>Confidence: {}</p>\
             <img class=\"scan\" src=\"{}\" alt=\"Uploaded MRI\"></div>",
            text(&outcome.result.label),
            outcome.result.confidence_percent(),
            attr(outcome.image_url)
        );
    }

    page("Brain Tumor Classifier", &body)
}

fn radio(value: VisitKind, selected: VisitKind) -> String {
    format!(
        "<label><input type=\"radio\" name=\"visit_type\" value=\"{v}\"{c}> {v}</label>",
        v = value,
        c = if value == selected { " checked" } else { "" }
    )
}

fn text_input(label: &str, name: &str, value: &str) -> String {
    format!(
        "<label>{} <input type=\"text\" name=\"{}\" value=\"{}\"></label>",
        text(label),
        name,
        attr(value)
    )
}

fn history_table(history: Result<&[HistoryRecord], &str>) -> String {
    let records = match history {
        Ok(records) => records,
        Err(e) => return format!("<p class=\"error\">{}</p>", text(e)),
    };
    if records.is_empty() {
        return "<p>No patient history available yet.</p>".to_string();
    }

    let mut table = String::from(
        "<table><tr><th>Name</th><th>Age</th><th>Prediction</th><th>Date</th>\
         <th>Address</th><th>Confidence</th></tr>",
    );
    for r in records {
        let _ = write!(
            table,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.4}</td></tr>",
            text(&r.patient_name),
            text(&r.patient_age),
            text(&r.prediction),
            text(&r.timestamp),
            text(&r.address),
            r.confidence
        );
    }
    table.push_str("</table>");
    table
}

pub fn dashboard_page(
    session: &SessionForm,
    outcome: Option<&AnalysisOutcome<'_>>,
    error: Option<&str>,
    history: Result<&[HistoryRecord], &str>,
) -> String {
    let mut body = String::from("<h1>Brain Tumor Detection System</h1>");
    body.push_str(&error_block(error));

    body.push_str("<form method=\"post\" action=\"/dashboard/analyze\" enctype=\"multipart/form-data\">");
    body.push_str("<fieldset><legend>Select User Type</legend>");
    body.push_str(&radio(VisitKind::DoctorVisit, session.visit_kind));
    body.push_str(&radio(VisitKind::PatientVisit, session.visit_kind));
    body.push_str(&text_input("Doctor Name", "doctor_name", &session.doctor.name));
    body.push_str(&text_input("Doctor Phone", "doctor_phone", &session.doctor.phone));
    body.push_str("</fieldset><fieldset><legend>Patient Information</legend>");
    body.push_str(&text_input("Patient Name", "patient_name", &session.patient.name));
    body.push_str(&text_input("Patient Age", "patient_age", &session.patient.age));
    let _ = write!(
        body,
        "<label>Patient Address <textarea name=\"patient_address\">{}</textarea></label>",
        text(&session.patient.address)
    );
    body.push_str(
        "</fieldset><fieldset><legend>Upload MRI Image</legend>\
         <input type=\"file\" name=\"file\" accept=\".png,.jpg,.jpeg\"></fieldset>\
         <button type=\"submit\">Analyze Image</button></form>",
    );

    if let Some(outcome) = outcome {
        let _ = write!(
            body,
            "<div class=\"result\"><img class=\"scan\" src=\"{}\" alt=\"Uploaded MRI Image\">\
             <h2>Prediction: {}</h2><p>Confidence: {}</p>",
            attr(outcome.image_url),
            text(&outcome.result.label.to_uppercase()),
            outcome.result.confidence_percent()
        );
        if let Some(info) = outcome.info {
            let _ = write!(
                body,
                "<p>Risk Level: {}</p><p>{}</p><p>Symptoms: {}</p>",
                text(&info.risk_level),
                text(&info.description),
                text(&info.symptoms)
            );
        }
        let _ = write!(
            body,
            "<p><a href=\"{}\" download=\"{}\">Download Medical Report</a></p></div>",
            attr(outcome.report_url),
            attr(outcome.report_name)
        );
    }

    body.push_str("<h2>Doctor Dashboard (History)</h2>");
    body.push_str(&history_table(history));

    page("Brain Tumor Detection", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_text_is_escaped() {
        let result = ClassificationResult::new("glioma", 0.9);
        let html = form_page(
            Some(&FormOutcome {
                result: &result,
                image_url: "/uploads/a\"b.png",
            }),
            Some("<script>alert(1)</script>"),
        );
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("src=\"/uploads/a&quot;b.png\""));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_form_page_shows_error_and_result() {
        let result = ClassificationResult::new("glioma", 0.9);
        let html = form_page(
            Some(&FormOutcome {
                result: &result,
                image_url: "/uploads/scan.png",
            }),
            Some("No selected file"),
        );
        assert!(html.contains("No selected file"));
        assert!(html.contains("Prediction: glioma"));
        assert!(html.contains("90.00%"));
    }

    #[test]
    fn test_dashboard_keeps_session_values() {
        let mut session = SessionForm::default();
        session.visit_kind = VisitKind::PatientVisit;
        session.patient.name = "Ann <b>".into();

        let empty: Vec<HistoryRecord> = Vec::new();
        let html = dashboard_page(&session, None, None, Ok(empty.as_slice()));
        assert!(html.contains("value=\"Ann &lt;b&gt;\""));
        assert!(html.contains("value=\"Patient Visit\" checked"));
        assert!(html.contains("No patient history available yet."));
    }

    #[test]
    fn test_history_table_rows() {
        let records = vec![HistoryRecord {
            patient_name: "Ann".into(),
            patient_age: "30".into(),
            prediction: "glioma".into(),
            timestamp: "01-01-2026 00:00:00".into(),
            address: "Here".into(),
            confidence: 0.5,
        }];
        let html = history_table(Ok(records.as_slice()));
        assert_eq!(html.matches("<tr>").count(), 2);
        assert!(html.contains("<td>0.5000</td>"));
    }
}
