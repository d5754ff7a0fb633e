use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Label returned when the top class does not clear the confidence threshold.
pub const UNRECOGNIZED_LABEL: &str = "Unrecognized/Invalid Image";

/// Outcome of a single classification call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
}

impl ClassificationResult {
    /// Builds a result, clamping the confidence into `[0, 1]`.
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn unrecognized(confidence: f32) -> Self {
        Self::new(UNRECOGNIZED_LABEL, confidence)
    }

    pub fn is_recognized(&self) -> bool {
        self.label != UNRECOGNIZED_LABEL
    }

    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PatientDetails {
    pub name: String,
    pub age: String,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct DoctorDetails {
    pub name: String,
    pub phone: String,
}

/// Who is requesting the analysis. Drives the signature block of the report.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind")]
pub enum VisitType {
    DoctorVisit { name: String, phone: String },
    PatientVisit,
}

impl VisitType {
    pub fn kind(&self) -> VisitKind {
        match self {
            VisitType::DoctorVisit { .. } => VisitKind::DoctorVisit,
            VisitType::PatientVisit => VisitKind::PatientVisit,
        }
    }
}

/// Form-level discriminant of [`VisitType`], parsed from the radio button value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum VisitKind {
    #[strum(serialize = "Doctor Visit")]
    #[serde(rename = "Doctor Visit")]
    DoctorVisit,
    #[strum(serialize = "Patient Visit")]
    #[serde(rename = "Patient Visit")]
    PatientVisit,
}

impl Default for VisitKind {
    fn default() -> Self {
        VisitKind::DoctorVisit
    }
}

/// One row of the history ledger. Column names follow the CSV header.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryRecord {
    #[serde(rename = "Name")]
    pub patient_name: String,
    #[serde(rename = "Age")]
    pub patient_age: String,
    #[serde(rename = "Prediction")]
    pub prediction: String,
    #[serde(rename = "Date")]
    pub timestamp: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Confidence")]
    pub confidence: f32,
}

impl HistoryRecord {
    pub fn new(patient: &PatientDetails, result: &ClassificationResult, timestamp: String) -> Self {
        Self {
            patient_name: patient.name.clone(),
            patient_age: patient.age.clone(),
            prediction: result.label.clone(),
            timestamp,
            address: patient.address.clone(),
            confidence: result.confidence,
        }
    }
}

/// Static reference text shown next to a predicted label.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TumorInfo {
    pub risk_level: String,
    pub description: String,
    pub symptoms: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InferenceResponse {
    pub label: String,
    pub confidence: f32,
    pub recognized: bool,
    pub file_name: String,
}

impl InferenceResponse {
    pub fn new(result: &ClassificationResult, file_name: impl Into<String>) -> Self {
        Self {
            label: result.label.clone(),
            confidence: result.confidence,
            recognized: result.is_recognized(),
            file_name: file_name.into(),
        }
    }
}
