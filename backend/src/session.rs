use shared::{DoctorDetails, PatientDetails, VisitKind, VisitType};
use std::str::FromStr;

use crate::error::AppError;
use crate::upload::UploadForm;

/// Metadata collected by the dashboard form ahead of an analysis. Echoed back
/// into the form on every response so the user never retypes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionForm {
    pub visit_kind: VisitKind,
    pub doctor: DoctorDetails,
    pub patient: PatientDetails,
}

impl SessionForm {
    pub fn from_upload(form: &UploadForm) -> Result<Self, AppError> {
        let visit = form.field("visit_type");
        let visit_kind = if visit.is_empty() {
            VisitKind::default()
        } else {
            VisitKind::from_str(visit)
                .map_err(|_| AppError::Form(format!("unknown visit type '{}'", visit)))?
        };

        Ok(Self {
            visit_kind,
            doctor: DoctorDetails {
                name: form.field("doctor_name").to_string(),
                phone: form.field("doctor_phone").to_string(),
            },
            patient: PatientDetails {
                name: form.field("patient_name").to_string(),
                age: form.field("patient_age").to_string(),
                address: form.field("patient_address").to_string(),
            },
        })
    }

    pub fn visit_type(&self) -> VisitType {
        match self.visit_kind {
            VisitKind::DoctorVisit => VisitType::DoctorVisit {
                name: self.doctor.name.clone(),
                phone: self.doctor.phone.clone(),
            },
            VisitKind::PatientVisit => VisitType::PatientVisit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctor_visit_from_form() {
        let form = UploadForm::default()
            .with_field("visit_type", "Doctor Visit")
            .with_field("doctor_name", "Dr. Grey")
            .with_field("doctor_phone", "555-0199")
            .with_field("patient_name", "Ann");
        let session = SessionForm::from_upload(&form).unwrap();

        assert_eq!(
            session.visit_type(),
            VisitType::DoctorVisit {
                name: "Dr. Grey".into(),
                phone: "555-0199".into()
            }
        );
        assert_eq!(session.patient.name, "Ann");
    }

    #[test]
    fn test_patient_visit_ignores_doctor_fields() {
        let form = UploadForm::default()
            .with_field("visit_type", "Patient Visit")
            .with_field("doctor_name", "Dr. Grey");
        let session = SessionForm::from_upload(&form).unwrap();
        assert_eq!(session.visit_type(), VisitType::PatientVisit);
    }

    #[test]
    fn test_default_visit_is_doctor() {
        let session = SessionForm::from_upload(&UploadForm::default()).unwrap();
        assert_eq!(session.visit_kind, VisitKind::DoctorVisit);
    }

    #[test]
    fn test_unknown_visit_type_is_form_error() {
        let form = UploadForm::default().with_field("visit_type", "Walk-in");
        assert!(matches!(SessionForm::from_upload(&form), Err(AppError::Form(_))));
    }
}
