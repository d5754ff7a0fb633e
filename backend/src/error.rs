use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::inference::InferenceError;
use crate::ledger::LedgerError;
use crate::report::ReportError;
use crate::storage::image_store::StoreError;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Everything a request handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    MissingUpload(&'static str),
    #[error("Invalid form data: {0}")]
    Form(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Inference timed out after {0} seconds")]
    Timeout(u64),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Bad input the user can fix and resubmit; the session carries on.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::MissingUpload(_)
                | AppError::Form(_)
                | AppError::Store(StoreError::InvalidExtension(_))
                | AppError::Store(StoreError::FileTooLarge { .. })
                | AppError::Inference(InferenceError::ImageDecode(_))
        )
    }

    /// Text safe to show in a page or API response.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Inference(InferenceError::ImageDecode(_)) => {
                "The uploaded file could not be read as an image".to_string()
            }
            e if e.is_user_error() => e.to_string(),
            AppError::Timeout(_) => self.to_string(),
            AppError::Inference(InferenceError::ImageNotFound(_)) => {
                "The uploaded image could not be found".to_string()
            }
            _ => "Analysis failed due to an internal error".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            e if e.is_user_error() => StatusCode::BAD_REQUEST,
            AppError::Inference(InferenceError::ImageNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.user_message(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request() {
        let missing = AppError::MissingUpload("No file part");
        assert!(missing.is_user_error());
        assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(missing.user_message(), "No file part");

        let ext = AppError::from(StoreError::InvalidExtension("scan.txt".into()));
        assert!(ext.is_user_error());
        assert_eq!(ext.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = AppError::from(ReportError::UnknownLabel("astrocytoma".into()));
        assert!(!err.is_user_error());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("astrocytoma"));
    }

    #[test]
    fn test_missing_image_is_not_found() {
        let err = AppError::from(InferenceError::ImageNotFound("uploads/x.png".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_timeout_status() {
        assert_eq!(AppError::Timeout(30).status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
