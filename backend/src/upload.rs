use actix_multipart::Multipart;
use futures::{StreamExt, TryStreamExt};
use std::collections::HashMap;

use crate::error::AppError;
use crate::storage::image_store::StoreError;

pub const FILE_FIELD: &str = "file";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// A fully buffered multipart submission: text fields plus at most one file.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<UploadedFile>,
}

impl UploadForm {
    pub async fn from_multipart(mut payload: Multipart, max_bytes: usize) -> Result<Self, AppError> {
        let mut form = UploadForm::default();
        let mut total = 0usize;

        while let Some(mut field) = payload
            .try_next()
            .await
            .map_err(|e| AppError::Form(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);

            let mut data = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| AppError::Form(e.to_string()))?;
                total += chunk.len();
                if total > max_bytes {
                    return Err(StoreError::FileTooLarge {
                        size: total,
                        limit: max_bytes,
                    }
                    .into());
                }
                data.extend_from_slice(&chunk);
            }

            if name == FILE_FIELD {
                form.file = Some(UploadedFile {
                    file_name: file_name.unwrap_or_default(),
                    data,
                });
            } else if !name.is_empty() {
                form.fields
                    .insert(name, String::from_utf8_lossy(&data).into_owned());
            }
        }

        Ok(form)
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_file(mut self, file_name: &str, data: &[u8]) -> Self {
        self.file = Some(UploadedFile {
            file_name: file_name.to_string(),
            data: data.to_vec(),
        });
        self
    }

    /// Trimmed field value, empty when absent.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(|v| v.trim()).unwrap_or_default()
    }

    /// The uploaded file, rejecting a missing part or a blank file name.
    pub fn require_file(&self) -> Result<&UploadedFile, AppError> {
        let file = self
            .file
            .as_ref()
            .ok_or(AppError::MissingUpload("No file part"))?;
        if file.file_name.trim().is_empty() {
            return Err(AppError::MissingUpload("No selected file"));
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_part() {
        let form = UploadForm::default().with_field("patient_name", "Ann");
        assert!(matches!(
            form.require_file(),
            Err(AppError::MissingUpload("No file part"))
        ));
    }

    #[test]
    fn test_empty_file_name() {
        let form = UploadForm::default().with_file("", b"");
        assert!(matches!(
            form.require_file(),
            Err(AppError::MissingUpload("No selected file"))
        ));
    }

    #[test]
    fn test_field_is_trimmed() {
        let form = UploadForm::default().with_field("patient_name", "  Ann Lee ");
        assert_eq!(form.field("patient_name"), "Ann Lee");
        assert_eq!(form.field("missing"), "");
    }
}
