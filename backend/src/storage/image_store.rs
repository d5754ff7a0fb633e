use std::fs;
use std::path::PathBuf;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid file extension for '{0}', allowed types are png, jpg, jpeg")]
    InvalidExtension(String),
    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: usize, limit: usize },
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Persists uploaded scans under a single directory.
#[derive(Clone, Debug)]
pub struct ImageStore {
    upload_dir: PathBuf,
    max_size: usize,
}

impl ImageStore {
    pub fn new(upload_dir: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_size,
        }
    }

    /// Lower-cased suffix after the last dot, if it is one we accept.
    pub fn extract_file_extension(file_name: &str) -> Option<String> {
        let (_, ext) = file_name.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    }

    pub fn is_allowed(file_name: &str) -> bool {
        Self::extract_file_extension(file_name).is_some()
    }

    /// Reduces a client-supplied name to a safe single path component.
    ///
    /// Directory parts are dropped, whitespace becomes `_`, and anything
    /// outside `[A-Za-z0-9._-]` is removed. Leading dots and underscores are
    /// stripped so the result can never be `..` or a hidden file.
    pub fn sanitize_file_name(file_name: &str) -> String {
        let base = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default();

        let cleaned: String = base
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .collect();

        cleaned.trim_start_matches(['.', '_']).to_string()
    }

    pub fn validate_image_size(&self, image_data: &[u8]) -> Result<(), StoreError> {
        if image_data.len() > self.max_size {
            return Err(StoreError::FileTooLarge {
                size: image_data.len(),
                limit: self.max_size,
            });
        }
        Ok(())
    }

    /// Writes the upload to `<upload_dir>/<sanitized name>` and returns that path.
    /// An existing file with the same name is overwritten.
    pub fn store(&self, image_data: &[u8], file_name: &str) -> Result<PathBuf, StoreError> {
        if !Self::is_allowed(file_name) {
            return Err(StoreError::InvalidExtension(file_name.to_string()));
        }

        let safe_name = Self::sanitize_file_name(file_name);
        // Sanitizing can eat the stem or the dot; re-check what will hit the disk.
        if !Self::is_allowed(&safe_name) {
            return Err(StoreError::InvalidExtension(file_name.to_string()));
        }

        self.validate_image_size(image_data)?;

        fs::create_dir_all(&self.upload_dir)?;
        let path = self.upload_dir.join(&safe_name);
        fs::write(&path, image_data)?;

        log::debug!("Stored upload ({} bytes) at {}", image_data.len(), path.display());
        Ok(path)
    }
}
