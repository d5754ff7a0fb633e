use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/neuroscan.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub model: ModelConfig,
    pub preprocessing: PreprocessingConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub inference_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: 50 * 1024 * 1024,
            inference_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub report_dir: PathBuf,
    pub history_file: PathBuf,
    pub signature_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            report_dir: PathBuf::from("reports"),
            history_file: PathBuf::from("history.csv"),
            signature_path: PathBuf::from("signatures/digital_sign.png"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Argmax,
    Thresholded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelOutput {
    Probabilities,
    Logits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub labels: Vec<String>,
    pub policy: PolicyKind,
    pub threshold: f32,
    pub output: ModelOutput,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/efficientnet_b0_brain_tumor.pt"),
            labels: vec![
                "glioma".to_string(),
                "meningioma".to_string(),
                "no_tumor".to_string(),
                "pituitary".to_string(),
            ],
            policy: PolicyKind::Argmax,
            threshold: 0.85,
            output: ModelOutput::Probabilities,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Pixel values left in `0..=255`; the backbone rescales internally.
    Raw,
    /// Pixel values divided by 255.
    Unit,
    /// ImageNet mean/std after dividing by 255.
    Imagenet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub image_size: u32,
    pub layout: TensorLayout,
    pub normalization: Normalization,
    pub resize_filter: ResizeFilter,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            image_size: 224,
            layout: TensorLayout::Nhwc,
            normalization: Normalization::Raw,
            resize_filter: ResizeFilter::Nearest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    pub ai_doctor_name: String,
    pub ai_doctor_phone: String,
    pub disclaimer: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Brain Tumor Detection Medical Report".to_string(),
            ai_doctor_name: "Brain Tumor Detection AI Model".to_string(),
            ai_doctor_phone: "9885698725".to_string(),
            disclaimer: "Disclaimer: This is an AI-generated medical assistance report."
                .to_string(),
        }
    }
}

impl AppConfig {
    /// Loads the YAML file named by `NEUROSCAN_CONFIG` (if it exists), then
    /// applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            env::var("NEUROSCAN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file_or_default(Path::new(&config_path))?;
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_yaml::from_str(&config_str)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies overrides from a key lookup. Takes a closure so tests don't
    /// have to mutate the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: "PORT", value: port })?;
        }
        if let Some(path) = lookup("MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("REPORT_DIR") {
            self.storage.report_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("HISTORY_FILE") {
            self.storage.history_file = PathBuf::from(file);
        }
        if let Some(path) = lookup("SIGNATURE_PATH") {
            self.storage.signature_path = PathBuf::from(path);
        }
        if let Some(policy) = lookup("DECISION_POLICY") {
            self.model.policy = match policy.to_ascii_lowercase().as_str() {
                "argmax" => PolicyKind::Argmax,
                "thresholded" => PolicyKind::Thresholded,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "DECISION_POLICY",
                        value: policy,
                    });
                }
            };
        }
        if let Some(threshold) = lookup("CONFIDENCE_THRESHOLD") {
            self.model.threshold = threshold.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "CONFIDENCE_THRESHOLD",
                value: threshold,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.model.threshold) {
            return Err(ConfigError::Invalid(format!(
                "model.threshold must be within [0, 1], got {}",
                self.model.threshold
            )));
        }
        if self.model.labels.len() < 2 {
            return Err(ConfigError::Invalid(
                "model.labels needs at least two entries".to_string(),
            ));
        }
        if self.preprocessing.image_size == 0 {
            return Err(ConfigError::Invalid(
                "preprocessing.image_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.threshold, 0.85);
        assert_eq!(config.preprocessing.image_size, 224);
        assert_eq!(config.model.labels.len(), 4);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::from_file_or_default(Path::new("/nonexistent/neuroscan.yaml"))
            .unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model:\n  policy: thresholded\n  threshold: 0.9\nserver:\n  port: 8081").unwrap();

        let config = AppConfig::from_file_or_default(file.path()).unwrap();
        assert_eq!(config.model.policy, PolicyKind::Thresholded);
        assert_eq!(config.model.threshold, 0.9);
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.storage.history_file, PathBuf::from("history.csv"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[
                ("PORT", "9000"),
                ("DECISION_POLICY", "Thresholded"),
                ("CONFIDENCE_THRESHOLD", "0.7"),
                ("UPLOAD_DIR", "/tmp/up"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.model.policy, PolicyKind::Thresholded);
        assert_eq!(config.model.threshold, 0.7);
        assert_eq!(config.storage.upload_dir, PathBuf::from("/tmp/up"));
    }

    #[test]
    fn test_invalid_env_values_are_rejected() {
        let mut config = AppConfig::default();
        assert!(matches!(
            config.apply_env(lookup_from(&[("PORT", "not-a-port")])),
            Err(ConfigError::InvalidEnv { key: "PORT", .. })
        ));
        assert!(matches!(
            config.apply_env(lookup_from(&[("DECISION_POLICY", "vote")])),
            Err(ConfigError::InvalidEnv { key: "DECISION_POLICY", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = AppConfig::default();
        config.model.threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_single_label() {
        let mut config = AppConfig::default();
        config.model.labels = vec!["glioma".to_string()];
        assert!(config.validate().is_err());
    }
}
