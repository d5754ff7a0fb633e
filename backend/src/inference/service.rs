use shared::ClassificationResult;
use std::path::Path;
use std::sync::Arc;

use super::model::{Classifier, InferenceError, load_classifier};
use super::policy::{DecisionPolicy, decide};
use super::preprocess::load_and_preprocess;
use crate::config::{ModelConfig, ModelOutput, PreprocessingConfig};

/// Process-wide classification handle. Built once at startup and shared
/// read-only between handlers.
#[derive(Clone)]
pub struct InferenceService {
    classifier: Arc<dyn Classifier>,
    labels: Vec<String>,
    policy: DecisionPolicy,
    output_kind: ModelOutput,
    preprocessing: PreprocessingConfig,
}

impl InferenceService {
    /// Loads the weights named in `model`. Any failure here is a startup error.
    pub fn initialize(
        model: &ModelConfig,
        preprocessing: &PreprocessingConfig,
    ) -> Result<Self, InferenceError> {
        let classifier = load_classifier(&model.path)?;
        log::info!(
            "Model loaded from {} ({} labels, policy {:?})",
            model.path.display(),
            model.labels.len(),
            DecisionPolicy::from_config(model)
        );
        Ok(Self::with_classifier(Arc::from(classifier), model, preprocessing))
    }

    pub fn with_classifier(
        classifier: Arc<dyn Classifier>,
        model: &ModelConfig,
        preprocessing: &PreprocessingConfig,
    ) -> Self {
        Self {
            classifier,
            labels: model.labels.clone(),
            policy: DecisionPolicy::from_config(model),
            output_kind: model.output,
            preprocessing: preprocessing.clone(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn classify(&self, image_path: &Path) -> Result<ClassificationResult, InferenceError> {
        if !image_path.exists() {
            return Err(InferenceError::ImageNotFound(image_path.to_path_buf()));
        }

        let tensor = load_and_preprocess(image_path, &self.preprocessing)?;
        let output = self.classifier.forward(&tensor)?;
        let result = decide(&output, &self.labels, self.policy, self.output_kind)?;

        log::debug!(
            "Classified {}: {} ({:.4})",
            image_path.display(),
            result.label,
            result.confidence
        );
        Ok(result)
    }
}
