use ndarray::Array4;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("Image not found: {0}")]
    ImageNotFound(PathBuf),
    #[error("Failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model produced {got} outputs for {expected} labels")]
    OutputShape { expected: usize, got: usize },
}

/// Forward pass over a preprocessed batch of one image.
///
/// Implementations own whatever runtime state they need and must be safe to
/// share across request handlers.
pub trait Classifier: Send + Sync {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

#[cfg(feature = "torch")]
pub use torch::TorchClassifier;

#[cfg(feature = "torch")]
mod torch {
    use super::{Classifier, InferenceError};
    use ndarray::Array4;
    use std::path::Path;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    /// TorchScript classifier. Calls are serialized through the mutex.
    pub struct TorchClassifier {
        model: Mutex<CModule>,
        device: Device,
    }

    impl TorchClassifier {
        pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
            let device = Device::cuda_if_available();
            let model = CModule::load_on_device(model_path, device).map_err(|e| {
                InferenceError::ModelLoad {
                    path: model_path.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;
            log::info!("Loaded TorchScript model on {:?}", device);
            Ok(Self {
                model: Mutex::new(model),
                device,
            })
        }
    }

    impl Classifier for TorchClassifier {
        fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
            let data = input
                .as_slice()
                .ok_or_else(|| InferenceError::Preprocessing("input tensor is not contiguous".into()))?;
            let tensor = Tensor::from_slice(data).view(shape.as_slice()).to_device(self.device);

            let output = {
                let model = self
                    .model
                    .lock()
                    .map_err(|_| InferenceError::Model("model lock poisoned".into()))?;
                model
                    .forward_ts(&[tensor])
                    .map_err(|e| InferenceError::Model(e.to_string()))?
            };

            let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
            let num_elements = output_flat.size()[0] as usize;
            let mut output_vec = vec![0.0f32; num_elements];
            output_flat.copy_data(&mut output_vec, num_elements);
            Ok(output_vec)
        }
    }
}

/// Loads the production classifier for `model_path`.
///
/// A missing or unreadable weights file is a [`InferenceError::ModelLoad`];
/// callers treat it as fatal.
pub fn load_classifier(model_path: &Path) -> Result<Box<dyn Classifier>, InferenceError> {
    if !model_path.is_file() {
        return Err(InferenceError::ModelLoad {
            path: model_path.to_path_buf(),
            reason: "weights file not found".to_string(),
        });
    }

    #[cfg(feature = "torch")]
    {
        Ok(Box::new(TorchClassifier::load(model_path)?))
    }

    #[cfg(not(feature = "torch"))]
    {
        Err(InferenceError::ModelLoad {
            path: model_path.to_path_buf(),
            reason: "built without the `torch` feature".to_string(),
        })
    }
}
