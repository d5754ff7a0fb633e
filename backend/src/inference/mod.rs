pub mod model;
pub mod policy;
pub mod preprocess;
pub mod service;

pub use model::{Classifier, InferenceError};
pub use policy::DecisionPolicy;
pub use service::InferenceService;
