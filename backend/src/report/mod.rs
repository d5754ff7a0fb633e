pub mod catalog;
pub mod generator;

pub use catalog::TumorCatalog;
pub use generator::{ReportError, ReportGenerator, ReportRequest, SignatureBlock};
