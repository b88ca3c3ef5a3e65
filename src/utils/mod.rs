//! Image math shared by the pipeline stages

pub mod colorspace;
pub mod filters;
pub mod kmeans;
pub mod preprocessing;
pub mod providers;

pub use colorspace::LabImage;
pub use kmeans::{kmeans, Clustering, KMeansParams};
pub use preprocessing::{ImagePreprocessor, LetterboxGeometry};
pub use providers::{ExecutionProviderManager, ProviderInfo};
