//! Model descriptions for the segmentation and depth collaborators
//!
//! Weights are plain ONNX files on disk. A [`ModelSpec`] names the file, the
//! role the model plays in the pipeline, and the square resolution it expects.

use crate::error::{CompositeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `ImageNet` channel means used by most depth networks
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// `ImageNet` channel standard deviations
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// What a model contributes to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelRole {
    /// `[1,3,S,S]` image in, `[1,1,S,S]` foreground probability out
    Segmentation,
    /// `[1,3,D,D]` image in, `[1,1,D,D]` or `[1,D,D]` relative depth out
    Depth,
}

impl std::fmt::Display for ModelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Segmentation => write!(f, "segmentation"),
            Self::Depth => write!(f, "depth"),
        }
    }
}

/// Model information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub role: ModelRole,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize),
    pub output_shape: (usize, usize, usize, usize),
}

/// Tensor preparation expected by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

impl PreprocessingConfig {
    /// Plain `[0, 1]` scaling at the given square size
    #[must_use]
    pub fn segmentation(size: u32) -> Self {
        Self {
            target_size: [size, size],
            normalization_mean: [0.0, 0.0, 0.0],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }

    /// `ImageNet` normalization at the given square size
    #[must_use]
    pub fn depth(size: u32) -> Self {
        Self {
            target_size: [size, size],
            normalization_mean: IMAGENET_MEAN,
            normalization_std: IMAGENET_STD,
        }
    }
}

/// Location and role of a model file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub path: PathBuf,
    pub role: ModelRole,
    /// Square input resolution
    pub input_size: u32,
}

impl ModelSpec {
    /// Segmentation model at the default 320 px resolution
    #[must_use]
    pub fn segmentation<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            role: ModelRole::Segmentation,
            input_size: 320,
        }
    }

    /// Depth model at the default 256 px resolution
    #[must_use]
    pub fn depth<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            role: ModelRole::Depth,
            input_size: 256,
        }
    }

    /// Override the square input resolution
    #[must_use]
    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    /// Display name derived from the file stem
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .map_or_else(|| format!("{}-model", self.role), str::to_string)
    }

    /// Read the model bytes
    ///
    /// # Errors
    /// - `Model` when the file is missing or unreadable
    pub fn load_bytes(&self) -> Result<Vec<u8>> {
        if !self.path.exists() {
            return Err(CompositeError::model_error_with_context(
                "load",
                &self.path,
                "file does not exist",
                &["check the model path", "pass an ONNX file exported for this role"],
            ));
        }

        std::fs::read(&self.path).map_err(|e| {
            CompositeError::model_error_with_context("read", &self.path, &e.to_string(), &[])
        })
    }

    /// Size of the model file, 0 when it cannot be inspected
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        file_size(&self.path)
    }

    /// Expected tensor shapes and metadata
    #[must_use]
    pub fn info(&self) -> ModelInfo {
        let size = self.input_size as usize;
        ModelInfo {
            name: self.name(),
            role: self.role,
            size_bytes: self.size_bytes(),
            input_shape: (1, 3, size, size),
            output_shape: (1, 1, size, size),
        }
    }

    /// Preprocessing matching the model role
    #[must_use]
    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        match self.role {
            ModelRole::Segmentation => PreprocessingConfig::segmentation(self.input_size),
            ModelRole::Depth => PreprocessingConfig::depth(self.input_size),
        }
    }
}

fn file_size(path: &Path) -> usize {
    std::fs::metadata(path).map_or(0, |m| m.len() as usize)
}
