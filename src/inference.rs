//! Inference backend abstraction and the model registry
//!
//! The registry owns at most one segmentation and one depth backend. It is
//! built once by the caller and handed to the extractors by reference; each
//! backend is initialized on first use and reused afterwards.

use crate::{
    config::{BackendType, InferenceConfig, ModelsConfig},
    error::{CompositeError, Result},
    models::{ModelInfo, ModelRole, ModelSpec, PreprocessingConfig},
};
use ndarray::Array4;
use std::sync::Mutex;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
pub trait InferenceBackend {
    /// Initialize the backend with the given configuration
    ///
    /// Returns the model load time, or `None` when already initialized.
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Session creation failures
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Output tensor with an unexpected rank
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Get preprocessing configuration for this backend
    ///
    /// # Errors
    /// - Invalid or missing preprocessing configuration
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Model metadata unavailable
    fn get_model_info(&self) -> Result<ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}

/// Serialized access to one backend
pub struct ModelHandle {
    role: ModelRole,
    backend: Mutex<Box<dyn InferenceBackend + Send>>,
}

impl ModelHandle {
    #[must_use]
    pub fn new(role: ModelRole, backend: Box<dyn InferenceBackend + Send>) -> Self {
        Self {
            role,
            backend: Mutex::new(backend),
        }
    }

    #[must_use]
    pub fn role(&self) -> ModelRole {
        self.role
    }

    /// Preprocessing the wrapped model expects
    pub fn preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.lock()?.get_preprocessing_config()
    }

    /// Initialize on first use, then run inference
    ///
    /// # Errors
    /// - `Model` when the backend cannot be initialized
    /// - `Inference` when the input does not match the model or the forward pass fails
    pub fn run(&self, input: &Array4<f32>, config: &InferenceConfig) -> Result<Array4<f32>> {
        let mut backend = self.lock()?;

        if !backend.is_initialized() {
            let _span = crate::tracing_config::spans::model_loading(self.role).entered();
            if let Some(load_time) = backend.initialize(config)? {
                let info = backend.get_model_info()?;
                log::info!(
                    "{} model {} ready in {:.0}ms ({:?} -> {:?})",
                    self.role,
                    info.name,
                    load_time.as_secs_f64() * 1000.0,
                    info.input_shape,
                    info.output_shape
                );
            }
        }

        let info = backend.get_model_info()?;
        let (_, channels, height, width) = input.dim();
        let (_, want_channels, want_height, want_width) = info.input_shape;
        if (channels, height, width) != (want_channels, want_height, want_width) {
            return Err(CompositeError::inference(format!(
                "{} model {} expects {}x{}x{} input, got {}x{}x{}",
                self.role, info.name, want_channels, want_height, want_width, channels, height,
                width
            )));
        }

        backend.infer(input)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn InferenceBackend + Send>>> {
        self.backend.lock().map_err(|_| {
            CompositeError::internal(format!("{} model handle poisoned", self.role))
        })
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Owner of the lazily initialized model handles
#[derive(Debug, Default)]
pub struct ModelRegistry {
    segmentation: Option<ModelHandle>,
    depth: Option<ModelHandle>,
    inference: InferenceConfig,
}

impl ModelRegistry {
    /// Registry without models; every stage uses its classical strategy
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// Build backends for the configured model files
    ///
    /// # Errors
    /// - `InvalidConfig` when the selected backend was compiled out or an
    ///   input size is zero
    pub fn from_config(config: &ModelsConfig) -> Result<Self> {
        if config.segmentation_input_size == 0 || config.depth_input_size == 0 {
            return Err(CompositeError::invalid_config(
                "Model input sizes must be positive",
            ));
        }

        let mut builder = Self::builder().inference(config.inference.clone());

        if let Some(path) = &config.segmentation_model {
            let spec = ModelSpec::segmentation(path).with_input_size(config.segmentation_input_size);
            builder = builder.segmentation(create_backend(config.backend_type, spec)?);
        }
        if let Some(path) = &config.depth_model {
            let spec = ModelSpec::depth(path).with_input_size(config.depth_input_size);
            builder = builder.depth(create_backend(config.backend_type, spec)?);
        }

        Ok(builder.build())
    }

    #[must_use]
    pub fn segmentation(&self) -> Option<&ModelHandle> {
        self.segmentation.as_ref()
    }

    #[must_use]
    pub fn depth(&self) -> Option<&ModelHandle> {
        self.depth.as_ref()
    }

    #[must_use]
    pub fn inference_config(&self) -> &InferenceConfig {
        &self.inference
    }
}

/// Builder for `ModelRegistry`
#[derive(Default)]
pub struct ModelRegistryBuilder {
    segmentation: Option<Box<dyn InferenceBackend + Send>>,
    depth: Option<Box<dyn InferenceBackend + Send>>,
    inference: InferenceConfig,
}

impl ModelRegistryBuilder {
    #[must_use]
    pub fn segmentation(mut self, backend: Box<dyn InferenceBackend + Send>) -> Self {
        self.segmentation = Some(backend);
        self
    }

    #[must_use]
    pub fn depth(mut self, backend: Box<dyn InferenceBackend + Send>) -> Self {
        self.depth = Some(backend);
        self
    }

    #[must_use]
    pub fn inference(mut self, config: InferenceConfig) -> Self {
        self.inference = config;
        self
    }

    #[must_use]
    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            segmentation: self
                .segmentation
                .map(|backend| ModelHandle::new(ModelRole::Segmentation, backend)),
            depth: self
                .depth
                .map(|backend| ModelHandle::new(ModelRole::Depth, backend)),
            inference: self.inference,
        }
    }
}

/// Instantiate the backend compiled in for `backend_type`
fn create_backend(
    backend_type: BackendType,
    spec: ModelSpec,
) -> Result<Box<dyn InferenceBackend + Send>> {
    match backend_type {
        #[cfg(feature = "onnx")]
        BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::new(spec))),
        #[cfg(feature = "tract")]
        BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new(spec))),
        #[allow(unreachable_patterns)]
        other => {
            let _ = spec;
            Err(CompositeError::invalid_config(format!(
                "Backend '{other}' is not compiled in; enable the '{other}' feature"
            )))
        },
    }
}
