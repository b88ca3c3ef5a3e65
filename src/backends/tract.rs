//! Tract backend for the segmentation and depth models
//!
//! Pure Rust inference with no native dependencies; CPU only.

use crate::backends::output_to_nchw;
use crate::config::InferenceConfig;
use crate::error::{CompositeError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelSpec, PreprocessingConfig};
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for one model file
#[derive(Debug)]
pub struct TractBackend {
    spec: ModelSpec,
    model: Option<TractModel>,
    initialized: bool,
}

impl TractBackend {
    /// Create an uninitialized backend; the file is read on `initialize`
    #[must_use]
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            spec,
            model: None,
            initialized: false,
        }
    }

    /// Tract only runs on the CPU
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Load and initialize the model using Tract
    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = self.spec.load_bytes()?;
        let size = self.spec.input_size as usize;

        log::info!(
            "Initializing Tract backend for {} model '{}'",
            self.spec.role,
            self.spec.name()
        );

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                CompositeError::model_error_with_context(
                    "load",
                    &self.spec.path,
                    &e.to_string(),
                    &["verify the file is a valid ONNX export"],
                )
            })?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| CompositeError::inference("Tract model not initialized"))?;

        log::debug!("Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| CompositeError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| CompositeError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_view = output_tensor.to_array_view::<f32>().map_err(|e| {
            CompositeError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let shape = output_view.shape().to_vec();
        let data: Vec<f32> = output_view.iter().copied().collect();
        let output_array = output_to_nchw(&shape, data)?;

        log::debug!(
            "Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );

        Ok(output_array)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.spec.preprocessing_config())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.spec.info())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
