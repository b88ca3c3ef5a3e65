//! ONNX Runtime backend for the segmentation and depth models
//!
//! Supports the CPU, CUDA and `CoreML` execution providers. CUDA and `CoreML`
//! fall back to CPU with a warning when they are unavailable at runtime.

use crate::backends::output_to_nchw;
use crate::config::{ExecutionProvider, InferenceConfig};
use crate::error::{CompositeError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelSpec, PreprocessingConfig};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// ONNX Runtime backend for one model file
#[derive(Debug)]
pub struct OnnxBackend {
    spec: ModelSpec,
    session: Option<Session>,
    initialized: bool,
}

impl OnnxBackend {
    /// Create an uninitialized backend; the file is read on `initialize`
    #[must_use]
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            spec,
            session: None,
            initialized: false,
        }
    }

    /// List all ONNX Runtime execution providers with availability status and descriptions
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Providers to register for the requested option, in priority order
    fn providers_for(provider: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda = CUDAExecutionProvider::default();
        let coreml = CoreMLExecutionProvider::default();
        let cuda_available = OrtExecutionProvider::is_available(&cuda).unwrap_or(false);
        let coreml_available = OrtExecutionProvider::is_available(&coreml).unwrap_or(false);

        match provider {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                if cuda_available {
                    log::info!("CUDA execution provider is available and will be used");
                    providers.push(cuda.build());
                }
                if coreml_available {
                    log::info!("CoreML execution provider is available and will be used");
                    providers.push(coreml.with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::debug!("No hardware acceleration available, using CPU");
                }
                providers
            },
            ExecutionProvider::Cpu => Vec::new(),
            ExecutionProvider::Cuda => {
                if cuda_available {
                    vec![cuda.build()]
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available {
                    vec![coreml.with_subgraphs(true).build()]
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
        }
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self, config: &InferenceConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = self.spec.load_bytes()?;
        let session_error = |stage: &str, e: &dyn std::fmt::Display| {
            CompositeError::model_error_with_context(stage, &self.spec.path, &e.to_string(), &[])
        };

        let mut session_builder = Session::builder()
            .map_err(|e| session_error("create session builder for", &e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| session_error("set optimization level for", &e))?;

        let providers = Self::providers_for(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| session_error("register execution providers for", &e))?;
        }

        let cores = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            cores
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| session_error("set intra threads for", &e))?
            .with_inter_threads(inter_threads)
            .map_err(|e| session_error("set inter threads for", &e))?
            .commit_from_memory(&model_data)
            .map_err(|e| session_error("create session from", &e))?;

        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_data.len() as f64 / (1024.0 * 1024.0);
        log::debug!("ONNX Runtime session created");
        log::debug!("  - Model: {} ({})", self.spec.name(), self.spec.role);
        log::debug!("  - Model size: {size_mb:.2} MB");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!(
            "  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads"
        );

        self.session = Some(session);
        self.initialized = true;

        Ok(model_load_start.elapsed())
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CompositeError::inference("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            CompositeError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs avoid depending on exporter-specific tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| CompositeError::inference(format!("ONNX inference failed: {e}")))?;

        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| CompositeError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| CompositeError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                CompositeError::inference(format!("Failed to extract output tensor: {e}"))
            })?;

        let shape = output_tensor.shape().to_vec();
        let data: Vec<f32> = output_tensor.iter().copied().collect();
        let result = output_to_nchw(&shape, data)?;

        log::debug!(
            "Inference complete: {:.2}ms, output {:?}",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            result.dim()
        );

        Ok(result)
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
