//! Test utilities and mock backends for testing inference functionality
//!
//! Mock implementations of the `InferenceBackend` trait for both model roles,
//! so the neural strategies can be exercised without model files.

use crate::{
    config::InferenceConfig,
    error::{CompositeError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, ModelSpec, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// Shared call log of a mock backend
pub type CallHistory = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    None,
    Init,
    Inference,
}

/// Mock segmentation backend producing a soft circular foreground
#[derive(Debug, Clone)]
pub struct MockSegmentationBackend {
    initialized: bool,
    spec: ModelSpec,
    call_history: CallHistory,
    failure: Failure,
}

impl MockSegmentationBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            spec: ModelSpec::segmentation("mock-segmentation.onnx"),
            call_history: Arc::new(Mutex::new(Vec::new())),
            failure: Failure::None,
        }
    }

    /// Create a mock backend that will fail during initialization
    #[must_use]
    pub fn new_failing_init() -> Self {
        Self {
            failure: Failure::Init,
            ..Self::new()
        }
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn new_failing_inference() -> Self {
        Self {
            failure: Failure::Inference,
            ..Self::new()
        }
    }

    /// Handle on the call log, valid after the mock is moved into a registry
    #[must_use]
    pub fn history(&self) -> CallHistory {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn generate_mock_output(input: &Array4<f32>) -> Array4<f32> {
        let (batch, _, height, width) = input.dim();
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius = (width.min(height) as f32 / 3.0).max(1.0);

        Array4::from_shape_fn((batch, 1, height, width), |(_, _, y, x)| {
            let dx = x as f32 - center_x;
            let dy = y as f32 - center_y;
            let distance = (dx * dx + dy * dy).sqrt();
            ((radius - distance) / radius * 4.0).clamp(0.0, 1.0)
        })
    }
}

impl Default for MockSegmentationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockSegmentationBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.failure == Failure::Init {
            return Err(CompositeError::model(
                "Mock segmentation backend initialization failed",
            ));
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(10)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(CompositeError::inference(
                "Mock segmentation backend not initialized",
            ));
        }

        if self.failure == Failure::Inference {
            return Err(CompositeError::inference(
                "Mock segmentation backend inference failed",
            ));
        }

        Ok(Self::generate_mock_output(input))
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

/// Mock depth backend emitting disparity that grows toward the bottom rows
#[derive(Debug, Clone)]
pub struct MockDepthBackend {
    initialized: bool,
    spec: ModelSpec,
    call_history: CallHistory,
    failure: Failure,
}

impl MockDepthBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            spec: ModelSpec::depth("mock-depth.onnx"),
            call_history: Arc::new(Mutex::new(Vec::new())),
            failure: Failure::None,
        }
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn new_failing_inference() -> Self {
        Self {
            failure: Failure::Inference,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn history(&self) -> CallHistory {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }
}

impl Default for MockDepthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockDepthBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");
        self.initialized = true;
        Ok(Some(Duration::from_millis(5)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if self.failure == Failure::Inference {
            return Err(CompositeError::inference(
                "Mock depth backend inference failed",
            ));
        }

        let (batch, _, height, width) = input.dim();
        // Near objects at the bottom have the largest disparity
        Ok(Array4::from_shape_fn((batch, 1, height, width), |(_, _, y, _)| {
            y as f32 * 10.0
        }))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_segmentation_lifecycle() {
        let mut backend = MockSegmentationBackend::new();
        let history = backend.history();
        let input = Array4::<f32>::zeros((1, 3, 32, 32));

        assert!(backend.infer(&input).is_err());
        backend.initialize(&InferenceConfig::default()).unwrap();
        let output = backend.infer(&input).unwrap();

        assert_eq!(output.dim(), (1, 1, 32, 32));
        assert!((output[[0, 0, 16, 16]] - 1.0).abs() < f32::EPSILON);
        assert_eq!(output[[0, 0, 0, 0]], 0.0);
        assert_eq!(
            *history.lock().unwrap(),
            vec!["infer", "initialize", "infer"]
        );
    }

    #[test]
    fn test_mock_failure_modes() {
        let mut failing_init = MockSegmentationBackend::new_failing_init();
        assert!(failing_init
            .initialize(&InferenceConfig::default())
            .is_err());

        let mut failing_infer = MockSegmentationBackend::new_failing_inference();
        failing_infer
            .initialize(&InferenceConfig::default())
            .unwrap();
        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(failing_infer.infer(&input).unwrap_err().is_model_failure());
    }

    #[test]
    fn test_mock_depth_ramp() {
        let mut backend = MockDepthBackend::new();
        backend.initialize(&InferenceConfig::default()).unwrap();
        let output = backend
            .infer(&Array4::<f32>::zeros((1, 3, 4, 4)))
            .unwrap();
        assert!(output[[0, 0, 3, 0]] > output[[0, 0, 0, 0]]);
    }
}
