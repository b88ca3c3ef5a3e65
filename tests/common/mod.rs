//! Shared fixtures for the integration tests
//!
//! Synthetic images plus a scripted inference backend so the neural strategies
//! run without model files.

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use instant::Duration;
use ndarray::Array4;
use scene_compositor::{
    CompositeError, InferenceBackend, InferenceConfig, ModelInfo, ModelSpec, PreprocessingConfig,
    Result,
};
use std::sync::{Arc, Mutex};

/// Route `log` output through the test harness; safe to call repeatedly
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Red square on a near-white studio background
pub fn product_photo(size: u32) -> RgbImage {
    let inner = size / 4..size - size / 4;
    RgbImage::from_fn(size, size, |x, y| {
        if inner.contains(&x) && inner.contains(&y) {
            Rgb([200, 30, 30])
        } else {
            Rgb([248, 248, 248])
        }
    })
}

/// Smooth two-axis color ramp
pub fn scene(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            120,
            (y * 255 / height.max(1)) as u8,
        ])
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Soft disc of foreground probability in the middle of the input
    Disc,
    /// Disparity growing toward the bottom rows
    Ramp,
    FailInit,
    FailInference,
}

/// Inference backend with a fixed output pattern and a call log
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    spec: ModelSpec,
    behavior: Behavior,
    initialized: bool,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl ScriptedBackend {
    pub fn segmentation(behavior: Behavior) -> Self {
        Self::with_spec(ModelSpec::segmentation("scripted-segmentation.onnx"), behavior)
    }

    pub fn depth(behavior: Behavior) -> Self {
        Self::with_spec(ModelSpec::depth("scripted-depth.onnx"), behavior)
    }

    fn with_spec(spec: ModelSpec, behavior: Behavior) -> Self {
        Self {
            spec,
            behavior,
            initialized: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<&'static str>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl InferenceBackend for ScriptedBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        self.record("initialize");
        if self.behavior == Behavior::FailInit {
            return Err(CompositeError::model("scripted initialization failure"));
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record("infer");
        let (batch, _, height, width) = input.dim();

        match self.behavior {
            Behavior::Disc => {
                let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
                let radius = width.min(height) as f32 / 3.0;
                Ok(Array4::from_shape_fn((batch, 1, height, width), |(_, _, y, x)| {
                    let distance = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
                    ((radius - distance) / radius * 4.0).clamp(0.0, 1.0)
                }))
            },
            Behavior::Ramp => Ok(Array4::from_shape_fn(
                (batch, 1, height, width),
                |(_, _, y, _)| y as f32,
            )),
            Behavior::FailInit | Behavior::FailInference => Err(CompositeError::inference(
                "scripted inference failure",
            )),
        }
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
