#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Scene Compositor Library
//!
//! Composites a product photo into a separately generated scene so the result
//! looks physically plausible: the product is cut out, color and lighting
//! matched to the scene, placed at a scene-aware position and blended with
//! soft edges.
//!
//! ## Features
//!
//! - **Foreground Extraction**: neural segmentation model with a classical
//!   graph-cut fallback
//! - **Scene Analysis**: light direction, relative depth (neural or gradient
//!   proxy) and a placement heatmap
//! - **Color Matching**: Lab statistics transfer and lightness histogram matching
//! - **Synthetic Lighting**: soft shadows and highlights along the scene light
//! - **Blending**: alpha compositing or mixed-gradient seamless cloning
//! - **Style Guides**: dominant colors, tonal statistics and composition as JSON
//! - **Multiple Backends**: ONNX Runtime (GPU acceleration) and Tract (Pure Rust)
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! Without models every stage uses its classical strategy:
//!
//! ```rust,no_run
//! use scene_compositor::{CompositeConfig, CompositeProcessor};
//!
//! # fn main() -> scene_compositor::Result<()> {
//! let processor = CompositeProcessor::classical(CompositeConfig::default())?;
//! let result = processor.process("scene.png", "product.jpg", "out/result.png", None)?;
//! println!("Placed at {:?} ({})", result.placement, result.timings.summary());
//! # Ok(())
//! # }
//! ```
//!
//! With models, the registry builds one backend per configured file and
//! initializes each on first use:
//!
//! ```rust,no_run
//! use scene_compositor::{
//!     BlendMode, CompositeConfig, CompositeProcessor, ModelRegistry, ModelsConfig,
//! };
//!
//! # fn main() -> scene_compositor::Result<()> {
//! let models = ModelsConfig {
//!     segmentation_model: Some("models/segmentation.onnx".into()),
//!     depth_model: Some("models/depth.onnx".into()),
//!     ..ModelsConfig::default()
//! };
//! let config = CompositeConfig::builder()
//!     .blend_mode(BlendMode::Seamless)
//!     .build()?;
//!
//! let processor = CompositeProcessor::new(config, ModelRegistry::from_config(&models)?)?;
//! let guide = processor.analyze("reference.jpg")?;
//! processor.process("scene.png", "product.jpg", "result.jpg", Some(&guide))?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): Command-line interface and tracing subscriber setup
//! - `webp-support` (default): WebP output
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
pub mod error;
pub mod inference;
pub mod lighting;
pub mod models;
pub mod processor;
pub mod protocol;
pub mod scene;
pub mod segmentation;
pub mod services;
pub mod style;
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::*;
pub use color::ColorMatcher;
pub use compositor::{Composite, Compositor};
pub use config::{
    BackendType, BlendConfig, BlendMode, ClassicalConfig, CompositeConfig,
    CompositeConfigBuilder, DepthConfig, ExecutionProvider, InferenceConfig, LightingConfig,
    ModelsConfig, PlacementConfig, PlacementMode, SegmentationConfig, StrategyPolicy, StyleConfig,
};
pub use error::{CompositeError, Result};
pub use inference::{InferenceBackend, ModelHandle, ModelRegistry, ModelRegistryBuilder};
pub use lighting::LightingSynthesizer;
pub use models::{ModelInfo, ModelRole, ModelSpec, PreprocessingConfig};
pub use processor::CompositeProcessor;
pub use protocol::{Request, Response};
pub use scene::SceneAnalyzer;
pub use segmentation::ForegroundExtractor;
pub use services::{ImageIOService, OutputFormat, OutputFormatHandler};
pub use style::StyleExtractor;
pub use types::{
    CompositeResult, Composition, Cutout, DepthMap, LightDirection, LightInfo, LightSpot,
    LightingSpec, LightingStyle, Placement, PlacementRect, ProcessingTimings, SegmentationMask,
    Strategy, StyleGuide,
};
pub use utils::{ExecutionProviderManager, ImagePreprocessor, ProviderInfo};

pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
