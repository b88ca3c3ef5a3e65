//! Configuration types for compositing operations

use crate::error::{CompositeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Inference engine used for the external models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Selection policy between the neural strategy and its classical fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrategyPolicy {
    /// Neural first, classical when the model is missing or fails
    #[default]
    Auto,
    /// Neural only, model failures propagate
    NeuralOnly,
    /// Classical only, the model is never consulted
    ClassicalOnly,
}

/// How the product anchor is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlacementMode {
    /// Horizontally centered, vertically at `vertical_anchor`
    #[default]
    Fixed,
    /// Centered on the minimum of the edge/depth heatmap
    Heatmap,
}

/// How the product is merged into the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Per-pixel alpha compositing inside the placement rectangle
    #[default]
    Alpha,
    /// Mixed-gradient seamless cloning guided by the product alpha
    Seamless,
}

/// Inference session settings shared by both model handles
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,
}

/// Which model files to load and with which engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// ONNX segmentation model (None = classical extractor only)
    pub segmentation_model: Option<PathBuf>,
    /// ONNX depth model (None = gradient depth proxy only)
    pub depth_model: Option<PathBuf>,
    /// Square working resolution of the segmentation model
    pub segmentation_input_size: u32,
    /// Square working resolution of the depth model
    pub depth_input_size: u32,
    pub backend_type: BackendType,
    pub inference: InferenceConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            segmentation_model: None,
            depth_model: None,
            segmentation_input_size: 320,
            depth_input_size: 256,
            backend_type: BackendType::default(),
            inference: InferenceConfig::default(),
        }
    }
}

/// Classical foreground extractor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassicalConfig {
    /// Border excluded from the seed rectangle, in pixels
    pub margin: u32,
    /// Re-estimation rounds
    pub iterations: u32,
    /// Gaussian components per color model
    pub components: usize,
    /// Pairwise smoothness weight
    pub smoothness: f32,
    /// Edge-preserving pre-smoothing of the input
    pub presmooth: bool,
}

impl Default for ClassicalConfig {
    fn default() -> Self {
        Self {
            margin: 10,
            iterations: 5,
            components: 5,
            smoothness: 50.0,
            presmooth: true,
        }
    }
}

/// Foreground extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    pub policy: StrategyPolicy,
    /// Gaussian kernel used to soften the mask edge
    pub smoothing_kernel: u32,
    pub classical: ClassicalConfig,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            policy: StrategyPolicy::Auto,
            smoothing_kernel: 5,
            classical: ClassicalConfig::default(),
        }
    }
}

/// Depth estimation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthConfig {
    pub policy: StrategyPolicy,
    /// Model emits inverse depth (near = large); inverted after normalization
    pub output_is_disparity: bool,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            policy: StrategyPolicy::Auto,
            output_is_disparity: true,
        }
    }
}

/// Placement and scaling of the product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    pub mode: PlacementMode,
    /// Product height as a fraction of the scene height
    pub product_scale: f32,
    /// Vertical center of the product as a fraction of the scene height
    pub vertical_anchor: f32,
    /// Canny hysteresis thresholds
    pub edge_low_threshold: f32,
    pub edge_high_threshold: f32,
    /// Gaussian kernel applied to the edge and depth maps
    pub heatmap_kernel: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            mode: PlacementMode::Fixed,
            product_scale: 0.4,
            vertical_anchor: 0.5,
            edge_low_threshold: 100.0,
            edge_high_threshold: 200.0,
            heatmap_kernel: 21,
        }
    }
}

/// Blending settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendConfig {
    pub mode: BlendMode,
    /// Gaussian kernel applied to the product alpha before blending
    pub alpha_kernel: u32,
    /// Solver sweeps for seamless cloning
    pub seamless_iterations: u32,
    /// Largest per-sweep change at which the solver stops
    pub seamless_tolerance: f32,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            mode: BlendMode::Alpha,
            alpha_kernel: 5,
            seamless_iterations: 300,
            seamless_tolerance: 0.01,
        }
    }
}

/// Synthetic light placement derived from the scene light direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightingConfig {
    /// Shadow radius as a fraction of the product height
    pub shadow_radius: f32,
    /// Highlight radius as a fraction of the product height
    pub highlight_radius: f32,
    /// Offset of both circles from the product center along the light direction
    pub offset: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            shadow_radius: 0.3,
            highlight_radius: 0.2,
            offset: 0.1,
        }
    }
}

/// Dominant color clustering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    pub clusters: usize,
    pub max_iterations: u32,
    /// Center movement below which clustering stops
    pub epsilon: f32,
    /// Independent restarts, best compactness wins
    pub attempts: u32,
    pub seed: u64,
    /// Pixels sampled for clustering (stride sampling above this)
    pub max_samples: usize,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            clusters: 5,
            max_iterations: 10,
            epsilon: 1.0,
            attempts: 10,
            seed: 0,
            max_samples: 65_536,
        }
    }
}

/// Configuration for a compositing pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeConfig {
    pub segmentation: SegmentationConfig,
    pub depth: DepthConfig,
    pub placement: PlacementConfig,
    pub blend: BlendConfig,
    pub lighting: LightingConfig,
    pub style: StyleConfig,
    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            depth: DepthConfig::default(),
            placement: PlacementConfig::default(),
            blend: BlendConfig::default(),
            lighting: LightingConfig::default(),
            style: StyleConfig::default(),
            jpeg_quality: 90,
        }
    }
}

impl CompositeConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// ```rust
    /// use scene_compositor::{BlendMode, CompositeConfig, StrategyPolicy};
    ///
    /// let config = CompositeConfig::builder()
    ///     .segmentation_policy(StrategyPolicy::ClassicalOnly)
    ///     .blend_mode(BlendMode::Seamless)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.placement.product_scale, 0.4);
    /// ```
    #[must_use]
    pub fn builder() -> CompositeConfigBuilder {
        CompositeConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Product scale outside (0, 1]
    /// - Vertical anchor outside [0, 1]
    /// - Even or zero Gaussian kernel sizes
    /// - Zero clusters, attempts or iterations
    /// - JPEG quality above 100
    pub fn validate(&self) -> Result<()> {
        let scale = self.placement.product_scale;
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(CompositeError::config_value_error(
                "product scale",
                scale,
                "(0, 1]",
                Some(0.4),
            ));
        }

        let anchor = self.placement.vertical_anchor;
        if !(0.0..=1.0).contains(&anchor) {
            return Err(CompositeError::config_value_error(
                "vertical anchor",
                anchor,
                "[0, 1]",
                Some(0.5),
            ));
        }

        for (name, kernel, recommended) in [
            ("mask smoothing kernel", self.segmentation.smoothing_kernel, 5),
            ("heatmap kernel", self.placement.heatmap_kernel, 21),
            ("alpha kernel", self.blend.alpha_kernel, 5),
        ] {
            if kernel % 2 == 0 {
                return Err(CompositeError::config_value_error(
                    name,
                    kernel,
                    "odd values >= 1",
                    Some(recommended),
                ));
            }
        }

        if self.segmentation.classical.components == 0
            || self.segmentation.classical.iterations == 0
        {
            return Err(CompositeError::invalid_config(
                "Classical extractor needs at least one component and one iteration",
            ));
        }

        if self.style.clusters == 0 || self.style.attempts == 0 || self.style.max_iterations == 0
        {
            return Err(CompositeError::invalid_config(
                "Color clustering needs at least one cluster, attempt and iteration",
            ));
        }

        if self.style.max_samples == 0 {
            return Err(CompositeError::config_value_error(
                "max samples",
                self.style.max_samples,
                ">= 1",
                Some(65_536),
            ));
        }

        if self.jpeg_quality > 100 {
            return Err(CompositeError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
                Some(90),
            ));
        }

        Ok(())
    }
}

/// Builder for `CompositeConfig`
#[derive(Debug, Default)]
pub struct CompositeConfigBuilder {
    config: CompositeConfig,
}

impl CompositeConfigBuilder {
    /// Set the foreground extraction policy
    #[must_use]
    pub fn segmentation_policy(mut self, policy: StrategyPolicy) -> Self {
        self.config.segmentation.policy = policy;
        self
    }

    /// Set the depth estimation policy
    #[must_use]
    pub fn depth_policy(mut self, policy: StrategyPolicy) -> Self {
        self.config.depth.policy = policy;
        self
    }

    /// Whether the depth model emits inverse depth
    #[must_use]
    pub fn depth_output_is_disparity(mut self, disparity: bool) -> Self {
        self.config.depth.output_is_disparity = disparity;
        self
    }

    /// Set classical extractor settings
    #[must_use]
    pub fn classical(mut self, classical: ClassicalConfig) -> Self {
        self.config.segmentation.classical = classical;
        self
    }

    /// Set placement mode
    #[must_use]
    pub fn placement_mode(mut self, mode: PlacementMode) -> Self {
        self.config.placement.mode = mode;
        self
    }

    /// Set product height relative to the scene
    #[must_use]
    pub fn product_scale(mut self, scale: f32) -> Self {
        self.config.placement.product_scale = scale;
        self
    }

    /// Set the vertical anchor relative to the scene
    #[must_use]
    pub fn vertical_anchor(mut self, anchor: f32) -> Self {
        self.config.placement.vertical_anchor = anchor;
        self
    }

    /// Set blend mode
    #[must_use]
    pub fn blend_mode(mut self, mode: BlendMode) -> Self {
        self.config.blend.mode = mode;
        self
    }

    /// Set seamless solver limits
    #[must_use]
    pub fn seamless_solver(mut self, iterations: u32, tolerance: f32) -> Self {
        self.config.blend.seamless_iterations = iterations.max(1);
        self.config.blend.seamless_tolerance = tolerance.max(0.0);
        self
    }

    /// Set synthetic lighting geometry
    #[must_use]
    pub fn lighting(mut self, lighting: LightingConfig) -> Self {
        self.config.lighting = lighting;
        self
    }

    /// Set clustering seed
    #[must_use]
    pub fn style_seed(mut self, seed: u64) -> Self {
        self.config.style.seed = seed;
        self
    }

    /// Set number of dominant colors
    #[must_use]
    pub fn style_clusters(mut self, clusters: usize) -> Self {
        self.config.style.clusters = clusters;
        self
    }

    /// Set clustering restarts
    #[must_use]
    pub fn style_attempts(mut self, attempts: u32) -> Self {
        self.config.style.attempts = attempts;
        self
    }

    /// Set JPEG quality
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Any rule checked by [`CompositeConfig::validate`]
    pub fn build(self) -> Result<CompositeConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
