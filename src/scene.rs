//! Scene analysis: global light, relative depth and a placement heatmap
//!
//! Depth follows the same strategy policy as foreground extraction: the depth
//! model when one is registered, otherwise (or on failure under
//! [`StrategyPolicy::Auto`]) a gradient-magnitude proxy where textured regions
//! read as near.

use crate::{
    config::{CompositeConfig, DepthConfig, PlacementConfig, StrategyPolicy},
    error::{CompositeError, Result},
    inference::{ModelHandle, ModelRegistry},
    tracing_config::{events, spans},
    types::{DepthMap, LightInfo, Placement},
    utils::{
        colorspace::lightness_channel,
        filters::{gaussian_blur, gray_to_array, normalize_min_max, sobel},
        ImagePreprocessor,
    },
};
use image::{GrayImage, Luma, RgbImage};
use ndarray::{Array2, Zip};
use tracing::instrument;

/// Sobel aperture used for the light estimate
const LIGHT_SOBEL_APERTURE: usize = 5;
/// Sobel aperture used for the gradient depth proxy
const DEPTH_SOBEL_APERTURE: usize = 3;

/// Light, depth and placement estimates for one scene
#[derive(Debug, Clone, Copy)]
pub struct SceneAnalyzer<'a> {
    registry: &'a ModelRegistry,
    depth: &'a DepthConfig,
    placement: &'a PlacementConfig,
}

impl<'a> SceneAnalyzer<'a> {
    #[must_use]
    pub fn new(registry: &'a ModelRegistry, config: &'a CompositeConfig) -> Self {
        Self {
            registry,
            depth: &config.depth,
            placement: &config.placement,
        }
    }

    /// Dominant light direction and strength from lightness gradients
    ///
    /// An empty or flat scene yields angle 0 and magnitude 0.
    #[must_use]
    pub fn analyze_light(&self, image: &RgbImage) -> LightInfo {
        let lightness = gray_to_array(&lightness_channel(image));
        let gx = sobel(&lightness, LIGHT_SOBEL_APERTURE, true);
        let gy = sobel(&lightness, LIGHT_SOBEL_APERTURE, false);

        let mean_gx = gx.mean().unwrap_or(0.0);
        let mean_gy = gy.mean().unwrap_or(0.0);
        let mean_squared = Zip::from(&gx)
            .and(&gy)
            .fold(0.0_f64, |acc, &x, &y| acc + f64::from(x * x + y * y));
        let count = gx.len().max(1) as f64;

        let light = LightInfo::from_gradient_moments(mean_gx, mean_gy, (mean_squared / count) as f32);
        log::debug!(
            "Scene light: angle {:.3} rad, magnitude {:.2}",
            light.angle,
            light.magnitude
        );
        light
    }

    /// Relative depth in [0, 1], larger = farther
    ///
    /// # Errors
    /// - `Model` under `NeuralOnly` when no depth model is registered
    /// - `Model`/`Inference` under `NeuralOnly` when the model fails
    #[instrument(skip(self, image), fields(policy = ?self.depth.policy))]
    pub fn estimate_depth(&self, image: &RgbImage) -> Result<DepthMap> {
        match (self.depth.policy, self.registry.depth()) {
            (StrategyPolicy::ClassicalOnly, _) | (StrategyPolicy::Auto, None) => {
                Ok(Self::gradient_depth(image))
            },
            (StrategyPolicy::NeuralOnly, None) => Err(CompositeError::model(
                "Neural depth requested but no depth model is registered",
            )),
            (StrategyPolicy::NeuralOnly, Some(handle)) => self.neural_depth(handle, image),
            (StrategyPolicy::Auto, Some(handle)) => {
                self.neural_depth(handle, image).or_else(|e| {
                    events::strategy_fallback("depth", &e);
                    Ok(Self::gradient_depth(image))
                })
            },
        }
    }

    /// Depth from the depth model
    ///
    /// # Errors
    /// - `Model`/`Inference` from the model handle
    /// - `Processing` for an empty scene
    pub fn neural_depth(&self, handle: &ModelHandle, image: &RgbImage) -> Result<DepthMap> {
        let (width, height) = image.dimensions();
        let preprocessing = handle.preprocessing_config()?;
        let (tensor, geometry) = ImagePreprocessor::letterbox(image, &preprocessing)?;

        let output = {
            let _span = spans::inference(handle.role(), (width, height)).entered();
            handle.run(&tensor, self.registry.inference_config())?
        };

        let raw = ImagePreprocessor::restore_map(&output, &geometry, width, height)?;
        // Disparity is largest for near pixels; negate so near maps to 0
        let oriented = if self.depth.output_is_disparity {
            raw.mapv(|v| -v)
        } else {
            raw
        };
        Ok(DepthMap::new(normalize_min_max(&oriented, 0.0, 1.0)))
    }

    /// Sobel gradient magnitude of the grayscale scene, min-max normalized
    #[must_use]
    pub fn gradient_depth(image: &RgbImage) -> DepthMap {
        let gray = gray_to_array(&image::imageops::grayscale(image));
        let gx = sobel(&gray, DEPTH_SOBEL_APERTURE, true);
        let gy = sobel(&gray, DEPTH_SOBEL_APERTURE, false);
        let magnitude = Zip::from(&gx)
            .and(&gy)
            .map_collect(|&x, &y| (x * x + y * y).sqrt());
        DepthMap::new(normalize_min_max(&magnitude, 0.0, 1.0))
    }

    /// Least busy spot of the scene: few edges and little depth
    ///
    /// # Errors
    /// - `Processing` for an empty scene
    /// - Depth estimation errors under `NeuralOnly`
    #[instrument(skip(self, image), fields(dimensions = %format!("{}x{}", image.width(), image.height())))]
    pub fn find_placement(&self, image: &RgbImage) -> Result<Placement> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CompositeError::processing_stage_error(
                "placement",
                "scene has no pixels",
                Some(&format!("{width}x{height}")),
            ));
        }

        let depth = self.estimate_depth(image)?;
        let kernel = self.placement.heatmap_kernel as usize;
        let edges = gaussian_blur(&self.edge_map(image), kernel, 0.0);
        let blurred_depth = gaussian_blur(&depth.values, kernel, 0.0);
        let heatmap = normalize_min_max(&(edges + blurred_depth), 0.0, 1.0);

        let mut best = ((0, 0), f32::INFINITY);
        for ((y, x), &value) in heatmap.indexed_iter() {
            if value < best.1 {
                best = ((x as u32, y as u32), value);
            }
        }
        let position = best.0;

        log::debug!(
            "Placement anchor at ({}, {}) with heat {:.3}",
            position.0,
            position.1,
            best.1
        );

        Ok(Placement {
            position,
            depth_at_position: depth.value_at(position.0, position.1),
            heatmap,
        })
    }

    /// Canny edges of every color channel, merged and scaled to {0, 1}
    fn edge_map(&self, image: &RgbImage) -> Array2<f32> {
        let (width, height) = image.dimensions();
        let mut merged = Array2::zeros((height as usize, width as usize));
        // Edge detection needs a 3x3 neighborhood
        if width < 3 || height < 3 {
            return merged;
        }

        for channel in 0..3 {
            let plane = GrayImage::from_fn(width, height, |x, y| {
                Luma([image.get_pixel(x, y)[channel]])
            });
            let edges = imageproc::edges::canny(
                &plane,
                self.placement.edge_low_threshold,
                self.placement.edge_high_threshold,
            );
            Zip::from(&mut merged)
                .and(&gray_to_array(&edges))
                .for_each(|m, &e| *m = f32::max(*m, e / 255.0));
        }
        merged
    }
}
