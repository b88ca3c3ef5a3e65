//! Foreground extraction: product photo in, cut-out with an alpha mask out
//!
//! Two interchangeable strategies produce the mask. The neural one letterboxes
//! the photo into the segmentation model and maps its probability output back
//! onto the source pixels; the classical one runs color-model graph cuts
//! seeded by a border rectangle. [`StrategyPolicy`] decides which runs.

pub mod grabcut;
mod graph;

use crate::{
    config::{CompositeConfig, SegmentationConfig, StrategyPolicy},
    error::{CompositeError, Result},
    inference::{ModelHandle, ModelRegistry},
    services::ImageIOService,
    tracing_config::{events, spans},
    types::{Cutout, SegmentationMask, Strategy},
    utils::{filters::gaussian_blur_gray, ImagePreprocessor},
};
use image::{imageops::FilterType, DynamicImage, GrayImage, Luma, RgbImage, RgbaImage};
use std::path::Path;
use tracing::instrument;

/// Longest side processed by the classical extractor; larger photos are
/// segmented at this size and the mask is scaled back up
pub const MAX_WORKING_SIDE: u32 = 640;

/// Cuts a product out of its photo
#[derive(Debug, Clone, Copy)]
pub struct ForegroundExtractor<'a> {
    registry: &'a ModelRegistry,
    config: &'a SegmentationConfig,
}

impl<'a> ForegroundExtractor<'a> {
    #[must_use]
    pub fn new(registry: &'a ModelRegistry, config: &'a CompositeConfig) -> Self {
        Self {
            registry,
            config: &config.segmentation,
        }
    }

    /// Cut-out with the foreground mask as alpha
    ///
    /// # Errors
    /// See [`ForegroundExtractor::extract_with_report`]
    pub fn extract(&self, image: &DynamicImage) -> Result<RgbaImage> {
        Ok(self.extract_with_report(image)?.image)
    }

    /// Decode a photo from disk and cut it out
    ///
    /// # Errors
    /// - `Load` when the file is missing or cannot be decoded
    /// - Everything [`ForegroundExtractor::extract_with_report`] returns
    pub fn extract_from_path<P: AsRef<Path>>(&self, path: P) -> Result<RgbaImage> {
        let path_ref = path.as_ref();
        let image = {
            let _span = spans::file_processing(path_ref, "load").entered();
            ImageIOService::load_image(path_ref)?
        };
        self.extract(&image)
    }

    /// Cut-out together with the strategy that produced its mask
    ///
    /// # Errors
    /// - `Model` under `NeuralOnly` when no segmentation model is registered
    /// - `Model`/`Inference` under `NeuralOnly` when the model fails
    /// - `Processing` when the mask cannot be attached
    #[instrument(
        skip(self, image),
        fields(
            policy = ?self.config.policy,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn extract_with_report(&self, image: &DynamicImage) -> Result<Cutout> {
        let rgb = image.to_rgb8();

        let (mask, strategy) = match (self.config.policy, self.registry.segmentation()) {
            (StrategyPolicy::ClassicalOnly, _) => (self.classical_mask(&rgb), Strategy::Classical),
            (StrategyPolicy::NeuralOnly, None) => {
                return Err(CompositeError::model(
                    "Neural segmentation requested but no segmentation model is registered",
                ));
            },
            (StrategyPolicy::NeuralOnly, Some(handle)) => {
                (self.neural_mask(handle, &rgb)?, Strategy::Neural)
            },
            (StrategyPolicy::Auto, None) => {
                log::debug!("No segmentation model registered, using classical extractor");
                (self.classical_mask(&rgb), Strategy::Classical)
            },
            (StrategyPolicy::Auto, Some(handle)) => match self.neural_mask(handle, &rgb) {
                Ok(mask) => (mask, Strategy::Neural),
                Err(e) => {
                    events::strategy_fallback("segmentation", &e);
                    (self.classical_mask(&rgb), Strategy::Classical)
                },
            },
        };

        let mask = SegmentationMask::from_gray(&mask);
        let stats = mask.statistics();
        log::debug!(
            "{} mask covers {:.1}% of {}x{}",
            strategy,
            stats.foreground_ratio * 100.0,
            rgb.width(),
            rgb.height()
        );

        Ok(Cutout {
            image: mask.attach_to(&rgb)?,
            strategy,
        })
    }

    /// Soft mask from the segmentation model
    ///
    /// # Errors
    /// - `Model` when the backend cannot be initialized
    /// - `Inference` when the forward pass fails or returns an empty map
    /// - `Processing` for an empty input image
    pub fn neural_mask(&self, handle: &ModelHandle, image: &RgbImage) -> Result<GrayImage> {
        let (width, height) = image.dimensions();
        let preprocessing = handle.preprocessing_config()?;
        let (tensor, geometry) = ImagePreprocessor::letterbox(image, &preprocessing)?;

        let output = {
            let _span = spans::inference(handle.role(), (width, height)).entered();
            handle.run(&tensor, self.registry.inference_config())?
        };

        let probabilities = ImagePreprocessor::restore_map(&output, &geometry, width, height)?;
        let mask = GrayImage::from_fn(width, height, |x, y| {
            Luma([probability_level(probabilities[[y as usize, x as usize]])])
        });

        Ok(gaussian_blur_gray(&mask, self.config.smoothing_kernel as usize))
    }

    /// Mask from the classical extractor, never fails
    #[must_use]
    pub fn classical_mask(&self, image: &RgbImage) -> GrayImage {
        let (width, height) = image.dimensions();
        let longest = width.max(height);

        let binary = if longest <= MAX_WORKING_SIDE {
            grabcut::segment(image, &self.config.classical)
        } else {
            let scale = f64::from(MAX_WORKING_SIDE) / f64::from(longest);
            let small_w = ((f64::from(width) * scale).round() as u32).max(1);
            let small_h = ((f64::from(height) * scale).round() as u32).max(1);
            log::debug!(
                "Classical extractor working at {small_w}x{small_h} for a {width}x{height} photo"
            );

            let small = image::imageops::resize(image, small_w, small_h, FilterType::Triangle);
            let mask = grabcut::segment(&small, &self.config.classical);
            let mut restored = image::imageops::resize(&mask, width, height, FilterType::Triangle);
            for pixel in restored.pixels_mut() {
                pixel[0] = if pixel[0] >= 128 { 255 } else { 0 };
            }
            restored
        };

        gaussian_blur_gray(&binary, self.config.smoothing_kernel as usize)
    }
}

/// Foreground probability as a mask level, rounded to the nearest step
fn probability_level(p: f32) -> u8 {
    // NaN casts to 0
    (p.clamp(0.0, 1.0) * 255.0).round() as u8
}
