//! End-to-end compositing pipeline
//!
//! `CompositeProcessor` owns the configuration and the model registry and runs
//! the stages in order: style extraction (when no guide is supplied),
//! foreground extraction, then placement, color adaptation, lighting and
//! blending. Every stage is timed and wrapped in its own span.

use crate::{
    compositor::Compositor,
    config::CompositeConfig,
    error::Result,
    inference::ModelRegistry,
    segmentation::ForegroundExtractor,
    services::ImageIOService,
    style::StyleExtractor,
    tracing_config::{events, spans},
    types::{CompositeResult, ProcessingTimings, StyleGuide},
};
use image::{DynamicImage, RgbImage};
use instant::Instant;
use log::{debug, info};
use std::path::Path;
use tracing::instrument;

/// Runs the compositing pipeline with one configuration and one set of models
#[derive(Debug)]
pub struct CompositeProcessor {
    config: CompositeConfig,
    registry: ModelRegistry,
}

impl CompositeProcessor {
    /// Create a processor; models are initialized on first use
    ///
    /// # Errors
    /// - Any rule checked by [`CompositeConfig::validate`]
    pub fn new(config: CompositeConfig, registry: ModelRegistry) -> Result<Self> {
        config.validate()?;
        debug!(
            "Processor ready (segmentation model: {}, depth model: {})",
            registry.segmentation().is_some(),
            registry.depth().is_some()
        );
        Ok(Self { config, registry })
    }

    /// Processor without models; every stage uses its classical strategy
    ///
    /// # Errors
    /// - Any rule checked by [`CompositeConfig::validate`]
    pub fn classical(config: CompositeConfig) -> Result<Self> {
        Self::new(config, ModelRegistry::empty())
    }

    #[must_use]
    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Composite the product photo at `product_path` into the scene at
    /// `generated_path` and write the result to `output_path`
    ///
    /// Without a style guide, one is extracted from the scene.
    ///
    /// # Errors
    /// - `Load` when either input cannot be read or decoded
    /// - `InvalidConfig` for an unsupported output extension
    /// - Stage errors from [`CompositeProcessor::process_images`]
    #[instrument(
        skip(self, generated_path, product_path, output_path, style_guide),
        fields(
            product = %product_path.as_ref().display(),
            scene = %generated_path.as_ref().display(),
            output = %output_path.as_ref().display()
        )
    )]
    pub fn process<G, P, O>(
        &self,
        generated_path: G,
        product_path: P,
        output_path: O,
        style_guide: Option<&StyleGuide>,
    ) -> Result<CompositeResult>
    where
        G: AsRef<Path>,
        P: AsRef<Path>,
        O: AsRef<Path>,
    {
        let total_start = Instant::now();

        let decode_start = Instant::now();
        let product = {
            let _span = spans::file_processing(product_path.as_ref(), "load").entered();
            ImageIOService::load_image(product_path.as_ref())?
        };
        let scene = {
            let _span = spans::file_processing(generated_path.as_ref(), "load").entered();
            ImageIOService::load_image(generated_path.as_ref())?.to_rgb8()
        };
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_images(&product, &scene, style_guide)?;

        let encode_start = Instant::now();
        {
            let _span = spans::file_processing(output_path.as_ref(), "save").entered();
            ImageIOService::save_image(&result.image, output_path.as_ref(), self.config.jpeg_quality)?;
        }

        result.timings.image_decode_ms = decode_ms;
        result.timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        result.timings.total_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Composited {} into {} ({})",
            product_path.as_ref().display(),
            output_path.as_ref().display(),
            result.timings.summary()
        );
        Ok(result)
    }

    /// Run the pipeline on decoded images
    ///
    /// # Errors
    /// - `InvalidConfig` for a supplied style guide with invalid light spots
    /// - `Processing` for empty images
    /// - Model errors under `StrategyPolicy::NeuralOnly`
    pub fn process_images(
        &self,
        product: &DynamicImage,
        scene: &RgbImage,
        style_guide: Option<&StyleGuide>,
    ) -> Result<CompositeResult> {
        let mut timings = ProcessingTimings::new();
        let total_start = Instant::now();

        let style_start = Instant::now();
        let style_guide = match style_guide {
            Some(guide) => {
                guide.validate()?;
                guide.clone()
            },
            None => {
                let _span = spans::stage("style", scene.dimensions()).entered();
                StyleExtractor::new(&self.registry, &self.config).analyze(scene)?
            },
        };
        timings.style_ms = style_start.elapsed().as_millis() as u64;

        let segmentation_start = Instant::now();
        let cutout = {
            let _span = spans::stage("segmentation", (product.width(), product.height())).entered();
            ForegroundExtractor::new(&self.registry, &self.config).extract_with_report(product)?
        };
        timings.segmentation_ms = segmentation_start.elapsed().as_millis() as u64;

        let compositing_start = Instant::now();
        let composite = {
            let _span = spans::stage("compositing", scene.dimensions()).entered();
            Compositor::new(&self.registry, &self.config).integrate(&cutout.image, scene, &style_guide)?
        };
        timings.compositing_ms = compositing_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        events::performance_metric("composite", timings.total_ms);

        Ok(CompositeResult {
            image: composite.image,
            placement: composite.placement,
            light: composite.light,
            style_guide,
            segmentation: cutout.strategy,
            timings,
        })
    }

    /// Extract a style guide from the image at `path`
    ///
    /// # Errors
    /// - `Load` when the image cannot be read or decoded
    /// - Depth model errors under `StrategyPolicy::NeuralOnly`
    pub fn analyze<P: AsRef<Path>>(&self, path: P) -> Result<StyleGuide> {
        let start = Instant::now();
        let guide = StyleExtractor::new(&self.registry, &self.config).analyze_path(path)?;
        events::performance_metric("analyze", start.elapsed().as_millis() as u64);
        Ok(guide)
    }
}
