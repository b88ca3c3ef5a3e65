//! Style guide extraction from a reference scene

use crate::{
    config::{CompositeConfig, StyleConfig},
    error::Result,
    inference::ModelRegistry,
    scene::SceneAnalyzer,
    services::ImageIOService,
    tracing_config::spans,
    types::{Composition, LightDirection, LightingStyle, StyleGuide},
    utils::{
        colorspace::lightness_channel,
        kmeans::{kmeans, KMeansParams},
    },
};
use image::RgbImage;
use std::path::Path;
use tracing::instrument;

/// Derives a [`StyleGuide`] from a scene
#[derive(Debug, Clone, Copy)]
pub struct StyleExtractor<'a> {
    analyzer: SceneAnalyzer<'a>,
    config: &'a StyleConfig,
}

impl<'a> StyleExtractor<'a> {
    #[must_use]
    pub fn new(registry: &'a ModelRegistry, config: &'a CompositeConfig) -> Self {
        Self {
            analyzer: SceneAnalyzer::new(registry, config),
            config: &config.style,
        }
    }

    /// Load an image and analyze it
    ///
    /// # Errors
    /// - `Load` when the file is missing or cannot be decoded
    /// - Depth estimation errors under `NeuralOnly`
    pub fn analyze_path<P: AsRef<Path>>(&self, path: P) -> Result<StyleGuide> {
        let path = path.as_ref();
        let _span = spans::file_processing(path, "analyze").entered();
        let image = ImageIOService::load_image(path)?.to_rgb8();
        self.analyze(&image)
    }

    /// Dominant colors, tonal statistics, light direction and composition
    ///
    /// # Errors
    /// - Depth estimation errors under `NeuralOnly`
    #[instrument(skip(self, image), fields(dimensions = %format!("{}x{}", image.width(), image.height())))]
    pub fn analyze(&self, image: &RgbImage) -> Result<StyleGuide> {
        let light = self.analyzer.analyze_light(image);
        let (brightness, contrast) = tonal_statistics(image);
        let depth = self.analyzer.estimate_depth(image)?;

        let aspect_ratio = if image.height() == 0 {
            0.0
        } else {
            f64::from(image.width()) / f64::from(image.height())
        };

        Ok(StyleGuide {
            colors: self.dominant_colors(image),
            lighting: LightingStyle {
                brightness,
                contrast,
                direction: LightDirection {
                    angle: f64::from(light.angle),
                    magnitude: f64::from(light.magnitude),
                },
                highlights: Vec::new(),
                shadows: Vec::new(),
            },
            composition: Composition {
                depth: f64::from(depth.mean()),
                aspect_ratio,
            },
        })
    }

    /// Cluster centers as `#rrggbb`, largest cluster first
    #[must_use]
    pub fn dominant_colors(&self, image: &RgbImage) -> Vec<String> {
        let samples = sample_pixels(image, self.config.max_samples);
        let params = KMeansParams {
            clusters: self.config.clusters,
            max_iterations: self.config.max_iterations,
            epsilon: self.config.epsilon,
            attempts: self.config.attempts,
            seed: self.config.seed,
        };

        let Some(clustering) = kmeans(&samples, &params) else {
            return Vec::new();
        };

        let sizes = clustering.sizes();
        let mut order: Vec<usize> = (0..clustering.centers.len()).collect();
        order.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]));

        order
            .into_iter()
            .map(|i| to_hex(clustering.centers[i]))
            .collect()
    }
}

/// Mean and spread of the 8-bit lightness as `(mean / 255, std / 128)`
fn tonal_statistics(image: &RgbImage) -> (f64, f64) {
    let lightness = lightness_channel(image);
    let count = lightness.width() as usize * lightness.height() as usize;
    if count == 0 {
        return (0.0, 0.0);
    }

    let count = count as f64;
    let mean = lightness.pixels().map(|p| f64::from(p[0])).sum::<f64>() / count;
    let variance = lightness
        .pixels()
        .map(|p| (f64::from(p[0]) - mean).powi(2))
        .sum::<f64>()
        / count;

    (mean / 255.0, variance.sqrt() / 128.0)
}

/// Every n-th pixel so that at most `limit` samples remain
fn sample_pixels(image: &RgbImage, limit: usize) -> Vec<[f32; 3]> {
    let total = image.width() as usize * image.height() as usize;
    let stride = total.div_ceil(limit.max(1)).max(1);
    image
        .pixels()
        .step_by(stride)
        .map(|p| p.0.map(f32::from))
        .collect()
}

fn to_hex(center: [f32; 3]) -> String {
    let [r, g, b] = center.map(|c| c.clamp(0.0, 255.0) as u8);
    format!("#{r:02x}{g:02x}{b:02x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn two_tone() -> RgbImage {
        // Three quarters red, one quarter blue
        RgbImage::from_fn(40, 20, |x, _| {
            if x < 30 {
                Rgb([220, 20, 20])
            } else {
                Rgb([10, 30, 200])
            }
        })
    }

    #[test]
    fn test_colors_ordered_by_cluster_size() {
        let registry = ModelRegistry::empty();
        let config = CompositeConfig::builder()
            .style_clusters(2)
            .style_attempts(50)
            .build()
            .unwrap();
        let extractor = StyleExtractor::new(&registry, &config);

        let colors = extractor.dominant_colors(&two_tone());
        assert_eq!(colors, vec!["#dc1414".to_string(), "#0a1ec8".to_string()]);
    }

    #[test]
    fn test_flat_image_statistics() {
        let registry = ModelRegistry::empty();
        let config = CompositeConfig::default();
        let extractor = StyleExtractor::new(&registry, &config);

        let image = RgbImage::from_pixel(30, 10, Rgb([255, 255, 255]));
        let guide = extractor.analyze(&image).unwrap();

        assert!((guide.lighting.brightness - 1.0).abs() < 1e-9);
        assert!(guide.lighting.contrast.abs() < 1e-9);
        assert_eq!(guide.lighting.direction.magnitude, 0.0);
        assert!((guide.composition.aspect_ratio - 3.0).abs() < 1e-9);
        assert_eq!(guide.composition.depth, 0.0);
        assert!(guide.lighting.shadows.is_empty() && guide.lighting.highlights.is_empty());
        assert!(guide.colors.iter().all(|c| c == "#ffffff"));
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let registry = ModelRegistry::empty();
        let config = CompositeConfig::default();
        let extractor = StyleExtractor::new(&registry, &config);

        let image = RgbImage::from_fn(32, 24, |x, y| Rgb([(x * 8) as u8, (y * 10) as u8, 60]));
        let first = extractor.analyze(&image).unwrap();
        let second = extractor.analyze(&image).unwrap();
        assert_eq!(first, second);
        assert!(first.colors.len() <= 5);
        assert!(first.colors.iter().all(|c| c.len() == 7 && c.starts_with('#')));
    }

    #[test]
    fn test_sampling_respects_limit() {
        let image = RgbImage::new(100, 100);
        assert_eq!(sample_pixels(&image, 1000).len(), 1000);
        assert_eq!(sample_pixels(&image, 300).len(), 295);
        assert_eq!(sample_pixels(&image, 1_000_000).len(), 10_000);
    }

    #[test]
    fn test_analyze_path_missing_file() {
        let registry = ModelRegistry::empty();
        let config = CompositeConfig::default();
        let extractor = StyleExtractor::new(&registry, &config);

        let err = extractor.analyze_path("/nonexistent/scene.png").unwrap_err();
        assert!(matches!(err, crate::error::CompositeError::Load(_)));
    }
}
