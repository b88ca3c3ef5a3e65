//! Core data types shared by the compositing stages

use crate::error::{CompositeError, Result};
use image::{GrayImage, RgbImage, RgbaImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Which of the two interchangeable strategies produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Model-backed strategy
    Neural,
    /// Classical image-processing fallback
    Classical,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Neural => write!(f, "neural"),
            Self::Classical => write!(f, "classical"),
        }
    }
}

/// Single-channel opacity mask (0-255), same size as its source image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255), row-major
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Create mask from a grayscale image
    #[must_use]
    pub fn from_gray(image: &GrayImage) -> Self {
        Self::new(image.as_raw().clone(), image.dimensions())
    }

    /// Attach the mask as the opacity channel of a color image
    pub fn attach_to(&self, image: &RgbImage) -> Result<RgbaImage> {
        if image.dimensions() != self.dimensions {
            return Err(CompositeError::processing(format!(
                "Image ({}x{}) and mask ({}x{}) dimensions do not match",
                image.width(),
                image.height(),
                self.dimensions.0,
                self.dimensions.1
            )));
        }

        let mut rgba = RgbaImage::new(image.width(), image.height());
        for ((x, y, pixel), alpha) in image.enumerate_pixels().zip(self.data.iter()) {
            rgba.put_pixel(x, y, image::Rgba([pixel[0], pixel[1], pixel[2], *alpha]));
        }
        Ok(rgba)
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&x| x > 127).count();
        let ratio = if total_pixels == 0 {
            0.0
        } else {
            foreground_pixels as f32 / total_pixels as f32
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            foreground_ratio: ratio,
        }
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub foreground_ratio: f32,
}

/// Product cut out of its background
#[derive(Debug, Clone)]
pub struct Cutout {
    /// Original colors with the foreground mask as alpha
    pub image: RgbaImage,
    /// Strategy that produced the mask
    pub strategy: Strategy,
}

/// Global light estimate of a scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightInfo {
    /// Direction angle in radians
    pub angle: f32,
    /// Root-mean-square gradient magnitude, never negative
    pub magnitude: f32,
    /// Unit vector `(cos angle, sin angle)`
    pub direction: (f32, f32),
}

impl LightInfo {
    /// Build from the mean gradients and the mean squared gradient magnitude
    #[must_use]
    pub fn from_gradient_moments(mean_gx: f32, mean_gy: f32, mean_squared: f32) -> Self {
        let angle = mean_gy.atan2(mean_gx);
        Self {
            angle,
            magnitude: mean_squared.max(0.0).sqrt(),
            direction: (angle.cos(), angle.sin()),
        }
    }
}

/// Per-pixel depth in [0, 1], larger = farther. Rows index y.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    pub values: Array2<f32>,
}

impl DepthMap {
    #[must_use]
    pub fn new(values: Array2<f32>) -> Self {
        Self { values }
    }

    /// (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        let (rows, cols) = self.values.dim();
        (cols as u32, rows as u32)
    }

    /// Depth at a pixel, 0 outside the map
    #[must_use]
    pub fn value_at(&self, x: u32, y: u32) -> f32 {
        self.values
            .get((y as usize, x as usize))
            .copied()
            .unwrap_or(0.0)
    }

    /// Mean depth, 0 for an empty map
    #[must_use]
    pub fn mean(&self) -> f32 {
        self.values.mean().unwrap_or(0.0)
    }
}

/// Result of placement scoring
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Anchor `(x, y)` at the heatmap minimum
    pub position: (u32, u32),
    /// Depth value at the anchor
    pub depth_at_position: f32,
    /// Edge + depth heatmap normalized to [0, 1]
    pub heatmap: Array2<f32>,
}

/// Circle of synthetic light, center relative to the image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSpot {
    /// Relative x in [0, 1]
    pub x: f64,
    /// Relative y in [0, 1]
    pub y: f64,
    /// Radius in pixels
    pub radius: f64,
}

/// Shadow and highlight circles to paint onto an image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightingSpec {
    pub shadows: Vec<LightSpot>,
    pub highlights: Vec<LightSpot>,
}

/// Reusable description of a reference image's look.
///
/// Serialized with the exact keys consumed at the process boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleGuide {
    /// Dominant colors as `#rrggbb`, most common first
    #[serde(default)]
    pub colors: Vec<String>,
    pub lighting: LightingStyle,
    #[serde(default)]
    pub composition: Composition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightingStyle {
    /// Mean luminance / 255
    pub brightness: f64,
    /// Luminance standard deviation / 128
    pub contrast: f64,
    #[serde(default)]
    pub direction: LightDirection,
    #[serde(default)]
    pub highlights: Vec<LightSpot>,
    #[serde(default)]
    pub shadows: Vec<LightSpot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LightDirection {
    pub angle: f64,
    pub magnitude: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    /// Mean scene depth
    pub depth: f64,
    /// Width / height
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: f64,
}

impl StyleGuide {
    /// Parse a style guide from its JSON form
    ///
    /// # Errors
    /// - `Serialization` for malformed JSON
    /// - `InvalidConfig` for light spots that fail [`StyleGuide::validate`]
    pub fn from_json(json: &str) -> Result<Self> {
        let guide: Self = serde_json::from_str(json)?;
        guide.validate()?;
        Ok(guide)
    }

    /// Every number must be finite; light spots also need a non-negative radius
    ///
    /// # Errors
    /// `InvalidConfig` naming the first offending value
    pub fn validate(&self) -> Result<()> {
        let lighting = &self.lighting;
        for (name, value) in [
            ("brightness", lighting.brightness),
            ("contrast", lighting.contrast),
            ("light angle", lighting.direction.angle),
            ("light magnitude", lighting.direction.magnitude),
            ("depth", self.composition.depth),
            ("aspect ratio", self.composition.aspect_ratio),
        ] {
            if !value.is_finite() {
                return Err(CompositeError::invalid_config(format!(
                    "Style guide {name} is not a finite number: {value}"
                )));
            }
        }

        let spots = lighting
            .shadows
            .iter()
            .map(|s| ("shadow", s))
            .chain(lighting.highlights.iter().map(|s| ("highlight", s)));

        for (kind, spot) in spots {
            if !(spot.x.is_finite() && spot.y.is_finite()) {
                return Err(CompositeError::invalid_config(format!(
                    "{kind} spot has a non-finite center ({}, {})",
                    spot.x, spot.y
                )));
            }
            if !spot.radius.is_finite() || spot.radius < 0.0 {
                return Err(CompositeError::config_value_error(
                    &format!("{kind} radius"),
                    spot.radius,
                    "finite values >= 0",
                    None,
                ));
            }
        }
        Ok(())
    }

    /// Serialize to compact JSON
    ///
    /// # Errors
    /// `InvalidConfig` for non-finite numbers, which JSON cannot hold
    pub fn to_json(&self) -> Result<String> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }
}

/// Placement rectangle of the product inside the scene.
///
/// The origin may be negative when the resized product is wider than the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PlacementRect {
    /// True when the scene pixel lies inside the rectangle
    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        x >= self.x
            && y >= self.y
            && x < self.x + i64::from(self.width)
            && y < self.y + i64::from(self.height)
    }
}

/// Per-stage timings of one pipeline invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image loading and decoding from file
    pub image_decode_ms: u64,
    /// Style extraction (0 when a guide was supplied)
    pub style_ms: u64,
    /// Foreground extraction
    pub segmentation_ms: u64,
    /// Color adaptation, lighting and blending
    pub compositing_ms: u64,
    /// Final image encoding (if saving to file)
    pub image_encode_ms: Option<u64>,
    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One-line summary for logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "decode {}ms, style {}ms, segmentation {}ms, compositing {}ms, encode {}ms, total {}ms",
            self.image_decode_ms,
            self.style_ms,
            self.segmentation_ms,
            self.compositing_ms,
            self.image_encode_ms.unwrap_or(0),
            self.total_ms
        )
    }
}

/// Output of a full pipeline invocation
#[derive(Debug, Clone)]
pub struct CompositeResult {
    /// Composited scene, same size as the input scene
    pub image: RgbImage,
    /// Where the product was placed
    pub placement: PlacementRect,
    /// Light estimate of the scene
    pub light: LightInfo,
    /// Style guide that drove color and lighting
    pub style_guide: StyleGuide,
    /// Which extractor produced the product mask
    pub segmentation: Strategy,
    pub timings: ProcessingTimings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_attach_and_statistics() {
        let image = RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let mask = SegmentationMask::new(vec![0, 255, 200, 50], (2, 2));

        let rgba = mask.attach_to(&image).unwrap();
        assert_eq!(rgba.get_pixel(1, 0).0, [10, 20, 30, 255]);
        assert_eq!(rgba.get_pixel(1, 1).0, [10, 20, 30, 50]);

        let stats = mask.statistics();
        assert_eq!(stats.total_pixels, 4);
        assert_eq!(stats.foreground_pixels, 2);
        assert!((stats.foreground_ratio - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mask_dimension_mismatch() {
        let image = RgbImage::new(3, 2);
        let mask = SegmentationMask::new(vec![0; 4], (2, 2));
        assert!(mask.attach_to(&image).is_err());
    }

    #[test]
    fn test_light_info_direction_is_unit() {
        let light = LightInfo::from_gradient_moments(3.0, 4.0, 36.0);
        assert!((light.magnitude - 6.0).abs() < 1e-6);
        let (dx, dy) = light.direction;
        assert!(((dx * dx + dy * dy) - 1.0).abs() < 1e-6);
        assert!((dx - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_depth_map_accessors() {
        let depth = DepthMap::new(Array2::from_shape_vec((2, 3), vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]).unwrap());
        assert_eq!(depth.dimensions(), (3, 2));
        assert!((depth.value_at(2, 1) - 1.0).abs() < f32::EPSILON);
        assert!((depth.mean() - 0.5).abs() < 1e-6);
        assert_eq!(depth.value_at(3, 0), 0.0);
    }

    #[test]
    fn test_style_guide_json_keys() {
        let guide = StyleGuide {
            colors: vec!["#102030".to_string()],
            lighting: LightingStyle {
                brightness: 0.5,
                contrast: 0.25,
                direction: LightDirection {
                    angle: 1.5,
                    magnitude: 2.0,
                },
                highlights: vec![],
                shadows: vec![LightSpot {
                    x: 0.5,
                    y: 0.75,
                    radius: 12.0,
                }],
            },
            composition: Composition {
                depth: 0.5,
                aspect_ratio: 1.5,
            },
        };

        let value: serde_json::Value = serde_json::from_str(&guide.to_json().unwrap()).unwrap();
        assert_eq!(value["composition"]["aspectRatio"], 1.5);
        assert_eq!(value["lighting"]["direction"]["angle"], 1.5);
        assert_eq!(value["lighting"]["shadows"][0]["radius"], 12.0);

        let parsed = StyleGuide::from_json(&guide.to_json().unwrap()).unwrap();
        assert_eq!(parsed, guide);
    }

    #[test]
    fn test_style_guide_minimal_input() {
        let parsed =
            StyleGuide::from_json(r#"{"lighting": {"brightness": 0.6, "contrast": 0.2}}"#).unwrap();
        assert!(parsed.colors.is_empty());
        assert!(parsed.lighting.shadows.is_empty());
        assert_eq!(parsed.composition, Composition::default());

        assert!(StyleGuide::from_json(r#"{"colors": []}"#).is_err());
    }

    #[test]
    fn test_style_guide_rejects_bad_spots() {
        let negative = r#"{"lighting": {"brightness": 0.5, "contrast": 0.2,
            "shadows": [{"x": 0.5, "y": 0.5, "radius": -4.0}]}}"#;
        let err = StyleGuide::from_json(negative).unwrap_err();
        assert!(matches!(err, CompositeError::InvalidConfig(_)), "{err}");
        assert!(err.to_string().contains("shadow radius"));

        let mut guide =
            StyleGuide::from_json(r#"{"lighting": {"brightness": 0.5, "contrast": 0.2}}"#).unwrap();
        guide.lighting.highlights.push(LightSpot {
            x: 0.5,
            y: 0.5,
            radius: f64::INFINITY,
        });
        assert!(guide.validate().is_err());

        guide.lighting.highlights[0] = LightSpot {
            x: f64::NAN,
            y: 0.5,
            radius: 3.0,
        };
        assert!(guide.validate().is_err());

        guide.lighting.highlights[0].x = 0.25;
        assert!(guide.validate().is_ok());
    }

    #[test]
    fn test_placement_rect_contains() {
        let rect = PlacementRect {
            x: -2,
            y: 3,
            width: 4,
            height: 2,
        };
        assert!(rect.contains(0, 3));
        assert!(rect.contains(1, 4));
        assert!(!rect.contains(2, 4));
        assert!(!rect.contains(0, 5));
    }
}
