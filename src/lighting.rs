//! Synthetic soft shadows and highlights
//!
//! Each light spot is a filled circle blurred with a kernel spanning its
//! diameter. Shadow and highlight spots accumulate into two masks, each
//! rescaled so its strongest point darkens (or brightens) by half.

use crate::{
    config::LightingConfig,
    types::{LightInfo, LightSpot, LightingSpec, LightingStyle},
    utils::filters::{gaussian_blur, normalize_min_max, to_u8},
};
use image::{ImageBuffer, Luma, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use ndarray::Array2;

/// Strongest shadow darkening and highlight brightening
const MASK_CEILING: f32 = 0.5;

impl LightingSpec {
    /// One shadow and one highlight on opposite sides of the product center
    /// along the scene light direction, with default proportions
    #[must_use]
    pub fn from_light(light: &LightInfo, product_height: u32) -> Self {
        Self::from_light_with(light, product_height, &LightingConfig::default())
    }

    /// Like [`LightingSpec::from_light`] with explicit proportions
    #[must_use]
    pub fn from_light_with(light: &LightInfo, product_height: u32, config: &LightingConfig) -> Self {
        let (dx, dy) = light.direction;
        let offset = f64::from(config.offset);
        let (dx, dy) = (f64::from(dx) * offset, f64::from(dy) * offset);
        let height = f64::from(product_height);

        Self {
            shadows: vec![LightSpot {
                x: 0.5 + dx,
                y: 0.5 + dy,
                radius: (height * f64::from(config.shadow_radius)).floor(),
            }],
            highlights: vec![LightSpot {
                x: 0.5 - dx,
                y: 0.5 - dy,
                radius: (height * f64::from(config.highlight_radius)).floor(),
            }],
        }
    }

    /// Append the spots carried by a style guide
    #[must_use]
    pub fn with_style_spots(mut self, style: &LightingStyle) -> Self {
        self.shadows.extend_from_slice(&style.shadows);
        self.highlights.extend_from_slice(&style.highlights);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shadows.is_empty() && self.highlights.is_empty()
    }
}

/// Paints a [`LightingSpec`] onto images
pub struct LightingSynthesizer;

impl LightingSynthesizer {
    /// Shade the color channels; alpha passes through unchanged
    #[must_use]
    pub fn apply(image: &RgbaImage, spec: &LightingSpec) -> RgbaImage {
        let (width, height) = image.dimensions();
        let (shadow, highlight) = Self::masks(width, height, spec);

        RgbaImage::from_fn(width, height, |x, y| {
            let pixel = image.get_pixel(x, y);
            let idx = (y as usize, x as usize);
            let [r, g, b] = shade([pixel[0], pixel[1], pixel[2]], shadow[idx], highlight[idx]);
            Rgba([r, g, b, pixel[3]])
        })
    }

    /// Shadow and highlight masks in [0, 0.5]
    #[must_use]
    pub fn masks(width: u32, height: u32, spec: &LightingSpec) -> (Array2<f32>, Array2<f32>) {
        (
            accumulate(width, height, &spec.shadows),
            accumulate(width, height, &spec.highlights),
        )
    }
}

fn shade(color: [u8; 3], shadow: f32, highlight: f32) -> [u8; 3] {
    color.map(|c| {
        let c = f32::from(c);
        to_u8(c * (1.0 - shadow) + (255.0 - c) * highlight)
    })
}

fn accumulate(width: u32, height: u32, spots: &[LightSpot]) -> Array2<f32> {
    let mut total = Array2::<f32>::zeros((height as usize, width as usize));
    if width == 0 || height == 0 {
        return total;
    }

    // Discs wider than the diagonal already cover the image
    let diagonal = f64::from(width).hypot(f64::from(height)).ceil();

    for spot in spots {
        let radius = spot.radius.min(diagonal) as i32;
        if radius <= 0 {
            continue;
        }
        let center = (
            (spot.x * f64::from(width)) as i32,
            (spot.y * f64::from(height)) as i32,
        );

        let mut canvas: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::new(width, height);
        draw_filled_circle_mut(&mut canvas, center, radius, Luma([1.0]));
        let disc = Array2::from_shape_vec((height as usize, width as usize), canvas.into_raw())
            .unwrap_or_else(|_| Array2::zeros((height as usize, width as usize)));

        let kernel = 2 * radius as usize + 1;
        total += &gaussian_blur(&disc, kernel, radius as f32 / 3.0);
    }

    normalize_min_max(&total, 0.0, MASK_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered_spec(shadow: bool, radius: f64) -> LightingSpec {
        let spot = LightSpot {
            x: 0.5,
            y: 0.5,
            radius,
        };
        if shadow {
            LightingSpec {
                shadows: vec![spot],
                highlights: vec![],
            }
        } else {
            LightingSpec {
                shadows: vec![],
                highlights: vec![spot],
            }
        }
    }

    #[test]
    fn test_empty_spec_is_identity() {
        let image = RgbaImage::from_fn(8, 6, |x, y| Rgba([x as u8 * 20, y as u8 * 30, 90, 128]));
        assert_eq!(LightingSynthesizer::apply(&image, &LightingSpec::default()), image);
    }

    #[test]
    fn test_shadow_halves_center() {
        let image = RgbaImage::from_pixel(64, 64, Rgba([200, 200, 200, 255]));
        let lit = LightingSynthesizer::apply(&image, &centered_spec(true, 10.0));

        assert_eq!(lit.get_pixel(32, 32).0, [100, 100, 100, 255]);
        assert_eq!(lit.get_pixel(0, 0).0, [200, 200, 200, 255]);
    }

    #[test]
    fn test_highlight_brightens_center() {
        let image = RgbaImage::from_pixel(64, 64, Rgba([101, 101, 101, 255]));
        let lit = LightingSynthesizer::apply(&image, &centered_spec(false, 10.0));

        assert_eq!(lit.get_pixel(32, 32).0, [178, 178, 178, 255]);
        assert_eq!(lit.get_pixel(63, 0).0, [101, 101, 101, 255]);
    }

    #[test]
    fn test_alpha_preserved_and_zero_radius_skipped() {
        let image = RgbaImage::from_fn(16, 16, |x, _| Rgba([150, 150, 150, x as u8 * 16]));
        let lit = LightingSynthesizer::apply(&image, &centered_spec(true, 4.0));
        for (a, b) in image.pixels().zip(lit.pixels()) {
            assert_eq!(a[3], b[3]);
        }

        assert_eq!(LightingSynthesizer::apply(&image, &centered_spec(true, 0.4)), image);
    }

    #[test]
    fn test_contribution_bounded_by_ceiling() {
        let image = RgbaImage::from_fn(40, 30, |x, y| Rgba([(x * 6) as u8, (y * 8) as u8, 128, 255]));
        let spec = LightingSpec {
            shadows: vec![
                LightSpot { x: 0.3, y: 0.4, radius: 8.0 },
                LightSpot { x: 0.35, y: 0.45, radius: 6.0 },
            ],
            highlights: vec![LightSpot { x: 0.7, y: 0.6, radius: 9.0 }],
        };

        let (shadow, highlight) = LightingSynthesizer::masks(40, 30, &spec);
        assert!(shadow.iter().chain(highlight.iter()).all(|&v| (0.0..=0.5).contains(&v)));

        let lit = LightingSynthesizer::apply(&image, &spec);
        for (a, b) in image.pixels().zip(lit.pixels()) {
            for c in 0..3 {
                let input = f32::from(a[c]);
                let output = f32::from(b[c]);
                assert!(output >= input * 0.5 - 1.0);
                assert!(output <= input + (255.0 - input) * 0.5 + 1.0);
            }
        }
    }

    #[test]
    fn test_from_light_positions() {
        let light = LightInfo::from_gradient_moments(1.0, 0.0, 1.0);
        let spec = LightingSpec::from_light(&light, 100);

        let shadow = spec.shadows[0];
        assert!((shadow.x - 0.6).abs() < 1e-6);
        assert!((shadow.y - 0.5).abs() < 1e-6);
        assert_eq!(shadow.radius, 30.0);

        let highlight = spec.highlights[0];
        assert!((highlight.x - 0.4).abs() < 1e-6);
        assert_eq!(highlight.radius, 20.0);
    }

    #[test]
    fn test_style_spots_appended() {
        let style = LightingStyle {
            brightness: 0.5,
            contrast: 0.2,
            direction: crate::types::LightDirection::default(),
            highlights: vec![],
            shadows: vec![LightSpot { x: 0.1, y: 0.9, radius: 3.0 }],
        };
        let light = LightInfo::from_gradient_moments(0.0, 1.0, 1.0);
        let spec = LightingSpec::from_light(&light, 10).with_style_spots(&style);

        assert_eq!(spec.shadows.len(), 2);
        assert_eq!(spec.highlights.len(), 1);
        assert!(!spec.is_empty());
        assert!(LightingSpec::default().is_empty());
    }

    #[test]
    fn test_huge_radius_is_capped_at_diagonal() {
        let image = RgbaImage::from_fn(40, 40, |x, y| Rgba([x as u8 * 6, y as u8 * 6, 90, 255]));

        let huge = LightingSynthesizer::apply(&image, &centered_spec(true, 1e9));
        // ceil(hypot(40, 40)) = 57
        let capped = LightingSynthesizer::apply(&image, &centered_spec(true, 57.0));
        assert_eq!(huge, capped);
    }
}
