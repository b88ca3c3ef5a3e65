//! Color matching of the product against the scene
//!
//! Statistics transfer in CIELAB moves the product's color cast toward the
//! scene; a histogram match of the lightness channel then pulls its tonal
//! distribution onto the scene's.

use crate::{
    types::LightingStyle,
    utils::{
        colorspace::{lightness_channel, lightness_from_u8},
        LabImage,
    },
};
use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use ndarray::Array2;

const LEVELS: usize = 256;

/// Color statistics matching between product and scene
pub struct ColorMatcher;

impl ColorMatcher {
    /// Reinhard transfer: shift and scale each Lab channel of `source` to the
    /// mean and standard deviation of `target`
    ///
    /// A channel with zero spread in `source` is only shifted.
    #[must_use]
    pub fn transfer(source: &RgbImage, target: &RgbImage) -> RgbImage {
        if source.is_empty() || target.is_empty() {
            return source.clone();
        }

        let mut lab = LabImage::from_rgb(source);
        let target_lab = LabImage::from_rgb(target);

        for (channel, reference) in lab.channels_mut().into_iter().zip(target_lab.channels()) {
            let (src_mean, src_std) = mean_std(channel);
            let (dst_mean, dst_std) = mean_std(reference);
            let scale = if src_std > f32::EPSILON {
                dst_std / src_std
            } else {
                1.0
            };
            channel.mapv_inplace(|v| (v - src_mean) * scale + dst_mean);
        }

        lab.to_rgb()
    }

    /// Remap `source` levels so its cumulative histogram follows `target`'s
    ///
    /// Each level's CDF value is located in the target CDF by linear
    /// interpolation between neighboring levels; an exact hit maps to the
    /// first level with that CDF value. Fractional levels are truncated.
    #[must_use]
    pub fn match_histogram(source: &GrayImage, target: &GrayImage) -> GrayImage {
        if source.is_empty() || target.is_empty() {
            return source.clone();
        }

        let source_cdf = cumulative_histogram(source);
        let target_cdf = cumulative_histogram(target);

        let mut lookup = [0u8; LEVELS];
        for (level, entry) in lookup.iter_mut().enumerate() {
            *entry = interpolate_level(source_cdf[level], &target_cdf);
        }

        GrayImage::from_fn(source.width(), source.height(), |x, y| {
            Luma([lookup[usize::from(source.get_pixel(x, y)[0])]])
        })
    }

    /// Bring a cut-out product into the scene's color space
    ///
    /// Colors are transferred toward the scene, lightness is scaled by the
    /// style's contrast and offset by its brightness, then histogram matched
    /// to the scene's lightness. Alpha passes through unchanged.
    #[must_use]
    pub fn adapt(product: &RgbaImage, scene: &RgbImage, lighting: &LightingStyle) -> RgbaImage {
        let (width, height) = product.dimensions();
        let colors = RgbImage::from_fn(width, height, |x, y| {
            let p = product.get_pixel(x, y);
            Rgb([p[0], p[1], p[2]])
        });

        let transferred = Self::transfer(&colors, scene);
        let mut lab = LabImage::from_rgb(&transferred);

        let contrast = lighting.contrast as f32;
        let offset = (lighting.brightness * 255.0) as f32;
        let lightness = lab.lightness_u8();
        let scaled = GrayImage::from_fn(width, height, |x, y| {
            let v = f32::from(lightness.get_pixel(x, y)[0]) * contrast + offset;
            Luma([v.round().abs().min(255.0) as u8])
        });

        let matched = Self::match_histogram(&scaled, &lightness_channel(scene));
        lab.l = Array2::from_shape_fn(lab.l.dim(), |(y, x)| {
            lightness_from_u8(matched.get_pixel(x as u32, y as u32)[0])
        });

        let adapted = lab.to_rgb();
        RgbaImage::from_fn(width, height, |x, y| {
            let c = adapted.get_pixel(x, y);
            Rgba([c[0], c[1], c[2], product.get_pixel(x, y)[3]])
        })
    }
}

/// Population mean and standard deviation
fn mean_std(values: &Array2<f32>) -> (f32, f32) {
    let count = values.len().max(1) as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|&v| (f64::from(v) - mean).powi(2))
        .sum::<f64>()
        / count;
    (mean as f32, variance.sqrt() as f32)
}

/// Normalized CDF over the 256 levels
fn cumulative_histogram(image: &GrayImage) -> [f64; LEVELS] {
    let mut counts = [0u64; LEVELS];
    for pixel in image.pixels() {
        counts[usize::from(pixel[0])] += 1;
    }

    let total = (image.width() as usize * image.height() as usize).max(1) as f64;
    let mut cdf = [0.0; LEVELS];
    let mut running = 0u64;
    for (slot, count) in cdf.iter_mut().zip(counts) {
        running += count;
        *slot = running as f64 / total;
    }
    cdf
}

fn interpolate_level(value: f64, cdf: &[f64; LEVELS]) -> u8 {
    let Some(upper) = cdf.iter().position(|&c| c >= value) else {
        return u8::MAX;
    };
    if upper == 0 || cdf[upper] == value {
        return upper as u8;
    }

    let lower = upper - 1;
    let span = cdf[upper] - cdf[lower];
    let level = lower as f64 + (value - cdf[lower]) / span;
    level as u8
}
