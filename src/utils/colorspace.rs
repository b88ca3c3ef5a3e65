//! CIELAB conversions for whole images
//!
//! L is kept in [0, 100] inside `LabImage`; `lightness_u8` rescales it to the
//! 8-bit range used for histograms and luminance statistics.

use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::Array2;
use palette::{FromColor, IntoColor, Lab, LinSrgb, Srgb};

/// Planar float Lab image, rows index y
#[derive(Debug, Clone, PartialEq)]
pub struct LabImage {
    pub l: Array2<f32>,
    pub a: Array2<f32>,
    pub b: Array2<f32>,
}

impl LabImage {
    #[must_use]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let shape = (height as usize, width as usize);
        let mut l = Array2::zeros(shape);
        let mut a = Array2::zeros(shape);
        let mut b = Array2::zeros(shape);

        for (x, y, pixel) in image.enumerate_pixels() {
            let lab = rgb_to_lab(pixel.0);
            let idx = (y as usize, x as usize);
            l[idx] = lab.l;
            a[idx] = lab.a;
            b[idx] = lab.b;
        }

        Self { l, a, b }
    }

    /// Convert back to 8-bit sRGB, clamping out-of-gamut values
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        let (rows, cols) = self.l.dim();
        RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
            let idx = (y as usize, x as usize);
            Rgb(lab_to_rgb(Lab::new(self.l[idx], self.a[idx], self.b[idx])))
        })
    }

    #[must_use]
    pub fn channels(&self) -> [&Array2<f32>; 3] {
        [&self.l, &self.a, &self.b]
    }

    pub fn channels_mut(&mut self) -> [&mut Array2<f32>; 3] {
        [&mut self.l, &mut self.a, &mut self.b]
    }

    /// Lightness rescaled to [0, 255] and rounded
    #[must_use]
    pub fn lightness_u8(&self) -> GrayImage {
        let (rows, cols) = self.l.dim();
        GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
            Luma([lightness_to_u8(self.l[[y as usize, x as usize]])])
        })
    }
}

#[must_use]
pub fn rgb_to_lab(rgb: [u8; 3]) -> Lab {
    let srgb: Srgb<f32> = Srgb::new(
        f32::from(rgb[0]) / 255.0,
        f32::from(rgb[1]) / 255.0,
        f32::from(rgb[2]) / 255.0,
    );
    let lin: LinSrgb<f32> = srgb.into_linear();
    Lab::from_color(lin)
}

#[must_use]
pub fn lab_to_rgb(lab: Lab) -> [u8; 3] {
    let lin: LinSrgb<f32> = lab.into_color();
    let srgb: Srgb<f32> = Srgb::from_linear(lin);
    [srgb.red, srgb.green, srgb.blue].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Map L in [0, 100] onto [0, 255]
#[must_use]
pub fn lightness_to_u8(l: f32) -> u8 {
    (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8
}

/// Map an 8-bit lightness back onto [0, 100]
#[must_use]
pub fn lightness_from_u8(value: u8) -> f32 {
    f32::from(value) * 100.0 / 255.0
}

/// 8-bit lightness of an sRGB image
#[must_use]
pub fn lightness_channel(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([lightness_to_u8(rgb_to_lab(image.get_pixel(x, y).0).l)])
    })
}
