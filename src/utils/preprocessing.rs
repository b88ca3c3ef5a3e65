//! Model input preparation and output restoration
//!
//! Both models take a square letterboxed tensor. The same geometry is used
//! afterwards to crop the padded border off the model output and bring it
//! back to the source resolution.

use crate::{
    error::{CompositeError, Result},
    models::PreprocessingConfig,
    utils::filters::resize_array,
};
use image::{ImageBuffer, RgbImage};
use ndarray::{s, Array2, Array4};

/// Where the resized image sits inside the square model canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LetterboxGeometry {
    pub target_size: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl LetterboxGeometry {
    /// Longer side scaled to `target_size`, shorter side proportional, centered
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn fit(width: u32, height: u32, target_size: u32) -> Self {
        let scale = f64::from(target_size) / f64::from(width.max(height).max(1));
        let scaled_width = ((f64::from(width) * scale).round() as u32).clamp(1, target_size);
        let scaled_height = ((f64::from(height) * scale).round() as u32).clamp(1, target_size);

        Self {
            target_size,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            scaled_width,
            scaled_height,
        }
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Letterbox an image into a normalized NCHW tensor
    ///
    /// Padding is black before normalization.
    ///
    /// # Errors
    /// - Empty input image or zero target size
    pub fn letterbox(
        image: &RgbImage,
        config: &PreprocessingConfig,
    ) -> Result<(Array4<f32>, LetterboxGeometry)> {
        let target_size = config.target_size[0];
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || target_size == 0 {
            return Err(CompositeError::processing(format!(
                "Cannot letterbox a {width}x{height} image to {target_size}x{target_size}"
            )));
        }

        let geometry = LetterboxGeometry::fit(width, height, target_size);
        let resized = image::imageops::resize(
            image,
            geometry.scaled_width,
            geometry.scaled_height,
            image::imageops::FilterType::Triangle,
        );

        let mut canvas: RgbImage =
            ImageBuffer::from_pixel(target_size, target_size, image::Rgb([0, 0, 0]));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(geometry.offset_x),
            i64::from(geometry.offset_y),
        );

        Ok((Self::canvas_to_tensor(&canvas, config), geometry))
    }

    /// Convert canvas to normalized tensor
    fn canvas_to_tensor(canvas: &RgbImage, config: &PreprocessingConfig) -> Array4<f32> {
        let size = canvas.width() as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for (x, y, pixel) in canvas.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (f32::from(pixel[c]) / 255.0
                    - config.normalization_mean[c])
                    / config.normalization_std[c];
            }
        }

        tensor
    }

    /// Crop the letterboxed region out of a single-channel model output and
    /// resize it bilinearly to `width x height`
    ///
    /// The output may be at a different resolution than the input canvas;
    /// the geometry is rescaled accordingly.
    ///
    /// # Errors
    /// - Empty output tensor
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn restore_map(
        output: &Array4<f32>,
        geometry: &LetterboxGeometry,
        width: u32,
        height: u32,
    ) -> Result<Array2<f32>> {
        let (_, channels, out_h, out_w) = output.dim();
        if channels == 0 || out_h == 0 || out_w == 0 {
            return Err(CompositeError::inference(format!(
                "Model output {:?} has no spatial extent",
                output.dim()
            )));
        }

        let scale_x = out_w as f64 / f64::from(geometry.target_size);
        let scale_y = out_h as f64 / f64::from(geometry.target_size);
        let x0 = ((f64::from(geometry.offset_x) * scale_x).round() as usize).min(out_w - 1);
        let y0 = ((f64::from(geometry.offset_y) * scale_y).round() as usize).min(out_h - 1);
        let crop_w = ((f64::from(geometry.scaled_width) * scale_x).round() as usize)
            .clamp(1, out_w - x0);
        let crop_h = ((f64::from(geometry.scaled_height) * scale_y).round() as usize)
            .clamp(1, out_h - y0);

        let cropped = output
            .slice(s![0, 0, y0..y0 + crop_h, x0..x0 + crop_w])
            .to_owned();

        Ok(resize_array(&cropped, width, height))
    }
}
