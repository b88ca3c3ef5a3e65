//! Separable convolution filters over single-channel float buffers
//!
//! Borders are reflected without repeating the edge sample (`gfedcb|abcdefgh|gfedcba`).
//! Gaussian kernels with a non-positive sigma derive it from the kernel size.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::Array2;

/// Fixed binomial kernels used for small sizes when no sigma is given
const SMALL_GAUSSIAN_TABLES: [&[f32]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[
        0.031_25, 0.109_375, 0.218_75, 0.281_25, 0.218_75, 0.109_375, 0.031_25,
    ],
];

/// Map an out-of-range index back into `0..len`
fn reflect_101(mut index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    while index < 0 || index > last {
        index = if index < 0 { -index } else { 2 * last - index };
    }
    index as usize
}

/// Sigma used for a kernel size when none is given
#[must_use]
pub fn sigma_for_kernel(ksize: usize) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian kernel of odd length `ksize`
#[must_use]
pub fn gaussian_kernel(ksize: usize, sigma: f32) -> Vec<f32> {
    let ksize = ksize.max(1) | 1;
    if sigma <= 0.0 && ksize <= 7 {
        return SMALL_GAUSSIAN_TABLES[ksize / 2].to_vec();
    }

    let sigma = if sigma > 0.0 {
        sigma
    } else {
        sigma_for_kernel(ksize)
    };
    let center = (ksize / 2) as f32;
    let scale = -0.5 / (sigma * sigma);

    let mut kernel: Vec<f32> = (0..ksize)
        .map(|i| {
            let x = i as f32 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Convolve rows with `kx` and columns with `ky`
#[must_use]
pub fn separable_filter(src: &Array2<f32>, kx: &[f32], ky: &[f32]) -> Array2<f32> {
    let (rows, cols) = src.dim();
    if rows == 0 || cols == 0 {
        return src.clone();
    }

    let half_x = (kx.len() / 2) as isize;
    let mut horizontal = Array2::<f32>::zeros((rows, cols));
    for y in 0..rows {
        for x in 0..cols {
            let mut acc = 0.0;
            for (k, weight) in kx.iter().enumerate() {
                let sx = reflect_101(x as isize + k as isize - half_x, cols);
                acc += weight * src[[y, sx]];
            }
            horizontal[[y, x]] = acc;
        }
    }

    let half_y = (ky.len() / 2) as isize;
    let mut out = Array2::<f32>::zeros((rows, cols));
    for y in 0..rows {
        for (k, weight) in ky.iter().enumerate() {
            let sy = reflect_101(y as isize + k as isize - half_y, rows);
            for x in 0..cols {
                out[[y, x]] += weight * horizontal[[sy, x]];
            }
        }
    }
    out
}

/// Gaussian blur with a square `ksize` kernel
#[must_use]
pub fn gaussian_blur(src: &Array2<f32>, ksize: usize, sigma: f32) -> Array2<f32> {
    let kernel = gaussian_kernel(ksize, sigma);
    separable_filter(src, &kernel, &kernel)
}

/// Gaussian blur of an 8-bit image, rounded back to u8
#[must_use]
pub fn gaussian_blur_gray(image: &GrayImage, ksize: usize) -> GrayImage {
    array_to_gray(&gaussian_blur(&gray_to_array(image), ksize, 0.0))
}

/// First derivative along x (`dx = true`) or y, with aperture 3 or 5
#[must_use]
pub fn sobel(src: &Array2<f32>, ksize: usize, dx: bool) -> Array2<f32> {
    let (smooth, derive): (&[f32], &[f32]) = if ksize >= 5 {
        (&[1.0, 4.0, 6.0, 4.0, 1.0], &[-1.0, -2.0, 0.0, 2.0, 1.0])
    } else {
        (&[1.0, 2.0, 1.0], &[-1.0, 0.0, 1.0])
    };

    if dx {
        separable_filter(src, derive, smooth)
    } else {
        separable_filter(src, smooth, derive)
    }
}

/// Edge-preserving smoothing of a color image
///
/// Pixels within a disc of the given diameter are weighted by spatial distance
/// and by the L1 color difference to the center pixel.
#[must_use]
pub fn bilateral_filter(
    image: &RgbImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> RgbImage {
    let (width, height) = image.dimensions();
    let radius = (diameter / 2) as isize;
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2.sqrt() <= radius as f32 {
                offsets.push((dx, dy, (r2 * space_coeff).exp()));
            }
        }
    }

    // Color weights indexed by the summed absolute channel difference
    let color_weights: Vec<f32> = (0..=3 * 255)
        .map(|d| {
            let d = d as f32;
            (d * d * color_coeff).exp()
        })
        .collect();

    ImageBuffer::from_fn(width, height, |x, y| {
        let center = image.get_pixel(x, y).0;
        let mut acc = [0.0_f32; 3];
        let mut norm = 0.0_f32;

        for &(dx, dy, space_weight) in &offsets {
            let sx = reflect_101(x as isize + dx, width as usize) as u32;
            let sy = reflect_101(y as isize + dy, height as usize) as u32;
            let sample = image.get_pixel(sx, sy).0;
            let diff: usize = (0..3)
                .map(|c| usize::from(sample[c].abs_diff(center[c])))
                .sum();
            let weight = space_weight * color_weights[diff];
            for c in 0..3 {
                acc[c] += weight * f32::from(sample[c]);
            }
            norm += weight;
        }

        Rgb(acc.map(|v| to_u8(v / norm)))
    })
}

/// Rescale values linearly to `[lo, hi]`; a constant buffer maps to `lo`
#[must_use]
pub fn normalize_min_max(src: &Array2<f32>, lo: f32, hi: f32) -> Array2<f32> {
    let min = src.iter().copied().fold(f32::INFINITY, f32::min);
    let max = src.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    if !range.is_finite() || range <= f32::EPSILON {
        return Array2::from_elem(src.dim(), lo);
    }

    let scale = (hi - lo) / range;
    let (floor, ceil) = (lo.min(hi), lo.max(hi));
    src.mapv(|v| ((v - min) * scale + lo).clamp(floor, ceil))
}

/// Bilinear resize of a float buffer to `width x height`
///
/// Samples at pixel centers and never clamps values, so unbounded model
/// outputs keep their range.
#[must_use]
pub fn resize_array(src: &Array2<f32>, width: u32, height: u32) -> Array2<f32> {
    let (rows, cols) = src.dim();
    if (cols as u32, rows as u32) == (width, height) {
        return src.clone();
    }
    if rows == 0 || cols == 0 {
        return Array2::zeros((height as usize, width as usize));
    }

    let xs = sample_positions(cols, width as usize);
    let ys = sample_positions(rows, height as usize);

    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        let (y0, y1, ty) = ys[y];
        let (x0, x1, tx) = xs[x];
        let top = lerp(src[[y0, x0]], src[[y0, x1]], tx);
        let bottom = lerp(src[[y1, x0]], src[[y1, x1]], tx);
        lerp(top, bottom, ty)
    })
}

/// Neighbor indices and weight for each output position along one axis
fn sample_positions(src_len: usize, dst_len: usize) -> Vec<(usize, usize, f32)> {
    let scale = src_len as f64 / dst_len.max(1) as f64;
    let last = (src_len - 1) as f64;
    (0..dst_len)
        .map(|i| {
            let pos = ((i as f64 + 0.5) * scale - 0.5).clamp(0.0, last);
            let lower = pos.floor();
            let upper = (lower + 1.0).min(last);
            (lower as usize, upper as usize, (pos - lower) as f32)
        })
        .collect()
}

// Exact at t = 0 and for equal endpoints
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Saturating round to u8
#[must_use]
pub fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[must_use]
pub fn gray_to_array(image: &GrayImage) -> Array2<f32> {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        f32::from(image.get_pixel(x as u32, y as u32)[0])
    })
}

#[must_use]
pub fn array_to_gray(src: &Array2<f32>) -> GrayImage {
    let (rows, cols) = src.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([to_u8(src[[y as usize, x as usize]])])
    })
}
