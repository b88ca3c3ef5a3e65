//! Classical foreground extraction by iterated color-model energy minimization
//!
//! A seed rectangle marks everything outside it as definite background and
//! everything inside as probable foreground. Each round fits one Gaussian
//! mixture per side to the current labeling and relabels the probable pixels
//! with a minimum cut of the color likelihoods plus a contrast-sensitive
//! Potts smoothness term over the 4-neighborhood.

use super::graph::FlowGraph;
use crate::{
    config::ClassicalConfig,
    utils::{
        filters::bilateral_filter,
        kmeans::{kmeans, KMeansParams},
    },
};
use image::{GrayImage, Luma, RgbImage};
use ndarray::Array2;
use std::f32::consts::PI;

/// Lower bound on per-channel variance
const VARIANCE_FLOOR: f32 = 0.01;
/// Samples used to fit each color model
const MAX_FIT_SAMPLES: usize = 20_000;
/// Terminal capacity that pins definite labels
const HARD_CONSTRAINT: f64 = 1e9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    /// Outside the seed rectangle, never relabeled
    Background,
    ProbableBackground,
    ProbableForeground,
}

impl Label {
    fn is_foreground(self) -> bool {
        self == Self::ProbableForeground
    }
}

/// Diagonal-covariance Gaussian mixture over RGB
#[derive(Debug, Clone)]
struct GaussianMixture {
    log_weights: Vec<f32>,
    means: Vec<[f32; 3]>,
    variances: Vec<[f32; 3]>,
}

impl GaussianMixture {
    /// Fit with k-means initialization followed by per-cluster moments
    fn fit(samples: &[[f32; 3]], components: usize, seed: u64) -> Option<Self> {
        let params = KMeansParams {
            clusters: components,
            max_iterations: 10,
            epsilon: 0.5,
            attempts: 1,
            seed,
        };
        let clustering = kmeans(samples, &params)?;
        let k = clustering.centers.len();

        let mut counts = vec![0usize; k];
        let mut sums = vec![[0.0_f64; 3]; k];
        let mut squares = vec![[0.0_f64; 3]; k];
        for (&label, sample) in clustering.labels.iter().zip(samples) {
            counts[label] += 1;
            for c in 0..3 {
                let v = f64::from(sample[c]);
                sums[label][c] += v;
                squares[label][c] += v * v;
            }
        }

        let total = samples.len() as f32;
        let mut mixture = Self {
            log_weights: Vec::with_capacity(k),
            means: Vec::with_capacity(k),
            variances: Vec::with_capacity(k),
        };

        for i in 0..k {
            if counts[i] == 0 {
                continue;
            }
            let n = counts[i] as f64;
            let mean = sums[i].map(|s| s / n);
            let mut variance = [0.0_f32; 3];
            for c in 0..3 {
                variance[c] = ((squares[i][c] / n - mean[c] * mean[c]) as f32).max(VARIANCE_FLOOR);
            }
            mixture.log_weights.push((counts[i] as f32 / total).ln());
            mixture.means.push(mean.map(|m| m as f32));
            mixture.variances.push(variance);
        }

        Some(mixture)
    }

    /// `-ln p(x)`, evaluated with log-sum-exp over the components
    fn neg_log_likelihood(&self, x: &[f32; 3]) -> f32 {
        let log_terms: Vec<f32> = (0..self.means.len())
            .map(|i| {
                let mut log_density = -1.5 * (2.0 * PI).ln();
                for c in 0..3 {
                    let d = x[c] - self.means[i][c];
                    let var = self.variances[i][c];
                    log_density -= 0.5 * (d * d / var + var.ln());
                }
                self.log_weights[i] + log_density
            })
            .collect();

        let max = log_terms.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !max.is_finite() {
            return f32::MAX;
        }
        let sum: f32 = log_terms.iter().map(|t| (t - max).exp()).sum();
        -(max + sum.ln())
    }
}

/// Margin along one side; small sides keep a quarter of their length
fn side_margin(len: u32, margin: u32) -> u32 {
    if len <= 2 * margin {
        len / 4
    } else {
        margin
    }
}

fn pixel_vec(image: &RgbImage, x: u32, y: u32) -> [f32; 3] {
    image.get_pixel(x, y).0.map(f32::from)
}

fn squared_color_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (0..3).map(|c| (a[c] - b[c]) * (a[c] - b[c])).sum()
}

/// Every `stride`-th sample so at most `MAX_FIT_SAMPLES` remain
fn subsample(samples: Vec<[f32; 3]>) -> Vec<[f32; 3]> {
    if samples.len() <= MAX_FIT_SAMPLES {
        return samples;
    }
    let stride = samples.len().div_ceil(MAX_FIT_SAMPLES);
    samples.into_iter().step_by(stride).collect()
}

/// Binary foreground mask (0 or 255) of `image`
#[must_use]
pub fn segment(image: &RgbImage, config: &ClassicalConfig) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }

    let source = if config.presmooth {
        bilateral_filter(image, 9, 75.0, 75.0)
    } else {
        image.clone()
    };

    let mx = side_margin(width, config.margin);
    let my = side_margin(height, config.margin);
    let mut labels = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        let (x, y) = (x as u32, y as u32);
        if x >= mx && x < width - mx && y >= my && y < height - my {
            Label::ProbableForeground
        } else {
            Label::Background
        }
    });

    let (right_weights, down_weights) = smoothness_weights(&source, config.smoothness);

    for round in 0..config.iterations {
        let mut fg_samples = Vec::new();
        let mut bg_samples = Vec::new();
        for ((y, x), label) in labels.indexed_iter() {
            let sample = pixel_vec(&source, x as u32, y as u32);
            if label.is_foreground() {
                fg_samples.push(sample);
            } else {
                bg_samples.push(sample);
            }
        }

        if fg_samples.is_empty() || bg_samples.is_empty() {
            log::debug!("Classical extraction stopped at round {round}: one side is empty");
            break;
        }

        let seed = u64::from(round);
        let (Some(fg_model), Some(bg_model)) = (
            GaussianMixture::fit(&subsample(fg_samples), config.components, seed),
            GaussianMixture::fit(&subsample(bg_samples), config.components, seed),
        ) else {
            break;
        };

        let fg_cost = Array2::from_shape_fn(labels.dim(), |(y, x)| {
            fg_model.neg_log_likelihood(&pixel_vec(&source, x as u32, y as u32))
        });
        let bg_cost = Array2::from_shape_fn(labels.dim(), |(y, x)| {
            bg_model.neg_log_likelihood(&pixel_vec(&source, x as u32, y as u32))
        });

        let changed = relabel(
            &mut labels,
            &fg_cost,
            &bg_cost,
            &right_weights,
            &down_weights,
        );
        log::trace!("Classical extraction round {round}: {changed} labels changed");
        if changed == 0 {
            break;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let label = labels[[y as usize, x as usize]];
        Luma([if label.is_foreground() { 255 } else { 0 }])
    })
}

/// Pairwise Potts weights to the right and lower neighbor of each pixel
fn smoothness_weights(image: &RgbImage, gamma: f32) -> (Array2<f32>, Array2<f32>) {
    let (width, height) = image.dimensions();
    let shape = (height as usize, width as usize);

    let mut total = 0.0_f64;
    let mut pairs = 0usize;
    for (x, y, pixel) in image.enumerate_pixels() {
        let color = pixel.0.map(f32::from);
        if x + 1 < width {
            total += f64::from(squared_color_distance(&color, &pixel_vec(image, x + 1, y)));
            pairs += 1;
        }
        if y + 1 < height {
            total += f64::from(squared_color_distance(&color, &pixel_vec(image, x, y + 1)));
            pairs += 1;
        }
    }

    let mean = if pairs > 0 { total / pairs as f64 } else { 0.0 };
    let beta = if mean > 0.0 { (0.5 / mean) as f32 } else { 0.0 };

    let weight = |a: &[f32; 3], b: &[f32; 3]| gamma * (-beta * squared_color_distance(a, b)).exp();
    let right = Array2::from_shape_fn(shape, |(y, x)| {
        let (x, y) = (x as u32, y as u32);
        if x + 1 < width {
            weight(&pixel_vec(image, x, y), &pixel_vec(image, x + 1, y))
        } else {
            0.0
        }
    });
    let down = Array2::from_shape_fn(shape, |(y, x)| {
        let (x, y) = (x as u32, y as u32);
        if y + 1 < height {
            weight(&pixel_vec(image, x, y), &pixel_vec(image, x, y + 1))
        } else {
            0.0
        }
    });

    (right, down)
}

/// Minimum-cut relabeling of the probable pixels; returns how many changed
fn relabel(
    labels: &mut Array2<Label>,
    fg_cost: &Array2<f32>,
    bg_cost: &Array2<f32>,
    right: &Array2<f32>,
    down: &Array2<f32>,
) -> usize {
    let (rows, cols) = labels.dim();
    let node = |y: usize, x: usize| y * cols + x;
    let mut graph = FlowGraph::new(rows * cols);

    for ((y, x), label) in labels.indexed_iter() {
        // Source side is foreground
        let (to_source, to_sink) = match label {
            Label::Background => (0.0, HARD_CONSTRAINT),
            _ => (f64::from(bg_cost[[y, x]]), f64::from(fg_cost[[y, x]])),
        };
        graph.add_terminal(node(y, x), to_source, to_sink);

        if x + 1 < cols {
            graph.add_edge(node(y, x), node(y, x + 1), f64::from(right[[y, x]]));
        }
        if y + 1 < rows {
            graph.add_edge(node(y, x), node(y + 1, x), f64::from(down[[y, x]]));
        }
    }

    let flow = graph.max_flow();
    log::trace!("Minimum cut value {flow:.1}");
    let foreground = graph.source_side();

    let mut changed = 0;
    for ((y, x), label) in labels.indexed_iter_mut() {
        if *label == Label::Background {
            continue;
        }
        let next = if foreground[node(y, x)] {
            Label::ProbableForeground
        } else {
            Label::ProbableBackground
        };
        if next != *label {
            *label = next;
            changed += 1;
        }
    }

    changed
}
