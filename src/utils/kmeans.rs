//! Seeded k-means over 3-component samples
//!
//! Used for dominant-color extraction and for initializing the color models
//! of the classical foreground extractor.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

/// Termination and restart settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    pub clusters: usize,
    pub max_iterations: u32,
    /// Stop once every center moves less than this
    pub epsilon: f32,
    pub attempts: u32,
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            clusters: 5,
            max_iterations: 10,
            epsilon: 1.0,
            attempts: 10,
            seed: 0,
        }
    }
}

/// Result of the best attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub centers: Vec<[f32; 3]>,
    /// Cluster index per input sample
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centers
    pub compactness: f64,
}

impl Clustering {
    /// Number of samples per cluster
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centers.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

#[must_use]
pub fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (0..3).map(|c| (a[c] - b[c]) * (a[c] - b[c])).sum()
}

fn nearest(point: &[f32; 3], centers: &[[f32; 3]]) -> (usize, f32) {
    centers
        .iter()
        .enumerate()
        .map(|(i, center)| (i, squared_distance(point, center)))
        .fold((0, f32::INFINITY), |best, candidate| {
            if candidate.1 < best.1 {
                candidate
            } else {
                best
            }
        })
}

/// Cluster `points` into at most `params.clusters` groups.
///
/// Returns `None` for an empty input. The number of clusters is reduced to
/// the number of samples when fewer are available.
#[must_use]
pub fn kmeans(points: &[[f32; 3]], params: &KMeansParams) -> Option<Clustering> {
    if points.is_empty() {
        return None;
    }

    let k = params.clusters.clamp(1, points.len());
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<Clustering> = None;

    for attempt in 0..params.attempts.max(1) {
        let mut centers: Vec<[f32; 3]> = index::sample(&mut rng, points.len(), k)
            .into_iter()
            .map(|i| points[i])
            .collect();
        let mut labels = vec![0usize; points.len()];

        for _ in 0..params.max_iterations.max(1) {
            for (label, point) in labels.iter_mut().zip(points) {
                *label = nearest(point, &centers).0;
            }

            let mut sums = vec![[0.0_f64; 3]; k];
            let mut counts = vec![0usize; k];
            for (&label, point) in labels.iter().zip(points) {
                counts[label] += 1;
                for c in 0..3 {
                    sums[label][c] += f64::from(point[c]);
                }
            }

            let mut max_shift = 0.0_f32;
            for (i, center) in centers.iter_mut().enumerate() {
                // Empty clusters keep their previous center
                if counts[i] == 0 {
                    continue;
                }
                let updated = sums[i].map(|s| (s / counts[i] as f64) as f32);
                max_shift = max_shift.max(squared_distance(center, &updated).sqrt());
                *center = updated;
            }

            if max_shift < params.epsilon {
                break;
            }
        }

        let mut compactness = 0.0_f64;
        for (label, point) in labels.iter_mut().zip(points) {
            let (index, distance) = nearest(point, &centers);
            *label = index;
            compactness += f64::from(distance);
        }

        log::trace!("k-means attempt {attempt}: compactness {compactness:.1}");

        if best
            .as_ref()
            .map_or(true, |current| compactness < current.compactness)
        {
            best = Some(Clustering {
                centers,
                labels,
                compactness,
            });
        }
    }

    best
}
