//! Backend implementations for different inference engines
//!
//! - ONNX Runtime backend (high performance, GPU acceleration)
//! - Tract backend (pure Rust, no external dependencies)

use crate::error::{CompositeError, Result};
use ndarray::Array4;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

// Re-export backends based on enabled features
#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

/// Reshape a raw model output into `(N, C, H, W)`.
///
/// Depth networks commonly drop the channel axis and emit `(N, H, W)`; that
/// layout is promoted to a single channel.
pub(crate) fn output_to_nchw(shape: &[usize], data: Vec<f32>) -> Result<Array4<f32>> {
    let dims = match *shape {
        [n, c, h, w] => (n, c, h, w),
        [n, h, w] => (n, 1, h, w),
        [h, w] => (1, 1, h, w),
        _ => {
            return Err(CompositeError::inference(format!(
                "Expected 2D, 3D or 4D output tensor, got {}D",
                shape.len()
            )))
        },
    };

    Array4::from_shape_vec(dims, data).map_err(|e| {
        CompositeError::inference(format!("Failed to reshape output tensor: {e}"))
    })
}
