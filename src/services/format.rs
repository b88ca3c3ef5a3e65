//! Output format handling service
//!
//! The composite is always an opaque RGB image; the format only decides the
//! encoder and whether a quality setting applies.

use crate::error::{CompositeError, Result};
use std::path::Path;

/// Encoders available for the composited scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    #[cfg(feature = "webp-support")]
    WebP,
    Tiff,
}

/// Service for mapping output paths to encoders
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Pick the encoder from the file extension (case-insensitive)
    ///
    /// # Examples
    /// ```rust
    /// use scene_compositor::services::{OutputFormat, OutputFormatHandler};
    ///
    /// let format = OutputFormatHandler::from_path("out/scene.JPG").unwrap();
    /// assert_eq!(format, OutputFormat::Jpeg);
    /// assert!(OutputFormatHandler::from_path("scene.gif").is_err());
    /// ```
    ///
    /// # Errors
    /// - `InvalidConfig` for a missing or unsupported extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<OutputFormat> {
        let path_ref = path.as_ref();
        let extension = path_ref
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            #[cfg(feature = "webp-support")]
            "webp" => Ok(OutputFormat::WebP),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            _ => Err(CompositeError::invalid_config(format!(
                "Unsupported output extension '{}' for '{}'. Use png, jpg, tiff{}",
                extension,
                path_ref.display(),
                if cfg!(feature = "webp-support") {
                    " or webp"
                } else {
                    ""
                }
            ))),
        }
    }

    /// Get the canonical file extension for a given output format
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            #[cfg(feature = "webp-support")]
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
        }
    }

    /// Corresponding `image` crate format
    #[must_use]
    pub fn image_format(format: OutputFormat) -> image::ImageFormat {
        match format {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            #[cfg(feature = "webp-support")]
            OutputFormat::WebP => image::ImageFormat::WebP,
            OutputFormat::Tiff => image::ImageFormat::Tiff,
        }
    }
}
