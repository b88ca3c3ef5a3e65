//! Image I/O operations service
//!
//! This module separates file I/O operations from the compositing stages,
//! which only ever see decoded buffers.

use crate::{
    error::{CompositeError, Result},
    services::format::{OutputFormat, OutputFormatHandler},
};
use image::{DynamicImage, RgbImage};
use std::{fs::File, io::BufWriter, path::Path};

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// The extension picks the decoder first; when that fails the file
    /// content is sniffed instead.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use scene_compositor::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("scene.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - `Load` when the file is missing or cannot be decoded
    /// - `Io` when the file exists but cannot be read
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(CompositeError::load(format!(
                "'{}': file does not exist",
                path_ref.display()
            )));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    CompositeError::file_io_error("read image data", path_ref, &io_err)
                })?;

                Self::load_from_bytes(&data)
                    .map_err(|_| CompositeError::image_load_error(path_ref, &e))
            },
        }
    }

    /// Decode an image from memory with content-based format detection
    ///
    /// # Errors
    /// - `Load` when the bytes are not a supported image
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| CompositeError::load(format!("Failed to decode image from bytes: {e}")))
    }

    /// Save a composited scene, picking the encoder from the file extension
    ///
    /// Parent directories are created as needed. `jpeg_quality` only applies
    /// to JPEG output.
    ///
    /// # Errors
    /// - `InvalidConfig` for an unsupported extension
    /// - `Io` when the file or its directory cannot be created
    /// - `Processing` when encoding fails
    pub fn save_image<P: AsRef<Path>>(image: &RgbImage, path: P, jpeg_quality: u8) -> Result<()> {
        let path_ref = path.as_ref();
        let format = OutputFormatHandler::from_path(path_ref)?;

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CompositeError::file_io_error("create output directory", parent, &e)
            })?;
        }

        let result = if format == OutputFormat::Jpeg {
            let file = File::create(path_ref)
                .map_err(|e| CompositeError::file_io_error("create output file", path_ref, &e))?;
            let mut writer = BufWriter::new(file);
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, jpeg_quality);
            encoder.encode_image(image)
        } else {
            image.save_with_format(path_ref, OutputFormatHandler::image_format(format))
        };

        result.map_err(|e| {
            CompositeError::processing_stage_error(
                "image save",
                &e.to_string(),
                Some(&format!(
                    "format: {}, path: {}",
                    OutputFormatHandler::get_extension(format),
                    path_ref.display()
                )),
            )
        })?;

        log::debug!(
            "Saved {}x{} image to {}",
            image.width(),
            image.height(),
            path_ref.display()
        );
        Ok(())
    }
}
