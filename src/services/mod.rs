//! File-facing services kept apart from the image math

pub mod format;
pub mod io;

pub use format::{OutputFormat, OutputFormatHandler};
pub use io::ImageIOService;
