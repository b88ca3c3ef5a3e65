//! Scene compositor CLI tool
//!
//! Command-line interface for compositing product photos into generated scenes
//! with ONNX Runtime and Tract model backends.

#[cfg(feature = "cli")]
use scene_compositor::cli;

#[cfg(feature = "cli")]
fn main() -> std::process::ExitCode {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
