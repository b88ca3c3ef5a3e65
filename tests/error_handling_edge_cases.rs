//! Error handling and edge case testing
//!
//! Boundary conditions for configuration, file handling and degenerate image
//! sizes that could occur while compositing.

mod common;

use common::{init_logging, product_photo, scene};
use image::{DynamicImage, RgbImage};
use scene_compositor::{
    protocol::{self, Request, Response},
    CompositeConfig, CompositeError, CompositeProcessor, ImageIOService, ModelRegistry, Result,
    StrategyPolicy, StyleGuide,
};
use tempfile::TempDir;

#[test]
fn test_config_value_errors_name_the_parameter() {
    let cases = [
        (
            CompositeConfig::builder().product_scale(1.5).build(),
            "product scale",
        ),
        (
            CompositeConfig::builder().product_scale(0.0).build(),
            "product scale",
        ),
        (
            CompositeConfig::builder().vertical_anchor(-0.1).build(),
            "vertical anchor",
        ),
    ];

    for (result, parameter) in cases {
        let error = result.unwrap_err();
        assert!(matches!(error, CompositeError::InvalidConfig(_)));
        let message = error.to_string();
        assert!(message.contains(parameter), "{message}");
        assert!(message.contains("Recommended"), "{message}");
    }
}

#[test]
fn test_manual_config_validation() {
    let mut config = CompositeConfig::default();
    config.blend.alpha_kernel = 4;
    let message = config.validate().unwrap_err().to_string();
    assert!(message.contains("alpha kernel"));
    assert!(message.contains('4'));

    let mut config = CompositeConfig::default();
    config.jpeg_quality = 101;
    let message = config.validate().unwrap_err().to_string();
    assert!(message.contains("JPEG quality"));
    assert!(message.contains("0-100"));

    let mut config = CompositeConfig::default();
    config.style.clusters = 0;
    assert!(config.validate().is_err());

    // Builder clamps quality instead of failing
    let config = CompositeConfig::builder().jpeg_quality(255).build().unwrap();
    assert_eq!(config.jpeg_quality, 100);
}

#[test]
fn test_neural_only_without_model() {
    let config = CompositeConfig::builder()
        .segmentation_policy(StrategyPolicy::NeuralOnly)
        .build()
        .unwrap();
    let processor = CompositeProcessor::new(config, ModelRegistry::empty()).unwrap();

    let err = processor
        .process_images(
            &DynamicImage::ImageRgb8(product_photo(24)),
            &scene(48, 48),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CompositeError::Model(_)), "{err}");
}

#[test]
fn test_unsupported_output_extension() {
    let dir = TempDir::new().unwrap();
    let image = scene(8, 8);

    for name in ["result.xyz", "result"] {
        let err = ImageIOService::save_image(&image, dir.path().join(name), 90).unwrap_err();
        assert!(matches!(err, CompositeError::InvalidConfig(_)), "{name}: {err}");
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_undecodable_inputs_are_load_errors() -> Result<()> {
    init_logging();

    let dir = TempDir::new()?;
    let broken = dir.path().join("broken.png");
    std::fs::write(&broken, b"\x89PNG but not really")?;
    let product = dir.path().join("product.png");
    product_photo(16)
        .save(&product)
        .map_err(|e| CompositeError::processing(format!("fixture: {e}")))?;

    let processor = CompositeProcessor::classical(CompositeConfig::default())?;

    let err = processor
        .process(&broken, &product, dir.path().join("out.png"), None)
        .unwrap_err();
    assert!(matches!(err, CompositeError::Load(_)), "{err}");
    assert!(!dir.path().join("out.png").exists());

    let err = processor.analyze(&broken).unwrap_err();
    assert!(matches!(err, CompositeError::Load(_)), "{err}");
    Ok(())
}

#[test]
fn test_protocol_reports_bad_style_guide() {
    let processor = CompositeProcessor::classical(CompositeConfig::default()).unwrap();
    let response = protocol::handle(
        &processor,
        &Request::Process {
            generated: "scene.png".into(),
            product: "product.png".into(),
            output: "out.png".into(),
            style_guide: Some("{not json".to_string()),
        },
    );

    assert!(!response.is_success());
    assert!(matches!(response, Response::Failed { .. }));
}

#[test]
fn test_single_pixel_product_in_tiny_scene() -> Result<()> {
    init_logging();

    let processor = CompositeProcessor::classical(CompositeConfig::default())?;
    let result = processor.process_images(
        &DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, image::Rgb([10, 200, 10]))),
        &scene(2, 2),
        None,
    )?;

    assert_eq!(result.image.dimensions(), (2, 2));
    assert_eq!((result.placement.width, result.placement.height), (1, 1));
    assert_eq!((result.placement.x, result.placement.y), (0, 1));
    Ok(())
}

#[test]
fn test_empty_scene_is_processing_error() {
    let processor = CompositeProcessor::classical(CompositeConfig::default()).unwrap();
    let style = StyleGuide::from_json(
        r#"{"colors":[],"lighting":{"brightness":0.5,"contrast":0.2,
            "direction":{"angle":0.0,"magnitude":0.0},"highlights":[],"shadows":[]},
            "composition":{"depth":0.0,"aspectRatio":1.0}}"#,
    )
    .unwrap();

    let err = processor
        .process_images(
            &DynamicImage::ImageRgb8(product_photo(16)),
            &RgbImage::new(0, 0),
            Some(&style),
        )
        .unwrap_err();
    assert!(matches!(err, CompositeError::Processing(_)), "{err}");
}
