//! Integration tests for complete compositing workflows
//!
//! These tests verify end-to-end functionality without relying on external models,
//! using scripted backends to drive the neural strategies.

mod common;

use common::{init_logging, product_photo, scene, Behavior, ScriptedBackend};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use scene_compositor::{
    protocol::{self, Request, Response},
    BlendMode, CompositeConfig, CompositeProcessor, Compositor, LightDirection, LightingStyle,
    ModelRegistry, PlacementMode, PlacementRect, Result, Strategy, StrategyPolicy, StyleGuide,
};
use tempfile::TempDir;

fn neutral_style() -> StyleGuide {
    StyleGuide {
        colors: vec![],
        lighting: LightingStyle {
            brightness: 0.0,
            contrast: 1.0,
            direction: LightDirection::default(),
            highlights: vec![],
            shadows: vec![],
        },
        composition: Default::default(),
    }
}

#[test]
fn test_product_centered_in_large_scene() -> Result<()> {
    init_logging();

    let registry = ModelRegistry::empty();
    let config = CompositeConfig::default();
    let compositor = Compositor::new(&registry, &config);

    let scene = RgbImage::from_pixel(1000, 1000, Rgb([128, 128, 128]));
    let product = RgbaImage::from_pixel(200, 200, Rgba([30, 90, 200, 255]));
    let style = neutral_style();

    let composite = compositor.integrate(&product, &scene, &style)?;
    assert_eq!(
        composite.placement,
        PlacementRect {
            x: 300,
            y: 300,
            width: 400,
            height: 400
        }
    );
    assert_eq!(composite.image.dimensions(), (1000, 1000));

    let prepared = compositor.prepare_product(&product, &scene, &style, &composite.light);
    for (x, y, pixel) in composite.image.enumerate_pixels() {
        if composite.placement.contains(x, y) {
            let expected = prepared.get_pixel(x - 300, y - 300);
            assert_eq!(pixel.0, [expected[0], expected[1], expected[2]], "at ({x}, {y})");
        } else {
            assert_eq!(pixel.0, [128, 128, 128], "at ({x}, {y})");
        }
    }
    Ok(())
}

#[test]
fn test_process_files_through_protocol() -> Result<()> {
    init_logging();

    let dir = TempDir::new()?;
    let product_path = dir.path().join("product.jpg");
    let scene_path = dir.path().join("scene.png");
    let output_path = dir.path().join("nested/out/result.png");
    product_photo(64).save(&product_path).map_err(|e| {
        scene_compositor::CompositeError::processing(format!("fixture: {e}"))
    })?;
    scene(160, 120).save(&scene_path).map_err(|e| {
        scene_compositor::CompositeError::processing(format!("fixture: {e}"))
    })?;

    let processor = CompositeProcessor::classical(CompositeConfig::default())?;
    let response = protocol::handle(
        &processor,
        &Request::Process {
            generated: scene_path,
            product: product_path,
            output: output_path.clone(),
            style_guide: None,
        },
    );

    assert_eq!(
        response,
        Response::Processed {
            path: output_path.clone()
        }
    );
    let written = image::open(&output_path).unwrap();
    assert_eq!((written.width(), written.height()), (160, 120));
    Ok(())
}

#[test]
fn test_neural_models_initialized_once() -> Result<()> {
    init_logging();

    let segmentation = ScriptedBackend::segmentation(Behavior::Disc);
    let depth = ScriptedBackend::depth(Behavior::Ramp);
    let (segmentation_calls, depth_calls) = (segmentation.calls(), depth.calls());

    let registry = ModelRegistry::builder()
        .segmentation(Box::new(segmentation))
        .depth(Box::new(depth))
        .build();
    let config = CompositeConfig::builder()
        .segmentation_policy(StrategyPolicy::NeuralOnly)
        .depth_policy(StrategyPolicy::NeuralOnly)
        .placement_mode(PlacementMode::Heatmap)
        .build()?;
    let processor = CompositeProcessor::new(config, registry)?;

    let product = DynamicImage::ImageRgb8(product_photo(64));
    let scene = scene(120, 90);
    let first = processor.process_images(&product, &scene, None)?;
    let second = processor.process_images(&product, &scene, None)?;

    assert_eq!(first.segmentation, Strategy::Neural);
    assert_eq!(first.image, second.image);
    assert_eq!(first.style_guide, second.style_guide);

    // Near rows carry large disparity, so the scene reads as farther at the top
    assert!(first.style_guide.composition.depth > 0.0);

    let segmentation_calls = segmentation_calls.lock().unwrap();
    assert_eq!(segmentation_calls.first(), Some(&"initialize"));
    assert_eq!(segmentation_calls.iter().filter(|c| **c == "initialize").count(), 1);
    assert_eq!(segmentation_calls.iter().filter(|c| **c == "infer").count(), 2);

    let depth_calls = depth_calls.lock().unwrap();
    assert_eq!(depth_calls.iter().filter(|c| **c == "initialize").count(), 1);
    // Style analysis and heatmap placement each estimate depth
    assert_eq!(depth_calls.iter().filter(|c| **c == "infer").count(), 4);
    Ok(())
}

#[test]
fn test_auto_policy_survives_failing_models() -> Result<()> {
    init_logging();

    let registry = ModelRegistry::builder()
        .segmentation(Box::new(ScriptedBackend::segmentation(Behavior::FailInference)))
        .depth(Box::new(ScriptedBackend::depth(Behavior::FailInit)))
        .build();
    let config = CompositeConfig::builder()
        .placement_mode(PlacementMode::Heatmap)
        .build()?;
    let processor = CompositeProcessor::new(config, registry)?;

    let result = processor.process_images(
        &DynamicImage::ImageRgb8(product_photo(48)),
        &scene(100, 80),
        None,
    )?;
    assert_eq!(result.segmentation, Strategy::Classical);
    assert_eq!(result.image.dimensions(), (100, 80));
    Ok(())
}

#[test]
fn test_neural_only_propagates_model_errors() -> Result<()> {
    let registry = ModelRegistry::builder()
        .segmentation(Box::new(ScriptedBackend::segmentation(Behavior::FailInit)))
        .build();
    let config = CompositeConfig::builder()
        .segmentation_policy(StrategyPolicy::NeuralOnly)
        .build()?;
    let processor = CompositeProcessor::new(config, registry)?;

    let err = processor
        .process_images(
            &DynamicImage::ImageRgb8(product_photo(32)),
            &scene(64, 64),
            Some(&neutral_style()),
        )
        .unwrap_err();
    assert!(err.is_model_failure(), "{err}");
    Ok(())
}

#[test]
fn test_seamless_blend_workflow() -> Result<()> {
    init_logging();

    let config = CompositeConfig::builder()
        .blend_mode(BlendMode::Seamless)
        .build()?;
    let processor = CompositeProcessor::classical(config)?;

    let scene = scene(96, 72);
    let result = processor.process_images(
        &DynamicImage::ImageRgb8(product_photo(40)),
        &scene,
        Some(&neutral_style()),
    )?;

    assert_eq!(result.image.dimensions(), (96, 72));
    // The outermost ring is boundary and never rewritten
    for x in 0..96 {
        assert_eq!(result.image.get_pixel(x, 0), scene.get_pixel(x, 0));
        assert_eq!(result.image.get_pixel(x, 71), scene.get_pixel(x, 71));
    }
    Ok(())
}

#[test]
fn test_analyzed_guide_round_trips_into_process() -> Result<()> {
    let dir = TempDir::new()?;
    let scene_path = dir.path().join("reference.png");
    scene(80, 60).save(&scene_path).map_err(|e| {
        scene_compositor::CompositeError::processing(format!("fixture: {e}"))
    })?;

    let processor = CompositeProcessor::classical(CompositeConfig::default())?;
    let response = protocol::handle(
        &processor,
        &Request::Analyze {
            image: scene_path.clone(),
        },
    );

    let json: serde_json::Value = serde_json::from_str(&response.to_json()?)?;
    assert_eq!(json["success"], serde_json::json!(true));

    let guide_json = json["style_guide"].to_string();
    let guide = StyleGuide::from_json(&guide_json)?;
    let direct = processor.analyze(&scene_path)?;
    assert_eq!(guide.colors, direct.colors);
    assert!((guide.lighting.brightness - direct.lighting.brightness).abs() < 1e-12);
    assert!((guide.lighting.direction.angle - direct.lighting.direction.angle).abs() < 1e-12);
    assert!((guide.composition.aspect_ratio - 80.0 / 60.0).abs() < 1e-9);

    let product_path = dir.path().join("product.png");
    let output_path = dir.path().join("result.jpg");
    product_photo(40).save(&product_path).map_err(|e| {
        scene_compositor::CompositeError::processing(format!("fixture: {e}"))
    })?;

    let response = protocol::handle(
        &processor,
        &Request::Process {
            generated: scene_path,
            product: product_path,
            output: output_path.clone(),
            style_guide: Some(guide_json),
        },
    );
    assert!(response.is_success());
    assert!(output_path.exists());
    Ok(())
}
