use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use scene_compositor::{
    segmentation::grabcut, BlendMode, ColorMatcher, CompositeConfig, Compositor, LightDirection,
    LightingStyle, ModelRegistry, PlacementMode, SceneAnalyzer, StyleGuide,
};

const SIZES: [u32; 3] = [128, 256, 512];

fn scene(size: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        Rgb([
            (x * 255 / size) as u8,
            ((x + y) % 97 + 80) as u8,
            (y * 255 / size) as u8,
        ])
    })
}

fn product(size: u32) -> RgbaImage {
    let inner = size / 4..size - size / 4;
    RgbaImage::from_fn(size, size, |x, y| {
        if inner.contains(&x) && inner.contains(&y) {
            Rgba([200, 40, 30, 255])
        } else {
            Rgba([245, 245, 245, 0])
        }
    })
}

fn style() -> StyleGuide {
    StyleGuide {
        colors: vec!["#805030".to_string()],
        lighting: LightingStyle {
            brightness: 0.45,
            contrast: 0.3,
            direction: LightDirection::default(),
            highlights: vec![],
            shadows: vec![],
        },
        composition: Default::default(),
    }
}

fn benchmark_color_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("color_transfer");

    for size in SIZES {
        let source = scene(size);
        let target = RgbImage::from_fn(size, size, |x, _| Rgb([40, (x % 256) as u8, 160]));
        group.bench_with_input(BenchmarkId::new("lab_transfer", size), &size, |b, _| {
            b.iter(|| black_box(ColorMatcher::transfer(&source, &target)));
        });

        let gray_source = GrayImage::from_fn(size, size, |x, _| Luma([(x % 256) as u8]));
        let gray_target = GrayImage::from_fn(size, size, |_, y| Luma([(255 - y % 256) as u8]));
        group.bench_with_input(BenchmarkId::new("histogram", size), &size, |b, _| {
            b.iter(|| black_box(ColorMatcher::match_histogram(&gray_source, &gray_target)));
        });
    }

    group.finish();
}

fn benchmark_scene_analysis(c: &mut Criterion) {
    let registry = ModelRegistry::empty();
    let config = CompositeConfig::builder()
        .placement_mode(PlacementMode::Heatmap)
        .build()
        .unwrap();
    let analyzer = SceneAnalyzer::new(&registry, &config);

    let mut group = c.benchmark_group("scene_analysis");
    group.sample_size(20);

    for size in SIZES {
        let image = scene(size);
        group.bench_with_input(BenchmarkId::new("light", size), &image, |b, image| {
            b.iter(|| black_box(analyzer.analyze_light(image)));
        });
        group.bench_with_input(BenchmarkId::new("placement", size), &image, |b, image| {
            b.iter(|| black_box(analyzer.find_placement(image).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_classical_segmentation(c: &mut Criterion) {
    let config = CompositeConfig::default();

    let mut group = c.benchmark_group("classical_segmentation");
    group.sample_size(10);

    for size in [64, 128, 256] {
        let photo = image::DynamicImage::ImageRgba8(product(size)).to_rgb8();
        group.bench_with_input(BenchmarkId::new("grabcut", size), &photo, |b, photo| {
            b.iter(|| black_box(grabcut::segment(photo, &config.segmentation.classical)));
        });
    }

    group.finish();
}

fn benchmark_blending(c: &mut Criterion) {
    let registry = ModelRegistry::empty();
    let style = style();

    let mut group = c.benchmark_group("blending");
    group.sample_size(10);

    for (name, mode) in [("alpha", BlendMode::Alpha), ("seamless", BlendMode::Seamless)] {
        let config = CompositeConfig::builder()
            .blend_mode(mode)
            .seamless_solver(100, 0.01)
            .build()
            .unwrap();
        let compositor = Compositor::new(&registry, &config);

        for size in [128, 256] {
            let background = scene(size);
            let cutout = product(size / 2);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| black_box(compositor.integrate(&cutout, &background, &style).unwrap()));
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_color_transfer,
    benchmark_scene_analysis,
    benchmark_classical_segmentation,
    benchmark_blending
);
criterion_main!(benches);
