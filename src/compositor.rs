//! Placement and blending of the prepared product into the scene
//!
//! The product is scaled relative to the scene height, color adapted, lit from
//! the scene's light direction, then merged either by alpha compositing inside
//! its placement rectangle or by mixed-gradient seamless cloning.

use crate::{
    color::ColorMatcher,
    config::{BlendMode, CompositeConfig, PlacementMode},
    error::{CompositeError, Result},
    inference::ModelRegistry,
    lighting::LightingSynthesizer,
    scene::SceneAnalyzer,
    types::{LightInfo, LightingSpec, PlacementRect, StyleGuide},
    utils::filters::{gaussian_blur_gray, to_u8},
};
use image::{imageops::FilterType, GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use ndarray::Array3;
use tracing::instrument;

/// Over-relaxation factor of the seamless cloning solver
const SOR_OMEGA: f32 = 1.9;

/// A scene with the product merged in
#[derive(Debug, Clone)]
pub struct Composite {
    pub image: RgbImage,
    pub placement: PlacementRect,
    pub light: LightInfo,
}

/// Merges cut-out products into scenes
#[derive(Debug, Clone, Copy)]
pub struct Compositor<'a> {
    registry: &'a ModelRegistry,
    config: &'a CompositeConfig,
}

impl<'a> Compositor<'a> {
    #[must_use]
    pub fn new(registry: &'a ModelRegistry, config: &'a CompositeConfig) -> Self {
        Self { registry, config }
    }

    /// Place, adapt, light and blend `product` into `scene`
    ///
    /// # Errors
    /// - `Processing` for an empty product or scene
    /// - Placement errors in `PlacementMode::Heatmap`
    #[instrument(
        skip(self, product, scene, style),
        fields(
            product = %format!("{}x{}", product.width(), product.height()),
            scene = %format!("{}x{}", scene.width(), scene.height()),
            blend = ?self.config.blend.mode
        )
    )]
    pub fn integrate(
        &self,
        product: &RgbaImage,
        scene: &RgbImage,
        style: &StyleGuide,
    ) -> Result<Composite> {
        if product.is_empty() || scene.is_empty() {
            return Err(CompositeError::processing_stage_error(
                "integrate",
                "product and scene must both have pixels",
                Some(&format!(
                    "product {}x{}, scene {}x{}",
                    product.width(),
                    product.height(),
                    scene.width(),
                    scene.height()
                )),
            ));
        }

        let analyzer = SceneAnalyzer::new(self.registry, self.config);
        let light = analyzer.analyze_light(scene);
        let prepared = self.prepare_product(product, scene, style, &light);
        let placement = self.place(&analyzer, prepared.dimensions(), scene)?;

        let kernel = self.config.blend.alpha_kernel as usize;
        let alpha = gaussian_blur_gray(
            &GrayImage::from_fn(prepared.width(), prepared.height(), |x, y| {
                Luma([prepared.get_pixel(x, y)[3]])
            }),
            kernel,
        );

        let image = match self.config.blend.mode {
            BlendMode::Alpha => alpha_blend(scene, &prepared, &alpha, placement),
            BlendMode::Seamless => {
                let (colors, mask) = paste_full_scene(scene.dimensions(), &prepared, &alpha, placement);
                match mask_bounds(&mask) {
                    Some((x0, y0, x1, y1)) => {
                        let center = (x0 + (x1 - x0 + 1) / 2, y0 + (y1 - y0 + 1) / 2);
                        self.seamless_blend(scene, &colors, &mask, center)?
                    },
                    None => scene.clone(),
                }
            },
        };

        log::debug!(
            "Product placed at ({}, {}) as {}x{}",
            placement.x,
            placement.y,
            placement.width,
            placement.height
        );

        Ok(Composite {
            image,
            placement,
            light,
        })
    }

    /// Product size inside a scene: height scaled by `product_scale`, width
    /// proportional, both at least 1 px
    #[must_use]
    pub fn product_size(&self, product: (u32, u32), scene: (u32, u32)) -> (u32, u32) {
        let height = ((f64::from(scene.1) * f64::from(self.config.placement.product_scale)) as u32).max(1);
        let width = (u64::from(product.0) * u64::from(height) / u64::from(product.1.max(1))).max(1);
        (u32::try_from(width).unwrap_or(u32::MAX), height)
    }

    /// Resized, color adapted and lit product, ready for blending
    #[must_use]
    pub fn prepare_product(
        &self,
        product: &RgbaImage,
        scene: &RgbImage,
        style: &StyleGuide,
        light: &LightInfo,
    ) -> RgbaImage {
        let (width, height) = self.product_size(product.dimensions(), scene.dimensions());
        let resized = image::imageops::resize(product, width, height, FilterType::Triangle);
        let adapted = ColorMatcher::adapt(&resized, scene, &style.lighting);

        let spec = LightingSpec::from_light_with(light, height, &self.config.lighting)
            .with_style_spots(&style.lighting);
        LightingSynthesizer::apply(&adapted, &spec)
    }

    fn place(
        &self,
        analyzer: &SceneAnalyzer<'_>,
        size: (u32, u32),
        scene: &RgbImage,
    ) -> Result<PlacementRect> {
        let (width, height) = size;
        let (scene_w, scene_h) = (i64::from(scene.width()), i64::from(scene.height()));
        let (w, h) = (i64::from(width), i64::from(height));

        let (x, y) = match self.config.placement.mode {
            PlacementMode::Fixed => {
                let anchor_y =
                    (scene_h as f64 * f64::from(self.config.placement.vertical_anchor)) as i64;
                ((scene_w - w).div_euclid(2), anchor_y - h / 2)
            },
            PlacementMode::Heatmap => {
                let placement = analyzer.find_placement(scene)?;
                let (ax, ay) = placement.position;
                (
                    clamp_axis(i64::from(ax), w, scene_w),
                    clamp_axis(i64::from(ay), h, scene_h),
                )
            },
        };

        Ok(PlacementRect {
            x,
            y,
            width,
            height,
        })
    }

    /// Mixed-gradient seamless cloning of `fg` into `bg`
    ///
    /// The bounding box of the non-zero `mask` pixels is centered at `center`
    /// in `bg`. Inside the mask each neighbor difference follows whichever of
    /// the foreground or background gradient is stronger; background pixels
    /// around the mask act as fixed boundary values.
    ///
    /// # Errors
    /// - `InvalidConfig` when `fg` and `mask` differ in size
    pub fn seamless_blend(
        &self,
        bg: &RgbImage,
        fg: &RgbImage,
        mask: &GrayImage,
        center: (u32, u32),
    ) -> Result<RgbImage> {
        if fg.dimensions() != mask.dimensions() {
            return Err(CompositeError::invalid_config(format!(
                "Seamless blend mask is {}x{} but the foreground is {}x{}",
                mask.width(),
                mask.height(),
                fg.width(),
                fg.height()
            )));
        }

        let Some((x0, y0, x1, y1)) = mask_bounds(mask) else {
            return Ok(bg.clone());
        };

        let offset = (
            i64::from(center.0) - i64::from((x1 - x0 + 1) / 2) - i64::from(x0),
            i64::from(center.1) - i64::from((y1 - y0 + 1) / 2) - i64::from(y0),
        );

        let region = CloneRegion::new(bg, mask, offset);
        if region.pixels.is_empty() {
            return Ok(bg.clone());
        }

        let solution = region.solve(
            bg,
            fg,
            self.config.blend.seamless_iterations,
            self.config.blend.seamless_tolerance,
        );

        let mut out = bg.clone();
        for (i, &(dx, dy)) in region.pixels.iter().enumerate() {
            out.put_pixel(
                dx,
                dy,
                Rgb([0, 1, 2].map(|c| to_u8(solution[[i, c, 0]]))),
            );
        }
        Ok(out)
    }
}

/// Top-left coordinate so an object of `size` is centered on `anchor` and
/// stays inside `extent`, or is centered on the extent when it cannot fit
fn clamp_axis(anchor: i64, size: i64, extent: i64) -> i64 {
    if size >= extent {
        (extent - size).div_euclid(2)
    } else {
        (anchor - size / 2).clamp(0, extent - size)
    }
}

/// Inclusive bounding box of the non-zero pixels
fn mask_bounds(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds
}

/// Scene pixel covered by product pixel `(px, py)`, if any
fn scene_coords(rect: PlacementRect, px: u32, py: u32, scene: (u32, u32)) -> Option<(u32, u32)> {
    let x = rect.x + i64::from(px);
    let y = rect.y + i64::from(py);
    let x = u32::try_from(x).ok().filter(|&x| x < scene.0)?;
    let y = u32::try_from(y).ok().filter(|&y| y < scene.1)?;
    Some((x, y))
}

fn alpha_blend(
    scene: &RgbImage,
    product: &RgbaImage,
    alpha: &GrayImage,
    rect: PlacementRect,
) -> RgbImage {
    let mut out = scene.clone();
    for (px, py, fg) in product.enumerate_pixels() {
        let Some((x, y)) = scene_coords(rect, px, py, scene.dimensions()) else {
            continue;
        };
        let a = f32::from(alpha.get_pixel(px, py)[0]) / 255.0;
        let bg = scene.get_pixel(x, y);
        let blended = [0, 1, 2].map(|c| to_u8(f32::from(bg[c]) * (1.0 - a) + f32::from(fg[c]) * a));
        out.put_pixel(x, y, Rgb(blended));
    }
    out
}

/// Product colors and smoothed alpha pasted onto scene-sized canvases
fn paste_full_scene(
    scene: (u32, u32),
    product: &RgbaImage,
    alpha: &GrayImage,
    rect: PlacementRect,
) -> (RgbImage, GrayImage) {
    let mut colors = RgbImage::new(scene.0, scene.1);
    let mut mask = GrayImage::new(scene.0, scene.1);
    for (px, py, fg) in product.enumerate_pixels() {
        if let Some((x, y)) = scene_coords(rect, px, py, scene) {
            colors.put_pixel(x, y, Rgb([fg[0], fg[1], fg[2]]));
            mask.put_pixel(x, y, *alpha.get_pixel(px, py));
        }
    }
    (colors, mask)
}

/// Unknown pixels of the cloning problem with their neighbor structure
struct CloneRegion {
    /// Destination coordinates of each unknown
    pixels: Vec<(u32, u32)>,
    /// Source coordinates of each unknown
    sources: Vec<(u32, u32)>,
    /// Per unknown and direction: index of a neighboring unknown, if any
    neighbors: Vec<[Option<usize>; 4]>,
}

const DIRECTIONS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

impl CloneRegion {
    fn new(bg: &RgbImage, mask: &GrayImage, offset: (i64, i64)) -> Self {
        let (bw, bh) = bg.dimensions();
        let mut index = vec![None; bw as usize * bh as usize];
        let mut pixels = Vec::new();
        let mut sources = Vec::new();

        for (sx, sy, m) in mask.enumerate_pixels() {
            if m[0] == 0 {
                continue;
            }
            let dx = i64::from(sx) + offset.0;
            let dy = i64::from(sy) + offset.1;
            // The outermost background ring stays fixed as boundary
            if dx <= 0 || dy <= 0 || dx >= i64::from(bw) - 1 || dy >= i64::from(bh) - 1 {
                continue;
            }
            let (dx, dy) = (dx as u32, dy as u32);
            index[dy as usize * bw as usize + dx as usize] = Some(pixels.len());
            pixels.push((dx, dy));
            sources.push((sx, sy));
        }

        let neighbors = pixels
            .iter()
            .map(|&(x, y)| {
                DIRECTIONS.map(|(ox, oy)| {
                    let nx = (i64::from(x) + ox) as usize;
                    let ny = (i64::from(y) + oy) as usize;
                    index[ny * bw as usize + nx]
                })
            })
            .collect();

        Self {
            pixels,
            sources,
            neighbors,
        }
    }

    /// Successive over-relaxation; returns `[unknown, channel, 0]` values
    fn solve(&self, bg: &RgbImage, fg: &RgbImage, iterations: u32, tolerance: f32) -> Array3<f32> {
        let n = self.pixels.len();
        let (fw, fh) = fg.dimensions();

        // Right-hand side: guidance divergence plus fixed boundary values
        let mut rhs = Array3::<f32>::zeros((n, 3, 1));
        let mut solution = Array3::<f32>::zeros((n, 3, 1));

        for i in 0..n {
            let (dx, dy) = self.pixels[i];
            let (sx, sy) = self.sources[i];
            let dest = bg.get_pixel(dx, dy);
            let src = fg.get_pixel(sx, sy);

            for (dir, &(ox, oy)) in DIRECTIONS.iter().enumerate() {
                let qx = (i64::from(dx) + ox) as u32;
                let qy = (i64::from(dy) + oy) as u32;
                let dest_q = bg.get_pixel(qx, qy);

                let src_q = u32::try_from(i64::from(sx) + ox)
                    .ok()
                    .zip(u32::try_from(i64::from(sy) + oy).ok())
                    .filter(|&(x, y)| x < fw && y < fh)
                    .map(|(x, y)| fg.get_pixel(x, y));

                for c in 0..3 {
                    let dest_grad = f32::from(dest[c]) - f32::from(dest_q[c]);
                    let guidance = match src_q {
                        Some(q) => {
                            let src_grad = f32::from(src[c]) - f32::from(q[c]);
                            if src_grad.abs() > dest_grad.abs() {
                                src_grad
                            } else {
                                dest_grad
                            }
                        },
                        None => dest_grad,
                    };
                    rhs[[i, c, 0]] += guidance;
                    if self.neighbors[i][dir].is_none() {
                        rhs[[i, c, 0]] += f32::from(dest_q[c]);
                    }
                }
            }

            for c in 0..3 {
                solution[[i, c, 0]] = f32::from(dest[c]);
            }
        }

        for iteration in 0..iterations {
            let mut max_change = 0.0_f32;
            for i in 0..n {
                for c in 0..3 {
                    let mut sum = rhs[[i, c, 0]];
                    for neighbor in self.neighbors[i].iter().flatten() {
                        sum += solution[[*neighbor, c, 0]];
                    }
                    let current = solution[[i, c, 0]];
                    let change = SOR_OMEGA * (sum / 4.0 - current);
                    solution[[i, c, 0]] = current + change;
                    max_change = max_change.max(change.abs());
                }
            }
            if max_change < tolerance {
                log::trace!("Seamless solver converged after {} sweeps", iteration + 1);
                break;
            }
        }

        solution
    }
}
