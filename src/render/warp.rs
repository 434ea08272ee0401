//! Perspective warp by strip decomposition.
//!
//! The source is cut into thin strips along the marching axis. Each strip is rotated, scaled
//! and stamped between two points interpolated along the quad's edges; later strips overwrite
//! earlier ones. Strips keep their full thickness at the far edge and are stretched across when
//! the quad outruns them, so the clip pass is what trims them to the quad. The result approximates a projective transform with an error bounded
//! by the strip thickness, which is fine for near-rectangular print surfaces.

use kurbo::Shape as _;
use tracing::debug;

use crate::{
    assets::decode::Raster,
    config::{WarpConfig, WarpMethod},
    foundation::{
        core::{Affine, Canvas, CornerSet, Point, Rect},
        error::{MockupError, MockupResult},
        math::{angle_between, lerp_point},
    },
    render::homography,
};

/// Which way strips advance through the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarchAxis {
    /// Horizontal strips, one per step down the source height.
    Rows,
    /// Vertical strips, one per step across the source width.
    Columns,
}

/// State for one warp invocation. Dropped when the warp returns.
#[derive(Debug)]
pub struct WarpContext {
    source: Raster,
    canvas: Canvas,
    strip: Vec<u8>,
}

impl WarpContext {
    /// Fails fast on an empty canvas or an empty source.
    pub fn new(source: Raster, canvas: Canvas) -> MockupResult<Self> {
        if canvas.is_empty() {
            return Err(MockupError::contract(format!(
                "warp canvas must be non-empty, got {}x{}",
                canvas.width, canvas.height
            )));
        }
        if source.is_empty() {
            return Err(MockupError::contract(format!(
                "warp source must be non-empty, got {}x{}",
                source.width, source.height
            )));
        }
        Ok(Self {
            source: source.into_rgba_premul(),
            canvas,
            strip: Vec::new(),
        })
    }

    /// Warp the source onto `corners`. `Ok(None)` means the quad is degenerate.
    pub fn warp(mut self, corners: &CornerSet, cfg: &WarpConfig) -> MockupResult<Option<Raster>> {
        if corners.is_degenerate() {
            debug!(sides = ?corners.side_lengths(), "degenerate quad, no warp output");
            return Ok(None);
        }

        let cfg = WarpConfig {
            strip_step: cfg.strip_step.max(1),
            ..*cfg
        };
        if cfg.method == WarpMethod::Homography {
            if let Some(out) = homography::warp(&self.source, corners, self.canvas) {
                return Ok(Some(out));
            }
            debug!("falling back to strip warp");
        }
        Ok(Some(self.strip_warp(corners, &cfg)))
    }

    fn strip_warp(&mut self, corners: &CornerSet, cfg: &WarpConfig) -> Raster {
        let mut out = Raster::transparent(self.canvas);
        let side = base_side(corners, self.source.width, self.source.height);
        let axis = march_axis(side);
        let strips = match axis {
            MarchAxis::Rows => self.march_rows(corners, cfg, &mut out),
            MarchAxis::Columns => self.march_columns(corners, cfg, &mut out),
        };
        debug!(side, ?axis, strips, "strip warp stamped");
        clip_to_quad(&mut out, corners);
        out
    }

    fn march_rows(&mut self, corners: &CornerSet, cfg: &WarpConfig, out: &mut Raster) -> usize {
        let (w, h) = (self.source.width, self.source.height);
        let c = corners.points();
        let thickness = cfg.strip_thickness();
        let mut stamped = 0;

        for row in (0..h).step_by(cfg.strip_step as usize) {
            let t = f64::from(row) / f64::from(h);
            let left = lerp_point(c[0], c[3], t);
            let right = lerp_point(c[1], c[2], t);
            let span = left.distance(right);
            if span <= f64::EPSILON {
                continue;
            }

            let t_end = f64::from(row + thickness) / f64::from(h);
            let reach = left
                .distance(lerp_point(c[0], c[3], t_end))
                .max(right.distance(lerp_point(c[1], c[2], t_end)));
            let along = span / f64::from(w);
            let across = cross_scale(along, reach, thickness);

            self.extract_rows(row, thickness);
            let xf = Affine::translate(left.to_vec2())
                * Affine::rotate(angle_between(left, right))
                * Affine::scale_non_uniform(along, across);
            stamp(&self.strip, w, thickness, xf, out);
            stamped += 1;
        }
        stamped
    }

    fn march_columns(&mut self, corners: &CornerSet, cfg: &WarpConfig, out: &mut Raster) -> usize {
        let (w, h) = (self.source.width, self.source.height);
        let c = corners.points();
        let thickness = cfg.strip_thickness();
        let mut stamped = 0;

        for col in (0..w).step_by(cfg.strip_step as usize) {
            let t = f64::from(col) / f64::from(w);
            let top = lerp_point(c[0], c[1], t);
            let bottom = lerp_point(c[3], c[2], t);
            let span = top.distance(bottom);
            if span <= f64::EPSILON {
                continue;
            }

            let t_end = f64::from(col + thickness) / f64::from(w);
            let reach = top
                .distance(lerp_point(c[0], c[1], t_end))
                .max(bottom.distance(lerp_point(c[3], c[2], t_end)));
            let along = span / f64::from(h);
            let across = cross_scale(along, reach, thickness);

            self.extract_columns(col, thickness);
            // Strip's local +y runs along top -> bottom.
            let xf = Affine::translate(top.to_vec2())
                * Affine::rotate(angle_between(top, bottom) - std::f64::consts::FRAC_PI_2)
                * Affine::scale_non_uniform(across, along);
            stamp(&self.strip, thickness, h, xf, out);
            stamped += 1;
        }
        stamped
    }

    /// Copy `rows` source rows starting at `row` into the strip buffer. Rows past the bottom
    /// repeat the last source row.
    fn extract_rows(&mut self, row: u32, rows: u32) {
        let stride = self.source.width as usize * 4;
        let last = self.source.height - 1;
        self.strip.clear();
        for r in row..row + rows {
            let start = r.min(last) as usize * stride;
            self.strip
                .extend_from_slice(&self.source.data[start..start + stride]);
        }
    }

    /// Copy `cols` source columns starting at `col` into the strip buffer. Columns past the
    /// right edge repeat the last source column.
    fn extract_columns(&mut self, col: u32, cols: u32) {
        let stride = self.source.width as usize * 4;
        let last = self.source.width - 1;
        self.strip.clear();
        for line in self.source.data.chunks_exact(stride) {
            for c in col..col + cols {
                let x = c.min(last) as usize * 4;
                self.strip.extend_from_slice(&line[x..x + 4]);
            }
        }
    }
}

/// Cross-axis scale for a strip: the uniform scale, widened when the strip would stop short
/// of where the strip `thickness` steps further on starts.
fn cross_scale(along: f64, reach: f64, thickness: u32) -> f64 {
    let needed = reach / f64::from(thickness);
    if needed > along * (1.0 + 1e-9) {
        needed
    } else {
        along
    }
}

/// Warp `source` onto `corners` inside a transparent raster of size `canvas`.
///
/// Returns `Ok(None)` when more than one side of the quad has zero length.
pub fn warp_perspective(
    source: Raster,
    corners: &CornerSet,
    canvas: Canvas,
    cfg: &WarpConfig,
) -> MockupResult<Option<Raster>> {
    WarpContext::new(source, canvas)?.warp(corners, cfg)
}

/// Index of the side with the largest stretch ratio (first one on ties).
///
/// Top and bottom are measured against the source height, right and left against the width.
pub fn base_side(corners: &CornerSet, src_width: u32, src_height: u32) -> usize {
    let sides = corners.side_lengths();
    let (w, h) = (f64::from(src_width), f64::from(src_height));
    let ratios = [sides[0] / h, sides[1] / w, sides[2] / h, sides[3] / w];

    let mut best = 0;
    for (i, r) in ratios.iter().enumerate().skip(1) {
        if *r > ratios[best] {
            best = i;
        }
    }
    best
}

pub fn march_axis(side: usize) -> MarchAxis {
    if side % 2 == 0 {
        MarchAxis::Rows
    } else {
        MarchAxis::Columns
    }
}

/// Overwrite `out` with the strip mapped through `xf`, sampled nearest-neighbour.
fn stamp(strip: &[u8], strip_w: u32, strip_h: u32, xf: Affine, out: &mut Raster) {
    let inv = xf.inverse();
    let bbox = xf.transform_rect_bbox(Rect::new(
        0.0,
        0.0,
        f64::from(strip_w),
        f64::from(strip_h),
    ));
    let (x0, x1) = pixel_span(bbox.x0, bbox.x1, out.width);
    let (y0, y1) = pixel_span(bbox.y0, bbox.y1, out.height);
    let out_stride = out.width as usize * 4;
    let strip_stride = strip_w as usize * 4;

    for y in y0..y1 {
        for x in x0..x1 {
            let p = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if !(p.x >= 0.0 && p.y >= 0.0) {
                continue;
            }
            let (u, v) = (p.x as u32, p.y as u32);
            if u >= strip_w || v >= strip_h {
                continue;
            }
            let s = v as usize * strip_stride + u as usize * 4;
            let d = y as usize * out_stride + x as usize * 4;
            out.data[d..d + 4].copy_from_slice(&strip[s..s + 4]);
        }
    }
}

/// Clear every pixel whose centre lies outside the quad.
pub(crate) fn clip_to_quad(out: &mut Raster, corners: &CornerSet) {
    let path = corners.to_path();
    let bounds = corners.bounds();
    let width = out.width as usize;

    for (i, px) in out.data.chunks_exact_mut(4).enumerate() {
        if px[3] == 0 {
            continue;
        }
        let p = Point::new((i % width) as f64 + 0.5, (i / width) as f64 + 0.5);
        if !(bounds.contains(p) && path.contains(p)) {
            px.fill(0);
        }
    }
}

/// Integer pixel range covering `[lo, hi)`, clamped to `[0, limit)`.
pub(crate) fn pixel_span(lo: f64, hi: f64, limit: u32) -> (u32, u32) {
    let limit = f64::from(limit);
    let a = lo.floor().clamp(0.0, limit) as u32;
    let b = hi.ceil().clamp(0.0, limit) as u32;
    (a, b.max(a))
}
