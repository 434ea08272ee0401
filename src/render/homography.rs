//! Inverse-mapped projective warp.
//!
//! Solves the 4-point homography from the source rectangle to the destination corners, then
//! maps every destination pixel centre inside the quad back into the source and samples it
//! bilinearly.

use kurbo::Shape as _;
use tracing::debug;

use crate::{
    assets::decode::Raster,
    foundation::core::{Canvas, CornerSet, Point},
    render::warp::pixel_span,
};

const SINGULAR_EPS: f64 = 1e-12;

/// Row-major 3x3 matrix with `m[8]` normalized to 1 for solved homographies.
pub type Mat3 = [f64; 9];

/// Warp a premultiplied RGBA `source` onto `corners`. `None` when the system is singular.
pub(crate) fn warp(source: &Raster, corners: &CornerSet, canvas: Canvas) -> Option<Raster> {
    let (w, h) = (f64::from(source.width), f64::from(source.height));
    let src_quad = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ];
    let Some(inv) = solve_homography(&src_quad, corners.points()).and_then(|m| invert(&m)) else {
        debug!("singular homography");
        return None;
    };

    let mut out = Raster::transparent(canvas);
    let path = corners.to_path();
    let bounds = corners.bounds();
    let (x0, x1) = pixel_span(bounds.x0, bounds.x1, canvas.width);
    let (y0, y1) = pixel_span(bounds.y0, bounds.y1, canvas.height);
    let stride = canvas.width as usize * 4;

    for y in y0..y1 {
        for x in x0..x1 {
            let p = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if !path.contains(p) {
                continue;
            }
            let Some(s) = transform_point(&inv, p) else {
                continue;
            };
            if !(s.x >= 0.0 && s.y >= 0.0 && s.x <= w && s.y <= h) {
                continue;
            }
            let px = bilinear_rgba(source, s.x - 0.5, s.y - 0.5);
            let d = y as usize * stride + x as usize * 4;
            out.data[d..d + 4].copy_from_slice(&px);
        }
    }
    Some(out)
}

/// Solve `H` with `H * src[i] ~ dst[i]` for four point pairs.
pub fn solve_homography(src: &[Point; 4], dst: &[Point; 4]) -> Option<Mat3> {
    let mut a = [[0.0f64; 9]; 8];
    for i in 0..4 {
        let (x, y) = (src[i].x, src[i].y);
        let (u, v) = (dst[i].x, dst[i].y);
        a[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -x * u, -y * u, u];
        a[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -x * v, -y * v, v];
    }

    // Gauss-Jordan with partial pivoting on the augmented 8x9 system.
    for col in 0..8 {
        let pivot = (col..8).max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))?;
        if a[pivot][col].abs() < SINGULAR_EPS {
            return None;
        }
        a.swap(col, pivot);
        let div = a[col][col];
        for k in col..9 {
            a[col][k] /= div;
        }
        for r in 0..8 {
            if r == col {
                continue;
            }
            let f = a[r][col];
            if f != 0.0 {
                for k in col..9 {
                    a[r][k] -= f * a[col][k];
                }
            }
        }
    }

    let mut m = [0.0; 9];
    for (i, row) in a.iter().enumerate() {
        m[i] = row[8];
    }
    m[8] = 1.0;
    m.iter().all(|v| v.is_finite()).then_some(m)
}

#[rustfmt::skip]
fn determinant(m: &Mat3) -> f64 {
    m[0] * (m[4] * m[8] - m[5] * m[7]) -
    m[1] * (m[3] * m[8] - m[5] * m[6]) +
    m[2] * (m[3] * m[7] - m[4] * m[6])
}

#[rustfmt::skip]
fn adjugate(m: &Mat3) -> Mat3 {
    [
        m[4] * m[8] - m[5] * m[7],
        m[2] * m[7] - m[1] * m[8],
        m[1] * m[5] - m[2] * m[4],
        m[5] * m[6] - m[3] * m[8],
        m[0] * m[8] - m[2] * m[6],
        m[2] * m[3] - m[0] * m[5],
        m[3] * m[7] - m[4] * m[6],
        m[1] * m[6] - m[0] * m[7],
        m[0] * m[4] - m[1] * m[3],
    ]
}

pub fn invert(m: &Mat3) -> Option<Mat3> {
    let det = determinant(m);
    if det.abs() < SINGULAR_EPS || !det.is_finite() {
        return None;
    }
    let adj = adjugate(m);
    let mut inv = [0.0; 9];
    for i in 0..9 {
        inv[i] = adj[i] / det;
    }
    Some(inv)
}

pub fn transform_point(m: &Mat3, p: Point) -> Option<Point> {
    let w = m[6] * p.x + m[7] * p.y + m[8];
    if w.abs() < SINGULAR_EPS {
        return None;
    }
    Some(Point::new(
        (m[0] * p.x + m[1] * p.y + m[2]) / w,
        (m[3] * p.x + m[4] * p.y + m[5]) / w,
    ))
}

/// Bilinear sample of an RGBA8 raster at continuous pixel coordinates, clamped at the edges.
fn bilinear_rgba(img: &Raster, u: f64, v: f64) -> [u8; 4] {
    let (cols, rows) = (img.width as usize, img.height as usize);
    let u = u.clamp(0.0, (cols - 1) as f64);
    let v = v.clamp(0.0, (rows - 1) as f64);

    let iu0 = u.trunc() as usize;
    let iv0 = v.trunc() as usize;
    let iu1 = (iu0 + 1).min(cols - 1);
    let iv1 = (iv0 + 1).min(rows - 1);
    let (fu, fv) = (u.fract(), v.fract());

    let w00 = (1.0 - fu) * (1.0 - fv);
    let w01 = fu * (1.0 - fv);
    let w10 = (1.0 - fu) * fv;
    let w11 = fu * fv;

    let at = |r: usize, c: usize, k: usize| f64::from(img.data[(r * cols + c) * 4 + k]);
    let mut px = [0u8; 4];
    for (k, out) in px.iter_mut().enumerate() {
        let value = at(iv0, iu0, k) * w00
            + at(iv0, iu1, k) * w01
            + at(iv1, iu0, k) * w10
            + at(iv1, iu1, k) * w11;
        *out = value.round().clamp(0.0, 255.0) as u8;
    }
    px
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
    }

    #[test]
    fn solves_scale_and_translation() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 5.0),
        ];
        let dst = src.map(|p| Point::new(p.x * 2.0 + 3.0, p.y * 2.0 + 4.0));
        let m = solve_homography(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            assert!(approx(transform_point(&m, *s).unwrap(), *d));
        }
    }

    #[test]
    fn maps_corners_of_skewed_quad_and_inverts() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 80.0),
            Point::new(0.0, 80.0),
        ];
        let dst = [
            Point::new(12.0, 8.0),
            Point::new(90.0, 15.0),
            Point::new(85.0, 70.0),
            Point::new(5.0, 60.0),
        ];
        let m = solve_homography(&src, &dst).unwrap();
        let inv = invert(&m).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            assert!(approx(transform_point(&m, *s).unwrap(), *d));
            assert!(approx(transform_point(&inv, *d).unwrap(), *s));
        }
    }

    #[test]
    fn collinear_targets_are_singular() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let dst = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(3.0, 3.0),
        ];
        let solved = solve_homography(&src, &dst).and_then(|m| invert(&m));
        assert!(solved.is_none());
    }

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = Raster::from_rgba8_premul(2, 1, vec![0, 0, 0, 255, 200, 100, 50, 255]).unwrap();
        assert_eq!(bilinear_rgba(&img, 0.0, 0.0), [0, 0, 0, 255]);
        assert_eq!(bilinear_rgba(&img, 1.0, 0.0), [200, 100, 50, 255]);
        assert_eq!(bilinear_rgba(&img, 0.5, 0.0), [100, 50, 25, 255]);
        assert_eq!(bilinear_rgba(&img, -4.0, 9.0), [0, 0, 0, 255]);
    }
}
