use crate::foundation::error::{MockupError, MockupResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// A corner coordinate in base-image pixel space.
pub type Point2D = Point;

/// Destination canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> MockupResult<Self> {
        if width == 0 || height == 0 {
            return Err(MockupError::contract(format!(
                "canvas must be non-empty, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// Four corners of the printable surface, wound top-left, top-right, bottom-right,
/// bottom-left.
///
/// There is no way to build a `CornerSet` with fewer or more than four points; absence is
/// expressed as `Option<CornerSet>`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CornerSet([Point2D; 4]);

impl CornerSet {
    pub fn new(
        top_left: Point2D,
        top_right: Point2D,
        bottom_right: Point2D,
        bottom_left: Point2D,
    ) -> Self {
        Self([top_left, top_right, bottom_right, bottom_left])
    }

    pub fn from_points(points: &[Point2D]) -> Option<Self> {
        let pts: [Point2D; 4] = points.try_into().ok()?;
        Some(Self(pts))
    }

    pub fn points(&self) -> &[Point2D; 4] {
        &self.0
    }

    pub fn top_left(&self) -> Point2D {
        self.0[0]
    }

    pub fn top_right(&self) -> Point2D {
        self.0[1]
    }

    pub fn bottom_right(&self) -> Point2D {
        self.0[2]
    }

    pub fn bottom_left(&self) -> Point2D {
        self.0[3]
    }

    /// Side lengths in order top, right, bottom, left.
    pub fn side_lengths(&self) -> [f64; 4] {
        let p = &self.0;
        [
            p[0].distance(p[1]),
            p[1].distance(p[2]),
            p[2].distance(p[3]),
            p[3].distance(p[0]),
        ]
    }

    pub fn zero_side_count(&self) -> usize {
        self.side_lengths()
            .iter()
            .filter(|len| **len <= f64::EPSILON)
            .count()
    }

    /// A quad with more than one collapsed side cannot carry any artwork.
    pub fn is_degenerate(&self) -> bool {
        self.zero_side_count() > 1
    }

    /// Closed polygon through the corners, in winding order.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        path.move_to(self.0[0]);
        for p in &self.0[1..] {
            path.line_to(*p);
        }
        path.close_path();
        path
    }

    pub fn bounds(&self) -> Rect {
        self.0[1..]
            .iter()
            .fold(Rect::from_points(self.0[0], self.0[0]), |r, p| {
                r.union_pt(*p)
            })
    }
}

/// Optional marker colors that travel with a request.
///
/// Reserved: the warp path carries them but does not read them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ColorMarkers {
    pub colors: [[u8; 3]; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square(size: f64) -> CornerSet {
        CornerSet::new(
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
        )
    }

    #[test]
    fn from_points_requires_exactly_four() {
        let pts = [Point::new(1.0, 2.0); 5];
        assert!(CornerSet::from_points(&pts[..3]).is_none());
        assert!(CornerSet::from_points(&pts).is_none());
        assert!(CornerSet::from_points(&pts[..4]).is_some());
    }

    #[test]
    fn side_lengths_follow_winding() {
        let c = CornerSet::new(
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 3.0),
            Point::new(0.0, 3.0),
        );
        assert_eq!(c.side_lengths(), [4.0, 3.0, 4.0, 3.0]);
        assert!(!c.is_degenerate());
    }

    #[test]
    fn single_collapsed_side_is_not_degenerate() {
        let c = CornerSet::new(
            Point::new(5.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        );
        assert_eq!(c.zero_side_count(), 1);
        assert!(!c.is_degenerate());
    }

    #[test]
    fn two_collapsed_sides_are_degenerate() {
        let p = Point::new(3.0, 3.0);
        let c = CornerSet::new(p, p, p, Point::new(9.0, 9.0));
        assert!(c.is_degenerate());
    }

    #[test]
    fn path_contains_interior_and_bounds_cover_corners() {
        use kurbo::Shape as _;

        let c = unit_square(10.0);
        let path = c.to_path();
        assert!(path.contains(Point::new(5.0, 5.0)));
        assert!(!path.contains(Point::new(15.0, 5.0)));
        assert_eq!(c.bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn canvas_rejects_zero_dimensions() {
        assert!(Canvas::new(0, 10).is_err());
        assert!(Canvas::new(10, 0).is_err());
        assert_eq!(Canvas::new(3, 2).unwrap().pixel_count(), 6);
    }
}
