use kurbo::Point;

pub(crate) fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

pub(crate) fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

pub(crate) fn lerp_point(a: Point, b: Point, t: f64) -> Point {
    a.lerp(b, t)
}

/// Angle of the vector `from -> to`, in radians.
pub(crate) fn angle_between(from: Point, to: Point) -> f64 {
    let d = to - from;
    d.y.atan2(d.x)
}
