/// Layer stacking of premultiplied RGBA rasters.
pub mod composite;
/// Projective alternative to the strip warp.
pub mod homography;
/// Strip-decomposition perspective warp.
pub mod warp;
