/// Generic PNG chunk framing: iteration and insertion.
pub mod chunks;
/// Chroma-corner metadata read from and written to base images.
pub mod corners;
/// Decoding encoded image bytes into owned rasters.
pub mod decode;
