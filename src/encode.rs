//! Encoding rasters into PNG or JPEG byte streams.
//!
//! Encoders write straight into the caller's sink as they go; nothing buffers the whole output.

use std::io::Write;

use image::{ExtendedColorType, ImageEncoder as _};

use crate::{
    assets::decode::Raster,
    config::OutputFormat,
    foundation::{
        error::{MockupError, MockupResult},
        math::mul_div255,
    },
};

/// JPEG has no alpha; transparent areas are flattened over this color.
pub const JPEG_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Encode `raster` in `format`, streaming into `sink`.
pub fn encode_raster<W: Write>(raster: &Raster, format: OutputFormat, sink: W) -> MockupResult<()> {
    if raster.is_empty() {
        return Err(MockupError::encode("cannot encode an empty raster"));
    }
    let (w, h) = (raster.width, raster.height);

    match format {
        OutputFormat::Png => {
            let rgba = raster.to_straight_rgba8();
            image::codecs::png::PngEncoder::new(sink)
                .write_image(&rgba, w, h, ExtendedColorType::Rgba8)
                .map_err(|e| MockupError::encode(format!("png encode: {e}")))
        }
        OutputFormat::Jpeg { quality } => {
            let rgb = flatten_to_rgb8(&raster.clone().into_rgba_premul().data, JPEG_BACKGROUND);
            image::codecs::jpeg::JpegEncoder::new_with_quality(sink, quality.clamp(1, 100))
                .write_image(&rgb, w, h, ExtendedColorType::Rgb8)
                .map_err(|e| MockupError::encode(format!("jpeg encode: {e}")))
        }
    }
}

/// Composite premultiplied RGBA over an opaque background color.
fn flatten_to_rgb8(premul_rgba: &[u8], bg: [u8; 3]) -> Vec<u8> {
    let mut out = Vec::with_capacity(premul_rgba.len() / 4 * 3);
    for px in premul_rgba.chunks_exact(4) {
        let inv = 255u16 - u16::from(px[3]);
        for c in 0..3 {
            out.push(px[c].saturating_add(mul_div255(u16::from(bg[c]), inv)));
        }
    }
    out
}

/// A [`Write`] adapter that counts the bytes passed through it.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
