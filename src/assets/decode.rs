use crate::foundation::{
    core::Canvas,
    error::{MockupError, MockupResult},
    math::mul_div255,
};

/// An owned 8-bit raster.
///
/// `data` is row-major and tightly packed with `channels` bytes per pixel. Stages hand rasters
/// on by value; nothing keeps a second reference to a buffer it has passed along.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    /// 3 (RGB) or 4 (RGBA).
    pub channels: u8,
    pub has_alpha: bool,
    /// Whether color channels are already multiplied by alpha.
    pub premultiplied: bool,
    pub data: Vec<u8>,
}

impl Raster {
    /// Fully transparent premultiplied RGBA raster.
    pub fn transparent(canvas: Canvas) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            channels: 4,
            has_alpha: true,
            premultiplied: true,
            data: vec![0u8; canvas.pixel_count() * 4],
        }
    }

    pub fn from_rgba8_premul(width: u32, height: u32, data: Vec<u8>) -> MockupResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| MockupError::contract("raster size overflow"))?;
        if data.len() != expected {
            return Err(MockupError::contract(format!(
                "rgba8 buffer holds {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels: 4,
            has_alpha: true,
            premultiplied: true,
            data,
        })
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// RGBA value at `(x, y)`; RGB rasters report opaque alpha.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the raster, or if `data` is shorter than
    /// `width * height * channels`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let c = usize::from(self.channels);
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * c;
        let px = &self.data[idx..idx + c];
        if c == 4 {
            [px[0], px[1], px[2], px[3]]
        } else {
            [px[0], px[1], px[2], 255]
        }
    }

    /// Convert to premultiplied RGBA, adding an opaque alpha channel when missing.
    pub fn into_rgba_premul(self) -> Self {
        if self.channels == 4 && self.premultiplied {
            return self;
        }

        let mut data = if self.channels == 4 {
            self.data
        } else {
            let mut out = Vec::with_capacity(self.data.len() / 3 * 4);
            for px in self.data.chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
            out
        };
        premultiply_rgba8_in_place(&mut data);

        Self {
            width: self.width,
            height: self.height,
            channels: 4,
            has_alpha: true,
            premultiplied: true,
            data,
        }
    }

    /// Straight-alpha RGBA8 bytes, as encoders expect them.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let rgba = self.clone().into_rgba_premul();
        let mut data = rgba.data;
        unpremultiply_rgba8_in_place(&mut data);
        data
    }
}

/// Decode image bytes into a raster, keeping the source channel layout (RGB or RGBA).
pub fn decode_raster(bytes: &[u8]) -> MockupResult<Raster> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| MockupError::load(format!("decode image from memory: {e}")))?;
    let (width, height) = (dyn_img.width(), dyn_img.height());
    if width == 0 || height == 0 {
        return Err(MockupError::load(format!(
            "decoded image is empty ({width}x{height})"
        )));
    }

    let has_alpha = dyn_img.color().has_alpha();
    let (channels, data) = if has_alpha {
        (4, dyn_img.to_rgba8().into_raw())
    } else {
        (3, dyn_img.to_rgb8().into_raw())
    };

    Ok(Raster {
        width,
        height,
        channels,
        has_alpha,
        premultiplied: false,
        data,
    })
}

/// Decode image bytes straight into premultiplied RGBA.
pub fn decode_rgba_premul(bytes: &[u8]) -> MockupResult<Raster> {
    decode_raster(bytes).map(Raster::into_rgba_premul)
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255(u16::from(px[0]), a);
        px[1] = mul_div255(u16::from(px[1]), a);
        px[2] = mul_div255(u16::from(px[2]), a);
    }
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn encode_png(img: image::DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    #[should_panic]
    fn pixel_outside_raster_panics() {
        let raster = Raster::from_rgba8_premul(2, 2, vec![0u8; 16]).unwrap();
        let _ = raster.pixel(2, 0);
    }

    #[test]
    fn decode_png_rgba_dimensions_and_layout() {
        let img = image::RgbaImage::from_raw(1, 1, vec![100, 50, 200, 128]).unwrap();
        let raster = decode_raster(&encode_png(image::DynamicImage::ImageRgba8(img))).unwrap();
        assert_eq!((raster.width, raster.height), (1, 1));
        assert_eq!(raster.channels, 4);
        assert!(raster.has_alpha);
        assert!(!raster.premultiplied);
        assert_eq!(raster.data, vec![100, 50, 200, 128]);
    }

    #[test]
    fn decode_png_rgb_keeps_three_channels() {
        let img = image::RgbImage::from_pixel(2, 3, image::Rgb([1, 2, 3]));
        let raster = decode_raster(&encode_png(image::DynamicImage::ImageRgb8(img))).unwrap();
        assert_eq!(raster.channels, 3);
        assert!(!raster.has_alpha);
        assert_eq!(raster.data.len(), 2 * 3 * 3);
        assert_eq!(raster.pixel(1, 2), [1, 2, 3, 255]);
    }

    #[test]
    fn premul_conversion_matches_expected_rounding() {
        let img = image::RgbaImage::from_raw(1, 1, vec![100, 50, 200, 128]).unwrap();
        let raster = decode_rgba_premul(&encode_png(image::DynamicImage::ImageRgba8(img))).unwrap();
        assert!(raster.premultiplied);
        assert_eq!(
            raster.data,
            vec![
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128u8
            ]
        );
    }

    #[test]
    fn straight_rgba_of_opaque_pixels_is_lossless() {
        let raster = Raster {
            width: 1,
            height: 2,
            channels: 3,
            has_alpha: false,
            premultiplied: false,
            data: vec![10, 20, 30, 40, 50, 60],
        };
        assert_eq!(
            raster.to_straight_rgba8(),
            vec![10, 20, 30, 255, 40, 50, 60, 255]
        );
    }

    #[test]
    fn garbage_bytes_are_a_load_error() {
        let err = decode_raster(b"definitely not an image").unwrap_err();
        assert!(matches!(err, MockupError::Load(_)));
    }

    #[test]
    fn from_rgba8_premul_checks_length() {
        assert!(Raster::from_rgba8_premul(2, 2, vec![0; 16]).is_ok());
        assert!(Raster::from_rgba8_premul(2, 2, vec![0; 15]).is_err());
    }
}
