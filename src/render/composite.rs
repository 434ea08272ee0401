use crate::{
    assets::decode::Raster,
    foundation::{
        error::{MockupError, MockupResult},
        math::{add_sat_u8, mul_div255},
    },
};

pub type PremulRgba8 = [u8; 4];

/// Source-over for one premultiplied pixel.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    match src[3] {
        0 => dst,
        255 => src,
        sa => {
            let inv = 255 - u16::from(sa);
            let mut out = src;
            for (o, d) in out.iter_mut().zip(dst) {
                *o = add_sat_u8(*o, mul_div255(u16::from(d), inv));
            }
            out
        }
    }
}

/// Lay `layer` over `canvas` pixel by pixel. Both must be premultiplied RGBA of one size.
pub fn stack_layer(canvas: &mut Raster, layer: &Raster) -> MockupResult<()> {
    if canvas.channels != 4 || layer.channels != 4 || canvas.data.len() != layer.data.len() {
        return Err(MockupError::contract(
            "stack_layer expects equal-sized premultiplied rgba rasters",
        ));
    }
    for (d, s) in canvas.data.chunks_exact_mut(4).zip(layer.data.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Stack `warped` and then `base` onto a transparent canvas the size of `base`.
///
/// The base goes on top: the artwork only shows through pixels where the base is already
/// (partly) transparent.
pub fn composite_mockup(base: Raster, warped: Raster) -> MockupResult<Raster> {
    if (base.width, base.height) != (warped.width, warped.height) {
        return Err(MockupError::contract(format!(
            "layer size mismatch: base {}x{}, warped {}x{}",
            base.width, base.height, warped.width, warped.height
        )));
    }

    let base = base.into_rgba_premul();
    let warped = warped.into_rgba_premul();
    let mut canvas = Raster::transparent(base.canvas());

    for layer in [&warped, &base] {
        stack_layer(&mut canvas, layer)?;
    }
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Canvas;

    fn solid(width: u32, height: u32, px: PremulRgba8) -> Raster {
        Raster::from_rgba8_premul(width, height, px.repeat((width * height) as usize)).unwrap()
    }

    #[test]
    fn clear_and_opaque_sources_short_circuit() {
        let dst = [10, 20, 30, 40];
        assert_eq!(over(dst, [0, 0, 0, 0]), dst);
        assert_eq!(over(dst, [255, 0, 0, 255]), [255, 0, 0, 255]);
    }

    #[test]
    fn half_alpha_blends_with_destination() {
        // 50% red over opaque blue
        let out = over([0, 0, 255, 255], [128, 0, 0, 128]);
        assert_eq!(out[3], 255);
        assert_eq!(out[0], 128);
        assert_eq!(out[2], 127);
    }

    #[test]
    fn opaque_base_hides_artwork() {
        let base = solid(2, 2, [0, 0, 255, 255]);
        let art = solid(2, 2, [255, 0, 0, 255]);
        let out = composite_mockup(base.clone(), art).unwrap();
        assert_eq!(out.data, base.data);
    }

    #[test]
    fn transparent_base_reveals_artwork() {
        let base = Raster::transparent(Canvas {
            width: 2,
            height: 1,
        });
        let art = solid(2, 1, [255, 0, 0, 255]);
        let out = composite_mockup(base, art.clone()).unwrap();
        assert_eq!(out.data, art.data);
    }

    #[test]
    fn stacking_mismatched_layers_is_rejected() {
        let mut canvas = solid(2, 2, [0; 4]);
        assert!(stack_layer(&mut canvas, &solid(1, 1, [0; 4])).is_err());

        let err = composite_mockup(solid(2, 2, [0; 4]), solid(3, 2, [0; 4])).unwrap_err();
        assert!(matches!(err, MockupError::ContractViolation(_)));
    }
}
