//! mockwarp composites rectangular artwork onto product photographs.
//!
//! A base photo carries the four corners of its printable surface as a PNG `tEXt` comment
//! (`chroma=x,y;x,y;x,y;x,y`). The pipeline reads those corners, warps the artwork onto the
//! quadrilateral with a strip-decomposition warp, layers the base on top and streams the
//! encoded result into a byte sink:
//!
//! - [`render_mockup`] runs one request synchronously and never fails loudly
//! - [`MockupPool`] runs many requests on isolated workers and streams [`Frame`]s back
#![forbid(unsafe_code)]

pub mod assets;
pub mod config;
pub mod encode;
pub mod foundation;
pub mod pipeline;
pub mod render;
pub mod worker;

pub use crate::assets::corners::{
    embed_corners, extract_corners, format_chroma_comment, parse_chroma_comment,
};
pub use crate::assets::decode::{Raster, decode_raster};
pub use crate::config::{MockupConfig, OutputFormat, WarpConfig, WarpMethod};
pub use crate::encode::{CountingWriter, encode_raster};
pub use crate::foundation::core::{Canvas, ColorMarkers, CornerSet, Point2D};
pub use crate::foundation::error::{MockupError, MockupResult};
pub use crate::pipeline::{MockupRequest, Outcome, SkipReason, render_mockup};
pub use crate::render::composite::composite_mockup;
pub use crate::render::warp::{WarpContext, warp_perspective};
pub use crate::worker::frame::{
    Frame, FrameReader, FrameSink, FrameWriter, WireSink, collect_output,
};
pub use crate::worker::pool::{FrameStream, MockupPool};
