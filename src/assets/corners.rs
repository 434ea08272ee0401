//! Chroma-corner metadata.
//!
//! Base images carry their printable surface as a `tEXt` chunk keyed `Comment` whose value is
//! `chroma=x0,y0;x1,y1;x2,y2;x3,y3`. Extraction never fails: anything malformed is skipped and
//! scanning continues with the next chunk.

use tracing::debug;

use crate::{
    assets::chunks::{ChunkIter, insert_after_header},
    foundation::{
        core::{CornerSet, Point2D},
        error::MockupResult,
    },
};

pub const COMMENT_KEY: &str = "Comment";
pub const CHROMA_PREFIX: &str = "chroma=";

/// Decoded `(key, value)` of every well-formed `tEXt` chunk, in file order.
///
/// Chunks without a null separator are skipped.
pub fn text_chunks(bytes: &[u8]) -> impl Iterator<Item = (String, String)> + '_ {
    ChunkIter::new(bytes)
        .filter(|c| c.is(b"tEXt"))
        .filter_map(|c| split_text_chunk(c.data))
}

/// Find the chroma corners of a base image, or `None` when absent or malformed.
pub fn extract_corners(bytes: &[u8]) -> Option<CornerSet> {
    let found = text_chunks(bytes)
        .filter(|(key, _)| key == COMMENT_KEY)
        .find_map(|(_, value)| parse_chroma_comment(&value));
    match &found {
        Some(corners) => debug!(?corners, "chroma corners found"),
        None => debug!("no chroma corners in base image"),
    }
    found
}

/// Parse a `chroma=` comment value into exactly four points.
pub fn parse_chroma_comment(value: &str) -> Option<CornerSet> {
    let rest = value.strip_prefix(CHROMA_PREFIX)?;
    let points = rest
        .split(';')
        .map(parse_pair)
        .collect::<Option<Vec<Point2D>>>()?;
    CornerSet::from_points(&points)
}

pub fn format_chroma_comment(corners: &CornerSet) -> String {
    let pairs: Vec<String> = corners
        .points()
        .iter()
        .map(|p| format!("{},{}", p.x, p.y))
        .collect();
    format!("{CHROMA_PREFIX}{}", pairs.join(";"))
}

/// Annotate a PNG with chroma corners by inserting a `Comment` text chunk after `IHDR`.
pub fn embed_corners(png: &[u8], corners: &CornerSet) -> MockupResult<Vec<u8>> {
    let mut payload = COMMENT_KEY.as_bytes().to_vec();
    payload.push(0);
    payload.extend(encode_latin1(&format_chroma_comment(corners)));
    insert_after_header(png, b"tEXt", &payload)
}

fn split_text_chunk(data: &[u8]) -> Option<(String, String)> {
    let sep = data.iter().position(|b| *b == 0)?;
    let key = decode_latin1(&data[..sep]);
    let value = decode_latin1(&data[sep + 1..]);
    Some((key, value))
}

fn parse_pair(pair: &str) -> Option<Point2D> {
    let (x, y) = pair.split_once(',')?;
    let x: f64 = x.trim().parse().ok()?;
    let y: f64 = y.trim().parse().ok()?;
    (x.is_finite() && y.is_finite()).then(|| Point2D::new(x, y))
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| char::from(*b)).collect()
}

fn encode_latin1(s: &str) -> impl Iterator<Item = u8> + '_ {
    s.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
}
