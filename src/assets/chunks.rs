//! Chunk framing for PNG containers.
//!
//! A PNG file is an 8-byte signature followed by chunks of `length (u32 BE) | tag (4 bytes) |
//! payload | crc (u32 BE)`. [`ChunkIter`] walks that framing without interpreting payloads, so
//! callers can look for metadata without decoding pixels.

use crate::foundation::error::{MockupError, MockupResult};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// One framed chunk, borrowed from the container bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub tag: [u8; 4],
    pub data: &'a [u8],
    pub crc: u32,
}

impl Chunk<'_> {
    pub fn is(&self, tag: &[u8; 4]) -> bool {
        &self.tag == tag
    }

    pub fn crc_matches(&self) -> bool {
        chunk_crc(&self.tag, self.data) == self.crc
    }
}

/// Iterator over the chunks of a PNG byte buffer.
///
/// Yields nothing for buffers without the PNG signature and stops at the first chunk whose
/// framing runs past the end of the buffer. Never panics on malformed input.
#[derive(Clone, Debug)]
pub struct ChunkIter<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ChunkIter<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        let pos = if bytes.starts_with(&PNG_SIGNATURE) {
            PNG_SIGNATURE.len()
        } else {
            bytes.len()
        };
        Self { bytes, pos }
    }

    /// Byte offset of the next chunk header.
    pub fn offset(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.bytes.get(self.pos..)?;
        let len = u32::from_be_bytes(rest.get(0..4)?.try_into().ok()?) as usize;
        let tag: [u8; 4] = rest.get(4..8)?.try_into().ok()?;
        let data_end = 8usize.checked_add(len)?;
        let data = rest.get(8..data_end)?;
        let crc = u32::from_be_bytes(rest.get(data_end..data_end + 4)?.try_into().ok()?);

        self.pos += data_end + 4;
        if &tag == b"IEND" {
            self.pos = self.bytes.len();
        }
        Some(Chunk { tag, data, crc })
    }
}

pub fn chunk_crc(tag: &[u8; 4], data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(tag);
    hasher.update(data);
    hasher.finalize()
}

/// Append one framed chunk (length, tag, payload, crc) to `out`.
pub fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) -> MockupResult<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| MockupError::metadata("chunk payload exceeds u32 length"))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(data);
    out.extend_from_slice(&chunk_crc(tag, data).to_be_bytes());
    Ok(())
}

/// Return a copy of `png` with an extra chunk placed directly after `IHDR`.
pub fn insert_after_header(png: &[u8], tag: &[u8; 4], data: &[u8]) -> MockupResult<Vec<u8>> {
    let mut iter = ChunkIter::new(png);
    match iter.next() {
        Some(first) if first.is(b"IHDR") => {}
        _ => return Err(MockupError::metadata("input is not a PNG with a leading IHDR")),
    }
    let split = iter.offset();

    let mut out = Vec::with_capacity(png.len() + data.len() + 12);
    out.extend_from_slice(&png[..split]);
    write_chunk(&mut out, tag, data)?;
    out.extend_from_slice(&png[split..]);
    Ok(out)
}
