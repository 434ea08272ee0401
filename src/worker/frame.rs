use std::{
    io::{self, Read, Write},
    sync::mpsc::Sender,
};

use crate::{
    foundation::error::{MockupError, MockupResult},
    pipeline::Outcome,
};

const TAG_DATA: u8 = b'D';
const TAG_END: u8 = b'E';
const TAG_ERROR: u8 = b'X';

/// Payload size at which [`FrameWriter`] emits a `data` frame.
pub const DATA_FRAME_CHUNK: usize = 64 * 1024;
/// Frames declaring a longer payload are rejected as corrupt.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// One message on a worker's result channel.
///
/// A run emits zero or more `Data` frames followed by exactly one `End` or `Error`. A skipped
/// request is `End` with no data before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Data(Vec<u8>),
    End,
    Error(String),
}

impl Frame {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Data(_))
    }

    /// Wire form: tag byte, payload length as u32 BE, payload.
    ///
    /// Payloads longer than [`MAX_FRAME_LEN`] are rejected before anything is written, so every
    /// frame this writes can be read back by [`Frame::read_from`].
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let (tag, payload): (u8, &[u8]) = match self {
            Self::Data(bytes) => (TAG_DATA, bytes.as_slice()),
            Self::End => (TAG_END, &[][..]),
            Self::Error(msg) => (TAG_ERROR, msg.as_bytes()),
        };
        if payload.len() > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame payload {} exceeds limit {MAX_FRAME_LEN}", payload.len()),
            ));
        }
        let len = u32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame payload too large"))?;
        w.write_all(&[tag])?;
        w.write_all(&len.to_be_bytes())?;
        w.write_all(payload)
    }

    /// Read one frame; `Ok(None)` on a clean end of stream before any header byte.
    pub fn read_from<R: Read>(r: &mut R) -> MockupResult<Option<Self>> {
        let mut tag = [0u8; 1];
        match r.read_exact(&mut tag) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(MockupError::worker(format!("read frame tag: {e}"))),
        }

        let mut len = [0u8; 4];
        r.read_exact(&mut len)
            .map_err(|e| MockupError::worker(format!("read frame length: {e}")))?;
        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_FRAME_LEN {
            return Err(MockupError::worker(format!(
                "frame length {len} exceeds limit {MAX_FRAME_LEN}"
            )));
        }

        let mut payload = vec![0u8; len];
        r.read_exact(&mut payload)
            .map_err(|e| MockupError::worker(format!("read frame payload: {e}")))?;

        match tag[0] {
            TAG_DATA => Ok(Some(Self::Data(payload))),
            TAG_END if payload.is_empty() => Ok(Some(Self::End)),
            TAG_END => Err(MockupError::worker("end frame carries a payload")),
            TAG_ERROR => Ok(Some(Self::Error(
                String::from_utf8_lossy(&payload).into_owned(),
            ))),
            other => Err(MockupError::worker(format!("unknown frame tag 0x{other:02x}"))),
        }
    }
}

/// Destination for frames: an in-process channel or an encoded byte stream.
pub trait FrameSink: Send {
    fn send_frame(&mut self, frame: Frame) -> MockupResult<()>;
}

impl FrameSink for Sender<Frame> {
    fn send_frame(&mut self, frame: Frame) -> MockupResult<()> {
        self.send(frame)
            .map_err(|_| MockupError::worker("frame receiver hung up"))
    }
}

/// Encodes frames onto any byte stream (pipe, socket, buffer).
#[derive(Debug)]
pub struct WireSink<W>(pub W);

impl<W: Write + Send> FrameSink for WireSink<W> {
    fn send_frame(&mut self, frame: Frame) -> MockupResult<()> {
        frame
            .write_to(&mut self.0)
            .and_then(|()| self.0.flush())
            .map_err(|e| MockupError::worker(format!("write frame: {e}")))
    }
}

/// A [`Write`] adapter that chops output bytes into `data` frames.
pub struct FrameWriter<S: FrameSink> {
    sink: S,
    pending: Vec<u8>,
}

impl<S: FrameSink> FrameWriter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pending: Vec::with_capacity(DATA_FRAME_CHUNK),
        }
    }

    /// Flush pending data and send the terminal frame for `outcome`.
    pub fn finish(mut self, outcome: &Outcome) -> MockupResult<S> {
        let terminal = match outcome {
            Outcome::Failed(err) => Frame::Error(err.to_string()),
            Outcome::Written { .. } | Outcome::Skipped(_) => {
                self.emit_pending()?;
                Frame::End
            }
        };
        self.sink.send_frame(terminal)?;
        Ok(self.sink)
    }

    fn emit_pending(&mut self) -> MockupResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.pending, Vec::with_capacity(DATA_FRAME_CHUNK));
        self.sink.send_frame(Frame::Data(chunk))
    }
}

impl<S: FrameSink> Write for FrameWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = DATA_FRAME_CHUNK - self.pending.len();
        let n = buf.len().min(room);
        self.pending.extend_from_slice(&buf[..n]);
        if self.pending.len() >= DATA_FRAME_CHUNK {
            self.emit_pending().map_err(io::Error::other)?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_pending().map_err(io::Error::other)
    }
}

/// Iterates frames decoded from a byte stream written by [`WireSink`].
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    done: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, done: false }
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = MockupResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match Frame::read_from(&mut self.inner) {
            Ok(Some(frame)) => {
                self.done = frame.is_terminal();
                Some(Ok(frame))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Drain frames into the output bytes.
///
/// `Ok(None)` means the run ended without output (a skip). An `error` frame, a stream that stops
/// before its terminal frame, or a corrupt frame is an error.
pub fn collect_output<I>(frames: I) -> MockupResult<Option<Vec<u8>>>
where
    I: IntoIterator<Item = MockupResult<Frame>>,
{
    let mut out = Vec::new();
    for frame in frames {
        match frame? {
            Frame::Data(bytes) => out.extend_from_slice(&bytes),
            Frame::End => return Ok((!out.is_empty()).then_some(out)),
            Frame::Error(msg) => return Err(MockupError::worker(msg)),
        }
    }
    Err(MockupError::worker("frame stream ended without a terminal frame"))
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, sync::mpsc};

    use super::*;
    use crate::pipeline::SkipReason;

    #[test]
    fn wire_codec_reads_back_what_it_writes() {
        let frames = vec![
            Frame::Data(vec![1, 2, 3]),
            Frame::Data(Vec::new()),
            Frame::Error("bad asset".to_string()),
        ];
        let mut buf = Vec::new();
        for f in &frames {
            f.write_to(&mut buf).unwrap();
        }
        assert_eq!(&buf[..5], &[b'D', 0, 0, 0, 3]);

        let decoded: Vec<Frame> = FrameReader::new(Cursor::new(buf))
            .collect::<MockupResult<_>>()
            .unwrap();
        assert_eq!(decoded, frames);
    }

    #[test]
    fn reader_stops_after_terminal_frame() {
        let mut buf = Vec::new();
        Frame::End.write_to(&mut buf).unwrap();
        Frame::Data(vec![9]).write_to(&mut buf).unwrap();
        let frames: Vec<_> = FrameReader::new(Cursor::new(buf)).collect();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn corrupt_frames_are_errors() {
        let unknown = vec![b'Q', 0, 0, 0, 0];
        assert!(Frame::read_from(&mut Cursor::new(unknown)).is_err());

        let truncated = vec![b'D', 0, 0, 0, 9, 1, 2];
        assert!(Frame::read_from(&mut Cursor::new(truncated)).is_err());

        let huge = [vec![b'D'], u32::MAX.to_be_bytes().to_vec()].concat();
        assert!(Frame::read_from(&mut Cursor::new(huge)).is_err());

        assert!(Frame::read_from(&mut Cursor::new(Vec::new())).unwrap().is_none());
    }

    #[test]
    fn oversized_payload_is_not_written() {
        let mut buf = Vec::new();
        let err = Frame::Data(vec![0u8; MAX_FRAME_LEN + 1])
            .write_to(&mut buf)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(buf.is_empty());
    }

    #[test]
    fn writer_chunks_large_output() {
        let (tx, rx) = mpsc::channel();
        let mut w = FrameWriter::new(tx);
        let payload = vec![7u8; DATA_FRAME_CHUNK * 2 + 10];
        w.write_all(&payload).unwrap();
        drop(w.finish(&Outcome::Written { bytes: 0 }).unwrap());

        let frames: Vec<Frame> = rx.iter().collect();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[3], Frame::End);
        let out = collect_output(frames.into_iter().map(Ok)).unwrap().unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn skipped_run_is_end_without_data() {
        let (tx, rx) = mpsc::channel();
        let w = FrameWriter::new(tx);
        drop(w.finish(&Outcome::Skipped(SkipReason::NoCorners)).unwrap());
        let frames: Vec<Frame> = rx.iter().collect();
        assert_eq!(frames, vec![Frame::End]);
        assert_eq!(collect_output(frames.into_iter().map(Ok)).unwrap(), None);
    }

    #[test]
    fn failed_run_ends_with_error_frame() {
        let mut buf = Vec::new();
        let mut w = FrameWriter::new(WireSink(&mut buf));
        w.write_all(b"partial").unwrap();
        w.finish(&Outcome::Failed(MockupError::encode("disk full")))
            .unwrap();

        let err = collect_output(FrameReader::new(Cursor::new(buf))).unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn missing_terminal_frame_is_an_error() {
        let frames = vec![Ok(Frame::Data(vec![1]))];
        assert!(collect_output(frames).is_err());
    }
}
