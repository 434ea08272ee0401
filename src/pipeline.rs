use std::{
    io::Write,
    panic::{AssertUnwindSafe, catch_unwind},
};

use tracing::{debug, error, info};

use crate::{
    assets::{
        corners::extract_corners,
        decode::{Raster, decode_raster, decode_rgba_premul},
    },
    config::MockupConfig,
    encode::{CountingWriter, encode_raster},
    foundation::{
        core::{ColorMarkers, CornerSet},
        error::{MockupError, MockupResult},
    },
    render::{composite::composite_mockup, warp::warp_perspective},
};

/// One mockup job: the annotated base photo and the artwork to place on it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MockupRequest {
    /// Encoded base image carrying a `chroma=` comment.
    pub base: Vec<u8>,
    /// Encoded artwork image.
    pub artwork: Vec<u8>,
    pub markers: Option<ColorMarkers>,
}

impl MockupRequest {
    pub fn new(base: Vec<u8>, artwork: Vec<u8>) -> Self {
        Self {
            base,
            artwork,
            markers: None,
        }
    }

    pub fn with_markers(mut self, markers: ColorMarkers) -> Self {
        self.markers = Some(markers);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The base image has no usable chroma comment.
    NoCorners,
    /// More than one side of the quad has zero length.
    DegenerateQuad,
}

/// What a pipeline run produced. Only `Written` put bytes into the sink successfully.
#[derive(Debug)]
pub enum Outcome {
    Written { bytes: u64 },
    Skipped(SkipReason),
    Failed(MockupError),
}

impl Outcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    pub fn bytes_written(&self) -> u64 {
        match self {
            Self::Written { bytes } => *bytes,
            _ => 0,
        }
    }
}

/// Extract corners, warp, composite and encode one mockup into `sink`.
///
/// Never returns an error and never unwinds: skips and failures are logged and reported through
/// the [`Outcome`]. Callers that only watch the sink can treat "no bytes" as "no mockup".
#[tracing::instrument(
    skip_all,
    fields(base_len = req.base.len(), artwork_len = req.artwork.len())
)]
pub fn render_mockup(req: &MockupRequest, cfg: &MockupConfig, sink: &mut dyn Write) -> Outcome {
    let run = catch_unwind(AssertUnwindSafe(|| run_stages(req, cfg, sink)));
    match run {
        Ok(Ok(outcome)) => {
            match &outcome {
                Outcome::Written { bytes } => debug!(bytes, "mockup written"),
                Outcome::Skipped(reason) => info!(?reason, "mockup skipped"),
                Outcome::Failed(_) => {}
            }
            outcome
        }
        Ok(Err(err)) => {
            error!(%err, "mockup failed");
            Outcome::Failed(err)
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            error!(panic = %msg, "mockup pipeline panicked");
            Outcome::Failed(MockupError::worker(format!("pipeline panicked: {msg}")))
        }
    }
}

fn run_stages(
    req: &MockupRequest,
    cfg: &MockupConfig,
    sink: &mut dyn Write,
) -> MockupResult<Outcome> {
    let Some(corners) = extract_corners(&req.base) else {
        return Ok(Outcome::Skipped(SkipReason::NoCorners));
    };
    if let Some(markers) = &req.markers {
        debug!(?markers, "color markers carried, not consumed by the warp");
    }

    let artwork = decode_raster(&req.artwork).map_err(|e| load_context("artwork", e))?;
    let base = decode_rgba_premul(&req.base).map_err(|e| load_context("base", e))?;

    let Some(composite) = warp_and_composite(base, artwork, &corners, cfg)? else {
        return Ok(Outcome::Skipped(SkipReason::DegenerateQuad));
    };

    let mut counting = CountingWriter::new(sink);
    encode_raster(&composite, cfg.output, &mut counting)?;
    counting
        .flush()
        .map_err(|e| MockupError::encode(format!("flush output sink: {e}")))?;
    Ok(Outcome::Written {
        bytes: counting.written(),
    })
}

fn warp_and_composite(
    base: Raster,
    artwork: Raster,
    corners: &CornerSet,
    cfg: &MockupConfig,
) -> MockupResult<Option<Raster>> {
    let canvas = base.canvas();
    match warp_perspective(artwork, corners, canvas, &cfg.warp)? {
        Some(warped) => composite_mockup(base, warped).map(Some),
        None => Ok(None),
    }
}

fn load_context(which: &str, err: MockupError) -> MockupError {
    match err {
        MockupError::Load(msg) => MockupError::load(format!("{which}: {msg}")),
        other => other,
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
