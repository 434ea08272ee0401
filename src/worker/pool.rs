use std::{
    io::Write,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        mpsc::{self, Receiver},
    },
};

use tracing::{debug, error};

use crate::{
    config::MockupConfig,
    foundation::error::{MockupError, MockupResult},
    pipeline::{MockupRequest, Outcome, panic_message, render_mockup},
    worker::frame::{Frame, FrameSink, FrameWriter, collect_output},
};

/// Runs mockup requests on a thread pool, one isolated task per request.
///
/// Tasks share nothing mutable: each owns its request buffers and talks back only through its
/// own frame channel. A task that panics reports an `error` frame; the pool and its other tasks
/// carry on.
pub struct MockupPool {
    pool: rayon::ThreadPool,
    cfg: Arc<MockupConfig>,
}

impl MockupPool {
    pub fn new(cfg: MockupConfig) -> MockupResult<Self> {
        cfg.validate()?;
        let pool = build_thread_pool(cfg.threads)?;
        Ok(Self {
            pool,
            cfg: Arc::new(cfg),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue one request. Its frames arrive on the returned stream.
    pub fn submit(&self, req: MockupRequest) -> FrameStream {
        let cfg = Arc::clone(&self.cfg);
        self.spawn_job(move |sink| render_mockup(&req, &cfg, sink))
    }

    /// Queue every request; streams are returned in request order.
    pub fn submit_all(&self, reqs: impl IntoIterator<Item = MockupRequest>) -> Vec<FrameStream> {
        reqs.into_iter().map(|req| self.submit(req)).collect()
    }

    pub(crate) fn spawn_job<F>(&self, job: F) -> FrameStream
    where
        F: FnOnce(&mut dyn Write) -> Outcome + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.pool.spawn(move || run_isolated(job, tx));
        FrameStream { rx }
    }
}

fn run_isolated<F, S>(job: F, mut sink: S)
where
    F: FnOnce(&mut dyn Write) -> Outcome,
    S: FrameSink + Clone,
{
    let task_sink = sink.clone();
    let run = catch_unwind(AssertUnwindSafe(move || {
        let mut writer = FrameWriter::new(task_sink);
        let outcome = job(&mut writer);
        writer.finish(&outcome).map(drop)
    }));

    let failure = match run {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            error!(panic = %msg, "mockup worker panicked");
            MockupError::worker(format!("worker panicked: {msg}"))
        }
    };
    if sink.send_frame(Frame::Error(failure.to_string())).is_err() {
        debug!("frame receiver gone before worker finished");
    }
}

/// Receiving end of one request's frames.
#[derive(Debug)]
pub struct FrameStream {
    rx: Receiver<Frame>,
}

impl FrameStream {
    /// Block until the request finishes and return its output bytes (`None` when skipped).
    pub fn collect_output(self) -> MockupResult<Option<Vec<u8>>> {
        collect_output(self.map(Ok))
    }
}

impl Iterator for FrameStream {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

fn build_thread_pool(threads: Option<usize>) -> MockupResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(MockupError::config("pool 'threads' must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("mockwarp-worker-{i}"))
        .panic_handler(|payload| {
            error!(panic = %panic_message(payload.as_ref()), "uncaught panic in mockup worker");
        });
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| MockupError::worker(format!("failed to build rayon thread pool: {e}")))
}
