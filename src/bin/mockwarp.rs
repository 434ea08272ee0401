use std::{
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mockwarp", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite artwork onto an annotated base image.
    Render(RenderArgs),
    /// Embed chroma corners into a PNG base image.
    Annotate(AnnotateArgs),
    /// Print the chroma corners embedded in a base image.
    Corners(CornersArgs),
    /// Render every job of a JSON manifest on the worker pool.
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Base PNG carrying a `chroma=` comment.
    #[arg(long)]
    base: PathBuf,

    /// Artwork image.
    #[arg(long)]
    art: PathBuf,

    /// Output path.
    #[arg(long)]
    out: PathBuf,

    /// Optional JSON config; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output encoding.
    #[arg(long, value_enum)]
    format: Option<FormatChoice>,

    /// Warp method.
    #[arg(long, value_enum)]
    method: Option<MethodChoice>,
}

#[derive(Parser, Debug)]
struct AnnotateArgs {
    /// Input PNG.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG.
    #[arg(long)]
    out: PathBuf,

    /// Corners as `x,y;x,y;x,y;x,y` (top-left, top-right, bottom-right, bottom-left).
    #[arg(long)]
    corners: String,
}

#[derive(Parser, Debug)]
struct CornersArgs {
    /// Input PNG.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// JSON manifest: `{"jobs": [{"base": ..., "artwork": ..., "out": ...}]}`.
    #[arg(long)]
    manifest: PathBuf,

    /// Optional JSON config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads (overrides the config).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Png,
    Jpeg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MethodChoice {
    Strips,
    Homography,
}

#[derive(Debug, serde::Deserialize)]
struct Manifest {
    jobs: Vec<ManifestJob>,
}

#[derive(Debug, serde::Deserialize)]
struct ManifestJob {
    base: PathBuf,
    artwork: PathBuf,
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Annotate(args) => cmd_annotate(args),
        Command::Corners(args) => cmd_corners(args),
        Command::Batch(args) => cmd_batch(args),
    }
}

fn read_bytes(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read '{}'", path.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<mockwarp::MockupConfig> {
    match path {
        Some(p) => Ok(mockwarp::MockupConfig::from_json_slice(&read_bytes(p)?)?),
        None => Ok(mockwarp::MockupConfig::default()),
    }
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    match args.format {
        Some(FormatChoice::Png) => cfg.output = mockwarp::OutputFormat::Png,
        Some(FormatChoice::Jpeg) => {
            if !matches!(cfg.output, mockwarp::OutputFormat::Jpeg { .. }) {
                cfg.output = mockwarp::OutputFormat::Jpeg { quality: 90 };
            }
        }
        None => {}
    }
    if let Some(method) = args.method {
        cfg.warp.method = match method {
            MethodChoice::Strips => mockwarp::WarpMethod::Strips,
            MethodChoice::Homography => mockwarp::WarpMethod::Homography,
        };
    }
    cfg.validate()?;

    let req = mockwarp::MockupRequest::new(read_bytes(&args.base)?, read_bytes(&args.art)?);

    ensure_parent_dir(&args.out)?;
    let file = File::create(&args.out)
        .with_context(|| format!("create output '{}'", args.out.display()))?;
    let mut sink = BufWriter::new(file);
    let outcome = mockwarp::render_mockup(&req, &cfg, &mut sink);
    let flushed = sink.flush();

    match (outcome, flushed) {
        (mockwarp::Outcome::Written { bytes }, Ok(())) => {
            eprintln!("wrote {} ({bytes} bytes)", args.out.display());
            Ok(())
        }
        (outcome, flushed) => {
            let _ = std::fs::remove_file(&args.out);
            flushed.with_context(|| format!("flush '{}'", args.out.display()))?;
            anyhow::bail!("no mockup produced: {outcome:?}")
        }
    }
}

fn cmd_annotate(args: AnnotateArgs) -> anyhow::Result<()> {
    let value = format!("{}{}", mockwarp::assets::corners::CHROMA_PREFIX, args.corners);
    let corners = mockwarp::parse_chroma_comment(&value)
        .with_context(|| format!("corners must be four x,y pairs, got '{}'", args.corners))?;

    let png = read_bytes(&args.in_path)?;
    let annotated = mockwarp::embed_corners(&png, &corners)?;

    ensure_parent_dir(&args.out)?;
    std::fs::write(&args.out, annotated)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_corners(args: CornersArgs) -> anyhow::Result<()> {
    let bytes = read_bytes(&args.in_path)?;
    match mockwarp::extract_corners(&bytes) {
        Some(corners) => println!("{}", mockwarp::format_chroma_comment(&corners)),
        None => println!("not found"),
    }
    Ok(())
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    if args.threads.is_some() {
        cfg.threads = args.threads;
    }
    let manifest: Manifest = serde_json::from_slice(&read_bytes(&args.manifest)?)
        .with_context(|| "parse batch manifest JSON")?;

    let pool = mockwarp::MockupPool::new(cfg)?;
    let mut streams = Vec::with_capacity(manifest.jobs.len());
    for job in &manifest.jobs {
        let req = mockwarp::MockupRequest::new(read_bytes(&job.base)?, read_bytes(&job.artwork)?);
        streams.push(pool.submit(req));
    }

    let mut written = 0usize;
    for (job, stream) in manifest.jobs.iter().zip(streams) {
        match stream.collect_output() {
            Ok(Some(bytes)) => {
                ensure_parent_dir(&job.out)?;
                std::fs::write(&job.out, bytes)
                    .with_context(|| format!("write '{}'", job.out.display()))?;
                written += 1;
            }
            Ok(None) => eprintln!("skipped {}", job.out.display()),
            Err(err) => eprintln!("failed {}: {err}", job.out.display()),
        }
    }

    eprintln!("{written}/{} mockups written", manifest.jobs.len());
    Ok(())
}
