use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};

use framepack::{
    ColorDepth, ConvertConfig, FrameNaming, OutputGeometry, OutputMode, PixelFormat, RecordLayout,
    RecordPacking, ResampleFilter, Rgb565Order, Rotation, VerifyConfig,
};

#[derive(Parser, Debug)]
#[command(name = "framepack", version)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert every animation in a directory into raw frames.
    Convert(ConvertArgs),
    /// Compare frame records on a raw device against a reference blob.
    Verify(VerifyArgs),
    /// Print the record layout for a frame geometry.
    Layout(LayoutArgs),
}

#[derive(Args, Debug)]
struct FrameFormatArgs {
    /// Output size: one value for a square, or width and height.
    #[arg(long, num_args = 1..=2, value_names = ["W", "H"])]
    size: Option<Vec<u32>>,

    /// Color depth in bits (8 = RGB332, 16 = RGB565).
    #[arg(long)]
    depth: Option<u8>,

    /// RGB565 byte order.
    #[arg(long, value_enum)]
    byte_order: Option<ByteOrderChoice>,

    /// Sector size of the target device in bytes.
    #[arg(long)]
    sector_size: Option<u32>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Directory holding the source animations.
    #[arg(long)]
    source: PathBuf,

    /// Output directory.
    #[arg(long)]
    output: PathBuf,

    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    format: FrameFormatArgs,

    /// Rotation in degrees, counter-clockwise (0, 90, 180, -90).
    #[arg(long, allow_hyphen_values = true)]
    rotation: Option<i32>,

    #[arg(long, value_enum)]
    mode: Option<ModeChoice>,

    #[arg(long, value_enum)]
    naming: Option<NamingChoice>,

    /// Keep every Nth decoded frame.
    #[arg(long = "frame-stride")]
    stride: Option<u32>,

    /// Stop after this many frames in total.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Pad blob records to the sector size (single-blob mode).
    #[arg(long)]
    pad_records: bool,

    /// Pre-touch this many placeholder records before writing.
    #[arg(long)]
    pretouch: Option<usize>,

    /// Longest edge of the preview thumbnail.
    #[arg(long, conflicts_with = "no_thumbnail")]
    thumbnail_edge: Option<u32>,

    /// Skip the preview thumbnail.
    #[arg(long)]
    no_thumbnail: bool,

    #[arg(long, value_enum)]
    filter: Option<FilterChoice>,

    /// Transform and encode frames on a worker pool.
    #[arg(long)]
    parallel: bool,

    /// Worker threads (implies --parallel).
    #[arg(long)]
    threads: Option<usize>,

    /// Frames per worker batch.
    #[arg(long)]
    chunk_size: Option<usize>,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Raw device (or image file) holding the records.
    device: PathBuf,

    /// Reference blob written by `convert --mode single-blob`.
    reference: PathBuf,

    #[command(flatten)]
    format: FrameFormatArgs,

    /// Unpadded frame size in bytes; replaces --size/--depth.
    #[arg(long, conflicts_with_all = ["size", "depth"])]
    frame_size: Option<u64>,

    /// First sector of the record area.
    #[arg(long, default_value_t = framepack::config::DEFAULT_START_SECTOR)]
    start_sector: u64,

    #[arg(long, value_enum, default_value_t = PackingChoice::Padded)]
    packing: PackingChoice,

    /// Read chunk in bytes.
    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long)]
    max_mismatches: Option<usize>,
}

#[derive(Args, Debug)]
struct LayoutArgs {
    #[command(flatten)]
    format: FrameFormatArgs,

    /// Frame count used to size the device window.
    #[arg(long)]
    frames: Option<u64>,

    #[arg(long, default_value_t = framepack::config::DEFAULT_START_SECTOR)]
    start_sector: u64,

    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ByteOrderChoice {
    SwappedLe,
    BigEndian,
    LittleEndian,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeChoice {
    PerFile,
    SingleBlob,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NamingChoice {
    Global,
    PerSource,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FilterChoice {
    Lanczos3,
    Triangle,
    Nearest,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PackingChoice {
    Padded,
    Contiguous,
}

impl From<ByteOrderChoice> for Rgb565Order {
    fn from(c: ByteOrderChoice) -> Self {
        match c {
            ByteOrderChoice::SwappedLe => Self::SwappedLe,
            ByteOrderChoice::BigEndian => Self::BigEndian,
            ByteOrderChoice::LittleEndian => Self::LittleEndian,
        }
    }
}

impl From<ModeChoice> for OutputMode {
    fn from(c: ModeChoice) -> Self {
        match c {
            ModeChoice::PerFile => Self::PerFile,
            ModeChoice::SingleBlob => Self::SingleBlob,
        }
    }
}

impl From<NamingChoice> for FrameNaming {
    fn from(c: NamingChoice) -> Self {
        match c {
            NamingChoice::Global => Self::Global,
            NamingChoice::PerSource => Self::PerSource,
        }
    }
}

impl From<FilterChoice> for ResampleFilter {
    fn from(c: FilterChoice) -> Self {
        match c {
            FilterChoice::Lanczos3 => Self::Lanczos3,
            FilterChoice::Triangle => Self::Triangle,
            FilterChoice::Nearest => Self::Nearest,
        }
    }
}

impl From<PackingChoice> for RecordPacking {
    fn from(c: PackingChoice) -> Self {
        match c {
            PackingChoice::Padded => Self::Padded,
            PackingChoice::Contiguous => Self::Contiguous,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Convert(args) => cmd_convert(args),
        Command::Verify(args) => cmd_verify(args),
        Command::Layout(args) => cmd_layout(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Apply the shared format flags on top of `cfg`.
fn apply_format(cfg: &mut ConvertConfig, args: &FrameFormatArgs) -> anyhow::Result<()> {
    if let Some(size) = &args.size {
        cfg.set_size(size)?;
    }
    if let Some(bits) = args.depth {
        cfg.depth = ColorDepth::from_bits(bits)?;
    }
    if let Some(order) = args.byte_order {
        cfg.rgb565_order = order.into();
    }
    if let Some(sector) = args.sector_size {
        cfg.sector_size = sector;
    }
    Ok(())
}

fn build_convert_config(args: &ConvertArgs) -> anyhow::Result<ConvertConfig> {
    let mut cfg = match &args.config {
        Some(path) => ConvertConfig::from_json_file(path)?,
        None => ConvertConfig::default(),
    };
    apply_format(&mut cfg, &args.format)?;

    if let Some(deg) = args.rotation {
        cfg.rotation = Rotation::from_degrees(deg)?;
    }
    if let Some(mode) = args.mode {
        cfg.mode = mode.into();
    }
    if let Some(naming) = args.naming {
        cfg.naming = naming.into();
    }
    if let Some(stride) = args.stride {
        cfg.stride = stride;
    }
    if let Some(max) = args.max_frames {
        cfg.max_frames = Some(max);
    }
    if args.pad_records {
        cfg.pad_records = true;
    }
    if let Some(n) = args.pretouch {
        cfg.pretouch_records = n;
    }
    if args.no_thumbnail {
        cfg.thumbnail_edge = None;
    } else if let Some(edge) = args.thumbnail_edge {
        cfg.thumbnail_edge = Some(edge);
    }
    if let Some(filter) = args.filter {
        cfg.filter = filter.into();
    }
    if args.parallel || args.threads.is_some() {
        cfg.threading.parallel = true;
    }
    if let Some(n) = args.threads {
        cfg.threading.threads = Some(n);
    }
    if let Some(n) = args.chunk_size {
        cfg.threading.chunk_size = n;
    }

    cfg.validate()?;
    Ok(cfg)
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<ExitCode> {
    let cfg = build_convert_config(&args)?;
    let summary = framepack::run_convert(&cfg, &args.source, &args.output)?;

    println!(
        "wrote {} frame(s) from {} source(s) to {}",
        summary.frames_written,
        summary.sources_converted,
        summary.output.display()
    );
    if summary.frames_skipped > 0 || summary.sources_skipped > 0 {
        println!(
            "skipped {} frame(s), {} source(s)",
            summary.frames_skipped, summary.sources_skipped
        );
    }
    println!(
        "record: {} bytes raw, {} bytes padded ({} sectors)",
        summary.layout.raw_size,
        summary.layout.padded_size,
        summary.layout.sectors_per_record()
    );
    match &summary.manifest {
        Some(path) => println!("manifest: {}", path.display()),
        None => println!("no frames produced; manifest not written"),
    }
    if let Some(path) = &summary.thumbnail {
        println!("thumbnail: {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// Geometry and format named by the format flags, with the converter's defaults.
fn frame_layout(args: &FrameFormatArgs) -> anyhow::Result<(OutputGeometry, PixelFormat, u32)> {
    let mut cfg = ConvertConfig::default();
    apply_format(&mut cfg, args)?;
    Ok((cfg.geometry()?, cfg.pixel_format(), cfg.sector_size))
}

fn cmd_verify(args: VerifyArgs) -> anyhow::Result<ExitCode> {
    let (geometry, format, sector_size) = frame_layout(&args.format)?;
    let raw_frame_size = args
        .frame_size
        .unwrap_or_else(|| format.frame_len(geometry));

    let mut cfg = VerifyConfig::new(&args.device, &args.reference, raw_frame_size);
    cfg.start_sector = args.start_sector;
    cfg.sector_size = sector_size;
    cfg.packing = args.packing.into();
    if let Some(n) = args.chunk_size {
        cfg.chunk_size = n;
    }
    if let Some(n) = args.max_mismatches {
        cfg.max_mismatches = n;
    }

    let report = framepack::verify_device(&cfg)
        .with_context(|| format!("verify '{}'", args.device.display()))?;

    println!(
        "reference: {} frame(s), {} bytes; record {} raw / {} padded",
        report.frames, report.reference_len, report.layout.raw_size, report.layout.padded_size
    );
    println!(
        "device window: offset {} (sector {}), {} bytes",
        report.region_start,
        args.start_sector,
        report.region_len()
    );
    for m in &report.mismatches {
        println!("{m}");
    }
    if report.stopped_early {
        println!("too many mismatches, stopping verification");
    }
    if let Some(t) = report.truncated {
        println!(
            "device too small: window ends at byte {}, device holds {} bytes",
            t.required_end, t.device_len
        );
    }
    if report.unverified_tail > 0 {
        println!(
            "reference has {} trailing byte(s) that do not form a whole frame",
            report.unverified_tail
        );
    }

    if report.is_ok() {
        println!("OK: {} bytes verified", report.verified_bytes);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("FAILED: {} mismatch(es)", report.mismatches.len());
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_layout(args: LayoutArgs) -> anyhow::Result<ExitCode> {
    let (geometry, format, sector_size) = frame_layout(&args.format)?;
    let layout = RecordLayout::for_frames(geometry, format, sector_size)?;
    let start = args.start_sector * u64::from(sector_size);

    if args.json {
        let mut value = serde_json::to_value(layout)?;
        value["sectors_per_record"] = layout.sectors_per_record().into();
        value["filler_bytes"] = layout.filler_bytes().into();
        if let Some(frames) = args.frames {
            value["frames"] = frames.into();
            value["window_start"] = start.into();
            value["window_len"] = layout.span(frames).into();
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{}x{} {}-bit: {} bytes raw, {} bytes padded",
        geometry.width,
        geometry.height,
        format.depth().bits(),
        layout.raw_size,
        layout.padded_size
    );
    println!(
        "{} sectors of {} bytes per record, {} filler bytes",
        layout.sectors_per_record(),
        layout.sector_size,
        layout.filler_bytes()
    );
    if let Some(frames) = args.frames {
        let len = layout.span(frames);
        println!(
            "{frames} frame(s): bytes {start}..{} (sectors {}..{})",
            start + len,
            args.start_sector,
            args.start_sector + frames * layout.sectors_per_record()
        );
    }
    Ok(ExitCode::SUCCESS)
}
