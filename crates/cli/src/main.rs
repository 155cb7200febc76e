use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand, ValueEnum};
use parking_lot::Mutex;

use facelens_core::detection::domain::detection_cascade::DetectionCascade;
use facelens_core::detection::domain::detector_options::DetectorOptions;
use facelens_core::detection::infrastructure::capability_loader::CapabilityLoader;
use facelens_core::overlay::infrastructure::raster_overlay_renderer::RasterOverlayRenderer;
use facelens_core::pipeline::batch_sink::{OverlaySink, StatsReader, StatsSink};
use facelens_core::pipeline::detection_loop::{DetectionLoop, LoopConfig};
use facelens_core::pipeline::pipeline_controller::{PipelineController, PipelineStatus};
use facelens_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facelens_core::pipeline::refresh_clock::IntervalClock;
use facelens_core::provisioning::domain::model_artifact::{default_artifacts, read_manifest};
use facelens_core::provisioning::infrastructure::http_artifact_fetcher::HttpArtifactFetcher;
use facelens_core::provisioning::infrastructure::model_cache::model_cache_dir;
use facelens_core::provisioning::provision_models_use_case::{
    ArtifactOutcome, ProvisionModelsUseCase,
};
use facelens_core::shared::constants::{
    DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH, DEFAULT_DETECTOR_INPUT_SIZE,
    DEFAULT_REFRESH_HZ, DEFAULT_SCORE_THRESHOLD,
};
use facelens_core::shared::display_geometry::DisplayGeometry;
use facelens_core::video::domain::frame_source::{
    CameraConstraints, FacingMode, FrameSource, MediaAccessError,
};
use facelens_core::video::infrastructure::camera_source::{CameraSource, DEFAULT_OPEN_TIMEOUT};
use facelens_core::video::infrastructure::ffmpeg_file_source::FileSource;

const STATS_STREAM_CAPACITY: usize = 16;

/// Live face, landmark and expression detection.
#[derive(Parser)]
#[command(name = "facelens")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the inference models into the model directory.
    FetchModels {
        /// Target directory (defaults to the user cache directory).
        #[arg(long)]
        dir: Option<PathBuf>,

        /// JSON manifest of `{ "name", "source_uri" }` entries to fetch
        /// instead of the built-in model list.
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Keep models that are already present.
        #[arg(long)]
        skip_existing: bool,
    },

    /// Run the detection loop against a camera or a video file.
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Model directory (defaults to the user cache directory).
    #[arg(long)]
    models: Option<PathBuf>,

    /// Replay a video file instead of opening a camera.
    #[arg(long, conflicts_with = "camera")]
    video: Option<PathBuf>,

    /// Camera device index.
    #[arg(long, default_value_t = 0)]
    camera: u32,

    /// Preferred camera facing (advisory).
    #[arg(long, value_enum, default_value_t = Facing::User)]
    facing: Facing,

    /// Requested capture width, also used as the overlay width.
    #[arg(long, default_value_t = DEFAULT_CAPTURE_WIDTH)]
    width: u32,

    /// Requested capture height, also used as the overlay height.
    #[arg(long, default_value_t = DEFAULT_CAPTURE_HEIGHT)]
    height: u32,

    /// Detector working resolution in pixels.
    #[arg(long, default_value_t = DEFAULT_DETECTOR_INPUT_SIZE)]
    input_size: u32,

    /// Minimum face detection confidence (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_SCORE_THRESHOLD)]
    score_threshold: f64,

    /// Loop rate in Hz.
    #[arg(long, default_value_t = DEFAULT_REFRESH_HZ)]
    refresh_hz: f64,

    /// Stop after this many published batches.
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Write the last overlay to this PNG when the loop ends. Face
    /// captions are logged alongside it.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print one JSON line per batch on stdout: stats plus a caption for
    /// every face.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Facing {
    User,
    Environment,
}

impl From<Facing> for FacingMode {
    fn from(facing: Facing) -> Self {
        match facing {
            Facing::User => FacingMode::User,
            Facing::Environment => FacingMode::Environment,
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::FetchModels {
            dir,
            manifest,
            skip_existing,
        } => fetch_models(dir, manifest.as_deref(), skip_existing),
        Command::Run(args) => {
            validate(&args)?;
            run_pipeline(args)
        }
    }
}

fn fetch_models(
    dir: Option<PathBuf>,
    manifest: Option<&Path>,
    skip_existing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let target_dir = match dir {
        Some(dir) => dir,
        None => model_cache_dir()?,
    };
    let artifacts = match manifest {
        Some(path) => read_manifest(path)?,
        None => default_artifacts(),
    };

    log::info!(
        "Fetching {} model(s) into {}",
        artifacts.len(),
        target_dir.display()
    );
    let use_case = ProvisionModelsUseCase::new(
        Box::new(HttpArtifactFetcher::new()?),
        target_dir,
        artifacts,
    )
    .skip_existing(skip_existing)
    .on_progress(Box::new(download_progress));

    let report = use_case.provision_all()?;
    eprintln!();

    for (artifact, outcome) in report.outcomes() {
        match outcome {
            ArtifactOutcome::Downloaded { path, bytes } => {
                log::info!("{}: {bytes} bytes -> {}", artifact.name, path.display())
            }
            ArtifactOutcome::Skipped { path } => {
                log::info!("{}: already present at {}", artifact.name, path.display())
            }
            ArtifactOutcome::Failed(_) => {}
        }
    }
    let failed = report.failures().count();
    if failed > 0 {
        log::warn!("{failed} model(s) could not be fetched");
    }
    Ok(())
}

fn run_pipeline(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let models_dir = match &args.models {
        Some(dir) => dir.clone(),
        None => model_cache_dir()?,
    };
    let display = DisplayGeometry::new(args.width, args.height);
    let config = LoopConfig {
        detector: DetectorOptions {
            input_size: args.input_size,
            score_threshold: args.score_threshold,
        },
        ..LoopConfig::default()
    };

    let renderer = Arc::new(Mutex::new(RasterOverlayRenderer::new(display)));
    let (stats_sink, stats) = StatsSink::new();
    let (stats_sink, stream) = if args.json {
        let (sink, rx) = stats_sink.with_stream(STATS_STREAM_CAPACITY, display);
        (sink, Some(rx))
    } else {
        (stats_sink, None)
    };

    let printer = stream.map(|rx| {
        thread::spawn(move || {
            for update in rx {
                match serde_json::to_string(&update) {
                    Ok(line) => println!("{line}"),
                    Err(e) => log::warn!("Could not encode batch record: {e}"),
                }
            }
        })
    });

    let overlay = OverlaySink::new(Arc::clone(&renderer), display);
    let refresh_hz = args.refresh_hz;
    let max_iterations = args.max_iterations;
    let assemble = move |cascade: Box<dyn DetectionCascade>| {
        let clock = Box::new(IntervalClock::new(refresh_hz));
        let detection_loop = DetectionLoop::new(cascade, clock, config)
            .with_sink(Box::new(overlay))
            .with_sink(Box::new(stats_sink))
            .with_logger(Box::new(StdoutPipelineLogger::default()));
        match max_iterations {
            Some(limit) => detection_loop.with_frame_limit(limit),
            None => detection_loop,
        }
    };

    let video = args.video.clone();
    let constraints = CameraConstraints {
        index: args.camera,
        width: args.width,
        height: args.height,
        facing: args.facing.into(),
    };
    let acquire = move || -> Result<Box<dyn FrameSource>, MediaAccessError> {
        match video {
            Some(path) => {
                log::info!("Replaying {}", path.display());
                Ok(Box::new(FileSource::open(&path)?))
            }
            None => {
                log::info!(
                    "Opening camera {} at {}x{}",
                    constraints.index,
                    constraints.width,
                    constraints.height
                );
                Ok(Box::new(CameraSource::acquire(
                    constraints,
                    DEFAULT_OPEN_TIMEOUT,
                )?))
            }
        }
    };

    let mut controller = PipelineController::new();
    let started = controller.start(&CapabilityLoader::onnx(), &models_dir, acquire, assemble);
    let report = match &started {
        Ok(()) => controller.wait(),
        Err(_) => None,
    };
    // The stream closes once the loop, and with it the stats sink, is gone.
    join_printer(printer);
    started?;

    if let Some(report) = &report {
        log::info!(
            "{} batches published, {} cascade failures",
            report.published,
            report.cascade_failures
        );
    }
    log_final_stats(&stats);

    if let Some(path) = &args.snapshot {
        let renderer = renderer.lock();
        renderer.save_png(path)?;
        log::info!("Overlay snapshot written to {}", path.display());
        for label in renderer.labels() {
            log::info!("  {} at ({:.0}, {:.0})", label.text, label.x, label.y);
        }
    }

    match controller.status() {
        PipelineStatus::Failed(reason) => Err(reason.into()),
        _ => Ok(()),
    }
}

fn join_printer(printer: Option<thread::JoinHandle<()>>) {
    if let Some(handle) = printer {
        if handle.join().is_err() {
            log::warn!("Stats printer thread panicked");
        }
    }
}

fn log_final_stats(stats: &StatsReader) {
    let Some(latest) = stats.latest() else {
        return;
    };
    match latest.dominant_expression {
        Some(expression) => log::info!(
            "Last batch: {} face(s), dominant expression {expression}",
            latest.face_count
        ),
        None => log::info!("Last batch: {} face(s)", latest.face_count),
    }
}

fn validate(args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(video) = &args.video {
        if !video.exists() {
            return Err(format!("Video file not found: {}", video.display()).into());
        }
    }
    if args.width == 0 || args.height == 0 {
        return Err(format!(
            "Resolution must be non-zero, got {}x{}",
            args.width, args.height
        )
        .into());
    }
    if args.input_size == 0 {
        return Err("Input size must be positive".into());
    }
    if !(0.0..=1.0).contains(&args.score_threshold) {
        return Err(format!(
            "Score threshold must be between 0.0 and 1.0, got {}",
            args.score_threshold
        )
        .into());
    }
    if !(args.refresh_hz.is_finite() && args.refresh_hz > 0.0) {
        return Err(format!("Refresh rate must be positive, got {}", args.refresh_hz).into());
    }
    Ok(())
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}
