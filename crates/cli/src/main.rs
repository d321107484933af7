mod command;
mod settings;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};

use memecam_core::camera::domain::camera_config::{CameraConfig, CameraPosition, FlashMode};
use memecam_core::camera::domain::frame_source::FrameSource;
use memecam_core::camera::infrastructure::ffmpeg_camera_source::{CameraDevices, FfmpegCameraSource};
use memecam_core::camera::infrastructure::still_image_source::StillImageSource;
use memecam_core::compositing::infrastructure::cpu_overlay_compositor::CpuOverlayCompositor;
use memecam_core::detection::domain::feature_detector::{DetectionAccuracy, DetectionSettings};
use memecam_core::detection::infrastructure::detector_factory::create_detector;
use memecam_core::overlay::domain::asset_loader::AssetLoader;
use memecam_core::overlay::domain::overlay_catalog::OverlayCatalog;
use memecam_core::overlay::infrastructure::image_asset_loader::ImageAssetLoader;
use memecam_core::presentation::domain::still_writer::StillWriter;
use memecam_core::presentation::infrastructure::image_file_still_writer::ImageFileStillWriter;
use memecam_core::presentation::infrastructure::image_sequence_sink::ImageSequenceSink;
use memecam_core::session::capture_session::CaptureSession;
use memecam_core::session::domain::session_event::SessionEvent;
use memecam_core::session::domain::session_options::SessionOptions;
use memecam_core::session::infrastructure::presenter::Presenter;
use memecam_core::shared::constants::DEFAULT_MAX_ZOOM;

use command::{Command, HELP};
use settings::Settings;

/// Live camera with meme overlays anchored on faces.
#[derive(Parser)]
#[command(name = "memecam")]
struct Cli {
    #[command(subcommand)]
    command: Mode,

    /// Settings file (default: <config dir>/MemeCam/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Front camera device or video file.
    #[arg(long, global = true)]
    device: Option<String>,

    /// Back camera device or video file.
    #[arg(long, global = true)]
    back_device: Option<String>,

    /// ffmpeg input format for the devices (v4l2, avfoundation, dshow).
    #[arg(long, global = true)]
    input_format: Option<String>,

    /// Simulate the front camera with a still image.
    #[arg(long, global = true)]
    image: Option<PathBuf>,

    /// Simulate the back camera with a still image.
    #[arg(long, global = true)]
    back_image: Option<PathBuf>,

    /// Directory holding overlay images.
    #[arg(long, global = true)]
    overlays: Option<PathBuf>,

    /// Overlay selected at start.
    #[arg(long, global = true)]
    overlay: Option<String>,

    /// Start on the front camera.
    #[arg(long, global = true)]
    front: bool,

    /// Detection accuracy: fast or accurate.
    #[arg(long, global = true)]
    accuracy: Option<DetectionAccuracy>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, global = true)]
    confidence: Option<f64>,

    /// Detector model file (BlazeFace for fast, YOLO-pose for accurate).
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Digital zoom limit.
    #[arg(long, global = true)]
    max_zoom: Option<f64>,

    /// Draw the overlay centred on the frame while detection is off.
    #[arg(long, global = true)]
    draw_unanchored: bool,

    /// Flip front-camera frames back to true orientation.
    #[arg(long, global = true)]
    unmirror: bool,

    /// Outline detected faces.
    #[arg(long, global = true)]
    face_boxes: bool,

    /// Directory for captured stills.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Mode {
    /// Run the camera and read commands from stdin.
    Run {
        /// Also write preview frames to this directory.
        #[arg(long)]
        preview_dir: Option<PathBuf>,

        /// Write every Nth preview frame.
        #[arg(long, default_value = "30")]
        preview_every: u64,
    },
    /// Capture one still and exit.
    Snap {
        /// Output image file.
        output: PathBuf,

        /// Frames to let through before capturing.
        #[arg(long, default_value = "10")]
        warmup: u64,

        /// Flash mode: on, off or auto.
        #[arg(long, default_value = "off")]
        flash: FlashMode,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::resolve(cli.settings.as_deref())?;
    validate(&cli)?;

    let session = build_session(&cli, &settings)?;
    let output_dir = cli
        .output_dir
        .clone()
        .or(settings.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Mode::Run {
            preview_dir,
            preview_every,
        } => run_interactive(session, &output_dir, preview_dir, preview_every),
        Mode::Snap {
            output,
            warmup,
            flash,
        } => run_snap(&session, &output, warmup, flash),
    }
}

fn validate(cli: &Cli) -> Result<(), String> {
    if let Some(c) = cli.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(format!("--confidence must be between 0 and 1, got {c}"));
        }
    }
    if let Some(z) = cli.max_zoom {
        if !z.is_finite() || z < 1.0 {
            return Err(format!("--max-zoom must be at least 1, got {z}"));
        }
    }
    Ok(())
}

fn build_session(cli: &Cli, settings: &Settings) -> Result<CaptureSession, Box<dyn std::error::Error>> {
    let source = build_source(cli, settings)?;

    let detection = DetectionSettings {
        accuracy: match (cli.accuracy, settings.accuracy.as_deref()) {
            (Some(a), _) => a,
            (None, Some(s)) => s.parse()?,
            (None, None) => DetectionAccuracy::default(),
        },
        confidence: cli.confidence.or(settings.confidence),
        ..DetectionSettings::default()
    };
    let model = cli.model.clone().or(settings.model.clone());
    let detector = create_detector(detection, model.as_deref())?;

    let catalog = load_catalog(cli, settings)?;

    let options = SessionOptions {
        max_zoom: cli.max_zoom.or(settings.max_zoom).unwrap_or(DEFAULT_MAX_ZOOM),
        draw_unanchored: cli.draw_unanchored,
        unmirror: cli.unmirror,
        ..SessionOptions::default()
    };
    let mut compositor = CpuOverlayCompositor::new(options.eye_span_scale);
    if cli.face_boxes {
        compositor = compositor.with_face_boxes([0, 255, 0]);
    }

    let position = if cli.front {
        CameraPosition::Front
    } else {
        CameraPosition::Back
    };
    let config = CameraConfig::new(position, options.max_zoom);

    let session = CaptureSession::new(source, detector, catalog, options)
        .with_compositor(Box::new(compositor))
        .with_config(config);

    if let Some(name) = &cli.overlay {
        session.select_overlay(name)?;
    }
    Ok(session)
}

fn build_source(cli: &Cli, settings: &Settings) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    let front_image = cli.image.clone().or(settings.front_image.clone());
    let back_image = cli.back_image.clone().or(settings.back_image.clone());
    if front_image.is_some() || back_image.is_some() {
        let source = StillImageSource::from_files(front_image.as_deref(), back_image.as_deref())?;
        return Ok(Box::new(source));
    }

    let devices = CameraDevices {
        front: cli.device.clone().or(settings.front_device.clone()),
        back: cli.back_device.clone().or(settings.back_device.clone()),
    };
    if devices.front.is_none() && devices.back.is_none() {
        return Err("no camera configured: pass --device/--back-device or --image/--back-image".into());
    }
    let mut source = FfmpegCameraSource::new(devices);
    if let Some(format) = cli.input_format.clone().or(settings.input_format.clone()) {
        source = source.with_input_format(format);
    }
    Ok(Box::new(source))
}

fn load_catalog(cli: &Cli, settings: &Settings) -> Result<OverlayCatalog, Box<dyn std::error::Error>> {
    let Some(dir) = cli.overlays.clone().or(settings.overlay_dir.clone()) else {
        log::warn!("No overlay directory configured; running without overlays");
        return Ok(OverlayCatalog::default());
    };
    let loader = ImageAssetLoader::new(&dir);
    let names = if settings.overlays.is_empty() {
        loader.discover()?
    } else {
        settings.overlays.clone()
    };
    let catalog = OverlayCatalog::new(loader.load_all(&names));
    log::info!("Loaded {} overlay(s) from {}", catalog.len(), dir.display());
    Ok(catalog)
}

fn run_interactive(
    session: CaptureSession,
    output_dir: &Path,
    preview_dir: Option<PathBuf>,
    preview_every: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Arc::new(session);
    let events = spawn_event_printer(&session);
    let mut presenter = None;

    session.start()?;
    if let Some(dir) = &preview_dir {
        presenter = start_presenter(&session, dir, preview_every);
    }
    println!("{HELP}");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(c) => c,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match command {
            Command::Quit => break,
            Command::Start => {
                if let Err(e) = session.start() {
                    println!("{e}");
                } else if let Some(dir) = &preview_dir {
                    finish_presenter(presenter.take());
                    presenter = start_presenter(&session, dir, preview_every);
                }
            }
            other => {
                if let Err(e) = execute(&session, other, output_dir) {
                    println!("{e}");
                }
            }
        }
        io::stdout().flush()?;
    }

    session.stop()?;
    finish_presenter(presenter);
    drop(session);
    if events.join().is_err() {
        log::warn!("Event printer panicked");
    }
    Ok(())
}

fn execute(
    session: &CaptureSession,
    command: Command,
    output_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Next => println!("overlay: {}", session.cycle_overlay()?),
        Command::Select(name) => println!("overlay: {}", session.select_overlay(&name)?),
        Command::Clear => session.clear_overlay(),
        Command::Switch => println!("camera: {}", session.switch_camera()?),
        Command::Zoom(x) => println!("zoom: {:.2}", session.set_zoom(x)),
        Command::Pinch(scale) => {
            session.begin_pinch();
            let zoom = session.update_pinch(scale);
            session.end_pinch();
            println!("zoom: {zoom:.2}");
        }
        Command::Flash(mode) => {
            session.set_flash(mode);
            println!("flash: {mode}");
        }
        Command::Detect(enabled) => {
            session.set_detection_enabled(enabled);
            println!("detection: {}", if enabled { "on" } else { "off" });
        }
        Command::Capture => {
            let still = session.request_still_capture()?.wait()?;
            let path = output_dir.join(still_file_name());
            ImageFileStillWriter::new().write(&path, &still)?;
            println!("saved {}", path.display());
        }
        Command::State => {
            let config = session.config();
            println!(
                "state: {}  camera: {}  zoom: {:.2}/{:.2}  flash: {}  detection: {}  overlay: {}",
                session.state(),
                config.position,
                config.zoom(),
                config.max_zoom(),
                config.flash,
                if config.detection_enabled { "on" } else { "off" },
                session.current_overlay().as_deref().unwrap_or("none"),
            );
        }
        Command::Stats => {
            let s = session.stats();
            println!(
                "captured: {}  processed: {}  dropped: {}  discarded: {}  faces: {}  stills: {}",
                s.frames_captured,
                s.frames_processed,
                s.frames_dropped,
                s.frames_discarded,
                s.faces_detected,
                s.stills_captured
            );
        }
        Command::Stop => session.stop()?,
        Command::Help => println!("{HELP}"),
        // Handled by the input loop.
        Command::Start | Command::Quit => {}
    }
    Ok(())
}

fn run_snap(
    session: &CaptureSession,
    output: &Path,
    warmup: u64,
    flash: FlashMode,
) -> Result<(), Box<dyn std::error::Error>> {
    session.set_flash(flash);
    session.start()?;

    let preview = session.preview().ok_or("session produced no preview")?;
    for _ in 0..warmup {
        preview
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| "camera delivered no frames")?;
    }

    let still = session.request_still_capture()?.wait()?;
    ImageFileStillWriter::new().write(output, &still)?;
    session.stop()?;
    println!("{}", output.display());
    Ok(())
}

fn spawn_event_printer(session: &CaptureSession) -> std::thread::JoinHandle<()> {
    let events = session.events();
    std::thread::spawn(move || {
        // Ends when the session is dropped.
        for event in events {
            match event {
                SessionEvent::Fatal(e) => eprintln!("camera lost: {e} (type 'start' to retry)"),
                SessionEvent::CameraSwitchFailed(position, e) => {
                    eprintln!("could not switch to {position} camera: {e}")
                }
                other => log::debug!("{other:?}"),
            }
        }
    })
}

fn start_presenter(session: &CaptureSession, dir: &Path, every: u64) -> Option<Presenter> {
    let preview = session.preview()?;
    Some(Presenter::spawn(
        preview,
        Box::new(ImageSequenceSink::new(dir, every)),
    ))
}

fn finish_presenter(presenter: Option<Presenter>) {
    if let Some(p) = presenter {
        if let Err(e) = p.join() {
            log::warn!("{e}");
        }
    }
}

fn still_file_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("memecam_{millis}.jpg")
}
