use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use vigil::annotate::Annotator;
use vigil::config::{self, Config};
use vigil::device::WindowDisplay;
use vigil::face::display_name;
use vigil::notify::TelegramNotifier;
use vigil::session_log::SessionLog;
use vigil::snapshot::SnapshotStore;
use vigil::{Camera, Gallery, Monitor, Pipeline};
use vigil_vision::{Detector, Encoder};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(
    version,
    about = "Real-time webcam monitor - emotion, age and gender with unknown-face alerts"
)]
struct Cli {
    /// Config file (defaults to vigil.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the camera (default)
    Run,
    /// List the known identities the gallery loads
    Gallery,
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let cfg = config::load_config(config_path)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&cfg),
        Commands::Gallery => list_gallery(&cfg),
        Commands::Config => open_config(config_path),
    }
}

fn load_gallery(cfg: &Config) -> Result<Gallery> {
    let detector = Detector::new(&cfg.models.detector, cfg.detection_threshold, 0.3)
        .context("Failed to load gallery detector")?;
    let encoder = Encoder::new(&cfg.models.recognizer).context("Failed to load recognizer")?;
    Gallery::load(&cfg.known_dir, detector, encoder, cfg.match_threshold)
        .context("Failed to load known faces")
}

fn run(cfg: &Config) -> Result<()> {
    if !cfg.telegram.is_configured() {
        warn!(
            "telegram token/chat_id not set ({} / {}), alerts will only be saved locally",
            config::TOKEN_ENV,
            config::CHAT_ID_ENV
        );
    }

    let pipeline = Pipeline::new(&cfg.models.model_set(), cfg.detection_threshold)
        .context("Failed to initialize face analysis pipeline")?;
    let gallery = load_gallery(cfg)?;
    info!("Loaded {} known face(s) from {}", gallery.entries().len(), cfg.known_dir.display());

    let log = SessionLog::open(&cfg.log_path)
        .with_context(|| format!("Failed to open log {}", cfg.log_path.display()))?;

    let mut monitor = Monitor::new(
        pipeline,
        gallery,
        TelegramNotifier::from_config(&cfg.telegram),
        Annotator::from_font_file(&cfg.font_path),
        log,
        SnapshotStore::new(&cfg.unknown_dir),
    );
    info!("Unknown-face snapshots go to {}", monitor.snapshots().dir().display());
    if let Some(caption) = &cfg.telegram.caption {
        monitor = monitor.with_caption(caption.clone());
    }

    info!("Opening camera: {}", cfg.camera);
    let mut camera = Camera::open(&cfg.camera).context("Failed to open camera")?;
    let (width, height) = camera.dimensions();
    info!("Capturing {}x{}", width, height);
    let mut display = WindowDisplay::new(cfg.window_title.clone());

    info!("Monitoring. Press 'q' in the window to stop.");
    monitor.run(&mut camera, &mut display);
    Ok(())
}

fn list_gallery(cfg: &Config) -> Result<()> {
    let gallery = load_gallery(cfg)?;
    if gallery.entries().is_empty() {
        info!("No known faces in {}", cfg.known_dir.display());
        return Ok(());
    }
    for entry in gallery.entries() {
        println!("{}\t{}", display_name(&entry.source), entry.source.display());
    }
    Ok(())
}

fn open_config(path: Option<&Path>) -> Result<()> {
    let config_path = path.unwrap_or(&config::CONFIG_PATH);
    if !config_path.exists() {
        config::save_config(&Config::default(), Some(config_path))
            .context("Failed to write default config")?;
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
