use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facedet::{config, Detector};
use facedet_vision::NmsPreset;
use log::{info, warn};

#[derive(Parser)]
#[command(name = "facedet")]
#[command(version, about = "SCRFD face detection with letterbox decoding and NMS")]
struct Cli {
    /// Config file (defaults to the system config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces in an image
    Detect {
        /// Image to process
        image: PathBuf,
        /// ONNX model (overrides config)
        #[arg(short, long)]
        model: Option<PathBuf>,
        /// Confidence threshold in [0, 1]
        #[arg(short, long)]
        score: Option<f32>,
        /// NMS IoU threshold in (0, 1)
        #[arg(short, long, conflicts_with = "aggressive")]
        nms: Option<f32>,
        /// Use the aggressive NMS preset (0.3)
        #[arg(long)]
        aggressive: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Open config file in editor
    Config {
        /// Write a default config instead of opening an editor
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Detect {
            image,
            model,
            score,
            nms,
            aggressive,
            json,
        } => {
            let mut cfg = config::load_config(config_path)?;
            if let Some(model) = model {
                cfg.model = model;
            }
            if let Some(score) = score {
                cfg.detector.decode.confidence_threshold = score;
            }
            if let Some(nms) = nms {
                cfg.detector.decode.nms = NmsPreset::Custom(nms);
            } else if aggressive {
                cfg.detector.decode.nms = NmsPreset::Aggressive;
            }
            detect(&cfg, &image, json)
        }
        Commands::Config { init } => {
            if init {
                init_config(config_path)
            } else {
                open_config(config_path)
            }
        }
    }
}

fn detect(cfg: &config::Config, image: &std::path::Path, json: bool) -> Result<()> {
    info!("Loading model: {}", cfg.model.display());
    let mut detector = Detector::from_file(&cfg.model, cfg.detector.clone())
        .context("Failed to initialize face detector")?;

    let report = facedet::detect_file(&mut detector, image)?;

    for warning in &report.warnings {
        warn!("stride {}: {}", warning.stride, warning.message);
    }

    if json {
        println!("{}", facedet::report_json(&report)?);
        return Ok(());
    }

    if report.is_empty() {
        info!("No faces detected in {}", image.display());
        return Ok(());
    }

    info!(
        "{} face(s) from {} candidate(s)",
        report.detections.len(),
        report.candidates
    );
    for (i, det) in report.detections.iter().enumerate() {
        info!(
            "#{}: score {:.3} box [{:.1}, {:.1}, {:.1}, {:.1}]{}",
            i + 1,
            det.confidence,
            det.bbox.x,
            det.bbox.y,
            det.bbox.width,
            det.bbox.height,
            if det.has_keypoints() { " +kps" } else { "" }
        );
    }
    Ok(())
}

fn init_config(path: Option<&std::path::Path>) -> Result<()> {
    let target = path.unwrap_or(&config::CONFIG_PATH);
    if target.exists() {
        anyhow::bail!("Config already exists: {}", target.display());
    }
    config::save_config(&config::Config::default(), Some(target))
        .context("Failed to write config")?;
    info!("✓ Wrote default config to {}", target.display());
    Ok(())
}

fn open_config(path: Option<&std::path::Path>) -> Result<()> {
    let config_path = path.unwrap_or(&config::CONFIG_PATH).as_os_str();
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
