use anyhow::{Context, Result};
use facedet_vision::DetectorConfig;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEDET_CONFIG_PATH").unwrap_or("/usr/local/etc/facedet/config.toml"))
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SCRFD ONNX model.
    pub model: PathBuf,
    pub detector: DetectorConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut detector = DetectorConfig::default();
        // raw SCRFD exports emit box and landmark offsets in stride units
        detector.decode.distances_in_strides = true;
        Self {
            model: PathBuf::from("/usr/local/share/facedet/scrfd_10g_bnkps.onnx"),
            detector,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use facedet_vision::{DecodeStrategy, NmsPreset};

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_default_model_decodes_stride_units() {
        let cfg = Config::default();
        assert!(cfg.detector.decode.distances_in_strides);
        assert!(!facedet_vision::DecodeConfig::default().distances_in_strides);
        assert!(cfg.detector.decode.validate().is_ok());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/config.toml");
        let mut cfg = Config::default();
        cfg.detector.decode.nms = NmsPreset::Aggressive;
        cfg.detector.decode.max_detections = Some(10);
        save_config(&cfg, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "/models/scrfd.onnx"

[detector]
input_size = 320

[detector.decode]
confidence_threshold = 0.6
strategy = "direct"
nms = { custom = 0.35 }

[detector.decode.shape_filter]
min_size = 16.0

[detector.outputs]
scores = ["score_8", "score_16", "score_32"]
boxes = ["bbox_8", "bbox_16", "bbox_32"]
"#,
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.model, PathBuf::from("/models/scrfd.onnx"));
        assert_eq!(cfg.detector.input_size, 320);
        assert_eq!(cfg.detector.decode.confidence_threshold, 0.6);
        assert_eq!(cfg.detector.decode.strategy, DecodeStrategy::Direct);
        assert_eq!(cfg.detector.decode.nms.threshold(), 0.35);
        assert_eq!(cfg.detector.decode.shape_filter.min_size, 16.0);
        assert_eq!(cfg.detector.decode.shape_filter.max_aspect, 5.0);
        assert_eq!(cfg.detector.outputs.scores.len(), 3);
        assert_eq!(cfg.detector.preprocess.mean, 127.5);
    }
}
