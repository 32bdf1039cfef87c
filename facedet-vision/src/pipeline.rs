use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::{session::Session, value::Tensor};
use serde::{Deserialize, Serialize};

use crate::decode::DecodeConfig;
use crate::detect::{decode_levels, DetectionReport};
use crate::diagnostics::{DiagnosticSink, LogSink};
use crate::error::DecodeError;
use crate::letterbox::LetterboxTransform;
use crate::outputs::{OutputLayout, OutputNames};
use crate::preprocess::{self, PreprocessConfig};

/// Everything the detector needs besides the model itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Side of the square model input.
    pub input_size: u32,
    pub decode: DecodeConfig,
    pub preprocess: PreprocessConfig,
    pub outputs: OutputNames,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            decode: DecodeConfig::default(),
            preprocess: PreprocessConfig::default(),
            outputs: OutputNames::default(),
        }
    }
}

/// Decode already-extracted model outputs.
///
/// `outputs` holds `(shape, data)` per output in session order, `names` the matching
/// output names.
pub fn decode_outputs<S: DiagnosticSink + ?Sized>(
    layout: &OutputLayout,
    outputs: &[(Vec<i64>, Vec<f32>)],
    transform: &LetterboxTransform,
    config: &DecodeConfig,
    sink: &mut S,
) -> Result<DetectionReport, DecodeError> {
    let levels = layout.level_inputs(outputs);
    decode_levels(&levels, transform, config, sink)
}

fn resolve_layout(names: &[String], config: &DetectorConfig) -> Result<OutputLayout> {
    let layout = OutputLayout::resolve(names, Some(&config.outputs))
        .with_context(|| format!("mapping model outputs {:?}", names))?;
    log::debug!(
        "resolved {} pyramid levels from outputs {:?}",
        layout.levels.len(),
        names
    );
    Ok(layout)
}

/// Face detector: letterbox -> inference -> decode -> NMS.
pub struct Detector {
    pub session: Session,
    config: DetectorConfig,
    layout: OutputLayout,
}

impl Detector {
    /// Validate `config` and map the session outputs to pyramid levels.
    pub fn new(session: Session, config: DetectorConfig) -> Result<Self> {
        anyhow::ensure!(config.input_size > 0, "input size must be positive");
        config.decode.validate()?;

        let names: Vec<String> = session
            .outputs()
            .iter()
            .map(|output| output.name().to_string())
            .collect();
        let layout = resolve_layout(&names, &config)?;

        Ok(Self {
            session,
            config,
            layout,
        })
    }

    pub fn from_file(model: &Path, config: DetectorConfig) -> Result<Self> {
        let session = crate::model::detector_session(model)?;
        Self::new(session, config)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Detect faces, forwarding decode diagnostics to the `log` crate.
    pub fn detect(&mut self, img: &DynamicImage) -> Result<DetectionReport> {
        self.detect_with(img, &mut LogSink)
    }

    pub fn detect_with<S: DiagnosticSink + ?Sized>(
        &mut self,
        img: &DynamicImage,
        sink: &mut S,
    ) -> Result<DetectionReport> {
        let (input_array, transform) =
            preprocess::prepare(img, self.config.input_size, &self.config.preprocess)
                .context("preprocessing image")?;
        let input_tensor = Tensor::from_array(input_array)?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;
        let mut output_data: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
        for (name, output) in outputs.iter() {
            let (shape, data) = output
                .try_extract_tensor::<f32>()
                .with_context(|| format!("extracting output {}", name))?;
            output_data.push((shape.iter().copied().collect(), data.to_vec()));
        }

        let report =
            decode_outputs(&self.layout, &output_data, &transform, &self.config.decode, sink)?;
        Ok(report)
    }
}
