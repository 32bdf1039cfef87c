//! Multi-level aggregation and suppression.

use serde::Serialize;

use crate::anchor::PyramidLevel;
use crate::decode::{decode_level, DecodeConfig, LevelTensors};
use crate::diagnostics::{CollectingSink, DecodeEvent, DiagnosticSink};
use crate::error::DecodeError;
use crate::face::Detection;
use crate::letterbox::LetterboxTransform;
use crate::nms::nms;

/// Raw tensors of one pyramid level.
#[derive(Debug, Clone, Copy)]
pub struct LevelInput<'a> {
    pub level: PyramidLevel,
    pub tensors: LevelTensors<'a>,
}

/// A level that was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelWarning {
    pub stride: u32,
    pub message: String,
}

/// Final output for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionReport {
    /// Confidence-descending, pairwise IoU at most the NMS threshold.
    pub detections: Vec<Detection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<LevelWarning>,
    /// Candidates before suppression.
    #[serde(skip)]
    pub candidates: usize,
}

impl DetectionReport {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Decode every level and concatenate the candidates in level order.
///
/// Levels with missing or inconsistent tensors are skipped and reported as warnings.
pub fn collect_candidates<S: DiagnosticSink + ?Sized>(
    levels: &[LevelInput<'_>],
    transform: &LetterboxTransform,
    config: &DecodeConfig,
    sink: &mut S,
) -> Result<(Vec<Detection>, Vec<LevelWarning>), DecodeError> {
    config.validate()?;

    let results = if config.parallel_levels && levels.len() > 1 {
        decode_parallel(levels, transform, config)
    } else {
        levels
            .iter()
            .map(|input| {
                let mut local = CollectingSink::new();
                let r = decode_level(input.level, &input.tensors, transform, config, &mut local);
                (r, local.events)
            })
            .collect()
    };

    let mut candidates = Vec::new();
    let mut warnings = Vec::new();
    for (input, (result, events)) in levels.iter().zip(results) {
        for event in events {
            sink.record(event);
        }
        match result {
            Ok(mut dets) => candidates.append(&mut dets),
            Err(e) if e.is_level_scoped() => {
                warnings.push(LevelWarning {
                    stride: input.level.stride,
                    message: e.to_string(),
                });
                sink.record(DecodeEvent::LevelSkipped {
                    stride: input.level.stride,
                    error: e,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok((candidates, warnings))
}

type LevelResult = (Result<Vec<Detection>, DecodeError>, Vec<DecodeEvent>);

fn decode_parallel(
    levels: &[LevelInput<'_>],
    transform: &LetterboxTransform,
    config: &DecodeConfig,
) -> Vec<LevelResult> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = levels
            .iter()
            .map(|input| {
                scope.spawn(move || {
                    let mut local = CollectingSink::new();
                    let r =
                        decode_level(input.level, &input.tensors, transform, config, &mut local);
                    (r, local.events)
                })
            })
            .collect();

        // joined in spawn order so concatenation stays deterministic
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

/// Full post-processing: decode all levels, then suppress overlaps.
pub fn decode_levels<S: DiagnosticSink + ?Sized>(
    levels: &[LevelInput<'_>],
    transform: &LetterboxTransform,
    config: &DecodeConfig,
    sink: &mut S,
) -> Result<DetectionReport, DecodeError> {
    let (candidates, warnings) = collect_candidates(levels, transform, config, sink)?;
    let before = candidates.len();

    let mut detections = nms(candidates, config.nms.threshold());
    if let Some(max) = config.max_detections {
        detections.truncate(max);
    }
    sink.record(DecodeEvent::Suppressed {
        before,
        after: detections.len(),
    });

    Ok(DetectionReport {
        detections,
        warnings,
        candidates: before,
    })
}
