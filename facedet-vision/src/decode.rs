//! SCRFD level decoding.
//!
//! Each pyramid level yields three flat tensors:
//! - scores: [N, C] - raw logits, `C` classes (usually 1)
//! - bbox: [N, 4] - distances (left, top, right, bottom) from the anchor centre
//! - kps: [N, 10] - optional landmark offsets (5 points x 2 coords)
//!
//! Decoding per anchor `a`:
//! conf = max_c sigmoid(scores[a, c])
//! x1 = ax - left, y1 = ay - top, x2 = ax + right, y2 = ay + bottom
//! then back through the letterbox, clamped to the image and shape-filtered.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::anchor::PyramidLevel;
use crate::diagnostics::{DecodeEvent, DiagnosticSink, RejectReason};
use crate::error::DecodeError;
use crate::face::{BoundingBox, Detection, Keypoint, NUM_KEYPOINTS};
use crate::letterbox::LetterboxTransform;
use crate::nms::NmsPreset;

const BOX_COLS: usize = 4;
const KPS_COLS: usize = NUM_KEYPOINTS * 2;

/// A flat output tensor together with its declared shape.
#[derive(Debug, Clone, Copy)]
pub struct RawTensor<'a> {
    pub shape: &'a [i64],
    pub data: &'a [f32],
}

impl<'a> RawTensor<'a> {
    pub fn new(shape: &'a [i64], data: &'a [f32]) -> Self {
        Self { shape, data }
    }

    /// Tensor without shape information, interpreted row-wise by the caller.
    pub fn flat(data: &'a [f32]) -> Self {
        Self { shape: &[], data }
    }

    /// Size of the innermost dimension, or `default` for rank 0/1 tensors.
    fn cols(&self, default: usize) -> usize {
        match self.shape {
            [_, .., last] if *last > 0 => *last as usize,
            _ => default,
        }
    }

    fn declared_len(&self) -> Option<usize> {
        if self.shape.is_empty() {
            return None;
        }
        Some(self.shape.iter().map(|&d| d.max(0) as usize).product())
    }

    /// View as `[rows, cols]`, checking the declared shape against the data.
    fn rows(&self, cols: usize, stride: u32, role: &str) -> Result<ArrayView2<'a, f32>, DecodeError> {
        if let Some(declared) = self.declared_len() {
            if declared != self.data.len() {
                return Err(DecodeError::shape(
                    stride,
                    format!(
                        "{} declares shape {:?} but holds {} values",
                        role,
                        self.shape,
                        self.data.len()
                    ),
                ));
            }
        }
        if cols == 0 || self.data.len() % cols != 0 {
            return Err(DecodeError::shape(
                stride,
                format!("{} length {} is not a multiple of {}", role, self.data.len(), cols),
            ));
        }
        ArrayView2::from_shape((self.data.len() / cols, cols), self.data)
            .map_err(|e| DecodeError::shape(stride, format!("{}: {}", role, e)))
    }
}

/// The three output tensors of one level. Missing scores or boxes skip the level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelTensors<'a> {
    pub scores: Option<RawTensor<'a>>,
    pub boxes: Option<RawTensor<'a>>,
    pub keypoints: Option<RawTensor<'a>>,
}

/// How the box tensor encodes geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    /// `(left, top, right, bottom)` distances from the anchor centre; keypoints are
    /// offsets from the centre.
    #[default]
    Distance,
    /// `(x1, y1, x2, y2)` already in model input space; keypoints are absolute.
    Direct,
}

/// Heuristic filter applied to boxes in original-image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeFilter {
    pub enabled: bool,
    /// Minimum width and height in pixels.
    pub min_size: f32,
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Reject boxes wider or taller than the image's short side.
    pub limit_to_short_side: bool,
}

impl Default for ShapeFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size: 10.0,
            min_aspect: 0.2,
            max_aspect: 5.0,
            limit_to_short_side: true,
        }
    }
}

impl ShapeFilter {
    /// Only drops boxes with non-positive area.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn check(
        &self,
        width: f32,
        height: f32,
        image_width: u32,
        image_height: u32,
    ) -> Result<(), RejectReason> {
        if width <= 0.0 || height <= 0.0 {
            return Err(RejectReason::TooSmall);
        }
        if !self.enabled {
            return Ok(());
        }
        if width < self.min_size || height < self.min_size {
            return Err(RejectReason::TooSmall);
        }
        if self.limit_to_short_side {
            let short = image_width.min(image_height) as f32;
            if width > short || height > short {
                return Err(RejectReason::TooLarge);
            }
        }
        let aspect = width / height;
        if aspect < self.min_aspect || aspect > self.max_aspect {
            return Err(RejectReason::AspectRatio);
        }
        Ok(())
    }
}

/// Tunables for turning raw outputs into detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub confidence_threshold: f32,
    pub nms: NmsPreset,
    pub shape_filter: ShapeFilter,
    pub strategy: DecodeStrategy,
    /// Multiply distances and keypoint offsets by the level stride before decoding.
    pub distances_in_strides: bool,
    /// Keep at most this many detections after NMS.
    pub max_detections: Option<usize>,
    /// Decode levels on scoped threads; output is identical to the sequential path.
    pub parallel_levels: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            nms: NmsPreset::Standard,
            shape_filter: ShapeFilter::default(),
            strategy: DecodeStrategy::Distance,
            distances_in_strides: false,
            max_detections: None,
            parallel_levels: false,
        }
    }
}

impl DecodeConfig {
    pub fn validate(&self) -> Result<(), DecodeError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DecodeError::InvalidConfig(format!(
                "confidence threshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        let nms = self.nms.threshold();
        if !(nms > 0.0 && nms < 1.0) {
            return Err(DecodeError::InvalidConfig(format!(
                "nms threshold {} outside (0, 1)",
                nms
            )));
        }
        let f = &self.shape_filter;
        if f.enabled && !(f.min_aspect > 0.0 && f.min_aspect <= f.max_aspect) {
            return Err(DecodeError::InvalidConfig(format!(
                "aspect range [{}, {}] is empty",
                f.min_aspect, f.max_aspect
            )));
        }
        Ok(())
    }
}

/// Logistic sigmoid.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Decode one pyramid level into filtered candidates in original-image space.
///
/// Returns [`DecodeError::ShapeMismatch`] when the tensors are missing or do not match
/// the anchor grid; the caller decides whether that is fatal.
pub fn decode_level<S: DiagnosticSink + ?Sized>(
    level: PyramidLevel,
    tensors: &LevelTensors<'_>,
    transform: &LetterboxTransform,
    config: &DecodeConfig,
    sink: &mut S,
) -> Result<Vec<Detection>, DecodeError> {
    let stride = level.stride;
    let grid = level.grid(transform.target_size);

    let scores_raw = tensors
        .scores
        .ok_or_else(|| DecodeError::shape(stride, "missing scores tensor"))?;
    let boxes_raw = tensors
        .boxes
        .ok_or_else(|| DecodeError::shape(stride, "missing bbox tensor"))?;

    let scores = scores_raw.rows(scores_raw.cols(1), stride, "scores")?;
    let boxes = boxes_raw.rows(BOX_COLS, stride, "bbox")?;
    if boxes_raw.cols(BOX_COLS) != BOX_COLS {
        return Err(DecodeError::shape(
            stride,
            format!("bbox shape {:?} is not [.., 4]", boxes_raw.shape),
        ));
    }

    let num_anchors = scores.nrows();
    if boxes.nrows() != num_anchors {
        return Err(DecodeError::shape(
            stride,
            format!(
                "scores describe {} anchors, bbox describes {}",
                num_anchors,
                boxes.nrows()
            ),
        ));
    }
    if num_anchors != grid.len() {
        return Err(DecodeError::shape(
            stride,
            format!(
                "expected {} anchors ({}x{} grid, {} per cell), got {}",
                grid.len(),
                grid.feature_map_size,
                grid.feature_map_size,
                grid.anchors_per_cell,
                num_anchors
            ),
        ));
    }

    let keypoints = match tensors
        .keypoints
        .map(|raw| KeypointRows::new(raw, num_anchors, stride))
    {
        Some(Ok(rows)) => Some(rows),
        Some(Err(error)) => {
            sink.record(DecodeEvent::KeypointsDropped { stride, error });
            None
        }
        None => None,
    };
    let unit = match (config.strategy, config.distances_in_strides) {
        (DecodeStrategy::Distance, true) => stride as f32,
        _ => 1.0,
    };

    let mut candidates = Vec::new();
    let mut above_threshold = 0;

    for (a, logits) in scores.rows().into_iter().enumerate() {
        let confidence = logits.iter().fold(f32::NEG_INFINITY, |m, &x| m.max(sigmoid(x)));
        // NaN compares false and is rejected here too
        if !(confidence > config.confidence_threshold) {
            continue;
        }
        above_threshold += 1;

        let (ax, ay) = grid.center(a)?;
        let b = boxes.row(a);
        let (mx1, my1, mx2, my2) = match config.strategy {
            DecodeStrategy::Distance => (
                ax - b[0] * unit,
                ay - b[1] * unit,
                ax + b[2] * unit,
                ay + b[3] * unit,
            ),
            DecodeStrategy::Direct => (b[0], b[1], b[2], b[3]),
        };

        let (x1, y1) = transform.inverse(mx1, my1);
        let (x2, y2) = transform.inverse(mx2, my2);
        let (x1, y1) = transform.clamp(x1, y1);
        let (x2, y2) = transform.clamp(x2, y2);
        let (width, height) = (x2 - x1, y2 - y1);

        let verdict = if [x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            config.shape_filter.check(
                width,
                height,
                transform.original_width,
                transform.original_height,
            )
        } else {
            Err(RejectReason::NonFinite)
        };
        if let Err(reason) = verdict {
            sink.record(DecodeEvent::CandidateRejected {
                stride,
                anchor: a,
                confidence,
                width,
                height,
                reason,
            });
            continue;
        }

        let keypoints = keypoints
            .as_ref()
            .and_then(|k| k.row(a))
            .map(|offsets| decode_keypoints(offsets, (ax, ay), unit, config.strategy, transform))
            .unwrap_or_default();

        candidates.push(Detection {
            confidence,
            bbox: BoundingBox::from_corners(x1, y1, x2, y2),
            keypoints,
        });
    }

    sink.record(DecodeEvent::LevelDecoded {
        stride,
        anchors: num_anchors,
        above_threshold,
        kept: candidates.len(),
    });

    Ok(candidates)
}

/// Row access into the optional keypoint tensor, checked against the anchor count.
struct KeypointRows<'a> {
    data: &'a [f32],
    cols: usize,
}

impl<'a> KeypointRows<'a> {
    fn new(raw: RawTensor<'a>, num_anchors: usize, stride: u32) -> Result<Self, DecodeError> {
        let cols = raw.cols(KPS_COLS);
        if cols < KPS_COLS {
            return Err(DecodeError::shape(
                stride,
                format!("kps shape {:?} has fewer than {} columns", raw.shape, KPS_COLS),
            ));
        }
        let rows = raw.rows(cols, stride, "kps")?.nrows();
        if rows != num_anchors {
            return Err(DecodeError::shape(
                stride,
                format!("kps describes {} anchors, scores describe {}", rows, num_anchors),
            ));
        }
        Ok(Self {
            data: raw.data,
            cols,
        })
    }

    fn row(&self, a: usize) -> Option<&'a [f32]> {
        let start = a.checked_mul(self.cols)?;
        self.data.get(start..start + KPS_COLS)
    }
}

fn decode_keypoints(
    offsets: &[f32],
    (ax, ay): (f32, f32),
    unit: f32,
    strategy: DecodeStrategy,
    transform: &LetterboxTransform,
) -> Vec<Keypoint> {
    offsets
        .chunks_exact(2)
        .take(NUM_KEYPOINTS)
        .map(|p| {
            let (mx, my) = match strategy {
                DecodeStrategy::Distance => (ax + p[0] * unit, ay + p[1] * unit),
                DecodeStrategy::Direct => (p[0], p[1]),
            };
            let (x, y) = transform.inverse(mx, my);
            Keypoint { x, y }
        })
        .collect()
}
