use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::face::Detection;

/// IoU thresholds used by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NmsPreset {
    /// 0.4
    #[default]
    Standard,
    /// 0.3, suppresses more neighbouring boxes.
    Aggressive,
    Custom(f32),
}

impl NmsPreset {
    pub fn threshold(&self) -> f32 {
        match self {
            NmsPreset::Standard => 0.4,
            NmsPreset::Aggressive => 0.3,
            NmsPreset::Custom(t) => *t,
        }
    }
}

impl From<f32> for NmsPreset {
    fn from(t: f32) -> Self {
        NmsPreset::Custom(t)
    }
}

fn by_confidence_desc(a: &Detection, b: &Detection) -> Ordering {
    let rank = |c: f32| if c.is_nan() { f32::NEG_INFINITY } else { c };
    rank(b.confidence).total_cmp(&rank(a.confidence))
}

/// Greedy non-maximum suppression.
///
/// Candidates are ordered by descending confidence; equal confidences keep their input
/// order. The highest remaining candidate is kept and every remaining one whose IoU with
/// it exceeds `iou_threshold` is dropped.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    // stable: ties stay in insertion order
    detections.sort_by(by_confidence_desc);

    let mut keep: Vec<Detection> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if detections[i].bbox.iou(&detections[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
        keep.push(detections[i].clone());
    }

    keep
}
