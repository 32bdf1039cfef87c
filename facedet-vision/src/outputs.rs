//! Mapping of named model outputs to per-level (scores, bbox, kps) triples.
//!
//! SCRFD exports order their outputs as
//! `score_8, score_16, score_32, bbox_8, bbox_16, bbox_32, kps_8, kps_16, kps_32`,
//! but output names vary between exports (some are plain node ids like `"448"`).
//! The layout is resolved once per session, in this order of preference:
//! 1. explicit names from the configuration,
//! 2. role keywords in the output names (`score`/`cls`, `bbox`/`box`, `kps`/`landmark`),
//! 3. positional ordering keyed on the output count.

use serde::{Deserialize, Serialize};

use crate::anchor::{PyramidLevel, DEFAULT_ANCHORS_PER_CELL};
use crate::decode::{LevelTensors, RawTensor};
use crate::detect::LevelInput;
use crate::error::DecodeError;

/// Explicit role -> output name mapping, one entry per level in stride order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputNames {
    pub scores: Vec<String>,
    pub boxes: Vec<String>,
    pub keypoints: Vec<String>,
    pub anchors_per_cell: Option<usize>,
}

impl OutputNames {
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.boxes.is_empty() && self.keypoints.is_empty()
    }
}

/// Output indices feeding one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelOutputs {
    pub level: PyramidLevel,
    pub scores: usize,
    pub boxes: usize,
    pub keypoints: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub levels: Vec<LevelOutputs>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Scores,
    Boxes,
    Keypoints,
}

fn classify(name: &str) -> Option<Role> {
    let name = name.to_ascii_lowercase();
    if name.contains("kps") || name.contains("landmark") {
        Some(Role::Keypoints)
    } else if name.contains("bbox") || name.contains("box") {
        Some(Role::Boxes)
    } else if name.contains("score") || name.contains("cls") {
        Some(Role::Scores)
    } else {
        None
    }
}

impl OutputLayout {
    /// Resolve the layout for outputs named `names` (in session order).
    pub fn resolve<S: AsRef<str>>(
        names: &[S],
        explicit: Option<&OutputNames>,
    ) -> Result<Self, DecodeError> {
        if let Some(explicit) = explicit.filter(|e| !e.is_empty()) {
            return Self::from_explicit(names, explicit);
        }
        if let Some(layout) = Self::from_keywords(names) {
            return Ok(layout);
        }
        Self::from_count(names.len())
    }

    fn from_explicit<S: AsRef<str>>(
        names: &[S],
        explicit: &OutputNames,
    ) -> Result<Self, DecodeError> {
        let find = |wanted: &str| {
            names
                .iter()
                .position(|n| n.as_ref() == wanted)
                .ok_or_else(|| DecodeError::OutputLayout(format!("no output named {:?}", wanted)))
        };

        if explicit.scores.len() != explicit.boxes.len() {
            return Err(DecodeError::OutputLayout(format!(
                "{} score outputs but {} bbox outputs",
                explicit.scores.len(),
                explicit.boxes.len()
            )));
        }
        if !explicit.keypoints.is_empty() && explicit.keypoints.len() != explicit.scores.len() {
            return Err(DecodeError::OutputLayout(format!(
                "{} keypoint outputs for {} levels",
                explicit.keypoints.len(),
                explicit.scores.len()
            )));
        }

        let anchors = explicit
            .anchors_per_cell
            .unwrap_or(DEFAULT_ANCHORS_PER_CELL);
        let mut levels = Vec::with_capacity(explicit.scores.len());
        for (i, (s, b)) in explicit.scores.iter().zip(&explicit.boxes).enumerate() {
            let keypoints = match explicit.keypoints.get(i) {
                Some(k) => Some(find(k.as_str())?),
                None => None,
            };
            levels.push(LevelOutputs {
                level: PyramidLevel::from_index(i, anchors),
                scores: find(s.as_str())?,
                boxes: find(b.as_str())?,
                keypoints,
            });
        }
        Ok(Self { levels })
    }

    fn from_keywords<S: AsRef<str>>(names: &[S]) -> Option<Self> {
        let mut scores = Vec::new();
        let mut boxes = Vec::new();
        let mut kps = Vec::new();
        for (i, name) in names.iter().enumerate() {
            match classify(name.as_ref())? {
                Role::Scores => scores.push(i),
                Role::Boxes => boxes.push(i),
                Role::Keypoints => kps.push(i),
            }
        }
        if scores.is_empty() || scores.len() != boxes.len() {
            return None;
        }
        if !kps.is_empty() && kps.len() != scores.len() {
            return None;
        }
        let anchors = anchors_for_levels(scores.len());
        let levels = scores
            .iter()
            .zip(&boxes)
            .enumerate()
            .map(|(i, (&s, &b))| LevelOutputs {
                level: PyramidLevel::from_index(i, anchors),
                scores: s,
                boxes: b,
                keypoints: kps.get(i).copied(),
            })
            .collect();
        Some(Self { levels })
    }

    fn from_count(count: usize) -> Result<Self, DecodeError> {
        let (fmc, use_kps) = match count {
            6 => (3, false),
            9 => (3, true),
            10 => (5, false),
            15 => (5, true),
            n => {
                return Err(DecodeError::OutputLayout(format!(
                    "unrecognised output count {}",
                    n
                )))
            }
        };
        let anchors = anchors_for_levels(fmc);
        let levels = (0..fmc)
            .map(|i| LevelOutputs {
                level: PyramidLevel::from_index(i, anchors),
                scores: i,
                boxes: i + fmc,
                keypoints: use_kps.then_some(i + fmc * 2),
            })
            .collect();
        Ok(Self { levels })
    }

    pub fn has_keypoints(&self) -> bool {
        self.levels.iter().any(|l| l.keypoints.is_some())
    }

    /// Borrow the matching tensors for each level. Indices past the end become missing
    /// tensors, which the decoder reports as a shape mismatch.
    pub fn level_inputs<'a>(&self, outputs: &'a [(Vec<i64>, Vec<f32>)]) -> Vec<LevelInput<'a>> {
        let tensor = |i: usize| {
            outputs
                .get(i)
                .map(|(shape, data)| RawTensor::new(shape.as_slice(), data.as_slice()))
        };
        self.levels
            .iter()
            .map(|l| LevelInput {
                level: l.level,
                tensors: LevelTensors {
                    scores: tensor(l.scores),
                    boxes: tensor(l.boxes),
                    keypoints: l.keypoints.and_then(tensor),
                },
            })
            .collect()
    }
}

/// SCRFD convention: 3-level exports use two anchors per cell, 5-level exports one.
fn anchors_for_levels(levels: usize) -> usize {
    if levels >= 5 {
        1
    } else {
        DEFAULT_ANCHORS_PER_CELL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_layout() {
        let names = [
            "score_8", "score_16", "score_32", "bbox_8", "bbox_16", "bbox_32", "kps_8", "kps_16",
            "kps_32",
        ];
        let layout = OutputLayout::resolve(&names, None).unwrap();
        assert_eq!(layout.levels.len(), 3);
        assert_eq!(layout.levels[1].scores, 1);
        assert_eq!(layout.levels[1].boxes, 4);
        assert_eq!(layout.levels[1].keypoints, Some(7));
        assert_eq!(layout.levels[2].level.stride, 32);
        assert_eq!(layout.levels[2].level.anchors_per_cell, 2);
    }

    #[test]
    fn test_keyword_layout_interleaved() {
        let names = ["cls_8", "bbox_8", "cls_16", "bbox_16"];
        let layout = OutputLayout::resolve(&names, None).unwrap();
        assert_eq!(layout.levels.len(), 2);
        assert_eq!(layout.levels[1].scores, 2);
        assert_eq!(layout.levels[1].boxes, 3);
        assert!(!layout.has_keypoints());
    }

    #[test]
    fn test_positional_layout() {
        let names: Vec<String> = (440..449).map(|i| i.to_string()).collect();
        let layout = OutputLayout::resolve(&names, None).unwrap();
        assert_eq!(layout.levels.len(), 3);
        assert_eq!(layout.levels[0].boxes, 3);
        assert_eq!(layout.levels[0].keypoints, Some(6));

        let names: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        let layout = OutputLayout::resolve(&names, None).unwrap();
        assert_eq!(layout.levels.len(), 5);
        assert_eq!(layout.levels[4].level.stride, 128);
        assert_eq!(layout.levels[4].level.anchors_per_cell, 1);
        assert_eq!(layout.levels[4].keypoints, None);
    }

    #[test]
    fn test_unknown_count() {
        let names = ["a", "b", "c", "d"];
        assert!(matches!(
            OutputLayout::resolve(&names, None),
            Err(DecodeError::OutputLayout(_))
        ));
    }

    #[test]
    fn test_explicit_layout() {
        let names = ["x", "y", "z", "w"];
        let explicit = OutputNames {
            scores: vec!["w".into(), "y".into()],
            boxes: vec!["x".into(), "z".into()],
            keypoints: vec![],
            anchors_per_cell: Some(1),
        };
        let layout = OutputLayout::resolve(&names, Some(&explicit)).unwrap();
        assert_eq!(layout.levels[0].scores, 3);
        assert_eq!(layout.levels[0].boxes, 0);
        assert_eq!(layout.levels[1].level.stride, 16);
        assert_eq!(layout.levels[1].level.anchors_per_cell, 1);

        let missing = OutputNames {
            scores: vec!["nope".into()],
            boxes: vec!["x".into()],
            ..Default::default()
        };
        assert!(OutputLayout::resolve(&names, Some(&missing)).is_err());
    }

    #[test]
    fn test_level_inputs_missing_output() {
        let layout = OutputLayout::resolve(&["score_8", "bbox_8"], None).unwrap();
        let outputs = vec![(vec![2i64, 1], vec![0.0f32; 2])];
        let inputs = layout.level_inputs(&outputs);
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].tensors.scores.is_some());
        assert!(inputs[0].tensors.boxes.is_none());
    }
}
