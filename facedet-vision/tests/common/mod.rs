#![allow(dead_code)]

use facedet_vision::{AnchorGrid, LevelInput, LevelTensors, PyramidLevel, RawTensor};

pub const INPUT_SIZE: u32 = 640;

/// Owned tensors for one synthetic pyramid level, all anchors "background".
pub struct SyntheticLevel {
    pub level: PyramidLevel,
    pub grid: AnchorGrid,
    pub scores: Vec<f32>,
    pub boxes: Vec<f32>,
    pub kps: Vec<f32>,
}

impl SyntheticLevel {
    pub fn new(index: usize) -> Self {
        let level = PyramidLevel::from_index(index, 2);
        let grid = level.grid(INPUT_SIZE);
        let n = grid.len();
        Self {
            level,
            grid,
            scores: vec![-12.0; n],
            boxes: vec![0.0; n * 4],
            kps: vec![0.0; n * 10],
        }
    }

    /// Place a face on cell `(gx, gy)` with the given logit and edge distances.
    pub fn face(&mut self, gx: usize, gy: usize, logit: f32, dist: [f32; 4]) -> usize {
        let a = (gy * self.grid.feature_map_size + gx) * self.grid.anchors_per_cell;
        self.scores[a] = logit;
        self.boxes[a * 4..a * 4 + 4].copy_from_slice(&dist);
        a
    }

    pub fn input(&self) -> LevelInput<'_> {
        LevelInput {
            level: self.level,
            tensors: LevelTensors {
                scores: Some(RawTensor::flat(&self.scores)),
                boxes: Some(RawTensor::flat(&self.boxes)),
                keypoints: Some(RawTensor::flat(&self.kps)),
            },
        }
    }
}

pub fn pyramid() -> Vec<SyntheticLevel> {
    (0..3).map(SyntheticLevel::new).collect()
}

pub fn inputs(levels: &[SyntheticLevel]) -> Vec<LevelInput<'_>> {
    levels.iter().map(SyntheticLevel::input).collect()
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
