//! Anchor grids for the feature pyramid.
//!
//! SCRFD places `anchors_per_cell` anchors on every cell of a `target/stride` square grid.
//! Anchors of one cell share the same centre and only differ in the box they regress.
//! For a 640x640 input with two anchors per cell:
//! - Stride 8:  80x80 grid = 12800 anchors
//! - Stride 16: 40x40 grid = 3200 anchors
//! - Stride 32: 20x20 grid = 800 anchors

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

pub const DEFAULT_ANCHORS_PER_CELL: usize = 2;

/// One output group of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidLevel {
    pub stride: u32,
    pub anchors_per_cell: usize,
}

impl PyramidLevel {
    /// Level at position `index` in output order, `stride = 2^(index + 3)`.
    pub fn from_index(index: usize, anchors_per_cell: usize) -> Self {
        Self {
            stride: 1u32 << (index as u32 + 3),
            anchors_per_cell: anchors_per_cell.max(1),
        }
    }

    pub fn grid(&self, target_size: u32) -> AnchorGrid {
        AnchorGrid::new(self.stride, target_size, self.anchors_per_cell)
    }
}

/// Anchor layout of one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorGrid {
    pub stride: u32,
    pub feature_map_size: usize,
    pub anchors_per_cell: usize,
}

impl AnchorGrid {
    pub fn new(stride: u32, target_size: u32, anchors_per_cell: usize) -> Self {
        let stride = stride.max(1);
        Self {
            stride,
            feature_map_size: (target_size / stride) as usize,
            anchors_per_cell: anchors_per_cell.max(1),
        }
    }

    /// Total number of anchors, `feature_map_size^2 * anchors_per_cell`.
    pub fn len(&self) -> usize {
        self.feature_map_size * self.feature_map_size * self.anchors_per_cell
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid cell `(grid_x, grid_y)` of anchor index `a`.
    pub fn cell(&self, a: usize) -> Result<(usize, usize), DecodeError> {
        if a >= self.len() {
            return Err(DecodeError::AnchorOutOfRange {
                index: a,
                capacity: self.len(),
            });
        }
        let spatial = a / self.anchors_per_cell;
        Ok((spatial % self.feature_map_size, spatial / self.feature_map_size))
    }

    /// Centre of anchor `a` in model input space.
    pub fn center(&self, a: usize) -> Result<(f32, f32), DecodeError> {
        let (gx, gy) = self.cell(a)?;
        Ok(self.cell_center(gx, gy))
    }

    pub fn cell_center(&self, grid_x: usize, grid_y: usize) -> (f32, f32) {
        let stride = self.stride as f32;
        (
            (grid_x as f32 + 0.5) * stride,
            (grid_y as f32 + 0.5) * stride,
        )
    }

    /// Row-major iterator over the cell of every anchor index.
    pub fn cells(&self) -> Cells {
        Cells {
            grid: *self,
            next: 0,
        }
    }
}

/// Lazy iterator returned by [`AnchorGrid::cells`].
#[derive(Debug, Clone)]
pub struct Cells {
    grid: AnchorGrid,
    next: usize,
}

impl Iterator for Cells {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let cell = self.grid.cell(self.next).ok()?;
        self.next += 1;
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.grid.len().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Cells {}
