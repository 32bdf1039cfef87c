use serde::{Deserialize, Serialize};

/// Number of facial landmarks predicted per face.
pub const NUM_KEYPOINTS: usize = 5;

/// Axis-aligned box in original-image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Build a box from corner coordinates.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    pub fn x2(&self) -> f32 {
        self.x + self.width
    }

    pub fn y2(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union; `0.0` whenever the boxes do not overlap.
    pub fn iou(&self, other: &Self) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let inter = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// A single facial landmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

/// One face candidate surviving the level decoder.
///
/// `keypoints` is either empty or holds exactly [`NUM_KEYPOINTS`] points
/// (left eye, right eye, nose, left mouth corner, right mouth corner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub confidence: f32,
    #[serde(rename = "boundingBox")]
    pub bbox: BoundingBox,
    pub keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn has_keypoints(&self) -> bool {
        self.keypoints.len() == NUM_KEYPOINTS
    }
}
