pub mod config;

// Re-export vision types for convenience
pub use facedet_vision::{
    detect, face, pipeline, DetectionReport, Detection, Detector, DetectorConfig,
};

use anyhow::{Context, Result};
use std::path::Path;

/// Load an image, run the detector and return the report.
pub fn detect_file(detector: &mut Detector, image: &Path) -> Result<DetectionReport> {
    let img = image::open(image).with_context(|| format!("opening {}", image.display()))?;
    detector
        .detect(&img)
        .with_context(|| format!("detecting faces in {}", image.display()))
}

/// Render a report as pretty-printed JSON.
pub fn report_json(report: &DetectionReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facedet_vision::{BoundingBox, Keypoint, LevelWarning};

    #[test]
    fn test_report_json() {
        let report = DetectionReport {
            detections: vec![Detection {
                confidence: 0.9,
                bbox: BoundingBox::from_corners(10.0, 20.0, 60.0, 80.0),
                keypoints: vec![Keypoint { x: 30.0, y: 40.0 }; 5],
            }],
            warnings: vec![LevelWarning {
                stride: 32,
                message: "missing bbox tensor".into(),
            }],
            candidates: 3,
        };
        let json: serde_json::Value = serde_json::from_str(&report_json(&report).unwrap()).unwrap();
        assert_eq!(json["detections"][0]["boundingBox"]["width"], 50.0);
        assert_eq!(json["detections"][0]["keypoints"].as_array().unwrap().len(), 5);
        assert_eq!(json["warnings"][0]["stride"], 32);
        assert!(json.get("candidates").is_none());
    }

    #[test]
    fn test_empty_report_omits_warnings() {
        let json: serde_json::Value =
            serde_json::from_str(&report_json(&DetectionReport::default()).unwrap()).unwrap();
        assert!(json["detections"].as_array().unwrap().is_empty());
        assert!(json.get("warnings").is_none());
    }
}
