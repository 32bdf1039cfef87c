pub mod anchor;
pub mod decode;
pub mod detect;
pub mod diagnostics;
pub mod error;
pub mod face;
pub mod letterbox;
pub mod model;
pub mod nms;
pub mod outputs;
pub mod pipeline;
pub mod preprocess;

// Re-export commonly used types
pub use anchor::{AnchorGrid, PyramidLevel};
pub use decode::{decode_level, DecodeConfig, DecodeStrategy, LevelTensors, RawTensor, ShapeFilter};
pub use detect::{decode_levels, DetectionReport, LevelInput, LevelWarning};
pub use diagnostics::{CollectingSink, DecodeEvent, DiagnosticSink, LogSink};
pub use error::DecodeError;
pub use face::{BoundingBox, Detection, Keypoint};
pub use letterbox::LetterboxTransform;
pub use nms::{nms, NmsPreset};
pub use outputs::{OutputLayout, OutputNames};
pub use pipeline::{Detector, DetectorConfig};
