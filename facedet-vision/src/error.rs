use thiserror::Error;

/// Errors raised while decoding detector outputs.
///
/// Shape and anchor errors are scoped to a single pyramid level and get downgraded to
/// warnings. Configuration and output-mapping errors fail the whole call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("shape mismatch at stride {stride}: {detail}")]
    ShapeMismatch { stride: u32, detail: String },

    #[error("anchor index {index} out of range for a grid of {capacity} anchors")]
    AnchorOutOfRange { index: usize, capacity: usize },

    #[error("invalid decode configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot map model outputs: {0}")]
    OutputLayout(String),
}

impl DecodeError {
    pub(crate) fn shape(stride: u32, detail: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            stride,
            detail: detail.into(),
        }
    }

    /// Whether this error only affects a single level.
    pub fn is_level_scoped(&self) -> bool {
        matches!(
            self,
            Self::ShapeMismatch { .. } | Self::AnchorOutOfRange { .. }
        )
    }
}
