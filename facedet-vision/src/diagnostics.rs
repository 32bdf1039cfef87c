//! Structured trace events emitted while decoding.
//!
//! The decoder never logs directly; it hands [`DecodeEvent`]s to a caller-provided
//! [`DiagnosticSink`]. Use `&mut ()` to discard events, [`LogSink`] to forward them to
//! the `log` facade, or [`CollectingSink`] to inspect them afterwards.

use std::fmt;

use crate::error::DecodeError;

/// Why a candidate was dropped after passing the confidence threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooSmall,
    TooLarge,
    AspectRatio,
    NonFinite,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::TooSmall => "below minimum size",
            RejectReason::TooLarge => "larger than image short side",
            RejectReason::AspectRatio => "aspect ratio out of range",
            RejectReason::NonFinite => "non-finite coordinates",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    /// A level was skipped and contributes no candidates.
    LevelSkipped { stride: u32, error: DecodeError },
    /// The keypoint tensor did not line up with the anchors; the level decodes without
    /// landmarks.
    KeypointsDropped { stride: u32, error: DecodeError },
    /// A candidate above the confidence threshold failed the shape filter.
    CandidateRejected {
        stride: u32,
        anchor: usize,
        confidence: f32,
        width: f32,
        height: f32,
        reason: RejectReason,
    },
    /// Summary of one decoded level.
    LevelDecoded {
        stride: u32,
        anchors: usize,
        above_threshold: usize,
        kept: usize,
    },
    /// Summary of the suppression step.
    Suppressed { before: usize, after: usize },
}

pub trait DiagnosticSink {
    fn record(&mut self, event: DecodeEvent);
}

impl DiagnosticSink for () {
    fn record(&mut self, _event: DecodeEvent) {}
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn record(&mut self, event: DecodeEvent) {
        (**self).record(event)
    }
}

/// Forwards events to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&mut self, event: DecodeEvent) {
        match event {
            DecodeEvent::LevelSkipped { stride, error } => {
                log::warn!("skipping level with stride {}: {}", stride, error)
            }
            DecodeEvent::KeypointsDropped { stride, error } => {
                log::warn!("ignoring keypoints at stride {}: {}", stride, error)
            }
            DecodeEvent::CandidateRejected {
                stride,
                anchor,
                confidence,
                width,
                height,
                reason,
            } => log::trace!(
                "stride {} anchor {}: dropped {:.1}x{:.1} box (score {:.3}): {}",
                stride,
                anchor,
                width,
                height,
                confidence,
                reason
            ),
            DecodeEvent::LevelDecoded {
                stride,
                anchors,
                above_threshold,
                kept,
            } => log::debug!(
                "stride {}: {} anchors, {} above threshold, {} kept",
                stride,
                anchors,
                above_threshold,
                kept
            ),
            DecodeEvent::Suppressed { before, after } => {
                log::debug!("nms: {} -> {} detections", before, after)
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub events: Vec<DecodeEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipped_levels(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DecodeEvent::LevelSkipped { stride, .. } => Some(*stride),
                _ => None,
            })
            .collect()
    }

    pub fn rejections(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DecodeEvent::CandidateRejected { .. }))
            .count()
    }
}

impl DiagnosticSink for CollectingSink {
    fn record(&mut self, event: DecodeEvent) {
        self.events.push(event);
    }
}
