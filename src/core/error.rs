//! Error types for skinning and animation sampling

use thiserror::Error;

use crate::animation::clip::Property;

/// Main error type for the crate
///
/// Every variant except `Io` and `Json` is raised while validating a scene or
/// preparing a sampler, never in the middle of matrix evaluation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("scene has no skin with joints")]
    MissingSkin,

    #[error("animation clip not found: {0}")]
    MissingAnimation(String),

    #[error("{kind} index {index} out of range (len {len})")]
    InvalidIndexRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("skin has {joints} joints but the joint limit is {limit}")]
    TooManyJoints { joints: usize, limit: usize },

    #[error("sampler {sampler} of clip '{clip}' has no keyframes")]
    EmptySampler { clip: String, sampler: usize },

    #[error("{kind} length mismatch: expected {expected}, found {found}")]
    LengthMismatch {
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("sampler {sampler} of clip '{clip}' has unordered or non-finite time at keyframe {keyframe}")]
    UnsortedKeyframes {
        clip: String,
        sampler: usize,
        keyframe: usize,
    },

    #[error("channel {channel} of clip '{clip}' targets {property} but its sampler outputs {found}")]
    PropertyMismatch {
        clip: String,
        channel: usize,
        property: Property,
        found: &'static str,
    },

    #[error("{context} {index} has a non-unit or non-finite rotation")]
    NonUnitRotation { context: String, index: usize },

    #[error("node hierarchy contains a cycle through node {0}")]
    CyclicHierarchy(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn index(kind: &'static str, index: usize, len: usize) -> Self {
        Self::InvalidIndexRange { kind, index, len }
    }
}
