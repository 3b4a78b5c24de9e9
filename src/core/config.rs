//! Animation playback configuration
//!
//! Stored as JSON next to the scene it drives. Missing fields fall back to
//! [`AnimationConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::animation::gpu_animation::JointLimit;
use crate::core::Result;

/// Configuration for animation sampling and playback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Maximum joints the renderer accepts per skin (None = no limit)
    pub max_joints: Option<usize>,
    /// Playback speed multiplier applied to newly played clips
    pub playback_speed: f32,
    /// Wrap clip time at the clip duration instead of holding the last pose
    pub looping: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            max_joints: None,
            playback_speed: 1.0,
            looping: true,
        }
    }
}

impl AnimationConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Joint limit implied by `max_joints`.
    pub fn joint_limit(&self) -> JointLimit {
        self.max_joints
            .map(JointLimit::new)
            .unwrap_or(JointLimit::UNLIMITED)
    }

    /// Load from a JSON file (sync)
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        log::debug!("Loaded animation config from {}", path.display());
        Ok(config)
    }

    /// Save to a JSON file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }
}
