//! Animation clips, channels and keyframe samplers

use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::interpolate::{find_span, is_unit_rotation, lerp_vec3, slerp_shortest};
use super::scene::NodeTransform;
use crate::core::{Error, Result};

/// Node transform property driven by a channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    Translation,
    Rotation,
    Scale,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Translation => f.write_str("translation"),
            Property::Rotation => f.write_str("rotation"),
            Property::Scale => f.write_str("scale"),
        }
    }
}

/// How values between two keyframes are produced
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Lerp for vectors, shortest-path slerp for rotations
    #[default]
    Linear,
    /// Hold the earlier keyframe until the next one is reached
    Step,
}

/// Keyframe output values, one per keyframe time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyframeValues {
    Vec3(Vec<Vec3>),
    Quat(Vec<Quat>),
}

impl KeyframeValues {
    pub fn len(&self) -> usize {
        match self {
            KeyframeValues::Vec3(v) => v.len(),
            KeyframeValues::Quat(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the value type, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            KeyframeValues::Vec3(_) => "vec3",
            KeyframeValues::Quat(_) => "quat",
        }
    }

    /// Whether these values can drive the given property
    pub fn drives(&self, property: Property) -> bool {
        matches!(
            (self, property),
            (KeyframeValues::Vec3(_), Property::Translation | Property::Scale)
                | (KeyframeValues::Quat(_), Property::Rotation)
        )
    }
}

/// Keyframe times with their output values
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationSampler {
    pub times: Vec<f32>,
    pub values: KeyframeValues,
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl AnimationSampler {
    /// Create a sampler producing vectors (translation or scale)
    pub fn vec3(times: Vec<f32>, values: Vec<Vec3>) -> Self {
        Self {
            times,
            values: KeyframeValues::Vec3(values),
            interpolation: Interpolation::Linear,
        }
    }

    /// Create a sampler producing rotations
    pub fn rotation(times: Vec<f32>, values: Vec<Quat>) -> Self {
        Self {
            times,
            values: KeyframeValues::Quat(values),
            interpolation: Interpolation::Linear,
        }
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Time of the last keyframe
    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Check keyframe count, ordering and value count
    pub fn validate(&self, clip: &str, sampler: usize) -> Result<()> {
        if self.times.is_empty() {
            return Err(Error::EmptySampler {
                clip: clip.to_string(),
                sampler,
            });
        }

        if self.values.len() != self.times.len() {
            return Err(Error::LengthMismatch {
                kind: "keyframe values",
                expected: self.times.len(),
                found: self.values.len(),
            });
        }

        if let Some(keyframe) = self.times.iter().position(|t| !t.is_finite()) {
            return Err(Error::UnsortedKeyframes {
                clip: clip.to_string(),
                sampler,
                keyframe,
            });
        }

        if let Some(pos) = self.times.windows(2).position(|w| w[1] < w[0]) {
            return Err(Error::UnsortedKeyframes {
                clip: clip.to_string(),
                sampler,
                keyframe: pos + 1,
            });
        }

        if let KeyframeValues::Quat(rotations) = &self.values {
            if let Some(index) = rotations.iter().position(|q| !is_unit_rotation(*q)) {
                return Err(Error::NonUnitRotation {
                    context: format!("clip '{}' sampler {} keyframe", clip, sampler),
                    index,
                });
            }
        }

        Ok(())
    }

    /// Sample a vector-valued sampler; None if this sampler holds rotations
    pub fn sample_vec3(&self, time: f32) -> Option<Vec3> {
        let KeyframeValues::Vec3(values) = &self.values else {
            return None;
        };
        let span = find_span(&self.times, time);
        let alpha = self.effective_alpha(span.alpha);
        Some(lerp_vec3(values[span.index], values[span.next], alpha))
    }

    /// Sample a rotation sampler; None if this sampler holds vectors
    pub fn sample_rotation(&self, time: f32) -> Option<Quat> {
        let KeyframeValues::Quat(values) = &self.values else {
            return None;
        };
        let span = find_span(&self.times, time);
        let alpha = self.effective_alpha(span.alpha);
        Some(slerp_shortest(values[span.index], values[span.next], alpha))
    }

    /// Overwrite one property of `pose` with this sampler's value at `time`
    pub fn apply(&self, property: Property, time: f32, pose: &mut NodeTransform) {
        match property {
            Property::Translation => {
                if let Some(v) = self.sample_vec3(time) {
                    pose.translation = v;
                }
            }
            Property::Rotation => {
                if let Some(q) = self.sample_rotation(time) {
                    pose.rotation = q;
                }
            }
            Property::Scale => {
                if let Some(v) = self.sample_vec3(time) {
                    pose.scale = v;
                }
            }
        }
    }

    fn effective_alpha(&self, alpha: f32) -> f32 {
        match self.interpolation {
            Interpolation::Linear => alpha,
            Interpolation::Step => {
                if alpha >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Binds one sampler to one property of one node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub node: usize,
    pub property: Property,
    pub sampler: usize,
}

/// A named set of channels sharing one timeline
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub samplers: Vec<AnimationSampler>,
}

impl AnimationClip {
    /// Create a new empty animation clip
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
            samplers: Vec::new(),
        }
    }

    /// Add a sampler, returning its index
    pub fn add_sampler(&mut self, sampler: AnimationSampler) -> usize {
        self.samplers.push(sampler);
        self.samplers.len() - 1
    }

    /// Add a channel reading from an existing sampler
    pub fn add_channel(&mut self, node: usize, property: Property, sampler: usize) {
        self.channels.push(Channel {
            node,
            property,
            sampler,
        });
    }

    /// Add a sampler together with the channel that drives `node`
    pub fn animate(mut self, node: usize, property: Property, sampler: AnimationSampler) -> Self {
        let index = self.add_sampler(sampler);
        self.add_channel(node, property, index);
        self
    }

    /// Clip length: the latest final keyframe over all samplers
    pub fn duration(&self) -> f32 {
        self.samplers
            .iter()
            .map(|s| s.duration())
            .fold(0.0f32, |a, b| a.max(b))
    }

    /// Channels targeting a given node
    pub fn channels_for(&self, node: usize) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(move |c| c.node == node)
    }

    /// Validate samplers and channel indices against a scene with `node_count` nodes
    pub fn validate(&self, node_count: usize) -> Result<()> {
        for (index, sampler) in self.samplers.iter().enumerate() {
            sampler.validate(&self.name, index)?;
        }

        for (index, channel) in self.channels.iter().enumerate() {
            if channel.node >= node_count {
                return Err(Error::index("channel target node", channel.node, node_count));
            }
            let sampler = self
                .samplers
                .get(channel.sampler)
                .ok_or_else(|| Error::index("channel sampler", channel.sampler, self.samplers.len()))?;
            if !sampler.values.drives(channel.property) {
                return Err(Error::PropertyMismatch {
                    clip: self.name.clone(),
                    channel: index,
                    property: channel.property,
                    found: sampler.values.kind(),
                });
            }
        }

        Ok(())
    }
}
