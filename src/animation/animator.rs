//! Runtime animation playback for one skin

use std::sync::Arc;

use glam::Mat4;

use super::clip::AnimationClip;
use super::gpu_animation::JointLimit;
use super::interpolate::wrap_time;
use super::sampler::{BoneTransformSampler, LoopMode, SampleScratch};
use super::scene::SkinnedScene;
use crate::core::{AnimationConfig, Result};

/// Playback state of the active clip
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationState {
    pub clip_index: usize,
    pub time: f32,
    pub speed: f32,
    pub playing: bool,
}

impl AnimationState {
    /// Create a new animation state for the given clip
    pub fn new(clip_index: usize) -> Self {
        Self {
            clip_index,
            time: 0.0,
            speed: 1.0,
            playing: false,
        }
    }

    /// Start playing the animation
    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Pause the animation (keeps current time)
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Stop the animation (reset to beginning)
    pub fn stop(&mut self) {
        self.playing = false;
        self.time = 0.0;
    }

    /// Set the playback speed multiplier
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }
}

/// Drives one skin of a shared scene through its clips
///
/// Each `update` samples the active clip once and keeps the resulting
/// skinning matrices until the next tick.
#[derive(Clone, Debug)]
pub struct Animator {
    scene: Arc<SkinnedScene>,
    skin_index: usize,
    looping: bool,
    default_speed: f32,
    state: Option<AnimationState>,
    scratch: SampleScratch,
    skinning_matrices: Vec<Mat4>,
}

impl Animator {
    /// Create an animator showing the skin's bind pose
    pub fn new(scene: Arc<SkinnedScene>, skin_index: usize, config: &AnimationConfig) -> Result<Self> {
        let skin = scene.skin(skin_index)?;
        config.joint_limit().check(skin.joint_count())?;
        let skinning_matrices = scene.rest_pose_skinning(skin);

        Ok(Self {
            scene,
            skin_index,
            looping: config.looping,
            default_speed: config.playback_speed,
            state: None,
            scratch: SampleScratch::new(),
            skinning_matrices,
        })
    }

    /// Also enforce a backend limit, e.g. from [`JointLimit::from_wgpu_limits`]
    pub fn with_joint_limit(self, limit: JointLimit) -> Result<Self> {
        limit.check(self.skinning_matrices.len())?;
        Ok(self)
    }

    /// Start playing a clip by name from the beginning
    pub fn play(&mut self, clip: &str) -> Result<()> {
        let clip_index = self.scene.clip_index(clip)?;
        self.play_index(clip_index)
    }

    /// Start playing a clip by index from the beginning
    pub fn play_index(&mut self, clip_index: usize) -> Result<()> {
        let clip = self.scene.clip(clip_index)?;
        log::info!("Playing clip '{}' ({:.2}s)", clip.name, clip.duration());

        let mut state = AnimationState::new(clip_index);
        state.set_speed(self.default_speed);
        state.play();
        self.state = Some(state);
        Ok(())
    }

    /// Pause the active clip (keeps current time)
    pub fn pause(&mut self) {
        if let Some(state) = &mut self.state {
            state.pause();
        }
    }

    /// Resume a paused clip
    pub fn resume(&mut self) {
        if let Some(state) = &mut self.state {
            state.play();
        }
    }

    /// Stop playback and return to the bind pose
    pub fn stop(&mut self) {
        self.state = None;
        if let Ok(skin) = self.scene.skin(self.skin_index) {
            self.skinning_matrices = self.scene.rest_pose_skinning(skin);
        }
    }

    /// Set the speed multiplier of the active clip
    pub fn set_speed(&mut self, speed: f32) {
        if let Some(state) = &mut self.state {
            state.set_speed(speed);
        }
    }

    /// Advance the active clip by `delta_time` seconds and resample
    pub fn update(&mut self, delta_time: f32) {
        let Some(state) = &mut self.state else {
            return;
        };

        let sampler = match BoneTransformSampler::new(&self.scene, self.skin_index, state.clip_index) {
            Ok(sampler) => sampler,
            Err(e) => {
                log::warn!("Animator cannot sample clip {}: {}", state.clip_index, e);
                return;
            }
        };
        let duration = sampler.duration();

        if state.playing {
            state.time += delta_time * state.speed;

            if self.looping {
                state.time = wrap_time(state.time, duration);
            } else if state.time >= duration {
                // Non-looping clip finished; hold the last pose
                state.time = duration;
                state.playing = false;
                log::debug!("Clip '{}' finished", sampler.clip().name);
            }
        }

        let loop_mode = if self.looping { LoopMode::Wrap } else { LoopMode::Clamp };
        sampler
            .with_loop_mode(loop_mode)
            .sample_with_scratch(state.time, &mut self.scratch, &mut self.skinning_matrices);
    }

    /// The active clip, if any
    pub fn current_clip(&self) -> Option<&AnimationClip> {
        let state = self.state.as_ref()?;
        self.scene.clip(state.clip_index).ok()
    }

    pub fn state(&self) -> Option<&AnimationState> {
        self.state.as_ref()
    }

    /// Playback time of the active clip
    pub fn time(&self) -> Option<f32> {
        self.state.as_ref().map(|s| s.time)
    }

    pub fn is_playing(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.playing)
    }

    /// Get the current skinning matrices, one per joint
    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.skinning_matrices
    }

    pub fn scene(&self) -> &SkinnedScene {
        &self.scene
    }

    pub fn joint_count(&self) -> usize {
        self.skinning_matrices.len()
    }
}
