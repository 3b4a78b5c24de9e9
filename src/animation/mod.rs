//! Skeletal animation sampling and skinning

pub mod interpolate;
pub mod clip;
pub mod skin;
pub mod scene;
pub mod sampler;
pub mod animator;
pub mod gpu_animation;

pub use clip::{AnimationClip, AnimationSampler, Channel, Interpolation, KeyframeValues, Property};
pub use skin::Skin;
pub use scene::{Node, NodeTransform, SceneDescription, SkinnedScene};
pub use sampler::{
    sample, sample_batch, BoneTransformSampler, BoneTransforms, LoopMode, SampleRequest, SampleScratch,
};
pub use animator::{AnimationState, Animator};
pub use gpu_animation::{GpuJointMatrix, JointBuffer, JointLimit, JointPalette};
