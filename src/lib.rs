//! Rkanim - keyframe sampling and skinning matrices for skeletal animation

pub mod core;
pub mod animation;
