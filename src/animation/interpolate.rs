//! Keyframe interval search and interpolation primitives

use glam::{Quat, Vec3};

/// Pair of keyframes bracketing a sample time plus the blend factor between them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyframeSpan {
    pub index: usize,
    pub next: usize,
    pub alpha: f32,
}

impl KeyframeSpan {
    fn at(index: usize) -> Self {
        Self {
            index,
            next: index,
            alpha: 0.0,
        }
    }
}

/// Locate the keyframe interval containing `time`.
///
/// Picks the smallest `i` with `times[i] <= time <= times[i + 1]`. Times before
/// the first keyframe or after the last clamp to that boundary keyframe.
/// `times` must be non-empty and non-decreasing.
pub fn find_span(times: &[f32], time: f32) -> KeyframeSpan {
    let last = times.len() - 1;

    // Negated comparison so NaN also lands on the first keyframe
    if !(time > times[0]) {
        return KeyframeSpan::at(0);
    }
    if time > times[last] {
        return KeyframeSpan::at(last);
    }

    // First keyframe at or after `time`; always >= 1 here
    let next = times.partition_point(|&k| k < time);
    let index = next - 1;

    KeyframeSpan {
        index,
        next,
        alpha: interpolation_factor(times[index], times[next], time),
    }
}

/// Normalized position of `time` between `start` and `end`, 0 for a zero-length interval.
pub fn interpolation_factor(start: f32, end: f32, time: f32) -> f32 {
    let duration = end - start;
    if duration > 0.0 {
        ((time - start) / duration).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Component-wise lerp that returns the endpoints bit-exactly at 0 and 1.
pub fn lerp_vec3(a: Vec3, b: Vec3, alpha: f32) -> Vec3 {
    if alpha <= 0.0 {
        a
    } else if alpha >= 1.0 {
        b
    } else {
        a.lerp(b, alpha)
    }
}

/// Spherical interpolation along the shortest arc.
///
/// `glam::Quat::slerp` negates `b` when the quaternions lie in opposite
/// hemispheres, so the rotation never takes the long way around.
/// Inputs must be unit quaternions; see [`is_unit_rotation`].
pub fn slerp_shortest(a: Quat, b: Quat, alpha: f32) -> Quat {
    if alpha <= 0.0 {
        return a;
    }
    if alpha >= 1.0 {
        return b;
    }

    a.slerp(b, alpha).normalize()
}

/// Finite and unit length within glam's normalization tolerance.
pub fn is_unit_rotation(q: Quat) -> bool {
    q.is_finite() && q.is_normalized()
}

/// Wrap `time` into `[0, duration)`; a non-positive duration maps everything to 0.
pub fn wrap_time(time: f32, duration: f32) -> f32 {
    if duration > 0.0 {
        time.rem_euclid(duration)
    } else {
        0.0
    }
}

/// Clamp `time` into `[0, duration]`.
pub fn clamp_time(time: f32, duration: f32) -> f32 {
    if duration > 0.0 {
        time.clamp(0.0, duration)
    } else {
        0.0
    }
}
