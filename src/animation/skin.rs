//! Skins: ordered joint lists with their inverse bind matrices

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Joints of a skinned mesh, in the order the vertex shader indexes them
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    #[serde(default)]
    pub name: String,
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

impl Skin {
    /// Create a skin from joint node indices and matching inverse bind matrices
    pub fn new(joints: Vec<usize>, inverse_bind_matrices: Vec<Mat4>) -> Self {
        Self {
            name: String::new(),
            joints,
            inverse_bind_matrices,
        }
    }

    /// Create a skin whose joints are bound at the scene origin
    pub fn with_identity_bind(joints: Vec<usize>) -> Self {
        let inverse_bind_matrices = vec![Mat4::IDENTITY; joints.len()];
        Self::new(joints, inverse_bind_matrices)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Position of `node` in the joint list
    pub fn joint_index(&self, node: usize) -> Option<usize> {
        self.joints.iter().position(|&j| j == node)
    }

    /// Check joint indices and the joint/matrix pairing
    pub fn validate(&self, node_count: usize) -> Result<()> {
        if self.inverse_bind_matrices.len() != self.joints.len() {
            return Err(Error::LengthMismatch {
                kind: "inverse bind matrices",
                expected: self.joints.len(),
                found: self.inverse_bind_matrices.len(),
            });
        }

        if let Some(&joint) = self.joints.iter().find(|&&j| j >= node_count) {
            return Err(Error::index("skin joint", joint, node_count));
        }

        Ok(())
    }

    /// Combine per-node global transforms with the inverse bind matrices
    pub fn skinning_matrices_into(&self, globals: &[Mat4], out: &mut Vec<Mat4>) {
        out.clear();
        out.extend(
            self.joints
                .iter()
                .zip(self.inverse_bind_matrices.iter())
                .map(|(&joint, inverse_bind)| globals[joint] * *inverse_bind),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_identity_bind() {
        let skin = Skin::with_identity_bind(vec![2, 0]).named("body");
        assert_eq!(skin.name, "body");
        assert_eq!(skin.joint_count(), 2);
        assert_eq!(skin.inverse_bind_matrices, vec![Mat4::IDENTITY; 2]);
        assert_eq!(skin.joint_index(0), Some(1));
        assert_eq!(skin.joint_index(5), None);
    }

    #[test]
    fn test_validate_mismatch() {
        let skin = Skin::new(vec![0, 1], vec![Mat4::IDENTITY]);
        assert!(matches!(
            skin.validate(2),
            Err(Error::LengthMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_validate_joint_range() {
        let skin = Skin::with_identity_bind(vec![0, 12]);
        assert!(matches!(
            skin.validate(10),
            Err(Error::InvalidIndexRange { index: 12, len: 10, .. })
        ));
        assert!(Skin::with_identity_bind(vec![0, 9]).validate(10).is_ok());
    }

    #[test]
    fn test_skinning_matrices_follow_joint_order() {
        let globals = vec![
            Mat4::from_translation(Vec3::X),
            Mat4::from_translation(Vec3::Y),
        ];
        let skin = Skin::new(
            vec![1, 0],
            vec![Mat4::from_translation(-Vec3::Y), Mat4::IDENTITY],
        );

        let mut out = Vec::new();
        skin.skinning_matrices_into(&globals, &mut out);

        assert_eq!(out.len(), 2);
        assert!(out[0].abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert!(out[1].abs_diff_eq(Mat4::from_translation(Vec3::X), 1e-6));
    }
}
