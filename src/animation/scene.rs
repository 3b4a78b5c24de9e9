//! Skinned scene description and load-time validation
//!
//! An asset loader produces a [`SceneDescription`]: plain node, skin and clip
//! arrays that reference each other by index. [`SkinnedScene::from_description`]
//! checks every index once so per-frame sampling never has to.

use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::clip::AnimationClip;
use super::interpolate::is_unit_rotation;
use super::skin::Skin;
use crate::core::{Error, Result};

/// Translation, rotation and scale of a node relative to its parent
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl NodeTransform {
    /// Identity transform (no translation, rotation, or scaling).
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a translation-only transform.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Create a rotation-only transform.
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    /// Compose as T * R * S.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A single node in the scene
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<usize>,
    /// Rest pose, used for any property no channel animates
    #[serde(default)]
    pub rest: NodeTransform,
}

impl Node {
    /// Create a root node at the identity rest pose
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            rest: NodeTransform::identity(),
        }
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_rest(mut self, rest: NodeTransform) -> Self {
        self.rest = rest;
        self
    }
}

/// Unvalidated scene as produced by an asset loader
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub skins: Vec<Skin>,
    #[serde(default)]
    pub clips: Vec<AnimationClip>,
}

impl SceneDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its index
    pub fn add_node(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Add a skin, returning its index
    pub fn add_skin(&mut self, skin: Skin) -> usize {
        self.skins.push(skin);
        self.skins.len() - 1
    }

    /// Add a clip, returning its index
    pub fn add_clip(&mut self, clip: AnimationClip) -> usize {
        self.clips.push(clip);
        self.clips.len() - 1
    }

    /// Parse from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file (sync)
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
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

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnPath,
    Done,
}

/// Order nodes so every parent precedes its children
fn parents_first_order(nodes: &[Node]) -> Result<Vec<usize>> {
    let mut visit = vec![Visit::New; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    let mut path = Vec::new();

    for start in 0..nodes.len() {
        let mut current = Some(start);
        while let Some(index) = current {
            match visit[index] {
                Visit::Done => break,
                Visit::OnPath => return Err(Error::CyclicHierarchy(index)),
                Visit::New => {
                    visit[index] = Visit::OnPath;
                    path.push(index);
                    current = nodes[index].parent;
                }
            }
        }

        // Path runs child -> ancestor, so popping emits ancestors first
        while let Some(index) = path.pop() {
            visit[index] = Visit::Done;
            order.push(index);
        }
    }

    Ok(order)
}

/// Validated, immutable scene ready for sampling
#[derive(Clone, Debug)]
pub struct SkinnedScene {
    nodes: Vec<Node>,
    skins: Vec<Skin>,
    clips: Vec<AnimationClip>,
    order: Vec<usize>,
}

impl SkinnedScene {
    /// Validate every cross-reference in `desc`
    pub fn from_description(desc: SceneDescription) -> Result<Self> {
        let SceneDescription { nodes, skins, clips } = desc;
        let node_count = nodes.len();

        for (index, node) in nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                if parent >= node_count {
                    return Err(Error::index("parent node", parent, node_count));
                }
            }
            if !is_unit_rotation(node.rest.rotation) {
                return Err(Error::NonUnitRotation {
                    context: "rest pose of node".to_string(),
                    index,
                });
            }
        }
        let order = parents_first_order(&nodes)?;

        for skin in &skins {
            skin.validate(node_count)?;
        }
        for clip in &clips {
            clip.validate(node_count)?;
        }

        log::debug!(
            "Validated scene: {} nodes, {} skins, {} clips",
            node_count,
            skins.len(),
            clips.len()
        );

        Ok(Self {
            nodes,
            skins,
            clips,
            order,
        })
    }

    /// Load and validate a JSON scene description
    pub fn load_sync(path: &Path) -> Result<Self> {
        let scene = Self::from_description(SceneDescription::load_sync(path)?)?;
        log::info!(
            "Loaded scene {} ({} nodes, {} clips)",
            path.display(),
            scene.nodes.len(),
            scene.clips.len()
        );
        Ok(scene)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn skins(&self) -> &[Skin] {
        &self.skins
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    /// Node indices with parents ahead of children
    pub fn traversal_order(&self) -> &[usize] {
        &self.order
    }

    /// Skin by index; `MissingSkin` when the scene has none or it has no joints
    pub fn skin(&self, index: usize) -> Result<&Skin> {
        if self.skins.is_empty() {
            return Err(Error::MissingSkin);
        }
        let skin = self
            .skins
            .get(index)
            .ok_or_else(|| Error::index("skin", index, self.skins.len()))?;
        if skin.joints.is_empty() {
            return Err(Error::MissingSkin);
        }
        Ok(skin)
    }

    /// Clip by index
    pub fn clip(&self, index: usize) -> Result<&AnimationClip> {
        self.clips
            .get(index)
            .ok_or_else(|| Error::MissingAnimation(format!("#{}", index)))
    }

    /// Find a clip index by name
    pub fn find_clip(&self, name: &str) -> Option<usize> {
        self.clips.iter().position(|c| c.name == name)
    }

    /// Clip index by name, failing with `MissingAnimation`
    pub fn clip_index(&self, name: &str) -> Result<usize> {
        self.find_clip(name)
            .ok_or_else(|| Error::MissingAnimation(name.to_string()))
    }

    /// Rest-pose local transform of every node
    pub fn rest_local_transforms(&self) -> Vec<Mat4> {
        self.nodes.iter().map(|n| n.rest.to_matrix()).collect()
    }

    /// Compose local transforms into global transforms, parents first
    pub fn global_transforms_into(&self, locals: &[Mat4], globals: &mut Vec<Mat4>) {
        debug_assert_eq!(locals.len(), self.nodes.len());

        globals.clear();
        globals.resize(self.nodes.len(), Mat4::IDENTITY);

        for &index in &self.order {
            globals[index] = match self.nodes[index].parent {
                Some(parent) => globals[parent] * locals[index],
                None => locals[index],
            };
        }
    }

    /// Global transforms for the given local transforms
    pub fn global_transforms(&self, locals: &[Mat4]) -> Vec<Mat4> {
        let mut globals = Vec::with_capacity(locals.len());
        self.global_transforms_into(locals, &mut globals);
        globals
    }

    /// Skinning matrices for the skin's rest (bind) pose
    pub fn rest_pose_skinning(&self, skin: &Skin) -> Vec<Mat4> {
        let globals = self.global_transforms(&self.rest_local_transforms());
        let mut out = Vec::with_capacity(skin.joint_count());
        skin.skinning_matrices_into(&globals, &mut out);
        out
    }

    /// Build a skin over `joints` bound at the current rest pose
    ///
    /// Inverse bind matrices are the inverse rest-pose global transforms, so
    /// sampling the rest pose yields identity skinning matrices.
    pub fn bind_rest_pose(&self, joints: Vec<usize>) -> Result<Skin> {
        let node_count = self.nodes.len();
        if let Some(&joint) = joints.iter().find(|&&j| j >= node_count) {
            return Err(Error::index("skin joint", joint, node_count));
        }

        let globals = self.global_transforms(&self.rest_local_transforms());
        let inverse_bind_matrices = joints.iter().map(|&j| globals[j].inverse()).collect();
        Ok(Skin::new(joints, inverse_bind_matrices))
    }
}
