//! Skinning matrix evaluation for one skin and one animation clip
//!
//! [`BoneTransformSampler`] is a pure function of `(skin, clip, time)`. Every
//! index it touches was checked when the [`SkinnedScene`] was built, so
//! sampling itself cannot fail.

use glam::Mat4;
use rayon::prelude::*;

use super::clip::AnimationClip;
use super::gpu_animation::JointLimit;
use super::interpolate::{clamp_time, wrap_time};
use super::scene::{NodeTransform, SceneDescription, SkinnedScene};
use super::skin::Skin;
use crate::core::Result;

/// How query times past the clip duration are mapped onto the clip
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    /// `time mod duration`
    #[default]
    Wrap,
    /// Hold the pose at the end of the clip
    Clamp,
}

/// Local transform matrix of every scene node for one sample time
#[derive(Clone, Debug, PartialEq)]
pub struct BoneTransforms {
    locals: Vec<Mat4>,
}

impl BoneTransforms {
    /// Local transform of `node`
    pub fn get(&self, node: usize) -> Option<Mat4> {
        self.locals.get(node).copied()
    }

    pub fn as_slice(&self) -> &[Mat4] {
        &self.locals
    }

    pub fn len(&self) -> usize {
        self.locals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    pub fn into_inner(self) -> Vec<Mat4> {
        self.locals
    }
}

/// Per-node buffers reused across sample calls
///
/// Keep one per animated character so per-frame sampling only writes into
/// memory it already owns.
#[derive(Clone, Debug, Default)]
pub struct SampleScratch {
    poses: Vec<NodeTransform>,
    locals: Vec<Mat4>,
    globals: Vec<Mat4>,
}

impl SampleScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Evaluates one clip on one skin
#[derive(Clone, Debug)]
pub struct BoneTransformSampler<'a> {
    scene: &'a SkinnedScene,
    skin: &'a Skin,
    clip: &'a AnimationClip,
    duration: f32,
    loop_mode: LoopMode,
}

impl<'a> BoneTransformSampler<'a> {
    /// Bind a skin and clip of `scene`
    ///
    /// Fails with `MissingSkin` if the skin does not exist or has no joints,
    /// and with `MissingAnimation` if the clip does not exist.
    pub fn new(scene: &'a SkinnedScene, skin_index: usize, clip_index: usize) -> Result<Self> {
        let skin = scene.skin(skin_index)?;
        let clip = scene.clip(clip_index)?;

        Ok(Self {
            scene,
            skin,
            clip,
            duration: clip.duration(),
            loop_mode: LoopMode::Wrap,
        })
    }

    /// Bind a skin and a clip looked up by name
    pub fn by_name(scene: &'a SkinnedScene, skin_index: usize, clip: &str) -> Result<Self> {
        let clip_index = scene.clip_index(clip)?;
        Self::new(scene, skin_index, clip_index)
    }

    /// Reject skins with more joints than the renderer can take
    pub fn with_joint_limit(self, limit: JointLimit) -> Result<Self> {
        limit.check(self.skin.joint_count())?;
        Ok(self)
    }

    pub fn with_loop_mode(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    pub fn skin(&self) -> &Skin {
        self.skin
    }

    pub fn clip(&self) -> &AnimationClip {
        self.clip
    }

    /// Clip duration (latest keyframe time of any sampler)
    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn joint_count(&self) -> usize {
        self.skin.joint_count()
    }

    /// Map a query time onto the clip timeline
    pub fn clip_time(&self, time: f32) -> f32 {
        match self.loop_mode {
            LoopMode::Wrap => wrap_time(time, self.duration),
            LoopMode::Clamp => clamp_time(time, self.duration),
        }
    }

    /// Per-node local transforms at `time`
    ///
    /// Nodes or properties without a channel keep their rest-pose values.
    pub fn bone_transforms(&self, time: f32) -> BoneTransforms {
        let mut scratch = SampleScratch::new();
        self.fill_locals(time, &mut scratch);
        BoneTransforms {
            locals: scratch.locals,
        }
    }

    fn fill_locals(&self, time: f32, scratch: &mut SampleScratch) {
        let t = self.clip_time(time);

        scratch.poses.clear();
        scratch.poses.extend(self.scene.nodes().iter().map(|n| n.rest));
        for channel in &self.clip.channels {
            self.clip.samplers[channel.sampler].apply(channel.property, t, &mut scratch.poses[channel.node]);
        }

        scratch.locals.clear();
        scratch.locals.extend(scratch.poses.iter().map(NodeTransform::to_matrix));
    }

    /// Final skinning matrices, one per joint, in joint order
    pub fn sample(&self, time: f32) -> Vec<Mat4> {
        let mut out = Vec::with_capacity(self.skin.joint_count());
        self.sample_into(time, &mut out);
        out
    }

    /// Like [`sample`](Self::sample) but writes into the caller's buffer
    ///
    /// Per-node intermediates are still allocated on each call; use
    /// [`sample_with_scratch`](Self::sample_with_scratch) in a frame loop.
    pub fn sample_into(&self, time: f32, out: &mut Vec<Mat4>) {
        self.sample_with_scratch(time, &mut SampleScratch::new(), out);
    }

    /// Sample without allocating once `scratch` and `out` have grown to size
    pub fn sample_with_scratch(&self, time: f32, scratch: &mut SampleScratch, out: &mut Vec<Mat4>) {
        self.fill_locals(time, scratch);
        self.scene.global_transforms_into(&scratch.locals, &mut scratch.globals);
        self.skin.skinning_matrices_into(&scratch.globals, out);

        log::trace!(
            "Sampled '{}' at {:.3}s ({} joints)",
            self.clip.name,
            time,
            out.len()
        );
    }
}

/// Validate `desc` and sample one clip by name
///
/// Convenience for one-off queries; per-frame callers should build a
/// [`SkinnedScene`] once and keep a [`BoneTransformSampler`].
pub fn sample(desc: &SceneDescription, skin_index: usize, clip: &str, time: f32) -> Result<Vec<Mat4>> {
    let scene = SkinnedScene::from_description(desc.clone())?;
    let sampler = BoneTransformSampler::by_name(&scene, skin_index, clip)?;
    Ok(sampler.sample(time))
}

/// One character's sampling job
#[derive(Clone, Copy, Debug)]
pub struct SampleRequest<'a> {
    pub scene: &'a SkinnedScene,
    pub skin: usize,
    pub clip: usize,
    pub time: f32,
    pub limit: JointLimit,
}

impl<'a> SampleRequest<'a> {
    pub fn new(scene: &'a SkinnedScene, skin: usize, clip: usize, time: f32) -> Self {
        Self {
            scene,
            skin,
            clip,
            time,
            limit: JointLimit::UNLIMITED,
        }
    }

    fn run(&self) -> Result<Vec<Mat4>> {
        let sampler =
            BoneTransformSampler::new(self.scene, self.skin, self.clip)?.with_joint_limit(self.limit)?;
        Ok(sampler.sample(self.time))
    }
}

/// Sample independent requests in parallel; results keep request order
pub fn sample_batch(requests: &[SampleRequest<'_>]) -> Vec<Result<Vec<Mat4>>> {
    requests.par_iter().map(|request| request.run()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::{AnimationSampler, Interpolation, Property};
    use crate::animation::scene::Node;
    use crate::core::Error;
    use glam::{Quat, Vec3};
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    /// One joint with a rest translation and scale, rotated 90 degrees about Z over one second
    fn single_joint_scene() -> SkinnedScene {
        let mut desc = SceneDescription::new();
        desc.add_node(Node::new("joint").with_rest(NodeTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        }));
        desc.add_skin(Skin::with_identity_bind(vec![0]));
        desc.add_clip(AnimationClip::new("turn").animate(
            0,
            Property::Rotation,
            AnimationSampler::rotation(
                vec![0.0, 1.0],
                vec![Quat::IDENTITY, Quat::from_rotation_z(FRAC_PI_2)],
            ),
        ));
        SkinnedScene::from_description(desc).unwrap()
    }

    /// Root slides along X over two seconds, child raises along Y
    fn two_joint_scene() -> SkinnedScene {
        let mut desc = SceneDescription::new();
        let root = desc.add_node(Node::new("root"));
        let child = desc.add_node(
            Node::new("child")
                .with_parent(root)
                .with_rest(NodeTransform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
        );
        let clip = AnimationClip::new("slide")
            .animate(
                root,
                Property::Translation,
                AnimationSampler::vec3(vec![0.0, 2.0], vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]),
            )
            .animate(
                child,
                Property::Translation,
                AnimationSampler::vec3(
                    vec![0.5, 1.5],
                    vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 3.0, 0.0)],
                ),
            );
        desc.add_clip(clip);

        let scene = SkinnedScene::from_description(desc.clone()).unwrap();
        let skin = scene.bind_rest_pose(vec![root, child]).unwrap();
        desc.add_skin(skin);
        SkinnedScene::from_description(desc).unwrap()
    }

    fn approx_eq(a: &[Mat4], b: &[Mat4]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.abs_diff_eq(*y, 1e-5))
    }

    #[test]
    fn test_half_way_rotation() {
        let scene = single_joint_scene();
        let sampler = BoneTransformSampler::new(&scene, 0, 0).unwrap();

        let matrices = sampler.sample(0.5);
        assert_eq!(matrices.len(), 1);

        let (scale, rotation, translation) = matrices[0].to_scale_rotation_translation();
        assert!((scale - Vec3::splat(2.0)).length() < 1e-4);
        assert!((translation - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-4);
        assert!(rotation.dot(Quat::from_rotation_z(FRAC_PI_4)).abs() > 0.9999);
    }

    #[test]
    fn test_keyframe_times_are_exact() {
        let scene = single_joint_scene();
        let sampler = BoneTransformSampler::new(&scene, 0, 0).unwrap();
        let local = sampler.bone_transforms(0.0).get(0).unwrap();
        let expected = NodeTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        };
        assert_eq!(local, expected.to_matrix());
    }

    #[test]
    fn test_channel_clamps_before_first_keyframe() {
        let scene = two_joint_scene();
        let sampler = BoneTransformSampler::new(&scene, 0, 0).unwrap();

        // Child channel starts at 0.5 and ends at 1.5
        let early = sampler.bone_transforms(0.25).get(1).unwrap();
        assert!(early.abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)), 1e-6));

        let late = sampler.bone_transforms(1.75).get(1).unwrap();
        assert!(late.abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0)), 1e-6));
    }

    #[test]
    fn test_hierarchy_and_inverse_bind() {
        let scene = two_joint_scene();
        let sampler = BoneTransformSampler::new(&scene, 0, 0).unwrap();

        // At t=1: root at x=5, child local y=2 (bind y=1)
        let m = sampler.sample(1.0);
        assert!(m[0].abs_diff_eq(Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)), 1e-5));
        assert!(m[1].abs_diff_eq(Mat4::from_translation(Vec3::new(5.0, 1.0, 0.0)), 1e-5));
    }

    #[test]
    fn test_looping_is_periodic() {
        let scene = two_joint_scene();
        let sampler = BoneTransformSampler::new(&scene, 0, 0).unwrap();
        assert_eq!(sampler.duration(), 2.0);

        for k in 1..4 {
            let base = sampler.sample(0.75);
            let shifted = sampler.sample(0.75 + k as f32 * 2.0);
            assert!(approx_eq(&base, &shifted));
        }
    }

    #[test]
    fn test_clamp_loop_mode_holds_last_pose() {
        let scene = two_joint_scene();
        let sampler = BoneTransformSampler::new(&scene, 0, 0)
            .unwrap()
            .with_loop_mode(LoopMode::Clamp);
        assert_eq!(sampler.clip_time(5.0), 2.0);
        assert!(approx_eq(&sampler.sample(5.0), &sampler.sample(2.0)));
    }

    #[test]
    fn test_zero_duration_clip_samples_time_zero() {
        let mut desc = SceneDescription::new();
        desc.add_node(Node::new("joint"));
        desc.add_skin(Skin::with_identity_bind(vec![0]));
        desc.add_clip(AnimationClip::new("pose").animate(
            0,
            Property::Translation,
            AnimationSampler::vec3(vec![0.0], vec![Vec3::X]),
        ));
        let scene = SkinnedScene::from_description(desc).unwrap();
        let sampler = BoneTransformSampler::new(&scene, 0, 0).unwrap();
        assert_eq!(sampler.duration(), 0.0);
        assert_eq!(sampler.clip_time(12.0), 0.0);
        assert_eq!(sampler.sample(12.0)[0], Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn test_duplicate_keyframe_times_use_first_value() {
        let mut desc = SceneDescription::new();
        desc.add_node(Node::new("joint"));
        desc.add_skin(Skin::with_identity_bind(vec![0]));
        desc.add_clip(
            AnimationClip::new("snap")
                .animate(
                    0,
                    Property::Translation,
                    AnimationSampler::vec3(vec![1.0, 1.0], vec![Vec3::X, Vec3::Y]),
                )
                .animate(
                    0,
                    Property::Scale,
                    AnimationSampler::vec3(vec![0.0, 4.0], vec![Vec3::ONE, Vec3::ONE]),
                ),
        );
        let scene = SkinnedScene::from_description(desc).unwrap();
        let sampler = BoneTransformSampler::new(&scene, 0, 0).unwrap();
        let local = sampler.bone_transforms(1.0).get(0).unwrap();
        assert_eq!(local, Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn test_step_interpolation_in_clip() {
        let mut desc = SceneDescription::new();
        desc.add_node(Node::new("joint"));
        desc.add_skin(Skin::with_identity_bind(vec![0]));
        desc.add_clip(AnimationClip::new("blink").animate(
            0,
            Property::Scale,
            AnimationSampler::vec3(vec![0.0, 1.0, 2.0], vec![Vec3::ONE, Vec3::ZERO, Vec3::ONE])
                .with_interpolation(Interpolation::Step),
        ));
        let scene = SkinnedScene::from_description(desc).unwrap();
        let sampler = BoneTransformSampler::new(&scene, 0, 0).unwrap();
        assert_eq!(sampler.sample(0.5)[0], Mat4::IDENTITY);
    }

    #[test]
    fn test_missing_skin_and_animation() {
        let mut desc = SceneDescription::new();
        desc.add_node(Node::new("joint"));
        desc.add_clip(AnimationClip::new("idle"));
        let scene = SkinnedScene::from_description(desc.clone()).unwrap();
        assert!(matches!(
            BoneTransformSampler::new(&scene, 0, 0),
            Err(Error::MissingSkin)
        ));

        desc.add_skin(Skin::with_identity_bind(vec![]));
        assert!(matches!(sample(&desc, 0, "idle", 0.0), Err(Error::MissingSkin)));

        desc.skins[0] = Skin::with_identity_bind(vec![0]);
        assert!(matches!(
            sample(&desc, 0, "run", 0.0),
            Err(Error::MissingAnimation(name)) if name == "run"
        ));
        assert_eq!(sample(&desc, 0, "idle", 0.0).unwrap(), vec![Mat4::IDENTITY]);
    }

    #[test]
    fn test_invalid_index_reported_by_sample() {
        let mut desc = SceneDescription::new();
        for i in 0..10 {
            desc.add_node(Node::new(format!("bone_{}", i)));
        }
        desc.add_skin(Skin::with_identity_bind((0..10).collect()));
        desc.add_clip(AnimationClip::new("broken").animate(
            999,
            Property::Rotation,
            AnimationSampler::rotation(vec![0.0], vec![Quat::IDENTITY]),
        ));
        assert!(matches!(
            sample(&desc, 0, "broken", 0.0),
            Err(Error::InvalidIndexRange { index: 999, .. })
        ));
    }

    #[test]
    fn test_joint_limit() {
        let scene = two_joint_scene();
        let result = BoneTransformSampler::new(&scene, 0, 0)
            .unwrap()
            .with_joint_limit(JointLimit::new(1));
        assert!(matches!(
            result,
            Err(Error::TooManyJoints { joints: 2, limit: 1 })
        ));
        assert!(BoneTransformSampler::new(&scene, 0, 0)
            .unwrap()
            .with_joint_limit(JointLimit::new(2))
            .is_ok());
    }

    #[test]
    fn test_sample_into_reuses_buffer() {
        let scene = two_joint_scene();
        let sampler = BoneTransformSampler::by_name(&scene, 0, "slide").unwrap();
        let mut out = vec![Mat4::ZERO; 8];
        sampler.sample_into(0.5, &mut out);
        assert_eq!(out.len(), 2);
        assert!(approx_eq(&out, &sampler.sample(0.5)));
    }

    #[test]
    fn test_scratch_buffers_are_reused() {
        let scene = two_joint_scene();
        let sampler = BoneTransformSampler::new(&scene, 0, 0).unwrap();
        let mut scratch = SampleScratch::new();
        let mut out = Vec::new();

        sampler.sample_with_scratch(0.25, &mut scratch, &mut out);
        let buffers = (
            scratch.poses.as_ptr(),
            scratch.locals.as_ptr(),
            scratch.globals.as_ptr(),
            out.as_ptr(),
        );

        for i in 0..5 {
            let time = i as f32 * 0.3;
            sampler.sample_with_scratch(time, &mut scratch, &mut out);
            assert_eq!(
                buffers,
                (
                    scratch.poses.as_ptr(),
                    scratch.locals.as_ptr(),
                    scratch.globals.as_ptr(),
                    out.as_ptr(),
                )
            );
            assert!(approx_eq(&out, &sampler.sample(time)));
        }
    }

    #[test]
    fn test_demo_arm_scene() {
        let desc = SceneDescription::from_json(include_str!("../../demos/arm.json")).unwrap();
        let rest = sample(&desc, 0, "wave", 0.0).unwrap();
        assert_eq!(rest.len(), 3);
        for m in &rest {
            assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }

        // Elbow bent 45 degrees at the half-way key; the shoulder never moves
        let bent = sample(&desc, 0, "wave", 0.5).unwrap();
        assert!(bent[0].abs_diff_eq(Mat4::IDENTITY, 1e-5));
        let wrist = bent[2].transform_point3(Vec3::new(0.0, 2.0, 0.0));
        let expected = Vec3::new(0.0, 1.0, 0.0) + Quat::from_rotation_z(FRAC_PI_4) * Vec3::Y;
        assert!((wrist - expected).length() < 1e-4);
    }

    #[test]
    fn test_sample_batch_matches_serial() {
        let a = two_joint_scene();
        let b = single_joint_scene();
        let requests: Vec<SampleRequest> = (0..8)
            .map(|i| {
                let scene = if i % 2 == 0 { &a } else { &b };
                SampleRequest::new(scene, 0, 0, i as f32 * 0.3)
            })
            .collect();

        let results = sample_batch(&requests);
        assert_eq!(results.len(), requests.len());
        for (request, result) in requests.iter().zip(results) {
            let serial = BoneTransformSampler::new(request.scene, 0, 0)
                .unwrap()
                .sample(request.time);
            assert!(approx_eq(&result.unwrap(), &serial));
        }

        let bad = SampleRequest::new(&a, 0, 7, 0.0);
        assert!(matches!(sample_batch(&[bad])[0], Err(Error::MissingAnimation(_))));
    }
}
