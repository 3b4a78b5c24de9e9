//! GPU-side joint palette for skinning matrices
//!
//! The palette is sized to the skin's real joint count. Skins larger than the
//! backend's uniform binding allows are rejected up front instead of being
//! truncated.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::core::{Error, Result};

/// GPU-side joint matrix (mat4x4<f32>, column-major)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuJointMatrix {
    pub matrix: [[f32; 4]; 4],
}

impl GpuJointMatrix {
    /// Create from a glam Mat4
    pub fn from_mat4(matrix: Mat4) -> Self {
        Self {
            matrix: matrix.to_cols_array_2d(),
        }
    }

    /// Create identity transform
    pub fn identity() -> Self {
        Self::from_mat4(Mat4::IDENTITY)
    }
}

/// Maximum joints a single draw can upload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JointLimit(usize);

impl JointLimit {
    pub const UNLIMITED: Self = Self(usize::MAX);

    pub fn new(max_joints: usize) -> Self {
        Self(max_joints)
    }

    /// Derive the limit from the adapter's uniform binding size
    pub fn from_wgpu_limits(limits: &wgpu::Limits) -> Self {
        let binding_size = limits.max_uniform_buffer_binding_size as usize;
        Self(binding_size / std::mem::size_of::<GpuJointMatrix>())
    }

    /// The tighter of two limits
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn max_joints(&self) -> usize {
        self.0
    }

    /// Fail with `TooManyJoints` if `joints` exceeds the limit
    pub fn check(&self, joints: usize) -> Result<()> {
        if joints > self.0 {
            return Err(Error::TooManyJoints {
                joints,
                limit: self.0,
            });
        }
        Ok(())
    }
}

impl Default for JointLimit {
    fn default() -> Self {
        Self::UNLIMITED
    }
}

/// CPU copy of the joint matrices in upload layout
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointPalette {
    matrices: Vec<GpuJointMatrix>,
}

impl JointPalette {
    pub fn from_matrices(matrices: &[Mat4]) -> Self {
        Self {
            matrices: matrices.iter().map(|m| GpuJointMatrix::from_mat4(*m)).collect(),
        }
    }

    /// Refill from new matrices without reallocating
    pub fn update(&mut self, matrices: &[Mat4]) {
        self.matrices.clear();
        self.matrices
            .extend(matrices.iter().map(|m| GpuJointMatrix::from_mat4(*m)));
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.matrices)
    }

    pub fn byte_size(&self) -> u64 {
        (self.matrices.len() * std::mem::size_of::<GpuJointMatrix>()) as u64
    }
}

/// Uniform buffer holding one skin's joint palette
pub struct JointBuffer {
    buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    joint_count: usize,
}

impl JointBuffer {
    /// Create a joint buffer for a skin with `joint_count` joints
    ///
    /// # Arguments
    /// * `device` - WGPU device
    /// * `joint_count` - Number of joints in the skin
    /// * `limit` - Backend limit, usually [`JointLimit::from_wgpu_limits`]
    pub fn new(device: &wgpu::Device, joint_count: usize, limit: JointLimit) -> Result<Self> {
        if joint_count == 0 {
            return Err(Error::MissingSkin);
        }
        limit.check(joint_count)?;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("joint_palette"),
            size: (joint_count * std::mem::size_of::<GpuJointMatrix>()) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("joint_palette_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("joint_palette_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        log::debug!("Created joint palette buffer for {} joints", joint_count);

        Ok(Self {
            buffer,
            bind_group_layout,
            bind_group,
            joint_count,
        })
    }

    /// Upload a palette; its length must equal the buffer's joint count
    pub fn write(&self, queue: &wgpu::Queue, palette: &JointPalette) -> Result<()> {
        if palette.len() != self.joint_count {
            return Err(Error::LengthMismatch {
                kind: "joint palette",
                expected: self.joint_count,
                found: palette.len(),
            });
        }
        queue.write_buffer(&self.buffer, 0, palette.as_bytes());
        Ok(())
    }

    /// Get the bind group layout for use in pipeline creation
    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Get the bind group for use in rendering
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn joint_count(&self) -> usize {
        self.joint_count
    }
}
