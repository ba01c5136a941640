//! Resolved frames.
//!
//! A [`FramePlan`] is what one `run_frame` submits: every pass with its
//! destination size, clear color, resolved texture sources and uniform blocks.
//! Plans are plain data and compare with `==`, which is how the runner's
//! determinism is tested.

use glam::{Mat4, Vec2, Vec3};

use crate::camera::Camera;
use crate::compositor::{Destination, Extent, Face, MaterialKind, TargetFormat, TextureSource};
use crate::mesh::Transform;
use crate::uniforms::{DrawUniforms, FrameUniforms, UniformSet, param};

/// Everything a frame depends on besides the pass sequence itself.
#[derive(Clone, Copy, Debug)]
pub struct FrameInputs<'a> {
    /// Seconds since start.
    pub time: f32,
    pub camera: &'a Camera,
    /// Pose of the subject mesh this frame.
    pub subject: Transform,
    /// World-space size of the subject's bounding box, which spans the volume
    /// texture sampled by the clouds material.
    pub subject_size: Vec3,
    pub uniforms: &'a UniformSet,
}

impl<'a> FrameInputs<'a> {
    pub fn new(time: f32, camera: &'a Camera, uniforms: &'a UniformSet) -> Self {
        Self {
            time,
            camera,
            subject: Transform::default(),
            subject_size: Vec3::ONE,
            uniforms,
        }
    }

    pub fn subject(mut self, subject: Transform, size: Vec3) -> Self {
        self.subject = subject;
        self.subject_size = size;
        self
    }

    /// Per-pass frame block for a destination of `extent` pixels.
    pub(crate) fn frame_uniforms(&self, extent: Extent) -> FrameUniforms {
        let view_proj = self.camera.view_projection(extent.aspect());
        let mouse = self.uniforms.vec2(param::MOUSE).unwrap_or(Vec2::ZERO);
        FrameUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            camera_pos: self.camera.position.to_array(),
            time: self.time,
            resolution: [extent.width as f32, extent.height as f32],
            mouse: mouse.to_array(),
        }
    }

    /// World space to the subject's volume space, where the volume spans
    /// `[-0.5, 0.5]` on every axis.
    pub(crate) fn volume_inverse(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.subject_size,
            self.subject.rotation,
            self.subject.position,
        )
        .inverse()
    }
}

/// One subject layer, ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedLayer {
    pub material: MaterialKind,
    pub face: Face,
    pub scene: TextureSource,
    pub back_positions: TextureSource,
    pub uniforms: DrawUniforms,
}

impl PlannedLayer {
    /// Targets (not placeholders) this layer samples.
    pub fn sampled_targets(&self) -> impl Iterator<Item = crate::compositor::TargetId> + '_ {
        [self.scene, self.back_positions]
            .into_iter()
            .filter_map(|source| match source {
                TextureSource::Target(id) => Some(id),
                TextureSource::Placeholder(_) => None,
            })
    }
}

/// One pass, ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedPass {
    /// Position in the sequence.
    pub index: usize,
    pub label: String,
    pub destination: Destination,
    pub extent: Extent,
    pub format: TargetFormat,
    /// Whether an offscreen destination is multisampled. The screen's sample
    /// count is the backend's own setting.
    pub multisample: bool,
    pub clear: [f32; 4],
    pub background: bool,
    pub layers: Vec<PlannedLayer>,
    pub frame: FrameUniforms,
}

/// The complete, ordered work of one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    pub passes: Vec<PlannedPass>,
}

impl FramePlan {
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// The pass drawn to the screen, if any.
    pub fn screen_pass(&self) -> Option<&PlannedPass> {
        self.passes
            .iter()
            .find(|p| p.destination == Destination::Screen)
    }
}
