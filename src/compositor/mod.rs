//! Multi-pass frame compositor for refractive subjects.
//!
//! A glass subject is drawn by rendering the scene several times per frame
//! into offscreen targets and feeding each pass's texture to later passes.
//! This module splits that work into small, separately testable pieces:
//!
//! ```text
//!  PassSequence ──plan()──▶ FramePlan ──submit()──▶ Backend
//!   (validated)     ▲         (data)                 ├─ WgpuBackend
//!                   │                                └─ RecordingBackend
//!          FrameInputs + TargetPool
//!  (uniforms, camera, pose) (sizes)
//! ```
//!
//! - [`TargetPool`]: offscreen color and position targets, all sized to the
//!   viewport times the pixel ratio
//! - [`PassStep`]: one declarative draw (destination, background, subject
//!   layers, sampled inputs, uniform overrides)
//! - [`PassSequence`]: the fixed step order, validated once so that no pass
//!   samples a target before an earlier pass renders it
//! - [`Compositor`]: the runner that plans and submits one frame per call
//!
//! # Example
//!
//! ```
//! use glassworks::compositor::{
//!     Compositor, FrameInputs, PassSequence, PassStep, RecordingBackend, TargetDesc, TargetPool,
//! };
//! use glassworks::{Camera, UniformSet};
//!
//! let mut pool = TargetPool::new(2.0);
//! let scene = pool.add(TargetDesc::color("scene"));
//! let sequence = PassSequence::builder()
//!     .step(PassStep::to_target("background", scene).with_background())
//!     .step(PassStep::to_screen("final").with_background())
//!     .build(&pool)
//!     .unwrap();
//!
//! let mut compositor = Compositor::new(RecordingBackend::new(), pool, sequence);
//! compositor.resize(800, 600).unwrap();
//!
//! let camera = Camera::default();
//! let uniforms = UniformSet::new();
//! compositor
//!     .run_frame(&FrameInputs::new(0.0, &camera, &uniforms))
//!     .unwrap();
//! assert_eq!(compositor.pool().size(scene).unwrap().width, 1600);
//! ```

mod backend;
mod pass;
mod plan;
mod recording;
mod render_target;
mod runner;
mod sequence;
mod wgpu_backend;

pub use backend::Backend;
pub use pass::{
    Destination, Face, Layer, MaterialKind, PassStep, Placeholder, TextureSlot, TextureSource,
};
pub use plan::{FrameInputs, FramePlan, PlannedLayer, PlannedPass};
pub use recording::{RecordingBackend, TraceEvent};
pub use render_target::{Extent, TargetDesc, TargetFormat, TargetId, TargetPool};
pub use runner::Compositor;
pub use sequence::{PassSequence, PassSequenceBuilder};
pub use wgpu_backend::WgpuBackend;
