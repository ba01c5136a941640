//! The seam between frame planning and the GPU.

use crate::compositor::{Extent, FramePlan, TargetDesc, TargetId};
use crate::error::Result;

/// Something that can own render targets and execute a [`FramePlan`].
///
/// The compositor never talks to wgpu directly; it resolves a frame into a
/// plan and hands it to a backend. [`WgpuBackend`](crate::compositor::WgpuBackend)
/// draws it, [`RecordingBackend`](crate::compositor::RecordingBackend) writes
/// it down.
///
/// Every error returned from a backend is fatal to the caller.
pub trait Backend {
    /// Resize the presentation surface to `extent` physical pixels.
    fn configure_surface(&mut self, extent: Extent) -> Result<()>;

    /// Create (or recreate) the GPU side of target `id` at `extent`.
    ///
    /// Any previous allocation for the same id is dropped.
    fn allocate_target(&mut self, id: TargetId, desc: &TargetDesc, extent: Extent) -> Result<()>;

    /// Execute every pass of `plan`, in order, and present the result.
    fn submit(&mut self, plan: &FramePlan) -> Result<()>;
}

impl<B: Backend + ?Sized> Backend for &mut B {
    fn configure_surface(&mut self, extent: Extent) -> Result<()> {
        (**self).configure_surface(extent)
    }

    fn allocate_target(&mut self, id: TargetId, desc: &TargetDesc, extent: Extent) -> Result<()> {
        (**self).allocate_target(id, desc, extent)
    }

    fn submit(&mut self, plan: &FramePlan) -> Result<()> {
        (**self).submit(plan)
    }
}
