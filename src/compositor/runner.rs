//! The pass sequence runner.

use crate::compositor::{Backend, Extent, FrameInputs, FramePlan, PassSequence, TargetPool};
use crate::error::{Error, Result};

/// Runs a [`PassSequence`] over a [`TargetPool`] once per frame.
///
/// The compositor owns the pool, the sequence and the backend. Per frame it
/// resolves the sequence into a [`FramePlan`] and submits it; the shared
/// [`UniformSet`](crate::UniformSet) is only ever read, through the
/// [`FrameInputs`] the host passes in.
///
/// # Lifecycle
///
/// 1. [`Compositor::new`] with a validated sequence
/// 2. [`Compositor::resize`] with the viewport size, before the first frame
///    and again on every viewport change
/// 3. [`Compositor::run_frame`] once per animation frame
///
/// Every error is fatal; the compositor does not retry.
pub struct Compositor<B: Backend> {
    backend: B,
    pool: TargetPool,
    sequence: PassSequence,
    frame_count: u64,
}

impl<B: Backend> Compositor<B> {
    pub fn new(backend: B, pool: TargetPool, sequence: PassSequence) -> Self {
        Self {
            backend,
            pool,
            sequence,
            frame_count: 0,
        }
    }

    /// Recreate every target for a `width x height` logical viewport.
    ///
    /// An empty viewport is ignored and returns `None`.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<Option<Extent>> {
        self.pool.resize(width, height, &mut self.backend)
    }

    /// Recreate every target at exactly `width x height` physical pixels, the
    /// size a window reports, with `pixel_ratio` recorded for later changes.
    pub fn resize_physical(
        &mut self,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> Result<Option<Extent>> {
        self.pool
            .resize_physical(width, height, pixel_ratio, &mut self.backend)
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f32) -> Result<Option<Extent>> {
        self.pool.set_pixel_ratio(pixel_ratio, &mut self.backend)
    }

    /// Resolve the next frame without submitting it.
    pub fn plan_frame(&self, inputs: &FrameInputs) -> Result<FramePlan> {
        self.sequence.plan(inputs, &self.pool)
    }

    /// Render one frame: every step in order, then present.
    ///
    /// Fails with [`Error::NotSized`] before the first [`resize`](Self::resize)
    /// and after a resize that failed.
    pub fn run_frame(&mut self, inputs: &FrameInputs) -> Result<()> {
        if self.pool.extent().is_none() {
            return Err(Error::NotSized);
        }

        let plan = self.plan_frame(inputs)?;
        for pass in &plan.passes {
            tracing::trace!(
                frame = self.frame_count,
                pass = %pass.label,
                destination = ?pass.destination,
                layers = pass.layers.len(),
                "pass planned"
            );
        }

        self.backend.submit(&plan)?;
        self.frame_count += 1;
        Ok(())
    }

    /// Frames submitted so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn pool(&self) -> &TargetPool {
        &self.pool
    }

    pub fn sequence(&self) -> &PassSequence {
        &self.sequence
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}
