//! The offscreen target pool.
//!
//! The pool is the bookkeeping half of the render targets: it knows every
//! target's description and the current physical size, and asks the
//! [`Backend`] to (re)allocate the GPU side whenever the viewport changes.

use crate::compositor::Backend;
use crate::error::Result;

/// Handle to a target in a [`TargetPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub(crate) usize);

impl TargetId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Pixel contents of a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// Displayable color in the surface's format.
    Color,
    /// World-space positions as 16-bit floats per channel.
    Position,
}

impl TargetFormat {
    /// The wgpu texture format for this target, given the surface format.
    pub fn texture_format(self, surface: wgpu::TextureFormat) -> wgpu::TextureFormat {
        match self {
            TargetFormat::Color => surface,
            TargetFormat::Position => wgpu::TextureFormat::Rgba16Float,
        }
    }
}

/// Size in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Scale a logical viewport size by the display's pixel ratio.
    ///
    /// Returns `None` for an empty viewport (for example a minimized window).
    pub fn from_logical(width: u32, height: u32, pixel_ratio: f32) -> Option<Self> {
        let scale = |v: u32| (v as f32 * pixel_ratio).round() as u32;
        let extent = Self::new(scale(width), scale(height));
        (extent.width > 0 && extent.height > 0).then_some(extent)
    }
}

/// Description of one offscreen target.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetDesc {
    pub label: String,
    pub format: TargetFormat,
    /// Render with 4x MSAA and resolve into the sampled texture.
    pub multisample: bool,
}

impl TargetDesc {
    pub fn color(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            format: TargetFormat::Color,
            multisample: false,
        }
    }

    pub fn position(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            format: TargetFormat::Position,
            multisample: false,
        }
    }

    pub fn multisampled(mut self) -> Self {
        self.multisample = true;
        self
    }

    pub fn sample_count(&self) -> u32 {
        if self.multisample { 4 } else { 1 }
    }
}

/// Every offscreen target a compositor owns, all sized to the viewport.
#[derive(Clone, Debug)]
pub struct TargetPool {
    targets: Vec<TargetDesc>,
    pixel_ratio: f32,
    viewport: Option<(u32, u32)>,
    extent: Option<Extent>,
}

impl TargetPool {
    pub fn new(pixel_ratio: f32) -> Self {
        Self {
            targets: Vec::new(),
            pixel_ratio,
            viewport: None,
            extent: None,
        }
    }

    /// Register a target. It is allocated on the next [`resize`](Self::resize).
    pub fn add(&mut self, desc: TargetDesc) -> TargetId {
        self.targets.push(desc);
        TargetId(self.targets.len() - 1)
    }

    /// Recreate every target at `width x height` logical pixels times the
    /// pixel ratio, preserving each target's format.
    ///
    /// Returns the new physical extent, or `None` if the viewport is empty, in
    /// which case the existing targets are kept.
    pub fn resize(
        &mut self,
        width: u32,
        height: u32,
        backend: &mut (impl Backend + ?Sized),
    ) -> Result<Option<Extent>> {
        let Some(extent) = Extent::from_logical(width, height, self.pixel_ratio) else {
            tracing::debug!(width, height, "ignoring resize to an empty viewport");
            return Ok(None);
        };
        self.reallocate(extent, (width, height), backend)?;
        Ok(Some(extent))
    }

    /// Recreate every target at exactly `width x height` physical pixels.
    ///
    /// Windowing systems report the physical size directly; scaling it down
    /// to logical pixels and back can land a pixel off on fractional ratios,
    /// so the physical size is used as is and the logical one is only kept
    /// for a later [`set_pixel_ratio`](Self::set_pixel_ratio).
    pub fn resize_physical(
        &mut self,
        width: u32,
        height: u32,
        pixel_ratio: f32,
        backend: &mut (impl Backend + ?Sized),
    ) -> Result<Option<Extent>> {
        self.pixel_ratio = pixel_ratio;
        if width == 0 || height == 0 {
            tracing::debug!(width, height, "ignoring resize to an empty viewport");
            return Ok(None);
        }
        let extent = Extent::new(width, height);
        let logical = |v: u32| ((v as f32 / pixel_ratio).round() as u32).max(1);
        self.reallocate(extent, (logical(width), logical(height)), backend)?;
        Ok(Some(extent))
    }

    /// The pool stays unsized until every target is allocated, so a failed
    /// resize never leaves a frame sampling a mix of old and new targets.
    fn reallocate(
        &mut self,
        extent: Extent,
        viewport: (u32, u32),
        backend: &mut (impl Backend + ?Sized),
    ) -> Result<()> {
        self.extent = None;
        backend.configure_surface(extent)?;
        for (index, desc) in self.targets.iter().enumerate() {
            backend.allocate_target(TargetId(index), desc, extent)?;
        }

        tracing::info!(
            width = extent.width,
            height = extent.height,
            pixel_ratio = self.pixel_ratio,
            targets = self.targets.len(),
            "render targets resized"
        );

        self.viewport = Some(viewport);
        self.extent = Some(extent);
        Ok(())
    }

    /// Change the pixel ratio, reallocating at the last viewport size if one is known.
    pub fn set_pixel_ratio(
        &mut self,
        pixel_ratio: f32,
        backend: &mut (impl Backend + ?Sized),
    ) -> Result<Option<Extent>> {
        self.pixel_ratio = pixel_ratio;
        match self.viewport {
            Some((width, height)) => self.resize(width, height, backend),
            None => Ok(None),
        }
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Physical size shared by all targets, once sized.
    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    /// Physical size of one target, once sized.
    pub fn size(&self, id: TargetId) -> Option<Extent> {
        self.targets.get(id.0).and(self.extent)
    }

    pub fn desc(&self, id: TargetId) -> Option<&TargetDesc> {
        self.targets.get(id.0)
    }

    pub fn ids(&self) -> impl Iterator<Item = TargetId> + '_ {
        (0..self.targets.len()).map(TargetId)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
