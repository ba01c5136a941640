//! A backend that writes frames down instead of drawing them.
//!
//! [`RecordingBackend`] keeps the same bookkeeping a GPU backend would (which
//! targets are allocated, which were written this frame) and fails the same
//! way, so the compositor can be exercised without a device. The binary's
//! `--dump-plan` prints its trace.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::compositor::{
    Backend, Destination, Extent, Face, FramePlan, MaterialKind, TargetDesc, TargetFormat,
    TargetId, TextureSlot, TextureSource,
};
use crate::error::{Error, Result};

/// One thing a backend was asked to do.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    ConfigureSurface {
        extent: Extent,
    },
    Allocate {
        target: TargetId,
        label: String,
        format: TargetFormat,
        extent: Extent,
    },
    BeginPass {
        index: usize,
        label: String,
        destination: Destination,
        extent: Extent,
        clear: [f32; 4],
    },
    Background,
    Bind {
        slot: TextureSlot,
        source: TextureSource,
    },
    Draw {
        material: MaterialKind,
        face: Face,
    },
    EndPass,
    Submit {
        frame: u64,
        passes: usize,
    },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::ConfigureSurface { extent } => {
                write!(f, "surface {}x{}", extent.width, extent.height)
            }
            TraceEvent::Allocate {
                target,
                label,
                format,
                extent,
            } => write!(
                f,
                "allocate #{} '{label}' {format:?} {}x{}",
                target.index(),
                extent.width,
                extent.height
            ),
            TraceEvent::BeginPass {
                index,
                label,
                destination,
                extent,
                ..
            } => {
                let destination = match destination {
                    Destination::Screen => "screen".to_string(),
                    Destination::Target(id) => format!("#{}", id.index()),
                };
                write!(
                    f,
                    "pass {index} '{label}' -> {destination} ({}x{})",
                    extent.width, extent.height
                )
            }
            TraceEvent::Background => write!(f, "  background"),
            TraceEvent::Bind { slot, source } => match source {
                TextureSource::Target(id) => write!(f, "  bind {slot:?} <- #{}", id.index()),
                TextureSource::Placeholder(p) => write!(f, "  bind {slot:?} <- {p:?}"),
            },
            TraceEvent::Draw { material, face } => {
                write!(f, "  draw {} ({face:?} faces)", material.label())
            }
            TraceEvent::EndPass => write!(f, "end"),
            TraceEvent::Submit { frame, passes } => {
                write!(f, "submit frame {frame} ({passes} passes)")
            }
        }
    }
}

/// Records every call into a [`TraceEvent`] list.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    events: Vec<TraceEvent>,
    targets: HashMap<TargetId, Extent>,
    labels: HashMap<TargetId, String>,
    surface: Option<Extent>,
    plans: Vec<FramePlan>,
    fail_on_pass: Option<String>,
    fail_on_allocate: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the draw of the pass labelled `label` fail, the way a device loss
    /// or validation error would.
    pub fn fail_on_pass(mut self, label: impl Into<String>) -> Self {
        self.fail_on_pass = Some(label.into());
        self
    }

    /// Make allocating the target labelled `label` fail, the way running out
    /// of device memory would.
    pub fn fail_on_allocate(mut self, label: impl Into<String>) -> Self {
        self.set_fail_on_allocate(Some(label.into()));
        self
    }

    /// Change which target allocation fails from here on.
    pub fn set_fail_on_allocate(&mut self, label: Option<String>) {
        self.fail_on_allocate = label;
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Every plan submitted so far, oldest first.
    pub fn plans(&self) -> &[FramePlan] {
        &self.plans
    }

    /// Current allocation size of a target.
    pub fn target_extent(&self, id: TargetId) -> Option<Extent> {
        self.targets.get(&id).copied()
    }

    pub fn surface_extent(&self) -> Option<Extent> {
        self.surface
    }

    /// The trace as one event per line.
    pub fn trace(&self) -> String {
        self.events
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn label(&self, id: TargetId) -> String {
        self.labels
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("#{}", id.index()))
    }
}

impl Backend for RecordingBackend {
    fn configure_surface(&mut self, extent: Extent) -> Result<()> {
        self.surface = Some(extent);
        self.events.push(TraceEvent::ConfigureSurface { extent });
        Ok(())
    }

    fn allocate_target(&mut self, id: TargetId, desc: &TargetDesc, extent: Extent) -> Result<()> {
        if self.fail_on_allocate.as_deref() == Some(desc.label.as_str()) {
            return Err(Error::TargetAllocation {
                label: desc.label.clone(),
                width: extent.width,
                height: extent.height,
                reason: "out of memory".to_string(),
            });
        }
        self.targets.insert(id, extent);
        self.labels.insert(id, desc.label.clone());
        self.events.push(TraceEvent::Allocate {
            target: id,
            label: desc.label.clone(),
            format: desc.format,
            extent,
        });
        Ok(())
    }

    fn submit(&mut self, plan: &FramePlan) -> Result<()> {
        let mut written: HashSet<TargetId> = HashSet::new();

        for pass in &plan.passes {
            if let Destination::Target(id) = pass.destination {
                if !self.targets.contains_key(&id) {
                    return Err(Error::UnknownTarget {
                        pass: pass.label.clone(),
                        target: id.index(),
                    });
                }
            }

            self.events.push(TraceEvent::BeginPass {
                index: pass.index,
                label: pass.label.clone(),
                destination: pass.destination,
                extent: pass.extent,
                clear: pass.clear,
            });

            if pass.background {
                self.events.push(TraceEvent::Background);
            }

            for layer in &pass.layers {
                for id in layer.sampled_targets() {
                    if !written.contains(&id) {
                        return Err(Error::PassOrder {
                            pass: pass.label.clone(),
                            target: self.label(id),
                        });
                    }
                }
                self.events.push(TraceEvent::Bind {
                    slot: TextureSlot::Scene,
                    source: layer.scene,
                });
                self.events.push(TraceEvent::Bind {
                    slot: TextureSlot::BackPositions,
                    source: layer.back_positions,
                });
                if self.fail_on_pass.as_deref() == Some(pass.label.as_str()) {
                    return Err(Error::Device(format!(
                        "draw failed in pass '{}'",
                        pass.label
                    )));
                }
                self.events.push(TraceEvent::Draw {
                    material: layer.material,
                    face: layer.face,
                });
            }

            self.events.push(TraceEvent::EndPass);
            if let Destination::Target(id) = pass.destination {
                written.insert(id);
            }
        }

        self.events.push(TraceEvent::Submit {
            frame: self.plans.len() as u64,
            passes: plan.passes.len(),
        });
        self.plans.push(plan.clone());
        Ok(())
    }
}
