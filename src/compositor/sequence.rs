//! The fixed, validated order of passes in a frame.

use std::collections::HashSet;

use crate::compositor::{
    Destination, FrameInputs, FramePlan, PassStep, PlannedLayer, PlannedPass, TargetFormat,
    TargetId, TargetPool, TextureSlot, TextureSource,
};
use crate::error::{Error, Result};
use crate::uniforms::DrawUniforms;

/// Builder for a [`PassSequence`].
///
/// Steps run in the order they are added. Nothing is checked until
/// [`build`](Self::build), which validates the whole sequence against the
/// target pool it will run on.
///
/// # Example
///
/// ```
/// use glassworks::compositor::{
///     Face, Layer, MaterialKind, PassSequence, PassStep, TargetDesc, TargetPool,
///     TextureSlot, TextureSource,
/// };
///
/// let mut pool = TargetPool::new(1.0);
/// let scene = pool.add(TargetDesc::color("scene"));
///
/// let sequence = PassSequence::builder()
///     .step(PassStep::to_target("background", scene).with_background())
///     .step(
///         PassStep::to_screen("glass").with_background().layer(
///             Layer::new(MaterialKind::Glass, Face::Front)
///                 .sample(TextureSlot::Scene, TextureSource::Target(scene)),
///         ),
///     )
///     .build(&pool)
///     .unwrap();
/// assert_eq!(sequence.len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct PassSequenceBuilder {
    steps: Vec<PassStep>,
}

impl PassSequenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: PassStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Validate the steps against `pool` and freeze them.
    ///
    /// Fails when:
    /// - the sequence is empty;
    /// - a step names a target the pool does not own ([`Error::UnknownTarget`]);
    /// - a step samples a target that no strictly earlier step renders
    ///   ([`Error::PassOrder`]), which also rules out sampling on the first frame
    ///   before anything was written;
    /// - a step samples its own destination, renders to the screen anywhere but
    ///   last, draws a material into a destination of the wrong format, or feeds
    ///   a slot from a target of the wrong format ([`Error::InvalidPass`]).
    pub fn build(self, pool: &TargetPool) -> Result<PassSequence> {
        if self.steps.is_empty() {
            return Err(Error::InvalidPass {
                pass: "<sequence>".into(),
                reason: "a pass sequence needs at least one step".into(),
            });
        }

        let last = self.steps.len() - 1;
        let mut written: HashSet<TargetId> = HashSet::new();

        for (index, step) in self.steps.iter().enumerate() {
            let destination_format = match step.destination {
                Destination::Screen if index != last => {
                    return Err(invalid(step, "only the last step may render to the screen"));
                }
                Destination::Screen => TargetFormat::Color,
                Destination::Target(id) => target_format(pool, step, id)?,
            };

            for layer in &step.layers {
                let wants = if layer.material.writes_positions() {
                    TargetFormat::Position
                } else {
                    TargetFormat::Color
                };
                if wants != destination_format {
                    return Err(invalid(
                        step,
                        &format!(
                            "material '{}' cannot draw into a {destination_format:?} destination",
                            layer.material.label()
                        ),
                    ));
                }

                for (slot, source) in layer.inputs() {
                    let TextureSource::Target(id) = source else {
                        continue;
                    };
                    let format = target_format(pool, step, id)?;
                    let label = pool.desc(id).map(|d| d.label.clone()).unwrap_or_default();

                    if step.destination == Destination::Target(id) {
                        return Err(invalid(
                            step,
                            &format!("samples '{label}', its own destination"),
                        ));
                    }
                    if format != slot_format(slot) {
                        return Err(invalid(
                            step,
                            &format!("{slot:?} input '{label}' is a {format:?} target"),
                        ));
                    }
                    if !written.contains(&id) {
                        return Err(Error::PassOrder {
                            pass: step.label.clone(),
                            target: label,
                        });
                    }
                }
            }

            if step.background && destination_format != TargetFormat::Color {
                return Err(invalid(step, "the background only draws into color destinations"));
            }

            if let Destination::Target(id) = step.destination {
                written.insert(id);
            }
        }

        tracing::debug!(steps = self.steps.len(), "pass sequence validated");
        Ok(PassSequence { steps: self.steps })
    }
}

fn invalid(step: &PassStep, reason: &str) -> Error {
    Error::InvalidPass {
        pass: step.label.clone(),
        reason: reason.to_string(),
    }
}

fn target_format(pool: &TargetPool, step: &PassStep, id: TargetId) -> Result<TargetFormat> {
    pool.desc(id)
        .map(|desc| desc.format)
        .ok_or_else(|| Error::UnknownTarget {
            pass: step.label.clone(),
            target: id.index(),
        })
}

fn slot_format(slot: TextureSlot) -> TargetFormat {
    match slot {
        TextureSlot::Scene => TargetFormat::Color,
        TextureSlot::BackPositions => TargetFormat::Position,
    }
}

/// A validated, immutable list of pass steps.
///
/// The same steps are resolved into a [`FramePlan`] every frame; nothing in the
/// sequence changes between frames.
#[derive(Clone, Debug, PartialEq)]
pub struct PassSequence {
    steps: Vec<PassStep>,
}

impl PassSequence {
    pub fn builder() -> PassSequenceBuilder {
        PassSequenceBuilder::new()
    }

    pub fn steps(&self) -> &[PassStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolve every step for one frame.
    ///
    /// This is a pure function of its inputs: unbound texture slots become
    /// placeholders and each step's uniform overrides are applied to its own
    /// snapshot only.
    pub fn plan(&self, inputs: &FrameInputs, pool: &TargetPool) -> Result<FramePlan> {
        let extent = pool.extent().ok_or(Error::NotSized)?;
        let model = inputs.subject.matrix();
        let volume_inverse = inputs.volume_inverse();
        let frame = inputs.frame_uniforms(extent);

        let mut passes = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let (format, multisample) = match step.destination {
                Destination::Screen => (TargetFormat::Color, false),
                Destination::Target(id) => {
                    let desc = pool.desc(id).ok_or_else(|| Error::UnknownTarget {
                        pass: step.label.clone(),
                        target: id.index(),
                    })?;
                    (desc.format, desc.multisample)
                }
            };

            let view = inputs.uniforms.view(&step.overrides);
            let layers = step
                .layers
                .iter()
                .map(|layer| {
                    Ok(PlannedLayer {
                        material: layer.material,
                        face: layer.face,
                        scene: layer
                            .scene
                            .unwrap_or_else(|| TextureSlot::Scene.fallback()),
                        back_positions: layer
                            .back_positions
                            .unwrap_or_else(|| TextureSlot::BackPositions.fallback()),
                        uniforms: DrawUniforms::resolve(&view, model, volume_inverse)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            passes.push(PlannedPass {
                index,
                label: step.label.clone(),
                destination: step.destination,
                extent,
                format,
                multisample,
                clear: step.clear,
                background: step.background,
                layers,
                frame,
            });
        }

        Ok(FramePlan { passes })
    }
}
