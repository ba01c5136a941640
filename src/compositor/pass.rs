//! Declarative pass steps.
//!
//! A [`PassStep`] says everything one draw needs: where it renders, whether
//! the environment background is drawn, which materials the subject is drawn
//! with (one [`Layer`] per geometry sub-group; no layers hides the subject),
//! which earlier targets feed each layer's samplers, and which uniforms are
//! overridden for this pass only. Nothing about a step is mutated while a
//! frame runs.

use crate::compositor::TargetId;
use crate::uniforms::UniformValue;

/// Where a pass renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    Screen,
    Target(TargetId),
}

/// Which faces of the subject a layer rasterizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
}

impl Face {
    /// The face to cull so that only this face is drawn.
    pub fn cull_mode(self) -> wgpu::Face {
        match self {
            Face::Front => wgpu::Face::Back,
            Face::Back => wgpu::Face::Front,
        }
    }
}

/// The shader program a layer draws the subject with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// Writes world-space positions; only valid on position targets.
    WorldPosition,
    /// Thickness-aware single-sample refraction.
    Glass,
    /// Six-channel chromatic dispersion.
    Dispersion,
    /// Volume march through the subject, alpha blended over earlier layers.
    Clouds,
}

impl MaterialKind {
    pub fn label(self) -> &'static str {
        match self {
            MaterialKind::WorldPosition => "world-position",
            MaterialKind::Glass => "glass",
            MaterialKind::Dispersion => "dispersion",
            MaterialKind::Clouds => "clouds",
        }
    }

    pub fn writes_positions(self) -> bool {
        matches!(self, MaterialKind::WorldPosition)
    }
}

/// A sampler input of the subject materials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// The color image seen through the subject.
    Scene,
    /// World positions of the subject's back faces.
    BackPositions,
}

/// Stand-in textures used where no rendered target is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// 1x1 opaque black.
    Black,
    /// 1x1 position far behind the subject, `(-8, -8, -25)`.
    FarPositions,
}

impl Placeholder {
    pub const FAR_POSITION: [f32; 4] = [-8.0, -8.0, -25.0, 0.0];

    pub fn texel(self) -> [f32; 4] {
        match self {
            Placeholder::Black => [0.0, 0.0, 0.0, 1.0],
            Placeholder::FarPositions => Self::FAR_POSITION,
        }
    }
}

/// What a sampler reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSource {
    Target(TargetId),
    Placeholder(Placeholder),
}

impl TextureSlot {
    /// What an unbound slot reads.
    pub fn fallback(self) -> TextureSource {
        match self {
            TextureSlot::Scene => TextureSource::Placeholder(Placeholder::Black),
            TextureSlot::BackPositions => TextureSource::Placeholder(Placeholder::FarPositions),
        }
    }
}

/// One geometry sub-group of the subject, drawn with one material.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub material: MaterialKind,
    pub face: Face,
    pub scene: Option<TextureSource>,
    pub back_positions: Option<TextureSource>,
}

impl Layer {
    pub fn new(material: MaterialKind, face: Face) -> Self {
        Self {
            material,
            face,
            scene: None,
            back_positions: None,
        }
    }

    /// Feed `slot` from `source`.
    pub fn sample(mut self, slot: TextureSlot, source: TextureSource) -> Self {
        match slot {
            TextureSlot::Scene => self.scene = Some(source),
            TextureSlot::BackPositions => self.back_positions = Some(source),
        }
        self
    }

    pub fn input(&self, slot: TextureSlot) -> Option<TextureSource> {
        match slot {
            TextureSlot::Scene => self.scene,
            TextureSlot::BackPositions => self.back_positions,
        }
    }

    /// Bound inputs, in slot order.
    pub fn inputs(&self) -> impl Iterator<Item = (TextureSlot, TextureSource)> + '_ {
        [TextureSlot::Scene, TextureSlot::BackPositions]
            .into_iter()
            .filter_map(|slot| self.input(slot).map(|source| (slot, source)))
    }
}

/// One draw of the scene into one destination.
#[derive(Clone, Debug, PartialEq)]
pub struct PassStep {
    pub label: String,
    pub destination: Destination,
    pub clear: [f32; 4],
    pub background: bool,
    pub layers: Vec<Layer>,
    pub overrides: Vec<(String, UniformValue)>,
}

impl PassStep {
    pub fn new(label: impl Into<String>, destination: Destination) -> Self {
        Self {
            label: label.into(),
            destination,
            clear: [0.0, 0.0, 0.0, 1.0],
            background: false,
            layers: Vec::new(),
            overrides: Vec::new(),
        }
    }

    pub fn to_target(label: impl Into<String>, target: TargetId) -> Self {
        Self::new(label, Destination::Target(target))
    }

    pub fn to_screen(label: impl Into<String>) -> Self {
        Self::new(label, Destination::Screen)
    }

    pub fn clear(mut self, color: [f32; 4]) -> Self {
        self.clear = color;
        self
    }

    /// Draw the environment background before the subject.
    pub fn with_background(mut self) -> Self {
        self.background = true;
        self
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Override a uniform for this pass only.
    pub fn uniform(mut self, name: &str, value: UniformValue) -> Self {
        self.overrides.push((name.to_string(), value));
        self
    }

    pub fn subject_visible(&self) -> bool {
        !self.layers.is_empty()
    }

    /// Every target this step samples, across all layers.
    pub fn sampled_targets(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.layers
            .iter()
            .flat_map(|layer| layer.inputs())
            .filter_map(|(_, source)| match source {
                TextureSource::Target(id) => Some(id),
                TextureSource::Placeholder(_) => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_culls_the_opposite_side() {
        assert_eq!(Face::Front.cull_mode(), wgpu::Face::Back);
        assert_eq!(Face::Back.cull_mode(), wgpu::Face::Front);
    }

    #[test]
    fn step_without_layers_hides_subject() {
        let step = PassStep::to_screen("bg").with_background();
        assert!(!step.subject_visible());
        assert_eq!(step.sampled_targets().count(), 0);
    }

    #[test]
    fn sampled_targets_skip_placeholders() {
        let a = TargetId(0);
        let b = TargetId(1);
        let step = PassStep::to_screen("final")
            .layer(
                Layer::new(MaterialKind::Glass, Face::Front)
                    .sample(TextureSlot::Scene, TextureSource::Target(a))
                    .sample(
                        TextureSlot::BackPositions,
                        TextureSource::Placeholder(Placeholder::FarPositions),
                    ),
            )
            .layer(
                Layer::new(MaterialKind::Clouds, Face::Front)
                    .sample(TextureSlot::BackPositions, TextureSource::Target(b)),
            );
        assert_eq!(step.sampled_targets().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn unbound_slots_fall_back_to_placeholders() {
        assert_eq!(
            TextureSlot::Scene.fallback(),
            TextureSource::Placeholder(Placeholder::Black)
        );
        assert_eq!(
            Placeholder::FarPositions.texel(),
            [-8.0, -8.0, -25.0, 0.0]
        );
    }
}
