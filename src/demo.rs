//! Preset pass sequences: the ice prism and the ice cube.
//!
//! Both demos render the environment into `scene` first, then refract it
//! twice: once through the subject's back faces into `refraction`, and once
//! through the front faces onto the screen. The prism additionally records
//! back-face world positions so that the glass can measure its own thickness,
//! and fills the interior with a marched volume.
//!
//! The screen pass draws the environment again before the subject, so the
//! glass composites over the scene instead of over the clear color. A pass
//! that cleared its background would show the subject on black.

use std::f32::consts::PI;

use glam::{EulerRot, Quat, Vec2, Vec3};
use serde::Deserialize;

use crate::compositor::{
    Face, Layer, MaterialKind, PassSequence, PassStep, Placeholder, TargetDesc, TargetId,
    TargetPool, TextureSlot, TextureSource,
};
use crate::error::Result;
use crate::mesh::{MeshData, Transform};
use crate::uniforms::{UniformSet, UniformValue, param};

/// Size of the subject's bounding box in world units.
pub const SUBJECT_SIZE: Vec3 = Vec3::new(3.0, 3.0, 10.0);
const SUBJECT_RADIUS: f32 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Demo {
    /// Thickness-aware glass with a cloudy volume inside.
    #[default]
    IcePrism,
    /// Chromatic dispersion through a faceted block.
    IceCube,
}

/// Everything the host needs to run a demo.
#[derive(Clone, Debug)]
pub struct DemoSetup {
    pub pool: TargetPool,
    pub sequence: PassSequence,
    pub uniforms: UniformSet,
    pub mesh: MeshData,
    pub subject_size: Vec3,
}

impl Demo {
    pub fn name(self) -> &'static str {
        match self {
            Demo::IcePrism => "ice-prism",
            Demo::IceCube => "ice-cube",
        }
    }

    /// Build the demo's targets, pass sequence, default uniforms and subject
    /// mesh. `msaa` is the sample count of the color targets (1 or 4).
    pub fn setup(self, msaa: u32) -> Result<DemoSetup> {
        let color = |label: &str| {
            let desc = TargetDesc::color(label);
            if msaa > 1 { desc.multisampled() } else { desc }
        };

        let mut pool = TargetPool::new(1.0);
        let (sequence, uniforms, smoothness) = match self {
            Demo::IcePrism => {
                let scene = pool.add(color("scene"));
                let refraction = pool.add(color("refraction"));
                let positions = pool.add(TargetDesc::position("positions"));
                (
                    ice_prism_sequence(&pool, scene, refraction, positions)?,
                    ice_prism_uniforms(),
                    36,
                )
            }
            Demo::IceCube => {
                let scene = pool.add(color("scene"));
                let refraction = pool.add(color("refraction"));
                (
                    ice_cube_sequence(&pool, scene, refraction)?,
                    ice_cube_uniforms(),
                    12,
                )
            }
        };

        let mesh = MeshData::rounded_box(
            SUBJECT_SIZE.x,
            SUBJECT_SIZE.y,
            SUBJECT_SIZE.z,
            SUBJECT_RADIUS,
            smoothness,
        );
        tracing::info!(
            demo = self.name(),
            passes = sequence.len(),
            targets = pool.len(),
            triangles = mesh.triangle_count(),
            "demo ready"
        );

        Ok(DemoSetup {
            pool,
            sequence,
            uniforms,
            mesh,
            subject_size: SUBJECT_SIZE,
        })
    }
}

fn ice_prism_sequence(
    pool: &TargetPool,
    scene: TargetId,
    refraction: TargetId,
    positions: TargetId,
) -> Result<PassSequence> {
    PassSequence::builder()
        .step(PassStep::to_target("background", scene).with_background())
        .step(
            PassStep::to_target("world-position", positions)
                .clear(Placeholder::FAR_POSITION)
                .layer(Layer::new(MaterialKind::WorldPosition, Face::Back)),
        )
        .step(
            PassStep::to_target("back-refraction", refraction)
                .layer(
                    Layer::new(MaterialKind::Glass, Face::Back)
                        .sample(TextureSlot::Scene, TextureSource::Target(scene)),
                )
                .layer(
                    Layer::new(MaterialKind::Clouds, Face::Front)
                        .sample(TextureSlot::BackPositions, TextureSource::Target(positions)),
                )
                .uniform(param::DIR, UniformValue::Float(-1.0)),
        )
        .step(
            PassStep::to_screen("front-refraction")
                .with_background()
                .layer(
                    Layer::new(MaterialKind::Glass, Face::Front)
                        .sample(TextureSlot::Scene, TextureSource::Target(refraction))
                        .sample(TextureSlot::BackPositions, TextureSource::Target(positions)),
                )
                .uniform(param::DIR, UniformValue::Float(1.0)),
        )
        .build(pool)
}

fn ice_cube_sequence(
    pool: &TargetPool,
    scene: TargetId,
    refraction: TargetId,
) -> Result<PassSequence> {
    PassSequence::builder()
        .step(PassStep::to_target("background", scene).with_background())
        .step(
            PassStep::to_target("back-refraction", refraction)
                .with_background()
                .layer(
                    Layer::new(MaterialKind::Dispersion, Face::Back)
                        .sample(TextureSlot::Scene, TextureSource::Target(scene)),
                )
                .uniform(param::DIR, UniformValue::Float(-1.0)),
        )
        .step(
            PassStep::to_screen("front-refraction")
                .with_background()
                .layer(
                    Layer::new(MaterialKind::Dispersion, Face::Front)
                        .sample(TextureSlot::Scene, TextureSource::Target(refraction)),
                )
                .uniform(param::DIR, UniformValue::Float(1.0)),
        )
        .build(pool)
}

/// Parameters every glass material reads.
fn shading_uniforms(uniforms: &mut UniformSet) {
    uniforms.define(param::MOUSE, UniformValue::Vec2(Vec2::ZERO));
    uniforms
        .define(param::LIGHT, UniformValue::Vec3(Vec3::new(1.0, -1.0, -1.0)))
        .label("Light");
    uniforms.define(param::DIR, UniformValue::Float(1.0));
    uniforms
        .define(param::DIFFUSENESS, UniformValue::Float(0.2))
        .label("Diffuseness")
        .range(0.0, 1.0, 0.1);
    uniforms
        .define(param::SHININESS, UniformValue::Float(40.0))
        .label("Shininess")
        .range(0.0, 50.0, 1.0);
    uniforms
        .define(param::FRESNEL_EXP, UniformValue::Float(8.0))
        .label("Fresnel")
        .range(0.0, 20.0, 1.0);
}

pub fn ice_prism_uniforms() -> UniformSet {
    let mut uniforms = UniformSet::new();
    uniforms
        .define(param::INCIDENCE, UniformValue::Float(1.18))
        .label("Refractive index")
        .range(1.0, 1.5, 0.01);
    uniforms
        .define(param::CHROMATIC_ABERRATION, UniformValue::Float(0.05))
        .label("Chromatic aberration")
        .range(0.0, 1.0, 0.01);
    uniforms
        .define(param::REFRACT_POWER, UniformValue::Float(0.08))
        .label("Refract power")
        .range(0.0, 1.0, 0.01);
    uniforms
        .define(param::SATURATION, UniformValue::Float(1.07))
        .label("Saturation")
        .range(0.8, 1.2, 0.01);
    shading_uniforms(&mut uniforms);
    uniforms
}

pub fn ice_cube_uniforms() -> UniformSet {
    let mut uniforms = UniformSet::new();
    uniforms
        .define(param::INCIDENCE1, UniformValue::Vec3(Vec3::new(1.15, 1.16, 1.18)))
        .label("Incidence (near)");
    uniforms
        .define(param::INCIDENCE2, UniformValue::Vec3(Vec3::new(1.22, 1.22, 1.22)))
        .label("Incidence (far)");
    uniforms
        .define(param::CHROMATIC_ABERRATION, UniformValue::Float(0.3))
        .label("Chromatic aberration")
        .range(0.0, 1.0, 0.01);
    uniforms
        .define(param::REFRACT_POWER, UniformValue::Float(0.4))
        .label("Refract power")
        .range(0.0, 1.0, 0.01);
    uniforms
        .define(param::SATURATION, UniformValue::Float(1.08))
        .label("Saturation")
        .range(0.8, 1.2, 0.01);
    shading_uniforms(&mut uniforms);
    uniforms
}

/// The subject's pose: a fixed tilt spinning slowly about the world Y axis.
///
/// Stands in for a rigid-body simulation; the host advances it every frame and
/// resets it on demand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubjectPose {
    angle: f32,
    /// Radians per second.
    pub speed: f32,
}

impl Default for SubjectPose {
    fn default() -> Self {
        Self {
            angle: 0.0,
            speed: 0.2,
        }
    }
}

impl SubjectPose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orientation the subject starts in and returns to on reset.
    pub fn rest_rotation() -> Quat {
        Quat::from_euler(EulerRot::XYZ, PI / 6.0, PI / 4.0, -0.01)
    }

    pub fn advance(&mut self, dt: f32) {
        self.angle = (self.angle + self.speed * dt).rem_euclid(2.0 * PI);
    }

    pub fn reset(&mut self) {
        self.angle = 0.0;
    }

    pub fn transform(&self) -> Transform {
        Transform::new().rotation(Quat::from_rotation_y(self.angle) * Self::rest_rotation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::compositor::{Compositor, Destination, FrameInputs, RecordingBackend};

    fn labels(setup: &DemoSetup) -> Vec<&str> {
        setup.sequence.steps().iter().map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn ice_prism_has_four_passes_ending_on_screen() {
        let setup = Demo::IcePrism.setup(4).unwrap();
        assert_eq!(
            labels(&setup),
            ["background", "world-position", "back-refraction", "front-refraction"]
        );
        assert_eq!(setup.pool.len(), 3);
        assert_eq!(
            setup.sequence.steps().last().unwrap().destination,
            Destination::Screen
        );
    }

    #[test]
    fn screen_passes_draw_the_environment_behind_the_subject() {
        for demo in [Demo::IcePrism, Demo::IceCube] {
            let setup = demo.setup(1).unwrap();
            let screen = setup.sequence.steps().last().unwrap();
            assert_eq!(screen.destination, Destination::Screen);
            assert!(screen.background, "{demo:?}");
            assert!(!screen.layers.is_empty());
        }
    }

    #[test]
    fn ice_cube_has_three_passes() {
        let setup = Demo::IceCube.setup(1).unwrap();
        assert_eq!(labels(&setup), ["background", "back-refraction", "front-refraction"]);
        assert_eq!(setup.pool.len(), 2);
        assert!(setup.pool.ids().all(|id| !setup.pool.desc(id).unwrap().multisample));
    }

    #[test]
    fn msaa_applies_to_color_targets_only() {
        let setup = Demo::IcePrism.setup(4).unwrap();
        let multisampled: Vec<_> = setup
            .pool
            .ids()
            .map(|id| setup.pool.desc(id).unwrap().multisample)
            .collect();
        assert_eq!(multisampled, [true, true, false]);
    }

    #[test]
    fn back_pass_glass_reads_far_positions() {
        let setup = Demo::IcePrism.setup(1).unwrap();
        let mut compositor =
            Compositor::new(RecordingBackend::new(), setup.pool, setup.sequence);
        compositor.resize(800, 600).unwrap();

        let camera = Camera::default();
        let inputs = FrameInputs::new(0.0, &camera, &setup.uniforms)
            .subject(SubjectPose::new().transform(), setup.subject_size);
        let plan = compositor.plan_frame(&inputs).unwrap();

        let back = &plan.passes[2];
        assert_eq!(
            back.layers[0].back_positions,
            TextureSource::Placeholder(Placeholder::FarPositions)
        );
        assert_eq!(back.layers[0].uniforms.dir, -1.0);
        assert_eq!(plan.passes[3].layers[0].uniforms.dir, 1.0);
        assert!((back.layers[0].uniforms.incidence - 1.18).abs() < 1e-6);
    }

    #[test]
    fn every_demo_plans_with_its_own_uniforms() {
        for demo in [Demo::IcePrism, Demo::IceCube] {
            let setup = demo.setup(4).unwrap();
            let mut compositor =
                Compositor::new(RecordingBackend::new(), setup.pool, setup.sequence);
            compositor.resize(640, 480).unwrap();
            let camera = Camera::default();
            let inputs = FrameInputs::new(1.0, &camera, &setup.uniforms);
            compositor.run_frame(&inputs).unwrap();
            assert_eq!(compositor.frame_count(), 1, "{}", demo.name());
        }
    }

    #[test]
    fn panel_ranges_match_the_gui() {
        let uniforms = ice_prism_uniforms();
        let incidence = uniforms.entry(param::INCIDENCE).unwrap();
        assert_eq!(incidence.display_label(), "Refractive index");
        let range = incidence.panel_range().unwrap();
        assert_eq!((range.min, range.max, range.step), (1.0, 1.5, 0.01));
        assert!(uniforms.entry(param::DIR).unwrap().panel_range().is_none());
    }

    #[test]
    fn pose_spins_and_resets() {
        let mut pose = SubjectPose::new();
        let rest = pose.transform().rotation;
        assert!(rest.abs_diff_eq(SubjectPose::rest_rotation(), 1e-6));

        pose.advance(1.0);
        assert!(!pose.transform().rotation.abs_diff_eq(rest, 1e-4));

        pose.reset();
        assert!(pose.transform().rotation.abs_diff_eq(rest, 1e-6));
    }

    #[test]
    fn subject_mesh_spans_the_volume() {
        let setup = Demo::IceCube.setup(1).unwrap();
        let (min, max) = setup.mesh.bounds();
        assert!((max - min - SUBJECT_SIZE).abs().max_element() < 1e-4);
    }
}
