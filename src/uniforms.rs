//! The uniform bridge: named shader parameters shared by the host loop, the
//! control panel and the frame compositor.
//!
//! A [`UniformSet`] is owned by the host and handed by reference to whichever
//! side needs it, so the panel writes and the compositor reads the very same
//! cells. The set stores values verbatim. Ranges are metadata for the panel; the
//! set itself never clamps.
//!
//! # Example
//!
//! ```
//! use glassworks::{UniformSet, UniformValue};
//!
//! let mut uniforms = UniformSet::new();
//! uniforms
//!     .define("shininess", UniformValue::Float(40.0))
//!     .label("Shininess")
//!     .range(0.0, 50.0, 1.0);
//!
//! // Out-of-range values are stored as-is.
//! uniforms.set("shininess", UniformValue::Float(80.0)).unwrap();
//! assert_eq!(uniforms.float("shininess").unwrap(), 80.0);
//! ```

use glam::{Mat4, Vec2, Vec3};

use crate::error::{Error, Result};

/// Names of the parameters understood by the built-in glass materials.
pub mod param {
    pub const TIME: &str = "time";
    pub const MOUSE: &str = "mouse";
    pub const LIGHT: &str = "light";
    /// Sign of the relative index of refraction: -1 on back faces, +1 on front faces.
    pub const DIR: &str = "dir";
    pub const INCIDENCE: &str = "incidence";
    pub const INCIDENCE1: &str = "incidence1";
    pub const INCIDENCE2: &str = "incidence2";
    pub const CHROMATIC_ABERRATION: &str = "chromatic_aberration";
    pub const REFRACT_POWER: &str = "refract_power";
    pub const SATURATION: &str = "saturation";
    pub const DIFFUSENESS: &str = "diffuseness";
    pub const SHININESS: &str = "shininess";
    pub const FRESNEL_EXP: &str = "fresnel_exp";
}

/// The type of a uniform value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Color,
}

impl UniformKind {
    pub fn name(self) -> &'static str {
        match self {
            UniformKind::Float => "float",
            UniformKind::Vec2 => "vec2",
            UniformKind::Vec3 => "vec3",
            UniformKind::Color => "color",
        }
    }
}

/// A typed uniform value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    /// Linear RGB color.
    Color(Vec3),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Color(_) => UniformKind::Color,
        }
    }
}

/// Slider metadata for numeric parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

/// One named parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformEntry {
    name: String,
    label: String,
    value: UniformValue,
    range: Option<UniformRange>,
}

impl UniformEntry {
    /// Set the human-readable label shown by the control panel.
    pub fn label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = label.into();
        self
    }

    /// Attach a panel range. Only meaningful for numeric entries.
    pub fn range(&mut self, min: f32, max: f32, step: f32) -> &mut Self {
        self.range = Some(UniformRange { min, max, step });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> UniformValue {
        self.value
    }

    pub fn kind(&self) -> UniformKind {
        self.value.kind()
    }

    pub fn panel_range(&self) -> Option<UniformRange> {
        self.range
    }
}

/// An ordered collection of named, typed parameters.
///
/// Entries keep their definition order, which is also the order the control
/// panel presents them in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniformSet {
    entries: Vec<UniformEntry>,
}

impl UniformSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a parameter and return it for further annotation.
    pub fn define(&mut self, name: &str, value: UniformValue) -> &mut UniformEntry {
        let index = match self.position(name) {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.value = value;
                index
            }
            None => {
                self.entries.push(UniformEntry {
                    name: name.to_string(),
                    label: name.to_string(),
                    value,
                    range: None,
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }

    /// Overwrite an existing parameter.
    ///
    /// The new value must have the same kind as the defined one. The value is
    /// stored verbatim: ranges are not applied here.
    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::UnknownUniform(name.to_string()))?;
        let entry = &mut self.entries[index];
        if entry.kind() != value.kind() {
            return Err(Error::UniformType {
                name: name.to_string(),
                expected: entry.kind().name(),
                actual: value.kind().name(),
            });
        }
        entry.value = value;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.entry(name).map(|e| e.value)
    }

    pub fn entry(&self, name: &str) -> Option<&UniformEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[UniformEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn float(&self, name: &str) -> Result<f32> {
        self.view(&[]).float(name)
    }

    pub fn vec2(&self, name: &str) -> Result<Vec2> {
        self.view(&[]).vec2(name)
    }

    pub fn vec3(&self, name: &str) -> Result<Vec3> {
        self.view(&[]).vec3(name)
    }

    /// A read-only view with per-pass overrides layered on top.
    pub fn view<'a>(&'a self, overrides: &'a [(String, UniformValue)]) -> UniformView<'a> {
        UniformView {
            base: self,
            overrides,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }
}

/// The values one pass sees: the shared set plus that pass's overrides.
///
/// Overrides shadow the shared value for the duration of the lookup only; the
/// underlying [`UniformSet`] is never written.
#[derive(Clone, Copy)]
pub struct UniformView<'a> {
    base: &'a UniformSet,
    overrides: &'a [(String, UniformValue)],
}

impl UniformView<'_> {
    pub fn get(&self, name: &str) -> Result<UniformValue> {
        let base = self
            .base
            .get(name)
            .ok_or_else(|| Error::UnknownUniform(name.to_string()))?;
        match self.overrides.iter().rev().find(|(n, _)| n == name) {
            Some((_, value)) if value.kind() != base.kind() => Err(Error::UniformType {
                name: name.to_string(),
                expected: base.kind().name(),
                actual: value.kind().name(),
            }),
            Some((_, value)) => Ok(*value),
            None => Ok(base),
        }
    }

    pub fn float(&self, name: &str) -> Result<f32> {
        match self.get(name)? {
            UniformValue::Float(v) => Ok(v),
            other => Err(type_error(name, UniformKind::Float, other)),
        }
    }

    pub fn vec2(&self, name: &str) -> Result<Vec2> {
        match self.get(name)? {
            UniformValue::Vec2(v) => Ok(v),
            other => Err(type_error(name, UniformKind::Vec2, other)),
        }
    }

    /// Reads a 3-vector; colors are accepted as well.
    pub fn vec3(&self, name: &str) -> Result<Vec3> {
        match self.get(name)? {
            UniformValue::Vec3(v) | UniformValue::Color(v) => Ok(v),
            other => Err(type_error(name, UniformKind::Vec3, other)),
        }
    }
}

fn type_error(name: &str, expected: UniformKind, actual: UniformValue) -> Error {
    Error::UniformType {
        name: name.to_string(),
        expected: expected.name(),
        actual: actual.kind().name(),
    }
}

/// Per-frame values shared by every pass, bound at `@group(0) @binding(0)`.
///
/// # WGSL Declaration
///
/// ```wgsl
/// struct Frame {
///     view_proj: mat4x4f,
///     inv_view_proj: mat4x4f,
///     camera_pos: vec3f,
///     time: f32,
///     resolution: vec2f,
///     mouse: vec2f,
/// }
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub time: f32,
    /// Size of the pass destination in physical pixels.
    pub resolution: [f32; 2],
    pub mouse: [f32; 2],
}

/// Per-draw values for the subject materials, bound at `@group(1) @binding(0)`.
///
/// Every material reads the same block; unused fields are ignored by the
/// shaders that do not need them.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// World space to the subject's unit volume space (for the clouds material).
    pub volume_inverse: [[f32; 4]; 4],
    pub light: [f32; 3],
    pub dir: f32,
    pub incidence1: [f32; 3],
    pub incidence: f32,
    pub incidence2: [f32; 3],
    pub saturation: f32,
    pub chromatic_aberration: f32,
    pub refract_power: f32,
    pub shininess: f32,
    pub diffuseness: f32,
    pub fresnel_exp: f32,
    pub _pad: [f32; 3],
}

impl DrawUniforms {
    /// Snapshot the material parameters for one pass.
    ///
    /// Parameters a demo does not define fall back to neutral values so that a
    /// material can be used without every knob present.
    pub fn resolve(view: &UniformView, model: Mat4, volume_inverse: Mat4) -> Result<Self> {
        let normal_matrix = model.inverse().transpose();
        Ok(Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            volume_inverse: volume_inverse.to_cols_array_2d(),
            light: view.vec3(param::LIGHT)?.normalize_or_zero().to_array(),
            dir: view.float(param::DIR)?,
            incidence1: optional_vec3(view, param::INCIDENCE1, Vec3::splat(1.0))?.to_array(),
            incidence: optional_float(view, param::INCIDENCE, 1.0)?,
            incidence2: optional_vec3(view, param::INCIDENCE2, Vec3::splat(1.0))?.to_array(),
            saturation: optional_float(view, param::SATURATION, 1.0)?,
            chromatic_aberration: view.float(param::CHROMATIC_ABERRATION)?,
            refract_power: view.float(param::REFRACT_POWER)?,
            shininess: view.float(param::SHININESS)?,
            diffuseness: view.float(param::DIFFUSENESS)?,
            fresnel_exp: view.float(param::FRESNEL_EXP)?,
            _pad: [0.0; 3],
        })
    }
}

fn optional_float(view: &UniformView, name: &str, fallback: f32) -> Result<f32> {
    match view.float(name) {
        Err(Error::UnknownUniform(_)) => Ok(fallback),
        other => other,
    }
}

fn optional_vec3(view: &UniformView, name: &str, fallback: Vec3) -> Result<Vec3> {
    match view.vec3(name) {
        Err(Error::UnknownUniform(_)) => Ok(fallback),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UniformSet {
        let mut set = UniformSet::new();
        set.define(param::SHININESS, UniformValue::Float(40.0))
            .label("Shininess")
            .range(0.0, 50.0, 1.0);
        set.define(param::MOUSE, UniformValue::Vec2(Vec2::ZERO));
        set.define(param::LIGHT, UniformValue::Vec3(Vec3::new(1.0, -1.0, -1.0)));
        set
    }

    #[test]
    fn set_then_get_returns_exact_value() {
        let mut set = sample();
        set.set(param::SHININESS, UniformValue::Float(12.345)).unwrap();
        assert_eq!(set.get(param::SHININESS), Some(UniformValue::Float(12.345)));
    }

    #[test]
    fn set_does_not_clamp_to_range() {
        let mut set = sample();
        set.set(param::SHININESS, UniformValue::Float(-300.0)).unwrap();
        assert_eq!(set.float(param::SHININESS).unwrap(), -300.0);
    }

    #[test]
    fn set_rejects_unknown_name() {
        let mut set = sample();
        let err = set.set("nope", UniformValue::Float(1.0)).unwrap_err();
        assert!(matches!(err, Error::UnknownUniform(name) if name == "nope"));
    }

    #[test]
    fn set_rejects_kind_change() {
        let mut set = sample();
        let err = set
            .set(param::SHININESS, UniformValue::Vec2(Vec2::ONE))
            .unwrap_err();
        assert!(matches!(err, Error::UniformType { expected: "float", actual: "vec2", .. }));
    }

    #[test]
    fn redefine_keeps_position_and_metadata() {
        let mut set = sample();
        set.define(param::SHININESS, UniformValue::Float(1.0));
        assert_eq!(set.entries()[0].name(), param::SHININESS);
        assert_eq!(set.entries()[0].display_label(), "Shininess");
        assert!(set.entries()[0].panel_range().is_some());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn view_overrides_shadow_without_writing() {
        let set = sample();
        let overrides = vec![(param::SHININESS.to_string(), UniformValue::Float(2.0))];
        let view = set.view(&overrides);
        assert_eq!(view.float(param::SHININESS).unwrap(), 2.0);
        assert_eq!(set.float(param::SHININESS).unwrap(), 40.0);
    }

    #[test]
    fn view_rejects_mistyped_override() {
        let set = sample();
        let overrides = vec![(param::SHININESS.to_string(), UniformValue::Vec3(Vec3::ONE))];
        assert!(set.view(&overrides).float(param::SHININESS).is_err());
    }

    #[test]
    fn vec3_accepts_colors() {
        let mut set = UniformSet::new();
        set.define("tint", UniformValue::Color(Vec3::new(0.5, 0.25, 1.0)));
        assert_eq!(set.vec3("tint").unwrap(), Vec3::new(0.5, 0.25, 1.0));
    }

    #[test]
    fn draw_uniforms_block_is_wgsl_aligned() {
        assert_eq!(std::mem::size_of::<DrawUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<FrameUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 64 * 3 + 16 * 5);
    }
}
