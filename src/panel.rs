//! A keyboard-driven control panel over the uniform bridge.
//!
//! The panel lists every float parameter that carries a range, in definition
//! order. Tab and Shift+Tab move the selection, Up and Down nudge the
//! selected value by its step. Nudges are clamped to the range here, at the
//! panel; values written through [`UniformSet::set`] are never clamped.

use winit::keyboard::KeyCode;

use crate::error::Result;
use crate::input::Input;
use crate::uniforms::{UniformEntry, UniformKind, UniformRange, UniformSet, UniformValue};

#[derive(Clone, Debug, Default)]
pub struct ControlPanel {
    selected: usize,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entries the panel can edit.
    pub fn controls(uniforms: &UniformSet) -> impl Iterator<Item = &UniformEntry> {
        uniforms
            .entries()
            .iter()
            .filter(|e| e.kind() == UniformKind::Float && e.panel_range().is_some())
    }

    pub fn selected<'a>(&self, uniforms: &'a UniformSet) -> Option<&'a UniformEntry> {
        Self::controls(uniforms).nth(self.selected)
    }

    pub fn select_next(&mut self, uniforms: &UniformSet) {
        let count = Self::controls(uniforms).count();
        if count > 0 {
            self.selected = (self.selected + 1) % count;
        }
    }

    pub fn select_prev(&mut self, uniforms: &UniformSet) {
        let count = Self::controls(uniforms).count();
        if count > 0 {
            self.selected = (self.selected + count - 1) % count;
        }
    }

    /// Move the selected value by `steps` of its step size, clamped to its
    /// range. Returns the new value, or `None` when nothing is selectable.
    pub fn nudge(&mut self, uniforms: &mut UniformSet, steps: i32) -> Result<Option<f32>> {
        let Some(entry) = self.selected(uniforms) else {
            return Ok(None);
        };
        let (UniformValue::Float(value), Some(range)) = (entry.value(), entry.panel_range())
        else {
            return Ok(None);
        };

        let name = entry.name().to_string();
        let next = step_value(value, steps, range);
        uniforms.set(&name, UniformValue::Float(next))?;
        tracing::debug!(uniform = %name, value = next, "panel changed uniform");
        Ok(Some(next))
    }

    /// Apply this frame's key presses. Returns whether anything changed.
    pub fn handle_input(&mut self, input: &Input, uniforms: &mut UniformSet) -> Result<bool> {
        let shift = input.key_down(KeyCode::ShiftLeft) || input.key_down(KeyCode::ShiftRight);
        let mut changed = false;

        if input.key_pressed(KeyCode::Tab) {
            if shift {
                self.select_prev(uniforms);
            } else {
                self.select_next(uniforms);
            }
            changed = true;
        }
        if input.key_pressed(KeyCode::ArrowUp) {
            changed |= self.nudge(uniforms, 1)?.is_some();
        }
        if input.key_pressed(KeyCode::ArrowDown) {
            changed |= self.nudge(uniforms, -1)?.is_some();
        }

        Ok(changed)
    }

    /// One-line summary of the selected control, e.g. `Shininess: 40 [0, 50]`.
    pub fn describe(&self, uniforms: &UniformSet) -> String {
        let Some(entry) = self.selected(uniforms) else {
            return String::new();
        };
        match (entry.value(), entry.panel_range()) {
            (UniformValue::Float(v), Some(range)) => format!(
                "{}: {} [{}, {}]",
                entry.display_label(),
                format_value(v, range.step),
                range.min,
                range.max
            ),
            _ => entry.display_label().to_string(),
        }
    }
}

/// Snap to the range's step grid and clamp to its bounds.
fn step_value(value: f32, steps: i32, range: UniformRange) -> f32 {
    let moved = value + steps as f32 * range.step;
    let snapped = if range.step > 0.0 {
        range.min + ((moved - range.min) / range.step).round() * range.step
    } else {
        moved
    };
    snapped.clamp(range.min, range.max)
}

fn format_value(value: f32, step: f32) -> String {
    let decimals = if step >= 1.0 {
        0
    } else {
        (-step.log10()).round().max(0.0) as usize
    };
    format!("{value:.decimals$}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::param;
    use glam::Vec3;

    fn uniforms() -> UniformSet {
        let mut set = UniformSet::new();
        set.define(param::LIGHT, UniformValue::Vec3(Vec3::ONE));
        set.define(param::CHROMATIC_ABERRATION, UniformValue::Float(0.05))
            .label("Chromatic aberration")
            .range(0.0, 1.0, 0.01);
        set.define(param::DIR, UniformValue::Float(1.0));
        set.define(param::SHININESS, UniformValue::Float(40.0))
            .label("Shininess")
            .range(0.0, 50.0, 1.0);
        set
    }

    #[test]
    fn only_ranged_floats_are_controls() {
        let set = uniforms();
        let names: Vec<_> = ControlPanel::controls(&set).map(|e| e.name()).collect();
        assert_eq!(names, vec![param::CHROMATIC_ABERRATION, param::SHININESS]);
    }

    #[test]
    fn selection_wraps_both_ways() {
        let set = uniforms();
        let mut panel = ControlPanel::new();
        panel.select_prev(&set);
        assert_eq!(panel.selected(&set).unwrap().name(), param::SHININESS);
        panel.select_next(&set);
        assert_eq!(panel.selected(&set).unwrap().name(), param::CHROMATIC_ABERRATION);
    }

    #[test]
    fn nudge_steps_and_clamps() {
        let mut set = uniforms();
        let mut panel = ControlPanel::new();
        panel.select_next(&set);

        assert_eq!(panel.nudge(&mut set, 1).unwrap(), Some(41.0));
        assert_eq!(panel.nudge(&mut set, 100).unwrap(), Some(50.0));
        assert_eq!(panel.nudge(&mut set, -100).unwrap(), Some(0.0));
        assert_eq!(set.float(param::SHININESS).unwrap(), 0.0);
    }

    #[test]
    fn nudge_snaps_fractional_steps() {
        let mut set = uniforms();
        let mut panel = ControlPanel::new();
        let value = panel.nudge(&mut set, 1).unwrap().unwrap();
        assert!((value - 0.06).abs() < 1e-6);
    }

    #[test]
    fn panel_clamps_even_when_value_was_set_out_of_range() {
        let mut set = uniforms();
        set.set(param::SHININESS, UniformValue::Float(80.0)).unwrap();
        assert_eq!(set.float(param::SHININESS).unwrap(), 80.0);

        let mut panel = ControlPanel::new();
        panel.select_next(&set);
        assert_eq!(panel.nudge(&mut set, 1).unwrap(), Some(50.0));
    }

    #[test]
    fn describe_uses_label_and_precision() {
        let set = uniforms();
        let mut panel = ControlPanel::new();
        assert_eq!(panel.describe(&set), "Chromatic aberration: 0.05 [0, 1]");
        panel.select_next(&set);
        assert_eq!(panel.describe(&set), "Shininess: 40 [0, 50]");
    }

    #[test]
    fn empty_set_has_nothing_to_do() {
        let mut set = UniformSet::new();
        let mut panel = ControlPanel::new();
        panel.select_next(&set);
        assert_eq!(panel.nudge(&mut set, 1).unwrap(), None);
        assert_eq!(panel.describe(&set), "");
    }
}
