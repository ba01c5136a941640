use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use winit::event::MouseButton;

use crate::camera::Camera;
use crate::input::Input;

const ELEVATION_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Drag-to-orbit, scroll-to-zoom camera controller around a target point.
///
/// ```ignore
/// let mut orbit = OrbitCamera::from_camera(&Camera::default());
///
/// // In the update callback:
/// orbit.update(&input);
/// let camera = orbit.camera();
/// ```
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Horizontal angle in radians.
    pub azimuth: f32,
    /// Vertical angle in radians, clamped short of the poles.
    pub elevation: f32,
    pub sensitivity: f32,
    pub zoom_sensitivity: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    lens: Camera,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::from_camera(&Camera::default())
    }
}

impl OrbitCamera {
    /// Start orbiting the point the camera is looking at, keeping its lens.
    ///
    /// The target is assumed to be the origin projected along the view
    /// direction, which is where the demos aim their cameras.
    pub fn from_camera(camera: &Camera) -> Self {
        let target = Vec3::ZERO;
        let offset = camera.position - target;
        let distance = offset.length().max(0.001);
        Self {
            target,
            distance,
            azimuth: offset.x.atan2(offset.z),
            elevation: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            sensitivity: 0.005,
            zoom_sensitivity: 1.0,
            min_distance: 2.0,
            max_distance: camera.far * 0.9,
            lens: *camera,
        }
    }

    /// Apply this frame's drag and scroll input.
    pub fn update(&mut self, input: &Input) {
        if input.mouse_down(MouseButton::Left) {
            let delta = input.mouse_delta();
            self.azimuth -= delta.x * self.sensitivity;
            self.elevation = (self.elevation + delta.y * self.sensitivity)
                .clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
        }

        let scroll = input.scroll_delta();
        if scroll.y != 0.0 {
            self.distance = (self.distance - scroll.y * self.zoom_sensitivity)
                .clamp(self.min_distance, self.max_distance);
        }
    }

    pub fn camera(&self) -> Camera {
        let offset = Vec3::new(
            self.distance * self.elevation.cos() * self.azimuth.sin(),
            self.distance * self.elevation.sin(),
            self.distance * self.elevation.cos() * self.azimuth.cos(),
        );
        let position = self.target + offset;

        Camera {
            position,
            forward: (self.target - position).normalize_or(Vec3::NEG_Z),
            ..self.lens
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_camera_round_trips_position() {
        let camera = Camera::default();
        let orbit = OrbitCamera::from_camera(&camera);
        let rebuilt = orbit.camera();
        assert!((rebuilt.position - camera.position).length() < 1e-3);
        assert_eq!(rebuilt.far, camera.far);
    }

    #[test]
    fn idle_input_leaves_pose_unchanged() {
        let mut orbit = OrbitCamera::default();
        let before = orbit.camera();
        orbit.update(&Input::new());
        assert_eq!(orbit.camera(), before);
    }
}
