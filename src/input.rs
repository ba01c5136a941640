use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keyboard and pointer state, fed from window events between frames.
///
/// Event callbacks and the frame callback run on the same thread, so the
/// state is plain data: events write it, `update` reads it, and
/// [`begin_frame`](Self::begin_frame) clears the per-frame edges.
#[derive(Debug, Default)]
pub struct Input {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    mouse_buttons_down: HashSet<MouseButton>,
    mouse_position: Vec2,
    mouse_delta: Vec2,
    scroll_delta: Vec2,
    window_size: Vec2,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-frame state. Call after the frame has consumed it.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = Vec2::ZERO;
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => {
                            if self.keys_down.insert(key) {
                                self.keys_pressed.insert(key);
                            }
                        }
                        ElementState::Released => {
                            self.keys_down.remove(&key);
                        }
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    self.mouse_buttons_down.insert(*button);
                }
                ElementState::Released => {
                    self.mouse_buttons_down.remove(button);
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                let new_pos = Vec2::new(position.x as f32, position.y as f32);
                self.mouse_delta += new_pos - self.mouse_position;
                self.mouse_position = new_pos;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll_delta += match delta {
                    MouseScrollDelta::LineDelta(x, y) => Vec2::new(*x, *y),
                    MouseScrollDelta::PixelDelta(pos) => {
                        Vec2::new(pos.x as f32, pos.y as f32) / 120.0
                    }
                };
            }
            WindowEvent::Resized(size) => {
                self.window_size = Vec2::new(size.width as f32, size.height as f32);
            }
            _ => {}
        }
    }

    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Returns true if the key went down since the last frame.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons_down.contains(&button)
    }

    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    pub fn scroll_delta(&self) -> Vec2 {
        self.scroll_delta
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = Vec2::new(width as f32, height as f32);
    }

    /// Cursor position in normalized device coordinates (y up).
    pub fn pointer(&self) -> Vec2 {
        normalized_pointer(self.mouse_position, self.window_size)
    }
}

/// Map a window-space cursor position to [-1, 1] on both axes, y pointing up.
pub fn normalized_pointer(position: Vec2, window_size: Vec2) -> Vec2 {
    if window_size.x <= 0.0 || window_size.y <= 0.0 {
        return Vec2::ZERO;
    }
    Vec2::new(
        position.x / window_size.x * 2.0 - 1.0,
        -(position.y / window_size.y) * 2.0 + 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_corners() {
        let size = Vec2::new(800.0, 600.0);
        assert_eq!(normalized_pointer(Vec2::ZERO, size), Vec2::new(-1.0, 1.0));
        assert_eq!(normalized_pointer(size, size), Vec2::new(1.0, -1.0));
        assert_eq!(normalized_pointer(size / 2.0, size), Vec2::ZERO);
    }

    #[test]
    fn pointer_without_window_is_centered() {
        assert_eq!(normalized_pointer(Vec2::new(10.0, 10.0), Vec2::ZERO), Vec2::ZERO);
    }
}
