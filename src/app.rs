//! The windowed host loop.
//!
//! [`run`] opens a window, builds the configured demo on top of a
//! [`WgpuBackend`] and drives one compositor frame per redraw:
//!
//! 1. `update`: orbit camera, subject pose, pointer uniform, control panel
//! 2. `render`: [`Compositor::run_frame`]
//!
//! Any error from either step is fatal. It is logged, the event loop exits and
//! [`run`] returns it so the process can exit with a failure status.

use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowAttributes, WindowId};

use glam::Vec3;

use crate::camera::Camera;
use crate::compositor::{Compositor, FrameInputs, RecordingBackend, WgpuBackend};
use crate::config::AppConfig;
use crate::demo::SubjectPose;
use crate::error::{Error, Result};
use crate::gpu::GpuContext;
use crate::input::Input;
use crate::orbit_camera::OrbitCamera;
use crate::panel::ControlPanel;
use crate::texture::Texture;
use crate::uniforms::{UniformSet, UniformValue, param};
use crate::volume::VolumeTexture;

/// Size of the generated dot-grid environment.
const ENVIRONMENT_SIZE: (u32, u32) = (2048, 1024);

/// Open a window and run the configured demo until it is closed.
pub fn run(config: AppConfig) -> Result<()> {
    config.validate()?;

    let event_loop =
        EventLoop::new().map_err(|e| Error::Device(format!("could not create event loop: {e}")))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GlassworksApp::Pending(config);
    event_loop
        .run_app(&mut app)
        .map_err(|e| Error::Device(format!("event loop failed: {e}")))?;

    match app {
        GlassworksApp::Failed(err) => Err(err),
        _ => Ok(()),
    }
}

/// Plan and record one frame of the configured demo without a window or GPU,
/// and return the trace as text.
pub fn dump_plan(config: &AppConfig) -> Result<String> {
    config.validate()?;
    let setup = config.demo.setup(config.msaa)?;
    let mut compositor = Compositor::new(RecordingBackend::new(), setup.pool, setup.sequence);
    compositor.resize(config.width, config.height)?;

    let camera = Camera::default();
    let inputs = FrameInputs::new(0.0, &camera, &setup.uniforms)
        .subject(SubjectPose::new().transform(), setup.subject_size);
    compositor.run_frame(&inputs)?;
    Ok(compositor.backend().trace())
}

enum GlassworksApp {
    Pending(AppConfig),
    Running(Box<Running>),
    Failed(Error),
}

impl GlassworksApp {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Error) {
        tracing::error!("{err}");
        *self = GlassworksApp::Failed(err);
        event_loop.exit();
    }
}

struct Running {
    window: Arc<Window>,
    title: String,
    compositor: Compositor<WgpuBackend>,
    uniforms: UniformSet,
    panel: ControlPanel,
    orbit: OrbitCamera,
    pose: SubjectPose,
    subject_size: Vec3,
    input: Input,
    start_time: Instant,
    last_frame: Instant,
}

impl Running {
    fn start(event_loop: &ActiveEventLoop, config: &AppConfig) -> Result<Self> {
        let setup = config.demo.setup(config.msaa)?;

        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| Error::Surface(format!("could not create window: {e}")))?,
        );

        let gpu = GpuContext::new(window.clone(), config.vsync)?;
        let environment = match &config.background {
            Some(path) => Texture::from_file(&gpu, path)?,
            None => Texture::dot_grid(&gpu, ENVIRONMENT_SIZE.0, ENVIRONMENT_SIZE.1),
        };
        let volume = VolumeTexture::new(&gpu, config.volume, config.volume_size);
        let backend = WgpuBackend::new(gpu, &setup.mesh, environment, volume, config.msaa)?;

        let mut compositor = Compositor::new(backend, setup.pool, setup.sequence);
        let size = window.inner_size();
        compositor.resize_physical(size.width, size.height, window.scale_factor() as f32)?;

        let mut input = Input::new();
        input.set_window_size(size.width, size.height);

        let mut running = Self {
            window,
            title: config.title.clone(),
            compositor,
            uniforms: setup.uniforms,
            panel: ControlPanel::new(),
            orbit: OrbitCamera::from_camera(&Camera::default()),
            pose: SubjectPose::new(),
            subject_size: setup.subject_size,
            input,
            start_time: Instant::now(),
            last_frame: Instant::now(),
        };
        running.refresh_title();
        tracing::info!(demo = config.demo.name(), "running");
        Ok(running)
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, event: WindowEvent) -> Result<()> {
        self.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.input.set_window_size(size.width, size.height);
                self.compositor.resize_physical(
                    size.width,
                    size.height,
                    self.window.scale_factor() as f32,
                )?;
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let size = self.window.inner_size();
                self.compositor
                    .resize_physical(size.width, size.height, scale_factor as f32)?;
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let time = self.start_time.elapsed().as_secs_f32();
                let dt = now.duration_since(self.last_frame).as_secs_f32();
                self.last_frame = now;

                if self.input.key_pressed(KeyCode::Escape) {
                    event_loop.exit();
                    return Ok(());
                }

                self.update(dt)?;
                self.render(time)?;

                self.input.begin_frame();
                self.window.request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    fn update(&mut self, dt: f32) -> Result<()> {
        self.orbit.update(&self.input);

        if self.input.key_pressed(KeyCode::KeyR) {
            self.pose.reset();
            tracing::info!("subject pose reset");
        }
        self.pose.advance(dt);

        self.uniforms
            .set(param::MOUSE, UniformValue::Vec2(self.input.pointer()))?;

        if self.panel.handle_input(&self.input, &mut self.uniforms)? {
            self.refresh_title();
        }
        Ok(())
    }

    fn render(&mut self, time: f32) -> Result<()> {
        let camera = self.orbit.camera();
        let inputs = FrameInputs::new(time, &camera, &self.uniforms)
            .subject(self.pose.transform(), self.subject_size);
        self.compositor.run_frame(&inputs)
    }

    fn refresh_title(&self) {
        let control = self.panel.describe(&self.uniforms);
        if control.is_empty() {
            self.window.set_title(&self.title);
        } else {
            self.window.set_title(&format!("{} | {control}", self.title));
        }
    }
}

impl ApplicationHandler for GlassworksApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let GlassworksApp::Pending(config) = self else {
            return;
        };
        match Running::start(event_loop, config) {
            Ok(running) => {
                running.window.request_redraw();
                *self = GlassworksApp::Running(Box::new(running));
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let GlassworksApp::Running(running) = self else {
            return;
        };
        if let Err(err) = running.window_event(event_loop, event) {
            self.fail(event_loop, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::Demo;

    #[test]
    fn dump_plan_lists_every_pass() {
        let trace = dump_plan(&AppConfig::new().size(800, 600).msaa(1)).unwrap();
        assert!(trace.contains("surface 800x600"));
        assert!(trace.contains("pass 0 'background' -> #0 (800x600)"));
        assert!(trace.contains("pass 3 'front-refraction' -> screen (800x600)"));
    }

    #[test]
    fn dump_plan_follows_the_demo() {
        let trace = dump_plan(&AppConfig::new().demo(Demo::IceCube)).unwrap();
        assert!(trace.contains("'back-refraction'"));
        assert!(!trace.contains("'world-position'"));
    }

    #[test]
    fn dump_plan_rejects_invalid_config() {
        let err = dump_plan(&AppConfig::new().msaa(3)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
