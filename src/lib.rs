//! # Glassworks
//!
//! **Glass that refracts what is behind it, in a handful of render passes.**
//!
//! A transparent subject cannot be drawn in one pass: it has to see the scene
//! that lies behind it. Glassworks renders the scene several times per frame
//! into offscreen targets and feeds each pass's texture to the passes after
//! it, ending on the screen.
//!
//! ## Quick Start
//!
//! ```no_run
//! use glassworks::{AppConfig, Demo};
//!
//! fn main() -> glassworks::Result<()> {
//!     glassworks::run(AppConfig::new().title("Ice").demo(Demo::IceCube))
//! }
//! ```
//!
//! ## Pieces
//!
//! - [`compositor`]: target pool, declarative pass steps, frame planning and
//!   the runner, over a [`Backend`](compositor::Backend) that is either the GPU
//!   or a recording used by tests
//! - [`UniformSet`]: the named parameters shared by the host, the
//!   [`ControlPanel`] and the shaders
//! - [`Demo`]: the ice prism and ice cube presets
//!
//! Every failure is reported as an [`Error`] and is fatal to the frame loop.

mod app;
mod camera;
pub mod compositor;
pub mod config;
mod demo;
mod error;
mod gpu;
mod input;
mod material;
mod mesh;
mod orbit_camera;
mod panel;
mod shader;
mod texture;
mod uniforms;
mod volume;

pub use app::{dump_plan, run};
pub use camera::Camera;
pub use config::AppConfig;
pub use demo::{Demo, DemoSetup, SUBJECT_SIZE, SubjectPose, ice_cube_uniforms, ice_prism_uniforms};
pub use error::{Error, Result};
pub use gpu::GpuContext;
pub use input::{Input, normalized_pointer};
pub use material::{MaterialLibrary, PipelineKey, Program};
pub use mesh::{Mesh, MeshData, Transform, Vertex3d};
pub use orbit_camera::OrbitCamera;
pub use panel::ControlPanel;
pub use shader::{BuiltinShader, compile as compile_shader, validate as validate_shader};
pub use texture::{Texture, dot_grid_pixels};
pub use uniforms::{
    DrawUniforms, FrameUniforms, UniformEntry, UniformKind, UniformRange, UniformSet, UniformValue,
    UniformView, param,
};
pub use volume::{VolumeKind, VolumeTexture, gradient_voxels, hsl_voxels};
