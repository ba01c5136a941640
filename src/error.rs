//! Error type shared by every layer of the compositor.
//!
//! None of these errors are recoverable at runtime: the host loop logs the
//! diagnostic text and stops. The variants exist so that the operator sees
//! *which* shader, target or uniform was at fault.

use std::path::PathBuf;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A WGSL module or render pipeline failed validation.
    #[error("shader '{label}' failed to compile:\n{diagnostics}")]
    ShaderCompile { label: String, diagnostics: String },

    #[error("could not allocate render target '{label}' ({width}x{height}): {reason}")]
    TargetAllocation {
        label: String,
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("GPU device error: {0}")]
    Device(String),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("pass '{pass}' references unknown render target #{target}")]
    UnknownTarget { pass: String, target: usize },

    /// A pass samples a target that no earlier pass in the sequence writes.
    #[error("pass '{pass}' samples '{target}' before any earlier pass renders it")]
    PassOrder { pass: String, target: String },

    /// A pass step that cannot be executed as declared.
    #[error("pass '{pass}': {reason}")]
    InvalidPass { pass: String, reason: String },

    #[error("unknown uniform '{0}'")]
    UnknownUniform(String),

    #[error("uniform '{name}' holds a {actual}, expected a {expected}")]
    UniformType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// `run_frame` was called before the first `resize`.
    #[error("render targets have not been sized; call resize() before the first frame")]
    NotSized,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
