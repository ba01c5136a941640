//! WGSL programs: the built-in sources, validation and compilation.
//!
//! Every module is parsed and validated with naga before it reaches the
//! device, so a broken shader fails with [`Error::ShaderCompile`] carrying the
//! shader's label, the line of the fault and naga's full diagnostic text.

use crate::compositor::MaterialKind;
use crate::error::{Error, Result};

const COMMON: &str = include_str!("shaders/common.wgsl");
const SUBJECT: &str = include_str!("shaders/subject.wgsl");

/// The programs the compositor draws with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinShader {
    Background,
    WorldPosition,
    Glass,
    Dispersion,
    Clouds,
}

impl BuiltinShader {
    pub const ALL: [BuiltinShader; 5] = [
        BuiltinShader::Background,
        BuiltinShader::WorldPosition,
        BuiltinShader::Glass,
        BuiltinShader::Dispersion,
        BuiltinShader::Clouds,
    ];

    pub fn for_material(material: MaterialKind) -> Self {
        match material {
            MaterialKind::WorldPosition => BuiltinShader::WorldPosition,
            MaterialKind::Glass => BuiltinShader::Glass,
            MaterialKind::Dispersion => BuiltinShader::Dispersion,
            MaterialKind::Clouds => BuiltinShader::Clouds,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BuiltinShader::Background => "background",
            BuiltinShader::WorldPosition => "world-position",
            BuiltinShader::Glass => "glass",
            BuiltinShader::Dispersion => "dispersion",
            BuiltinShader::Clouds => "clouds",
        }
    }

    /// Complete WGSL source, including the shared preludes.
    pub fn source(self) -> String {
        let body = match self {
            BuiltinShader::Background => include_str!("shaders/background.wgsl"),
            BuiltinShader::WorldPosition => include_str!("shaders/world_position.wgsl"),
            BuiltinShader::Glass => include_str!("shaders/glass.wgsl"),
            BuiltinShader::Dispersion => include_str!("shaders/dispersion.wgsl"),
            BuiltinShader::Clouds => include_str!("shaders/clouds.wgsl"),
        };
        match self {
            BuiltinShader::Background => [COMMON, body].join("\n"),
            _ => [COMMON, SUBJECT, body].join("\n"),
        }
    }
}

/// Parse and validate WGSL without a device.
pub fn validate(label: &str, source: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        compile_error(label, e.location(source).map(|l| l.line_number), e.emit_to_string(source))
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| {
        compile_error(label, e.location(source).map(|l| l.line_number), e.emit_to_string(source))
    })?;

    Ok(module)
}

/// Validate `source` and create a shader module from it.
pub fn compile(device: &wgpu::Device, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
    validate(label, source)?;
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    tracing::debug!(shader = label, "shader module compiled");
    Ok(module)
}

fn compile_error(label: &str, line: Option<u32>, diagnostics: String) -> Error {
    let diagnostics = match line {
        Some(line) => format!("line {line}: {}", diagnostics.trim_end()),
        None => diagnostics.trim_end().to_string(),
    };
    Error::ShaderCompile {
        label: label.to_string(),
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_shaders_validate() {
        for shader in BuiltinShader::ALL {
            let source = shader.source();
            if let Err(err) = validate(shader.label(), &source) {
                panic!("{err}");
            }
        }
    }

    #[test]
    fn builtin_shaders_expose_entry_points() {
        for shader in BuiltinShader::ALL {
            let module = validate(shader.label(), &shader.source()).unwrap();
            let names: Vec<_> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
            assert!(names.contains(&"vs_main"), "{} has no vs_main", shader.label());
            assert!(names.contains(&"fs_main"), "{} has no fs_main", shader.label());
        }
    }

    #[test]
    fn syntax_error_reports_label_and_line() {
        let source = "@fragment\nfn fs_main() -> @location(0) vec4f {\n    return vec4f(1.0) +;\n}\n";
        let err = validate("broken", source).unwrap_err();
        match &err {
            Error::ShaderCompile { label, diagnostics } => {
                assert_eq!(label, "broken");
                assert!(diagnostics.starts_with("line 3"), "{diagnostics}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("shader 'broken' failed to compile"));
    }

    #[test]
    fn type_error_is_a_compile_error() {
        let source = "@fragment\nfn fs_main() -> @location(0) vec4f {\n    let x: vec4f = 1.0;\n    return x;\n}\n";
        assert!(matches!(
            validate("mistyped", source),
            Err(Error::ShaderCompile { .. })
        ));
    }

    #[test]
    fn every_material_has_a_program() {
        for material in [
            MaterialKind::WorldPosition,
            MaterialKind::Glass,
            MaterialKind::Dispersion,
            MaterialKind::Clouds,
        ] {
            assert_eq!(BuiltinShader::for_material(material).label(), material.label());
        }
    }
}
