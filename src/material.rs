//! Bind group layouts, shader modules and render pipelines for every program.
//!
//! # Bind Groups
//!
//! Subject programs (world-position, glass, dispersion, clouds) share one layout:
//! - **Group 0**: [`FrameUniforms`](crate::FrameUniforms), one buffer per pass
//! - **Group 1**: [`DrawUniforms`](crate::DrawUniforms), one buffer per layer
//! - **Group 2**: inputs: scene texture + sampler, back-position texture,
//!   volume texture + sampler
//!
//! The background program uses group 0 and, as group 1, the environment
//! texture and its sampler.
//!
//! Pipelines depend on the destination's format and sample count, which are
//! only known once targets exist, so they are created on first use and cached.

use std::collections::HashMap;

use crate::compositor::{Face, MaterialKind};
use crate::error::{Error, Result};
use crate::mesh::Vertex3d;
use crate::shader::{self, BuiltinShader};

/// What a pipeline draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    Background,
    Subject(MaterialKind, Face),
}

/// Everything a render pipeline is specialized on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: Program,
    pub format: wgpu::TextureFormat,
    pub samples: u32,
}

impl PipelineKey {
    pub fn blend(&self) -> wgpu::BlendState {
        match self.program {
            Program::Subject(MaterialKind::Clouds, _) => wgpu::BlendState::ALPHA_BLENDING,
            _ => wgpu::BlendState::REPLACE,
        }
    }

    pub fn cull_mode(&self) -> Option<wgpu::Face> {
        match self.program {
            Program::Background => None,
            Program::Subject(_, face) => Some(face.cull_mode()),
        }
    }

    fn shader(&self) -> BuiltinShader {
        match self.program {
            Program::Background => BuiltinShader::Background,
            Program::Subject(material, _) => BuiltinShader::for_material(material),
        }
    }
}

/// Compiled programs plus a cache of the pipelines built from them.
pub struct MaterialLibrary {
    pub(crate) frame_layout: wgpu::BindGroupLayout,
    pub(crate) draw_layout: wgpu::BindGroupLayout,
    pub(crate) inputs_layout: wgpu::BindGroupLayout,
    pub(crate) environment_layout: wgpu::BindGroupLayout,
    subject_pipeline_layout: wgpu::PipelineLayout,
    background_pipeline_layout: wgpu::PipelineLayout,
    modules: HashMap<BuiltinShader, wgpu::ShaderModule>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl MaterialLibrary {
    /// Compile every built-in program. Fails on the first shader that does not
    /// validate.
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        let frame_layout = uniform_layout(device, "Frame Bind Group Layout");
        let draw_layout = uniform_layout(device, "Draw Bind Group Layout");

        let inputs_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Subject Inputs Bind Group Layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2, true),
                sampler_entry(1),
                texture_entry(2, wgpu::TextureViewDimension::D2, false),
                texture_entry(3, wgpu::TextureViewDimension::D3, true),
                sampler_entry(4),
            ],
        });

        let environment_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Environment Bind Group Layout"),
                entries: &[
                    texture_entry(0, wgpu::TextureViewDimension::D2, true),
                    sampler_entry(1),
                ],
            });

        let subject_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Subject Pipeline Layout"),
                bind_group_layouts: &[&frame_layout, &draw_layout, &inputs_layout],
                push_constant_ranges: &[],
            });

        let background_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Background Pipeline Layout"),
                bind_group_layouts: &[&frame_layout, &environment_layout],
                push_constant_ranges: &[],
            });

        let mut modules = HashMap::new();
        for program in BuiltinShader::ALL {
            let module = shader::compile(device, program.label(), &program.source())?;
            modules.insert(program, module);
        }
        tracing::info!(programs = modules.len(), "shader programs compiled");

        Ok(Self {
            frame_layout,
            draw_layout,
            inputs_layout,
            environment_layout,
            subject_pipeline_layout,
            background_pipeline_layout,
            modules,
            pipelines: HashMap::new(),
        })
    }

    /// Build the pipeline for `key` unless it is cached already.
    ///
    /// Pipeline creation runs inside a validation error scope so that a
    /// rejected pipeline surfaces as [`Error::ShaderCompile`] instead of a
    /// device panic.
    pub fn prepare(&mut self, device: &wgpu::Device, key: PipelineKey) -> Result<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }

        let shader = key.shader();
        let module = self.modules.get(&shader).ok_or_else(|| Error::ShaderCompile {
            label: shader.label().to_string(),
            diagnostics: "program was not compiled".into(),
        })?;
        let (layout, buffers): (_, &[wgpu::VertexBufferLayout]) = match key.program {
            Program::Background => (&self.background_pipeline_layout, &[]),
            Program::Subject(..) => (&self.subject_pipeline_layout, &[Vertex3d::LAYOUT]),
        };
        let label = format!("{} Pipeline ({:?}, {}x)", shader.label(), key.format, key.samples);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: Some(key.blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: key.cull_mode(),
                front_face: wgpu::FrontFace::Ccw,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: key.samples,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::ShaderCompile {
                label: shader.label().to_string(),
                diagnostics: err.to_string(),
            });
        }

        tracing::info!(pipeline = %label, "render pipeline created");
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    /// A pipeline previously built by [`prepare`](Self::prepare).
    pub fn pipeline(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn texture_entry(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
    filterable: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(program: Program) -> PipelineKey {
        PipelineKey {
            program,
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
            samples: 1,
        }
    }

    #[test]
    fn only_clouds_blend() {
        assert_eq!(
            key(Program::Subject(MaterialKind::Clouds, Face::Front)).blend(),
            wgpu::BlendState::ALPHA_BLENDING
        );
        assert_eq!(
            key(Program::Subject(MaterialKind::Glass, Face::Front)).blend(),
            wgpu::BlendState::REPLACE
        );
    }

    #[test]
    fn background_is_not_culled() {
        assert_eq!(key(Program::Background).cull_mode(), None);
        assert_eq!(
            key(Program::Subject(MaterialKind::WorldPosition, Face::Back)).cull_mode(),
            Some(wgpu::Face::Front)
        );
    }

    #[test]
    fn keys_differ_by_face() {
        assert_ne!(
            key(Program::Subject(MaterialKind::Glass, Face::Front)),
            key(Program::Subject(MaterialKind::Glass, Face::Back))
        );
    }
}
