//! The backend that draws frame plans with wgpu.

use std::collections::HashMap;

use crate::compositor::{
    Backend, Destination, Extent, FramePlan, Placeholder, PlannedPass, TargetDesc, TargetId,
    TextureSource,
};
use crate::error::{Error, Result};
use crate::gpu::GpuContext;
use crate::material::{MaterialLibrary, PipelineKey, Program};
use crate::mesh::{Mesh, MeshData};
use crate::texture::Texture;
use crate::uniforms::{DrawUniforms, FrameUniforms};
use crate::volume::VolumeTexture;

/// GPU side of one offscreen target.
struct GpuTarget {
    format: wgpu::TextureFormat,
    samples: u32,
    #[allow(dead_code)]
    texture: wgpu::Texture,
    /// The single-sampled view later passes sample from.
    view: wgpu::TextureView,
    /// Multisampled render view that resolves into `view`.
    msaa_view: Option<wgpu::TextureView>,
}

/// A uniform buffer that lives across frames and the bind group over it.
struct UniformSlot {
    buffer: wgpu::Buffer,
    group: wgpu::BindGroup,
}

/// Uniform blocks of one planned pass: its frame block and one draw block
/// per layer.
#[derive(Debug, PartialEq)]
struct PassSlots<T> {
    frame: T,
    draws: Vec<T>,
}

/// Per-pass uniform storage, indexed by position in the plan.
///
/// Grows to fit the largest plan submitted and is never shrunk. Passes own
/// separate blocks because every `write_buffer` of a submission lands before
/// any of its passes run.
#[derive(Debug)]
struct UniformSlots<T> {
    passes: Vec<PassSlots<T>>,
}

impl<T> Default for UniformSlots<T> {
    fn default() -> Self {
        Self { passes: Vec::new() }
    }
}

impl<T> UniformSlots<T> {
    /// Create the blocks `plan` needs that do not exist yet. `create` gets
    /// the pass and, for draw blocks, the layer index. Returns how many
    /// blocks were created.
    fn ensure(
        &mut self,
        plan: &FramePlan,
        mut create: impl FnMut(&PlannedPass, Option<usize>) -> T,
    ) -> usize {
        let mut created = 0;
        for (index, pass) in plan.passes.iter().enumerate() {
            if index == self.passes.len() {
                self.passes.push(PassSlots {
                    frame: create(pass, None),
                    draws: Vec::with_capacity(pass.layers.len()),
                });
                created += 1;
            }
            let slots = &mut self.passes[index];
            while slots.draws.len() < pass.layers.len() {
                slots.draws.push(create(pass, Some(slots.draws.len())));
                created += 1;
            }
        }
        created
    }

    fn pass(&self, index: usize) -> Option<&PassSlots<T>> {
        self.passes.get(index)
    }
}

/// Draws [`FramePlan`]s on the GPU and presents the screen pass.
///
/// Owns the device context, every allocated target, the placeholder
/// textures, the subject mesh, the environment and volume textures and the
/// pipeline cache. Each pass and layer gets its own persistent uniform
/// buffer, rewritten with `write_buffer` every frame.
pub struct WgpuBackend {
    gpu: GpuContext,
    materials: MaterialLibrary,
    mesh: Mesh,
    environment_group: wgpu::BindGroup,
    volume: VolumeTexture,
    placeholders: HashMap<Placeholder, Texture>,
    scene_sampler: wgpu::Sampler,
    targets: HashMap<TargetId, GpuTarget>,
    screen_samples: u32,
    screen_msaa: Option<wgpu::TextureView>,
    uniforms: UniformSlots<UniformSlot>,
}

impl WgpuBackend {
    /// Compile every program and upload the static resources.
    ///
    /// `screen_samples` is the MSAA sample count of the on-screen pass (1 or 4).
    pub fn new(
        gpu: GpuContext,
        subject: &MeshData,
        environment: Texture,
        volume: VolumeTexture,
        screen_samples: u32,
    ) -> Result<Self> {
        let materials = MaterialLibrary::new(&gpu.device)?;
        let mesh = Mesh::new(&gpu, subject);

        let environment_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Environment Bind Group"),
            layout: &materials.environment_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&environment.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&environment.sampler),
                },
            ],
        });

        let placeholders = [Placeholder::Black, Placeholder::FarPositions]
            .into_iter()
            .map(|p| (p, Texture::placeholder(&gpu, p)))
            .collect();

        let scene_sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Scene Input Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let screen_samples = if screen_samples > 1 { 4 } else { 1 };
        let screen_msaa = (screen_samples > 1).then(|| screen_msaa_view(&gpu, screen_samples));

        Ok(Self {
            gpu,
            materials,
            mesh,
            environment_group,
            volume,
            placeholders,
            scene_sampler,
            targets: HashMap::new(),
            screen_samples,
            screen_msaa,
            uniforms: UniformSlots::default(),
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Format and sample count a pass renders with.
    fn destination_format(&self, pass: &PlannedPass) -> Result<(wgpu::TextureFormat, u32)> {
        match pass.destination {
            Destination::Screen => Ok((self.gpu.format(), self.screen_samples)),
            Destination::Target(id) => self
                .targets
                .get(&id)
                .map(|t| (t.format, t.samples))
                .ok_or_else(|| Error::UnknownTarget {
                    pass: pass.label.clone(),
                    target: id.index(),
                }),
        }
    }

    fn source_view(&self, pass: &PlannedPass, source: TextureSource) -> Result<&wgpu::TextureView> {
        match source {
            TextureSource::Target(id) => self
                .targets
                .get(&id)
                .map(|t| &t.view)
                .ok_or_else(|| Error::UnknownTarget {
                    pass: pass.label.clone(),
                    target: id.index(),
                }),
            TextureSource::Placeholder(p) => self
                .placeholders
                .get(&p)
                .map(|t| &t.view)
                .ok_or_else(|| Error::Device(format!("missing {p:?} placeholder"))),
        }
    }

    /// Make sure every pass and layer of `plan` has a uniform buffer, then
    /// upload this frame's values into them.
    fn write_uniforms(&mut self, plan: &FramePlan) -> Result<()> {
        let device = &self.gpu.device;
        let materials = &self.materials;
        let created = self.uniforms.ensure(plan, |pass, layer| match layer {
            None => uniform_slot(
                device,
                &materials.frame_layout,
                &format!("{} Frame Uniforms", pass.label),
                std::mem::size_of::<FrameUniforms>(),
            ),
            Some(layer) => uniform_slot(
                device,
                &materials.draw_layout,
                &format!("{} Layer {layer} Uniforms", pass.label),
                std::mem::size_of::<DrawUniforms>(),
            ),
        });
        if created > 0 {
            tracing::debug!(created, "uniform buffers created");
        }

        for (index, pass) in plan.passes.iter().enumerate() {
            let slots = self.uniforms.pass(index).ok_or_else(|| missing_uniforms(pass))?;
            self.gpu
                .queue
                .write_buffer(&slots.frame.buffer, 0, bytemuck::bytes_of(&pass.frame));
            for (layer, slot) in pass.layers.iter().zip(&slots.draws) {
                self.gpu
                    .queue
                    .write_buffer(&slot.buffer, 0, bytemuck::bytes_of(&layer.uniforms));
            }
        }
        Ok(())
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        index: usize,
        pass: &PlannedPass,
        screen_view: Option<&wgpu::TextureView>,
    ) -> Result<()> {
        let (format, samples) = self.destination_format(pass)?;
        let slots = self.uniforms.pass(index).ok_or_else(|| missing_uniforms(pass))?;

        let mut draws = Vec::with_capacity(pass.layers.len());
        for (layer, slot) in pass.layers.iter().zip(&slots.draws) {
            let key = PipelineKey {
                program: Program::Subject(layer.material, layer.face),
                format,
                samples,
            };
            let draw_group = &slot.group;
            let inputs_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{} {} Inputs", pass.label, layer.material.label())),
                layout: &self.materials.inputs_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(
                            self.source_view(pass, layer.scene)?,
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.scene_sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(
                            self.source_view(pass, layer.back_positions)?,
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&self.volume.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::Sampler(&self.volume.sampler),
                    },
                ],
            });
            draws.push((key, draw_group, inputs_group));
        }

        let (view, resolve_target) = match pass.destination {
            Destination::Screen => {
                let screen = screen_view.ok_or_else(|| {
                    Error::Surface(format!("pass '{}' has no surface to draw to", pass.label))
                })?;
                match &self.screen_msaa {
                    Some(msaa) => (msaa, Some(screen)),
                    None => (screen, None),
                }
            }
            Destination::Target(id) => {
                let target = self.targets.get(&id).ok_or_else(|| Error::UnknownTarget {
                    pass: pass.label.clone(),
                    target: id.index(),
                })?;
                match &target.msaa_view {
                    Some(msaa) => (msaa, Some(&target.view)),
                    None => (&target.view, None),
                }
            }
        };

        let [r, g, b, a] = pass.clear.map(f64::from);
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&pass.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_bind_group(0, &slots.frame.group, &[]);

        if pass.background {
            let key = PipelineKey {
                program: Program::Background,
                format,
                samples,
            };
            let pipeline = self.materials.pipeline(&key).ok_or_else(|| missing_pipeline(&key))?;
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(1, &self.environment_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        render_pass.set_vertex_buffer(0, self.mesh.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        for (key, draw_group, inputs_group) in &draws {
            let pipeline = self.materials.pipeline(key).ok_or_else(|| missing_pipeline(key))?;
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(1, *draw_group, &[]);
            render_pass.set_bind_group(2, inputs_group, &[]);
            render_pass.draw_indexed(0..self.mesh.index_count, 0, 0..1);
        }

        Ok(())
    }
}

fn missing_pipeline(key: &PipelineKey) -> Error {
    Error::Device(format!("pipeline {key:?} was not prepared"))
}

fn missing_uniforms(pass: &PlannedPass) -> Error {
    Error::Device(format!("pass '{}' has no uniform buffers", pass.label))
}

fn uniform_slot(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    label: &str,
    size: usize,
) -> UniformSlot {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    });
    UniformSlot { buffer, group }
}

/// Reject a texture the device cannot hold before asking wgpu for it.
fn check_texture_extent(label: &str, extent: Extent, limit: u32) -> Result<()> {
    if extent.width > limit || extent.height > limit {
        return Err(Error::TargetAllocation {
            label: label.to_string(),
            width: extent.width,
            height: extent.height,
            reason: format!("exceeds the device limit of {limit} pixels"),
        });
    }
    Ok(())
}

/// Run `create` inside out-of-memory and validation error scopes and report
/// anything they catch as a failed allocation of `label`.
fn scoped_allocation<T>(
    gpu: &mut GpuContext,
    label: &str,
    extent: Extent,
    create: impl FnOnce(&mut GpuContext) -> T,
) -> Result<T> {
    check_texture_extent(label, extent, gpu.device.limits().max_texture_dimension_2d)?;

    gpu.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let created = create(gpu);
    let validation = pollster::block_on(gpu.device.pop_error_scope());
    let out_of_memory = pollster::block_on(gpu.device.pop_error_scope());

    match validation.or(out_of_memory) {
        Some(err) => Err(Error::TargetAllocation {
            label: label.to_string(),
            width: extent.width,
            height: extent.height,
            reason: err.to_string(),
        }),
        None => Ok(created),
    }
}

fn screen_msaa_view(gpu: &GpuContext, samples: u32) -> wgpu::TextureView {
    gpu.device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Screen MSAA Texture"),
            size: wgpu::Extent3d {
                width: gpu.width(),
                height: gpu.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: samples,
            dimension: wgpu::TextureDimension::D2,
            format: gpu.format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

impl Backend for WgpuBackend {
    fn configure_surface(&mut self, extent: Extent) -> Result<()> {
        let samples = self.screen_samples;
        self.screen_msaa = scoped_allocation(&mut self.gpu, "surface", extent, |gpu| {
            gpu.resize(extent.width, extent.height);
            (samples > 1).then(|| screen_msaa_view(gpu, samples))
        })?;
        Ok(())
    }

    fn allocate_target(&mut self, id: TargetId, desc: &TargetDesc, extent: Extent) -> Result<()> {
        let format = desc.format.texture_format(self.gpu.format());
        let samples = desc.sample_count();
        let size = wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        };

        let (texture, view, msaa_view) =
            scoped_allocation(&mut self.gpu, &desc.label, extent, |gpu| {
                let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&desc.label),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

                let msaa_view = (samples > 1).then(|| {
                    gpu.device
                        .create_texture(&wgpu::TextureDescriptor {
                            label: Some(&format!("{} MSAA", desc.label)),
                            size,
                            mip_level_count: 1,
                            sample_count: samples,
                            dimension: wgpu::TextureDimension::D2,
                            format,
                            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                            view_formats: &[],
                        })
                        .create_view(&wgpu::TextureViewDescriptor::default())
                });
                (texture, view, msaa_view)
            })?;

        tracing::debug!(
            label = %desc.label,
            width = extent.width,
            height = extent.height,
            ?format,
            samples,
            "render target allocated"
        );

        self.targets.insert(
            id,
            GpuTarget {
                format,
                samples,
                texture,
                view,
                msaa_view,
            },
        );
        Ok(())
    }

    fn submit(&mut self, plan: &FramePlan) -> Result<()> {
        for pass in &plan.passes {
            let (format, samples) = self.destination_format(pass)?;
            let programs = pass
                .background
                .then_some(Program::Background)
                .into_iter()
                .chain(pass.layers.iter().map(|l| Program::Subject(l.material, l.face)));
            for program in programs {
                let key = PipelineKey {
                    program,
                    format,
                    samples,
                };
                self.materials.prepare(&self.gpu.device, key)?;
            }
        }

        let frame = if plan.screen_pass().is_some() {
            match self.gpu.surface.get_current_texture() {
                Ok(frame) => Some(frame),
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    tracing::warn!("surface lost or outdated, reconfiguring and skipping frame");
                    self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
                    return Ok(());
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    tracing::warn!("timed out acquiring the next frame, skipping it");
                    return Ok(());
                }
                Err(err) => return Err(Error::Surface(err.to_string())),
            }
        } else {
            None
        };
        let screen_view = frame
            .as_ref()
            .map(|f| f.texture.create_view(&wgpu::TextureViewDescriptor::default()));

        self.write_uniforms(plan)?;

        self.gpu
            .device
            .push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Compositor Frame Encoder"),
            });
        let encoded = plan
            .passes
            .iter()
            .enumerate()
            .try_for_each(|(index, pass)| {
                self.encode_pass(&mut encoder, index, pass, screen_view.as_ref())
            });
        if encoded.is_ok() {
            self.gpu.queue.submit(std::iter::once(encoder.finish()));
        }

        if let Some(err) = pollster::block_on(self.gpu.device.pop_error_scope()) {
            return Err(Error::Device(err.to_string()));
        }
        encoded?;

        if let Some(frame) = frame {
            frame.present();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::compositor::{Compositor, FrameInputs, RecordingBackend};
    use crate::demo::{Demo, DemoSetup};

    fn plan(demo: Demo) -> FramePlan {
        let DemoSetup {
            pool,
            sequence,
            uniforms,
            ..
        } = demo.setup(1).unwrap();
        let mut compositor = Compositor::new(RecordingBackend::new(), pool, sequence);
        compositor.resize(64, 64).unwrap();
        let camera = Camera::default();
        compositor
            .plan_frame(&FrameInputs::new(0.0, &camera, &uniforms))
            .unwrap()
    }

    #[test]
    fn oversized_surface_is_an_allocation_error() {
        let err = check_texture_extent("surface", Extent::new(9000, 600), 8192).unwrap_err();
        assert!(matches!(
            err,
            Error::TargetAllocation { label, width: 9000, height: 600, .. } if label == "surface"
        ));
        assert!(check_texture_extent("surface", Extent::new(600, 9000), 8192).is_err());
        check_texture_extent("surface", Extent::new(8192, 8192), 8192).unwrap();
    }

    #[test]
    fn uniform_buffers_are_created_once_and_reused() {
        let plan = plan(Demo::IcePrism);
        let blocks = plan.passes.len() + plan.passes.iter().map(|p| p.layers.len()).sum::<usize>();

        let mut slots = UniformSlots::default();
        let mut calls = 0;
        let created = slots.ensure(&plan, |pass, layer| {
            calls += 1;
            (pass.index, layer)
        });
        assert_eq!(created, blocks);
        assert_eq!(calls, blocks);

        assert_eq!(slots.ensure(&plan, |pass, layer| (pass.index, layer)), 0);
        assert_eq!(slots.ensure(&plan, |pass, layer| (pass.index, layer)), 0);

        let back = slots.pass(2).unwrap();
        assert_eq!(back.frame, (2, None));
        assert_eq!(back.draws, [(2, Some(0)), (2, Some(1))]);
        assert!(slots.pass(plan.passes.len()).is_none());
    }

    #[test]
    fn uniform_slots_grow_for_a_larger_plan() {
        let cube = plan(Demo::IceCube);
        let prism = plan(Demo::IcePrism);

        let mut slots = UniformSlots::default();
        slots.ensure(&cube, |pass, layer| (pass.index, layer));
        let grown = slots.ensure(&prism, |pass, layer| (pass.index, layer));
        assert!(grown > 0);
        assert_eq!(slots.ensure(&prism, |pass, layer| (pass.index, layer)), 0);
        assert_eq!(slots.ensure(&cube, |pass, layer| (pass.index, layer)), 0);
        for (index, pass) in prism.passes.iter().enumerate() {
            assert!(slots.pass(index).unwrap().draws.len() >= pass.layers.len());
        }
    }
}
