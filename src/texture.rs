//! Sampled textures that are not render targets: the environment behind the
//! subject and the 1x1 placeholders bound to unwired inputs.

use std::path::Path;

use crate::compositor::Placeholder;
use crate::error::{Error, Result};
use crate::gpu::GpuContext;

/// A GPU texture that can be bound to shaders.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create an sRGB texture from raw RGBA data, sampled linearly and wrapping
    /// horizontally so that an equirectangular map has no seam.
    pub fn from_rgba(gpu: &GpuContext, data: &[u8], width: u32, height: u32, label: &str) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} Sampler")),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    /// Load an environment image from disk.
    pub fn from_file(gpu: &GpuContext, path: &Path) -> Result<Self> {
        let img = image::open(path)
            .map_err(|source| Error::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        let (width, height) = img.dimensions();
        tracing::info!(path = %path.display(), width, height, "environment image loaded");
        Ok(Self::from_rgba(gpu, &img, width, height, &path.display().to_string()))
    }

    /// The default environment: light dots on a dark field.
    pub fn dot_grid(gpu: &GpuContext, width: u32, height: u32) -> Self {
        let data = dot_grid_pixels(width, height, DOT_SPACING, DOT_RADIUS);
        Self::from_rgba(gpu, &data, width, height, "Dot Grid Environment")
    }

    /// A 1x1 `Rgba16Float` texture holding a placeholder's texel.
    pub fn placeholder(gpu: &GpuContext, placeholder: Placeholder) -> Self {
        use wgpu::util::DeviceExt;

        let label = format!("{placeholder:?} Placeholder");
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(&label),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba16Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &half_texel(placeholder.texel()),
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} Sampler")),
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width: 1,
            height: 1,
        }
    }
}

/// Pixels between dot centers in the generated environment.
pub const DOT_SPACING: u32 = 32;
/// Radius of each dot in pixels.
pub const DOT_RADIUS: f32 = 3.0;

/// RGBA8 pixels of a dot grid: one dot centered in every `spacing` square cell.
pub fn dot_grid_pixels(width: u32, height: u32, spacing: u32, radius: f32) -> Vec<u8> {
    let spacing = spacing.max(1);
    let center = spacing as f32 * 0.5;
    let mut data = Vec::with_capacity((width * height * 4) as usize);

    for y in 0..height {
        for x in 0..width {
            let dx = (x % spacing) as f32 + 0.5 - center;
            let dy = (y % spacing) as f32 + 0.5 - center;
            let distance = (dx * dx + dy * dy).sqrt();
            // One pixel of antialiasing at the dot's edge.
            let coverage = (radius + 0.5 - distance).clamp(0.0, 1.0);
            let value = (12.0 + coverage * (235.0 - 12.0)).round() as u8;
            data.extend_from_slice(&[value, value, value, 255]);
        }
    }

    data
}

/// Little-endian bytes of one `Rgba16Float` texel.
pub fn half_texel(texel: [f32; 4]) -> [u8; 8] {
    let halves = texel.map(half::f16::from_f32);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(bytemuck::cast_slice(&halves));
    bytes
}
