//! Procedural 3D textures marched by the clouds material.

use serde::Deserialize;

use crate::gpu::GpuContext;

/// Which generator fills the volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeKind {
    /// Brightest at the center, fading linearly towards every face.
    #[default]
    Gradient,
    /// Hue along x, saturation along y, lightness along z.
    Hsl,
}

impl VolumeKind {
    /// RGBA8 voxels of a `size`-cubed volume, x fastest.
    pub fn voxels(self, size: u32) -> Vec<u8> {
        match self {
            VolumeKind::Gradient => gradient_voxels(size),
            VolumeKind::Hsl => hsl_voxels(size),
        }
    }
}

/// Each channel falls off from 255 at the center along its own axis; alpha
/// is the brightest of the three.
pub fn gradient_voxels(size: u32) -> Vec<u8> {
    let center = size as i64 / 2;
    let scale = 512 / size.max(1) as i64;
    let channel = |c: u32| (255 - (c as i64 - center).abs() * scale).clamp(0, 255) as u8;

    let mut data = Vec::with_capacity((size as usize).pow(3) * 4);
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let (r, g, b) = (channel(x), channel(y), channel(z));
                // Alpha is the brightest of all three channels, not the blue
                // channel alone, so the volume stays opaque along every axis.
                data.extend_from_slice(&[r, g, b, r.max(g).max(b)]);
            }
        }
    }
    data
}

pub fn hsl_voxels(size: u32) -> Vec<u8> {
    let n = size.max(1) as f32;
    let mut data = Vec::with_capacity((size as usize).pow(3) * 4);
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let [r, g, b] = hsl_to_rgb(x as f32 / n, y as f32 / n, z as f32 / n);
                data.extend_from_slice(&[r, g, b, 255]);
            }
        }
    }
    data
}

/// Convert hue, saturation and lightness in `[0, 1]` to 8-bit RGB.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [u8; 3] {
    let rgb = if s == 0.0 {
        [l; 3]
    } else {
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        [
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        ]
    };
    rgb.map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8)
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// A 3D RGBA texture with a clamped linear sampler.
#[derive(Debug)]
pub struct VolumeTexture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub size: u32,
}

impl VolumeTexture {
    pub fn new(gpu: &GpuContext, kind: VolumeKind, size: u32) -> Self {
        Self::from_voxels(gpu, &kind.voxels(size), size, &format!("{kind:?} Volume"))
    }

    pub fn from_voxels(gpu: &GpuContext, data: &[u8], size: u32, label: &str) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: size,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D3,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} Sampler")),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        tracing::info!(label, size, "volume texture uploaded");
        Self {
            texture,
            view,
            sampler,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voxel(data: &[u8], size: u32, x: u32, y: u32, z: u32) -> [u8; 4] {
        let i = (((z * size + y) * size + x) * 4) as usize;
        [data[i], data[i + 1], data[i + 2], data[i + 3]]
    }

    #[test]
    fn gradient_peaks_at_center() {
        let data = gradient_voxels(128);
        assert_eq!(data.len(), 128 * 128 * 128 * 4);
        assert_eq!(voxel(&data, 128, 64, 64, 64), [255, 255, 255, 255]);
        assert_eq!(voxel(&data, 128, 60, 64, 64), [239, 255, 255, 255]);
    }

    #[test]
    fn gradient_alpha_is_brightest_channel() {
        let data = gradient_voxels(128);
        assert_eq!(voxel(&data, 128, 10, 40, 64), [39, 159, 255, 255]);
        let [_, g, b, a] = voxel(&data, 128, 10, 40, 20);
        assert_eq!(voxel(&data, 128, 10, 40, 20), [39, 159, 79, 159]);
        assert_eq!(a, g);
        assert_ne!(a, b);
        assert_eq!(voxel(&data, 128, 0, 0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn hsl_conversion_matches_known_colors() {
        assert_eq!(hsl_to_rgb(0.0, 1.0, 0.5), [255, 0, 0]);
        assert_eq!(hsl_to_rgb(1.0 / 3.0, 1.0, 0.5), [0, 255, 0]);
        assert_eq!(hsl_to_rgb(2.0 / 3.0, 1.0, 0.5), [0, 0, 255]);
        assert_eq!(hsl_to_rgb(0.3, 0.0, 0.25), [64, 64, 64]);
    }

    #[test]
    fn hsl_volume_is_opaque() {
        let data = hsl_voxels(8);
        assert_eq!(data.len(), 8 * 8 * 8 * 4);
        assert!(data.chunks(4).all(|v| v[3] == 255));
    }
}
