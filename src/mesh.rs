//! Subject geometry: vertex format, CPU mesh data, GPU meshes and transforms.
//!
//! - [`Vertex3d`] is the vertex format every subject material reads
//! - [`MeshData`] is CPU-side geometry, built by generators such as
//!   [`MeshData::rounded_box`]
//! - [`Mesh`] is the GPU-resident upload of a [`MeshData`]
//! - [`Transform`] places the subject in the world from the host's pose
//!
//! # Vertex Layout
//!
//! | Attribute | Format    | Offset | Shader Location |
//! |-----------|-----------|--------|-----------------|
//! | position  | Float32x3 | 0      | 0               |
//! | normal    | Float32x3 | 12     | 1               |
//! | uv        | Float32x2 | 24     | 2               |

use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Quat, Vec3};

use crate::gpu::GpuContext;

/// A vertex with position, normal and texture coordinates (32 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    /// The wgpu vertex buffer layout for this vertex type:
    /// position (loc 0), normal (loc 1), uv (loc 2).
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// CPU-side indexed triangle geometry with counter-clockwise front faces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex3d>,
    pub indices: Vec<u32>,
}

/// Faces of a box as (outward normal, u axis, v axis) with `u x v == normal`,
/// so that walking +u then +v winds counter-clockwise seen from outside.
const BOX_FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::Y, Vec3::Z),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::Z, Vec3::X),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::Y, Vec3::X),
];

impl MeshData {
    /// A box of the given size with edges and corners rounded to `radius`,
    /// centered at the origin.
    ///
    /// `smoothness` is the number of segments spent on each quarter-circle of
    /// the rounded edges. The radius is limited to half the smallest side.
    pub fn rounded_box(width: f32, height: f32, depth: f32, radius: f32, smoothness: u32) -> Self {
        let half = Vec3::new(width, height, depth) * 0.5;
        let radius = radius.clamp(0.0, half.min_element());
        let segments = smoothness.max(1);
        let inner = half - Vec3::splat(radius);

        let mut data = MeshData::default();

        for (normal, u_axis, v_axis) in BOX_FACES {
            let u_coords = rounded_axis_coords(inner.dot(u_axis.abs()), radius, segments);
            let v_coords = rounded_axis_coords(inner.dot(v_axis.abs()), radius, segments);
            let face_offset = normal * half.dot(normal.abs());
            let cols = u_coords.len();
            let rows = v_coords.len();
            let base = data.vertices.len() as u32;

            for (j, &cv) in v_coords.iter().enumerate() {
                for (i, &cu) in u_coords.iter().enumerate() {
                    let on_box = face_offset + u_axis * cu + v_axis * cv;
                    let core = on_box.clamp(-inner, inner);
                    let n = (on_box - core).normalize_or(normal);
                    let position = core + n * radius;
                    let uv = [
                        i as f32 / (cols - 1) as f32,
                        j as f32 / (rows - 1) as f32,
                    ];
                    data.vertices
                        .push(Vertex3d::new(position.to_array(), n.to_array(), uv));
                }
            }

            for j in 0..rows as u32 - 1 {
                for i in 0..cols as u32 - 1 {
                    let a = base + j * cols as u32 + i;
                    let b = a + 1;
                    let c = a + cols as u32 + 1;
                    let d = a + cols as u32;
                    data.indices.extend_from_slice(&[a, b, c, a, c, d]);
                }
            }
        }

        data
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.vertices.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), v| {
                let p = Vec3::from(v.position);
                (min.min(p), max.max(p))
            },
        )
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Sample positions along one face axis: `segments` steps around each rounded
/// edge (evenly spaced in angle) plus the flat span between them.
fn rounded_axis_coords(inner: f32, radius: f32, segments: u32) -> Vec<f32> {
    let arc = |i: u32| radius * (i as f32 / segments as f32 * FRAC_PI_2).sin();
    let mut coords = Vec::with_capacity(segments as usize * 2 + 2);
    coords.extend((1..=segments).rev().map(|i| -inner - arc(i)));
    coords.push(-inner);
    coords.push(inner);
    coords.extend((1..=segments).map(|i| inner + arc(i)));
    coords
}

/// GPU-resident indexed geometry.
#[derive(Debug)]
pub struct Mesh {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) index_count: u32,
}

impl Mesh {
    pub fn new(gpu: &GpuContext, data: &MeshData) -> Self {
        use wgpu::util::DeviceExt;

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Subject Vertex Buffer"),
                contents: bytemuck::cast_slice(&data.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Subject Index Buffer"),
                contents: bytemuck::cast_slice(&data.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
        }
    }
}

/// Position, rotation and scale of the subject.
///
/// The host copies the rigid-body pose it gets from its physics (or animation)
/// into a `Transform` every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Scale, then rotate, then translate.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounded_box_bounds_match_size() {
        let data = MeshData::rounded_box(3.0, 3.0, 10.0, 0.5, 6);
        let (min, max) = data.bounds();
        assert!((max - Vec3::new(1.5, 1.5, 5.0)).abs().max_element() < 1e-4);
        assert!((min + Vec3::new(1.5, 1.5, 5.0)).abs().max_element() < 1e-4);
    }

    #[test]
    fn rounded_box_normals_are_unit() {
        let data = MeshData::rounded_box(2.0, 1.0, 3.0, 0.25, 4);
        for v in &data.vertices {
            let len = Vec3::from(v.normal).length();
            assert!((len - 1.0).abs() < 1e-4, "normal length {len}");
        }
    }

    #[test]
    fn rounded_box_winds_outward() {
        let data = MeshData::rounded_box(3.0, 3.0, 10.0, 0.5, 3);
        for tri in data.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(data.vertices[i as usize].position));
            let face_normal = (b - a).cross(c - a);
            if face_normal.length_squared() < 1e-10 {
                continue;
            }
            let centroid = (a + b + c) / 3.0;
            assert!(face_normal.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn rounded_box_index_count() {
        let segments = 4;
        let data = MeshData::rounded_box(1.0, 1.0, 1.0, 0.1, segments);
        let per_axis = (segments * 2 + 2) as usize;
        let quads_per_face = (per_axis - 1) * (per_axis - 1);
        assert_eq!(data.triangle_count(), 6 * quads_per_face * 2);
        assert!(data.indices.iter().all(|&i| (i as usize) < data.vertices.len()));
    }

    #[test]
    fn zero_radius_is_a_plain_box() {
        let data = MeshData::rounded_box(2.0, 2.0, 2.0, 0.0, 1);
        for v in &data.vertices {
            let p = Vec3::from(v.position);
            assert!((p.abs().max_element() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn transform_matrix_translates() {
        let t = Transform::new().position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.matrix().transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
    }
}
