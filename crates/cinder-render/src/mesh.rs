//! Instanced-mesh packing.
//!
//! Each particle becomes one instance record (model matrix plus color);
//! the host draws its mesh once per instance.

use bytemuck::{Pod, Zeroable};
use cinder_common::error::RenderError;
use cinder_core::particle::Particle;
use glam::{Mat4, Quat};

use crate::draw::{DrawArgs, DrawItem, VariantKey};
use crate::gpu::{BufferUsage, GpuBuffer, GpuBufferDriver};
use crate::sprite::upload_into;

/// One mesh instance, 20 floats.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MeshInstance {
    /// Column-major model matrix.
    pub model: [[f32; 4]; 4],
    /// RGBA color.
    pub color: [f32; 4],
}

/// Packs live particles into instance records.
#[must_use]
pub fn pack_mesh_instances(particles: &[Particle]) -> Vec<MeshInstance> {
    particles
        .iter()
        .map(|p| {
            let rotation = Quat::from_axis_angle(p.rotation_axis, p.rotation_angle);
            let model =
                Mat4::from_scale_rotation_translation(p.scale, rotation, p.global_position);
            MeshInstance {
                model: model.to_cols_array_2d(),
                color: p.color.to_array(),
            }
        })
        .collect()
}

/// Persistent GPU state for one mesh-rendered emitter.
#[derive(Debug, Default)]
pub struct MeshRenderer {
    instance_buffer: Option<GpuBuffer>,
}

impl MeshRenderer {
    /// Creates an empty renderer; the buffer appears on first prepare.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Packs, uploads and describes one frame's instances.
    pub fn prepare(
        &mut self,
        driver: &GpuBufferDriver,
        particles: &[Particle],
        sort_key: i32,
    ) -> Result<DrawItem, RenderError> {
        let instances = pack_mesh_instances(particles);
        let bytes = bytemuck::cast_slice(&instances);
        let view = upload_into(&mut self.instance_buffer, driver, bytes, BufferUsage::Instance)?;
        Ok(DrawItem {
            vertices: view,
            indices: None,
            args: DrawArgs::Instanced {
                instance_count: instances.len() as u32,
            },
            key: VariantKey::Mesh,
            sort_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    #[test]
    fn test_instance_carries_translation_and_scale() {
        let particles = vec![Particle {
            global_position: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::splat(2.0),
            color: Vec4::new(0.0, 1.0, 0.0, 1.0),
            ..Particle::default()
        }];
        let instances = pack_mesh_instances(&particles);
        assert_eq!(instances.len(), 1);
        let model = instances[0].model;
        // Translation in the last column, scale on the diagonal.
        assert_eq!(model[3][0], 1.0);
        assert_eq!(model[3][1], 2.0);
        assert_eq!(model[3][2], 3.0);
        assert_eq!(model[0][0], 2.0);
        assert_eq!(instances[0].color, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_instance_is_twenty_floats() {
        assert_eq!(std::mem::size_of::<MeshInstance>(), 20 * 4);
    }
}
