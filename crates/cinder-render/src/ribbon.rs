//! Ribbon (trail strip) packing.
//!
//! Particles are grouped by ribbon id and sorted oldest-first, so each
//! group reads as a path from tail to head. Every particle contributes
//! two vertices sharing its center; the host's vertex shader extrudes
//! them sideways by the vertex width, using `uv.y` (0 or 1) to pick the
//! side. Groups with fewer than two particles produce no geometry.

use ahash::AHashMap;
use bytemuck::{Pod, Zeroable};
use cinder_common::error::RenderError;
use cinder_core::particle::Particle;

use crate::draw::{DrawArgs, DrawItem, VariantKey};
use crate::gpu::{BufferUsage, GpuBuffer, GpuBufferDriver};
use crate::sprite::upload_into;

/// One ribbon vertex, 10 floats.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RibbonVertex {
    /// Strip center in world space.
    pub position: [f32; 3],
    /// RGBA color.
    pub color: [f32; 4],
    /// `x` runs 0..1 along the strip, `y` picks the extrusion side.
    pub uv: [f32; 2],
    /// Half-width of the strip at this point.
    pub width: f32,
}

/// CPU-side output of a ribbon pack.
#[derive(Debug, Default)]
pub struct RibbonBatch {
    /// Two vertices per packed particle.
    pub vertices: Vec<RibbonVertex>,
    /// Six indices per strip segment.
    pub indices: Vec<u32>,
}

/// Packs live particles into connected strips.
#[must_use]
pub fn pack_ribbons(particles: &[Particle], half_width: f32) -> RibbonBatch {
    let mut groups: AHashMap<u32, Vec<&Particle>> = AHashMap::new();
    for p in particles {
        groups.entry(p.ribbon_id).or_default().push(p);
    }
    let mut ids: Vec<u32> = groups.keys().copied().collect();
    ids.sort_unstable();

    let mut batch = RibbonBatch::default();
    for id in ids {
        let Some(group) = groups.get_mut(&id) else {
            continue;
        };
        if group.len() < 2 {
            continue;
        }
        // Oldest first; ids break age ties so the order is total.
        group.sort_by(|a, b| {
            b.current_life
                .total_cmp(&a.current_life)
                .then_with(|| a.id.cmp(&b.id))
        });

        let base = batch.vertices.len() as u32;
        let last = (group.len() - 1) as f32;
        for (i, p) in group.iter().enumerate() {
            let along = i as f32 / last;
            for side in [0.0, 1.0] {
                batch.vertices.push(RibbonVertex {
                    position: p.global_position.to_array(),
                    color: p.color.to_array(),
                    uv: [along, side],
                    width: half_width * p.scale.x,
                });
            }
        }
        for segment in 0..group.len() as u32 - 1 {
            let v = base + segment * 2;
            batch
                .indices
                .extend_from_slice(&[v, v + 1, v + 2, v + 2, v + 1, v + 3]);
        }
    }
    batch
}

/// Persistent GPU state for one ribbon-rendered emitter.
#[derive(Debug, Default)]
pub struct RibbonRenderer {
    vertex_buffer: Option<GpuBuffer>,
    index_buffer: Option<GpuBuffer>,
}

impl RibbonRenderer {
    /// Creates an empty renderer; buffers appear on first prepare.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Packs, uploads and describes one frame's strips.
    pub fn prepare(
        &mut self,
        driver: &GpuBufferDriver,
        particles: &[Particle],
        half_width: f32,
        sort_key: i32,
    ) -> Result<DrawItem, RenderError> {
        let batch = pack_ribbons(particles, half_width);
        let vertex_bytes = bytemuck::cast_slice(&batch.vertices);
        let index_bytes = bytemuck::cast_slice(&batch.indices);
        let vertices = upload_into(&mut self.vertex_buffer, driver, vertex_bytes, BufferUsage::Vertex)?;
        let indices = upload_into(&mut self.index_buffer, driver, index_bytes, BufferUsage::Index)?;
        Ok(DrawItem {
            vertices,
            indices: Some(indices),
            args: DrawArgs::Indexed {
                index_count: batch.indices.len() as u32,
            },
            key: VariantKey::Ribbon,
            sort_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn particle(id: u64, ribbon: u32, age: f32, position: Vec3) -> Particle {
        Particle {
            id,
            ribbon_id: ribbon,
            current_life: age,
            life_time: 10.0,
            global_position: position,
            ..Particle::default()
        }
    }

    #[test]
    fn test_strip_orders_oldest_first() {
        let particles = vec![
            particle(1, 0, 0.2, Vec3::X),
            particle(2, 0, 0.8, Vec3::ZERO),
            particle(3, 0, 0.5, Vec3::new(0.5, 0.0, 0.0)),
        ];
        let batch = pack_ribbons(&particles, 0.5);
        assert_eq!(batch.vertices.len(), 6);
        assert_eq!(batch.indices.len(), 12);
        // Oldest (age 0.8) leads the strip.
        assert_eq!(batch.vertices[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(batch.vertices[0].uv[0], 0.0);
        // Youngest ends it with uv.x = 1.
        assert_eq!(batch.vertices[4].position, [1.0, 0.0, 0.0]);
        assert_eq!(batch.vertices[4].uv[0], 1.0);
    }

    #[test]
    fn test_single_particle_ribbon_is_skipped() {
        let particles = vec![particle(1, 0, 0.5, Vec3::ZERO)];
        let batch = pack_ribbons(&particles, 0.5);
        assert!(batch.vertices.is_empty());
        assert!(batch.indices.is_empty());
    }

    #[test]
    fn test_ribbons_stay_separate() {
        let particles = vec![
            particle(1, 0, 0.9, Vec3::ZERO),
            particle(2, 0, 0.1, Vec3::X),
            particle(3, 1, 0.9, Vec3::Y),
            particle(4, 1, 0.1, Vec3::Z),
        ];
        let batch = pack_ribbons(&particles, 0.5);
        assert_eq!(batch.vertices.len(), 8);
        // Two segments, none bridging the strips.
        assert_eq!(batch.indices.len(), 12);
        let max_first_strip_index = 3;
        assert!(batch.indices[..6].iter().all(|&i| i <= max_first_strip_index));
        assert!(batch.indices[6..].iter().all(|&i| i >= 4));
    }

    #[test]
    fn test_ribbon_vertex_is_ten_floats() {
        assert_eq!(std::mem::size_of::<RibbonVertex>(), 10 * 4);
    }
}
