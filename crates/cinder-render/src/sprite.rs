//! Sprite (billboard quad) packing.
//!
//! Each particle becomes four vertices and six indices. The vertex
//! carries the particle center plus a corner offset; the host's vertex
//! shader expands the quad according to the draw item's [`FacingMode`].

use bytemuck::{Pod, Zeroable};
use cinder_common::error::RenderError;
use cinder_core::particle::Particle;

use crate::draw::{BufferView, DrawArgs, DrawItem, FacingMode, VariantKey};
use crate::gpu::{BufferUsage, GpuBuffer, GpuBufferDriver};

/// One sprite vertex, 12 floats.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SpriteVertex {
    /// Particle center in world space.
    pub position: [f32; 3],
    /// Quad size in world units.
    pub size: [f32; 2],
    /// Roll angle around the facing axis, radians.
    pub rotation: f32,
    /// RGBA color.
    pub color: [f32; 4],
    /// Frame-local texture coordinate of this corner.
    pub uv: [f32; 2],
}

/// Flipbook layout for sub-UV animated sprites.
#[derive(Debug, Clone, Copy)]
pub struct SubUvSheet {
    /// Frames along X.
    pub frames_x: u32,
    /// Frames along Y.
    pub frames_y: u32,
}

impl SubUvSheet {
    /// Maps a corner uv into the given frame's cell.
    #[must_use]
    pub fn frame_uv(&self, frame: u32, corner: [f32; 2]) -> [f32; 2] {
        let fx = self.frames_x.max(1);
        let fy = self.frames_y.max(1);
        let frame = frame % (fx * fy);
        let cell_w = 1.0 / fx as f32;
        let cell_h = 1.0 / fy as f32;
        let cx = (frame % fx) as f32 * cell_w;
        let cy = (frame / fx) as f32 * cell_h;
        [cx + corner[0] * cell_w, cy + corner[1] * cell_h]
    }
}

/// CPU-side output of a sprite pack.
#[derive(Debug, Default)]
pub struct SpriteBatch {
    /// Four vertices per particle.
    pub vertices: Vec<SpriteVertex>,
    /// Six indices per particle.
    pub indices: Vec<u32>,
}

const CORNERS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

/// Packs live particles into quad vertices and indices.
#[must_use]
pub fn pack_sprites(particles: &[Particle], sheet: Option<SubUvSheet>) -> SpriteBatch {
    let mut batch = SpriteBatch {
        vertices: Vec::with_capacity(particles.len() * 4),
        indices: Vec::with_capacity(particles.len() * 6),
    };
    for p in particles {
        let base = batch.vertices.len() as u32;
        for corner in CORNERS {
            let uv = match sheet {
                Some(sheet) => sheet.frame_uv(p.sub_uv_frame, corner),
                None => corner,
            };
            batch.vertices.push(SpriteVertex {
                position: p.global_position.to_array(),
                size: [p.scale.x, p.scale.y],
                rotation: p.rotation_angle,
                color: p.color.to_array(),
                uv,
            });
        }
        batch
            .indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }
    batch
}

/// Persistent GPU state for one sprite-rendered emitter.
#[derive(Debug, Default)]
pub struct SpriteRenderer {
    vertex_buffer: Option<GpuBuffer>,
    index_buffer: Option<GpuBuffer>,
}

impl SpriteRenderer {
    /// Creates an empty renderer; buffers appear on first prepare.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Packs, uploads and describes one frame's sprites.
    pub fn prepare(
        &mut self,
        driver: &GpuBufferDriver,
        particles: &[Particle],
        sheet: Option<SubUvSheet>,
        facing: FacingMode,
        sort_key: i32,
    ) -> Result<DrawItem, RenderError> {
        let batch = pack_sprites(particles, sheet);
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
            key: VariantKey::Sprite(facing),
            sort_key,
        })
    }
}

/// Uploads bytes into a lazily created driver buffer.
pub(crate) fn upload_into(
    slot: &mut Option<GpuBuffer>,
    driver: &GpuBufferDriver,
    bytes: &[u8],
    usage: BufferUsage,
) -> Result<BufferView, RenderError> {
    let buffer = match slot {
        Some(buffer) => buffer,
        None => {
            let size = (bytes.len() as u64).max(64);
            slot.insert(GpuBuffer::create(driver, size, usage)?)
        },
    };
    buffer.upload(driver, bytes)?;
    Ok(BufferView {
        buffer: buffer.handle(),
        offset: 0,
        size: bytes.len() as u64,
    })
}
