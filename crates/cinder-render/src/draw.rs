//! Draw descriptions handed to the host renderer.

use crate::gpu::GpuBufferHandle;

/// How sprite quads orient themselves in the host's vertex shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FacingMode {
    /// Face the camera.
    Camera = 0,
    /// Align the quad's up axis to particle velocity.
    Velocity = 1,
    /// Lie flat on the world XZ plane.
    Horizontal = 2,
    /// Stand upright on the world Y axis.
    Vertical = 3,
}

/// Pipeline-selection key for one draw item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKey {
    /// Camera-facing (or otherwise oriented) textured quads.
    Sprite(FacingMode),
    /// Instanced meshes.
    Mesh,
    /// Connected trail strips.
    Ribbon,
}

/// A range of bytes inside a driver buffer.
#[derive(Debug, Clone, Copy)]
pub struct BufferView {
    /// The backing buffer.
    pub buffer: GpuBufferHandle,
    /// Byte offset of the range.
    pub offset: u64,
    /// Byte length of the range.
    pub size: u64,
}

/// How many of what to draw.
#[derive(Debug, Clone, Copy)]
pub enum DrawArgs {
    /// Non-indexed draw.
    Linear {
        /// Vertices to draw.
        vertex_count: u32,
    },
    /// Indexed draw.
    Indexed {
        /// Indices to draw.
        index_count: u32,
    },
    /// Instanced draw over a shared mesh.
    Instanced {
        /// Instances to draw.
        instance_count: u32,
    },
}

/// One renderable batch produced by a packer.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    /// Vertex or instance data.
    pub vertices: BufferView,
    /// Index data for indexed draws.
    pub indices: Option<BufferView>,
    /// Draw call arguments.
    pub args: DrawArgs,
    /// Pipeline variant.
    pub key: VariantKey,
    /// Draw-order key copied from the emitter config.
    pub sort_key: i32,
}
