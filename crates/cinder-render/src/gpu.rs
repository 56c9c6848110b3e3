//! GPU buffer driver interface.
//!
//! The host renderer owns all real GPU objects. It binds three plain
//! function pointers (create / update / destroy) and the packers route
//! every buffer operation through them. An unbound slot surfaces as
//! [`RenderError::DriverNotBound`] rather than a crash, so prepare
//! calls made before the renderer is up fail cleanly.

use cinder_common::error::RenderError;
use tracing::debug;

/// Opaque host-side buffer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuBufferHandle(pub u64);

/// What a buffer will be bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BufferUsage {
    /// Vertex data.
    Vertex = 0,
    /// Index data.
    Index = 1,
    /// Per-instance data.
    Instance = 2,
}

/// Parameters for a buffer creation call.
#[derive(Debug, Clone, Copy)]
pub struct BufferCreateDesc {
    /// Size in bytes.
    pub size: u64,
    /// Bind usage.
    pub usage: BufferUsage,
}

/// Host-bound buffer callbacks.
///
/// `create` may refuse a request by returning `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpuBufferDriver {
    /// Creates a buffer and returns its handle.
    pub create: Option<fn(&BufferCreateDesc) -> Option<GpuBufferHandle>>,
    /// Uploads bytes at an offset into an existing buffer.
    pub update: Option<fn(GpuBufferHandle, u64, &[u8])>,
    /// Releases a buffer.
    pub destroy: Option<fn(GpuBufferHandle)>,
}

impl GpuBufferDriver {
    /// True once all three slots are bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.create.is_some() && self.update.is_some() && self.destroy.is_some()
    }
}

/// A driver-managed buffer that grows by re-creation.
#[derive(Debug)]
pub struct GpuBuffer {
    handle: GpuBufferHandle,
    capacity: u64,
    usage: BufferUsage,
}

impl GpuBuffer {
    /// Creates a buffer of at least `size` bytes.
    pub fn create(
        driver: &GpuBufferDriver,
        size: u64,
        usage: BufferUsage,
    ) -> Result<Self, RenderError> {
        let create = driver.create.ok_or(RenderError::DriverNotBound)?;
        let desc = BufferCreateDesc { size, usage };
        let handle = create(&desc).ok_or_else(|| {
            RenderError::BufferCreate(format!("driver refused {size} byte buffer"))
        })?;
        debug!(handle = handle.0, size, "created gpu buffer");
        Ok(Self {
            handle,
            capacity: size,
            usage,
        })
    }

    /// The host-side handle.
    #[must_use]
    pub fn handle(&self) -> GpuBufferHandle {
        self.handle
    }

    /// Current capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Uploads `data`, re-creating the buffer when it has outgrown it.
    pub fn upload(&mut self, driver: &GpuBufferDriver, data: &[u8]) -> Result<(), RenderError> {
        let update = driver.update.ok_or(RenderError::DriverNotBound)?;
        let size = data.len() as u64;
        if size > self.capacity {
            let destroy = driver.destroy.ok_or(RenderError::DriverNotBound)?;
            destroy(self.handle);
            // Grow past the request so steady growth does not re-create
            // every frame.
            let grown = Self::create(driver, size.next_power_of_two(), self.usage)?;
            self.handle = grown.handle;
            self.capacity = grown.capacity;
        }
        update(self.handle, 0, data);
        Ok(())
    }

    /// Releases the buffer through the driver.
    pub fn destroy(self, driver: &GpuBufferDriver) -> Result<(), RenderError> {
        let destroy = driver.destroy.ok_or(RenderError::DriverNotBound)?;
        destroy(self.handle);
        Ok(())
    }
}
