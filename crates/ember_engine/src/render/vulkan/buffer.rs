//! Buffer management
//!
//! Host-visible buffers (uniforms, staging) are RAII-owned wrappers mutated
//! from the CPU every frame. Device-local mesh data goes through the staging
//! upload protocol: write into a host-visible staging buffer, then one-shot
//! copy on the graphics queue.

use ash::{vk, Device, Instance};
use std::mem;

use crate::render::error::{RenderError, RenderResult};
use crate::render::vulkan::commands::CommandPool;

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<Self> {
        let (buffer, memory) = create_raw_buffer(
            &device,
            instance,
            physical_device,
            size,
            usage,
            properties,
        )?;

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Write plain-old-data into the buffer (host-visible memory only)
    pub fn write_data<T: bytemuck::Pod>(&self, data: &[T]) -> RenderResult<()> {
        self.write_bytes(bytemuck::cast_slice(data))
    }

    /// Write raw bytes into the buffer (host-visible memory only)
    ///
    /// Errors if `bytes` is larger than the buffer.
    pub fn write_bytes(&self, bytes: &[u8]) -> RenderResult<()> {
        ensure_write_fits(bytes.len(), self.size)?;
        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(RenderError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped as *mut u8, bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Uniform buffer for a single shader-visible struct
pub struct UniformBuffer<T: bytemuck::Pod> {
    buffer: Buffer,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: bytemuck::Pod> UniformBuffer<T> {
    /// Create a host-visible uniform buffer sized for `T`
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
    ) -> RenderResult<Self> {
        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        Ok(Self {
            buffer,
            _phantom: std::marker::PhantomData,
        })
    }

    /// Create a uniform buffer that is also a transfer destination
    ///
    /// Used for the per-instance MVP buffers, which are filled by a
    /// buffer-to-buffer copy from the frame's staging buffer rather than by a
    /// CPU map.
    pub fn new_transfer_dst(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
    ) -> RenderResult<Self> {
        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        Ok(Self {
            buffer,
            _phantom: std::marker::PhantomData,
        })
    }

    /// Update uniform data (host-visible buffers only)
    pub fn update(&self, data: &T) -> RenderResult<()> {
        self.buffer.write_data(std::slice::from_ref(data))
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Size of the uniform struct in bytes
    pub fn range(&self) -> vk::DeviceSize {
        mem::size_of::<T>() as vk::DeviceSize
    }
}

/// Host-visible staging buffer for batched uploads
pub struct StagingBuffer {
    buffer: Buffer,
}

impl StagingBuffer {
    /// Create a staging buffer of `size` bytes
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
    ) -> RenderResult<Self> {
        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        Ok(Self { buffer })
    }

    /// Write plain-old-data at the start of the staging buffer
    pub fn write<T: bytemuck::Pod>(&self, data: &[T]) -> RenderResult<()> {
        self.buffer.write_data(data)
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

/// Reject writes that would run past the end of a buffer's allocation
fn ensure_write_fits(len: usize, size: vk::DeviceSize) -> RenderResult<()> {
    if len as vk::DeviceSize > size {
        return Err(RenderError::InvalidOperation {
            reason: format!("write of {} bytes exceeds buffer size {}", len, size),
        });
    }
    Ok(())
}

/// Create an unmanaged buffer + memory pair
///
/// Raw variant for resources whose lifetime is owned by the resource system
/// (mesh vertex/index buffers) rather than by an RAII wrapper.
pub(crate) fn create_raw_buffer(
    device: &Device,
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    properties: vk::MemoryPropertyFlags,
) -> RenderResult<(vk::Buffer, vk::DeviceMemory)> {
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe {
        device
            .create_buffer(&buffer_info, None)
            .map_err(RenderError::Api)?
    };

    let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

    let memory_type_index = find_memory_type(
        instance,
        physical_device,
        mem_requirements.memory_type_bits,
        properties,
    )?;

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(mem_requirements.size)
        .memory_type_index(memory_type_index);

    let memory = unsafe {
        device
            .allocate_memory(&alloc_info, None)
            .map_err(RenderError::Api)?
    };

    unsafe {
        device
            .bind_buffer_memory(buffer, memory, 0)
            .map_err(RenderError::Api)?;
    }

    Ok((buffer, memory))
}

/// Upload `bytes` into a new device-local buffer via the staging protocol
pub(crate) fn upload_device_local(
    device: &Device,
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    command_pool: &CommandPool,
    queue: vk::Queue,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> RenderResult<(vk::Buffer, vk::DeviceMemory)> {
    let size = bytes.len() as vk::DeviceSize;

    let staging = StagingBuffer::new(device.clone(), instance, physical_device, size)?;
    staging.write(bytes)?;

    let (buffer, memory) = create_raw_buffer(
        device,
        instance,
        physical_device,
        size,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    command_pool.submit_single_time(queue, |device, cmd| {
        let region = vk::BufferCopy::builder().size(size).build();
        unsafe {
            device.cmd_copy_buffer(cmd, staging.handle(), buffer, &[region]);
        }
    })?;

    Ok((buffer, memory))
}

/// Find memory type with required properties
pub(crate) fn find_memory_type(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> RenderResult<u32> {
    let mem_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

    for i in 0..mem_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && (mem_properties.memory_types[i as usize].property_flags & properties) == properties
        {
            return Ok(i);
        }
    }

    Err(RenderError::NoSuitableMemoryType)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_write_is_rejected() {
        assert!(ensure_write_fits(16, 16).is_ok());
        assert!(ensure_write_fits(0, 16).is_ok());
        assert!(matches!(
            ensure_write_fits(17, 16),
            Err(RenderError::InvalidOperation { .. })
        ));
    }
}
