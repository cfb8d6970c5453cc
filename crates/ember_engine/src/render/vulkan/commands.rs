//! Command pool management
//!
//! One pool, created with `RESET_COMMAND_BUFFER`, serves every graphics
//! submission: the per-frame primary buffers are reset (not freed) each cycle,
//! and short-lived upload work goes through the single-time submit helper.

use ash::{vk, Device};

use crate::render::error::{RenderError, RenderResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a new command pool for the given queue family
    pub fn new(device: Device, queue_family_index: u32) -> RenderResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .map_err(RenderError::Api)?
        };

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> RenderResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let command_buffers = unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(RenderError::Api)?
        };

        Ok(command_buffers)
    }

    /// Record and submit a one-shot command buffer, blocking until it completes
    ///
    /// Used only for startup-time uploads (mesh buffers, the UI font atlas),
    /// never on the per-frame path.
    pub fn submit_single_time<F>(&self, queue: vk::Queue, record: F) -> RenderResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let command_buffer = self.allocate_command_buffers(1)?[0];

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(RenderError::Api)?;
        }

        record(&self.device, command_buffer);

        let result = unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(RenderError::Api)
                .and_then(|_| {
                    let command_buffers = [command_buffer];
                    let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
                    self.device
                        .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                        .map_err(RenderError::Api)
                })
                .and_then(|_| {
                    self.device
                        .queue_wait_idle(queue)
                        .map_err(RenderError::Api)
                })
        };

        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &[command_buffer]);
        }

        result
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // All command buffers must have completed; the renderer waits for
            // device idle before tearing anything down.
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
