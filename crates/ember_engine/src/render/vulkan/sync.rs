//! Vulkan synchronization primitives
//!
//! RAII wrappers for the two signal types the frame ring relies on: semaphores
//! for GPU→GPU ordering (image acquisition → color output, rendering → present)
//! and fences for GPU→CPU backpressure (the per-slot completion wait).

use ash::{vk, Device};

use crate::render::error::{RenderError, RenderResult};

/// GPU-GPU ordering signal with automatic cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> RenderResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(RenderError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-waitable fence with automatic cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> RenderResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(RenderError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Block until the fence signals
    ///
    /// The frame ring waits with `u64::MAX`: the design assumes submitted GPU
    /// work always completes, and a driver hang is an accepted unrecoverable
    /// condition with no timeout/recovery path.
    pub fn wait(&self, timeout: u64) -> RenderResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(RenderError::Api)
        }
    }

    /// Reset the fence to unsignaled
    pub fn reset(&self) -> RenderResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(RenderError::Api)
        }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}
