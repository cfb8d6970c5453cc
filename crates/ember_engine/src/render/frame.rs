//! Per-frame resources and the frame ring
//!
//! The ring holds N frames-in-flight worth of GPU resources. Each slot owns
//! its command buffer, sync primitives, uniform buffers, descriptor pool, and
//! render targets exclusively; nothing is shared between slots, so the CPU can
//! record into one slot while the GPU still executes another. Reuse of a slot
//! is gated on its completion fence.

use ash::{vk, Instance};
use bytemuck::{Pod, Zeroable};

use crate::render::error::RenderResult;
use crate::render::vulkan::buffer::{StagingBuffer, UniformBuffer};
use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::context::{PhysicalDeviceInfo, VulkanContext};
use crate::render::vulkan::descriptors::DescriptorPool;
use crate::render::vulkan::image::RenderImage;
use crate::render::vulkan::sync::{Fence, Semaphore};
use crate::scene::instance_table::MeshInstanceTable;

/// Per-frame shader data (elapsed and delta time)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Seconds since renderer init
    pub time: f32,
    /// Seconds since the previous frame
    pub delta_time: f32,
    _pad: [f32; 2],
}

impl FrameUniforms {
    /// Pack frame timing for upload
    pub fn new(time: f32, delta_time: f32) -> Self {
        Self {
            time,
            delta_time,
            _pad: [0.0; 2],
        }
    }
}

/// Parameters for the compute post-process pass
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PostProcessParams {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Effect strength in `[0, 1]`
    pub strength: f32,
    _pad: f32,
}

impl PostProcessParams {
    /// Pack post-process parameters for upload
    pub fn new(extent: vk::Extent2D, strength: f32) -> Self {
        Self {
            width: extent.width,
            height: extent.height,
            strength,
            _pad: 0.0,
        }
    }
}

/// Parameters for the infinite grid drawn in the debug pass
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GridParams {
    /// Combined view-projection matrix
    pub view_proj: [[f32; 4]; 4],
    /// Camera world position
    pub camera_pos: [f32; 3],
    /// Distance at which grid lines fade out
    pub fade_distance: f32,
}

/// Per-instance shader data, one dedicated uniform buffer per table slot
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InstanceUniforms {
    /// Model-view-projection matrix
    pub mvp: [[f32; 4]; 4],
}

/// Size-dependent render targets for one frame slot
///
/// Recreated wholesale on swapchain refresh.
pub struct FrameTargets {
    /// Multisampled color attachment for the forward pass
    pub msaa_color: RenderImage,
    /// Multisampled depth attachment for the forward pass
    pub msaa_depth: RenderImage,
    /// Single-sample color resolve target, input to post-processing
    pub resolve_color: RenderImage,
    /// Single-sample depth resolve target, reused by the debug pass
    pub resolve_depth: RenderImage,
    /// Post-process output, blitted to the swapchain at the end of the frame
    pub post_output: RenderImage,
}

impl FrameTargets {
    /// Create all targets for `extent`
    pub fn new(
        device: ash::Device,
        instance: &Instance,
        physical: &PhysicalDeviceInfo,
        extent: vk::Extent2D,
        color_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RenderResult<Self> {
        let msaa_color = RenderImage::new(
            device.clone(),
            instance,
            physical.device,
            extent,
            color_format,
            samples,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
            vk::ImageAspectFlags::COLOR,
        )?;
        let msaa_depth = RenderImage::new(
            device.clone(),
            instance,
            physical.device,
            extent,
            physical.depth_format,
            samples,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
                | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?;
        let resolve_color = RenderImage::new(
            device.clone(),
            instance,
            physical.device,
            extent,
            color_format,
            vk::SampleCountFlags::TYPE_1,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE,
            vk::ImageAspectFlags::COLOR,
        )?;
        let resolve_depth = RenderImage::new(
            device.clone(),
            instance,
            physical.device,
            extent,
            physical.depth_format,
            vk::SampleCountFlags::TYPE_1,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?;
        let post_output = RenderImage::new(
            device,
            instance,
            physical.device,
            extent,
            // UNORM rather than sRGB: storage images cannot have an sRGB view.
            vk::Format::B8G8R8A8_UNORM,
            vk::SampleCountFlags::TYPE_1,
            vk::ImageUsageFlags::STORAGE
                | vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_SRC,
            vk::ImageAspectFlags::COLOR,
        )?;

        Ok(Self {
            msaa_color,
            msaa_depth,
            resolve_color,
            resolve_depth,
            post_output,
        })
    }

    /// Extent shared by every target
    pub fn extent(&self) -> vk::Extent2D {
        self.post_output.extent()
    }
}

/// One ring slot's worth of per-frame resources
pub struct RenderFrame {
    /// Primary command buffer, reset (not freed) every cycle
    pub command_buffer: vk::CommandBuffer,
    /// Signaled when the presentation engine releases this slot's image
    pub image_ready: Semaphore,
    /// Signaled when this slot's GPU work finishes; presentation waits on it
    pub frame_completed: Semaphore,
    /// CPU-side gate for slot reuse
    pub completed_fence: Fence,
    /// Swapchain image acquired for this cycle; `None` before first acquire
    pub swapchain_image_index: Option<u32>,
    /// Frame timing uniforms
    pub frame_uniforms: UniformBuffer<FrameUniforms>,
    /// Post-process parameter uniforms
    pub post_params: UniformBuffer<PostProcessParams>,
    /// Grid parameter uniforms
    pub grid_params: UniformBuffer<GridParams>,
    /// One dedicated uniform buffer per instance-table slot
    pub instance_uniforms: Vec<UniformBuffer<InstanceUniforms>>,
    /// Staging buffer the instance MVPs are batch-written through
    pub instance_staging: StagingBuffer,
    /// Per-cycle descriptor pool, reset (not freed) every cycle
    pub descriptor_pool: DescriptorPool,
    /// Size-dependent render targets
    pub targets: FrameTargets,
    /// This cycle's resolved draw list
    pub instances: MeshInstanceTable,
}

impl RenderFrame {
    /// Create one ring slot's resources
    ///
    /// `instance_capacity` sizes the slot's instance table, uniform-buffer
    /// array, and staging buffer (`RendererConfig::max_mesh_instances`).
    pub fn new(
        ctx: &VulkanContext,
        command_pool: &CommandPool,
        instance_capacity: usize,
        extent: vk::Extent2D,
        color_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RenderResult<Self> {
        let device = ctx.raw_device();
        let instance = ctx.instance();

        let command_buffer = command_pool.allocate_command_buffers(1)?[0];

        let image_ready = Semaphore::new(device.clone())?;
        let frame_completed = Semaphore::new(device.clone())?;
        // Signaled so the first wait on this slot passes immediately.
        let completed_fence = Fence::new(device.clone(), true)?;

        let frame_uniforms = UniformBuffer::new(device.clone(), instance, ctx.physical.device)?;
        let post_params = UniformBuffer::new(device.clone(), instance, ctx.physical.device)?;
        let grid_params = UniformBuffer::new(device.clone(), instance, ctx.physical.device)?;

        let mut instance_uniforms = Vec::with_capacity(instance_capacity);
        for _ in 0..instance_capacity {
            instance_uniforms.push(UniformBuffer::new_transfer_dst(
                device.clone(),
                instance,
                ctx.physical.device,
            )?);
        }

        let instance_staging = StagingBuffer::new(
            device.clone(),
            instance,
            ctx.physical.device,
            (instance_capacity * std::mem::size_of::<InstanceUniforms>()) as vk::DeviceSize,
        )?;

        // Uniform sets for frame data, grid, instances, plus the post-process
        // compute set (two storage images + params).
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: instance_capacity as u32 + 8,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: 8,
            },
        ];
        let descriptor_pool = DescriptorPool::new(
            device.clone(),
            instance_capacity as u32 + 8,
            &pool_sizes,
        )?;

        let targets = FrameTargets::new(
            device,
            instance,
            &ctx.physical,
            extent,
            color_format,
            samples,
        )?;

        let instances = MeshInstanceTable::with_capacity(instance_capacity);

        Ok(Self {
            command_buffer,
            image_ready,
            frame_completed,
            completed_fence,
            swapchain_image_index: None,
            frame_uniforms,
            post_params,
            grid_params,
            instance_uniforms,
            instance_staging,
            descriptor_pool,
            targets,
            instances,
        })
    }
}

/// Ring index for a frame counter value
pub fn slot_for(counter: u64, frames_in_flight: usize) -> usize {
    (counter % frames_in_flight as u64) as usize
}

/// Round-robin collection of [`RenderFrame`]s
pub struct FrameRing {
    frames: Vec<RenderFrame>,
    counter: u64,
}

impl FrameRing {
    /// Build a ring of `frames_in_flight` slots
    pub fn new(
        ctx: &VulkanContext,
        command_pool: &CommandPool,
        frames_in_flight: usize,
        instance_capacity: usize,
        extent: vk::Extent2D,
        color_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RenderResult<Self> {
        let mut frames = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            frames.push(RenderFrame::new(
                ctx,
                command_pool,
                instance_capacity,
                extent,
                color_format,
                samples,
            )?);
        }
        Ok(Self { frames, counter: 0 })
    }

    /// Advance the counter and return the slot index to use this cycle
    pub fn advance(&mut self) -> usize {
        self.counter += 1;
        slot_for(self.counter, self.frames.len())
    }

    /// Gate on the slot's fence, then recycle its per-cycle resources
    ///
    /// This is the ring's backpressure point: the CPU blocks here until the
    /// GPU finished the work submitted for this slot N cycles ago. The wait is
    /// unbounded; a wedged driver is an accepted unrecoverable condition.
    ///
    /// The fence is only waited on here, never reset: the reset happens right
    /// before queue submission, so a cycle abandoned by an error between
    /// `begin_slot` and submit leaves the fence signaled and the slot
    /// reusable.
    pub fn begin_slot(&mut self, device: &ash::Device, slot: usize) -> RenderResult<()> {
        let frame = &mut self.frames[slot];

        frame.completed_fence.wait(u64::MAX)?;

        unsafe {
            device
                .reset_command_buffer(
                    frame.command_buffer,
                    vk::CommandBufferResetFlags::empty(),
                )
                .map_err(crate::render::error::RenderError::Api)?;
        }
        frame.descriptor_pool.reset()?;
        frame.instances.clear();
        frame.swapchain_image_index = None;

        Ok(())
    }

    /// Monotonic frame counter
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Number of ring slots
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Ring is never empty in practice
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Borrow a slot
    pub fn frame(&self, slot: usize) -> &RenderFrame {
        &self.frames[slot]
    }

    /// Mutably borrow a slot
    pub fn frame_mut(&mut self, slot: usize) -> &mut RenderFrame {
        &mut self.frames[slot]
    }

    /// Iterate all slots mutably (swapchain refresh rebuilds every target)
    pub fn frames_mut(&mut self) -> impl Iterator<Item = &mut RenderFrame> {
        self.frames.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn slot_cycles_through_ring() {
        assert_eq!(slot_for(1, 2), 1);
        assert_eq!(slot_for(2, 2), 0);
        assert_eq!(slot_for(3, 2), 1);
        assert_eq!(slot_for(4, 2), 0);

        for counter in 0..100u64 {
            assert_eq!(slot_for(counter, 3), (counter % 3) as usize);
        }
    }

    #[test]
    fn consecutive_frames_use_different_slots() {
        for n in 2..4usize {
            for counter in 0..32u64 {
                assert_ne!(slot_for(counter, n), slot_for(counter + 1, n));
            }
        }
    }

    #[test]
    fn uniform_structs_have_std140_compatible_sizes() {
        assert_eq!(mem::size_of::<FrameUniforms>(), 16);
        assert_eq!(mem::size_of::<PostProcessParams>(), 16);
        assert_eq!(mem::size_of::<GridParams>(), 80);
        assert_eq!(mem::size_of::<InstanceUniforms>(), 64);
    }

    #[test]
    fn uniform_structs_are_pod() {
        let frame = FrameUniforms::new(1.5, 0.016);
        let bytes: &[u8] = bytemuck::bytes_of(&frame);
        assert_eq!(bytes.len(), 16);

        let inst = InstanceUniforms {
            mvp: [[0.0; 4]; 4],
        };
        assert_eq!(bytemuck::bytes_of(&inst).len(), 64);
    }
}
