//! Vulkan primitives
//!
//! Thin RAII wrappers over raw Vulkan objects. Everything here is
//! policy-free; frame pacing, pass ordering, and resource recycling live one
//! layer up in the renderer.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptors;
pub mod image;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use buffer::{Buffer, StagingBuffer, UniformBuffer};
pub use commands::CommandPool;
pub use context::{LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanInstance};
pub use descriptors::{
    DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter,
};
pub use image::RenderImage;
pub use pipeline::{ComputePipeline, GraphicsPipeline, GraphicsPipelineBuilder};
pub use shader::{ShaderCompiler, ShaderModule, ShaderStage, SpirvDiskCompiler};
pub use swapchain::{AcquiredImage, Swapchain};
pub use sync::{Fence, Semaphore};
