//! ImGui draw-data rendering
//!
//! The engine only consumes [`imgui::DrawData`]; widget code lives with the
//! application. Vertex/index buffers are per ring slot and grow on demand so
//! the CPU never overwrites geometry a previous frame's GPU work may still be
//! reading.

use ash::{vk, Device};
use imgui::{DrawCmd, DrawData, DrawIdx, DrawVert};
use std::mem;
use std::path::Path;

use crate::render::error::{RenderError, RenderResult};
use crate::render::vulkan::buffer::Buffer;
use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::descriptors::{
    DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter,
};
use crate::render::vulkan::image::{upload_rgba_image, RenderImage};
use crate::render::vulkan::pipeline::{GraphicsPipeline, GraphicsPipelineBuilder};
use crate::render::vulkan::shader::{ShaderCompiler, ShaderModule, ShaderStage};

/// Scale + translate push constants for mapping ImGui space to clip space
#[repr(C)]
#[derive(Clone, Copy)]
struct UiPushConstants {
    scale: [f32; 2],
    translate: [f32; 2],
}

struct SlotBuffers {
    vertex: Option<Buffer>,
    vertex_capacity: usize,
    index: Option<Buffer>,
    index_capacity: usize,
}

impl SlotBuffers {
    fn empty() -> Self {
        Self {
            vertex: None,
            vertex_capacity: 0,
            index: None,
            index_capacity: 0,
        }
    }
}

/// Renders ImGui draw data inside the UI pass
pub struct UiRenderer {
    device: Device,
    pipeline: GraphicsPipeline,
    _layout: DescriptorSetLayout,
    _pool: DescriptorPool,
    font_set: vk::DescriptorSet,
    _font_image: RenderImage,
    sampler: vk::Sampler,
    buffers: Vec<SlotBuffers>,
}

impl UiRenderer {
    /// Build the UI pipeline and upload the font atlas
    pub fn new(
        ctx: &VulkanContext,
        command_pool: &CommandPool,
        compiler: &dyn ShaderCompiler,
        shader_dir: &Path,
        color_format: vk::Format,
        frames_in_flight: usize,
        imgui: &mut imgui::Context,
    ) -> RenderResult<Self> {
        let device = ctx.raw_device();

        let atlas = imgui.fonts().build_rgba32_texture();
        let font_image = upload_rgba_image(
            &device,
            ctx.instance(),
            ctx.physical.device,
            command_pool,
            ctx.device.graphics_queue,
            atlas.width,
            atlas.height,
            atlas.data,
        )?;

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE);
        let sampler = unsafe {
            device
                .create_sampler(&sampler_info, None)
                .map_err(RenderError::Api)?
        };

        let layout = DescriptorSetLayoutBuilder::new()
            .add_combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT)
            .build(&device)?;

        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: 1,
        }];
        let pool = DescriptorPool::new(device.clone(), 1, &pool_sizes)?;
        let font_set = pool.allocate(&[layout.handle()])?[0];

        DescriptorSetWriter::new()
            .write_combined_image_sampler(font_set, 0, font_image.view(), sampler)
            .update(&device);

        let vertex_shader = ShaderModule::load(
            device.clone(),
            compiler,
            ShaderStage::Vertex,
            &shader_dir.join("ui.vert.spv"),
        )?;
        let fragment_shader = ShaderModule::load(
            device.clone(),
            compiler,
            ShaderStage::Fragment,
            &shader_dir.join("ui.frag.spv"),
        )?;

        let bindings = vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: mem::size_of::<DrawVert>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let attributes = vec![
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 8,
            },
            vk::VertexInputAttributeDescription {
                location: 2,
                binding: 0,
                format: vk::Format::R8G8B8A8_UNORM,
                offset: 16,
            },
        ];

        let pipeline = GraphicsPipelineBuilder::new(&vertex_shader, &fragment_shader)
            .vertex_input(bindings, attributes)
            .color_format(color_format)
            .cull_mode(vk::CullModeFlags::NONE)
            .alpha_blending()
            .descriptor_set_layout(layout.handle())
            .push_constants(
                vk::ShaderStageFlags::VERTEX,
                mem::size_of::<UiPushConstants>() as u32,
            )
            .build(&device)?;

        let buffers = (0..frames_in_flight).map(|_| SlotBuffers::empty()).collect();

        imgui.fonts().tex_id = imgui::TextureId::from(usize::MAX);

        Ok(Self {
            device,
            pipeline,
            _layout: layout,
            _pool: pool,
            font_set,
            _font_image: font_image,
            sampler,
            buffers,
        })
    }

    /// Record `draw_data` into the current UI pass
    ///
    /// Must be called between `begin_ui_pass` and `end_ui_pass` for the slot
    /// whose fence has been waited on this cycle.
    pub fn render(
        &mut self,
        ctx: &VulkanContext,
        cmd: vk::CommandBuffer,
        slot: usize,
        draw_data: &DrawData,
    ) -> RenderResult<()> {
        if draw_data.total_vtx_count == 0 || draw_data.total_idx_count == 0 {
            return Ok(());
        }

        self.upload_geometry(ctx, slot, draw_data)?;
        let slot_buffers = &self.buffers[slot];
        let (Some(vertex), Some(index)) = (&slot_buffers.vertex, &slot_buffers.index) else {
            return Ok(());
        };

        let fb_width = draw_data.display_size[0] * draw_data.framebuffer_scale[0];
        let fb_height = draw_data.display_size[1] * draw_data.framebuffer_scale[1];
        if fb_width <= 0.0 || fb_height <= 0.0 {
            return Ok(());
        }

        let push = UiPushConstants {
            scale: [
                2.0 / draw_data.display_size[0],
                2.0 / draw_data.display_size[1],
            ],
            translate: [
                -1.0 - draw_data.display_pos[0] * (2.0 / draw_data.display_size[0]),
                -1.0 - draw_data.display_pos[1] * (2.0 / draw_data.display_size[1]),
            ],
        };

        unsafe {
            self.device.cmd_bind_pipeline(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.handle(),
            );
            self.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout(),
                0,
                &[self.font_set],
                &[],
            );
            let push_bytes = std::slice::from_raw_parts(
                &push as *const UiPushConstants as *const u8,
                mem::size_of::<UiPushConstants>(),
            );
            self.device.cmd_push_constants(
                cmd,
                self.pipeline.layout(),
                vk::ShaderStageFlags::VERTEX,
                0,
                push_bytes,
            );
            self.device
                .cmd_bind_vertex_buffers(cmd, 0, &[vertex.handle()], &[0]);
            self.device
                .cmd_bind_index_buffer(cmd, index.handle(), 0, vk::IndexType::UINT16);
        }

        let clip_off = draw_data.display_pos;
        let clip_scale = draw_data.framebuffer_scale;

        let mut vtx_base = 0i32;
        let mut idx_base = 0u32;
        for draw_list in draw_data.draw_lists() {
            for command in draw_list.commands() {
                match command {
                    DrawCmd::Elements { count, cmd_params } => {
                        let clip = cmd_params.clip_rect;
                        let x = ((clip[0] - clip_off[0]) * clip_scale[0]).max(0.0);
                        let y = ((clip[1] - clip_off[1]) * clip_scale[1]).max(0.0);
                        let w = ((clip[2] - clip_off[0]) * clip_scale[0]).min(fb_width) - x;
                        let h = ((clip[3] - clip_off[1]) * clip_scale[1]).min(fb_height) - y;
                        if w <= 0.0 || h <= 0.0 {
                            continue;
                        }

                        let scissor = vk::Rect2D {
                            offset: vk::Offset2D {
                                x: x as i32,
                                y: y as i32,
                            },
                            extent: vk::Extent2D {
                                width: w as u32,
                                height: h as u32,
                            },
                        };
                        unsafe {
                            self.device.cmd_set_scissor(cmd, 0, &[scissor]);
                            self.device.cmd_draw_indexed(
                                cmd,
                                count as u32,
                                1,
                                idx_base + cmd_params.idx_offset as u32,
                                vtx_base + cmd_params.vtx_offset as i32,
                                0,
                            );
                        }
                    }
                    DrawCmd::ResetRenderState => {}
                    DrawCmd::RawCallback { .. } => {}
                }
            }
            vtx_base += draw_list.vtx_buffer().len() as i32;
            idx_base += draw_list.idx_buffer().len() as u32;
        }

        Ok(())
    }

    fn upload_geometry(
        &mut self,
        ctx: &VulkanContext,
        slot: usize,
        draw_data: &DrawData,
    ) -> RenderResult<()> {
        let vtx_count = draw_data.total_vtx_count as usize;
        let idx_count = draw_data.total_idx_count as usize;
        let vtx_bytes = vtx_count * mem::size_of::<DrawVert>();
        let idx_bytes = idx_count * mem::size_of::<DrawIdx>();

        let slot_buffers = &mut self.buffers[slot];

        if slot_buffers.vertex_capacity < vtx_count {
            slot_buffers.vertex = Some(Buffer::new(
                self.device.clone(),
                ctx.instance(),
                ctx.physical.device,
                vtx_bytes as vk::DeviceSize,
                vk::BufferUsageFlags::VERTEX_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?);
            slot_buffers.vertex_capacity = vtx_count;
        }
        if slot_buffers.index_capacity < idx_count {
            slot_buffers.index = Some(Buffer::new(
                self.device.clone(),
                ctx.instance(),
                ctx.physical.device,
                idx_bytes as vk::DeviceSize,
                vk::BufferUsageFlags::INDEX_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?);
            slot_buffers.index_capacity = idx_count;
        }

        let mut vtx_data: Vec<u8> = Vec::with_capacity(vtx_bytes);
        let mut idx_data: Vec<u8> = Vec::with_capacity(idx_bytes);
        for draw_list in draw_data.draw_lists() {
            let vtx = draw_list.vtx_buffer();
            let idx = draw_list.idx_buffer();
            // DrawVert is repr(C) plain data; imgui just doesn't derive Pod.
            let vtx_slice = unsafe {
                std::slice::from_raw_parts(
                    vtx.as_ptr() as *const u8,
                    vtx.len() * mem::size_of::<DrawVert>(),
                )
            };
            vtx_data.extend_from_slice(vtx_slice);
            idx_data.extend_from_slice(bytemuck::cast_slice(idx));
        }

        if let Some(vertex) = &slot_buffers.vertex {
            vertex.write_bytes(&vtx_data)?;
        }
        if let Some(index) = &slot_buffers.index {
            index.write_bytes(&idx_data)?;
        }
        Ok(())
    }
}

impl Drop for UiRenderer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}
