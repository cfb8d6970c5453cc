//! The fixed per-frame pass pipeline
//!
//! Every acquired frame runs the same eight steps in the same order. The plan
//! and its image-layout transitions are plain data (testable without a
//! device); [`FrameRecorder`] turns them into commands. Getting the order and
//! the barrier stage masks right is the whole game here, so the layout chains
//! are written down once as constants instead of being scattered through the
//! recording code.

use ash::{vk, Device};

use crate::render::error::{RenderError, RenderResult};
use crate::render::frame::RenderFrame;
use crate::render::material::PassKind;
use crate::render::vulkan::image::image_layout_barrier;
use crate::scene::instance_table::{MeshInstanceFlags, MeshInstanceTable, PUSH_CONSTANT_BYTES};

/// One step of the per-frame pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    /// Upload frame timing uniforms and write the frame descriptor set
    UploadFrameData,
    /// Rebuild the slot's instance table from the scene plus collectors
    CollectInstances,
    /// Compute and upload per-instance MVPs through the staging buffer
    UploadInstanceData,
    /// MSAA forward pass with color and depth resolve
    ForwardPass,
    /// Compute post-process over the resolved color
    PostProcessPass,
    /// Debug/gizmo overlay on the post-process output
    DebugPass,
    /// Immediate-mode UI overlay
    UiPass,
    /// Blit to the swapchain image and present
    BlitAndPresent,
}

/// The fixed frame plan
pub fn frame_plan() -> [FrameStep; 8] {
    [
        FrameStep::UploadFrameData,
        FrameStep::CollectInstances,
        FrameStep::UploadInstanceData,
        FrameStep::ForwardPass,
        FrameStep::PostProcessPass,
        FrameStep::DebugPass,
        FrameStep::UiPass,
        FrameStep::BlitAndPresent,
    ]
}

/// Image a transition applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageRole {
    /// Multisampled forward color target
    MsaaColor,
    /// Multisampled forward depth target
    MsaaDepth,
    /// Single-sample color resolve target
    ResolveColor,
    /// Single-sample depth resolve target
    ResolveDepth,
    /// Post-process output image
    PostOutput,
    /// The acquired swapchain image
    SwapchainImage,
}

/// A planned image-layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Which image
    pub role: ImageRole,
    /// Layout before
    pub from: vk::ImageLayout,
    /// Layout after
    pub to: vk::ImageLayout,
}

const fn transition(role: ImageRole, from: vk::ImageLayout, to: vk::ImageLayout) -> Transition {
    Transition { role, from, to }
}

/// Targets are re-primed from UNDEFINED every frame; their previous contents
/// are never needed across frames.
const FORWARD_TRANSITIONS: [Transition; 4] = [
    transition(
        ImageRole::MsaaColor,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    ),
    transition(
        ImageRole::MsaaDepth,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
    ),
    transition(
        ImageRole::ResolveColor,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    ),
    transition(
        ImageRole::ResolveDepth,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
    ),
];

const POST_PROCESS_TRANSITIONS: [Transition; 2] = [
    transition(
        ImageRole::ResolveColor,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::GENERAL,
    ),
    transition(
        ImageRole::PostOutput,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::GENERAL,
    ),
];

const DEBUG_TRANSITIONS: [Transition; 1] = [transition(
    ImageRole::PostOutput,
    vk::ImageLayout::GENERAL,
    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
)];

const BLIT_TRANSITIONS: [Transition; 3] = [
    transition(
        ImageRole::PostOutput,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    ),
    transition(
        ImageRole::SwapchainImage,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    ),
    transition(
        ImageRole::SwapchainImage,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::PRESENT_SRC_KHR,
    ),
];

/// Transitions executed at the start of each step
pub fn step_transitions(step: FrameStep) -> &'static [Transition] {
    match step {
        FrameStep::ForwardPass => &FORWARD_TRANSITIONS,
        FrameStep::PostProcessPass => &POST_PROCESS_TRANSITIONS,
        FrameStep::DebugPass => &DEBUG_TRANSITIONS,
        FrameStep::BlitAndPresent => &BLIT_TRANSITIONS,
        _ => &[],
    }
}

/// Flattened transition sequence for one whole frame
pub fn frame_transitions() -> Vec<Transition> {
    frame_plan()
        .iter()
        .flat_map(|&step| step_transitions(step).iter().copied())
        .collect()
}

/// One draw call's worth of bindings, resolved from the instance table
#[derive(Clone, Copy)]
pub struct DrawEntry {
    /// Material pipeline for the pass being recorded
    pub pipeline: vk::Pipeline,
    /// Matching pipeline layout
    pub layout: vk::PipelineLayout,
    /// Per-instance descriptor set (MVP uniform)
    pub descriptor_set: vk::DescriptorSet,
    /// Mesh vertex buffer
    pub vertex_buffer: vk::Buffer,
    /// Mesh index buffer
    pub index_buffer: vk::Buffer,
    /// Indices to draw
    pub index_count: u32,
    /// Opaque per-draw push constant blob
    pub push_constants: [u8; PUSH_CONSTANT_BYTES],
}

/// Resolve the table into draw entries for `pass`, in slot order
///
/// `instance_sets[i]` is the descriptor set written for table slot `i`.
/// Instances whose material has no pipeline for `pass` are skipped, which is
/// how one table serves both the forward and the debug pass.
pub fn build_draw_list(
    table: &MeshInstanceTable,
    pass: PassKind,
    instance_sets: &[vk::DescriptorSet],
) -> Vec<DrawEntry> {
    let mut entries = Vec::new();
    for (slot, instance) in table.occupied() {
        if !instance.flags.contains(MeshInstanceFlags::VISIBLE) {
            continue;
        }
        let Some(pipeline) = instance.material.pipeline_for(pass) else {
            continue;
        };
        entries.push(DrawEntry {
            pipeline: pipeline.pipeline,
            layout: pipeline.layout,
            descriptor_set: instance_sets[slot],
            vertex_buffer: instance.mesh.vertex_buffer,
            index_buffer: instance.mesh.index_buffer,
            index_count: instance.mesh.index_count,
            push_constants: *instance.push_constants,
        });
    }
    entries
}

/// Records the planned steps into a frame's command buffer
pub struct FrameRecorder<'a> {
    device: &'a Device,
    cmd: vk::CommandBuffer,
    extent: vk::Extent2D,
}

impl<'a> FrameRecorder<'a> {
    /// Begin recording into the slot's command buffer
    pub fn begin(
        device: &'a Device,
        cmd: vk::CommandBuffer,
        extent: vk::Extent2D,
    ) -> RenderResult<Self> {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(RenderError::Api)?;
        }
        Ok(Self {
            device,
            cmd,
            extent,
        })
    }

    /// End recording
    pub fn end(self) -> RenderResult<()> {
        unsafe {
            self.device
                .end_command_buffer(self.cmd)
                .map_err(RenderError::Api)
        }
    }

    fn set_viewport_scissor(&self) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        };
        unsafe {
            self.device.cmd_set_viewport(self.cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(self.cmd, 0, &[scissor]);
        }
    }

    fn barrier(
        &self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barriers: &[vk::ImageMemoryBarrier],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                barriers,
            );
        }
    }

    /// Copy per-instance MVPs from the staging buffer into their dedicated
    /// uniform buffers, then fence the transfer against uniform reads
    pub fn record_instance_upload(&self, frame: &RenderFrame, instance_count: usize) {
        let stride = std::mem::size_of::<crate::render::frame::InstanceUniforms>() as vk::DeviceSize;
        unsafe {
            for i in 0..instance_count {
                let region = vk::BufferCopy {
                    src_offset: i as vk::DeviceSize * stride,
                    dst_offset: 0,
                    size: stride,
                };
                self.device.cmd_copy_buffer(
                    self.cmd,
                    frame.instance_staging.handle(),
                    frame.instance_uniforms[i].handle(),
                    &[region],
                );
            }

            if instance_count > 0 {
                let barrier = vk::MemoryBarrier::builder()
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::UNIFORM_READ)
                    .build();
                self.device.cmd_pipeline_barrier(
                    self.cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::VERTEX_SHADER,
                    vk::DependencyFlags::empty(),
                    &[barrier],
                    &[],
                    &[],
                );
            }
        }
    }

    /// Record the MSAA forward pass with color and depth resolve
    pub fn record_forward_pass(
        &self,
        frame: &RenderFrame,
        clear_color: [f32; 4],
        draws: &[DrawEntry],
    ) {
        let targets = &frame.targets;

        self.barrier(
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            &[
                image_layout_barrier(
                    targets.msaa_color.handle(),
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    vk::AccessFlags::empty(),
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                ),
                image_layout_barrier(
                    targets.msaa_depth.handle(),
                    vk::ImageAspectFlags::DEPTH,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                    vk::AccessFlags::empty(),
                    vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                ),
                image_layout_barrier(
                    targets.resolve_color.handle(),
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    vk::AccessFlags::empty(),
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                ),
                image_layout_barrier(
                    targets.resolve_depth.handle(),
                    vk::ImageAspectFlags::DEPTH,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                    vk::AccessFlags::empty(),
                    vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                ),
            ],
        );

        let color_attachment = vk::RenderingAttachmentInfo::builder()
            .image_view(targets.msaa_color.view())
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .resolve_mode(vk::ResolveModeFlags::AVERAGE)
            .resolve_image_view(targets.resolve_color.view())
            .resolve_image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            })
            .build();

        // MIN resolve keeps the nearest depth per pixel, which is what the
        // depth-tested debug pass wants.
        let depth_attachment = vk::RenderingAttachmentInfo::builder()
            .image_view(targets.msaa_depth.view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .resolve_mode(vk::ResolveModeFlags::MIN)
            .resolve_image_view(targets.resolve_depth.view())
            .resolve_image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });

        let color_attachments = [color_attachment];
        let rendering_info = vk::RenderingInfo::builder()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        unsafe {
            self.device.cmd_begin_rendering(self.cmd, &rendering_info);
        }
        self.set_viewport_scissor();
        self.record_draws(draws);
        unsafe {
            self.device.cmd_end_rendering(self.cmd);
        }
    }

    /// Record the compute post-process dispatch
    pub fn record_post_process(
        &self,
        frame: &RenderFrame,
        pipeline: vk::Pipeline,
        layout: vk::PipelineLayout,
        descriptor_set: vk::DescriptorSet,
    ) {
        let targets = &frame.targets;

        self.barrier(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            &[
                image_layout_barrier(
                    targets.resolve_color.handle(),
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    vk::ImageLayout::GENERAL,
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                    vk::AccessFlags::SHADER_READ,
                ),
                image_layout_barrier(
                    targets.post_output.handle(),
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::GENERAL,
                    vk::AccessFlags::empty(),
                    vk::AccessFlags::SHADER_WRITE,
                ),
            ],
        );

        unsafe {
            self.device
                .cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::COMPUTE, pipeline);
            self.device.cmd_bind_descriptor_sets(
                self.cmd,
                vk::PipelineBindPoint::COMPUTE,
                layout,
                0,
                &[descriptor_set],
                &[],
            );
            // 8x8 workgroups, rounded up to cover the whole extent.
            let group_x = (self.extent.width + 7) / 8;
            let group_y = (self.extent.height + 7) / 8;
            self.device.cmd_dispatch(self.cmd, group_x, group_y, 1);
        }
    }

    /// Record the debug/gizmo pass over the post-process output
    ///
    /// Loads (never clears) both attachments so debug geometry composites on
    /// top of the shaded scene and respects its depth.
    pub fn record_debug_pass(
        &self,
        frame: &RenderFrame,
        draws: &[DrawEntry],
        grid: Option<(vk::Pipeline, vk::PipelineLayout, vk::DescriptorSet)>,
    ) {
        let targets = &frame.targets;

        self.barrier(
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            &[image_layout_barrier(
                targets.post_output.handle(),
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::GENERAL,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::AccessFlags::SHADER_WRITE,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )],
        );

        let color_attachment = vk::RenderingAttachmentInfo::builder()
            .image_view(targets.post_output.view())
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE)
            .build();
        let depth_attachment = vk::RenderingAttachmentInfo::builder()
            .image_view(targets.resolve_depth.view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::DONT_CARE);

        let color_attachments = [color_attachment];
        let rendering_info = vk::RenderingInfo::builder()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        unsafe {
            self.device.cmd_begin_rendering(self.cmd, &rendering_info);
        }
        self.set_viewport_scissor();

        if let Some((pipeline, layout, set)) = grid {
            unsafe {
                self.device
                    .cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
                self.device.cmd_bind_descriptor_sets(
                    self.cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    0,
                    &[set],
                    &[],
                );
                // Fullscreen-ish quad generated in the vertex shader.
                self.device.cmd_draw(self.cmd, 6, 1, 0, 0);
            }
        }

        self.record_draws(draws);
        unsafe {
            self.device.cmd_end_rendering(self.cmd);
        }
    }

    /// Begin the UI pass; the caller records UI draw data inside it
    pub fn begin_ui_pass(&self, frame: &RenderFrame) {
        let color_attachment = vk::RenderingAttachmentInfo::builder()
            .image_view(frame.targets.post_output.view())
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE)
            .build();
        let color_attachments = [color_attachment];
        let rendering_info = vk::RenderingInfo::builder()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments);

        unsafe {
            self.device.cmd_begin_rendering(self.cmd, &rendering_info);
        }
        self.set_viewport_scissor();
    }

    /// End the UI pass
    pub fn end_ui_pass(&self) {
        unsafe {
            self.device.cmd_end_rendering(self.cmd);
        }
    }

    /// Blit the post-process output into the swapchain image and leave it
    /// ready for presentation
    ///
    /// A blit (not a copy) tolerates the format and extent differences between
    /// the offscreen target and whatever the surface negotiated.
    pub fn record_blit_to_swapchain(
        &self,
        frame: &RenderFrame,
        swapchain_image: vk::Image,
        swapchain_extent: vk::Extent2D,
    ) {
        let post_output = &frame.targets.post_output;

        self.barrier(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::TRANSFER,
            &[
                image_layout_barrier(
                    post_output.handle(),
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                    vk::AccessFlags::TRANSFER_READ,
                ),
                image_layout_barrier(
                    swapchain_image,
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::AccessFlags::empty(),
                    vk::AccessFlags::TRANSFER_WRITE,
                ),
            ],
        );

        let src_extent = post_output.extent();
        let subresource = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let blit = vk::ImageBlit {
            src_subresource: subresource,
            src_offsets: [
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: src_extent.width as i32,
                    y: src_extent.height as i32,
                    z: 1,
                },
            ],
            dst_subresource: subresource,
            dst_offsets: [
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: swapchain_extent.width as i32,
                    y: swapchain_extent.height as i32,
                    z: 1,
                },
            ],
        };

        unsafe {
            self.device.cmd_blit_image(
                self.cmd,
                post_output.handle(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                swapchain_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::LINEAR,
            );
        }

        self.barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            &[image_layout_barrier(
                swapchain_image,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::empty(),
            )],
        );
    }

    fn record_draws(&self, draws: &[DrawEntry]) {
        let mut bound_pipeline = vk::Pipeline::null();
        for draw in draws {
            unsafe {
                if draw.pipeline != bound_pipeline {
                    self.device.cmd_bind_pipeline(
                        self.cmd,
                        vk::PipelineBindPoint::GRAPHICS,
                        draw.pipeline,
                    );
                    bound_pipeline = draw.pipeline;
                }
                self.device.cmd_bind_descriptor_sets(
                    self.cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    draw.layout,
                    0,
                    &[draw.descriptor_set],
                    &[],
                );
                self.device.cmd_push_constants(
                    self.cmd,
                    draw.layout,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    &draw.push_constants,
                );
                self.device
                    .cmd_bind_vertex_buffers(self.cmd, 0, &[draw.vertex_buffer], &[0]);
                self.device.cmd_bind_index_buffer(
                    self.cmd,
                    draw.index_buffer,
                    0,
                    vk::IndexType::UINT32,
                );
                self.device
                    .cmd_draw_indexed(self.cmd, draw.index_count, 1, 0, 0, 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Mat4;
    use crate::render::material::tests_support::{stub_material, stub_mesh};
    use crate::render::material::{Material, PassPipeline};
    use std::sync::Arc;

    fn forward_material() -> Arc<Material> {
        Arc::new(Material::new(
            "forward".to_string(),
            [
                Some(PassPipeline {
                    pipeline: vk::Pipeline::null(),
                    layout: vk::PipelineLayout::null(),
                }),
                None,
            ],
        ))
    }

    #[test]
    fn plan_has_eight_fixed_steps() {
        let plan = frame_plan();
        assert_eq!(plan.len(), 8);
        assert_eq!(plan[0], FrameStep::UploadFrameData);
        assert_eq!(plan[3], FrameStep::ForwardPass);
        assert_eq!(plan[7], FrameStep::BlitAndPresent);
        // Deterministic across calls.
        assert_eq!(frame_plan(), plan);
    }

    #[test]
    fn forward_pass_primes_all_targets_from_undefined() {
        let transitions = step_transitions(FrameStep::ForwardPass);
        assert_eq!(transitions.len(), 4);
        assert!(transitions
            .iter()
            .all(|t| t.from == vk::ImageLayout::UNDEFINED));
        // Steps with no barriers report an empty (not missing) set.
        assert!(step_transitions(FrameStep::CollectInstances).is_empty());
    }

    #[test]
    fn transition_sequence_is_deterministic() {
        let a = frame_transitions();
        let b = frame_transitions();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn transitions_chain_per_image() {
        // Each image's transitions must form a chain: every `from` equals the
        // previous `to` for that image, starting from UNDEFINED.
        use std::collections::HashMap;
        let mut current: HashMap<ImageRole, vk::ImageLayout> = HashMap::new();
        for t in frame_transitions() {
            let entry = current
                .entry(t.role)
                .or_insert(vk::ImageLayout::UNDEFINED);
            if t.from != vk::ImageLayout::UNDEFINED {
                assert_eq!(*entry, t.from, "broken layout chain for {:?}", t.role);
            }
            *entry = t.to;
        }
        assert_eq!(
            current[&ImageRole::SwapchainImage],
            vk::ImageLayout::PRESENT_SRC_KHR
        );
    }

    #[test]
    fn upload_steps_precede_all_gpu_passes() {
        let plan = frame_plan();
        let forward = plan
            .iter()
            .position(|&s| s == FrameStep::ForwardPass)
            .unwrap();
        let upload = plan
            .iter()
            .position(|&s| s == FrameStep::UploadInstanceData)
            .unwrap();
        let collect = plan
            .iter()
            .position(|&s| s == FrameStep::CollectInstances)
            .unwrap();
        assert!(collect < upload);
        assert!(upload < forward);
    }

    #[test]
    fn empty_table_yields_no_draws() {
        let table = MeshInstanceTable::with_capacity(8);
        let sets = vec![vk::DescriptorSet::null(); 8];
        assert!(build_draw_list(&table, PassKind::Forward, &sets).is_empty());
        assert!(build_draw_list(&table, PassKind::Debug, &sets).is_empty());
        // The plan itself is unchanged by scene contents.
        assert_eq!(frame_plan().len(), 8);
    }

    #[test]
    fn draw_list_skips_materials_without_pass_pipeline() {
        let mut table = MeshInstanceTable::with_capacity(8);
        table
            .add(
                stub_mesh(),
                forward_material(),
                [0u8; PUSH_CONSTANT_BYTES],
                Mat4::identity(),
                MeshInstanceFlags::VISIBLE,
            )
            .unwrap();
        table
            .add(
                stub_mesh(),
                stub_material(),
                [0u8; PUSH_CONSTANT_BYTES],
                Mat4::identity(),
                MeshInstanceFlags::VISIBLE,
            )
            .unwrap();

        let sets = vec![vk::DescriptorSet::null(); 8];
        let forward = build_draw_list(&table, PassKind::Forward, &sets);
        assert_eq!(forward.len(), 1);
        let debug = build_draw_list(&table, PassKind::Debug, &sets);
        assert!(debug.is_empty());
    }

    #[test]
    fn draw_list_is_slot_ordered_and_stable() {
        let mut table = MeshInstanceTable::with_capacity(8);
        let mut blob = [0u8; PUSH_CONSTANT_BYTES];
        for i in 0..4u8 {
            blob[0] = i;
            table
                .add(
                    stub_mesh(),
                    forward_material(),
                    blob,
                    Mat4::identity(),
                    MeshInstanceFlags::VISIBLE,
                )
                .unwrap();
        }

        let sets = vec![vk::DescriptorSet::null(); 8];
        let first = build_draw_list(&table, PassKind::Forward, &sets);
        let second = build_draw_list(&table, PassKind::Forward, &sets);
        assert_eq!(first.len(), 4);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.push_constants, b.push_constants);
        }
        for (i, entry) in first.iter().enumerate() {
            assert_eq!(entry.push_constants[0], i as u8);
        }
    }
}
