//! The renderer
//!
//! Owns every Vulkan resource and drives the per-frame cycle: advance the
//! ring, gate on the slot's fence, acquire a swapchain image, run the fixed
//! pass pipeline, submit, present. Swapchain staleness is the one recoverable
//! failure; it is handled inline by a synchronous refresh and never surfaced
//! to the caller.

use ash::vk;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RendererConfig;
use crate::math::{Mat4, Vec3};
use crate::render::error::{RenderError, RenderResult};
use crate::render::frame::{
    FrameRing, FrameTargets, FrameUniforms, GridParams, InstanceUniforms, PostProcessParams,
};
use crate::render::material::{
    GpuMesh, Material, MaterialDesc, PassKind, PassPipeline, PassShaders, Vertex, PASS_COUNT,
};
use crate::render::passes::{build_draw_list, FrameRecorder};
use crate::render::ui::UiRenderer;
use crate::render::vulkan::buffer::upload_device_local;
use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::descriptors::{
    DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter,
};
use crate::render::vulkan::pipeline::{ComputePipeline, GraphicsPipeline, GraphicsPipelineBuilder};
use crate::render::vulkan::shader::{ShaderCompiler, ShaderModule, ShaderStage};
use crate::render::vulkan::swapchain::Swapchain;
use crate::render::window::RenderWindow;
use crate::scene::instance_table::{MeshInstanceTable, PUSH_CONSTANT_BYTES};
use crate::scene::Scene;

/// Offscreen color format for the forward/post targets
///
/// UNORM rather than the (usually sRGB) swapchain format because the
/// post-process pass binds these images as storage, which sRGB formats do not
/// support. The final blit converts into whatever the surface negotiated.
const OFFSCREEN_COLOR_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;

/// Callback contributing transient draw instances to the current frame
pub type MeshInstanceCollector = Box<dyn FnMut(&mut MeshInstanceTable) -> RenderResult<()>>;

/// Top-level renderer
///
/// Field order is drop order: per-frame resources and pipelines go before the
/// swapchain, the command pool before the device, the context last.
pub struct Renderer {
    ui: Option<UiRenderer>,
    ring: FrameRing,
    grid_pipeline: GraphicsPipeline,
    post_pipeline: ComputePipeline,
    instance_set_layout: DescriptorSetLayout,
    post_set_layout: DescriptorSetLayout,
    grid_set_layout: DescriptorSetLayout,
    swapchain: Swapchain,
    command_pool: CommandPool,

    scene: Scene,
    collectors: Vec<MeshInstanceCollector>,
    meshes: Vec<Arc<GpuMesh>>,
    materials: Vec<Arc<Material>>,

    compiler: Box<dyn ShaderCompiler>,
    shader_dir: PathBuf,
    config: RendererConfig,
    msaa_samples: vk::SampleCountFlags,

    view: Mat4,
    projection: Mat4,
    camera_position: Vec3,
    time: f32,
    delta_time: f32,
    post_strength: f32,

    window_extent: vk::Extent2D,
    refresh_needed: bool,
    current_slot: Option<usize>,

    ctx: VulkanContext,
}

impl Renderer {
    /// Initialize the renderer against a window
    pub fn new(
        window: &dyn RenderWindow,
        config: RendererConfig,
        compiler: Box<dyn ShaderCompiler>,
        shader_dir: PathBuf,
    ) -> RenderResult<Self> {
        let ctx = VulkanContext::new(window, &config.application_name, config.enable_validation)?;
        let device = ctx.raw_device();

        let command_pool = CommandPool::new(device.clone(), ctx.device.graphics_family)?;

        let (width, height) = window.framebuffer_size();
        let window_extent = vk::Extent2D { width, height };
        let swapchain = Swapchain::new(
            device.clone(),
            ctx.device.swapchain_loader.clone(),
            ctx.surface,
            &ctx.surface_loader,
            &ctx.physical,
            window_extent,
            None,
        )?;

        let msaa_samples = clamp_samples(config.msaa_samples, ctx.physical.max_msaa_samples);
        log::info!(
            "Renderer init: {}x{}, {:?} MSAA, {} frames in flight",
            swapchain.extent().width,
            swapchain.extent().height,
            msaa_samples,
            config.frames_in_flight
        );

        let instance_set_layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .build(&device)?;
        let post_set_layout = DescriptorSetLayoutBuilder::new()
            .add_storage_image(0, vk::ShaderStageFlags::COMPUTE)
            .add_storage_image(1, vk::ShaderStageFlags::COMPUTE)
            .add_uniform_buffer(2, vk::ShaderStageFlags::COMPUTE)
            .add_uniform_buffer(3, vk::ShaderStageFlags::COMPUTE)
            .build(&device)?;
        let grid_set_layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .build(&device)?;

        let post_shader = ShaderModule::load(
            device.clone(),
            compiler.as_ref(),
            ShaderStage::Compute,
            &shader_dir.join("post.comp.spv"),
        )?;
        let post_pipeline =
            ComputePipeline::new(device.clone(), &post_shader, &[post_set_layout.handle()])?;

        let grid_vert = ShaderModule::load(
            device.clone(),
            compiler.as_ref(),
            ShaderStage::Vertex,
            &shader_dir.join("grid.vert.spv"),
        )?;
        let grid_frag = ShaderModule::load(
            device.clone(),
            compiler.as_ref(),
            ShaderStage::Fragment,
            &shader_dir.join("grid.frag.spv"),
        )?;
        let grid_pipeline = GraphicsPipelineBuilder::new(&grid_vert, &grid_frag)
            .color_format(OFFSCREEN_COLOR_FORMAT)
            .depth_format(ctx.physical.depth_format)
            .depth_read_only()
            .cull_mode(vk::CullModeFlags::NONE)
            .alpha_blending()
            .descriptor_set_layout(grid_set_layout.handle())
            .build(&device)?;

        let ring = FrameRing::new(
            &ctx,
            &command_pool,
            config.frames_in_flight,
            config.max_mesh_instances,
            swapchain.extent(),
            OFFSCREEN_COLOR_FORMAT,
            msaa_samples,
        )?;

        let scene = Scene::with_capacity(config.max_mesh_instances);

        Ok(Self {
            ui: None,
            ring,
            grid_pipeline,
            post_pipeline,
            instance_set_layout,
            post_set_layout,
            grid_set_layout,
            swapchain,
            command_pool,
            scene,
            collectors: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            compiler,
            shader_dir,
            config,
            msaa_samples,
            view: Mat4::identity(),
            projection: Mat4::identity(),
            camera_position: Vec3::new(0.0, 0.0, 0.0),
            time: 0.0,
            delta_time: 0.0,
            post_strength: 1.0,
            window_extent,
            refresh_needed: false,
            current_slot: None,
            ctx,
        })
    }

    /// Build the UI pipeline and font atlas for an ImGui context
    pub fn init_ui(&mut self, imgui: &mut imgui::Context) -> RenderResult<()> {
        let ui = UiRenderer::new(
            &self.ctx,
            &self.command_pool,
            self.compiler.as_ref(),
            &self.shader_dir,
            OFFSCREEN_COLOR_FORMAT,
            self.ring.len(),
            imgui,
        )?;
        self.ui = Some(ui);
        Ok(())
    }

    /// Upload mesh data and register it with the renderer
    pub fn create_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> RenderResult<Arc<GpuMesh>> {
        let device = self.ctx.raw_device();
        let (vertex_buffer, vertex_memory) = upload_device_local(
            &device,
            self.ctx.instance(),
            self.ctx.physical.device,
            &self.command_pool,
            self.ctx.device.graphics_queue,
            bytemuck::cast_slice(vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let (index_buffer, index_memory) = upload_device_local(
            &device,
            self.ctx.instance(),
            self.ctx.physical.device,
            &self.command_pool,
            self.ctx.device.graphics_queue,
            bytemuck::cast_slice(indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        let mesh = Arc::new(GpuMesh {
            vertex_buffer,
            vertex_memory,
            index_buffer,
            index_memory,
            index_count: indices.len() as u32,
        });
        self.meshes.push(mesh.clone());
        log::debug!(
            "Created mesh: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );
        Ok(mesh)
    }

    /// Build a material's pass pipelines and register it with the renderer
    pub fn create_material(&mut self, desc: &MaterialDesc) -> RenderResult<Arc<Material>> {
        let mut passes: [Option<PassPipeline>; PASS_COUNT] = [None, None];
        if let Some(shaders) = &desc.forward {
            passes[PassKind::Forward.index()] =
                Some(self.build_pass_pipeline(shaders, PassKind::Forward, desc)?);
        }
        if let Some(shaders) = &desc.debug {
            passes[PassKind::Debug.index()] =
                Some(self.build_pass_pipeline(shaders, PassKind::Debug, desc)?);
        }

        let material = Arc::new(Material::new(desc.name.clone(), passes));
        self.materials.push(material.clone());
        log::info!("Created material '{}'", desc.name);
        Ok(material)
    }

    fn build_pass_pipeline(
        &self,
        shaders: &PassShaders,
        pass: PassKind,
        desc: &MaterialDesc,
    ) -> RenderResult<PassPipeline> {
        let device = self.ctx.raw_device();
        let vertex = ShaderModule::load(
            device.clone(),
            self.compiler.as_ref(),
            ShaderStage::Vertex,
            &shaders.vertex,
        )?;
        let fragment = ShaderModule::load(
            device.clone(),
            self.compiler.as_ref(),
            ShaderStage::Fragment,
            &shaders.fragment,
        )?;

        // Forward draws into the MSAA targets; debug draws into the
        // single-sample post output, testing against the resolved depth.
        let samples = match pass {
            PassKind::Forward => self.msaa_samples,
            PassKind::Debug => vk::SampleCountFlags::TYPE_1,
        };

        let mut builder = GraphicsPipelineBuilder::new(&vertex, &fragment)
            .vertex_input(
                vec![Vertex::binding_description()],
                Vertex::attribute_descriptions(),
            )
            .color_format(OFFSCREEN_COLOR_FORMAT)
            .depth_format(self.ctx.physical.depth_format)
            .samples(samples)
            .descriptor_set_layout(self.instance_set_layout.handle())
            .push_constants(
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                PUSH_CONSTANT_BYTES as u32,
            );

        if pass == PassKind::Debug {
            builder = builder.depth_read_only();
        }
        if desc.double_sided {
            builder = builder.cull_mode(vk::CullModeFlags::NONE);
        }
        if desc.wireframe {
            builder = builder.polygon_mode(vk::PolygonMode::LINE);
        }

        let (pipeline, layout) = builder.build_raw(&device)?;
        Ok(PassPipeline { pipeline, layout })
    }

    /// Register a callback that appends transient instances each frame
    pub fn register_collector(&mut self, collector: MeshInstanceCollector) {
        self.collectors.push(collector);
    }

    /// The persistent scene
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable access to the persistent scene (between frames only)
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Set the camera for subsequent frames
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4, position: Vec3) {
        self.view = view;
        self.projection = projection;
        self.camera_position = position;
    }

    /// Set the post-process effect strength
    pub fn set_post_strength(&mut self, strength: f32) {
        self.post_strength = strength.clamp(0.0, 1.0);
    }

    /// Tell the renderer the window was resized
    pub fn notify_resize(&mut self, width: u32, height: u32) {
        self.window_extent = vk::Extent2D { width, height };
        self.refresh_needed = true;
    }

    /// Advance frame timing
    pub fn update(&mut self, dt: f32) {
        self.time += dt;
        self.delta_time = dt;
    }

    /// Advance the ring, recycle the slot, and acquire a swapchain image
    ///
    /// Blocks on the slot's completion fence; this is where the CPU is held
    /// to at most N frames ahead of the GPU.
    pub fn begin_frame(&mut self) -> RenderResult<()> {
        if self.current_slot.is_some() {
            return Err(RenderError::InvalidOperation {
                reason: "begin_frame called twice without render_frame".to_string(),
            });
        }

        if self.refresh_needed {
            self.refresh_swapchain()?;
            self.refresh_needed = false;
        }

        let slot = self.ring.advance();
        let device = self.ctx.raw_device();
        self.ring.begin_slot(&device, slot)?;

        // Out-of-date at acquire time gets one synchronous refresh + retry.
        for attempt in 0..2 {
            let semaphore = self.ring.frame(slot).image_ready.handle();
            match self.swapchain.acquire_next_image(semaphore)? {
                Some(acquired) => {
                    if acquired.suboptimal {
                        self.refresh_needed = true;
                    }
                    self.ring.frame_mut(slot).swapchain_image_index = Some(acquired.index);
                    break;
                }
                None if attempt == 0 => {
                    log::debug!("Swapchain out of date at acquire, refreshing");
                    self.refresh_swapchain()?;
                }
                None => {
                    return Err(RenderError::InvalidOperation {
                        reason: "swapchain still out of date after refresh".to_string(),
                    });
                }
            }
        }

        self.current_slot = Some(slot);
        Ok(())
    }

    /// Record, submit, and present the current frame
    ///
    /// `draw_data` is the UI's recorded output for this frame, if any.
    pub fn render_frame(&mut self, draw_data: Option<&imgui::DrawData>) -> RenderResult<()> {
        let slot = self.current_slot.take().ok_or(RenderError::InvalidOperation {
            reason: "render_frame called without begin_frame".to_string(),
        })?;

        let device = self.ctx.raw_device();
        let view_proj = self.projection * self.view;

        // -- CPU side: uniforms, instance collection, MVP staging --
        {
            let frame = self.ring.frame_mut(slot);
            frame
                .frame_uniforms
                .update(&FrameUniforms::new(self.time, self.delta_time))?;
            frame.post_params.update(&PostProcessParams::new(
                frame.targets.extent(),
                self.post_strength,
            ))?;
            frame.grid_params.update(&GridParams {
                view_proj: view_proj.into(),
                camera_pos: self.camera_position.into(),
                fade_distance: 100.0,
            })?;

            collect_instances(&mut frame.instances, self.scene.instances(), &mut self.collectors)?;

            let mvps: Vec<InstanceUniforms> = frame
                .instances
                .occupied()
                .map(|(_, inst)| InstanceUniforms {
                    mvp: (view_proj * inst.transform).into(),
                })
                .collect();
            if !mvps.is_empty() {
                frame.instance_staging.write(&mvps)?;
            }
        }

        // -- Descriptor sets for this cycle --
        let (instance_sets_by_slot, instance_count) = {
            let frame = self.ring.frame(slot);
            let occupied_slots: Vec<usize> =
                frame.instances.occupied().map(|(s, _)| s).collect();
            let count = occupied_slots.len();

            let mut by_slot = vec![vk::DescriptorSet::null(); frame.instances.capacity()];
            if count > 0 {
                let layouts = vec![self.instance_set_layout.handle(); count];
                let sets = frame.descriptor_pool.allocate(&layouts)?;
                let mut writer = DescriptorSetWriter::new();
                for (i, &set) in sets.iter().enumerate() {
                    writer = writer.write_uniform_buffer(
                        set,
                        0,
                        frame.instance_uniforms[i].handle(),
                        frame.instance_uniforms[i].range(),
                    );
                    by_slot[occupied_slots[i]] = set;
                }
                writer.update(&device);
            }
            (by_slot, count)
        };

        let (post_set, grid_set) = {
            let frame = self.ring.frame(slot);
            let sets = frame
                .descriptor_pool
                .allocate(&[self.post_set_layout.handle(), self.grid_set_layout.handle()])?;
            DescriptorSetWriter::new()
                .write_storage_image(sets[0], 0, frame.targets.resolve_color.view())
                .write_storage_image(sets[0], 1, frame.targets.post_output.view())
                .write_uniform_buffer(sets[0], 2, frame.post_params.handle(), frame.post_params.range())
                .write_uniform_buffer(
                    sets[0],
                    3,
                    frame.frame_uniforms.handle(),
                    frame.frame_uniforms.range(),
                )
                .write_uniform_buffer(sets[1], 0, frame.grid_params.handle(), frame.grid_params.range())
                .update(&device);
            (sets[0], sets[1])
        };

        // -- GPU side: record the fixed pass pipeline --
        let frame = self.ring.frame(slot);
        let image_index = frame.swapchain_image_index.ok_or(RenderError::InvalidOperation {
            reason: "no swapchain image acquired for this frame".to_string(),
        })?;
        let extent = frame.targets.extent();

        let forward_draws = build_draw_list(&frame.instances, PassKind::Forward, &instance_sets_by_slot);
        let debug_draws = build_draw_list(&frame.instances, PassKind::Debug, &instance_sets_by_slot);

        let recorder = FrameRecorder::begin(&device, frame.command_buffer, extent)?;
        recorder.record_instance_upload(frame, instance_count);
        recorder.record_forward_pass(frame, self.config.clear_color, &forward_draws);
        recorder.record_post_process(
            frame,
            self.post_pipeline.handle(),
            self.post_pipeline.layout(),
            post_set,
        );
        recorder.record_debug_pass(
            frame,
            &debug_draws,
            Some((
                self.grid_pipeline.handle(),
                self.grid_pipeline.layout(),
                grid_set,
            )),
        );

        if let Some(draw_data) = draw_data {
            recorder.begin_ui_pass(frame);
            if let Some(ui) = self.ui.as_mut() {
                ui.render(&self.ctx, frame.command_buffer, slot, draw_data)?;
            } else {
                log::warn!("UI draw data supplied but init_ui was never called");
            }
            recorder.end_ui_pass();
        }

        let frame = self.ring.frame(slot);
        recorder.record_blit_to_swapchain(
            frame,
            self.swapchain.image(image_index),
            self.swapchain.extent(),
        );
        recorder.end()?;

        // -- Submit and present --
        let wait_semaphores = [frame.image_ready.handle()];
        // The acquired image is first touched by the final blit.
        let wait_stages = [vk::PipelineStageFlags::TRANSFER];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [frame.frame_completed.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // Reset only now that a submit is certain: any error above leaves the
        // fence signaled, so the slot stays reusable on the next cycle.
        frame.completed_fence.reset()?;

        unsafe {
            device
                .queue_submit(
                    self.ctx.device.graphics_queue,
                    &[submit_info.build()],
                    frame.completed_fence.handle(),
                )
                .map_err(RenderError::Api)?;
        }

        let needs_refresh = self.swapchain.present(
            self.ctx.device.present_queue,
            frame.frame_completed.handle(),
            image_index,
        )?;
        if needs_refresh {
            self.refresh_needed = true;
        }

        Ok(())
    }

    /// Tear the renderer down now instead of at end of scope
    ///
    /// Equivalent to dropping: waits for the device to go idle and destroys
    /// every registered mesh and material.
    pub fn shutdown(self) {}

    /// Synchronous swapchain + render-target rebuild
    ///
    /// Deliberately bypasses the ring: drains the graphics queue, recreates
    /// the swapchain (chaining the old handle), and rebuilds every slot's
    /// size-dependent targets. Pipelines survive because viewport/scissor are
    /// dynamic state.
    fn refresh_swapchain(&mut self) -> RenderResult<()> {
        self.ctx.device.wait_graphics_idle()?;

        let new_swapchain = Swapchain::new(
            self.ctx.raw_device(),
            self.ctx.device.swapchain_loader.clone(),
            self.ctx.surface,
            &self.ctx.surface_loader,
            &self.ctx.physical,
            self.window_extent,
            Some(self.swapchain.handle()),
        )?;
        let old = std::mem::replace(&mut self.swapchain, new_swapchain);
        drop(old);

        let extent = self.swapchain.extent();
        for frame in self.ring.frames_mut() {
            frame.targets = FrameTargets::new(
                self.ctx.device.device.clone(),
                &self.ctx.instance.instance,
                &self.ctx.physical,
                extent,
                OFFSCREEN_COLOR_FORMAT,
                self.msaa_samples,
            )?;
        }

        log::info!(
            "Swapchain refreshed: {}x{}",
            extent.width,
            extent.height
        );
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.device.wait_idle() {
            log::error!("wait_idle at shutdown failed: {:?}", e);
        }

        // Release every Arc before tearing down the registries.
        self.scene = Scene::with_capacity(0);
        for frame in self.ring.frames_mut() {
            frame.instances.clear();
        }
        self.collectors.clear();

        let device = self.ctx.raw_device();
        for material in self.materials.drain(..) {
            match Arc::try_unwrap(material) {
                Ok(mut m) => m.destroy(&device),
                Err(m) => log::warn!(
                    "material '{}' still referenced at shutdown, leaking its pipelines",
                    m.name()
                ),
            }
        }
        for mesh in self.meshes.drain(..) {
            match Arc::try_unwrap(mesh) {
                Ok(mut m) => m.destroy(&device),
                Err(_) => log::warn!("mesh still referenced at shutdown, leaking its buffers"),
            }
        }
    }
}

/// Fill a frame's table for this cycle: persistent scene instances first,
/// then every registered collector in registration order
fn collect_instances(
    table: &mut MeshInstanceTable,
    persistent: &MeshInstanceTable,
    collectors: &mut [MeshInstanceCollector],
) -> RenderResult<()> {
    table.append(persistent)?;
    for collector in collectors.iter_mut() {
        collector(table)?;
    }
    Ok(())
}

fn clamp_samples(requested: u32, max_supported: vk::SampleCountFlags) -> vk::SampleCountFlags {
    let requested = match requested {
        8.. => vk::SampleCountFlags::TYPE_8,
        4.. => vk::SampleCountFlags::TYPE_4,
        2.. => vk::SampleCountFlags::TYPE_2,
        _ => vk::SampleCountFlags::TYPE_1,
    };
    // Flags are power-of-two bits; pick the smaller of requested and supported.
    if requested.as_raw() <= max_supported.as_raw() {
        requested
    } else {
        max_supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::material::tests_support::{stub_material, stub_mesh};
    use crate::scene::instance_table::MeshInstanceFlags;

    fn filled_table(capacity: usize, occupancy: usize) -> MeshInstanceTable {
        let mut table = MeshInstanceTable::with_capacity(capacity);
        for _ in 0..occupancy {
            table
                .add(
                    stub_mesh(),
                    stub_material(),
                    [0u8; PUSH_CONSTANT_BYTES],
                    Mat4::identity(),
                    MeshInstanceFlags::VISIBLE,
                )
                .unwrap();
        }
        table
    }

    #[test]
    fn frame_table_sized_from_config_holds_a_full_scene() {
        let config = RendererConfig {
            max_mesh_instances: 2048,
            ..Default::default()
        };

        let scene = filled_table(config.max_mesh_instances, 1025);
        let mut frame_table = MeshInstanceTable::with_capacity(config.max_mesh_instances);
        collect_instances(&mut frame_table, &scene, &mut []).unwrap();
        assert_eq!(frame_table.len(), 1025);
    }

    #[test]
    fn failing_collector_propagates_and_table_recycles() {
        let scene = filled_table(1, 1);
        let mut frame_table = MeshInstanceTable::with_capacity(1);
        let mut collectors: Vec<MeshInstanceCollector> = vec![Box::new(|table| {
            table
                .add(
                    stub_mesh(),
                    stub_material(),
                    [0u8; PUSH_CONSTANT_BYTES],
                    Mat4::identity(),
                    MeshInstanceFlags::VISIBLE,
                )
                .map(|_| ())
        })];

        assert!(matches!(
            collect_instances(&mut frame_table, &scene, &mut collectors),
            Err(RenderError::InstanceTableFull { capacity: 1 })
        ));

        // The per-cycle clear makes the next collection succeed.
        frame_table.clear();
        collect_instances(&mut frame_table, &scene, &mut []).unwrap();
        assert_eq!(frame_table.len(), 1);
    }

    #[test]
    fn post_shader_consumes_frame_uniforms() {
        let source = std::fs::read_to_string(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/shaders/post.comp"
        ))
        .unwrap();
        assert!(source.contains("binding = 3) uniform FrameData"));
        assert!(source.contains("frame.time"));
    }

    #[test]
    fn sample_count_clamps_to_device_limit() {
        assert_eq!(
            clamp_samples(8, vk::SampleCountFlags::TYPE_4),
            vk::SampleCountFlags::TYPE_4
        );
        assert_eq!(
            clamp_samples(4, vk::SampleCountFlags::TYPE_8),
            vk::SampleCountFlags::TYPE_4
        );
        assert_eq!(
            clamp_samples(1, vk::SampleCountFlags::TYPE_8),
            vk::SampleCountFlags::TYPE_1
        );
        assert_eq!(
            clamp_samples(3, vk::SampleCountFlags::TYPE_8),
            vk::SampleCountFlags::TYPE_2
        );
    }
}
