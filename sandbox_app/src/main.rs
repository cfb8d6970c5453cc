//! Sandbox application driving the renderer
//!
//! Opens a window, builds a small demo scene (spinning cubes over the infinite
//! grid), and runs the per-frame loop with an ImGui stats overlay.

use std::path::PathBuf;
use std::time::Instant;

use ember_engine::prelude::*;
use ember_engine::render::MeshInstanceCollector;
use ember_engine::scene::PUSH_CONSTANT_BYTES;
use raw_window_handle::{
    HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle,
};
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::WindowBuilder;

struct SandboxWindow<'a> {
    window: &'a winit::window::Window,
}

impl RenderWindow for SandboxWindow<'_> {
    fn raw_display_handle(&self) -> RawDisplayHandle {
        self.window.raw_display_handle()
    }

    fn raw_window_handle(&self) -> RawWindowHandle {
        self.window.raw_window_handle()
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}

/// Pack the forward material's push constants: base color, emissive,
/// light direction, spare params. 64 bytes total.
fn push_constants(base_color: [f32; 4], emissive: [f32; 4]) -> [u8; PUSH_CONSTANT_BYTES] {
    let mut data = [0f32; 16];
    data[0..4].copy_from_slice(&base_color);
    data[4..8].copy_from_slice(&emissive);
    data[8..12].copy_from_slice(&[-0.4, -1.0, -0.3, 0.0]);
    bytemuck::cast(data)
}

fn cube_mesh() -> (Vec<Vertex>, Vec<u32>) {
    let face = |normal: [f32; 3], corners: [[f32; 3]; 4]| {
        corners
            .iter()
            .zip([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])
            .map(|(&position, tex_coord)| Vertex {
                position,
                normal,
                tex_coord,
            })
            .collect::<Vec<_>>()
    };

    let mut vertices = Vec::new();
    let faces = [
        ([0.0, 0.0, 1.0], [[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5]]),
        ([0.0, 0.0, -1.0], [[0.5, -0.5, -0.5], [-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5], [0.5, 0.5, -0.5]]),
        ([1.0, 0.0, 0.0], [[0.5, -0.5, 0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5]]),
        ([-1.0, 0.0, 0.0], [[-0.5, -0.5, -0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5]]),
        ([0.0, 1.0, 0.0], [[-0.5, 0.5, 0.5], [0.5, 0.5, 0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5]]),
        ([0.0, -1.0, 0.0], [[-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5]]),
    ];
    for (normal, corners) in faces {
        vertices.extend(face(normal, corners));
    }

    let mut indices = Vec::new();
    for f in 0..6u32 {
        let base = f * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

fn shader_dir() -> PathBuf {
    std::env::var("EMBER_SHADER_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("crates/ember_engine/shaders"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title("ember sandbox")
        .with_inner_size(LogicalSize::new(1280.0, 720.0))
        .build(&event_loop)?;

    let config = RendererConfig::default();
    let mut renderer = Renderer::new(
        &SandboxWindow { window: &window },
        config,
        Box::new(SpirvDiskCompiler),
        shader_dir(),
    )?;

    let mut imgui = imgui::Context::create();
    imgui.set_ini_filename(None);
    renderer.init_ui(&mut imgui)?;

    // Demo content.
    let (vertices, indices) = cube_mesh();
    let mesh = renderer.create_mesh(&vertices, &indices)?;

    let dir = shader_dir();
    let lit = renderer.create_material(&MaterialDesc::forward(
        "lit",
        dir.join("forward.vert.spv"),
        dir.join("forward.frag.spv"),
    ))?;
    let mut marker_desc = MaterialDesc::debug(
        "marker",
        dir.join("debug.vert.spv"),
        dir.join("debug.frag.spv"),
    );
    marker_desc.wireframe = true;
    let marker = renderer.create_material(&marker_desc)?;

    let colors = [
        [0.9, 0.3, 0.2, 1.0],
        [0.2, 0.7, 0.3, 1.0],
        [0.25, 0.4, 0.9, 1.0],
    ];
    let mut cubes = Vec::new();
    for (i, color) in colors.iter().enumerate() {
        let x = (i as f32 - 1.0) * 2.0;
        let id = renderer.scene_mut().create_and_add_mesh_instance(
            mesh.clone(),
            lit.clone(),
            push_constants(*color, [0.0; 4]),
            Mat4::new_translation(&Vec3::new(x, 0.5, 0.0)),
            MeshInstanceFlags::VISIBLE,
            Some(&format!("cube_{}", i)),
        )?;
        cubes.push(id);
    }

    // A transient wireframe marker orbiting the scene, contributed per frame.
    let marker_mesh = mesh.clone();
    let start = Instant::now();
    let collector: MeshInstanceCollector = Box::new(move |table| {
        let t = start.elapsed().as_secs_f32();
        let pos = Vec3::new(t.cos() * 4.0, 1.0, t.sin() * 4.0);
        let transform =
            Mat4::new_translation(&pos) * Mat4::new_scaling(0.3 + 0.1 * (t * 3.0).sin());
        table.add(
            marker_mesh.clone(),
            marker.clone(),
            push_constants([1.0, 0.8, 0.1, 1.0], [0.0; 4]),
            transform,
            MeshInstanceFlags::VISIBLE,
        )?;
        Ok(())
    });
    renderer.register_collector(collector);

    let mut last_frame = Instant::now();
    let mut minimized = false;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => {
                minimized = size.width == 0 || size.height == 0;
                if !minimized {
                    renderer.notify_resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if minimized {
                    return;
                }

                let now = Instant::now();
                let dt = now.duration_since(last_frame).as_secs_f32();
                last_frame = now;

                let elapsed = start.elapsed().as_secs_f32();
                let (width, height) = {
                    let size = window.inner_size();
                    (size.width, size.height)
                };

                let eye = Vec3::new(elapsed.cos() * 8.0, 4.0, elapsed.sin() * 8.0);
                let view = Mat4::look_at(eye, Vec3::new(0.0, 0.5, 0.0), Vec3::y());
                let proj = Mat4::perspective(
                    std::f32::consts::FRAC_PI_4,
                    width as f32 / height.max(1) as f32,
                    0.1,
                    200.0,
                );
                renderer.set_camera(view, proj, eye);

                for (i, &id) in cubes.iter().enumerate() {
                    let x = (i as f32 - 1.0) * 2.0;
                    let spin = Mat4::from_euler_angles(0.0, elapsed + i as f32, 0.0);
                    renderer.scene_mut().set_mesh_instance_transform(
                        id,
                        Mat4::new_translation(&Vec3::new(x, 0.5, 0.0)) * spin,
                    );
                }

                let io = imgui.io_mut();
                io.display_size = [width as f32, height as f32];
                io.delta_time = dt.max(1.0 / 1000.0);

                let ui = imgui.frame();
                ui.window("stats")
                    .size([220.0, 90.0], imgui::Condition::FirstUseEver)
                    .build(|| {
                        ui.text(format!("frame: {:.2} ms", dt * 1000.0));
                        ui.text(format!("instances: {}", renderer.scene().instances().len()));
                    });
                let draw_data = imgui.render();

                if let Err(e) = renderer
                    .begin_frame()
                    .and_then(|_| {
                        renderer.update(dt);
                        renderer.render_frame(Some(draw_data))
                    })
                {
                    log::error!("frame failed: {}", e);
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}
