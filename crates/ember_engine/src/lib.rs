//! # Ember Engine
//!
//! A hobby real-time 3D rendering engine built directly on Vulkan.
//!
//! The heart of the crate is the per-frame resource ring: the CPU records frame
//! `K+1` while the GPU is still executing frame `K`, with a per-slot fence as the
//! only backpressure mechanism. Each acquired frame runs a fixed pass pipeline
//! (forward mesh draw with MSAA, compute post-process, debug/gizmo overlay, editor
//! UI overlay, blit to the swapchain image) inside one primary command buffer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember_engine::prelude::*;
//! # struct MyWindow;
//! # impl ember_engine::render::RenderWindow for MyWindow {
//! #     fn raw_display_handle(&self) -> raw_window_handle::RawDisplayHandle { unimplemented!() }
//! #     fn raw_window_handle(&self) -> raw_window_handle::RawWindowHandle { unimplemented!() }
//! #     fn framebuffer_size(&self) -> (u32, u32) { (800, 600) }
//! # }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let window = MyWindow;
//!     let config = RendererConfig::default();
//!     let mut renderer = Renderer::new(
//!         &window,
//!         config,
//!         Box::new(SpirvDiskCompiler),
//!         "shaders".into(),
//!     )?;
//!
//!     loop {
//!         renderer.begin_frame()?;
//!         renderer.update(1.0 / 60.0);
//!         renderer.render_frame(None)?;
//!     }
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod math;
pub mod render;
pub mod scene;

/// Commonly used types, re-exported for application crates.
pub mod prelude {
    pub use crate::config::RendererConfig;
    pub use crate::math::{Mat4, Mat4Ext, Vec3, Vec4};
    pub use crate::render::{
        Material, MaterialDesc, PassKind, RenderError, RenderResult, RenderWindow, Renderer,
        SpirvDiskCompiler, Vertex,
    };
    pub use crate::scene::{MeshInstanceFlags, MeshInstanceId, Scene};
}
