//! Rendering subsystem
//!
//! Layered bottom-up: `vulkan` holds policy-free RAII primitives, `frame`
//! holds the per-frame ring, `passes` the fixed pass pipeline, and `renderer`
//! ties them together behind the public API.

pub mod error;
pub mod frame;
pub mod material;
pub mod passes;
pub mod renderer;
pub mod ui;
pub mod vulkan;
pub mod window;

pub use error::{RenderError, RenderResult};
pub use frame::{FrameRing, RenderFrame};
pub use material::{GpuMesh, Material, MaterialDesc, PassKind, PassShaders, Vertex};
pub use passes::{frame_plan, FrameStep};
pub use renderer::{MeshInstanceCollector, Renderer};
pub use ui::UiRenderer;
pub use vulkan::{ShaderCompiler, ShaderStage, SpirvDiskCompiler};
pub use window::RenderWindow;
