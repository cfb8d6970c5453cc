//! Windowing abstraction
//!
//! The renderer never talks to a concrete windowing library. Anything that can
//! supply raw display/window handles and a framebuffer size can host a
//! renderer; the demo application wraps a winit window, tests stub it out.

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Surface provider consumed by the renderer
pub trait RenderWindow {
    /// Raw display handle for surface creation
    fn raw_display_handle(&self) -> RawDisplayHandle;

    /// Raw window handle for surface creation
    fn raw_window_handle(&self) -> RawWindowHandle;

    /// Current framebuffer size in pixels
    fn framebuffer_size(&self) -> (u32, u32);
}
