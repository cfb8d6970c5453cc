//! Renderer error taxonomy
//!
//! Every fallible path returns a [`RenderResult`]. There is no debug-only
//! assertion layer: invariant violations (table overflow, misuse of the frame
//! ring) are checked in every build and reported as errors. Swapchain staleness
//! is the one "expected" failure and is handled inline by the renderer, never
//! surfaced through this type.

use ash::vk;

/// Errors produced by the rendering subsystem
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Renderer or device initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// A fixed-capacity mesh-instance table is full
    #[error("Mesh instance table full: capacity {capacity}")]
    InstanceTableFull {
        /// Capacity of the table that rejected the add
        capacity: usize,
    },

    /// The instance name registry is full
    #[error("Name registry full: capacity {capacity}")]
    NameRegistryFull {
        /// Capacity of the registry that rejected the insert
        capacity: usize,
    },

    /// Shader bytecode could not be loaded or was malformed
    #[error("Shader error: {}: {reason}", path.display())]
    Shader {
        /// Path of the shader that failed
        path: std::path::PathBuf,
        /// What went wrong
        reason: String,
    },

    /// No suitable memory type found for an allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
