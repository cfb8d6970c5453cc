//! Materials and GPU mesh resources
//!
//! A material is an immutable-after-build bundle of per-pass pipelines. GPU
//! meshes are immutable vertex/index buffer pairs. Both hold raw Vulkan
//! handles owned by the renderer's resource registries; the registries destroy
//! them at shutdown after the device has gone idle.

use ash::{vk, Device};
use bytemuck::{Pod, Zeroable};
use std::mem;
use std::path::PathBuf;

/// Vertex layout shared by every mesh the engine draws
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Vertex buffer binding description
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Vertex attribute descriptions (position, normal, tex_coord)
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: mem::size_of::<[f32; 3]>() as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 2,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: mem::size_of::<[f32; 6]>() as u32,
            },
        ]
    }
}

/// Render pass a material can carry a pipeline for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Main shaded MSAA pass
    Forward,
    /// Debug/gizmo overlay pass
    Debug,
}

/// Number of [`PassKind`] variants
pub const PASS_COUNT: usize = 2;

impl PassKind {
    /// Stable index into per-pass arrays
    pub fn index(self) -> usize {
        match self {
            PassKind::Forward => 0,
            PassKind::Debug => 1,
        }
    }
}

/// Pipeline + layout pair for one pass
///
/// Raw handles; lifetime is managed by the material registry.
#[derive(Debug, Clone, Copy)]
pub struct PassPipeline {
    /// Graphics pipeline handle
    pub pipeline: vk::Pipeline,
    /// Pipeline layout handle
    pub layout: vk::PipelineLayout,
}

/// Shader pair for one pass of a material
#[derive(Debug, Clone)]
pub struct PassShaders {
    /// Path to the vertex shader binary
    pub vertex: PathBuf,
    /// Path to the fragment shader binary
    pub fragment: PathBuf,
}

/// Recipe for building a material
#[derive(Debug, Clone)]
pub struct MaterialDesc {
    /// Display name, used in logs
    pub name: String,
    /// Shaders for the forward pass, if the material participates in it
    pub forward: Option<PassShaders>,
    /// Shaders for the debug pass, if the material participates in it
    pub debug: Option<PassShaders>,
    /// Render back faces as well
    pub double_sided: bool,
    /// Draw as wireframe
    pub wireframe: bool,
}

impl MaterialDesc {
    /// A forward-only material with default rasterizer state
    pub fn forward(name: impl Into<String>, vertex: PathBuf, fragment: PathBuf) -> Self {
        Self {
            name: name.into(),
            forward: Some(PassShaders { vertex, fragment }),
            debug: None,
            double_sided: false,
            wireframe: false,
        }
    }

    /// A debug-pass-only material (gizmos, debug shapes)
    pub fn debug(name: impl Into<String>, vertex: PathBuf, fragment: PathBuf) -> Self {
        Self {
            name: name.into(),
            forward: None,
            debug: Some(PassShaders { vertex, fragment }),
            double_sided: true,
            wireframe: false,
        }
    }
}

/// Immutable per-pass pipeline bundle
///
/// A material with no pipeline for a pass is skipped when that pass iterates
/// the instance table, which lets one instance table serve every pass.
pub struct Material {
    name: String,
    passes: [Option<PassPipeline>; PASS_COUNT],
}

impl Material {
    /// Assemble a material from built pass pipelines
    pub fn new(name: String, passes: [Option<PassPipeline>; PASS_COUNT]) -> Self {
        Self { name, passes }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pipeline for `pass`, if this material participates in it
    pub fn pipeline_for(&self, pass: PassKind) -> Option<PassPipeline> {
        self.passes[pass.index()]
    }

    /// Destroy the pass pipelines; called by the material registry at shutdown
    pub(crate) fn destroy(&mut self, device: &Device) {
        for pass in self.passes.iter_mut() {
            if let Some(p) = pass.take() {
                unsafe {
                    device.destroy_pipeline(p.pipeline, None);
                    device.destroy_pipeline_layout(p.layout, None);
                }
            }
        }
    }
}

/// Immutable vertex/index buffer pair on the GPU
///
/// Created once from CPU mesh data, never mutated. Owned by the renderer's
/// mesh registry, referenced (not owned) by mesh instances.
pub struct GpuMesh {
    /// Vertex buffer handle
    pub vertex_buffer: vk::Buffer,
    pub(crate) vertex_memory: vk::DeviceMemory,
    /// Index buffer handle
    pub index_buffer: vk::Buffer,
    pub(crate) index_memory: vk::DeviceMemory,
    /// Number of indices to draw
    pub index_count: u32,
}

impl GpuMesh {
    /// Destroy the buffers; called by the mesh registry at shutdown
    pub(crate) fn destroy(&mut self, device: &Device) {
        unsafe {
            device.destroy_buffer(self.vertex_buffer, None);
            device.free_memory(self.vertex_memory, None);
            device.destroy_buffer(self.index_buffer, None);
            device.free_memory(self.index_memory, None);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use std::sync::Arc;

    /// Mesh with null handles for device-free tests
    pub fn stub_mesh() -> Arc<GpuMesh> {
        Arc::new(GpuMesh {
            vertex_buffer: vk::Buffer::null(),
            vertex_memory: vk::DeviceMemory::null(),
            index_buffer: vk::Buffer::null(),
            index_memory: vk::DeviceMemory::null(),
            index_count: 0,
        })
    }

    /// Material with no pipelines for device-free tests
    pub fn stub_material() -> Arc<Material> {
        Arc::new(Material::new("stub".to_string(), [None, None]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_inputs() {
        assert_eq!(mem::size_of::<Vertex>(), 32);

        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
        assert_eq!(
            Vertex::binding_description().stride,
            mem::size_of::<Vertex>() as u32
        );
    }

    #[test]
    fn material_without_pass_pipeline_is_skipped() {
        let forward_only = Material::new(
            "forward_only".to_string(),
            [
                Some(PassPipeline {
                    pipeline: vk::Pipeline::null(),
                    layout: vk::PipelineLayout::null(),
                }),
                None,
            ],
        );
        assert!(forward_only.pipeline_for(PassKind::Forward).is_some());
        assert!(forward_only.pipeline_for(PassKind::Debug).is_none());
    }

    #[test]
    fn pass_indices_are_stable() {
        assert_eq!(PassKind::Forward.index(), 0);
        assert_eq!(PassKind::Debug.index(), 1);
    }
}
