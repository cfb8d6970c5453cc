//! Shader loading
//!
//! Pipelines consume SPIR-V bytecode through the [`ShaderCompiler`] trait so
//! the engine never depends on how the words were produced. The default
//! implementation loads precompiled `.spv` files from disk.

use ash::{vk, Device};
use std::fs;
use std::path::Path;

use crate::render::error::{RenderError, RenderResult};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Pipeline stage a shader binary targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Fragment shader
    Fragment,
    /// Compute shader
    Compute,
}

impl ShaderStage {
    /// Corresponding Vulkan stage flag
    pub fn to_vk(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }
}

/// Source of SPIR-V bytecode for pipeline construction
///
/// Invoked once per shader stage at pipeline-build time. Failures are fatal at
/// startup; nothing on the per-frame path compiles shaders.
pub trait ShaderCompiler {
    /// Produce SPIR-V words for `path` compiled as `stage` with `entry`
    fn compile(&self, stage: ShaderStage, path: &Path, entry: &str) -> RenderResult<Vec<u32>>;
}

/// Loads precompiled `.spv` binaries from disk
pub struct SpirvDiskCompiler;

impl ShaderCompiler for SpirvDiskCompiler {
    fn compile(&self, _stage: ShaderStage, path: &Path, _entry: &str) -> RenderResult<Vec<u32>> {
        let bytes = fs::read(path).map_err(|e| RenderError::Shader {
            path: path.to_path_buf(),
            reason: format!("failed to read: {}", e),
        })?;

        if bytes.len() % 4 != 0 {
            return Err(RenderError::Shader {
                path: path.to_path_buf(),
                reason: format!("byte length {} is not a multiple of 4", bytes.len()),
            });
        }

        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        match words.first() {
            Some(&SPIRV_MAGIC) => Ok(words),
            _ => Err(RenderError::Shader {
                path: path.to_path_buf(),
                reason: "missing SPIR-V magic number".to_string(),
            }),
        }
    }
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V words
    pub fn from_words(device: Device, words: &[u32]) -> RenderResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);

        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(RenderError::Api)?
        };

        Ok(Self { device, module })
    }

    /// Compile and load a shader in one step
    pub fn load(
        device: Device,
        compiler: &dyn ShaderCompiler,
        stage: ShaderStage,
        path: &Path,
    ) -> RenderResult<Self> {
        let words = compiler.compile(stage, path, "main")?;
        Self::from_words(device, &words)
    }

    /// Get the shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Create shader stage create info for pipeline construction
    pub fn stage_info(
        &self,
        stage: ShaderStage,
        entry_point: &std::ffi::CStr,
    ) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage.to_vk())
            .module(self.module)
            .name(entry_point)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_spv(words: &[u32]) -> temppath::TempSpv {
        temppath::TempSpv::new(words)
    }

    // Minimal on-disk fixture helper; std::env::temp_dir keeps the test
    // hermetic without extra dev-dependencies.
    mod temppath {
        use std::path::PathBuf;

        pub struct TempSpv(pub PathBuf);

        impl TempSpv {
            pub fn new(words: &[u32]) -> Self {
                let mut bytes = Vec::with_capacity(words.len() * 4);
                for w in words {
                    bytes.extend_from_slice(&w.to_le_bytes());
                }
                let path = std::env::temp_dir().join(format!(
                    "ember_shader_test_{}_{}.spv",
                    std::process::id(),
                    words.len()
                ));
                std::fs::write(&path, bytes).unwrap();
                Self(path)
            }
        }

        impl Drop for TempSpv {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.0);
            }
        }
    }

    #[test]
    fn disk_compiler_accepts_valid_spirv() {
        let fixture = write_spv(&[super::SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]);
        let words = SpirvDiskCompiler
            .compile(ShaderStage::Vertex, &fixture.0, "main")
            .unwrap();
        assert_eq!(words[0], super::SPIRV_MAGIC);
        assert_eq!(words.len(), 5);
    }

    #[test]
    fn disk_compiler_rejects_bad_magic() {
        let fixture = write_spv(&[0xdead_beef, 0, 0]);
        let err = SpirvDiskCompiler
            .compile(ShaderStage::Fragment, &fixture.0, "main")
            .unwrap_err();
        assert!(matches!(err, RenderError::Shader { .. }));
    }

    #[test]
    fn disk_compiler_rejects_missing_file() {
        let err = SpirvDiskCompiler
            .compile(
                ShaderStage::Compute,
                Path::new("/nonexistent/shader.spv"),
                "main",
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::Shader { .. }));
    }

    #[test]
    fn stage_maps_to_vulkan_flags() {
        assert_eq!(ShaderStage::Vertex.to_vk(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(
            ShaderStage::Fragment.to_vk(),
            vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(ShaderStage::Compute.to_vk(), vk::ShaderStageFlags::COMPUTE);
    }
}
