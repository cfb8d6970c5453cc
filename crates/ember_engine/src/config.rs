//! Renderer configuration
//!
//! Loaded from a TOML file by applications that want to override the defaults;
//! everything has a sensible built-in default so the renderer also runs without
//! any file on disk.

use serde::{Deserialize, Serialize};

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the Vulkan driver
    pub application_name: String,

    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: usize,

    /// Capacity of each per-frame mesh-instance table (and of the persistent scene table)
    pub max_mesh_instances: usize,

    /// Clear color for the forward pass
    pub clear_color: [f32; 4],

    /// Enable the Khronos validation layer (debug builds only)
    pub enable_validation: bool,

    /// Requested MSAA sample count; clamped to what the device supports
    pub msaa_samples: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "ember".to_string(),
            frames_in_flight: 2,
            max_mesh_instances: 1024,
            clear_color: [0.02, 0.02, 0.03, 1.0],
            enable_validation: true,
            msaa_samples: 4,
        }
    }
}

impl RendererConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_frames_in_flight() {
        let config = RendererConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert!(config.max_mesh_instances > 0);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RendererConfig {
            application_name: "test".to_string(),
            frames_in_flight: 3,
            max_mesh_instances: 64,
            clear_color: [0.0, 0.5, 1.0, 1.0],
            enable_validation: false,
            msaa_samples: 8,
        };

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: RendererConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.frames_in_flight, 3);
        assert_eq!(parsed.max_mesh_instances, 64);
        assert_eq!(parsed.msaa_samples, 8);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: RendererConfig = toml::from_str("frames_in_flight = 4").unwrap();
        assert_eq!(parsed.frames_in_flight, 4);
        assert_eq!(parsed.application_name, "ember");
    }
}
