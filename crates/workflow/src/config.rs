//! Translator configuration.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::trace::DEFAULT_MAX_DEPTH;
use crate::{Result, WorkflowError};

/// Values used when a generation request leaves a knob unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    pub steps: u32,
    pub cfg_scale: f64,
    pub sampler_name: String,
    pub scheduler: String,
    pub denoising_strength: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            steps: 20,
            cfg_scale: 7.0,
            sampler_name: "euler".to_string(),
            scheduler: "normal".to_string(),
            denoising_strength: 1.0,
            width: 512,
            height: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// How far back from the sampler to look for a text encoder
    pub max_trace_depth: usize,

    pub defaults: GenerationDefaults,

    /// ComfyUI server base URL
    pub server_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_trace_depth: DEFAULT_MAX_DEPTH,
            defaults: GenerationDefaults::default(),
            server_url: "http://127.0.0.1:8188".to_string(),
            timeout_secs: 30,
        }
    }
}

impl TranslatorConfig {
    pub fn with_max_trace_depth(mut self, depth: usize) -> Self {
        self.max_trace_depth = depth;
        self
    }

    pub fn with_defaults(mut self, defaults: GenerationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| WorkflowError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from JSON; absent fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| WorkflowError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TranslatorConfig::default();
        assert_eq!(config.max_trace_depth, 5);
        assert_eq!(config.defaults.steps, 20);
        assert_eq!(config.defaults.sampler_name, "euler");
        assert_eq!(config.defaults.scheduler, "normal");
        assert_eq!(config.defaults.width, 512);
    }

    #[test]
    fn test_builder() {
        let config = TranslatorConfig::default()
            .with_server_url("http://gpu-box:8188")
            .with_max_trace_depth(8)
            .with_timeout(5);
        assert_eq!(config.server_url, "http://gpu-box:8188");
        assert_eq!(config.max_trace_depth, 8);
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translator.json");
        let config = TranslatorConfig::default().with_max_trace_depth(3);

        config.save(&path).unwrap();
        assert_eq!(TranslatorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translator.json");
        std::fs::write(&path, r#"{"defaults": {"steps": 35}}"#).unwrap();

        let config = TranslatorConfig::load(&path).unwrap();
        assert_eq!(config.defaults.steps, 35);
        assert_eq!(config.defaults.cfg_scale, 7.0);
        assert_eq!(config.max_trace_depth, 5);
    }
}
