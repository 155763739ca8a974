//! Client configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::network::DEFAULT_ENDPOINT;

/// Everything externally configurable. Defaults match the service's
/// reference client.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// WebSocket endpoint of the assistant service.
    pub endpoint: String,

    /// When false the gate never trips and every block is sent.
    pub silence_detection: bool,

    /// Peak amplitude (0-1) below which a block counts as silent.
    pub silence_threshold: f32,

    /// Consecutive silent blocks before transmission is suppressed.
    pub silence_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            silence_detection: true,
            silence_threshold: 0.001,
            silence_frames: 5,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.silence_threshold) {
            anyhow::bail!(
                "silence_threshold must be within 0-1, got {}",
                self.silence_threshold
            );
        }
        if self.silence_frames == 0 {
            anyhow::bail!("silence_frames must be at least 1");
        }
        url::Url::parse(&self.endpoint).context("Invalid endpoint URL")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoint, "ws://localhost:8000/ws");
        assert!(config.silence_detection);
        assert_eq!(config.silence_threshold, 0.001);
        assert_eq!(config.silence_frames, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"silence_frames": 8}"#).unwrap();
        assert_eq!(config.silence_frames, 8);
        assert_eq!(config.silence_threshold, 0.001);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            silence_threshold: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            silence_frames: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            endpoint: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
