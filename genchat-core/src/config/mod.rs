//! Runtime configuration for the chat core.
//!
//! The conversation controller reads configuration through the
//! [`ConfigProvider`] trait: the model identifier at session start and the
//! prompt preamble at send time. [`SharedConfig`] is the standard
//! implementation: constructed once at process start and replaceable at
//! runtime, which is how remotely-fetched values would land here (the fetch
//! mechanics themselves live outside this crate).

pub mod constants;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use self::constants::{files, models};

/// Read access to the current configuration values.
///
/// Implementations return the latest fetched value, or the fixed default if
/// nothing has been fetched yet.
pub trait ConfigProvider: Send + Sync {
    fn model_identifier(&self) -> String;
    fn preamble(&self) -> String;
}

/// Chat configuration, loadable from `genchat.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model used for new chat sessions.
    #[serde(default = "default_model")]
    pub model: String,

    /// Preamble prepended (invisibly) to every outgoing message.
    #[serde(default)]
    pub preamble: String,
}

fn default_model() -> String {
    models::google::DEFAULT_MODEL.to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            preamble: String::new(),
        }
    }
}

impl ChatConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Load from `path`, or from the first config file found in the standard
    /// locations, or fall back to defaults when none exists.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        for candidate in Self::default_locations() {
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }
        Ok(Self::default())
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(files::CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            locations.push(home.join(".config").join("genchat").join(files::CONFIG_FILE));
        }
        locations
    }
}

/// Shared, runtime-replaceable configuration.
#[derive(Debug)]
pub struct SharedConfig {
    inner: RwLock<ChatConfig>,
}

impl SharedConfig {
    pub fn new(config: ChatConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(config),
        })
    }

    /// Swap in freshly fetched values. Readers pick them up on next access.
    pub fn replace(&self, config: ChatConfig) {
        *self.inner.write() = config;
    }

    pub fn current(&self) -> ChatConfig {
        self.inner.read().clone()
    }
}

impl ConfigProvider for SharedConfig {
    fn model_identifier(&self) -> String {
        self.inner.read().model.clone()
    }

    fn preamble(&self) -> String {
        self.inner.read().preamble.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = ChatConfig::default();
        assert_eq!(config.model, models::google::DEFAULT_MODEL);
        assert_eq!(config.preamble, "");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: ChatConfig = toml::from_str(r#"preamble = "Answer briefly.""#).unwrap();
        assert_eq!(config.model, models::google::DEFAULT_MODEL);
        assert_eq!(config.preamble, "Answer briefly.");
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(files::CONFIG_FILE);
        fs::write(&path, "model = \"gemini-2.5-pro\"\n").unwrap();
        let config = ChatConfig::load(&path).unwrap();
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.preamble, "");
    }

    #[test]
    fn replace_is_visible_to_readers() {
        let shared = SharedConfig::new(ChatConfig::default());
        assert_eq!(shared.preamble(), "");
        shared.replace(ChatConfig {
            model: "gemini-2.5-pro".into(),
            preamble: "Be terse.".into(),
        });
        assert_eq!(shared.model_identifier(), "gemini-2.5-pro");
        assert_eq!(shared.preamble(), "Be terse.");
    }
}
