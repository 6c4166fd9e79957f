//! `droidrelay.toml` loading.

use std::path::Path;

use anyhow::{Context, Result};
use droidrelay_core::{AgentConfig, ShellConfig};
use droidrelay_release::ReleaseConfig;
use serde::{Deserialize, Serialize};

use crate::completion::CompletionConfig;

pub const DEFAULT_CONFIG_FILE: &str = "droidrelay.toml";

/// Whole-file configuration; every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub agent: AgentConfig,
    pub shell: ShellConfig,
    pub release: ReleaseConfig,
    pub completion: CompletionConfig,
}

impl FileConfig {
    /// Read `path`, then apply environment overrides.
    ///
    /// A missing file is only an error when `required` is set.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        let config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))?
        } else if required {
            anyhow::bail!("config file {} not found", path.display());
        } else {
            Self::default()
        };
        Ok(config.overlay_env())
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn overlay_env(self) -> Self {
        Self {
            shell: self.shell.overlay_env(),
            release: self.release.overlay_env(),
            ..self
        }
    }
}
