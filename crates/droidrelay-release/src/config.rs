//! Release backend and toolchain configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReleaseError, Result};

pub const DEFAULT_KEY_ID: &str = "2351024845";
pub const DEFAULT_PRIVATE_KEY_SECRET: &str = "RUSTORE_PRIVATE_KEY";
pub const DEFAULT_AUTH_URL: &str = "https://public-api.rustore.ru/public/auth";
pub const DEFAULT_API_BASE_URL: &str = "https://public-api.rustore.ru";

/// Release backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Key identifier sent with every auth request
    pub key_id: String,
    /// Secret holding the PKCS#8 private key (base64 DER or PEM)
    pub private_key_secret: String,
    /// Auth endpoint URL
    pub auth_url: String,
    /// Base URL for upload and version-draft calls
    pub api_base_url: String,
    /// Android SDK root, used to find apksigner
    pub sdk_root: Option<PathBuf>,
    /// Per-request HTTP timeout
    pub http_timeout_secs: u64,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            key_id: DEFAULT_KEY_ID.to_string(),
            private_key_secret: DEFAULT_PRIVATE_KEY_SECRET.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            sdk_root: None,
            http_timeout_secs: 60,
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ReleaseConfig {
    /// Defaults overlaid with `RUSTORE_KEY_ID`, `RUSTORE_AUTH_URL`,
    /// `RUSTORE_API_URL` and `ANDROID_HOME` / `ANDROID_SDK_ROOT`.
    pub fn from_env() -> Self {
        Self::default().overlay_env()
    }

    /// Apply environment overrides on top of `self`.
    pub fn overlay_env(mut self) -> Self {
        if let Some(v) = env_value("RUSTORE_KEY_ID") {
            self.key_id = v;
        }
        if let Some(v) = env_value("RUSTORE_AUTH_URL") {
            self.auth_url = v;
        }
        if let Some(v) = env_value("RUSTORE_API_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = env_value("ANDROID_HOME").or_else(|| env_value("ANDROID_SDK_ROOT")) {
            self.sdk_root = Some(PathBuf::from(v));
        }
        self
    }

    /// Create config for a specific backend, e.g. a local mock server.
    pub fn for_backend(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        ReleaseConfig {
            auth_url: format!("{base}/public/auth"),
            api_base_url: base.to_string(),
            ..Self::default()
        }
    }

    pub fn with_key_id(mut self, key_id: &str) -> Self {
        self.key_id = key_id.to_string();
        self
    }

    pub fn with_sdk_root(mut self, sdk_root: impl Into<PathBuf>) -> Self {
        self.sdk_root = Some(sdk_root.into());
        self
    }

    /// HTTP client shared by the token service and the release backend.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(concat!("droidrelay/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(self.http_timeout_secs.max(1)))
            .build()
            .map_err(|e| ReleaseError::Config(format!("cannot build HTTP client: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_backend_paths() {
        let config = ReleaseConfig::for_backend("http://127.0.0.1:1234/");
        assert_eq!(config.auth_url, "http://127.0.0.1:1234/public/auth");
        assert_eq!(config.api_base_url, "http://127.0.0.1:1234");
        assert_eq!(config.key_id, DEFAULT_KEY_ID);
    }

    #[test]
    fn test_toml_style_partial_deserialize() {
        let config: ReleaseConfig =
            serde_json::from_str(r#"{"key_id": "42", "http_timeout_secs": 5}"#).unwrap();
        assert_eq!(config.key_id, "42");
        assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
        assert!(config.http_client().is_ok());
    }
}
