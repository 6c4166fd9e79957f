//! Agent and shell configuration.
//!
//! Every value has a default; `from_env` overlays environment variables the
//! same way across crates so binaries can also load them from a file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// System prompt used when the caller supplies none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a developer assistant. You help with programming, building projects and running tasks on the user's machine.
You can run shell commands on the host. Be careful with destructive commands.
Always analyse command output and give the user a clear result.

To use a tool, reply with a single JSON object and nothing else:
{\"name\": \"<tool>\", \"arguments\": {...}}

Tools:
- execute_shell_command: command (required), workingDirectory (optional)
- run_android_tests: projectPath (required), moduleName (optional), buildVariant (default \"Debug\"), testType (\"unit\" or \"instrumented\", default \"unit\")
- release_app: projectPath, packageName (required), moduleName (default \"app\"), buildVariant (default \"Release\"), artifactType (\"apk\" or \"aab\", default \"apk\"), sign (default true), keystorePath, keystorePassword, keyAlias, keyPassword (optional when configured as secrets)
- acquire_access_token: no arguments
- publish_version: packageName, token (required), plus only the version fields the user provided

If the user is just talking to you and does not ask for an action, do not use any tool.";

/// Conversation-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Prompt placed ahead of every completion request.
    pub system_prompt: String,

    /// Upper bound on chained follow-up round trips within one user turn.
    pub max_follow_ups: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_follow_ups: 4,
        }
    }
}

/// How host commands are launched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    /// Interpreter invoked as `<shell> -c <command>`.
    pub shell: PathBuf,

    /// Directories prepended to `PATH` before spawn (toolchain runtime first).
    pub toolchain_paths: Vec<PathBuf>,

    /// Extra environment variables set on every spawned process.
    pub env: BTreeMap<String, String>,

    /// Working directory when a command names none. Defaults to `$HOME`.
    pub home: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
            toolchain_paths: default_toolchain_paths(),
            env: BTreeMap::new(),
            home: None,
        }
    }
}

#[cfg(target_os = "macos")]
fn default_toolchain_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(
        "/Applications/Android Studio.app/Contents/jbr/Contents/Home/bin",
    )]
}

#[cfg(not(target_os = "macos"))]
fn default_toolchain_paths() -> Vec<PathBuf> {
    Vec::new()
}

impl ShellConfig {
    /// Defaults overlaid with `DROIDRELAY_SHELL`, `DROIDRELAY_TOOLCHAIN_PATH`
    /// and `JAVA_HOME`.
    pub fn from_env() -> Self {
        Self::default().overlay_env()
    }

    /// Apply environment overrides on top of `self`.
    ///
    /// `JAVA_HOME/bin` goes first on the toolchain path and `JAVA_HOME` is
    /// exported to every spawned process.
    pub fn overlay_env(mut self) -> Self {
        if let Ok(shell) = std::env::var("DROIDRELAY_SHELL") {
            if !shell.trim().is_empty() {
                self.shell = PathBuf::from(shell);
            }
        }
        if let Some(paths) = std::env::var_os("DROIDRELAY_TOOLCHAIN_PATH") {
            self.toolchain_paths = std::env::split_paths(&paths).collect();
        }
        if let Ok(java_home) = std::env::var("JAVA_HOME") {
            if !java_home.trim().is_empty() {
                self.toolchain_paths
                    .insert(0, PathBuf::from(&java_home).join("bin"));
                self.env.insert("JAVA_HOME".to_string(), java_home);
            }
        }
        self
    }

    /// Directory used when a command names none.
    pub fn resolved_home(&self) -> Option<PathBuf> {
        self.home.clone().or_else(dirs::home_dir)
    }
}
