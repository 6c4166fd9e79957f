//! Host command execution with captured output.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use crate::config::ShellConfig;
use crate::domain::CommandResult;
use crate::obs;

/// Runs a shell command line and reports its captured result.
///
/// Implementations never fail: a process that cannot be launched is reported
/// as [`CommandResult::launch_failure`].
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` in `working_dir` (the user's home when `None`).
    ///
    /// `cancel` is checked before spawning only; a spawned process runs to exit
    /// unless the returned future is dropped, which kills it.
    async fn run(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> CommandResult;
}

/// Spawns `<shell> -c <command>` on the host, with no isolation.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    config: ShellConfig,
}

impl ShellExecutor {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(ShellConfig::from_env())
    }

    /// `PATH` value with the configured toolchain directories in front.
    fn search_path(&self) -> Option<std::ffi::OsString> {
        let inherited = std::env::var_os("PATH");
        let mut dirs: Vec<PathBuf> = self.config.toolchain_paths.clone();
        if let Some(existing) = &inherited {
            dirs.extend(std::env::split_paths(existing));
        }
        if self.config.toolchain_paths.is_empty() {
            return inherited;
        }
        std::env::join_paths(dirs).ok().or(inherited)
    }

    fn build_command(&self, command: &str, working_dir: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.config.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(path) = self.search_path() {
            cmd.env("PATH", path);
        }
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        let cwd = working_dir
            .map(Path::to_path_buf)
            .or_else(|| self.config.resolved_home());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    #[instrument(skip_all, fields(shell = %self.config.shell.display()))]
    async fn run(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> CommandResult {
        if cancel.is_cancelled() {
            return CommandResult::launch_failure("cancelled before launch");
        }

        let start = Instant::now();
        debug!("spawning child process");
        let child = match self.build_command(command, working_dir).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(err = %e, "failed to spawn command");
                return CommandResult::launch_failure(format!(
                    "failed to launch {}: {e}",
                    self.config.shell.display()
                ));
            }
        };

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => {
                error!(err = %e, "failed to collect command output");
                return CommandResult::launch_failure(format!("failed to wait for process: {e}"));
            }
        };

        let result = CommandResult::new(
            exit_code(output.status),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
        obs::emit_process_finished(result.exit_code, start.elapsed().as_millis() as u64);
        result
    }
}

/// Exit code that never collides with the launch-failure sentinel.
///
/// A signal-terminated process reports `128 + signal`, as shells do.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Quote a value for safe interpolation into a POSIX shell command line.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LAUNCH_FAILURE_EXIT_CODE;

    fn executor_with(config: ShellConfig) -> ShellExecutor {
        ShellExecutor::new(config)
    }

    #[tokio::test]
    async fn test_run_captures_stdout_and_exit_code() {
        let result = ShellExecutor::default()
            .run("echo hi", None, &CancellationToken::new())
            .await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hi");
    }

    #[tokio::test]
    async fn test_run_reports_process_failure() {
        let result = ShellExecutor::default()
            .run("echo oops >&2; exit 3", None, &CancellationToken::new())
            .await;
        assert_eq!(result.exit_code, 3);
        assert!(result.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn test_unlaunchable_interpreter_returns_sentinel() {
        let executor = executor_with(ShellConfig {
            shell: PathBuf::from("/definitely/not/a/shell"),
            ..ShellConfig::default()
        });
        let result = executor
            .run("echo never", None, &CancellationToken::new())
            .await;
        assert_eq!(result.exit_code, LAUNCH_FAILURE_EXIT_CODE);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.contains("failed to launch"));
    }

    #[tokio::test]
    async fn test_cancelled_token_prevents_launch() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = ShellExecutor::default().run("echo hi", None, &cancel).await;
        assert_eq!(result.exit_code, LAUNCH_FAILURE_EXIT_CODE);
        assert_ne!(result.exit_code, 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_run_kills_child() {
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let command = format!(
            "echo $$ > {}; exec sleep 30",
            shell_quote(&pid_file.display().to_string())
        );
        let executor = ShellExecutor::default();
        let cancel = CancellationToken::new();
        let run = executor.run(&command, Some(dir.path()), &cancel);
        assert!(tokio::time::timeout(Duration::from_millis(500), run)
            .await
            .is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let stat = PathBuf::from(format!("/proc/{pid}/stat"));
        let mut stopped = false;
        for _ in 0..50 {
            match std::fs::read_to_string(&stat) {
                Err(_) => stopped = true,
                // Killed but not yet reaped.
                Ok(line) => {
                    stopped = line
                        .rsplit(')')
                        .next()
                        .map_or(false, |rest| rest.trim_start().starts_with('Z'))
                }
            }
            if stopped {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(stopped, "process {pid} outlived the dropped run");
    }

    #[tokio::test]
    async fn test_working_directory_defaults_to_home() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with(ShellConfig {
            home: Some(dir.path().to_path_buf()),
            ..ShellConfig::default()
        });
        let result = executor.run("pwd", None, &CancellationToken::new()).await;
        let reported = std::fs::canonicalize(result.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn test_explicit_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let result = ShellExecutor::default()
            .run("ls", Some(dir.path()), &CancellationToken::new())
            .await;
        assert!(result.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_toolchain_path_is_prepended_and_env_injected() {
        let mut config = ShellConfig {
            toolchain_paths: vec![PathBuf::from("/opt/toolchain/bin")],
            ..ShellConfig::default()
        };
        config
            .env
            .insert("DROIDRELAY_TEST_VAR".to_string(), "set".to_string());
        let result = executor_with(config)
            .run(
                "echo \"$PATH\"; echo \"$DROIDRELAY_TEST_VAR\"",
                None,
                &CancellationToken::new(),
            )
            .await;
        let mut lines = result.stdout.lines();
        assert!(lines.next().unwrap().starts_with("/opt/toolchain/bin"));
        assert_eq!(lines.next(), Some("set"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("app-debug.apk"), "app-debug.apk");
        assert_eq!(shell_quote("/a b/c"), "'/a b/c'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
