//! Child process execution with captured output.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use anyhow::Context;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// `exit code N: <last non-empty stderr line>`, or stdout if stderr is empty.
    pub fn diagnostic(&self) -> String {
        let tail = last_line(&self.stderr)
            .or_else(|| last_line(&self.stdout))
            .unwrap_or("no output");
        format!("exit code {}: {}", self.exit_code, tail)
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rev().find(|l| !l.is_empty())
}

/// Run `command[0]` with `command[1..]` in `cwd` and wait for it.
///
/// The child is killed if the returned future is dropped, so an outer timeout
/// or cancellation does not leave stray compilers behind.
pub async fn run_command(command: &[String], cwd: &Path) -> anyhow::Result<CommandOutput> {
    let start = Instant::now();

    let (exe, args) = command
        .split_first()
        .context("command must not be empty")?;

    debug!(command = %command.join(" "), cwd = %cwd.display(), "spawning");

    let child = Command::new(exe)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {exe}"))?;

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("failed to wait for {exe}"))?;

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(exit_code: i32, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration_ms: 0,
        }
    }

    #[test]
    fn test_diagnostic_uses_last_stderr_line() {
        let out = output(
            101,
            "",
            "   Compiling msat v0.1.0\nerror: linker `x86_64-w64-mingw32-gcc` not found\n\n",
        );
        assert_eq!(
            out.diagnostic(),
            "exit code 101: error: linker `x86_64-w64-mingw32-gcc` not found"
        );
    }

    #[test]
    fn test_diagnostic_falls_back_to_stdout() {
        assert_eq!(output(1, "boom\n", "").diagnostic(), "exit code 1: boom");
        assert_eq!(output(1, "", "").diagnostic(), "exit code 1: no output");
    }

    #[tokio::test]
    async fn test_run_command_captures_output() {
        let out = run_command(&["echo".to_string(), "hello".to_string()], Path::new("."))
            .await
            .expect("echo failed");
        assert!(out.success());
        assert!(out.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_command_failing_exit_code() {
        let out = run_command(&["false".to_string()], Path::new("."))
            .await
            .expect("false failed to spawn");
        assert!(!out.success());
        assert_ne!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_run_command_empty_is_error() {
        assert!(run_command(&[], Path::new(".")).await.is_err());
    }

    #[tokio::test]
    async fn test_run_command_missing_binary_is_error() {
        let err = run_command(
            &["buildmux-definitely-not-a-binary".to_string()],
            Path::new("."),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }
}
