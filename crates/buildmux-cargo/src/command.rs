//! Arbitrary-command toolchain, for `cross`, `make` and other non-cargo builds.

use std::path::PathBuf;

use async_trait::async_trait;
use buildmux_core::{Artifact, CompilerTriple, ToolchainInvoker};

use crate::process::run_command;

/// Placeholder replaced with the target triple in arguments and artifact paths.
pub const TRIPLE_PLACEHOLDER: &str = "{triple}";

/// Runs a command template per triple.
///
/// On exit code 0 the artifact holds every `artifacts` path (relative to `cwd`,
/// with `{triple}` substituted); a missing path is a compile failure.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    template: Vec<String>,
    artifacts: Vec<String>,
    cwd: PathBuf,
}

impl CommandToolchain {
    pub fn new(template: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            template,
            artifacts: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn command(&self, triple: &CompilerTriple) -> Vec<String> {
        self.template
            .iter()
            .map(|arg| substitute(arg, triple))
            .collect()
    }

    pub fn artifact_paths(&self, triple: &CompilerTriple) -> Vec<PathBuf> {
        self.artifacts
            .iter()
            .map(|path| self.cwd.join(substitute(path, triple)))
            .collect()
    }
}

fn substitute(template: &str, triple: &CompilerTriple) -> String {
    template.replace(TRIPLE_PLACEHOLDER, triple.as_str())
}

#[async_trait]
impl ToolchainInvoker for CommandToolchain {
    async fn compile(&self, triple: &CompilerTriple) -> Result<Artifact, String> {
        let output = run_command(&self.command(triple), &self.cwd)
            .await
            .map_err(|e| format!("{e:#}"))?;

        if !output.success() {
            return Err(output.diagnostic());
        }

        let files = self.artifact_paths(triple);
        for file in &files {
            if !tokio::fs::try_exists(file).await.unwrap_or(false) {
                return Err(format!("expected artifact {} was not produced", file.display()));
            }
        }
        Ok(Artifact::new(triple.clone(), files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(s: &str) -> CompilerTriple {
        CompilerTriple::new(s).unwrap()
    }

    #[test]
    fn test_command_substitutes_triple() {
        let toolchain = CommandToolchain::new(
            vec!["sh".to_string(), "-c".to_string(), "echo building {triple}".to_string()],
            ".",
        );
        let cmd = toolchain.command(&triple("aarch64-apple-darwin"));
        assert_eq!(cmd[2], "echo building aarch64-apple-darwin");
    }

    #[test]
    fn test_artifact_paths_are_relative_to_cwd() {
        let toolchain = CommandToolchain::new(vec!["true".to_string()], "/work")
            .with_artifacts(vec!["out/{triple}/tc".to_string()]);
        assert_eq!(
            toolchain.artifact_paths(&triple("x86_64-unknown-linux-musl")),
            vec![PathBuf::from("/work/out/x86_64-unknown-linux-musl/tc")]
        );
    }
}
