//! `cargo build --target` toolchain invoker.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use buildmux_core::{Artifact, CompilerTriple, ToolchainInvoker};
use tracing::{debug, info};

use crate::process::run_command;

/// Settings for [`CargoToolchain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CargoConfig {
    /// Workspace the build runs in.
    pub workspace: PathBuf,

    /// Cargo executable (`cargo`, `cross`, a rustup proxy path, ...).
    pub cargo: String,

    /// Packages passed as `--package`; empty builds the default members.
    pub packages: Vec<String>,

    /// Binary names collected from the release directory; empty collects every
    /// executable found there.
    pub binaries: Vec<String>,

    /// Extra arguments appended to the build command.
    pub extra_args: Vec<String>,
}

impl Default for CargoConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            cargo: "cargo".to_string(),
            packages: Vec::new(),
            binaries: Vec::new(),
            extra_args: Vec::new(),
        }
    }
}

/// Compiles the configured workspace in release mode for a target triple.
#[derive(Debug, Clone)]
pub struct CargoToolchain {
    config: CargoConfig,
}

impl CargoToolchain {
    pub fn new(config: CargoConfig) -> Self {
        Self { config }
    }

    /// Full build command for `triple`.
    pub fn command(&self, triple: &CompilerTriple) -> Vec<String> {
        let mut cmd = vec![
            self.config.cargo.clone(),
            "build".to_string(),
            "--release".to_string(),
            "--target".to_string(),
            triple.to_string(),
        ];
        for package in &self.config.packages {
            cmd.push("--package".to_string());
            cmd.push(package.clone());
        }
        cmd.extend(self.config.extra_args.iter().cloned());
        cmd
    }

    /// `<workspace>/target/<triple>/release`
    pub fn release_dir(&self, triple: &CompilerTriple) -> PathBuf {
        self.config
            .workspace
            .join("target")
            .join(triple.as_str())
            .join("release")
    }

    async fn collect_binaries(&self, triple: &CompilerTriple) -> anyhow::Result<Vec<PathBuf>> {
        let dir = self.release_dir(triple);

        if !self.config.binaries.is_empty() {
            let suffix = if triple.is_windows() { ".exe" } else { "" };
            let mut files = Vec::with_capacity(self.config.binaries.len());
            for name in &self.config.binaries {
                let path = dir.join(format!("{name}{suffix}"));
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    anyhow::bail!("expected binary {} was not produced", path.display());
                }
                files.push(path);
            }
            return Ok(files);
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("cannot read {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if metadata.is_file() && is_executable(&path, &metadata, triple) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            anyhow::bail!("no executables found in {}", dir.display());
        }
        Ok(files)
    }
}

fn is_executable(path: &Path, metadata: &std::fs::Metadata, triple: &CompilerTriple) -> bool {
    if triple.is_windows() {
        return path.extension().is_some_and(|ext| ext == "exe");
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0 && path.extension().is_none()
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        path.extension().is_none()
    }
}

#[async_trait]
impl ToolchainInvoker for CargoToolchain {
    async fn compile(&self, triple: &CompilerTriple) -> Result<Artifact, String> {
        let command = self.command(triple);
        info!(triple = %triple, command = %command.join(" "), "compiling");

        let output = run_command(&command, &self.config.workspace)
            .await
            .map_err(|e| format!("{e:#}"))?;
        debug!(triple = %triple, duration_ms = output.duration_ms, exit_code = output.exit_code, "cargo finished");

        if !output.success() {
            return Err(output.diagnostic());
        }

        let files = self
            .collect_binaries(triple)
            .await
            .map_err(|e| format!("{e:#}"))?;
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
    fn test_command_includes_target_and_packages() {
        let toolchain = CargoToolchain::new(CargoConfig {
            packages: vec!["app_server".to_string(), "tc".to_string()],
            extra_args: vec!["--locked".to_string()],
            ..Default::default()
        });

        let cmd = toolchain.command(&triple("x86_64-unknown-linux-musl"));
        assert_eq!(
            cmd,
            vec![
                "cargo",
                "build",
                "--release",
                "--target",
                "x86_64-unknown-linux-musl",
                "--package",
                "app_server",
                "--package",
                "tc",
                "--locked",
            ]
        );
    }

    #[test]
    fn test_release_dir_layout() {
        let toolchain = CargoToolchain::new(CargoConfig {
            workspace: PathBuf::from("/src/msat"),
            ..Default::default()
        });
        assert_eq!(
            toolchain.release_dir(&triple("x86_64-pc-windows-gnu")),
            PathBuf::from("/src/msat/target/x86_64-pc-windows-gnu/release")
        );
    }

    #[tokio::test]
    async fn test_named_binaries_get_exe_suffix_on_windows() {
        let dir = tempfile::tempdir().unwrap();
        let release = dir.path().join("target/x86_64-pc-windows-gnu/release");
        std::fs::create_dir_all(&release).unwrap();
        std::fs::write(release.join("app_server.exe"), b"MZ").unwrap();

        let toolchain = CargoToolchain::new(CargoConfig {
            workspace: dir.path().to_path_buf(),
            binaries: vec!["app_server".to_string()],
            ..Default::default()
        });

        let files = toolchain
            .collect_binaries(&triple("x86_64-pc-windows-gnu"))
            .await
            .unwrap();
        assert_eq!(files, vec![release.join("app_server.exe")]);
    }

    #[tokio::test]
    async fn test_missing_named_binary_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("target/x86_64-unknown-linux-gnu/release"))
            .unwrap();

        let toolchain = CargoToolchain::new(CargoConfig {
            workspace: dir.path().to_path_buf(),
            binaries: vec!["tc".to_string()],
            ..Default::default()
        });

        let err = toolchain
            .collect_binaries(&triple("x86_64-unknown-linux-gnu"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("was not produced"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scans_executables_when_no_names_given() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let release = dir.path().join("target/x86_64-unknown-linux-gnu/release");
        std::fs::create_dir_all(release.join("deps")).unwrap();
        for name in ["tc", "app_server"] {
            let path = release.join(name);
            std::fs::write(&path, b"\x7fELF").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        std::fs::write(release.join("app_server.d"), b"deps").unwrap();
        std::fs::write(release.join("libshared.rlib"), b"rlib").unwrap();

        let toolchain = CargoToolchain::new(CargoConfig {
            workspace: dir.path().to_path_buf(),
            ..Default::default()
        });

        let files = toolchain
            .collect_binaries(&triple("x86_64-unknown-linux-gnu"))
            .await
            .unwrap();
        assert_eq!(files, vec![release.join("app_server"), release.join("tc")]);
    }
}
