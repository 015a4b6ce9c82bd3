//! Layered configuration: CLI flag > environment variable > TOML file > default.
//!
//! Flags and their environment variables are declared once in [`SettingsArgs`]
//! (clap resolves flag-over-env). The optional `buildmux.toml` fills in
//! whatever neither provided.

use std::path::{Path, PathBuf};
use std::time::Duration;

use buildmux_cargo::CargoConfig;
use buildmux_core::{
    CancelPolicy, CoordinatorConfig, ExecutorConfig, Parallelism, DEFAULT_TIMEOUT_SECS,
};
use serde::Deserialize;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "buildmux.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings shared by flags, environment and config file.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct SettingsArgs {
    /// Maximum targets built concurrently (1 = sequential)
    #[arg(short, long, env = "BUILDMUX_JOBS")]
    pub jobs: Option<usize>,

    /// Per-target timeout in seconds (compile + export)
    #[arg(long, env = "BUILDMUX_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Extra attempts for a failed target
    #[arg(long, env = "BUILDMUX_RETRIES")]
    pub retries: Option<u32>,

    /// What to do with running targets on Ctrl-C: drain or abort
    #[arg(long, env = "BUILDMUX_CANCEL_POLICY")]
    pub cancel_policy: Option<CancelPolicy>,

    /// Workspace to build
    #[arg(short, long, env = "BUILDMUX_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Directory artifacts are exported into
    #[arg(short, long, env = "BUILDMUX_EXPORT_DIR")]
    pub export_dir: Option<PathBuf>,
}

/// Contents of `buildmux.toml`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub cancel_policy: Option<CancelPolicy>,
    pub workspace: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,

    #[serde(default)]
    pub cargo: CargoSection,

    /// Replaces cargo with an arbitrary command; `{triple}` is substituted.
    pub build_command: Option<Vec<String>>,

    /// Files the build command produces (relative to the workspace).
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// `[cargo]` table.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CargoSection {
    pub program: Option<String>,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub binaries: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl FileConfig {
    /// Load `path`, or `buildmux.toml` in the working directory if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_path(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_path(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// How targets are compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildBackend {
    Cargo(CargoConfig),
    Command {
        template: Vec<String>,
        artifacts: Vec<String>,
    },
}

/// Fully merged and validated settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub jobs: usize,
    pub timeout: Duration,
    pub retries: u32,
    pub cancel_policy: CancelPolicy,
    pub workspace: PathBuf,
    pub export_dir: PathBuf,
    pub backend: BuildBackend,
}

impl ResolvedConfig {
    pub fn resolve(args: &SettingsArgs, file: FileConfig) -> Result<Self, ConfigError> {
        let jobs = args.jobs.or(file.jobs).unwrap_or(1);
        if jobs == 0 {
            return Err(ConfigError::Invalid {
                key: "jobs",
                reason: "must be at least 1".to_string(),
            });
        }

        let timeout_secs = args
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }

        let workspace = args
            .workspace
            .clone()
            .or(file.workspace)
            .unwrap_or_else(|| PathBuf::from("."));
        let export_dir = args
            .export_dir
            .clone()
            .or(file.export_dir)
            .unwrap_or_else(|| workspace.join("export"));

        let backend = match file.build_command {
            Some(template) if template.is_empty() => {
                return Err(ConfigError::Invalid {
                    key: "build_command",
                    reason: "must not be empty".to_string(),
                })
            }
            Some(template) => BuildBackend::Command {
                template,
                artifacts: file.artifacts,
            },
            None => BuildBackend::Cargo(CargoConfig {
                workspace: workspace.clone(),
                cargo: file.cargo.program.unwrap_or_else(|| "cargo".to_string()),
                packages: file.cargo.packages,
                binaries: file.cargo.binaries,
                extra_args: file.cargo.args,
            }),
        };

        Ok(Self {
            jobs,
            timeout: Duration::from_secs(timeout_secs),
            retries: args.retries.or(file.retries).unwrap_or(0),
            cancel_policy: args
                .cancel_policy
                .or(file.cancel_policy)
                .unwrap_or_default(),
            workspace,
            export_dir,
            backend,
        })
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::with_timeout(self.timeout)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            parallelism: Parallelism::from_jobs(self.jobs),
            retries: self.retries,
            cancel_policy: self.cancel_policy,
        }
    }
}
