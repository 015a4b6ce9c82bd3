//! buildmux - target-matrix build dispatcher
//!
//! Builds one workspace for every target triple in a named profile and
//! exports each target's binaries under its export name.
//!
//! ```text
//! buildmux global            # build and export every target in `global`
//! buildmux --list            # show the profile menu
//! buildmux                   # pick a profile interactively
//! ```

mod config;

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use buildmux_cargo::{CargoToolchain, CommandToolchain, FsExporter};
use buildmux_core::{
    exit_code_for_error, menu, prompt_profile, report, ArtifactExporter, BuildExecutor,
    BuildOutcome, CancelToken, DispatchError, RunCoordinator, RunResult, Summary, TargetMatrix,
    ToolchainInvoker, EXIT_SETUP,
};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn, Level};
use uuid::Uuid;

use crate::config::{BuildBackend, FileConfig, ResolvedConfig, SettingsArgs};

#[derive(Parser, Debug)]
#[command(name = "buildmux")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build a workspace for every target in a profile", long_about = None)]
struct Cli {
    /// Profile to build (prompted for when omitted)
    profile: Option<String>,

    /// List the available profiles and exit
    #[arg(long)]
    list: bool,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Config file (default: ./buildmux.toml if present)
    #[arg(short, long, env = "BUILDMUX_CONFIG")]
    config: Option<PathBuf>,

    /// Summary format on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Also write the full run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Persisted run report.
#[derive(Debug, Serialize)]
struct ReportFile<'a> {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    summary: &'a Summary,
    outcomes: &'a [BuildOutcome],
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    buildmux_core::init_tracing(cli.json_logs, level);

    let code = execute(cli, BufReader::new(std::io::stdin())).await;
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Run the command and map every failure to its exit code.
async fn execute<R>(cli: Cli, input: R) -> i32
where
    R: BufRead + Send + 'static,
{
    match run(cli, input).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("✗ {e:#}");
            EXIT_SETUP
        }
    }
}

/// `input` feeds the interactive prompt when no profile is given.
async fn run<R>(cli: Cli, input: R) -> Result<i32>
where
    R: BufRead + Send + 'static,
{
    let matrix = Arc::new(TargetMatrix::builtin());

    if cli.list {
        print!("{}", menu(&matrix));
        return Ok(0);
    }

    let file = FileConfig::load(cli.config.as_deref())?;
    let config = ResolvedConfig::resolve(&cli.settings, file)?;

    let profile = match cli.profile {
        Some(profile) => profile,
        None => match prompt_interactive(Arc::clone(&matrix), input).await? {
            Ok(profile) => profile,
            Err(e) => return Ok(dispatch_failed(&e)),
        },
    };

    let coordinator = RunCoordinator::new(
        matrix,
        build_executor(&config),
        config.coordinator_config(),
    );

    let cancel = CancelToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let run_id = Uuid::new_v4();
    info!(
        run_id = %run_id,
        profile = %profile,
        jobs = config.jobs,
        timeout_secs = config.timeout.as_secs(),
        export_dir = %config.export_dir.display(),
        "starting run"
    );

    let result = match coordinator.run_with_cancel(&profile, &cancel).await {
        Ok(result) => result,
        Err(e) => return Ok(dispatch_failed(&e)),
    };
    let summary = report(&result);

    match cli.format {
        OutputFormat::Text => print_text(&result, &summary),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    if let Some(path) = &cli.report {
        write_report(path, run_id, &summary, &result)?;
        info!(path = %path.display(), "report written");
    }

    Ok(summary.exit_code)
}

fn build_executor(config: &ResolvedConfig) -> BuildExecutor {
    let toolchain: Arc<dyn ToolchainInvoker> = match &config.backend {
        BuildBackend::Cargo(cargo) => Arc::new(CargoToolchain::new(cargo.clone())),
        BuildBackend::Command {
            template,
            artifacts,
        } => Arc::new(
            CommandToolchain::new(template.clone(), &config.workspace)
                .with_artifacts(artifacts.clone()),
        ),
    };
    let exporter: Arc<dyn ArtifactExporter> = Arc::new(FsExporter::new(&config.export_dir));

    BuildExecutor::new(toolchain, exporter, config.executor_config())
}

/// Show the menu on stdout and read the choice from `input`.
async fn prompt_interactive<R>(
    matrix: Arc<TargetMatrix>,
    input: R,
) -> Result<std::result::Result<String, DispatchError>>
where
    R: BufRead + Send + 'static,
{
    tokio::task::spawn_blocking(move || prompt_profile(&matrix, input, std::io::stdout()))
        .await
        .context("profile prompt task failed")
}

fn spawn_ctrl_c_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });
}

fn dispatch_failed(err: &DispatchError) -> i32 {
    eprintln!("✗ {err}");
    exit_code_for_error(err)
}

fn print_text(result: &RunResult, summary: &Summary) {
    println!("Profile: {}", result.profile);
    for line in outcome_lines(&result.outcomes) {
        println!("{line}");
    }
    println!();
    print!("{}", summary.render_text());
    let _ = std::io::stdout().flush();
}

fn outcome_lines(outcomes: &[BuildOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .map(|o| {
            let mark = if o.is_success() { "✓" } else { "✗" };
            let mut line = format!("  {mark} {} ({} ms)", o.target, o.duration_ms);
            if o.attempts > 1 {
                line.push_str(&format!(" after {} attempts", o.attempts));
            }
            if let Some(diagnostic) = &o.diagnostic {
                line.push_str(&format!(": {diagnostic}"));
            }
            line
        })
        .collect()
}

fn write_report(path: &Path, run_id: Uuid, summary: &Summary, result: &RunResult) -> Result<()> {
    let report = ReportFile {
        run_id,
        generated_at: Utc::now(),
        summary,
        outcomes: &result.outcomes,
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))
}
