//! Integration tests: process-backed collaborators driven by the coordinator.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use buildmux_cargo::{CommandToolchain, FsExporter};
use buildmux_core::{
    report, BuildExecutor, BuildProfile, CoordinatorConfig, ExecutorConfig, FailureKind,
    RunCoordinator, RunStatus, TargetMatrix,
};

fn matrix() -> TargetMatrix {
    TargetMatrix::builder()
        .profile(
            BuildProfile::from_pairs(
                "global",
                &[
                    "x86_64-unknown-linux-gnu",
                    "x86_64-unknown-linux-musl",
                    "x86_64-pc-windows-gnu",
                ],
                &["linx86_64-libc", "linx86_64-musl", "winx86_64"],
            )
            .unwrap(),
        )
        .build()
        .unwrap()
}

fn shell(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Test: each triple's output lands under its export name
#[tokio::test]
async fn test_command_build_exports_each_target() {
    let work = tempfile::tempdir().unwrap();
    let export = tempfile::tempdir().unwrap();

    let toolchain = CommandToolchain::new(
        shell("mkdir -p out/{triple} && echo {triple} > out/{triple}/msat"),
        work.path(),
    )
    .with_artifacts(vec!["out/{triple}/msat".to_string()]);

    let executor = BuildExecutor::new(
        Arc::new(toolchain),
        Arc::new(FsExporter::new(export.path())),
        ExecutorConfig::with_timeout(Duration::from_secs(30)),
    );
    let coordinator = RunCoordinator::new(Arc::new(matrix()), executor, CoordinatorConfig::default());

    let result = coordinator.run("global").await.expect("run failed");

    assert_eq!(result.status, RunStatus::AllSucceeded);
    let musl = std::fs::read_to_string(export.path().join("linx86_64-musl/msat")).unwrap();
    assert_eq!(musl.trim(), "x86_64-unknown-linux-musl");
    assert!(export.path().join("winx86_64/msat").exists());
}

/// Test: a failing build for one triple does not stop the others
#[tokio::test]
async fn test_failing_triple_is_isolated() {
    let work = tempfile::tempdir().unwrap();
    let export = tempfile::tempdir().unwrap();

    let script = r#"case {triple} in
        *musl) echo "error: linker not found" >&2; exit 101 ;;
        *) mkdir -p out/{triple} && touch out/{triple}/msat ;;
    esac"#;
    let toolchain = CommandToolchain::new(shell(script), work.path())
        .with_artifacts(vec!["out/{triple}/msat".to_string()]);

    let executor = BuildExecutor::new(
        Arc::new(toolchain),
        Arc::new(FsExporter::new(export.path())),
        ExecutorConfig::with_timeout(Duration::from_secs(30)),
    );
    let coordinator = RunCoordinator::new(Arc::new(matrix()), executor, CoordinatorConfig::default());

    let result = coordinator.run("global").await.expect("run failed");
    let summary = report(&result);

    assert_eq!(result.status, RunStatus::PartialFailure);
    assert_eq!(summary.exit_code, 1);
    assert_eq!(
        result.outcomes[1].diagnostic.as_deref(),
        Some("exit code 101: error: linker not found")
    );
    assert!(result.outcomes[0].is_success());
    assert!(result.outcomes[2].is_success());
    assert!(!export.path().join("linx86_64-musl").exists());
}

/// Test: a hung build is killed at the timeout
#[tokio::test]
async fn test_hung_build_times_out() {
    let work = tempfile::tempdir().unwrap();
    let export = tempfile::tempdir().unwrap();

    let executor = BuildExecutor::new(
        Arc::new(CommandToolchain::new(shell("sleep 30"), work.path())),
        Arc::new(FsExporter::new(export.path())),
        ExecutorConfig::with_timeout(Duration::from_millis(200)),
    );
    let target = matrix().lookup("global").unwrap().targets()[0].clone();

    let outcome = executor.execute(&target).await;

    assert_eq!(outcome.failure, Some(FailureKind::Timeout));
    assert_eq!(outcome.diagnostic.as_deref(), Some("timeout"));
}
