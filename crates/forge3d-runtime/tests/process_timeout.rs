//! Timeouts against real processes: the whole process group goes down.

#![cfg(unix)]

use std::time::{Duration, Instant};

use forge3d_core::{CommandRunner, CommandSpec};
use forge3d_runtime::TokioCommandRunner;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_timeout_kills_descendants() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("survived");
    let script = format!(
        "(sleep 2; echo late > '{}') & echo started; sleep 30",
        marker.display()
    );
    let spec = CommandSpec::new("sh")
        .args(["-c", script.as_str()])
        .timeout(Duration::from_secs(1))
        .label("sleeper");

    let runner = TokioCommandRunner::with_toolkit(None);
    let started = Instant::now();
    let result = runner.run(&spec, &CancellationToken::new()).await.unwrap();

    assert!(result.timed_out);
    assert_eq!(result.exit_code, -1);
    assert!(result.output.contains("started"));
    assert!(started.elapsed() < Duration::from_secs(2));

    // The background subshell was in the same group and must not get to
    // write its marker.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_fast_command_is_not_timed_out() {
    let spec = CommandSpec::new("sh")
        .args(["-c", "echo done"])
        .timeout(Duration::from_secs(5));
    let result = TokioCommandRunner::with_toolkit(None)
        .run(&spec, &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.success());
    assert!(!result.timed_out);
    assert_eq!(result.output, "done\n");
}

#[tokio::test]
async fn test_timeout_does_not_wait_for_sigterm() {
    let spec = CommandSpec::new("sh")
        .args(["-c", "trap '' TERM; sleep 10"])
        .timeout(Duration::from_secs(1));

    let started = Instant::now();
    let result = TokioCommandRunner::with_toolkit(None)
        .run(&spec, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.timed_out);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_exit_is_reported_while_background_child_holds_output() {
    let spec = CommandSpec::new("sh")
        .args(["-c", "sleep 8 & echo Successfully installed x; exit 0"])
        .timeout(Duration::from_secs(3))
        .label("pip install x");

    let started = Instant::now();
    let result = TokioCommandRunner::with_toolkit(None)
        .run(&spec, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.timed_out);
    assert_eq!(result.exit_code, 0);
    assert!(result.output.contains("Successfully installed x"));
    assert!(started.elapsed() < Duration::from_secs(2));
}
