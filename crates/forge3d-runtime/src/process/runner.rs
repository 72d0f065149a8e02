//! Tokio-based implementation of the `CommandRunner` port.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use forge3d_core::{CommandRunner, CommandSpec, LineSink, ProcessError, ProcessResult};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::shutdown::{kill_group, kill_tree, terminate_tree};
use super::stream::spawn_line_reader;
use super::toolkit::{ToolkitLocation, ToolkitLocator};

/// How long to keep draining output after the child exited or was killed.
///
/// Also bounds how long a descendant may hold the pipes open once the
/// child itself has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

enum Ending {
    Exited(i32),
    TimedOut,
    Cancelled,
}

/// Runs commands as tokio child processes.
///
/// Each child is a process-group leader on Unix so a timeout or
/// cancellation takes down everything it spawned. Children are also
/// `kill_on_drop`, so an aborted task never leaks one.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner {
    toolkit: Option<ToolkitLocation>,
}

impl TokioCommandRunner {
    /// Runner with the toolkit found by [`ToolkitLocator::from_system`].
    pub fn new() -> Self {
        Self::with_toolkit(ToolkitLocator::from_system().locate())
    }

    pub const fn with_toolkit(toolkit: Option<ToolkitLocation>) -> Self {
        Self { toolkit }
    }

    pub const fn toolkit(&self) -> Option<&ToolkitLocation> {
        self.toolkit.as_ref()
    }

    fn build_command(&self, spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        if spec.with_toolkit_env {
            if let Some(toolkit) = &self.toolkit {
                toolkit.apply(&mut cmd);
            }
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run_with_sink(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
        sink: &dyn LineSink,
    ) -> Result<ProcessResult, ProcessError> {
        let started = Instant::now();
        debug!(command = %spec.display_line(), timeout_secs = spec.timeout.as_secs(), "Spawning");

        let mut child = self
            .build_command(spec)
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed {
                program: spec.program.display().to_string(),
                reason: e.to_string(),
            })?;

        let leader_pid = child.id();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, spec.label.clone(), "stdout", tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, spec.label.clone(), "stderr", tx.clone()));
        }
        drop(tx);

        let mut transcript = String::new();
        let push = |line: String, transcript: &mut String| {
            sink.line(&spec.label, &line);
            transcript.push_str(&line);
            transcript.push('\n');
        };

        let deadline = tokio::time::sleep(spec.timeout);
        tokio::pin!(deadline);
        // Armed once the child exits; caps how long inherited pipes may linger.
        let linger = tokio::time::sleep(spec.timeout);
        tokio::pin!(linger);

        let mut exit_code: Option<i32> = None;
        let mut streams_open = true;
        let mut lingering = false;

        let ending = loop {
            if let (Some(code), false) = (exit_code, streams_open) {
                break Ending::Exited(code);
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => break Ending::Cancelled,
                () = &mut deadline, if exit_code.is_none() => break Ending::TimedOut,
                () = &mut linger, if exit_code.is_some() => {
                    lingering = true;
                    break Ending::Exited(exit_code.unwrap_or(-1));
                }
                line = rx.recv(), if streams_open => match line {
                    Some(line) => push(line, &mut transcript),
                    None => streams_open = false,
                },
                status = child.wait(), if exit_code.is_none() => {
                    let status = status.map_err(|source| ProcessError::Io {
                        program: spec.label.clone(),
                        source,
                    })?;
                    exit_code = Some(status.code().unwrap_or(-1));
                    linger
                        .as_mut()
                        .reset(tokio::time::Instant::now() + DRAIN_TIMEOUT);
                }
            }
        };

        match ending {
            Ending::TimedOut => {
                if let Err(e) = kill_tree(&mut child).await {
                    warn!(command = %spec.label, error = %e, "Failed to reap child");
                }
            }
            Ending::Cancelled => {
                if let Err(e) = terminate_tree(&mut child).await {
                    warn!(command = %spec.label, error = %e, "Failed to reap child");
                }
            }
            Ending::Exited(code) if lingering => {
                debug!(command = %spec.label, exit_code = code, "Exited with descendants holding its output open");
                kill_group(leader_pid);
            }
            Ending::Exited(_) => {}
        }

        // Whatever the readers still hold after the kill.
        let _ = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while let Some(line) = rx.recv().await {
                push(line, &mut transcript);
            }
        })
        .await;
        for reader in readers {
            reader.abort();
        }

        let duration = started.elapsed();
        match ending {
            Ending::Exited(code) => {
                debug!(command = %spec.label, exit_code = code, elapsed_ms = duration.as_millis(), "Finished");
                Ok(ProcessResult {
                    exit_code: code,
                    output: transcript,
                    timed_out: false,
                    duration,
                })
            }
            Ending::TimedOut => {
                info!(command = %spec.label, timeout_secs = spec.timeout.as_secs(), "Command timed out and was killed");
                Ok(ProcessResult {
                    exit_code: -1,
                    output: transcript,
                    timed_out: true,
                    duration,
                })
            }
            Ending::Cancelled => {
                info!(command = %spec.label, "Command cancelled");
                Err(ProcessError::Cancelled(spec.label.clone()))
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use forge3d_core::NoopSink;
    use std::sync::Mutex;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh")
            .args(["-c", script])
            .timeout(Duration::from_secs(10))
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl LineSink for Collect {
        fn line(&self, _label: &str, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_ok() {
        let runner = TokioCommandRunner::with_toolkit(None);
        let result = runner
            .run(&sh("echo out; echo err 1>&2; exit 3"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!result.timed_out);
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
    }

    #[tokio::test]
    async fn test_sink_sees_lines() {
        let runner = TokioCommandRunner::with_toolkit(None);
        let sink = Collect::default();
        runner
            .run_with_sink(&sh("echo a; echo b"), &CancellationToken::new(), &sink)
            .await
            .unwrap();
        assert_eq!(*sink.0.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_err() {
        let runner = TokioCommandRunner::with_toolkit(None);
        let err = runner
            .run(
                &CommandSpec::new("/definitely/not/a/program"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_env_and_cwd_applied() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TokioCommandRunner::with_toolkit(None);
        let spec = sh("echo $FORGE3D_TEST_VAR; pwd")
            .env("FORGE3D_TEST_VAR", "hello")
            .cwd(dir.path());
        let result = runner.run(&spec, &CancellationToken::new()).await.unwrap();
        assert!(result.output.starts_with("hello\n"));
        let canonical = std::fs::canonicalize(dir.path()).unwrap();
        assert!(result.output.contains(&*canonical.to_string_lossy()));
    }

    #[tokio::test]
    async fn test_toolkit_env_only_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TokioCommandRunner::with_toolkit(Some(ToolkitLocation {
            root: dir.path().to_path_buf(),
            version: None,
        }));
        let plain = runner
            .run(&sh("echo \"[$CUDA_HOME]\""), &CancellationToken::new())
            .await
            .unwrap();
        let with_env = runner
            .run(
                &sh("echo \"[$CUDA_HOME]\"").toolkit_env(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        if std::env::var_os("CUDA_HOME").is_none() {
            assert!(plain.output.contains("[]"));
        }
        assert!(with_env.output.contains(&*dir.path().to_string_lossy()));
    }

    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let runner = TokioCommandRunner::with_toolkit(None);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = runner
            .run_with_sink(&sh("sleep 10"), &cancel, &NoopSink)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
