//! Kill-and-reap for timed-out or cancelled children.
//!
//! Timeouts kill the group outright; cancellation gets a short grace
//! period first.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::debug;

#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;

/// Time a process group gets between SIGTERM and SIGKILL.
const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Terminate a child and everything in its process group, then reap it.
///
/// # Strategy
/// 1. SIGTERM to the whole group, wait up to [`GRACE_PERIOD`]
/// 2. SIGKILL to the group and the child
/// 3. Wait for reaping (required to avoid zombies)
///
/// The child must have been spawned as a group leader (`process_group(0)`).
/// On Windows the child is killed directly.
pub async fn terminate_tree(child: &mut Child) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        terminate_unix(child).await
    }

    #[cfg(not(unix))]
    {
        child.kill().await?;
        child.wait().await
    }
}

/// SIGKILL the child's whole process group at once, then reap the child.
pub async fn kill_tree(child: &mut Child) -> io::Result<ExitStatus> {
    kill_group(child.id());
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "start_kill after group SIGKILL failed");
    }
    child.wait().await
}

/// SIGKILL every process left in the group led by `leader_pid`.
///
/// Also used after the leader exited while descendants still held its
/// pipes. A no-op off Unix, where children are not group leaders.
pub fn kill_group(leader_pid: Option<u32>) {
    #[cfg(unix)]
    {
        let Some(pid) = leader_pid else { return };
        match i32::try_from(pid) {
            Ok(raw) => signal_group(Pid::from_raw(raw), Signal::SIGKILL),
            Err(e) => debug!(pid, error = %e, "pid out of range"),
        }
    }

    #[cfg(not(unix))]
    let _ = leader_pid;
}

#[cfg(unix)]
async fn terminate_unix(child: &mut Child) -> io::Result<ExitStatus> {
    let Some(raw) = child.id() else {
        // Already reaped.
        return child.wait().await;
    };
    let pgid = Pid::from_raw(i32::try_from(raw).map_err(io::Error::other)?);

    signal_group(pgid, Signal::SIGTERM);
    if let Ok(result) = timeout(GRACE_PERIOD, child.wait()).await {
        // Leader exited; make sure stragglers in the group go too.
        signal_group(pgid, Signal::SIGKILL);
        return result;
    }

    signal_group(pgid, Signal::SIGKILL);
    if let Err(e) = child.start_kill() {
        debug!(pid = raw, error = %e, "start_kill after group SIGKILL failed");
    }
    child.wait().await
}

#[cfg(unix)]
fn signal_group(pgid: Pid, signal: Signal) {
    match killpg(pgid, signal) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => debug!(pgid = %pgid, ?signal, error = %e, "killpg failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    #[cfg(unix)]
    async fn test_terminate_running_group() {
        let mut child = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .expect("failed to spawn sleep");

        let status = terminate_tree(&mut child).await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_kill_ignores_sigterm_trap() {
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; sleep 30"])
            .process_group(0)
            .spawn()
            .expect("failed to spawn sh");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        let status = kill_tree(&mut child).await.unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_terminate_already_exited() {
        let mut child = Command::new("true")
            .process_group(0)
            .spawn()
            .expect("failed to spawn true");
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(terminate_tree(&mut child).await.is_ok());
    }
}
