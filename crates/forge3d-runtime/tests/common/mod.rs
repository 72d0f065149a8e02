//! Shared fixtures for runtime integration tests.
//!
//! `ScriptedRunner` answers commands by substring match on the display line
//! instead of spawning anything. Unmatched commands fail to spawn, which
//! the probe treats as "tool absent".

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use forge3d_core::{
    CommandRunner, CommandSpec, DependencyGroup, InstallationMode, LineSink, ProcessError,
    ProcessResult, SessionState,
};
use forge3d_runtime::{Dispatcher, OrchestratorConfig, ProbeConfig};
use tokio_util::sync::CancellationToken;

pub const FAKE_PYTHON: &str = "/fake/python";

pub const MSVC_FAILURE: &str = "nvcc fatal   : Host compiler targets unsupported OS.\n\
    C:/cuda/include/crt/host_config.h(153): fatal error C1189: #error:  -- unsupported \
    Microsoft Visual Studio version! Only the versions between 2017 and 2022 are supported!\n\
    error: command 'nvcc.exe' failed with exit code 2\n";

pub const NINJA_FAILURE: &str = "FAILED: rasterizer.o\nninja: build stopped: subcommand failed.\n";

pub const BUILD_OK: &str = "running install\nFinished processing dependencies for custom-rasterizer==0.1\n";

#[derive(Debug, Clone)]
pub enum Reply {
    Exit(i32, &'static str),
    TimedOut,
}

struct Rule {
    needle: &'static str,
    replies: Mutex<VecDeque<Reply>>,
}

/// Fake `CommandRunner` driven by substring rules. First match wins; a rule
/// with several replies hands them out in order and repeats the last one.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    envs: Mutex<Vec<Vec<(String, String)>>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on(self, needle: &'static str, exit_code: i32, output: &'static str) -> Self {
        self.on_seq(needle, vec![Reply::Exit(exit_code, output)])
    }

    #[must_use]
    pub fn on_seq(mut self, needle: &'static str, replies: Vec<Reply>) -> Self {
        self.rules.push(Rule {
            needle,
            replies: Mutex::new(replies.into()),
        });
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answers for a healthy Linux box with a CUDA 12 driver and toolkit.
    #[must_use]
    pub fn healthy_gpu_machine(self) -> Self {
        self.on(
            "/fake/python --version",
            0,
            "Python 3.10.12\n",
        )
        .on("-m pip --version", 0, "pip 23.2.1 from /usr/lib/python3/dist-packages/pip\n")
        .on(
            "nvidia-smi",
            0,
            "| NVIDIA-SMI 535.104.05   Driver Version: 535.104.05   CUDA Version: 12.2     |\n",
        )
        .on(
            "nvcc --version",
            0,
            "Cuda compilation tools, release 12.1, V12.1.105\n",
        )
        .on("c++ --version", 0, "c++ (GCC) 12.2.0\n")
        .on("-m pip install -e", 0, "Successfully installed hy3dgen-2.0.0\n")
        .on("-m pip install", 0, "Successfully installed package-1.0\n")
        .on("-m pip show", 0, "Name: package\nVersion: 1.0\n")
        .on("import hy3dgen.shapegen", 0, "[OK]\n")
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }

    /// Value of `key` in the environment of each call matching `needle`, in call order.
    pub fn env_values(&self, needle: &str, key: &str) -> Vec<Option<String>> {
        let calls = self.calls();
        let envs = self.envs.lock().unwrap();
        calls
            .iter()
            .zip(envs.iter())
            .filter(|(call, _)| call.contains(needle))
            .map(|(_, env)| {
                env.iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
            })
            .collect()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn reply_for(&self, line: &str) -> Option<Reply> {
        let rule = self.rules.iter().find(|r| line.contains(r.needle))?;
        let mut replies = rule.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run_with_sink(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
        sink: &dyn LineSink,
    ) -> Result<ProcessResult, ProcessError> {
        let line = spec.display_line();
        self.calls.lock().unwrap().push(line.clone());
        self.envs.lock().unwrap().push(spec.env.clone());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let cancelled = tokio::select! {
            () = cancel.cancelled() => true,
            () = tokio::time::sleep(self.delay) => false,
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        if cancelled {
            return Err(ProcessError::Cancelled(spec.label.clone()));
        }

        match self.reply_for(&line) {
            Some(Reply::Exit(exit_code, output)) => {
                for l in output.lines() {
                    sink.line(&spec.label, l);
                }
                Ok(ProcessResult {
                    exit_code,
                    output: output.to_string(),
                    timed_out: false,
                    duration: self.delay,
                })
            }
            Some(Reply::TimedOut) => Ok(ProcessResult {
                exit_code: -1,
                output: String::new(),
                timed_out: true,
                duration: spec.timeout,
            }),
            None => Err(ProcessError::SpawnFailed {
                program: spec.program.display().to_string(),
                reason: "No such file or directory (os error 2)".to_string(),
            }),
        }
    }
}

/// Lay out a generator checkout with both extension sources.
pub fn fake_repository(root: &Path) -> PathBuf {
    let repo = root.join("Hunyuan3D-2");
    std::fs::create_dir_all(repo.join("hy3dgen")).unwrap();
    std::fs::write(repo.join("setup.py"), "from setuptools import setup\nsetup(name='hy3dgen')\n")
        .unwrap();
    for dir in [
        "hy3dgen/texgen/custom_rasterizer",
        "hy3dgen/texgen/differentiable_renderer",
    ] {
        let dir = repo.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("setup.py"), "from setuptools import setup\nsetup(name='ext')\n")
            .unwrap();
    }
    repo
}

pub fn config_for(root: &Path, mode: InstallationMode) -> OrchestratorConfig {
    let repo_dir = root.join("Hunyuan3D-2");
    OrchestratorConfig {
        requested_mode: mode,
        prefer_uv: false,
        failure_policy: forge3d_core::FailurePolicy::FailFast,
        probe: ProbeConfig {
            configured_interpreter: Some(PathBuf::from(FAKE_PYTHON)),
            project_root: root.to_path_buf(),
            repo_dir: Some(repo_dir.clone()),
        },
        repo_dir,
        repo_url: "https://example.invalid/Hunyuan3D-2".to_string(),
        scripts_dir: None,
        groups: DependencyGroup::default_sequence(),
    }
}

/// Drain everything the session posted.
pub fn settle(dispatcher: &mut Dispatcher<SessionState>, state: &mut SessionState) {
    while dispatcher.tick(state) > 0 {}
}
