//! External command description and its recorded result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Interpreter and toolkit version probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
/// Package installs and show checks.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(20 * 60);
/// Native extension builds.
pub const BUILD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Repository clone.
pub const CLONE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// An external command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Overrides layered over the inherited environment.
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
    /// Short name used in logs (`pip install numpy`).
    pub label: String,
    /// Apply the accelerator toolkit environment (home dir + PATH prefix).
    pub with_toolkit_env: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let label = program
            .file_name()
            .map_or_else(|| program.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            program,
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout: PROBE_TIMEOUT,
            label,
            with_toolkit_env: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub const fn toolkit_env(mut self) -> Self {
        self.with_toolkit_env = true;
        self
    }

    /// Value of an env override, last write wins.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `program arg1 arg2` for display.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Outcome of one completed run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// `-1` when the child was killed or ended by a signal.
    pub exit_code: i32,
    /// Interleaved stdout and stderr in arrival order.
    pub output: String,
    pub timed_out: bool,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl ProcessResult {
    pub const fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.output.contains(needle)
    }

    /// Last `n` lines of the transcript, for error summaries.
    pub fn tail(&self, n: usize) -> String {
        let lines: Vec<&str> = self.output.lines().collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].join("\n")
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
