//! Launches the external image-to-mesh generation script.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use forge3d_core::{
    CommandRunner, CommandSpec, GenerationOutcome, GenerationRequest, LineSink, ProcessError,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::process::build_pythonpath;

/// A large folder can take hours on a small GPU.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

pub const BACKGROUND_REMOVAL_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Input not found: {0}")]
    InputMissing(PathBuf),

    #[error("Not a folder of images: {0}")]
    NotAFolder(PathBuf),

    #[error("Generation script not found: {0}")]
    ScriptMissing(PathBuf),

    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Directories the generator process needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPaths {
    pub script: PathBuf,
    pub scripts_dir: Option<PathBuf>,
    pub repo_dir: Option<PathBuf>,
    pub project_root: PathBuf,
}

/// Builds and runs the generator command line.
pub struct GenerationLauncher {
    runner: Arc<dyn CommandRunner>,
    interpreter: PathBuf,
    paths: GenerationPaths,
}

impl GenerationLauncher {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        interpreter: impl Into<PathBuf>,
        paths: GenerationPaths,
    ) -> Self {
        Self {
            runner,
            interpreter: interpreter.into(),
            paths,
        }
    }

    /// `<interpreter> <script> <input> --output <dir> --flag value...`
    pub fn command(
        &self,
        request: &GenerationRequest,
        inherited_pythonpath: Option<&OsStr>,
    ) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.interpreter)
            .arg(self.paths.script.to_string_lossy())
            .arg(request.input.to_string_lossy())
            .arg("--output")
            .arg(request.output_dir.to_string_lossy())
            .args(request.params.to_args())
            .cwd(&self.paths.project_root)
            .timeout(GENERATION_TIMEOUT)
            .label("generate")
            .toolkit_env();
        if let Some(value) = build_pythonpath(
            self.paths.scripts_dir.as_deref(),
            self.paths.repo_dir.as_deref(),
            Some(self.paths.project_root.as_path()),
            inherited_pythonpath,
        ) {
            spec = spec.env("PYTHONPATH", value);
        }
        spec
    }

    fn check_inputs(&self, request: &GenerationRequest) -> Result<(), GenerationError> {
        if !request.input.exists() {
            return Err(GenerationError::InputMissing(request.input.clone()));
        }
        if !self.paths.script.is_file() {
            return Err(GenerationError::ScriptMissing(self.paths.script.clone()));
        }
        Ok(())
    }

    /// Run one generation and classify the transcript.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        sink: &dyn LineSink,
    ) -> Result<GenerationOutcome, GenerationError> {
        self.check_inputs(request)?;
        ensure_output_dir(&request.output_dir).await?;

        let kind = request.input_kind();
        let existing = std::env::var_os("PYTHONPATH");
        let spec = self.command(request, existing.as_deref());
        info!(
            input = %request.input.display(),
            output = %request.output_dir.display(),
            ?kind,
            "Starting generation"
        );
        debug!(command = %spec.display_line(), "Generation command");

        let result = self.runner.run_with_sink(&spec, cancel, sink).await?;
        let outcome = GenerationOutcome::from_transcript(
            kind,
            result.exit_code,
            result.timed_out,
            &result.output,
            &request.output_dir,
        );
        match &outcome {
            GenerationOutcome::Succeeded { .. } => {
                info!(elapsed_secs = result.duration.as_secs(), "Generation finished");
            }
            other => warn!(outcome = ?other, exit_code = result.exit_code, "Generation did not succeed"),
        }
        Ok(outcome)
    }

    /// `<interpreter> <script> <input_dir> --output <dir>`
    pub fn background_command(
        &self,
        script: &Path,
        input_dir: &Path,
        output_dir: &Path,
    ) -> CommandSpec {
        CommandSpec::new(&self.interpreter)
            .arg(script.to_string_lossy())
            .arg(input_dir.to_string_lossy())
            .arg("--output")
            .arg(output_dir.to_string_lossy())
            .cwd(&self.paths.project_root)
            .timeout(BACKGROUND_REMOVAL_TIMEOUT)
            .label("remove background")
    }

    /// Strip backgrounds from every image in `input_dir` into `output_dir`.
    pub async fn remove_background(
        &self,
        script: &Path,
        input_dir: &Path,
        output_dir: &Path,
        cancel: &CancellationToken,
        sink: &dyn LineSink,
    ) -> Result<GenerationOutcome, GenerationError> {
        if !input_dir.exists() {
            return Err(GenerationError::InputMissing(input_dir.to_path_buf()));
        }
        if !input_dir.is_dir() {
            return Err(GenerationError::NotAFolder(input_dir.to_path_buf()));
        }
        if !script.is_file() {
            return Err(GenerationError::ScriptMissing(script.to_path_buf()));
        }
        ensure_output_dir(output_dir).await?;

        let spec = self.background_command(script, input_dir, output_dir);
        info!(
            input = %input_dir.display(),
            output = %output_dir.display(),
            "Removing backgrounds"
        );
        debug!(command = %spec.display_line(), "Background removal command");

        let result = self.runner.run_with_sink(&spec, cancel, sink).await?;
        let outcome = GenerationOutcome::from_background_transcript(
            result.exit_code,
            result.timed_out,
            &result.output,
            output_dir,
        );
        if !matches!(outcome, GenerationOutcome::Succeeded { .. }) {
            warn!(outcome = ?outcome, exit_code = result.exit_code, "Background removal did not succeed");
        }
        Ok(outcome)
    }
}

async fn ensure_output_dir(path: &Path) -> Result<(), GenerationError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| GenerationError::OutputDir {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge3d_core::{GenerationParams, MeshFormat, NoopSink, ProcessResult};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct Canned {
        output: &'static str,
        seen: Mutex<Vec<CommandSpec>>,
    }

    #[async_trait]
    impl CommandRunner for Canned {
        async fn run_with_sink(
            &self,
            spec: &CommandSpec,
            _cancel: &CancellationToken,
            _sink: &dyn LineSink,
        ) -> Result<ProcessResult, ProcessError> {
            self.seen.lock().unwrap().push(spec.clone());
            Ok(ProcessResult {
                exit_code: 0,
                output: self.output.to_string(),
                timed_out: false,
                duration: Duration::from_secs(1),
            })
        }
    }

    fn make_launcher(root: &Path, output: &'static str) -> (GenerationLauncher, Arc<Canned>) {
        let runner = Arc::new(Canned {
            output,
            seen: Mutex::new(Vec::new()),
        });
        let script = root.join("Scripts/batch_hunyuan3d.py");
        std::fs::create_dir_all(script.parent().unwrap()).unwrap();
        std::fs::write(&script, "").unwrap();
        let launcher = GenerationLauncher::new(
            runner.clone(),
            "/venv/bin/python",
            GenerationPaths {
                script,
                scripts_dir: Some(root.join("Scripts")),
                repo_dir: Some(root.join("Hunyuan3D-2")),
                project_root: root.to_path_buf(),
            },
        );
        (launcher, runner)
    }

    #[test]
    fn test_command_line_order() {
        let root = tempdir().unwrap();
        let (launcher, _) = make_launcher(root.path(), "");
        let request = GenerationRequest {
            input: PathBuf::from("cat.png"),
            output_dir: PathBuf::from("out"),
            params: GenerationParams {
                file_type: MeshFormat::Glb,
                ..GenerationParams::default()
            },
        };
        let spec = launcher.command(&request, None);
        assert!(spec.args[0].ends_with("batch_hunyuan3d.py"));
        assert_eq!(&spec.args[1..4], ["cat.png", "--output", "out"]);
        assert!(spec.args.windows(2).any(|w| w == ["--file_type", "glb"]));
        let pythonpath = spec.env_value("PYTHONPATH").unwrap();
        assert!(pythonpath.contains("Scripts"));
        assert!(spec.with_toolkit_env);
    }

    #[tokio::test]
    async fn test_single_image_success() {
        let root = tempdir().unwrap();
        let input = root.path().join("cat.png");
        std::fs::write(&input, b"png").unwrap();
        let (launcher, runner) = make_launcher(root.path(), "cat.png processed successfully\n");

        let request = GenerationRequest {
            input,
            output_dir: root.path().join("out"),
            params: GenerationParams::default(),
        };
        let outcome = launcher
            .generate(&request, &CancellationToken::new(), &NoopSink)
            .await
            .unwrap();
        assert!(matches!(outcome, GenerationOutcome::Succeeded { .. }));
        assert!(root.path().join("out").is_dir());
        assert_eq!(runner.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_background_removal_runs_script_on_folder() {
        let root = tempdir().unwrap();
        let images = root.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        let script = root.path().join("Scripts/remove_background.py");
        let (launcher, runner) = make_launcher(root.path(), "Processing: cat.png\n");
        std::fs::write(&script, "").unwrap();

        let outcome = launcher
            .remove_background(
                &script,
                &images,
                &root.path().join("clean"),
                &CancellationToken::new(),
                &NoopSink,
            )
            .await
            .unwrap();
        assert!(matches!(outcome, GenerationOutcome::Succeeded { .. }));
        assert!(root.path().join("clean").is_dir());

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].args[0].ends_with("remove_background.py"));
        assert_eq!(seen[0].args[2], "--output");
        assert!(!seen[0].with_toolkit_env);
    }

    #[tokio::test]
    async fn test_background_removal_rejects_single_file() {
        let root = tempdir().unwrap();
        let image = root.path().join("cat.png");
        std::fs::write(&image, b"png").unwrap();
        let script = root.path().join("Scripts/remove_background.py");
        let (launcher, runner) = make_launcher(root.path(), "");
        std::fs::write(&script, "").unwrap();

        let err = launcher
            .remove_background(
                &script,
                &image,
                &root.path().join("clean"),
                &CancellationToken::new(),
                &NoopSink,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NotAFolder(_)));
        assert!(runner.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_never_spawns() {
        let root = tempdir().unwrap();
        let (launcher, runner) = make_launcher(root.path(), "");
        let request = GenerationRequest {
            input: root.path().join("nope.png"),
            output_dir: root.path().join("out"),
            params: GenerationParams::default(),
        };
        let err = launcher
            .generate(&request, &CancellationToken::new(), &NoopSink)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::InputMissing(_)));
        assert!(runner.seen.lock().unwrap().is_empty());
    }
}
