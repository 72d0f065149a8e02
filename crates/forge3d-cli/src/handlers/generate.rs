//! `forge3d generate` and `forge3d remove-background`: run the external
//! generation and preprocessing scripts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use forge3d_core::settings::{DEFAULT_BACKGROUND_SCRIPT, DEFAULT_GENERATION_SCRIPT};
use forge3d_core::{
    GenerationOutcome, GenerationParams, GenerationRequest, LineSink,
    NonInteractiveModePrompt,
};
use forge3d_runtime::{GenerationLauncher, GenerationPaths, resolve_mode};
use tokio_util::sync::CancellationToken;

use super::{cancel_on_interrupt, probe};
use crate::bootstrap::CliContext;
use crate::commands::GenerateArgs;
use crate::presentation::{GREEN, RED, RESET, YELLOW};

/// Echoes generator output as it arrives.
struct EchoSink;

impl LineSink for EchoSink {
    fn line(&self, _label: &str, line: &str) {
        println!("  {line}");
    }
}

/// Settings defaults with the command-line overrides applied.
fn params(defaults: &GenerationParams, args: &GenerateArgs) -> GenerationParams {
    let mut params = defaults.clone();
    if let Some(file_type) = args.file_type {
        params.file_type = file_type;
    }
    if let Some(steps) = args.steps {
        params.steps = steps;
    }
    if let Some(scale) = args.guidance_scale {
        params.guidance_scale = scale;
    }
    if let Some(seed) = args.seed {
        params.seed = seed;
    }
    if let Some(resolution) = args.octree_resolution {
        params.octree_resolution = resolution;
    }
    if let Some(device) = &args.device {
        params.device = Some(device.clone());
    }
    params.disable_texture |= args.disable_texture;
    params.low_vram_mode |= args.low_vram;
    params
}

pub async fn execute(ctx: &CliContext, args: GenerateArgs) -> Result<()> {
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let snapshot = probe(ctx, &cancel).await?;
    let Some(interpreter) = snapshot.interpreter.clone() else {
        bail!("No interpreter found; run `forge3d install` first");
    };

    let mut params = params(&ctx.settings.generation, &args);
    if params.device.is_none() {
        let mode = resolve_mode(
            ctx.settings.installation_mode,
            &snapshot,
            &NonInteractiveModePrompt,
        );
        params.device = Some(if mode.is_accelerated() { "cuda" } else { "cpu" }.to_string());
    }

    let output_dir = args
        .output
        .clone()
        .or_else(|| ctx.settings.output_dir.clone())
        .unwrap_or_else(|| ctx.project_root.join("output"));
    let launcher = launcher(ctx, interpreter);
    let request = GenerationRequest {
        input: args.input,
        output_dir,
        params,
    };

    println!(
        "Generating from {} into {}",
        request.input.display(),
        request.output_dir.display()
    );
    let outcome = launcher
        .generate(&request, &cancel, &EchoSink)
        .await
        .context("Generation could not run")?;

    report(outcome, "Meshes", "Generation")
}

fn launcher(ctx: &CliContext, interpreter: PathBuf) -> GenerationLauncher {
    let scripts_dir = ctx.scripts_dir();
    GenerationLauncher::new(
        ctx.runner.clone(),
        interpreter,
        GenerationPaths {
            script: scripts_dir.join(DEFAULT_GENERATION_SCRIPT),
            scripts_dir: Some(scripts_dir),
            repo_dir: Some(ctx.repo_dir()),
            project_root: ctx.project_root.clone(),
        },
    )
}

/// `images` becomes `images_no_background` next to it.
fn default_background_output(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "images".to_string());
    input.with_file_name(format!("{name}_no_background"))
}

pub async fn remove_background(
    ctx: &CliContext,
    input: PathBuf,
    output: Option<PathBuf>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let snapshot = probe(ctx, &cancel).await?;
    let Some(interpreter) = snapshot.interpreter.clone() else {
        bail!("No interpreter found; run `forge3d install` first");
    };

    let output = output.unwrap_or_else(|| default_background_output(&input));
    let script = ctx.scripts_dir().join(DEFAULT_BACKGROUND_SCRIPT);
    println!(
        "Removing backgrounds from {} into {}",
        input.display(),
        output.display()
    );
    let outcome = launcher(ctx, interpreter)
        .remove_background(&script, &input, &output, &cancel, &EchoSink)
        .await
        .context("Background removal could not run")?;
    report(outcome, "Images", "Background removal")
}

fn report(outcome: GenerationOutcome, produced: &str, task: &str) -> Result<()> {
    match outcome {
        GenerationOutcome::Succeeded { output_dir } => {
            println!("{GREEN}✓ {produced} written to {}{RESET}", output_dir.display());
            Ok(())
        }
        GenerationOutcome::MissingDependencies { module } => {
            println!(
                "{YELLOW}{task} is missing {}.{RESET}",
                module.as_deref().unwrap_or("a dependency")
            );
            bail!("Run `forge3d install` (or `forge3d diagnose` to see what is missing)")
        }
        GenerationOutcome::Failed { exit_code, summary } => {
            println!("{RED}✗ {summary}{RESET}");
            bail!("{task} failed with exit code {exit_code}")
        }
        GenerationOutcome::TimedOut => bail!("{task} did not finish in time and was stopped"),
    }
}
