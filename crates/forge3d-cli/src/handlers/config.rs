//! Config command handler.

use std::path::Path;

use anyhow::{Context, Result, bail};
use forge3d_core::Settings;
use forge3d_core::settings::SettingsError;
use forge3d_core::settings::SETTING_KEYS;

use crate::bootstrap::CliContext;
use crate::config_commands::ConfigCommand;
use crate::presentation::format_optional;

pub fn execute(ctx: &CliContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show { json } => show(&ctx.settings, json),
        ConfigCommand::Set { key, value } => {
            let updated = set_and_save(&ctx.settings_path, &key, &value)?;
            println!("✓ {key} updated");
            show(&updated, false)
        }
        ConfigCommand::Path => {
            println!("{}", ctx.settings_path.display());
            Ok(())
        }
    }
}

/// Load the persisted record, change one key and write it back.
///
/// Starts from the file rather than the in-memory settings so command-line
/// overrides are never persisted.
fn set_and_save(path: &Path, key: &str, value: &str) -> Result<Settings> {
    let mut settings = Settings::load(path)?;
    if let Err(e) = settings.set(key, value) {
        if matches!(e, SettingsError::UnknownKey(_)) {
            bail!("{e}. Valid keys: {}", SETTING_KEYS.join(", "));
        }
        return Err(e.into());
    }
    settings
        .save(path)
        .with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(settings)
}

fn show(settings: &Settings, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    let path = |p: Option<&std::path::PathBuf>| {
        format_optional(p.map(|p| p.display()).as_ref(), "(default)")
    };
    println!("Current settings:");
    println!("  interpreter:        {}", path(settings.interpreter.as_ref()));
    println!("  project_root:       {}", path(settings.project_root.as_ref()));
    println!("  repo_dir:           {}", path(settings.repo_dir.as_ref()));
    println!("  repo_url:           {}", settings.effective_repo_url());
    println!("  scripts_dir:        {}", path(settings.scripts_dir.as_ref()));
    println!("  output_dir:         {}", path(settings.output_dir.as_ref()));
    println!("  installation_mode:  {}", settings.installation_mode);
    println!("  prefer_uv:          {}", settings.prefer_uv);
    println!("  failure_policy:     {:?}", settings.failure_policy);

    let g = &settings.generation;
    println!("  steps:              {}", g.steps);
    println!("  guidance_scale:     {}", g.guidance_scale);
    println!("  seed:               {}", g.seed);
    println!("  octree_resolution:  {}", g.octree_resolution);
    println!("  file_type:          {}", g.file_type);
    println!("  low_vram_mode:      {}", g.low_vram_mode);
    Ok(())
}
