//! Contract with the external image-to-3D generation program.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Extensions treated as a single input image (lower-case, without dot).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp", "tiff"];

/// Output marker printed after a single image was converted.
pub const SINGLE_SUCCESS_MARKER: &str = "processed successfully";
/// Output marker printed after a folder run.
pub const BATCH_SUCCESS_MARKER: &str = "Processing summary";

/// Mesh formats the generator can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshFormat {
    #[default]
    Obj,
    Glb,
    Ply,
    Stl,
    Fbx,
}

impl MeshFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Glb => "glb",
            Self::Ply => "ply",
            Self::Stl => "stl",
            Self::Fbx => "fbx",
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeshFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "obj" => Ok(Self::Obj),
            "glb" => Ok(Self::Glb),
            "ply" => Ok(Self::Ply),
            "stl" => Ok(Self::Stl),
            "fbx" => Ok(Self::Fbx),
            other => Err(format!("unsupported mesh format '{other}'")),
        }
    }
}

/// Tunables forwarded to the generator as `--flag value` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: u64,
    pub octree_resolution: u32,
    pub num_chunks: u32,
    pub file_type: MeshFormat,
    /// `cuda` or `cpu`; derived from the installed mode when `None`.
    pub device: Option<String>,
    pub disable_texture: bool,
    pub low_vram_mode: bool,
    pub enable_flashvdm: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            steps: 30,
            guidance_scale: 7.5,
            seed: 1234,
            octree_resolution: 256,
            num_chunks: 200_000,
            file_type: MeshFormat::Obj,
            device: None,
            disable_texture: false,
            low_vram_mode: false,
            enable_flashvdm: false,
        }
    }
}

impl GenerationParams {
    /// Command-line arguments in the order the generator documents them.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--steps".to_string(),
            self.steps.to_string(),
            "--guidance_scale".to_string(),
            self.guidance_scale.to_string(),
            "--seed".to_string(),
            self.seed.to_string(),
            "--octree_resolution".to_string(),
            self.octree_resolution.to_string(),
            "--num_chunks".to_string(),
            self.num_chunks.to_string(),
            "--file_type".to_string(),
            self.file_type.to_string(),
        ];
        if let Some(device) = &self.device {
            args.push("--device".to_string());
            args.push(device.clone());
        }
        if self.disable_texture {
            args.push("--disable_tex".to_string());
        }
        if self.low_vram_mode {
            args.push("--low_vram_mode".to_string());
        }
        if self.enable_flashvdm {
            args.push("--enable_flashvdm".to_string());
        }
        args
    }
}

/// Whether the generator is pointed at one image or a folder of images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    SingleImage,
    Folder,
}

impl InputKind {
    /// Decide by extension: known image extensions are single images, anything else a folder.
    pub fn of(path: &Path) -> Self {
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_image { Self::SingleImage } else { Self::Folder }
    }

    pub const fn success_marker(self) -> &'static str {
        match self {
            Self::SingleImage => SINGLE_SUCCESS_MARKER,
            Self::Folder => BATCH_SUCCESS_MARKER,
        }
    }
}

/// One generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn input_kind(&self) -> InputKind {
        InputKind::of(&self.input)
    }
}

/// How a generation run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Succeeded { output_dir: PathBuf },
    /// The generator could not import its dependencies; run the installer.
    MissingDependencies { module: Option<String> },
    Failed { exit_code: i32, summary: String },
    TimedOut,
}

impl GenerationOutcome {
    /// Classify the generator's transcript.
    pub fn from_transcript(
        kind: InputKind,
        exit_code: i32,
        timed_out: bool,
        output: &str,
        output_dir: &Path,
    ) -> Self {
        if timed_out {
            return Self::TimedOut;
        }
        if output.contains("ModuleNotFoundError") || output.contains("ImportError") {
            return Self::MissingDependencies {
                module: missing_module(output),
            };
        }
        if exit_code == 0 && output.contains(kind.success_marker()) {
            return Self::Succeeded {
                output_dir: output_dir.to_path_buf(),
            };
        }
        Self::Failed {
            exit_code,
            summary: last_line(output),
        }
    }

    /// Classify a background-removal run. The script prints no marker, so
    /// a clean exit is success.
    pub fn from_background_transcript(
        exit_code: i32,
        timed_out: bool,
        output: &str,
        output_dir: &Path,
    ) -> Self {
        if timed_out {
            return Self::TimedOut;
        }
        if output.contains("ModuleNotFoundError") || output.contains("ImportError") {
            return Self::MissingDependencies {
                module: missing_module(output),
            };
        }
        if exit_code == 0 {
            return Self::Succeeded {
                output_dir: output_dir.to_path_buf(),
            };
        }
        Self::Failed {
            exit_code,
            summary: last_line(output),
        }
    }
}

fn last_line(output: &str) -> String {
    output
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
        .trim()
        .to_string()
}

/// Extract `X` from `No module named 'X'`.
fn missing_module(output: &str) -> Option<String> {
    let start = output.find("No module named '")? + "No module named '".len();
    let rest = &output[start..];
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}
