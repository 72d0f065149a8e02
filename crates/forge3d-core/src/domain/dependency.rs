//! Dependency groups and package specifications.

use serde::{Deserialize, Serialize};

/// Characters that end the bare name inside a requirement specifier.
const SPEC_DELIMITERS: &[char] = &['<', '>', '=', '!', '~', '[', ';', '@', ' ', '\t'];

/// Strip version qualifiers, extras and environment markers from a package spec.
///
/// `"numpy>=1.24"` becomes `"numpy"`, `"opencv-python[headless] ; sys_platform"`
/// becomes `"opencv-python"`. Names are lower-cased and `_` is folded into `-`
/// so the same distribution always maps to the same status key.
pub fn bare_package_name(spec: &str) -> String {
    let trimmed = spec.trim();
    let end = trimmed.find(SPEC_DELIMITERS).unwrap_or(trimmed.len());
    trimmed[..end].to_ascii_lowercase().replace('_', "-")
}

/// A single installable package plus the module used to check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Requirement passed to the package manager (e.g. `numpy>=1.24`).
    pub spec: String,
    /// Module imported to verify the install (e.g. `PIL` for `pillow`).
    pub import_name: String,
}

impl PackageSpec {
    pub fn new(spec: impl Into<String>, import_name: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            import_name: import_name.into(),
        }
    }

    /// Package whose import name equals its bare distribution name.
    pub fn simple(spec: impl Into<String>) -> Self {
        let spec = spec.into();
        let import_name = bare_package_name(&spec).replace('-', "_");
        Self { spec, import_name }
    }

    /// Status-map key for this package.
    pub fn key(&self) -> String {
        bare_package_name(&self.spec)
    }
}

/// An ordered, immutable list of packages installed as one step.
///
/// Later groups assume the packages of earlier groups are importable, so the
/// order of both groups and packages is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGroup {
    pub name: String,
    /// A failure in a required group can abort the session (see `FailurePolicy`).
    pub required: bool,
    packages: Vec<PackageSpec>,
}

impl DependencyGroup {
    pub fn required(name: impl Into<String>, packages: Vec<PackageSpec>) -> Self {
        Self {
            name: name.into(),
            required: true,
            packages,
        }
    }

    pub fn optional(name: impl Into<String>, packages: Vec<PackageSpec>) -> Self {
        Self {
            name: name.into(),
            required: false,
            packages,
        }
    }

    pub fn packages(&self) -> &[PackageSpec] {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// The accelerator-enabled packages. Their index URL depends on the mode.
    pub fn accelerator() -> Self {
        Self::required(
            "accelerator",
            vec![PackageSpec::simple("torch"), PackageSpec::simple("torchvision")],
        )
    }

    /// Packages the generator imports unconditionally.
    pub fn core() -> Self {
        Self::required(
            "core",
            vec![
                PackageSpec::simple("diffusers"),
                PackageSpec::simple("transformers"),
                PackageSpec::simple("numpy"),
                PackageSpec::new("pillow", "PIL"),
                PackageSpec::new("opencv-python", "cv2"),
                PackageSpec::simple("rembg"),
                PackageSpec::simple("trimesh"),
                PackageSpec::simple("tqdm"),
                PackageSpec::simple("omegaconf"),
                PackageSpec::simple("einops"),
            ],
        )
    }

    /// Mesh post-processing and export helpers. Nice to have.
    pub fn mesh_extras() -> Self {
        Self::optional(
            "mesh-extras",
            vec![
                PackageSpec::simple("pymeshlab"),
                PackageSpec::simple("pygltflib"),
                PackageSpec::simple("xatlas"),
                PackageSpec::simple("accelerate"),
                PackageSpec::simple("onnxruntime"),
            ],
        )
    }

    /// Groups installed after the accelerator group, in install order.
    pub fn default_sequence() -> Vec<Self> {
        vec![Self::core(), Self::mesh_extras()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_strips_qualifiers() {
        assert_eq!(bare_package_name("numpy>=1.24"), "numpy");
        assert_eq!(bare_package_name("torch==2.1.0+cu121"), "torch");
        assert_eq!(bare_package_name("opencv-python[headless]"), "opencv-python");
        assert_eq!(bare_package_name("rembg ; python_version > '3.8'"), "rembg");
        assert_eq!(bare_package_name("Pillow~=10.0"), "pillow");
        assert_eq!(bare_package_name("typing_extensions"), "typing-extensions");
    }

    #[test]
    fn test_simple_spec_derives_import_name() {
        let spec = PackageSpec::simple("typing_extensions>=4");
        assert_eq!(spec.import_name, "typing_extensions");
        assert_eq!(spec.key(), "typing-extensions");
    }

    #[test]
    fn test_default_sequence_order() {
        let names: Vec<_> = DependencyGroup::default_sequence()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["core", "mesh-extras"]);
        assert!(DependencyGroup::core().required);
        assert!(!DependencyGroup::mesh_extras().required);
    }
}
