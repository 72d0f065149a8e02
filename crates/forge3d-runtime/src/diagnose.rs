//! Read-only health report: probe snapshot plus import checks.

use chrono::{DateTime, Local};
use forge3d_core::{DependencyGroup, DependencyStatus, EnvironmentSnapshot};
use serde::Serialize;
use tracing::{info, warn};

use crate::install::{DependencyInstaller, InstallError, TorchRuntime};

/// Package whose runtime is asked about CUDA once it imports.
const TORCH_PACKAGE: &str = "torch";

#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    pub name: String,
    pub status: DependencyStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub name: String,
    pub required: bool,
    pub packages: Vec<PackageReport>,
}

impl GroupReport {
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.packages
            .iter()
            .filter(|p| p.status != DependencyStatus::Installed)
            .map(|p| p.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub generated_at: DateTime<Local>,
    pub snapshot: EnvironmentSnapshot,
    pub groups: Vec<GroupReport>,
    /// Only present when torch imports.
    pub torch: Option<TorchRuntime>,
}

impl DiagnosticReport {
    /// Required packages that are not importable.
    pub fn missing_required(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| g.required)
            .flat_map(GroupReport::missing)
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.snapshot.has_interpreter() && self.missing_required().is_empty()
    }

    /// torch imports but cannot see a GPU the machine has.
    pub fn torch_misses_gpu(&self) -> bool {
        self.snapshot.accelerator.nvidia_hardware
            && self.torch.as_ref().is_some_and(|t| !t.cuda_available)
    }

    fn torch_imports(&self) -> bool {
        self.groups
            .iter()
            .flat_map(|g| &g.packages)
            .any(|p| p.name == TORCH_PACKAGE && p.status == DependencyStatus::Installed)
    }
}

async fn torch_runtime(installer: &DependencyInstaller) -> Result<Option<TorchRuntime>, InstallError> {
    match installer.check_torch_runtime().await {
        Ok(runtime) => Ok(runtime),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            warn!(error = %e, "torch runtime check could not run");
            Ok(None)
        }
    }
}

/// Import-check `groups` with `installer`, or report them unchecked when
/// there is no interpreter to check against.
pub async fn diagnose(
    snapshot: EnvironmentSnapshot,
    installer: Option<&DependencyInstaller>,
    groups: &[DependencyGroup],
) -> Result<DiagnosticReport, InstallError> {
    let mut reports = Vec::with_capacity(groups.len());
    for group in groups {
        let packages = match installer {
            Some(installer) => installer
                .check_group(group)
                .await?
                .into_iter()
                .map(|(name, status)| PackageReport { name, status })
                .collect(),
            None => group
                .packages()
                .iter()
                .map(|p| PackageReport {
                    name: p.key(),
                    status: DependencyStatus::NotChecked,
                })
                .collect(),
        };
        reports.push(GroupReport {
            name: group.name.clone(),
            required: group.required,
            packages,
        });
    }

    let mut report = DiagnosticReport {
        generated_at: Local::now(),
        snapshot,
        groups: reports,
        torch: None,
    };
    if let Some(installer) = installer {
        if report.torch_imports() {
            report.torch = torch_runtime(installer).await?;
        }
    }
    info!(
        healthy = report.is_healthy(),
        torch_cuda = ?report.torch.as_ref().map(|t| t.cuda_available),
        missing = ?report.missing_required(),
        "Diagnostic report ready"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_without_interpreter_everything_unchecked() {
        let groups = vec![DependencyGroup::core()];
        let report = diagnose(EnvironmentSnapshot::default(), None, &groups)
            .await
            .unwrap();
        assert!(!report.is_healthy());
        assert_eq!(report.groups[0].packages.len(), DependencyGroup::core().len());
        assert!(report.missing_required().contains(&"numpy"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["groups"][0]["name"], "core");
    }
}
