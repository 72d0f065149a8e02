//! Installer behaviour within one session: serialization, marker
//! classification and import checks.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FAKE_PYTHON, ScriptedRunner, settle};
use forge3d_core::{
    AcceleratorInfo, DependencyGroup, DependencyStatus, EnvironmentSnapshot, PackageManager, PackageSpec,
    ResolvedMode, SessionState,
};
use forge3d_runtime::{
    DependencyInstaller, Dispatcher, InstallTarget, OrchestrationSession, PackageOutcome,
    diagnose,
};

fn installer(
    runner: &Arc<ScriptedRunner>,
    dispatcher: &Dispatcher<SessionState>,
) -> (DependencyInstaller, Arc<OrchestrationSession>) {
    let session = Arc::new(OrchestrationSession::new("installer", dispatcher.handle()));
    let installer = DependencyInstaller::new(
        runner.clone(),
        session.clone(),
        InstallTarget::new(FAKE_PYTHON, PackageManager::Pip),
    );
    (installer, session)
}

#[tokio::test]
async fn test_already_satisfied_counts_as_installed() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(
                "pip install numpy",
                0,
                "Requirement already satisfied: numpy in /venv/lib/python3.10/site-packages (1.26.4)\n",
            )
            .on("pip show numpy", 0, "Name: numpy\nVersion: 1.26.4\n"),
    );
    let mut dispatcher = Dispatcher::new();
    let (installer, _session) = installer(&runner, &dispatcher);

    let outcome = installer
        .install_single(&PackageSpec::simple("numpy"), ResolvedMode::Cpu)
        .await
        .unwrap();
    assert_eq!(outcome, PackageOutcome::Installed);

    let mut state = SessionState::new();
    settle(&mut dispatcher, &mut state);
    assert_eq!(state.statuses.get("numpy"), DependencyStatus::Installed);
}

#[tokio::test]
async fn test_success_claim_without_show_is_failure() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("pip install trimesh", 0, "Successfully installed trimesh-4.0.5\n")
            .on("pip show trimesh", 1, "WARNING: Package(s) not found: trimesh\n"),
    );
    let mut dispatcher = Dispatcher::new();
    let (installer, _session) = installer(&runner, &dispatcher);

    let outcome = installer
        .install_single(&PackageSpec::simple("trimesh"), ResolvedMode::Cpu)
        .await
        .unwrap();
    assert_eq!(outcome, PackageOutcome::Failed);

    let mut state = SessionState::new();
    settle(&mut dispatcher, &mut state);
    assert_eq!(state.statuses.get("trimesh"), DependencyStatus::Error);
}

#[tokio::test]
async fn test_overlapping_installs_are_serialized() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("-m pip install", 0, "Successfully installed package-1.0\n")
            .on("-m pip show", 0, "Name: package\n")
            .with_delay(Duration::from_millis(5)),
    );
    let dispatcher = Dispatcher::new();
    let (installer, _session) = installer(&runner, &dispatcher);
    let group = DependencyGroup::mesh_extras();

    let mut progress = |_: usize, _: usize| {};
    let numpy = PackageSpec::simple("numpy");
    let (group_outcome, single) = tokio::join!(
        installer.install_group(&group, ResolvedMode::Cpu, &mut progress),
        installer.install_single(&numpy, ResolvedMode::Cpu),
    );

    assert_eq!(group_outcome.unwrap().installed_count(), group.len());
    assert_eq!(single.unwrap(), PackageOutcome::Installed);
    assert_eq!(runner.max_concurrency(), 1);
    assert_eq!(runner.calls_matching("-m pip install"), group.len() + 1);
}

#[tokio::test]
async fn test_group_progress_reports_each_package() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("-m pip install", 0, "Successfully installed package-1.0\n")
            .on("-m pip show", 0, "Name: package\n"),
    );
    let dispatcher = Dispatcher::new();
    let (installer, _session) = installer(&runner, &dispatcher);
    let group = DependencyGroup::accelerator();

    let mut seen = Vec::new();
    let mut progress = |done: usize, len: usize| seen.push((done, len));
    installer
        .install_group(&group, ResolvedMode::Cuda12, &mut progress)
        .await
        .unwrap();

    assert_eq!(seen.last(), Some(&(2, 2)));
    assert!(
        runner
            .calls()
            .iter()
            .filter(|c| c.contains("-m pip install"))
            .all(|c| c.ends_with("/whl/cu121"))
    );
}

#[tokio::test]
async fn test_diagnose_reports_cpu_only_torch_on_gpu_machine() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("[TORCH]", 0, "[TORCH] 2.1.0+cpu False 0\n")
            .on("import torch", 0, "2.1.0+cpu\n"),
    );
    let dispatcher = Dispatcher::new();
    let (installer, _session) = installer(&runner, &dispatcher);

    let snapshot = EnvironmentSnapshot {
        interpreter: Some(FAKE_PYTHON.into()),
        accelerator: AcceleratorInfo {
            nvidia_hardware: true,
            ..AcceleratorInfo::default()
        },
        ..EnvironmentSnapshot::default()
    };

    let report = diagnose(snapshot, Some(&installer), &[DependencyGroup::accelerator()])
        .await
        .unwrap();

    let torch = report.torch.as_ref().unwrap();
    assert_eq!(torch.version, "2.1.0+cpu");
    assert!(!torch.cuda_available);
    assert_eq!(torch.device_count, 0);
    assert!(report.torch_misses_gpu());
    assert_eq!(runner.calls_matching("[TORCH]"), 1);
}

#[tokio::test]
async fn test_diagnose_skips_torch_runtime_when_torch_missing() {
    let runner = Arc::new(ScriptedRunner::new().on(
        "import torch",
        1,
        "ModuleNotFoundError: No module named 'torch'\n",
    ));
    let dispatcher = Dispatcher::new();
    let (installer, _session) = installer(&runner, &dispatcher);

    let snapshot = EnvironmentSnapshot {
        interpreter: Some(FAKE_PYTHON.into()),
        ..EnvironmentSnapshot::default()
    };

    let report = diagnose(snapshot, Some(&installer), &[DependencyGroup::accelerator()])
        .await
        .unwrap();
    assert_eq!(report.torch, None);
    assert_eq!(runner.calls_matching("[TORCH]"), 0);
}

#[tokio::test]
async fn test_import_checks_publish_statuses() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("import numpy", 0, "1.26.4\n")
            .on(
                "import cv2",
                1,
                "ModuleNotFoundError: No module named 'cv2'\n",
            ),
    );
    let mut dispatcher = Dispatcher::new();
    let (installer, _session) = installer(&runner, &dispatcher);

    let numpy = installer
        .check_package(&PackageSpec::simple("numpy"))
        .await
        .unwrap();
    let opencv = installer
        .check_package(&PackageSpec::new("opencv-python", "cv2"))
        .await
        .unwrap();
    assert_eq!(numpy, DependencyStatus::Installed);
    assert_eq!(opencv, DependencyStatus::NotInstalled);

    let mut state = SessionState::new();
    settle(&mut dispatcher, &mut state);
    assert_eq!(state.statuses.get("numpy"), DependencyStatus::Installed);
    assert_eq!(state.statuses.get("opencv-python"), DependencyStatus::NotInstalled);
}

#[tokio::test]
async fn test_cancelled_session_refuses_to_install() {
    let runner = Arc::new(ScriptedRunner::new());
    let dispatcher = Dispatcher::new();
    let (installer, session) = installer(&runner, &dispatcher);
    session.cancel();

    let err = installer
        .install_single(&PackageSpec::simple("numpy"), ResolvedMode::Cpu)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(runner.calls().is_empty());
}
