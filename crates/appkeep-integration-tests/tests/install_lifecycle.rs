//! End-to-end install, uninstall, and launch through the workspace facade.

use appkeep_core::{AppSummary, ApplicationType};
use appkeep_install::{InstallOptions, ProtectionPolicy, UninstallOptions, WorkspaceErrorKind};
use appkeep_test::{BundleFixture, TestWorkspace, init_test_tracing};

fn installed_ids(env: &TestWorkspace) -> Vec<String> {
    env.workspace
        .all_installed_applications()
        .unwrap()
        .into_iter()
        .map(|r| r.application_identifier.to_string())
        .collect()
}

#[test]
fn install_publishes_record_with_bundle_on_disk() {
    init_test_tracing();
    let env = TestWorkspace::new();
    let source = BundleFixture::new("com.example.app").write_to(&env.source_dir());

    let outcome = env
        .workspace
        .install_application(&source, InstallOptions::default())
        .unwrap();

    assert!(installed_ids(&env).contains(&"com.example.app".to_string()));
    assert!(outcome.record.bundle_url.is_dir());
    assert!(outcome.record.executable_path().unwrap().is_file());

    let proxy = env
        .workspace
        .application_proxy_for_identifier("com.example.app")
        .unwrap();
    assert!(proxy.is_installed);
    assert_eq!(proxy.signer_identity.as_deref(), Some("Mock Signer"));
}

#[test]
fn install_then_uninstall_then_lookup_is_not_found() {
    let env = TestWorkspace::new();
    let source = BundleFixture::new("com.example.app")
        .item_name("App.bundle")
        .write_to(&env.source_dir());
    env.workspace
        .install_application(&source, InstallOptions::default())
        .unwrap();
    let record = env
        .workspace
        .application_proxy_for_identifier("com.example.app")
        .unwrap();
    assert!(record.is_installed);
    assert_eq!(record.item_name, "App.bundle");

    env.workspace
        .uninstall_application("com.example.app", UninstallOptions::default())
        .unwrap();

    let err = env
        .workspace
        .application_proxy_for_identifier("com.example.app")
        .unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::NotFound);
    assert!(installed_ids(&env).is_empty());
}

#[test]
fn uninstall_reports_incomplete_cleanup_but_commits() {
    let env = TestWorkspace::new();
    let source = BundleFixture::new("com.example.app").write_to(&env.source_dir());
    let installed = env
        .workspace
        .install_application(&source, InstallOptions::default())
        .unwrap();

    env.containers.set_fail_remove_bundle(true);
    let outcome = env
        .workspace
        .uninstall_application("com.example.app", UninstallOptions::default())
        .unwrap();

    let cleanup = outcome.incomplete_cleanup.expect("cleanup diagnostic");
    assert_eq!(cleanup.failures.len(), 1);
    assert_eq!(cleanup.failures[0].path, installed.record.bundle_url);
    // Files remain, but the registry says the app is gone.
    assert!(installed.record.bundle_url.exists());
    assert!(installed_ids(&env).is_empty());
    assert!(env.reopen().all_applications().unwrap().is_empty());
}

#[test]
fn uninstall_nonexistent_leaves_registry_unchanged() {
    let env = TestWorkspace::new();
    let source = BundleFixture::new("com.example.app").write_to(&env.source_dir());
    env.workspace
        .install_application(&source, InstallOptions::default())
        .unwrap();
    let before = env.workspace.all_applications().unwrap();

    let err = env
        .workspace
        .uninstall_application("com.nonexistent", UninstallOptions::default())
        .unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::NotFound);
    assert_eq!(env.workspace.all_applications().unwrap(), before);
}

#[test]
fn duplicate_install_fails_and_keeps_original() {
    let env = TestWorkspace::new();
    let v1 = BundleFixture::new("com.example.app")
        .version("1")
        .write_to(&env.source_dir().join("v1"));
    let v2 = BundleFixture::new("com.example.app")
        .version("2")
        .write_to(&env.source_dir().join("v2"));

    let first = env
        .workspace
        .install_application(&v1, InstallOptions::default())
        .unwrap();
    let stage_calls = env.containers.stage_calls();

    let err = env
        .workspace
        .install_application(&v2, InstallOptions::default())
        .unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::DuplicateIdentifier);
    assert_eq!(env.containers.stage_calls(), stage_calls);

    let current = env
        .workspace
        .application_proxy_for_identifier("com.example.app")
        .unwrap();
    assert_eq!(current, first.record);
}

#[test]
fn overwrite_removes_old_bundle_only_after_commit() {
    let env = TestWorkspace::new();
    let v1 = BundleFixture::new("com.example.app")
        .version("1")
        .write_to(&env.source_dir().join("v1"));
    let v2 = BundleFixture::new("com.example.app")
        .version("2")
        .write_to(&env.source_dir().join("v2"));
    let overwrite = InstallOptions {
        overwrite_existing: true,
        ..InstallOptions::default()
    };

    let first = env
        .workspace
        .install_application(&v1, InstallOptions::default())
        .unwrap();

    // A failed update must leave the old bundle in place.
    env.containers.set_fail_stage(true);
    let err = env.workspace.install_application(&v2, overwrite).unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::Io);
    assert!(first.record.bundle_url.is_dir());
    assert_eq!(
        env.workspace
            .application_proxy_for_identifier("com.example.app")
            .unwrap()
            .bundle_version
            .as_deref(),
        Some("1")
    );

    env.containers.set_fail_stage(false);
    let second = env.workspace.install_application(&v2, overwrite).unwrap();
    assert_eq!(second.record.bundle_version.as_deref(), Some("2"));
    assert!(second.record.bundle_url.is_dir());
    assert!(!first.record.bundle_url.exists());
    assert_eq!(installed_ids(&env), vec!["com.example.app"]);
}

#[test]
fn malformed_and_missing_executable_write_nothing() {
    let env = TestWorkspace::new();
    let no_exe = BundleFixture::new("com.example.noexe")
        .item_name("NoExe.app")
        .without_executable_file()
        .write_to(&env.source_dir());
    let not_a_bundle = env.source_dir().join("Empty.app");
    std::fs::create_dir_all(&not_a_bundle).unwrap();

    let err = env
        .workspace
        .install_application(&no_exe, InstallOptions::default())
        .unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::MissingExecutable);

    let err = env
        .workspace
        .install_application(&not_a_bundle, InstallOptions::default())
        .unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::MalformedBundle);

    assert_eq!(env.containers.stage_calls(), 0);
    assert!(env.workspace.all_applications().unwrap().is_empty());
}

#[test]
fn placeholder_is_hidden_from_installed_enumeration() {
    let env = TestWorkspace::new();
    let source = BundleFixture::new("com.example.pending")
        .without_executable_file()
        .write_to(&env.source_dir());

    env.workspace
        .install_application(
            &source,
            InstallOptions {
                placeholder: true,
                ..InstallOptions::default()
            },
        )
        .unwrap();

    assert!(installed_ids(&env).is_empty());
    let all = env.workspace.all_applications().unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_placeholder);

    let err = env
        .workspace
        .open_application_with_bundle_id("com.example.pending")
        .unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::LaunchProhibited);

    // Placeholders can be removed.
    env.workspace
        .uninstall_application("com.example.pending", UninstallOptions::default())
        .unwrap();
    assert!(env.workspace.all_applications().unwrap().is_empty());
}

#[test]
fn applications_of_type_and_summaries() {
    let env = TestWorkspace::with_policy(ProtectionPolicy::permissive());
    for (id, ty, name) in [
        ("com.example.system", ApplicationType::System, "System.app"),
        ("com.example.user", ApplicationType::User, "User.app"),
        ("com.example.clip", ApplicationType::AppClip, "Clip.app"),
    ] {
        let source = BundleFixture::new(id)
            .item_name(name)
            .application_type(ty)
            .manifest_key("minimum_os_version", "15.0")
            .write_to(&env.source_dir());
        env.workspace
            .install_application(&source, InstallOptions::default())
            .unwrap();
    }

    let system = env
        .workspace
        .applications_of_type(ApplicationType::System)
        .unwrap();
    assert_eq!(system.len(), 1);
    assert_eq!(system[0].application_identifier.as_str(), "com.example.system");

    let clips = env
        .workspace
        .applications_of_type(ApplicationType::AppClip)
        .unwrap();
    assert_eq!(clips.len(), 1);
    assert!(clips[0].is_app_clip);

    let summaries: Vec<AppSummary> = env.workspace.installed_summaries().unwrap();
    assert_eq!(summaries.len(), 3);
    assert!(
        summaries
            .iter()
            .all(|s| s.minimum_os_version.as_deref() == Some("15.0"))
    );
}

#[test]
fn system_apps_are_protected_by_default() {
    let env = TestWorkspace::new();
    let source = BundleFixture::new("com.example.system")
        .application_type(ApplicationType::System)
        .write_to(&env.source_dir());
    env.workspace
        .install_application(&source, InstallOptions::default())
        .unwrap();

    let err = env
        .workspace
        .uninstall_application("com.example.system", UninstallOptions::default())
        .unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::ProtectedApplication);
    assert_eq!(installed_ids(&env), vec!["com.example.system"]);
}

#[test]
fn launch_by_application_or_bundle_identifier() {
    let env = TestWorkspace::new();
    let source = BundleFixture::new("com.example.app")
        .application_identifier("TEAM1.com.example.app")
        .write_to(&env.source_dir());
    env.workspace
        .install_application(&source, InstallOptions::default())
        .unwrap();

    env.workspace
        .open_application_with_bundle_id("TEAM1.com.example.app")
        .unwrap();
    env.workspace
        .open_application_with_bundle_id("com.example.app")
        .unwrap();

    let launched = env.launcher.launched();
    assert_eq!(launched.len(), 2);
    assert!(
        launched
            .iter()
            .all(|r| r.application_identifier.as_str() == "TEAM1.com.example.app")
    );

    env.launcher.set_failure(Some("device locked".into()));
    let err = env
        .workspace
        .open_application_with_bundle_id("com.example.app")
        .unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::Launch);

    let err = env
        .workspace
        .open_application_with_bundle_id("com.nonexistent")
        .unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::NotFound);
}

#[test]
fn launch_prohibited_apps_do_not_launch() {
    let env = TestWorkspace::new();
    let source = BundleFixture::new("com.example.locked")
        .launch_prohibited()
        .write_to(&env.source_dir());
    env.workspace
        .install_application(&source, InstallOptions::default())
        .unwrap();

    let err = env
        .workspace
        .open_application_with_bundle_id("com.example.locked")
        .unwrap_err();
    assert_eq!(err.kind, WorkspaceErrorKind::LaunchProhibited);
    assert!(env.launcher.launched().is_empty());
}

#[test]
fn registry_survives_reopen() {
    let env = TestWorkspace::new();
    for (id, name) in [("com.example.a", "A.app"), ("com.example.b", "B.app")] {
        let source = BundleFixture::new(id)
            .item_name(name)
            .write_to(&env.source_dir());
        env.workspace
            .install_application(&source, InstallOptions::default())
            .unwrap();
    }

    let reopened = env.reopen();
    let ids: Vec<_> = reopened
        .all_installed_applications()
        .unwrap()
        .into_iter()
        .map(|r| r.application_identifier.to_string())
        .collect();
    assert_eq!(ids, vec!["com.example.a", "com.example.b"]);
}

#[test]
fn integrity_check_flags_deleted_bundle() {
    let env = TestWorkspace::new();
    let source = BundleFixture::new("com.example.app").write_to(&env.source_dir());
    let installed = env
        .workspace
        .install_application(&source, InstallOptions::default())
        .unwrap();
    assert!(env.workspace.verify_integrity().unwrap().is_empty());

    std::fs::remove_dir_all(&installed.record.bundle_url).unwrap();
    let violations = env.workspace.verify_integrity().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].path, installed.record.bundle_url);
}
