mod common;

use std::fs;

use common::full_settings;
use webgl_deploy::error::DeployError;
use webgl_deploy::settings::{
    DeploySettings, LoadFailure, LoadOutcome, ProxyDirective, SettingsStore,
};

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("deploy.json"));
    let mut settings = full_settings();
    settings.location = "app1".into();
    settings.ssh_port = 2222;
    settings.private_key_passphrase = Some("hunter2".into());

    store.save(&settings).unwrap();

    assert_eq!(store.load(), LoadOutcome::Loaded(settings));
}

#[test]
fn saving_what_was_loaded_leaves_file_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("deploy.json"));
    store.save(&full_settings()).unwrap();
    let first = fs::read_to_string(store.path()).unwrap();

    let loaded = store.load().into_settings();
    store.save(&loaded).unwrap();

    assert_eq!(fs::read_to_string(store.path()).unwrap(), first);
}

#[test]
fn save_creates_missing_directories() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("nested/config/deploy.json"));

    store.save(&full_settings()).unwrap();

    assert!(matches!(store.load(), LoadOutcome::Loaded(_)));
}

#[test]
fn save_overwrites_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("deploy.json"));
    store.save(&full_settings()).unwrap();

    store.save(&DeploySettings::default()).unwrap();

    assert_eq!(store.load(), LoadOutcome::Loaded(DeploySettings::default()));
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("absent.json"));

    match store.load() {
        LoadOutcome::Defaulted {
            settings,
            failure,
            reason,
        } => {
            assert_eq!(settings, DeploySettings::default());
            assert_eq!(failure, LoadFailure::Missing);
            assert!(reason.starts_with("cannot read"), "{reason}");
        }
        LoadOutcome::Loaded(_) => panic!("expected defaults"),
    }
}

#[test]
fn unparsable_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deploy.json");
    fs::write(&path, "{ not json").unwrap();

    let outcome = SettingsStore::new(&path).load();

    assert_eq!(outcome.settings(), &DeploySettings::default());
    match outcome {
        LoadOutcome::Defaulted {
            failure, reason, ..
        } => {
            assert_eq!(failure, LoadFailure::Unparsable);
            assert!(reason.starts_with("cannot parse"), "{reason}");
        }
        LoadOutcome::Loaded(_) => panic!("expected defaults"),
    }
}

#[test]
fn file_uses_form_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("deploy.json"));
    store.save(&full_settings()).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();

    assert_eq!(raw["ipServer"], "203.0.113.10");
    assert_eq!(raw["appName"], "space-race");
    assert_eq!(raw["deployRootPath"], "var/www");
    assert_eq!(raw["buildFolderName"], "Build");
    assert_eq!(raw["cloudFlareZone"], "zone123");
    assert_eq!(raw["cloudFlareEmail"], "ops@example.com");
    assert_eq!(raw["cloudFlareKey"], "cf-key");
    assert_eq!(raw["sshPort"], 22);
}

#[test]
fn partial_file_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deploy.json");
    fs::write(&path, r#"{"ipServer": "10.0.0.5", "domain": "example.org"}"#).unwrap();

    let settings = SettingsStore::new(&path).load().into_settings();

    assert_eq!(settings.ip_server, "10.0.0.5");
    assert_eq!(settings.domain, "example.org");
    assert_eq!(settings.ssh_port, 22);
    assert_eq!(settings.proxy_username, "root");
    assert!(settings.app_name.is_empty());
}

#[test]
fn deploy_path_ignores_stray_slashes() {
    let mut settings = full_settings();
    settings.deploy_root_path = "var/www".into();
    settings.deploy_folder = "games".into();
    let plain = settings.remote_deploy_path();

    settings.deploy_root_path = "/var/www/".into();
    settings.deploy_folder = "/games/".into();

    assert_eq!(plain, "/var/www/deployer/games/space-race");
    assert_eq!(settings.remote_deploy_path(), plain);
}

#[test]
fn deploy_path_skips_empty_folder() {
    let mut settings = full_settings();
    settings.deploy_folder = String::new();

    assert_eq!(settings.remote_deploy_path(), "/var/www/deployer/space-race");
}

#[test]
fn root_site_derivations() {
    let settings = full_settings();

    assert_eq!(settings.location(), None);
    assert_eq!(settings.proxy_directive(), ProxyDirective::Root);
    assert_eq!(settings.location_prefix(), "/");
    assert_eq!(
        settings.purge_url(),
        "https://example.com/Build/Build.data.gz"
    );
}

#[test]
fn sub_location_derivations() {
    let mut settings = full_settings();
    settings.location = "app1".into();

    assert_eq!(settings.location(), Some("app1"));
    assert_eq!(settings.proxy_directive(), ProxyDirective::Alias);
    assert_eq!(settings.location_prefix(), "/app1");
    assert_eq!(
        settings.purge_url(),
        "https://example.com/app1/Build/Build.data.gz"
    );
}

#[test]
fn slashed_location_matches_bare_one() {
    let mut bare = full_settings();
    bare.location = "app1".into();
    let mut slashed = full_settings();
    slashed.location = "/app1/".into();

    assert_eq!(slashed.purge_url(), bare.purge_url());
    assert_eq!(slashed.location_prefix(), bare.location_prefix());

    slashed.location = "/".into();
    assert_eq!(slashed.proxy_directive(), ProxyDirective::Root);
}

#[test]
fn server_names_include_www() {
    assert_eq!(full_settings().server_names(), "example.com www.example.com");
}

#[test]
fn complete_settings_pass_every_check() {
    let settings = full_settings();

    settings.validate_for_build().unwrap();
    settings.validate_for_deploy().unwrap();
    settings.validate_for_proxy().unwrap();
    settings.validate_for_purge().unwrap();
}

#[test]
fn purge_needs_credentials() {
    let mut settings = full_settings();
    settings.cloudflare_key = "  ".into();

    let err = settings.validate_for_purge().unwrap_err();

    assert_eq!(err.to_string(), "invalid settings: cloudFlareKey is empty");
}

#[test]
fn app_name_must_be_one_segment() {
    let mut settings = full_settings();

    for bad in ["", "a/b", "..", "."] {
        settings.app_name = bad.into();
        let err = settings.validate_for_deploy().unwrap_err();
        assert!(matches!(err, DeployError::InvalidSettings(_)), "{bad:?}");
    }
}

#[test]
fn edit_refuses_unparsable_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deploy.json");
    let broken =
        r#"{"ipServer":"10.0.0.5","domain":"example.org","appName":"game","cloudFlareKey":"secret",}"#;
    fs::write(&path, broken).unwrap();
    let store = SettingsStore::new(&path);

    let err = store.update_field("location", "app1").unwrap_err();

    assert!(matches!(err, DeployError::InvalidSettings(_)));
    assert!(err.to_string().contains("deploy.json"), "{err}");
    assert_eq!(fs::read_to_string(&path).unwrap(), broken);
    assert!(store.load_for_edit().is_err());
}

#[test]
fn edit_starts_from_defaults_when_file_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("deploy.json"));

    let saved = store.update_field("domain", "example.com").unwrap();

    assert_eq!(saved.domain, "example.com");
    assert_eq!(store.load(), LoadOutcome::Loaded(saved));
}

#[test]
fn edit_keeps_other_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("deploy.json"));
    store.save(&full_settings()).unwrap();

    store.update_field("location", "app1").unwrap();

    let mut expected = full_settings();
    expected.location = "app1".into();
    assert_eq!(store.load(), LoadOutcome::Loaded(expected));
}

#[test]
fn build_needs_a_scene() {
    let mut settings = full_settings();
    settings.build_scene_name = " ".into();

    let err = settings.validate_for_build().unwrap_err();

    assert_eq!(err.to_string(), "invalid settings: buildSceneName is empty");
}
