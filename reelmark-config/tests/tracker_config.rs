use std::{fs, sync::Mutex};

use once_cell::sync::Lazy;
use reelmark_config::{ConfigLoadError, TrackerConfig, TrackerConfigSource};
use tempfile::tempdir;

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn clear_overrides() {
    for key in ["REELMARK_CONFIG_PATH", "REELMARK_CONFIG_JSON"] {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn env_path_takes_precedence_over_inline_json() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_overrides();

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("tracker.toml");
    fs::write(
        &path,
        "telemetry_retention_hours = 24\ncompletion_threshold = 90.0\n",
    )
    .expect("write config");

    unsafe {
        std::env::set_var("REELMARK_CONFIG_PATH", &path);
        std::env::set_var(
            "REELMARK_CONFIG_JSON",
            r#"{ "telemetry_retention_hours": 1 }"#,
        );
    }

    let (config, source) = TrackerConfig::load_from_env().expect("load");
    clear_overrides();

    assert_eq!(source, TrackerConfigSource::EnvPath(path));
    assert_eq!(config.telemetry_retention_hours, 24);
    assert_eq!(config.completion_threshold, 90.0);
    assert_eq!(config.progress_max_age_months, 6);
}

#[test]
fn inline_json_is_used_without_a_path() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_overrides();

    unsafe {
        std::env::set_var(
            "REELMARK_CONFIG_JSON",
            r#"{ "telemetry_cap": 25, "store_path": "/tmp/reelmark.json" }"#,
        );
    }

    let (config, source) = TrackerConfig::load_from_env().expect("load");
    clear_overrides();

    assert_eq!(source, TrackerConfigSource::EnvInline);
    assert_eq!(config.telemetry_cap, 25);
    assert_eq!(config.store_path.to_str(), Some("/tmp/reelmark.json"));
}

#[test]
fn falls_back_to_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_overrides();

    let (config, source) = TrackerConfig::load_from_env().expect("load");

    assert_eq!(source, TrackerConfigSource::Default);
    assert_eq!(config, TrackerConfig::default());
}

#[test]
fn invalid_inline_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_overrides();

    unsafe {
        std::env::set_var(
            "REELMARK_CONFIG_JSON",
            r#"{ "telemetry_retention_hours": 0 }"#,
        );
    }

    let result = TrackerConfig::load_from_env();
    clear_overrides();

    assert!(matches!(result, Err(ConfigLoadError::Invalid(_))));
}

#[test]
fn missing_file_reports_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");

    match TrackerConfig::load_from_file(&path) {
        Err(ConfigLoadError::Io { path: reported, .. }) => {
            assert_eq!(reported, path)
        }
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn json_file_is_parsed_by_extension() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("tracker.json");
    fs::write(&path, r#"{ "progress_max_age_months": 12 }"#)
        .expect("write config");

    let config = TrackerConfig::load_from_file(&path).expect("load json");
    assert_eq!(config.progress_max_age_months, 12);
}
