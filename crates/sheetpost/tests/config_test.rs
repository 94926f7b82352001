//! Tests for layered configuration loading.

use sheetpost::{FailureKind, SheetpostConfig, SheetpostErrorKind};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_empty_overrides_keep_bundled_values() {
    let config = SheetpostConfig::from_toml_str("").unwrap();
    assert_eq!(config.schedule.target_hour, 16);
    assert_eq!(config.schedule.target_minute, 0);
    assert_eq!(config.schedule.check_interval(), Duration::from_secs(60));
    assert_eq!(*config.limits.publish.calls_per_minute(), 20);
    assert_eq!(*config.limits.sheets.calls_per_hour(), 3000);
    assert_eq!(*config.retry.max_retries(), 3);
    assert!(config.retry.retryable().contains(&FailureKind::Throttled));
    assert!(*config.bot.dry_run());
    assert_eq!(config.observability.service_name, "sheetpost");
}

#[test]
fn test_partial_section_override() {
    let config = SheetpostConfig::from_toml_str(
        r#"
        [schedule]
        target_hour = 9
        target_minute = 30

        [limits.publish]
        burst_limit = 2
        "#,
    )
    .unwrap();

    assert_eq!(config.schedule.target_hour, 9);
    assert_eq!(config.schedule.target_minute, 30);
    assert_eq!(config.schedule.check_interval_seconds, 60);
    assert_eq!(*config.limits.publish.burst_limit(), 2);
    // Untouched keys of an overridden table keep the bundled value
    assert_eq!(*config.limits.publish.calls_per_hour(), 500);
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_file_layers_over_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
        [bot]
        rows_file = "posts.json"
        default_images_dir = "pictures"

        [retry]
        max_retries = 0
        "#
    )
    .unwrap();

    let config = SheetpostConfig::from_file(file.path()).unwrap();
    assert_eq!(config.bot.rows_file(), &Some(PathBuf::from("posts.json")));
    assert_eq!(config.bot.default_images_dir(), &PathBuf::from("pictures"));
    assert_eq!(config.bot.work_dir(), &PathBuf::from("tmp"));
    assert_eq!(*config.retry.max_retries(), 0);
    assert_eq!(config.schedule.target_hour, 16);
}

#[test]
fn test_from_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = SheetpostConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err.kind(), SheetpostErrorKind::Config(_)));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_malformed_text_fails() {
    assert!(SheetpostConfig::from_toml_str("[schedule\ntarget_hour = 1").is_err());
    assert!(SheetpostConfig::from_toml_str("[schedule]\ntarget_hour = \"noon\"").is_err());
}

#[test]
fn test_validate_rejects_bad_sections() {
    let bad_hour = SheetpostConfig::from_toml_str("[schedule]\ntarget_hour = 24").unwrap();
    assert!(bad_hour.validate().is_err());

    let zero_interval =
        SheetpostConfig::from_toml_str("[schedule]\ncheck_interval_seconds = 0").unwrap();
    assert!(zero_interval.validate().is_err());

    let zero_limit =
        SheetpostConfig::from_toml_str("[limits.sheets]\ncalls_per_minute = 0").unwrap();
    assert!(zero_limit.validate().is_err());

    let bad_backoff = SheetpostConfig::from_toml_str("[retry]\nbackoff_factor = 0.5").unwrap();
    assert!(bad_backoff.validate().is_err());

    let no_images = SheetpostConfig::from_toml_str("[bot]\ndefault_images_dir = \"\"").unwrap();
    assert!(no_images.validate().is_err());
}

#[test]
fn test_config_renders_as_json() {
    let config = SheetpostConfig::default();
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["schedule"]["target_hour"], 16);
    assert_eq!(json["bot"]["dry_run"], true);
    assert!(json["observability"].get("service_version").is_none());
}
