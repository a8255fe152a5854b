use serde_json::json;
use std::io::Write;
use trellis_core::{ControlState, EngineConfig, TrellisError, UiEvent};

mod common;

#[test]
fn toml_overlays_defaults() {
    let cfg = EngineConfig::from_toml_str(
        r#"
            log_filter = "trellis_core=debug"
            placeholder_text = "Nothing to show"
            max_concurrent_dispatches = 3
        "#,
    )
    .unwrap();

    assert_eq!(cfg.log_filter, "trellis_core=debug");
    assert_eq!(cfg.placeholder_text, "Nothing to show");
    assert_eq!(cfg.max_concurrent_dispatches, 3);
}

#[test]
fn absent_keys_keep_defaults() {
    let defaults = EngineConfig::default();
    let cfg = EngineConfig::from_toml_str("placeholder_text = \"Empty\"").unwrap();

    assert_eq!(cfg.placeholder_text, "Empty");
    assert_eq!(cfg.log_filter, defaults.log_filter);
    assert_eq!(cfg.max_concurrent_dispatches, defaults.max_concurrent_dispatches);
}

#[test]
fn zero_concurrency_is_ignored() {
    let defaults = EngineConfig::default();
    let cfg = EngineConfig::from_toml_str("max_concurrent_dispatches = 0").unwrap();
    assert_eq!(cfg.max_concurrent_dispatches, defaults.max_concurrent_dispatches);
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = EngineConfig::from_toml_str("max_concurrent_dispatches = \"many\"").unwrap_err();
    assert!(matches!(err, TrellisError::Config(_)));
}

#[test]
fn config_file_is_read_from_disk() {
    let path = std::env::temp_dir().join(format!("trellis-config-{}.toml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "placeholder_text = \"From disk\"").unwrap();
    drop(file);

    let cfg = EngineConfig::from_path(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(cfg.placeholder_text, "From disk");

    let missing = EngineConfig::from_path(std::path::Path::new("/definitely/not/here.toml"));
    assert!(matches!(missing, Err(TrellisError::IoError(_))));
}

#[test]
fn placeholder_text_reaches_the_executor() {
    let cfg = EngineConfig::from_toml_str("placeholder_text = \"Nothing\"").unwrap();
    let executor = common::dashboard().executor_with(&cfg);

    let outputs = executor
        .dispatch(
            &UiEvent::control("continent_filter", json!(["Oceania"])),
            &ControlState::new(),
        )
        .unwrap();
    assert_eq!(
        outputs["chart_a.figure"]["layout"]["annotations"][0]["text"],
        "Nothing"
    );
}
