// tests/config_loading.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::init_tracing;

use std::error::Error;
use std::fs;

use clap::Parser;
use tempfile::TempDir;

use dailybot::cli::CliArgs;
use dailybot::config::load_and_validate;
use dailybot::errors::BotError;
use dailybot::tasks::TaskRegistry;
use dailybot::types::ResetDepth;

type TestResult = Result<(), Box<dyn Error>>;

const SAMPLE: &str = r#"
[device]
reset_depth = "host_only"

[emulator]
console_path = "/opt/ld/dnconsole"
stagger_secs = 5
launch = false

[timing]
max_swipes = 6

[tasks]
friend_ids = "10001，10002, 10003,10004"

[[account]]
emulator_index = 0
name = "main"

[[account]]
emulator_index = 2
"#;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("Dailybot.toml");
    fs::write(&path, body).expect("write config");
    path
}

#[test]
fn loads_and_applies_defaults() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let cfg = load_and_validate(write_config(&dir, SAMPLE))?;

    assert_eq!(cfg.device.package, "com.tencent.mobileqq");
    assert_eq!(cfg.device.reset_depth, ResetDepth::HostOnly);
    assert!(!cfg.emulator.launch);
    assert_eq!(cfg.emulator.stagger_secs, 5);
    assert_eq!(cfg.timing.max_swipes, 6);
    assert_eq!(cfg.timing.refresh_max_scrolls, 15);

    // Capped at max_friends (3).
    assert_eq!(cfg.friend_ids(), vec!["10001", "10002", "10003"]);
    assert_eq!(cfg.account(0).map(|a| a.display_name()).as_deref(), Some("main"));
    assert_eq!(
        cfg.account(2).map(|a| a.display_name()).as_deref(),
        Some("emulator-2")
    );
    assert!(cfg.account(1).is_none());
    Ok(())
}

#[test]
fn invalid_files_are_rejected() -> TestResult {
    let dir = TempDir::new()?;

    let err = load_and_validate(write_config(&dir, "[device]\n")).unwrap_err();
    assert!(matches!(err, BotError::ConfigError(_)));

    let err = load_and_validate(write_config(&dir, "[[account]\nemulator_index = ")).unwrap_err();
    assert!(matches!(err, BotError::TomlError(_)));

    let err = load_and_validate(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, BotError::IoError(_)));
    Ok(())
}

#[test]
fn builder_config_feeds_the_builtin_registry() {
    let cfg = ConfigFileBuilder::new()
        .with_account(0, "a")
        .with_friend_ids(&["1", "2", "3", "4"])
        .build();
    let registry = TaskRegistry::builtin(cfg.friend_ids());

    assert_eq!(registry.len(), 13);
    assert!(registry.get("添加好友").is_some());
}

#[tokio::test]
async fn dry_run_validates_without_touching_devices() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let path = write_config(&dir, SAMPLE);
    let path = path.to_string_lossy().to_string();

    let args = CliArgs::parse_from(["dailybot", "--config", &path, "--dry-run", "--emulator", "2"]);
    dailybot::run(args).await?;

    let args = CliArgs::parse_from(["dailybot", "--config", &path, "--dry-run", "--emulator", "7"]);
    assert!(dailybot::run(args).await.is_err());

    let args = CliArgs::parse_from(["dailybot", "--config", &path, "--dry-run", "--task", "不存在"]);
    assert!(dailybot::run(args).await.is_err());
    Ok(())
}
