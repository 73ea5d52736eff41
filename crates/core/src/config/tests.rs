use std::io::Write;

use crate::config::models::{AppConfig, LockProviderKind};
use crate::logging::LogLevel;
use crate::models::TaskKind;

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    assert_eq!(config.scheduler.timezone, "UTC");
    assert_eq!(config.scheduler.clock.max_backward_skew_ms, 1000);
    assert!(config.scheduler.clock.max_drift_secs.is_none());
    assert_eq!(config.transport.dsn, "memory://first_in_first_out");
    assert_eq!(config.worker.policy, "first_in_first_out");
    assert!(config.worker.sleep_until_next_minute);
    assert_eq!(config.lock.provider, LockProviderKind::Memory);
    assert!(config.tasks.is_empty());
}

#[test]
fn test_config_from_toml() {
    let toml_content = r#"
[scheduler]
timezone = "+02:00"

[worker]
policy = "deadline"
sleep_until_next_minute = false
task_limit = 10

[lock]
provider = "file"
path = "/tmp/scheduler-locks"

[logging]
level = "debug"

[[tasks]]
name = "backup"
expression = "@daily"
priority = 5

[tasks.kind]
type = "shell"
command = ["tar", "czf", "/tmp/backup.tgz", "/srv"]

[[tasks]]
name = "noop"
"#;

    let config = AppConfig::from_toml(toml_content).unwrap();
    assert_eq!(config.scheduler.timezone, "+02:00");
    assert_eq!(config.worker.policy, "deadline");
    assert_eq!(config.worker.task_limit, Some(10));
    assert_eq!(config.lock.provider, LockProviderKind::File);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.tasks.len(), 2);
    assert_eq!(config.tasks[0].expression.as_deref(), Some("@daily"));
    assert!(matches!(config.tasks[0].kind, TaskKind::Shell(_)));
    assert_eq!(config.tasks[1].kind, TaskKind::Null);
}

#[test]
fn test_invalid_configs() {
    let unknown_policy = "[worker]\npolicy = \"shortest_job\"";
    assert!(AppConfig::from_toml(unknown_policy).is_err());

    let empty_timezone = "[scheduler]\ntimezone = \"\"";
    assert!(AppConfig::from_toml(empty_timezone).is_err());

    let file_lock_without_path = "[lock]\nprovider = \"file\"";
    assert!(AppConfig::from_toml(file_lock_without_path).is_err());

    let duplicate = "[[tasks]]\nname = \"foo\"\n[[tasks]]\nname = \"foo\"";
    assert!(AppConfig::from_toml(duplicate).is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[transport]\ndsn = \"fs:///tmp/scheduler\"").unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let config = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(config.transport.dsn, "fs:///tmp/scheduler");

    assert!(AppConfig::load(Some("/nonexistent/scheduler.toml")).is_err());
}

#[test]
fn test_toml_round_trip() {
    let config = AppConfig::default();
    let serialized = config.to_toml().unwrap();
    let parsed = AppConfig::from_toml(&serialized).unwrap();
    assert_eq!(parsed, config);
}
