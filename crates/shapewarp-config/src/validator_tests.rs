use super::*;
use std::path::PathBuf;

#[test]
fn test_validate_default_config() {
    let result = ConfigValidator::validate(&Config::default());
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_validate_invalid_port() {
    let mut config = Config::default();
    config.server.port = 0;

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "server.port"));
}

#[test]
fn test_validate_empty_host() {
    let mut config = Config::default();
    config.server.host = String::new();

    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "server.host"));
}

#[test]
fn test_validate_zero_workers() {
    let mut config = Config::default();
    config.jobs.max_workers = 0;

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "jobs.max_workers"));
}

#[test]
fn test_validate_high_worker_count_warning() {
    let mut config = Config::default();
    config.jobs.max_workers = 500;

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result.warnings.iter().any(|w| w.path == "jobs.max_workers"));
}

#[test]
fn test_validate_empty_jobs_dir() {
    let mut config = Config::default();
    config.jobs.jobs_dir = PathBuf::new();

    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "jobs.jobs_dir"));
}

#[test]
fn test_validate_zero_grace_warning() {
    let mut config = Config::default();
    config.jobs.shutdown_grace_secs = 0;

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_validate_log_level() {
    let mut config = Config::default();
    config.logging.level = "verbose".to_string();
    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.iter().any(|w| w.path == "logging.level"));

    config.logging.level = "shapewarp_jobs=debug,info".to_string();
    assert!(ConfigValidator::validate(&config).warnings.is_empty());

    config.logging.level = "WARN".to_string();
    assert!(ConfigValidator::validate(&config).warnings.is_empty());
}

#[test]
fn test_into_result() {
    let mut config = Config::default();
    config.jobs.max_workers = 0;
    config.server.port = 0;

    let err = ConfigValidator::validate(&config).into_result().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "server.port"));

    let warnings = ConfigValidator::validate(&Config::default())
        .into_result()
        .unwrap();
    assert!(warnings.is_empty());
}
