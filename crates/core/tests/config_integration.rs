//! rulesmith.toml 통합 설정 테스트
//!
//! - rulesmith.toml.example 파싱 테스트
//! - 환경변수 우선순위 테스트
//! - 로드 시 검증 순서 테스트

use rulesmith_core::config::RulesmithConfig;
use rulesmith_core::error::{ConfigError, RulesmithError};

// =============================================================================
// rulesmith.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../rulesmith.toml.example");
    let config = RulesmithConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(
        config.sensor.rule_store_path,
        "/etc/snort/rules/ml_generated.rules"
    );
    assert_eq!(config.sensor.reload_command, vec!["systemctl", "reload", "snort3"]);
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../rulesmith.toml.example");
    let config = RulesmithConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_defaults() {
    let content = include_str!("../../../rulesmith.toml.example");
    let parsed = RulesmithConfig::parse(content).expect("should parse");
    let defaults = RulesmithConfig::default();

    assert_eq!(
        parsed.pipeline.max_alerts_per_batch,
        defaults.pipeline.max_alerts_per_batch
    );
    assert_eq!(
        parsed.pipeline.processing_interval_ms,
        defaults.pipeline.processing_interval_ms
    );
    assert_eq!(parsed.rules.sid_start, defaults.rules.sid_start);
    assert_eq!(parsed.rules.message_prefix, defaults.rules.message_prefix);
    assert_eq!(parsed.history.retention_days, defaults.history.retention_days);
    assert_eq!(parsed.sensor.validate_command, defaults.sensor.validate_command);
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: 테스트는 serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var(key, value);
    }

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[pipeline]
confidence_threshold = 0.98
"#;
    let threshold = with_env("RULESMITH_PIPELINE_CONFIDENCE_THRESHOLD", "0.75", || {
        let mut config = RulesmithConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.pipeline.confidence_threshold
    });

    assert!((threshold - 0.75).abs() < f64::EPSILON);
}

#[test]
#[serial_test::serial]
fn env_override_splits_command_words() {
    let command = with_env(
        "RULESMITH_SENSOR_VALIDATE_COMMAND",
        "snort  -c /etc/snort/snort.lua -T",
        || {
            let mut config = RulesmithConfig::default();
            config.apply_env_overrides();
            config.sensor.validate_command
        },
    );

    assert_eq!(command, vec!["snort", "-c", "/etc/snort/snort.lua", "-T"]);
}

#[test]
#[serial_test::serial]
fn env_override_ignores_unparsable_number() {
    let batch = with_env("RULESMITH_PIPELINE_MAX_ALERTS_PER_BATCH", "many", || {
        let mut config = RulesmithConfig::default();
        config.apply_env_overrides();
        config.pipeline.max_alerts_per_batch
    });

    assert_eq!(batch, 10);
}

#[tokio::test]
#[serial_test::serial]
async fn load_applies_api_key_from_env_before_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("rulesmith.toml");
    tokio::fs::write(&path, "[analysis]\nbackend = \"remote\"\n")
        .await
        .expect("write config");

    // 키가 없으면 검증 실패
    let err = RulesmithConfig::load(&path).await.unwrap_err();
    assert!(matches!(
        err,
        RulesmithError::Config(ConfigError::InvalidValue { .. })
    ));

    let original = std::env::var("RULESMITH_ANALYSIS_API_KEY").ok();
    // SAFETY: serial_test로 직렬화됨
    unsafe {
        std::env::set_var("RULESMITH_ANALYSIS_API_KEY", "sk-from-env");
    }
    let loaded = RulesmithConfig::load(&path).await;
    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("RULESMITH_ANALYSIS_API_KEY", val),
            None => std::env::remove_var("RULESMITH_ANALYSIS_API_KEY"),
        }
    }

    let config = loaded.expect("key from env should satisfy validation");
    assert_eq!(config.analysis.api_key, "sk-from-env");
}
