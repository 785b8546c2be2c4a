//! 설정 관리: rulesmith.toml 파싱 및 런타임 설정
//!
//! [`RulesmithConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`RULESMITH_PIPELINE_CONFIDENCE_THRESHOLD=0.9` 형식)
//! 3. 설정 파일 (`rulesmith.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), rulesmith_core::error::RulesmithError> {
//! use rulesmith_core::config::RulesmithConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = RulesmithConfig::load("rulesmith.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = RulesmithConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, RulesmithError};

/// rulesmith 통합 설정
///
/// `rulesmith.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesmithConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 센서(룰 엔진) 연동 설정
    #[serde(default)]
    pub sensor: SensorConfig,
    /// 배치 처리 설정
    #[serde(default)]
    pub pipeline: BatchConfig,
    /// 분석 백엔드 설정
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// 룰 생성 설정
    #[serde(default)]
    pub rules: RulesConfig,
    /// 히스토리/통계 저장 설정
    #[serde(default)]
    pub history: HistoryConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl RulesmithConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RulesmithError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    ///
    /// 원격 백엔드의 API 키처럼 환경변수로만 주입되는 값이 있으므로
    /// 검증은 [`load`](Self::load)에서 오버라이드 이후에 수행합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RulesmithError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RulesmithError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RulesmithError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, RulesmithError> {
        toml::from_str(toml_str).map_err(|e| {
            RulesmithError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `RULESMITH_{SECTION}_{FIELD}`
    /// 예: `RULESMITH_ANALYSIS_API_KEY=sk-...`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "RULESMITH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "RULESMITH_GENERAL_LOG_FORMAT");

        // Sensor
        override_string(
            &mut self.sensor.alert_log_path,
            "RULESMITH_SENSOR_ALERT_LOG_PATH",
        );
        override_string(
            &mut self.sensor.rule_store_path,
            "RULESMITH_SENSOR_RULE_STORE_PATH",
        );
        override_words(
            &mut self.sensor.validate_command,
            "RULESMITH_SENSOR_VALIDATE_COMMAND",
        );
        override_words(
            &mut self.sensor.reload_command,
            "RULESMITH_SENSOR_RELOAD_COMMAND",
        );
        override_words(
            &mut self.sensor.fallback_reload_command,
            "RULESMITH_SENSOR_FALLBACK_RELOAD_COMMAND",
        );
        override_u64(
            &mut self.sensor.command_timeout_secs,
            "RULESMITH_SENSOR_COMMAND_TIMEOUT_SECS",
        );

        // Pipeline
        override_u64(
            &mut self.pipeline.processing_interval_ms,
            "RULESMITH_PIPELINE_PROCESSING_INTERVAL_MS",
        );
        override_usize(
            &mut self.pipeline.max_alerts_per_batch,
            "RULESMITH_PIPELINE_MAX_ALERTS_PER_BATCH",
        );
        override_usize(
            &mut self.pipeline.max_concurrent_analyses,
            "RULESMITH_PIPELINE_MAX_CONCURRENT_ANALYSES",
        );
        override_f64(
            &mut self.pipeline.confidence_threshold,
            "RULESMITH_PIPELINE_CONFIDENCE_THRESHOLD",
        );
        override_u64(
            &mut self.pipeline.io_retry_delay_ms,
            "RULESMITH_PIPELINE_IO_RETRY_DELAY_MS",
        );
        override_usize(
            &mut self.pipeline.max_read_bytes,
            "RULESMITH_PIPELINE_MAX_READ_BYTES",
        );
        override_u64(
            &mut self.pipeline.stats_interval_secs,
            "RULESMITH_PIPELINE_STATS_INTERVAL_SECS",
        );
        override_u64(
            &mut self.pipeline.shutdown_timeout_secs,
            "RULESMITH_PIPELINE_SHUTDOWN_TIMEOUT_SECS",
        );

        // Analysis
        override_string(&mut self.analysis.backend, "RULESMITH_ANALYSIS_BACKEND");
        override_string(&mut self.analysis.model_name, "RULESMITH_ANALYSIS_MODEL_NAME");
        override_string(
            &mut self.analysis.api_endpoint,
            "RULESMITH_ANALYSIS_API_ENDPOINT",
        );
        override_string(&mut self.analysis.api_key, "RULESMITH_ANALYSIS_API_KEY");
        override_u64(
            &mut self.analysis.request_timeout_secs,
            "RULESMITH_ANALYSIS_REQUEST_TIMEOUT_SECS",
        );
        override_u32(
            &mut self.analysis.max_retries,
            "RULESMITH_ANALYSIS_MAX_RETRIES",
        );
        override_u64(
            &mut self.analysis.retry_backoff_base_ms,
            "RULESMITH_ANALYSIS_RETRY_BACKOFF_BASE_MS",
        );

        // Rules
        override_u32(&mut self.rules.sid_start, "RULESMITH_RULES_SID_START");
        override_string(
            &mut self.rules.message_prefix,
            "RULESMITH_RULES_MESSAGE_PREFIX",
        );
        override_u32(
            &mut self.rules.default_priority,
            "RULESMITH_RULES_DEFAULT_PRIORITY",
        );
        override_usize(
            &mut self.rules.backup_retention,
            "RULESMITH_RULES_BACKUP_RETENTION",
        );

        // History
        override_string(
            &mut self.history.alert_history_path,
            "RULESMITH_HISTORY_ALERT_HISTORY_PATH",
        );
        override_string(
            &mut self.history.rule_history_path,
            "RULESMITH_HISTORY_RULE_HISTORY_PATH",
        );
        override_string(
            &mut self.history.final_stats_path,
            "RULESMITH_HISTORY_FINAL_STATS_PATH",
        );
        override_u32(
            &mut self.history.retention_days,
            "RULESMITH_HISTORY_RETENTION_DAYS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "RULESMITH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "RULESMITH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "RULESMITH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), RulesmithError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.sensor.alert_log_path.is_empty() {
            return Err(invalid("sensor.alert_log_path", "must not be empty"));
        }
        if self.sensor.rule_store_path.is_empty() {
            return Err(invalid("sensor.rule_store_path", "must not be empty"));
        }
        if self.sensor.validate_command.is_empty() {
            return Err(invalid("sensor.validate_command", "must not be empty"));
        }
        if self.sensor.command_timeout_secs == 0 {
            return Err(invalid("sensor.command_timeout_secs", "must be greater than 0"));
        }

        let threshold = self.pipeline.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid(
                "pipeline.confidence_threshold",
                format!("must be within [0.0, 1.0], got {threshold}"),
            ));
        }
        if self.pipeline.max_alerts_per_batch == 0 {
            return Err(invalid(
                "pipeline.max_alerts_per_batch",
                "must be greater than 0",
            ));
        }
        if self.pipeline.max_concurrent_analyses == 0 {
            return Err(invalid(
                "pipeline.max_concurrent_analyses",
                "must be greater than 0",
            ));
        }
        if self.pipeline.processing_interval_ms == 0 {
            return Err(invalid(
                "pipeline.processing_interval_ms",
                "must be greater than 0",
            ));
        }
        if self.pipeline.max_read_bytes == 0 {
            return Err(invalid("pipeline.max_read_bytes", "must be greater than 0"));
        }

        match self.analysis.backend.as_str() {
            "local" => {}
            "remote" => {
                if self.analysis.api_key.is_empty() {
                    return Err(invalid(
                        "analysis.api_key",
                        "required when analysis.backend is 'remote'",
                    ));
                }
                if self.analysis.api_endpoint.is_empty() {
                    return Err(invalid(
                        "analysis.api_endpoint",
                        "required when analysis.backend is 'remote'",
                    ));
                }
            }
            other => {
                return Err(invalid(
                    "analysis.backend",
                    format!("unknown backend '{other}', expected 'remote' or 'local'"),
                ));
            }
        }

        if self.rules.message_prefix.is_empty() {
            return Err(invalid("rules.message_prefix", "must not be empty"));
        }
        if self
            .rules
            .message_prefix
            .chars()
            .any(|c| matches!(c, '"' | ';' | ',' | '\\') || c.is_control())
        {
            return Err(invalid(
                "rules.message_prefix",
                "must not contain quotes, semicolons, commas, backslashes or control characters",
            ));
        }
        if self.rules.backup_retention == 0 {
            return Err(invalid("rules.backup_retention", "must be greater than 0"));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> RulesmithError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 센서 연동 설정
///
/// 감시할 알림 로그, 갱신할 룰 파일, 검증/리로드 명령을 정의합니다.
/// 명령은 셸을 거치지 않고 `argv` 배열로 실행됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// 감시 대상 알림 로그 경로
    pub alert_log_path: String,
    /// 생성된 룰이 기록될 룰 파일 경로
    pub rule_store_path: String,
    /// 룰 저장소 검증 명령
    pub validate_command: Vec<String>,
    /// 센서 룰 리로드 명령
    pub reload_command: Vec<String>,
    /// 리로드 실패 시 대체 명령
    pub fallback_reload_command: Vec<String>,
    /// 외부 명령 타임아웃 (초)
    pub command_timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            alert_log_path: "/var/log/snort/alert_fast.txt".to_owned(),
            rule_store_path: "/etc/snort/rules/ml_generated.rules".to_owned(),
            validate_command: vec![
                "/usr/local/bin/snort".to_owned(),
                "-c".to_owned(),
                "/usr/local/etc/snort/snort.lua".to_owned(),
                "-T".to_owned(),
            ],
            reload_command: vec![
                "systemctl".to_owned(),
                "reload".to_owned(),
                "snort3".to_owned(),
            ],
            fallback_reload_command: vec![
                "pkill".to_owned(),
                "-HUP".to_owned(),
                "snort".to_owned(),
            ],
            command_timeout_secs: 30,
        }
    }
}

/// 배치 처리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// 처리 주기 (밀리초)
    pub processing_interval_ms: u64,
    /// 배치당 최대 알림 수
    pub max_alerts_per_batch: usize,
    /// 동시 분석 상한
    pub max_concurrent_analyses: usize,
    /// 룰 생성 신뢰도 임계값 `[0.0, 1.0]`
    pub confidence_threshold: f64,
    /// 로그 파일 I/O 실패 후 재시도 대기 (밀리초)
    pub io_retry_delay_ms: u64,
    /// 폴링 1회당 최대 읽기 바이트
    pub max_read_bytes: usize,
    /// 통계 보고 주기 (초)
    pub stats_interval_secs: u64,
    /// 종료 시 태스크 대기 한도 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            processing_interval_ms: 5_000,
            max_alerts_per_batch: 10,
            max_concurrent_analyses: 3,
            confidence_threshold: 0.98,
            io_retry_delay_ms: 5_000,
            max_read_bytes: 1024 * 1024,
            stats_interval_secs: 60,
            shutdown_timeout_secs: 30,
        }
    }
}

/// 분석 백엔드 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 백엔드 종류 (remote, local)
    pub backend: String,
    /// 원격 모델 이름
    pub model_name: String,
    /// OpenAI 호환 API 엔드포인트 (base URL)
    pub api_endpoint: String,
    /// API 키 (환경변수 `RULESMITH_ANALYSIS_API_KEY` 권장)
    pub api_key: String,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 최대 시도 횟수
    pub max_retries: u32,
    /// 재시도 백오프 기본값 (밀리초, 시도마다 2배)
    pub retry_backoff_base_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            backend: "local".to_owned(),
            model_name: "gpt-4".to_owned(),
            api_endpoint: "https://api.openai.com/v1".to_owned(),
            api_key: String::new(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_base_ms: 1_000,
        }
    }
}

/// 룰 생성 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// SID 할당 시작값
    pub sid_start: u32,
    /// 생성 룰 메시지 접두어
    pub message_prefix: String,
    /// 생성 룰 기본 우선순위
    pub default_priority: u32,
    /// 보관할 백업 개수
    pub backup_retention: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            sid_start: 2_000_000,
            message_prefix: "ML_GENERATED".to_owned(),
            default_priority: 1,
            backup_retention: 5,
        }
    }
}

/// 히스토리/통계 저장 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// 분석 히스토리 파일
    pub alert_history_path: String,
    /// 생성 룰 히스토리 파일
    pub rule_history_path: String,
    /// 종료 시 최종 통계 파일
    pub final_stats_path: String,
    /// 히스토리 보관 일수
    pub retention_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            alert_history_path: "/var/lib/rulesmith/alert_history.json".to_owned(),
            rule_history_path: "/var/lib/rulesmith/rule_history.json".to_owned(),
            final_stats_path: "/var/lib/rulesmith/final_stats.json".to_owned(),
            retention_days: 30,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_f64(target: &mut f64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<f64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse f64 from env var, ignoring"
            ),
        }
    }
}

/// 공백으로 구분된 명령줄을 `argv`로 분리합니다.
fn override_words(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split_whitespace().map(str::to_owned).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = RulesmithConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.pipeline.max_alerts_per_batch, 10);
        assert_eq!(config.pipeline.max_concurrent_analyses, 3);
        assert!((config.pipeline.confidence_threshold - 0.98).abs() < f64::EPSILON);
        assert_eq!(config.rules.sid_start, 2_000_000);
        assert_eq!(config.rules.message_prefix, "ML_GENERATED");
        assert_eq!(config.rules.backup_retention, 5);
        assert_eq!(config.history.retention_days, 30);
        assert_eq!(config.analysis.backend, "local");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        let config = RulesmithConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = RulesmithConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(
            config.sensor.alert_log_path,
            "/var/log/snort/alert_fast.txt"
        );
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[pipeline]
max_alerts_per_batch = 25
"#;
        let config = RulesmithConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.pipeline.max_alerts_per_batch, 25);
        assert_eq!(config.pipeline.max_concurrent_analyses, 3);
    }

    #[test]
    fn from_str_full_toml() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"

[sensor]
alert_log_path = "/tmp/alert_fast.txt"
rule_store_path = "/tmp/rules/generated.rules"
validate_command = ["snort", "-T"]
reload_command = ["true"]
fallback_reload_command = []
command_timeout_secs = 10

[pipeline]
processing_interval_ms = 1000
max_alerts_per_batch = 4
max_concurrent_analyses = 2
confidence_threshold = 0.9
io_retry_delay_ms = 250
max_read_bytes = 65536
stats_interval_secs = 15
shutdown_timeout_secs = 5

[analysis]
backend = "remote"
model_name = "gpt-4o"
api_endpoint = "http://localhost:8080/v1"
api_key = "test-key"
request_timeout_secs = 5
max_retries = 2
retry_backoff_base_ms = 10

[rules]
sid_start = 3000000
message_prefix = "AUTO"
default_priority = 2
backup_retention = 3

[history]
alert_history_path = "/tmp/a.json"
rule_history_path = "/tmp/r.json"
final_stats_path = "/tmp/s.json"
retention_days = 7

[metrics]
enabled = true
listen_addr = "0.0.0.0"
port = 9200
"#;
        let config = RulesmithConfig::parse(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.sensor.validate_command, vec!["snort", "-T"]);
        assert!(config.sensor.fallback_reload_command.is_empty());
        assert_eq!(config.pipeline.processing_interval_ms, 1000);
        assert_eq!(config.analysis.backend, "remote");
        assert_eq!(config.rules.sid_start, 3_000_000);
        assert_eq!(config.history.retention_days, 7);
        assert_eq!(config.metrics.port, 9200);
    }

    #[test]
    fn parse_rejects_invalid_toml() {
        let err = RulesmithConfig::parse("[pipeline\nmax = ").unwrap_err();
        assert!(matches!(
            err,
            RulesmithError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = RulesmithConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_level"));
    }

    #[test]
    fn validate_rejects_threshold_out_of_range() {
        let mut config = RulesmithConfig::default();
        config.pipeline.confidence_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pipeline.confidence_threshold"));

        config.pipeline.confidence_threshold = -0.1;
        assert!(config.validate().is_err());

        config.pipeline.confidence_threshold = 0.0;
        config.validate().unwrap();
        config.pipeline.confidence_threshold = 1.0;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_remote_backend_without_key() {
        let mut config = RulesmithConfig::default();
        config.analysis.backend = "remote".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("analysis.api_key"));

        config.analysis.api_key = "sk-test".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_unknown_backend() {
        let mut config = RulesmithConfig::default();
        config.analysis.backend = "quantum".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("analysis.backend"));
    }

    #[test]
    fn validate_rejects_empty_paths() {
        let mut config = RulesmithConfig::default();
        config.sensor.alert_log_path.clear();
        assert!(config.validate().is_err());

        let mut config = RulesmithConfig::default();
        config.sensor.rule_store_path.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch_and_concurrency() {
        let mut config = RulesmithConfig::default();
        config.pipeline.max_alerts_per_batch = 0;
        assert!(config.validate().is_err());

        let mut config = RulesmithConfig::default();
        config.pipeline.max_concurrent_analyses = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_prefix_with_rule_syntax() {
        let mut config = RulesmithConfig::default();
        config.rules.message_prefix = "BAD\"; sid:1".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rules.message_prefix"));
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = RulesmithConfig::from_file("/nonexistent/rulesmith.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RulesmithError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rulesmith.toml");
        tokio::fs::write(&path, "[rules]\nsid_start = 4000000\n")
            .await
            .unwrap();

        let config = RulesmithConfig::from_file(&path).await.unwrap();
        assert_eq!(config.rules.sid_start, 4_000_000);
    }
}
