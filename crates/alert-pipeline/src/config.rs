//! 파이프라인 설정
//!
//! [`PipelineConfig`]는 `rulesmith-core`의 섹션별 설정을 파이프라인이 실제로
//! 사용하는 형태(경로, `Duration`, 명령 argv)로 모은 구조체입니다.
//! core 설정에서 [`PipelineConfig::from_core`]로 변환하거나
//! [`PipelineConfigBuilder`]로 직접 구성합니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rulesmith_core::config::RulesmithConfig;

use crate::error::AlertPipelineError;
use crate::rule::SynthesisPolicy;

/// 알림 파이프라인 설정
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 감시할 알림 로그
    pub alert_log_path: PathBuf,
    /// 생성 룰을 기록할 룰 파일
    pub rule_store_path: PathBuf,
    /// 룰 저장소 검증 명령
    pub validate_command: Vec<String>,
    /// 리로드 명령
    pub reload_command: Vec<String>,
    /// 리로드 대체 명령
    pub fallback_reload_command: Vec<String>,
    /// 외부 명령 타임아웃
    pub command_timeout: Duration,

    /// 폴링/처리 주기
    pub processing_interval: Duration,
    /// 배치당 최대 알림 수
    pub max_alerts_per_batch: usize,
    /// 동시 분석 상한
    pub max_concurrent_analyses: usize,
    /// 룰 생성 신뢰도 임계값
    pub confidence_threshold: f64,
    /// I/O 실패 후 대기
    pub io_retry_delay: Duration,
    /// 폴링 1회당 최대 읽기 바이트
    pub max_read_bytes: usize,
    /// 통계 보고 주기
    pub stats_interval: Duration,
    /// 종료 시 태스크 대기 한도
    pub shutdown_timeout: Duration,

    /// SID 할당 시작값
    pub sid_start: u32,
    /// 생성 룰 메시지 접두어
    pub message_prefix: String,
    /// 생성 룰 기본 우선순위
    pub default_priority: u32,
    /// 보관할 백업 개수
    pub backup_retention: usize,

    pub alert_history_path: PathBuf,
    pub rule_history_path: PathBuf,
    pub final_stats_path: PathBuf,
    /// 히스토리 보관 일수
    pub retention_days: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&RulesmithConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &RulesmithConfig) -> Self {
        let sensor = &core.sensor;
        let batch = &core.pipeline;
        let rules = &core.rules;
        let history = &core.history;
        Self {
            alert_log_path: PathBuf::from(&sensor.alert_log_path),
            rule_store_path: PathBuf::from(&sensor.rule_store_path),
            validate_command: sensor.validate_command.clone(),
            reload_command: sensor.reload_command.clone(),
            fallback_reload_command: sensor.fallback_reload_command.clone(),
            command_timeout: Duration::from_secs(sensor.command_timeout_secs),

            processing_interval: Duration::from_millis(batch.processing_interval_ms),
            max_alerts_per_batch: batch.max_alerts_per_batch,
            max_concurrent_analyses: batch.max_concurrent_analyses,
            confidence_threshold: batch.confidence_threshold,
            io_retry_delay: Duration::from_millis(batch.io_retry_delay_ms),
            max_read_bytes: batch.max_read_bytes,
            stats_interval: Duration::from_secs(batch.stats_interval_secs),
            shutdown_timeout: Duration::from_secs(batch.shutdown_timeout_secs),

            sid_start: rules.sid_start,
            message_prefix: rules.message_prefix.clone(),
            default_priority: rules.default_priority,
            backup_retention: rules.backup_retention,

            alert_history_path: PathBuf::from(&history.alert_history_path),
            rule_history_path: PathBuf::from(&history.rule_history_path),
            final_stats_path: PathBuf::from(&history.final_stats_path),
            retention_days: history.retention_days,
        }
    }

    /// 룰 저장소가 위치한 디렉토리 (SID 스캔 대상)
    pub fn rule_store_dir(&self) -> &Path {
        match self.rule_store_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// 룰 합성 정책
    pub fn synthesis_policy(&self) -> SynthesisPolicy {
        SynthesisPolicy {
            confidence_threshold: self.confidence_threshold,
            message_prefix: self.message_prefix.clone(),
            default_priority: self.default_priority,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), AlertPipelineError> {
        if self.alert_log_path.as_os_str().is_empty() {
            return Err(config_error("alert_log_path", "must not be empty"));
        }
        if self.rule_store_path.as_os_str().is_empty() {
            return Err(config_error("rule_store_path", "must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(config_error(
                "confidence_threshold",
                format!("must be within [0.0, 1.0], got {}", self.confidence_threshold),
            ));
        }
        if self.max_alerts_per_batch == 0 {
            return Err(config_error("max_alerts_per_batch", "must be greater than 0"));
        }
        if self.max_concurrent_analyses == 0 {
            return Err(config_error(
                "max_concurrent_analyses",
                "must be greater than 0",
            ));
        }
        if self.processing_interval.is_zero() {
            return Err(config_error("processing_interval", "must be greater than 0"));
        }
        if self.max_read_bytes == 0 {
            return Err(config_error("max_read_bytes", "must be greater than 0"));
        }
        if self.command_timeout.is_zero() {
            return Err(config_error("command_timeout", "must be greater than 0"));
        }
        if self.message_prefix.is_empty() {
            return Err(config_error("message_prefix", "must not be empty"));
        }
        if self.backup_retention == 0 {
            return Err(config_error("backup_retention", "must be greater than 0"));
        }
        Ok(())
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> AlertPipelineError {
    AlertPipelineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// core 설정 값으로 시작합니다.
    pub fn from_core(core: &RulesmithConfig) -> Self {
        Self {
            config: PipelineConfig::from_core(core),
        }
    }

    pub fn alert_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.alert_log_path = path.into();
        self
    }

    pub fn rule_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rule_store_path = path.into();
        self
    }

    /// 검증/리로드/대체 리로드 명령을 설정합니다.
    pub fn commands(
        mut self,
        validate: Vec<String>,
        reload: Vec<String>,
        fallback: Vec<String>,
    ) -> Self {
        self.config.validate_command = validate;
        self.config.reload_command = reload;
        self.config.fallback_reload_command = fallback;
        self
    }

    pub fn processing_interval(mut self, interval: Duration) -> Self {
        self.config.processing_interval = interval;
        self
    }

    pub fn max_alerts_per_batch(mut self, n: usize) -> Self {
        self.config.max_alerts_per_batch = n;
        self
    }

    pub fn max_concurrent_analyses(mut self, n: usize) -> Self {
        self.config.max_concurrent_analyses = n;
        self
    }

    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.confidence_threshold = threshold;
        self
    }

    pub fn io_retry_delay(mut self, delay: Duration) -> Self {
        self.config.io_retry_delay = delay;
        self
    }

    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.config.stats_interval = interval;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    pub fn sid_start(mut self, start: u32) -> Self {
        self.config.sid_start = start;
        self
    }

    pub fn message_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.message_prefix = prefix.into();
        self
    }

    pub fn backup_retention(mut self, n: usize) -> Self {
        self.config.backup_retention = n;
        self
    }

    /// 히스토리와 최종 통계 파일을 한 디렉토리 아래에 둡니다.
    pub fn state_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.config.alert_history_path = dir.join("alert_history.json");
        self.config.rule_history_path = dir.join("rule_history.json");
        self.config.final_stats_path = dir.join("final_stats.json");
        self
    }

    pub fn retention_days(mut self, days: u32) -> Self {
        self.config.retention_days = days;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, AlertPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_converts_units() {
        let mut core = RulesmithConfig::default();
        core.pipeline.processing_interval_ms = 250;
        core.pipeline.max_alerts_per_batch = 7;
        core.sensor.command_timeout_secs = 4;
        core.rules.sid_start = 3_000_000;

        let config = PipelineConfig::from_core(&core);
        assert_eq!(config.processing_interval, Duration::from_millis(250));
        assert_eq!(config.max_alerts_per_batch, 7);
        assert_eq!(config.command_timeout, Duration::from_secs(4));
        assert_eq!(config.sid_start, 3_000_000);
        assert_eq!(
            config.rule_store_dir(),
            Path::new("/etc/snort/rules")
        );
    }

    #[test]
    fn bare_store_file_scans_current_dir() {
        let config = PipelineConfigBuilder::new()
            .rule_store_path("local.rules")
            .build()
            .unwrap();
        assert_eq!(config.rule_store_dir(), Path::new("."));
    }

    #[test]
    fn synthesis_policy_follows_config() {
        let config = PipelineConfigBuilder::new()
            .confidence_threshold(0.8)
            .message_prefix("AUTO")
            .build()
            .unwrap();
        let policy = config.synthesis_policy();
        assert_eq!(policy.confidence_threshold, 0.8);
        assert_eq!(policy.message_prefix, "AUTO");
        assert_eq!(policy.default_priority, 1);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(
            PipelineConfigBuilder::new()
                .confidence_threshold(1.5)
                .build()
                .is_err()
        );
        assert!(
            PipelineConfigBuilder::new()
                .max_alerts_per_batch(0)
                .build()
                .is_err()
        );
        assert!(
            PipelineConfigBuilder::new()
                .max_concurrent_analyses(0)
                .build()
                .is_err()
        );
        assert!(
            PipelineConfigBuilder::new()
                .processing_interval(Duration::ZERO)
                .build()
                .is_err()
        );
        let err = PipelineConfigBuilder::new()
            .message_prefix("")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("message_prefix"));
    }

    #[test]
    fn state_dir_places_all_files() {
        let config = PipelineConfigBuilder::new()
            .state_dir("/tmp/rulesmith")
            .build()
            .unwrap();
        assert_eq!(
            config.final_stats_path,
            PathBuf::from("/tmp/rulesmith/final_stats.json")
        );
        assert_eq!(
            config.alert_history_path,
            PathBuf::from("/tmp/rulesmith/alert_history.json")
        );
    }
}
