//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `rulesmith_`
//! - 단계명: `alerts_`, `analysis_`, `rules_`, `deploy_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(rulesmith_core::metrics::ALERTS_PARSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 분석 백엔드 레이블 키 (remote, local)
pub const LABEL_BACKEND: &str = "backend";

// ─── 수집/파싱 메트릭 ──────────────────────────────────────────────

/// 로그 파일에서 읽은 라인 수 (counter)
pub const ALERTS_LINES_READ_TOTAL: &str = "rulesmith_alerts_lines_read_total";

/// 파싱에 성공한 알림 수 (counter)
pub const ALERTS_PARSED_TOTAL: &str = "rulesmith_alerts_parsed_total";

/// 파싱에 실패한 라인 수 (counter)
pub const ALERTS_PARSE_ERRORS_TOTAL: &str = "rulesmith_alerts_parse_errors_total";

/// 배치 대기 중인 알림 수 (gauge)
pub const ALERTS_PENDING: &str = "rulesmith_alerts_pending";

// ─── 분석 메트릭 ───────────────────────────────────────────────────

/// 분석 완료 수 (counter, label: result)
pub const ANALYSIS_COMPLETED_TOTAL: &str = "rulesmith_analysis_completed_total";

/// 고신뢰도 분석 결과 수 (counter)
pub const ANALYSIS_HIGH_CONFIDENCE_TOTAL: &str = "rulesmith_analysis_high_confidence_total";

/// 분석 소요 시간 (histogram, 초)
pub const ANALYSIS_DURATION_SECONDS: &str = "rulesmith_analysis_duration_seconds";

/// 배치 처리 소요 시간 (histogram, 초)
pub const BATCH_DURATION_SECONDS: &str = "rulesmith_batch_duration_seconds";

// ─── 룰 생성/배포 메트릭 ───────────────────────────────────────────

/// 생성된 룰 수 (counter)
pub const RULES_GENERATED_TOTAL: &str = "rulesmith_rules_generated_total";

/// 구조 검증에서 거부된 룰 수 (counter)
pub const RULES_REJECTED_TOTAL: &str = "rulesmith_rules_rejected_total";

/// 배포 시도 수 (counter, label: result)
pub const DEPLOY_ATTEMPTS_TOTAL: &str = "rulesmith_deploy_attempts_total";

/// 롤백 수 (counter)
pub const DEPLOY_ROLLBACKS_TOTAL: &str = "rulesmith_deploy_rollbacks_total";

// ─── 데몬 메트릭 ───────────────────────────────────────────────────

/// 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "rulesmith_daemon_uptime_seconds";

/// 등록된 모든 메트릭 이름
pub const ALL_METRIC_NAMES: &[&str] = &[
    ALERTS_LINES_READ_TOTAL,
    ALERTS_PARSED_TOTAL,
    ALERTS_PARSE_ERRORS_TOTAL,
    ALERTS_PENDING,
    ANALYSIS_COMPLETED_TOTAL,
    ANALYSIS_HIGH_CONFIDENCE_TOTAL,
    ANALYSIS_DURATION_SECONDS,
    BATCH_DURATION_SECONDS,
    RULES_GENERATED_TOTAL,
    RULES_REJECTED_TOTAL,
    DEPLOY_ATTEMPTS_TOTAL,
    DEPLOY_ROLLBACKS_TOTAL,
    DAEMON_UPTIME_SECONDS,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        ALERTS_LINES_READ_TOTAL,
        "Total number of complete lines read from the alert log"
    );
    describe_counter!(ALERTS_PARSED_TOTAL, "Total number of alerts parsed");
    describe_counter!(
        ALERTS_PARSE_ERRORS_TOTAL,
        "Total number of lines that did not match the alert grammar"
    );
    describe_gauge!(ALERTS_PENDING, "Alerts waiting in the batch window");

    describe_counter!(
        ANALYSIS_COMPLETED_TOTAL,
        "Analyses completed, labelled by result (success, failure)"
    );
    describe_counter!(
        ANALYSIS_HIGH_CONFIDENCE_TOTAL,
        "Analyses at or above the confidence threshold"
    );
    describe_histogram!(
        ANALYSIS_DURATION_SECONDS,
        "Single alert analysis latency in seconds"
    );
    describe_histogram!(BATCH_DURATION_SECONDS, "Batch flush latency in seconds");

    describe_counter!(RULES_GENERATED_TOTAL, "Total number of rules synthesized");
    describe_counter!(
        RULES_REJECTED_TOTAL,
        "Rules rejected by structural validation before deployment"
    );
    describe_counter!(
        DEPLOY_ATTEMPTS_TOTAL,
        "Rule store deployments, labelled by result"
    );
    describe_counter!(
        DEPLOY_ROLLBACKS_TOTAL,
        "Deployments rolled back after sensor validation failure"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_start_with_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("rulesmith_"),
                "Metric '{}' does not start with 'rulesmith_' prefix",
                name
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더 없이 호출해도 패닉하지 않아야 함
        describe_all();
    }
}
