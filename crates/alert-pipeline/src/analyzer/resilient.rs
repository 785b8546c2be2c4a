//! 재시도 래퍼 -- 분석 실패를 파이프라인 밖으로 내보내지 않습니다.
//!
//! 일시적 실패는 지수 백오프(`base × 2^attempt`)로 재시도하고, 시도마다
//! 타임아웃을 적용합니다. 재시도가 소진되거나 영구 실패이면 낮은 신뢰도의
//! 기본 결과([`AnalysisResult::degraded`])를 반환합니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rulesmith_core::analysis::ThreatAnalyzer;
use rulesmith_core::error::AnalysisError;
use rulesmith_core::metrics as m;
use rulesmith_core::pipeline::BoxFuture;
use rulesmith_core::types::{AlertRecord, AnalysisResult, FeatureVector};

/// 재시도 정책
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (최소 1)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간
    pub backoff_base: Duration,
    /// 시도 1회의 타임아웃
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(1_000),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// `attempt`번째 실패 후 대기 시간 (0부터)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// 실패하지 않는 분석기
pub struct ResilientAnalyzer {
    inner: Arc<dyn ThreatAnalyzer>,
    policy: RetryPolicy,
}

impl ResilientAnalyzer {
    pub fn new(inner: Arc<dyn ThreatAnalyzer>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// 재시도 후 결과를 반환합니다. 항상 결과를 돌려줍니다.
    pub async fn analyze_or_degrade(
        &self,
        record: &AlertRecord,
        features: &FeatureVector,
    ) -> AnalysisResult {
        let started = Instant::now();
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = self.policy.backoff(attempt - 1);
                tracing::warn!(
                    backend = self.inner.name(),
                    alert_sid = record.sid,
                    attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "retrying analysis"
                );
                tokio::time::sleep(backoff).await;
            }

            let outcome = tokio::time::timeout(
                self.policy.attempt_timeout,
                self.inner.analyze(record, features),
            )
            .await
            .unwrap_or_else(|_elapsed| {
                Err(AnalysisError::Unavailable(format!(
                    "analysis timed out after {}s",
                    self.policy.attempt_timeout.as_secs()
                )))
            });

            match outcome {
                Ok(result) => {
                    self.record(started, "ok");
                    tracing::info!(
                        backend = self.inner.name(),
                        alert_sid = record.sid,
                        confidence = result.confidence,
                        classification = %result.threat_classification,
                        "alert analyzed"
                    );
                    return result;
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        backend = self.inner.name(),
                        alert_sid = record.sid,
                        attempt = attempt + 1,
                        error = %e,
                        "analysis attempt failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_owned());
        tracing::error!(
            backend = self.inner.name(),
            alert_sid = record.sid,
            error = %reason,
            "analysis failed, using degraded default result"
        );
        self.record(started, "degraded");
        AnalysisResult::degraded(reason)
    }

    fn record(&self, started: Instant, result: &'static str) {
        metrics::counter!(
            m::ANALYSIS_COMPLETED_TOTAL,
            m::LABEL_BACKEND => self.inner.name().to_owned(),
            m::LABEL_RESULT => result
        )
        .increment(1);
        metrics::histogram!(m::ANALYSIS_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    }
}

impl ThreatAnalyzer for ResilientAnalyzer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn analyze<'a>(
        &'a self,
        record: &'a AlertRecord,
        features: &'a FeatureVector,
    ) -> BoxFuture<'a, Result<AnalysisResult, AnalysisError>> {
        Box::pin(async move { Ok(self.analyze_or_degrade(record, features).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rulesmith_core::types::{DEGRADED_CLASSIFICATION, DEGRADED_CONFIDENCE, RecommendedAction};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 처음 `failures`번은 실패하고 그 다음부터 성공하는 분석기
    struct FlakyAnalyzer {
        failures: u32,
        error: fn(String) -> AnalysisError,
        calls: AtomicU32,
    }

    impl ThreatAnalyzer for FlakyAnalyzer {
        fn name(&self) -> &str {
            "flaky"
        }

        fn analyze<'a>(
            &'a self,
            _record: &'a AlertRecord,
            _features: &'a FeatureVector,
        ) -> BoxFuture<'a, Result<AnalysisResult, AnalysisError>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.failures {
                    Err((self.error)(format!("failure {call}")))
                } else {
                    Ok(AnalysisResult::new(0.9, "scan", "ok", RecommendedAction::Monitor))
                }
            })
        }
    }

    struct HangingAnalyzer;

    impl ThreatAnalyzer for HangingAnalyzer {
        fn name(&self) -> &str {
            "hanging"
        }

        fn analyze<'a>(
            &'a self,
            _record: &'a AlertRecord,
            _features: &'a FeatureVector,
        ) -> BoxFuture<'a, Result<AnalysisResult, AnalysisError>> {
            Box::pin(std::future::pending())
        }
    }

    fn record() -> AlertRecord {
        AlertRecord {
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            priority: 2,
            classification: "Misc activity".to_owned(),
            message: "test".to_owned(),
            protocol: "TCP".to_owned(),
            src_ip: "10.0.0.1".to_owned(),
            src_port: Some(1234),
            dst_ip: "10.0.0.2".to_owned(),
            dst_port: Some(80),
            gid: 1,
            sid: 1,
            rev: 1,
            raw: String::new(),
        }
    }

    fn flaky(failures: u32, error: fn(String) -> AnalysisError) -> Arc<FlakyAnalyzer> {
        Arc::new(FlakyAnalyzer {
            failures,
            error,
            calls: AtomicU32::new(0),
        })
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base: Duration::from_millis(100),
            attempt_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn backoff_doubles() {
        let p = policy(3);
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(2), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_until_success() {
        let inner = flaky(2, AnalysisError::Unavailable);
        let analyzer = ResilientAnalyzer::new(inner.clone(), policy(3));

        let started = tokio::time::Instant::now();
        let result = analyzer
            .analyze(&record(), &FeatureVector::new())
            .await
            .unwrap();
        assert!(!result.degraded);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms 백오프
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_degrade() {
        let inner = flaky(10, AnalysisError::RateLimited);
        let analyzer = ResilientAnalyzer::new(inner.clone(), policy(3));

        let result = analyzer
            .analyze(&record(), &FeatureVector::new())
            .await
            .unwrap();
        assert!(result.degraded);
        assert_eq!(result.confidence, DEGRADED_CONFIDENCE);
        assert_eq!(result.threat_classification, DEGRADED_CLASSIFICATION);
        assert_eq!(result.recommended_action, RecommendedAction::Investigate);
        assert!(result.additional_context.contains_key("error"));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let inner = flaky(10, AnalysisError::Rejected);
        let analyzer = ResilientAnalyzer::new(inner.clone(), policy(5));

        let result = analyzer.analyze_or_degrade(&record(), &FeatureVector::new()).await;
        assert!(result.degraded);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_backend_times_out() {
        let analyzer = ResilientAnalyzer::new(Arc::new(HangingAnalyzer), policy(2));
        let result = analyzer.analyze_or_degrade(&record(), &FeatureVector::new()).await;
        assert!(result.degraded);
        assert!(result.threat_description.contains("timed out"));
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let inner = flaky(0, AnalysisError::Unavailable);
        let analyzer = ResilientAnalyzer::new(inner.clone(), policy(0));
        let result = analyzer.analyze_or_degrade(&record(), &FeatureVector::new()).await;
        assert!(!result.degraded);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
