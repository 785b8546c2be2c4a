//! 세션 통계
//!
//! 파이프라인 태스크들이 공유하는 원자 카운터입니다. 주기적으로 로그에
//! 보고되고, 종료 시 최종 통계 파일로 기록됩니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::parser::ParserStats;
use crate::rule::RuleStats;

/// 세션 카운터
#[derive(Debug)]
pub struct PipelineStats {
    alerts_processed: AtomicU64,
    analyses_performed: AtomicU64,
    analysis_failures: AtomicU64,
    high_confidence: AtomicU64,
    rules_generated: AtomicU64,
    rules_deployed: AtomicU64,
    deploy_failures: AtomicU64,
    rollbacks: AtomicU64,
    batches: AtomicU64,
    started: Instant,
    started_at: DateTime<Utc>,
}

/// 세션 통계 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub alerts_processed: u64,
    pub analyses_performed: u64,
    pub analysis_failures: u64,
    pub high_confidence_detections: u64,
    pub rules_generated: u64,
    pub rules_deployed: u64,
    pub deploy_failures: u64,
    pub rollbacks: u64,
    pub batches: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// 종료 시 기록하는 최종 통계
#[derive(Debug, Clone, Serialize)]
pub struct FinalStats {
    pub session_stats: SessionStats,
    pub parser_stats: ParserStats,
    pub rule_stats: RuleStats,
    pub shutdown_time: DateTime<Utc>,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            alerts_processed: AtomicU64::new(0),
            analyses_performed: AtomicU64::new(0),
            analysis_failures: AtomicU64::new(0),
            high_confidence: AtomicU64::new(0),
            rules_generated: AtomicU64::new(0),
            rules_deployed: AtomicU64::new(0),
            deploy_failures: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn add_alerts(&self, n: u64) {
        self.alerts_processed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_analyses(&self, n: u64) {
        self.analyses_performed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_analysis_failures(&self, n: u64) {
        self.analysis_failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_high_confidence(&self, n: u64) {
        self.high_confidence.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_rules_generated(&self, n: u64) {
        self.rules_generated.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_rules_deployed(&self, n: u64) {
        self.rules_deployed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_deploy_failure(&self) {
        self.deploy_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            alerts_processed: self.alerts_processed.load(Ordering::Relaxed),
            analyses_performed: self.analyses_performed.load(Ordering::Relaxed),
            analysis_failures: self.analysis_failures.load(Ordering::Relaxed),
            high_confidence_detections: self.high_confidence.load(Ordering::Relaxed),
            rules_generated: self.rules_generated.load(Ordering::Relaxed),
            rules_deployed: self.rules_deployed.load(Ordering::Relaxed),
            deploy_failures: self.deploy_failures.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }

    /// 현재 통계를 로그로 보고합니다.
    pub fn report(&self, parser: ParserStats, rules: RuleStats) {
        let s = self.snapshot();
        tracing::info!(
            uptime_secs = s.uptime_secs,
            alerts = s.alerts_processed,
            analyses = s.analyses_performed,
            high_confidence = s.high_confidence_detections,
            rules_generated = s.rules_generated,
            rules_deployed = s.rules_deployed,
            rollbacks = s.rollbacks,
            "pipeline statistics"
        );
        tracing::debug!(
            parsed = parser.parsed_count,
            parse_errors = parser.error_count,
            timestamp_fallbacks = parser.timestamp_fallbacks,
            total_rules = rules.total_rules,
            generated_rules = rules.generated_rules,
            "parser and rule store statistics"
        );
    }
}
