//! 배치 윈도우 -- 분석 대기 중인 알림을 모으고 플러시 시점을 결정합니다.
//!
//! # 플러시 트리거
//! - 크기: 대기 알림 수가 `max_alerts_per_batch` 이상
//! - 경과: 마지막 플러시 이후 `2 × processing_interval` 초과 (폴링마다 확인)
//! - 주기: 마지막 플러시 이후 `processing_interval` 초과 (주기 태스크가 확인)
//!
//! 세 조건 모두 윈도우가 비어 있으면 플러시하지 않습니다.

use std::time::Duration;

use tokio::time::Instant;

use rulesmith_core::types::{AlertRecord, FeatureVector};

/// 분석 대기 중인 알림
#[derive(Debug, Clone)]
pub struct PendingAlert {
    pub record: AlertRecord,
    pub features: FeatureVector,
}

/// 플러시를 일으킨 조건
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// 배치 크기 도달
    Size,
    /// 폴링 시 경과 시간 초과 (2 × interval)
    Age,
    /// 주기 태스크의 경과 시간 초과 (1 × interval)
    Periodic,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Age => "age",
            Self::Periodic => "periodic",
        }
    }
}

/// 배치 윈도우
///
/// 플러시 시작 시 원자적으로 비워지고, 플러시가 끝나면 (성공/실패 무관)
/// 마지막 플러시 시각이 갱신됩니다.
#[derive(Debug)]
pub struct BatchWindow {
    pending: Vec<PendingAlert>,
    last_flush: Instant,
    max_alerts: usize,
    interval: Duration,
}

impl BatchWindow {
    pub fn new(max_alerts: usize, interval: Duration) -> Self {
        Self {
            pending: Vec::with_capacity(max_alerts),
            last_flush: Instant::now(),
            max_alerts: max_alerts.max(1),
            interval,
        }
    }

    pub fn push(&mut self, alert: PendingAlert) {
        self.pending.push(alert);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 폴링 직후 확인하는 트리거 (크기 또는 2 × interval 경과)
    pub fn poll_trigger(&self, now: Instant) -> Option<FlushTrigger> {
        if self.pending.is_empty() {
            return None;
        }
        if self.pending.len() >= self.max_alerts {
            return Some(FlushTrigger::Size);
        }
        if now.saturating_duration_since(self.last_flush) > self.interval * 2 {
            return Some(FlushTrigger::Age);
        }
        None
    }

    /// 주기 태스크가 확인하는 트리거 (1 × interval 경과)
    pub fn periodic_trigger(&self, now: Instant) -> Option<FlushTrigger> {
        if !self.pending.is_empty() && now.saturating_duration_since(self.last_flush) > self.interval
        {
            Some(FlushTrigger::Periodic)
        } else {
            None
        }
    }

    /// 대기 중인 알림을 모두 꺼냅니다.
    pub fn drain(&mut self) -> Vec<PendingAlert> {
        std::mem::take(&mut self.pending)
    }

    /// 플러시 완료 시각을 기록합니다.
    pub fn mark_flushed(&mut self, at: Instant) {
        self.last_flush = at;
    }

    pub fn last_flush(&self) -> Instant {
        self.last_flush
    }
}
