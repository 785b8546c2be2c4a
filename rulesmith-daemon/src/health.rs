//! Daemon health report.
//!
//! Combines the pipeline's `health_check()` with daemon uptime and the
//! session counters into a single serializable [`DaemonHealth`].

use serde::Serialize;

use rulesmith_core::pipeline::HealthStatus;
use rulesmith_pipeline::SessionStats;

/// Health report for the whole daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Pipeline health status.
    pub status: HealthStatus,
    /// Pipeline lifecycle state (`initialized`, `running`, `stopped`).
    pub pipeline_state: String,
    /// Daemon uptime in seconds since build.
    pub uptime_secs: u64,
    /// Session counters at the time of the check.
    pub stats: SessionStats,
}

impl DaemonHealth {
    /// Returns `true` when the pipeline is running and not degraded.
    pub fn is_ready(&self) -> bool {
        self.status.is_healthy()
    }

    /// Log the report at a level matching its status.
    pub fn log(&self) {
        match &self.status {
            HealthStatus::Healthy => tracing::debug!(
                state = %self.pipeline_state,
                uptime_secs = self.uptime_secs,
                alerts = self.stats.alerts_processed,
                "daemon healthy"
            ),
            HealthStatus::Degraded(reason) => tracing::warn!(
                state = %self.pipeline_state,
                reason = %reason,
                "daemon degraded"
            ),
            HealthStatus::Unhealthy(reason) => tracing::error!(
                state = %self.pipeline_state,
                reason = %reason,
                "daemon unhealthy"
            ),
        }
    }
}
