//! Daemon assembly and lifecycle management.
//!
//! The [`Orchestrator`] loads configuration, builds the analysis backend
//! and sensor controller, assembles the alert pipeline, and runs it until
//! a shutdown signal arrives.
//!
//! # Shutdown
//!
//! `SIGTERM`/`SIGINT` (or cancelling [`Orchestrator::shutdown_token`])
//! cancels the shared token. The pipeline then stops its background
//! tasks and writes final statistics.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use rulesmith_core::config::RulesmithConfig;
use rulesmith_core::pipeline::Pipeline;
use rulesmith_pipeline::{
    AlertPipeline, AlertPipelineBuilder, PipelineConfig, ProcessSensorController, create_analyzer,
};

use crate::health::DaemonHealth;
use crate::metrics_server;

const UPTIME_REFRESH: Duration = Duration::from_secs(10);

/// The daemon orchestrator.
pub struct Orchestrator {
    config: RulesmithConfig,
    pipeline: AlertPipeline<ProcessSensorController>,
    shutdown: CancellationToken,
    start_time: Instant,
}

impl Orchestrator {
    /// Load `rulesmith.toml` (with environment overrides) and build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = RulesmithConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Installs the metrics recorder when `[metrics].enabled` is set, so a
    /// process can build at most one metrics-enabled orchestrator.
    pub async fn build_from_config(config: RulesmithConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let analyzer = create_analyzer(&config.analysis, config.pipeline.confidence_threshold)
            .map_err(|e| anyhow::anyhow!("failed to build analyzer: {}", e))?;

        let controller = Arc::new(ProcessSensorController::new(
            config.sensor.validate_command.clone(),
            config.sensor.reload_command.clone(),
            config.sensor.fallback_reload_command.clone(),
            Duration::from_secs(config.sensor.command_timeout_secs),
        ));

        let shutdown = CancellationToken::new();
        let pipeline = AlertPipelineBuilder::new()
            .config(PipelineConfig::from_core(&config))
            .analyzer(analyzer)
            .sensor_controller(controller)
            .cancel_token(shutdown.clone())
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("failed to build alert pipeline: {}", e))?;

        tracing::info!(
            alert_log = %config.sensor.alert_log_path,
            rule_store = %config.sensor.rule_store_path,
            backend = %config.analysis.backend,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            shutdown,
            start_time: Instant::now(),
        })
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start the pipeline and block until shutdown.
    pub async fn run(&mut self) -> Result<()> {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start alert pipeline: {}", e))?;

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown.clone()));

        tracing::info!("entering main loop");
        let reason = tokio::select! {
            signal = wait_for_shutdown_signal() => signal?,
            _ = self.shutdown.cancelled() => "cancelled",
        };
        tracing::info!(reason = reason, "shutdown requested");
        self.shutdown.cancel();

        if let Some(task) = uptime_task {
            join_background("uptime updater", task).await;
        }

        self.pipeline
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop alert pipeline: {}", e))?;

        let stats = self.pipeline.session_stats();
        tracing::info!(
            alerts = stats.alerts_processed,
            analyses = stats.analyses_performed,
            rules_deployed = stats.rules_deployed,
            rollbacks = stats.rollbacks,
            "rulesmith-daemon stopped"
        );
        Ok(())
    }

    /// Current health report.
    pub async fn health(&self) -> DaemonHealth {
        DaemonHealth {
            status: self.pipeline.health_check().await,
            pipeline_state: self.pipeline.state_name().to_owned(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            stats: self.pipeline.session_stats(),
        }
    }

    pub fn config(&self) -> &RulesmithConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &AlertPipeline<ProcessSensorController> {
        &self.pipeline
    }
}

/// Wait for `SIGTERM` or `SIGINT` and return the signal name.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Await a background task, logging it if it panicked or was cancelled.
///
/// Returns `false` when the task did not finish normally.
async fn join_background(name: &str, task: tokio::task::JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                task = name,
                panicked = e.is_panic(),
                error = %e,
                "background task ended abnormally"
            );
            false
        }
    }
}

fn spawn_uptime_updater(
    start_time: Instant,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    use rulesmith_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_REFRESH);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
