//! 파이프라인 생명주기 -- 폴링, 주기 플러시, 통계 보고 태스크를 관리합니다.
//!
//! [`AlertPipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! `rulesmith-daemon`에서 시작/정지/상태 확인됩니다.
//!
//! # 태스크 구성
//! ```text
//! poll:     tailer.poll -> orchestrator.ingest -> (size/age trigger) -> flush
//! periodic: every interval -> (periodic trigger) -> flush
//! stats:    every stats_interval -> PipelineStats::report
//! ```
//!
//! 모든 태스크는 같은 [`CancellationToken`]을 관찰합니다. 정지 시 태스크를
//! `shutdown_timeout`까지 기다린 뒤 최종 통계를 기록합니다. 윈도우에 남은
//! 알림은 분석하지 않고 버립니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rulesmith_core::analysis::ThreatAnalyzer;
use rulesmith_core::error::{PipelineError, RulesmithError};
use rulesmith_core::pipeline::{HealthStatus, Pipeline};

use crate::config::PipelineConfig;
use crate::error::AlertPipelineError;
use crate::history::{HistoryStore, write_json_atomic};
use crate::orchestrator::BatchOrchestrator;
use crate::parser::AlertParser;
use crate::rule::{DeploymentManager, RuleSynthesizer, SensorController, SidAllocator};
use crate::stats::{FinalStats, PipelineStats, SessionStats};
use crate::tailer::StreamTailer;
use crate::window::BatchWindow;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Initialized,
    Running,
    Stopped,
}

/// 알림 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use rulesmith_pipeline::{AlertPipelineBuilder, ProcessSensorController};
///
/// let mut pipeline = AlertPipelineBuilder::new()
///     .config(config)
///     .analyzer(analyzer)
///     .sensor_controller(Arc::new(controller))
///     .build()
///     .await?;
///
/// pipeline.start().await?;
/// ```
pub struct AlertPipeline<C: SensorController> {
    config: PipelineConfig,
    state: PipelineState,
    orchestrator: Arc<BatchOrchestrator<C>>,
    /// 시작 시 폴링 태스크로 이동
    tailer: Option<StreamTailer>,
    stats: Arc<PipelineStats>,
    /// 마지막 폴링이 로그 파일 I/O에 실패했는지 여부
    log_unreadable: Arc<AtomicBool>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<C: SensorController> AlertPipeline<C> {
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<BatchOrchestrator<C>> {
        &self.orchestrator
    }

    /// 현재 세션 통계
    pub fn session_stats(&self) -> SessionStats {
        self.stats.snapshot()
    }

    /// 최종 통계를 모읍니다.
    pub async fn final_stats(&self) -> FinalStats {
        FinalStats {
            session_stats: self.stats.snapshot(),
            parser_stats: self.orchestrator.parser().stats(),
            rule_stats: self.orchestrator.deployer().rule_stats().await,
            shutdown_time: Utc::now(),
        }
    }

    async fn write_final_stats(&self) -> Result<(), AlertPipelineError> {
        let stats = self.final_stats().await;
        write_json_atomic(&self.config.final_stats_path, &stats).await?;
        tracing::info!(
            path = %self.config.final_stats_path.display(),
            alerts = stats.session_stats.alerts_processed,
            rules_deployed = stats.session_stats.rules_deployed,
            "final statistics written"
        );
        Ok(())
    }
}

impl<C: SensorController> Pipeline for AlertPipeline<C> {
    async fn start(&mut self) -> Result<(), RulesmithError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let tailer = self.tailer.take().ok_or_else(|| {
            RulesmithError::Pipeline(PipelineError::InitFailed(
                "alert log tailer already consumed; rebuild the pipeline to restart".to_owned(),
            ))
        })?;

        tracing::info!(
            alert_log = %self.config.alert_log_path.display(),
            rule_store = %self.config.rule_store_path.display(),
            interval_ms = u64::try_from(self.config.processing_interval.as_millis())
                .unwrap_or(u64::MAX),
            threshold = self.config.confidence_threshold,
            "starting alert pipeline"
        );

        self.tasks.push(tokio::spawn(poll_loop(
            tailer,
            Arc::clone(&self.orchestrator),
            self.config.processing_interval,
            self.config.io_retry_delay,
            Arc::clone(&self.log_unreadable),
            self.cancel.clone(),
        )));
        self.tasks.push(tokio::spawn(periodic_loop(
            Arc::clone(&self.orchestrator),
            self.config.processing_interval,
            self.cancel.clone(),
        )));
        self.tasks.push(tokio::spawn(stats_loop(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.stats),
            self.config.stats_interval,
            self.cancel.clone(),
        )));

        self.state = PipelineState::Running;
        tracing::info!("alert pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RulesmithError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping alert pipeline");
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.drain(..).collect();
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let join_all = async {
            for task in tasks {
                if let Err(e) = task.await {
                    tracing::warn!(error = %e, "pipeline task ended abnormally");
                }
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, join_all)
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "pipeline tasks did not stop in time, aborting"
            );
            for abort in aborts {
                abort.abort();
            }
        }

        // 중단된 플러시가 시작한 배포는 검증 또는 롤백까지 마치게 둠
        self.orchestrator.wait_for_deploys().await;

        let discarded = self.orchestrator.pending().await;
        if discarded > 0 {
            tracing::warn!(discarded, "pending alerts discarded at shutdown");
        }

        if let Err(e) = self.write_final_stats().await {
            tracing::warn!(error = %e, "failed to write final statistics");
        }

        self.state = PipelineState::Stopped;
        tracing::info!("alert pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.log_unreadable.load(Ordering::Relaxed) {
                    HealthStatus::Degraded(format!(
                        "alert log unreadable: {}",
                        self.config.alert_log_path.display()
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

async fn poll_loop<C: SensorController>(
    mut tailer: StreamTailer,
    orchestrator: Arc<BatchOrchestrator<C>>,
    interval: Duration,
    io_retry_delay: Duration,
    log_unreadable: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        let wait = match tailer.poll().await {
            Ok(lines) => {
                log_unreadable.store(false, Ordering::Relaxed);
                if !lines.is_empty() {
                    orchestrator.ingest(&lines).await;
                }
                if let Some(trigger) = orchestrator.poll_trigger().await {
                    orchestrator.flush(trigger, &cancel).await;
                }
                interval
            }
            Err(e) => {
                log_unreadable.store(true, Ordering::Relaxed);
                tracing::error!(
                    path = %tailer.path().display(),
                    error = %e,
                    retry_ms = u64::try_from(io_retry_delay.as_millis()).unwrap_or(u64::MAX),
                    "failed to read alert log"
                );
                io_retry_delay
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }
    tracing::debug!("alert poll loop stopped");
}

async fn periodic_loop<C: SensorController>(
    orchestrator: Arc<BatchOrchestrator<C>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(trigger) = orchestrator.periodic_trigger().await {
                    orchestrator.flush(trigger, &cancel).await;
                }
            }
        }
    }
    tracing::debug!("periodic flush loop stopped");
}

async fn stats_loop<C: SensorController>(
    orchestrator: Arc<BatchOrchestrator<C>>,
    stats: Arc<PipelineStats>,
    interval: Duration,
    cancel: CancellationToken,
) {
    if interval.is_zero() {
        return;
    }
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let rules = orchestrator.deployer().rule_stats().await;
                stats.report(orchestrator.parser().stats(), rules);
            }
        }
    }
}

/// 알림 파이프라인 빌더
///
/// 룰 디렉토리의 SID를 스캔해야 하므로 `build`는 비동기입니다.
pub struct AlertPipelineBuilder<C: SensorController> {
    config: PipelineConfig,
    analyzer: Option<Arc<dyn ThreatAnalyzer>>,
    controller: Option<Arc<C>>,
    parent_cancel: Option<CancellationToken>,
}

impl<C: SensorController> AlertPipelineBuilder<C> {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            analyzer: None,
            controller: None,
            parent_cancel: None,
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 분석기를 지정합니다. 보통 [`create_analyzer`](crate::analyzer::create_analyzer)의 결과입니다.
    pub fn analyzer(mut self, analyzer: Arc<dyn ThreatAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// 센서 검증/리로드 컨트롤러를 지정합니다.
    pub fn sensor_controller(mut self, controller: Arc<C>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// 상위 취소 토큰을 지정합니다. 파이프라인은 그 자식 토큰을 사용합니다.
    pub fn cancel_token(mut self, parent: CancellationToken) -> Self {
        self.parent_cancel = Some(parent);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// 룰 디렉토리가 존재하지만 읽을 수 없으면 실패합니다.
    pub async fn build(self) -> Result<AlertPipeline<C>, AlertPipelineError> {
        let config = self.config;
        config.validate()?;

        let analyzer = self.analyzer.ok_or_else(|| AlertPipelineError::Config {
            field: "analyzer".to_owned(),
            reason: "analyzer must be provided".to_owned(),
        })?;
        let controller = self.controller.ok_or_else(|| AlertPipelineError::Config {
            field: "sensor_controller".to_owned(),
            reason: "sensor controller must be provided".to_owned(),
        })?;

        let sids = SidAllocator::scan(
            config.rule_store_dir(),
            &config.rule_store_path,
            config.sid_start,
        )
        .await?;

        let stats = Arc::new(PipelineStats::new());
        let orchestrator = BatchOrchestrator::new(
            BatchWindow::new(config.max_alerts_per_batch, config.processing_interval),
            Arc::new(AlertParser::new()?),
            analyzer,
            RuleSynthesizer::new(sids, config.synthesis_policy())?,
            DeploymentManager::new(
                &config.rule_store_path,
                controller,
                config.message_prefix.clone(),
                config.backup_retention,
            )?,
            HistoryStore::new(
                &config.alert_history_path,
                &config.rule_history_path,
                config.retention_days,
            ),
            Arc::clone(&stats),
            config.confidence_threshold,
            config.max_concurrent_analyses,
        );

        let cancel = match self.parent_cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };

        Ok(AlertPipeline {
            tailer: Some(StreamTailer::new(&config.alert_log_path, config.max_read_bytes)),
            config,
            state: PipelineState::Initialized,
            orchestrator: Arc::new(orchestrator),
            stats,
            log_unreadable: Arc::new(AtomicBool::new(false)),
            cancel,
            tasks: Vec::new(),
        })
    }
}

impl<C: SensorController> Default for AlertPipelineBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::analyzer::LocalAnalyzer;
    use crate::config::PipelineConfigBuilder;
    use crate::rule::command::MockSensorController;

    fn config(dir: &Path) -> PipelineConfig {
        PipelineConfigBuilder::new()
            .alert_log_path(dir.join("alert_fast.txt"))
            .rule_store_path(dir.join("rules/local.rules"))
            .state_dir(dir.join("state"))
            .processing_interval(Duration::from_millis(20))
            .shutdown_timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    async fn pipeline(dir: &Path) -> AlertPipeline<MockSensorController> {
        AlertPipelineBuilder::new()
            .config(config(dir))
            .analyzer(Arc::new(LocalAnalyzer::new()))
            .sensor_controller(Arc::new(MockSensorController::new()))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn builder_requires_collaborators() {
        let dir = tempfile::tempdir().unwrap();
        let result = AlertPipelineBuilder::<MockSensorController>::new()
            .config(config(dir.path()))
            .analyzer(Arc::new(LocalAnalyzer::new()))
            .build()
            .await;
        let err = result.err().unwrap();
        assert!(err.to_string().contains("sensor_controller"));

        let result = AlertPipelineBuilder::new()
            .config(config(dir.path()))
            .sensor_controller(Arc::new(MockSensorController::new()))
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(dir.path()).await;

        assert_eq!(pipeline.state_name(), "initialized");
        assert!(pipeline.health_check().await.is_unhealthy());
        assert!(pipeline.stop().await.is_err());

        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state_name(), "running");
        assert!(pipeline.health_check().await.is_healthy());
        assert!(pipeline.start().await.is_err());

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state_name(), "stopped");
        assert!(pipeline.health_check().await.is_unhealthy());

        // 태일러가 소비되었으므로 재시작 불가
        assert!(pipeline.start().await.is_err());
    }

    #[tokio::test]
    async fn stop_writes_final_stats() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(dir.path()).await;
        pipeline.start().await.unwrap();
        pipeline.stop().await.unwrap();

        let path = dir.path().join("state/final_stats.json");
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["session_stats"]["alerts_processed"], 0);
        assert!(json["parser_stats"].is_object());
        assert!(json["rule_stats"].is_object());
    }

    #[tokio::test]
    async fn parent_cancellation_stops_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let parent = CancellationToken::new();
        let mut pipeline = AlertPipelineBuilder::new()
            .config(config(dir.path()))
            .analyzer(Arc::new(LocalAnalyzer::new()))
            .sensor_controller(Arc::new(MockSensorController::new()))
            .cancel_token(parent.clone())
            .build()
            .await
            .unwrap();
        pipeline.start().await.unwrap();

        parent.cancel();
        for task in &pipeline.tasks {
            while !task.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        pipeline.stop().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_rule_dir_fails_build() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules");
        std::fs::create_dir_all(&rules).unwrap();
        std::fs::set_permissions(&rules, std::fs::Permissions::from_mode(0o000)).unwrap();

        // root는 권한 검사를 우회하므로 디렉토리를 읽을 수 있으면 건너뜀
        if std::fs::read_dir(&rules).is_ok() {
            std::fs::set_permissions(&rules, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let result = AlertPipelineBuilder::new()
            .config(config(dir.path()))
            .analyzer(Arc::new(LocalAnalyzer::new()))
            .sensor_controller(Arc::new(MockSensorController::new()))
            .build()
            .await;
        std::fs::set_permissions(&rules, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(result, Err(AlertPipelineError::RuleStore { .. })));
    }
}
