//! 배치 오케스트레이터
//!
//! 파싱된 알림을 [`BatchWindow`]에 모았다가 플러시 시점에 분석기로 보냅니다.
//!
//! # 플러시 순서
//! 1. 윈도우를 비워 배치를 확정합니다 (이후 들어온 알림은 다음 배치).
//! 2. 항목마다 태스크를 띄워 분석합니다. 동시 실행 수는 세마포어로
//!    `max_concurrent_analyses` 이하로 제한되고, 결과는 배치 순서와 같습니다.
//!    항목 하나의 실패나 패닉은 그 항목에만 [`DispatchError`]로 남습니다.
//! 3. 분석 히스토리를 기록하고, 임계값 이상인 결과로 룰을 합성합니다.
//! 4. 합성된 룰을 배포합니다. 배포는 별도 태스크에서 실행되므로 플러시
//!    태스크가 취소되거나 중단되어도 검증/롤백까지 끝납니다.
//!    [`BatchOrchestrator::wait_for_deploys`]로 완료를 기다릴 수 있습니다.
//!
//! 플러시는 게이트 뮤텍스로 직렬화되므로 폴링 트리거와 주기 트리거가
//! 겹쳐도 배치가 동시에 처리되지 않습니다.

use std::sync::Arc;
use std::time::Instant as StdInstant;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use rulesmith_core::analysis::ThreatAnalyzer;
use rulesmith_core::error::AnalysisError;
use rulesmith_core::metrics as m;
use rulesmith_core::types::{AlertRecord, AnalysisResult};

use crate::feature;
use crate::history::{AnalysisHistoryEntry, HistoryStore};
use crate::parser::AlertParser;
use crate::rule::{DeployOutcome, DeploymentManager, Rule, RuleSynthesizer, SensorController};
use crate::stats::PipelineStats;
use crate::window::{BatchWindow, FlushTrigger, PendingAlert};

/// 항목 단위 분석 실패
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// 분석기가 에러를 반환함
    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    /// 분석 태스크가 패닉하거나 중단됨
    #[error("analysis task aborted: {0}")]
    Aborted(String),

    /// 취소로 분석을 시작하지 않음
    #[error("dispatch cancelled before analysis started")]
    Cancelled,
}

/// 플러시 1회의 결과 요약
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    pub trigger: FlushTrigger,
    /// 분석 태스크로 보낸 항목 수
    pub dispatched: usize,
    /// 결과를 받은 항목 수 (기본 결과 포함)
    pub analyzed: usize,
    /// 실패/패닉한 항목 수
    pub failed: usize,
    /// 취소로 보내지 않은 항목 수
    pub abandoned: usize,
    pub high_confidence: usize,
    pub rules_synthesized: usize,
    /// 합성된 룰이 없으면 `None`
    pub deploy: Option<DeployOutcome>,
}

impl FlushReport {
    fn empty(trigger: FlushTrigger) -> Self {
        Self {
            trigger,
            dispatched: 0,
            analyzed: 0,
            failed: 0,
            abandoned: 0,
            high_confidence: 0,
            rules_synthesized: 0,
            deploy: None,
        }
    }
}

/// 배치 오케스트레이터
pub struct BatchOrchestrator<C: SensorController> {
    window: Mutex<BatchWindow>,
    flush_gate: Mutex<()>,
    parser: Arc<AlertParser>,
    analyzer: Arc<dyn ThreatAnalyzer>,
    synthesizer: Mutex<RuleSynthesizer>,
    deployer: Arc<DeploymentManager<C>>,
    /// 진행 중인 배포 태스크
    deploys: TaskTracker,
    history: HistoryStore,
    stats: Arc<PipelineStats>,
    confidence_threshold: f64,
    max_concurrent: usize,
}

impl<C: SensorController> BatchOrchestrator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        window: BatchWindow,
        parser: Arc<AlertParser>,
        analyzer: Arc<dyn ThreatAnalyzer>,
        synthesizer: RuleSynthesizer,
        deployer: DeploymentManager<C>,
        history: HistoryStore,
        stats: Arc<PipelineStats>,
        confidence_threshold: f64,
        max_concurrent: usize,
    ) -> Self {
        Self {
            window: Mutex::new(window),
            flush_gate: Mutex::new(()),
            parser,
            analyzer,
            synthesizer: Mutex::new(synthesizer),
            deployer: Arc::new(deployer),
            deploys: TaskTracker::new(),
            history,
            stats,
            confidence_threshold,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn parser(&self) -> &AlertParser {
        &self.parser
    }

    pub fn deployer(&self) -> &DeploymentManager<C> {
        &self.deployer
    }

    /// 진행 중인 배포가 모두 끝날 때까지 기다립니다.
    ///
    /// 플러시 태스크를 중단한 뒤에도 룰 저장소가 검증되었거나 복원된
    /// 상태임을 보장하기 위해 종료 시 호출합니다.
    pub async fn wait_for_deploys(&self) {
        self.deploys.close();
        self.deploys.wait().await;
        self.deploys.reopen();
    }

    /// 윈도우에 대기 중인 알림 수
    pub async fn pending(&self) -> usize {
        self.window.lock().await.len()
    }

    /// 새 라인을 파싱하여 윈도우에 넣고, 추가된 알림 수를 반환합니다.
    pub async fn ingest<S: AsRef<str>>(&self, lines: &[S]) -> usize {
        if lines.is_empty() {
            return 0;
        }
        let non_blank = lines
            .iter()
            .filter(|line| !line.as_ref().trim().is_empty())
            .count();
        let records = self.parser.parse_batch(lines);
        let failed = non_blank.saturating_sub(records.len());

        metrics::counter!(m::ALERTS_LINES_READ_TOTAL).increment(lines.len() as u64);
        metrics::counter!(m::ALERTS_PARSED_TOTAL).increment(records.len() as u64);
        if failed > 0 {
            metrics::counter!(m::ALERTS_PARSE_ERRORS_TOTAL).increment(failed as u64);
            tracing::debug!(failed, "unparsable alert lines dropped");
        }

        let added = records.len();
        let pending = {
            let mut window = self.window.lock().await;
            for record in records {
                let features = feature::extract(&record);
                window.push(PendingAlert { record, features });
            }
            window.len()
        };
        metrics::gauge!(m::ALERTS_PENDING).set(pending as f64);
        self.stats.add_alerts(added as u64);

        if added > 0 {
            tracing::debug!(added, pending, "alerts queued for analysis");
        }
        added
    }

    /// 폴링 직후 확인하는 트리거
    pub async fn poll_trigger(&self) -> Option<FlushTrigger> {
        self.window.lock().await.poll_trigger(Instant::now())
    }

    /// 주기 태스크가 확인하는 트리거
    pub async fn periodic_trigger(&self) -> Option<FlushTrigger> {
        self.window.lock().await.periodic_trigger(Instant::now())
    }

    /// 윈도우를 비우고 배치를 처리합니다.
    pub async fn flush(&self, trigger: FlushTrigger, cancel: &CancellationToken) -> FlushReport {
        let _gate = self.flush_gate.lock().await;
        let started = StdInstant::now();

        let items = self.window.lock().await.drain();
        metrics::gauge!(m::ALERTS_PENDING).set(0.0);
        if items.is_empty() {
            self.window.lock().await.mark_flushed(Instant::now());
            return FlushReport::empty(trigger);
        }

        tracing::info!(
            trigger = trigger.as_str(),
            count = items.len(),
            "flushing alert batch"
        );
        let mut report = FlushReport::empty(trigger);

        let outcomes = self.dispatch(&items, cancel).await;

        let mut history = Vec::with_capacity(items.len());
        let mut actionable = Vec::new();
        for (item, outcome) in items.into_iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    report.analyzed += 1;
                    tracing::debug!(
                        alert_sid = item.record.sid,
                        src = %item.record.src_ip,
                        dst = %item.record.dst_ip,
                        confidence = result.confidence,
                        classification = %result.threat_classification,
                        degraded = result.degraded,
                        "analysis result"
                    );
                    if result.is_actionable(self.confidence_threshold) {
                        actionable.push((item.record.clone(), result.clone()));
                    }
                    history.push(AnalysisHistoryEntry {
                        timestamp: result.analyzed_at,
                        record: item.record,
                        features: item.features,
                        result,
                    });
                }
                Err(DispatchError::Cancelled) => report.abandoned += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        alert_sid = item.record.sid,
                        error = %e,
                        "alert analysis failed"
                    );
                }
            }
        }
        report.dispatched = report.analyzed + report.failed;
        report.high_confidence = actionable.len();

        self.stats.add_analyses(report.analyzed as u64);
        self.stats.add_analysis_failures(report.failed as u64);
        self.stats.add_high_confidence(report.high_confidence as u64);
        metrics::counter!(m::ANALYSIS_HIGH_CONFIDENCE_TOTAL)
            .increment(report.high_confidence as u64);
        if report.abandoned > 0 {
            tracing::warn!(
                abandoned = report.abandoned,
                "cancellation requested, remaining alerts were not analyzed"
            );
        }

        if let Err(e) = self.history.append_analyses(history).await {
            tracing::warn!(error = %e, "failed to write analysis history");
        }

        let rules = self.synthesize(&actionable).await;
        report.rules_synthesized = rules.len();
        self.stats.add_rules_generated(rules.len() as u64);

        if !rules.is_empty() {
            report.deploy = self.deploy(&rules).await;
        }

        self.window.lock().await.mark_flushed(Instant::now());
        self.stats.record_batch();
        metrics::histogram!(m::BATCH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        tracing::info!(
            trigger = trigger.as_str(),
            analyzed = report.analyzed,
            failed = report.failed,
            high_confidence = report.high_confidence,
            rules = report.rules_synthesized,
            deploy = report.deploy.as_ref().map_or("none", DeployOutcome::as_str),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "alert batch processed"
        );
        report
    }

    /// 항목마다 분석 태스크를 띄우고 배치 순서대로 결과를 모읍니다.
    async fn dispatch(
        &self,
        items: &[PendingAlert],
        cancel: &CancellationToken,
    ) -> Vec<Result<AnalysisResult, DispatchError>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles: Vec<Option<JoinHandle<Result<AnalysisResult, AnalysisError>>>> =
            Vec::with_capacity(items.len());

        for item in items {
            if cancel.is_cancelled() {
                handles.push(None);
                continue;
            }
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                handles.push(None);
                continue;
            };

            let analyzer = Arc::clone(&self.analyzer);
            let record = item.record.clone();
            let features = item.features.clone();
            handles.push(Some(tokio::spawn(async move {
                let _permit = permit;
                analyzer.analyze(&record, &features).await
            })));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            let outcome = match handle {
                None => Err(DispatchError::Cancelled),
                Some(handle) => match handle.await {
                    Ok(Ok(result)) => Ok(result),
                    Ok(Err(e)) => Err(DispatchError::Analysis(e)),
                    Err(e) => Err(DispatchError::Aborted(e.to_string())),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn synthesize(
        &self,
        actionable: &[(AlertRecord, AnalysisResult)],
    ) -> Vec<Rule> {
        if actionable.is_empty() {
            return Vec::new();
        }
        let mut synthesizer = self.synthesizer.lock().await;
        actionable
            .iter()
            .filter_map(|(record, result)| synthesizer.synthesize(record, result))
            .collect()
    }

    async fn deploy(&self, rules: &[Rule]) -> Option<DeployOutcome> {
        // 호출 태스크가 중단되어도 스테이징된 저장소가 검증/롤백 없이 남지 않도록
        // 배포 자체는 추적되는 별도 태스크에서 끝까지 실행
        let deployer = Arc::clone(&self.deployer);
        let batch = rules.to_vec();
        let task = self
            .deploys
            .spawn(async move { deployer.deploy(&batch).await });

        let outcome = match task.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                self.stats.record_deploy_failure();
                tracing::error!(error = %e, rules = rules.len(), "rule deployment failed");
                return None;
            }
            Err(e) => {
                self.stats.record_deploy_failure();
                tracing::error!(error = %e, rules = rules.len(), "rule deployment task aborted");
                return None;
            }
        };

        match &outcome {
            DeployOutcome::Deployed { deployed, .. } => {
                self.stats.add_rules_deployed(deployed.len() as u64);
            }
            DeployOutcome::ReloadFailed {
                deployed,
                diagnostic,
                ..
            } => {
                self.stats.add_rules_deployed(deployed.len() as u64);
                self.stats.record_deploy_failure();
                tracing::warn!(
                    rules = deployed.len(),
                    diagnostic = %diagnostic,
                    "rules stored but sensor reload could not be confirmed"
                );
            }
            DeployOutcome::RolledBack { .. } => {
                self.stats.record_rollback();
                self.stats.record_deploy_failure();
            }
            DeployOutcome::NothingToDeploy { .. } => {}
        }

        // 저장소에 남은 룰만 히스토리에 기록
        let stored = outcome.deployed_sids();
        if !stored.is_empty() {
            let committed: Vec<Rule> = rules
                .iter()
                .filter(|rule| stored.contains(&rule.sid))
                .cloned()
                .collect();
            if let Err(e) = self.history.append_rules(&committed).await {
                tracing::warn!(error = %e, "failed to write rule history");
            }
        }
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use rulesmith_core::pipeline::BoxFuture;
    use rulesmith_core::types::{FeatureVector, RecommendedAction};

    use crate::rule::command::MockSensorController;
    use crate::rule::{SidAllocator, SynthesisPolicy};

    const LINE: &str = "10/26-11:09:09.414867  [**] [1:1000001:1] SSH Connection Attempt [**] \
        [Classification: Attempted Administrator Privilege Gain] [Priority: 1] \
        {TCP} 192.168.1.100:22 -> 192.168.1.200:54321";

    /// 고정 신뢰도를 반환하고 동시 실행 수를 기록하는 분석기
    struct FixedAnalyzer {
        confidence: f64,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FixedAnalyzer {
        fn new(confidence: f64) -> Self {
            Self {
                confidence,
                delay: Duration::from_millis(20),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    impl ThreatAnalyzer for FixedAnalyzer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn analyze<'a>(
            &'a self,
            record: &'a AlertRecord,
            _features: &'a FeatureVector,
        ) -> BoxFuture<'a, Result<AnalysisResult, AnalysisError>> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);

                if record.message.contains("explode") {
                    panic!("analyzer bug");
                }
                if record.message.contains("fail") {
                    return Err(AnalysisError::Rejected("bad request".to_owned()));
                }
                Ok(AnalysisResult::new(
                    self.confidence,
                    "attempted-admin",
                    format!("analysis of {}", record.message),
                    RecommendedAction::Block,
                ))
            })
        }
    }

    fn line_with(message: &str, sid: u32) -> String {
        format!(
            "10/26-11:09:09.414867  [**] [1:{sid}:1] {message} [**] \
             [Classification: Misc activity] [Priority: 2] {{TCP}} 10.0.0.1:4444 -> 10.0.0.2:80"
        )
    }

    async fn orchestrator(
        dir: &Path,
        analyzer: Arc<dyn ThreatAnalyzer>,
        controller: MockSensorController,
        max_alerts: usize,
        max_concurrent: usize,
    ) -> BatchOrchestrator<MockSensorController> {
        let store = dir.join("rules/local.rules");
        let sids = SidAllocator::scan(&dir.join("rules"), &store, 2_000_000)
            .await
            .unwrap();
        BatchOrchestrator::new(
            BatchWindow::new(max_alerts, Duration::from_secs(5)),
            Arc::new(AlertParser::new().unwrap()),
            analyzer,
            RuleSynthesizer::new(sids, SynthesisPolicy::default()).unwrap(),
            DeploymentManager::new(&store, Arc::new(controller), "ML_GENERATED", 3).unwrap(),
            HistoryStore::new(dir.join("alerts.json"), dir.join("rules.json"), 30),
            Arc::new(PipelineStats::new()),
            0.98,
            max_concurrent,
        )
    }

    #[tokio::test]
    async fn ingest_parses_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FixedAnalyzer::new(0.1)),
            MockSensorController::new(),
            10,
            2,
        )
        .await;

        let added = orch.ingest(&[LINE, "", "garbage line"]).await;
        assert_eq!(added, 1);
        assert_eq!(orch.pending().await, 1);
        assert_eq!(orch.parser().stats().error_count, 1);
        assert_eq!(orch.stats.snapshot().alerts_processed, 1);
    }

    #[tokio::test]
    async fn size_trigger_fires_at_batch_limit() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FixedAnalyzer::new(0.1)),
            MockSensorController::new(),
            2,
            2,
        )
        .await;

        orch.ingest(&[LINE]).await;
        assert_eq!(orch.poll_trigger().await, None);
        orch.ingest(&[LINE]).await;
        assert_eq!(orch.poll_trigger().await, Some(FlushTrigger::Size));
    }

    #[tokio::test]
    async fn high_confidence_batch_deploys_rules() {
        let dir = tempfile::tempdir().unwrap();
        let controller = MockSensorController::new();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FixedAnalyzer::new(0.99)),
            controller,
            10,
            2,
        )
        .await;

        orch.ingest(&[LINE, LINE]).await;
        let report = orch
            .flush(FlushTrigger::Size, &CancellationToken::new())
            .await;

        assert_eq!(report.analyzed, 2);
        assert_eq!(report.high_confidence, 2);
        assert_eq!(report.rules_synthesized, 2);
        let deploy = report.deploy.unwrap();
        assert_eq!(deploy.deployed_sids(), &[2_000_000, 2_000_001]);
        assert_eq!(orch.pending().await, 0);

        let store = std::fs::read_to_string(orch.deployer().store_path()).unwrap();
        assert!(store.contains("drop tcp 192.168.1.100 22 -> 192.168.1.200 54321"));
        assert!(dir.path().join("rules.json").exists());
        assert!(dir.path().join("alerts.json").exists());

        let s = orch.stats.snapshot();
        assert_eq!(s.rules_deployed, 2);
        assert_eq!(s.batches, 1);
    }

    #[tokio::test]
    async fn low_confidence_batch_only_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FixedAnalyzer::new(0.4)),
            MockSensorController::new(),
            10,
            2,
        )
        .await;

        orch.ingest(&[LINE]).await;
        let report = orch
            .flush(FlushTrigger::Periodic, &CancellationToken::new())
            .await;
        assert_eq!(report.analyzed, 1);
        assert_eq!(report.rules_synthesized, 0);
        assert!(report.deploy.is_none());
        assert!(!orch.deployer().store_path().exists());
        assert!(dir.path().join("alerts.json").exists());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = Arc::new(FixedAnalyzer::new(0.1));
        let orch = orchestrator(
            dir.path(),
            analyzer.clone(),
            MockSensorController::new(),
            100,
            3,
        )
        .await;

        let lines: Vec<String> = (0..12).map(|i| line_with("probe", 100 + i)).collect();
        orch.ingest(&lines).await;
        let report = orch
            .flush(FlushTrigger::Size, &CancellationToken::new())
            .await;

        assert_eq!(report.analyzed, 12);
        assert!(analyzer.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert!(analyzer.max_in_flight.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FixedAnalyzer::new(0.1)),
            MockSensorController::new(),
            100,
            2,
        )
        .await;

        let items: Vec<PendingAlert> = ["probe", "fail", "explode", "probe"]
            .iter()
            .enumerate()
            .map(|(i, msg)| {
                let record = orch
                    .parser()
                    .parse(&line_with(msg, 500 + i as u32))
                    .unwrap();
                let features = feature::extract(&record);
                PendingAlert { record, features }
            })
            .collect();

        let outcomes = orch.dispatch(&items, &CancellationToken::new()).await;
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1], Err(DispatchError::Analysis(_))));
        assert!(matches!(outcomes[2], Err(DispatchError::Aborted(_))));
        let last = outcomes[3].as_ref().unwrap();
        assert!(last.threat_description.contains("probe"));
    }

    #[tokio::test]
    async fn cancelled_flush_abandons_dispatches() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FixedAnalyzer::new(0.99)),
            MockSensorController::new(),
            10,
            1,
        )
        .await;

        orch.ingest(&[LINE, LINE, LINE]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = orch.flush(FlushTrigger::Size, &cancel).await;
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.abandoned, 3);
        assert!(report.deploy.is_none());
    }

    #[tokio::test]
    async fn rollback_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FixedAnalyzer::new(0.99)),
            MockSensorController::new().with_failing_validation(),
            10,
            2,
        )
        .await;

        orch.ingest(&[LINE]).await;
        let report = orch
            .flush(FlushTrigger::Size, &CancellationToken::new())
            .await;
        assert!(matches!(
            report.deploy,
            Some(DeployOutcome::RolledBack { .. })
        ));
        let s = orch.stats.snapshot();
        assert_eq!(s.rollbacks, 1);
        assert_eq!(s.rules_deployed, 0);
        assert!(!orch.deployer().store_path().exists());
        assert!(!dir.path().join("rules.json").exists());
    }

    #[tokio::test]
    async fn empty_flush_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            dir.path(),
            Arc::new(FixedAnalyzer::new(0.99)),
            MockSensorController::new(),
            10,
            2,
        )
        .await;
        let report = orch
            .flush(FlushTrigger::Periodic, &CancellationToken::new())
            .await;
        assert_eq!(report, FlushReport::empty(FlushTrigger::Periodic));
        assert_eq!(orch.stats.snapshot().batches, 0);
    }
}
