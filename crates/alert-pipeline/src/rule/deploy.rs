//! 룰 배포 -- 검증, 백업, 스테이징, 센서 검증, 커밋 또는 롤백
//!
//! # 배포 절차
//! 1. 후보 룰을 하나씩 구조 검증합니다. 실패한 룰만 제외됩니다.
//! 2. 남은 룰이 없으면 `NothingToDeploy`.
//! 3. 기존 룰 저장소를 `<store>.backup.<timestamp>`로 복사하고 오래된 백업을 정리합니다.
//! 4. 기존 내용 + 섹션 헤더 + 새 룰을 `<store>.staging`에 쓴 뒤 원자적으로 교체합니다.
//! 5. 센서 검증 명령을 실행합니다.
//! 6. 성공하면 리로드 (실패 시 대체 명령 한 번). 검증 실패 시 배포 전 내용으로
//!    복원합니다.
//!
//! 룰 저장소와 백업 파일은 이 모듈만 기록하며, 내부 뮤텍스로 배포를 직렬화합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tokio::sync::Mutex;

use rulesmith_core::metrics as m;

use super::command::{ReloadMethod, SensorController};
use super::grammar::RuleGrammar;
use super::types::Rule;
use crate::error::AlertPipelineError;

/// 배포 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// 유효한 룰이 없어 아무것도 기록하지 않음
    NothingToDeploy {
        rejected: usize,
    },
    /// 기록, 검증, 리로드 모두 성공
    Deployed {
        deployed: Vec<u32>,
        rejected: usize,
        backup: Option<PathBuf>,
    },
    /// 기록과 검증은 성공했지만 리로드 확인 실패
    ReloadFailed {
        deployed: Vec<u32>,
        rejected: usize,
        diagnostic: String,
    },
    /// 검증 실패로 배포 전 상태로 복원됨
    RolledBack {
        rejected: usize,
        diagnostic: String,
    },
}

impl DeployOutcome {
    /// `Deployed`와 `NothingToDeploy`만 성공입니다.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Deployed { .. } | Self::NothingToDeploy { .. })
    }

    /// 룰 저장소에 남은 새 룰의 SID
    pub fn deployed_sids(&self) -> &[u32] {
        match self {
            Self::Deployed { deployed, .. } | Self::ReloadFailed { deployed, .. } => deployed,
            _ => &[],
        }
    }

    pub fn rejected(&self) -> usize {
        match self {
            Self::NothingToDeploy { rejected }
            | Self::Deployed { rejected, .. }
            | Self::ReloadFailed { rejected, .. }
            | Self::RolledBack { rejected, .. } => *rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NothingToDeploy { .. } => "nothing_to_deploy",
            Self::Deployed { .. } => "deployed",
            Self::ReloadFailed { .. } => "reload_failed",
            Self::RolledBack { .. } => "rolled_back",
        }
    }
}

/// 룰 저장소 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleStats {
    /// 주석/빈 줄을 제외한 룰 라인 수
    pub total_rules: usize,
    /// 접두어가 포함된 생성 룰 수
    pub generated_rules: usize,
}

/// 룰 배포 관리자
pub struct DeploymentManager<C: SensorController> {
    store_path: PathBuf,
    controller: Arc<C>,
    grammar: RuleGrammar,
    message_prefix: String,
    backup_retention: usize,
    lock: Mutex<()>,
}

impl<C: SensorController> DeploymentManager<C> {
    pub fn new(
        store_path: impl Into<PathBuf>,
        controller: Arc<C>,
        message_prefix: impl Into<String>,
        backup_retention: usize,
    ) -> Result<Self, AlertPipelineError> {
        Ok(Self {
            store_path: store_path.into(),
            controller,
            grammar: RuleGrammar::new()?,
            message_prefix: message_prefix.into(),
            backup_retention: backup_retention.max(1),
            lock: Mutex::new(()),
        })
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// 룰 목록을 배포합니다.
    ///
    /// 저장소 기록이나 복원 자체가 실패한 경우에만 에러를 반환합니다.
    /// 룰 거부, 검증 실패, 리로드 실패는 [`DeployOutcome`]으로 보고됩니다.
    pub async fn deploy(&self, rules: &[Rule]) -> Result<DeployOutcome, AlertPipelineError> {
        let _guard = self.lock.lock().await;

        let mut accepted = Vec::with_capacity(rules.len());
        let mut rejected = 0;
        for rule in rules {
            match self.validate_rule(rule) {
                Ok(()) => accepted.push(rule),
                Err(e) => {
                    rejected += 1;
                    metrics::counter!(m::RULES_REJECTED_TOTAL).increment(1);
                    tracing::warn!(sid = rule.sid, error = %e, rule = %rule.raw, "rejecting invalid rule");
                }
            }
        }

        if accepted.is_empty() {
            tracing::info!(rejected, "no valid rules to deploy");
            return Ok(self.finish(DeployOutcome::NothingToDeploy { rejected }));
        }

        let previous = match tokio::fs::read_to_string(&self.store_path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(self.store_error(&self.store_path, e)),
        };

        let backup = match previous {
            Some(_) => self.backup().await,
            None => None,
        };

        let mut staged = previous.clone().unwrap_or_default();
        staged.push_str(&format!(
            "\n# {} rules - {}\n",
            self.message_prefix,
            Local::now().to_rfc3339()
        ));
        for rule in &accepted {
            staged.push_str(&rule.raw);
            staged.push('\n');
        }
        staged.push('\n');
        self.replace_store(&staged).await?;

        let deployed: Vec<u32> = accepted.iter().map(|r| r.sid).collect();
        tracing::info!(
            count = deployed.len(),
            store = %self.store_path.display(),
            "rules staged into rule store, validating"
        );

        let validation = self.controller.validate().await;
        if !validation.success {
            tracing::error!(
                diagnostic = %validation.diagnostic,
                "sensor validation failed, rolling back rule store"
            );
            self.restore(previous.as_deref()).await?;
            metrics::counter!(m::DEPLOY_ROLLBACKS_TOTAL).increment(1);
            return Ok(self.finish(DeployOutcome::RolledBack {
                rejected,
                diagnostic: validation.diagnostic,
            }));
        }

        let primary = self.controller.reload(ReloadMethod::Primary).await;
        if primary.success {
            return Ok(self.finish(DeployOutcome::Deployed {
                deployed,
                rejected,
                backup,
            }));
        }

        tracing::warn!(
            diagnostic = %primary.diagnostic,
            "primary reload failed, trying fallback"
        );
        let fallback = self.controller.reload(ReloadMethod::Fallback).await;
        if fallback.success {
            return Ok(self.finish(DeployOutcome::Deployed {
                deployed,
                rejected,
                backup,
            }));
        }

        tracing::error!(
            primary = %primary.diagnostic,
            fallback = %fallback.diagnostic,
            "sensor reload failed, rules are stored but not confirmed live"
        );
        Ok(self.finish(DeployOutcome::ReloadFailed {
            deployed,
            rejected,
            diagnostic: fallback.diagnostic,
        }))
    }

    /// 룰 저장소의 룰 수를 셉니다. 파일이 없으면 0입니다.
    pub async fn rule_stats(&self) -> RuleStats {
        let content = match tokio::fs::read_to_string(&self.store_path).await {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        store = %self.store_path.display(),
                        error = %e,
                        "failed to read rule store for statistics"
                    );
                }
                return RuleStats::default();
            }
        };

        let rules = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        let mut stats = RuleStats::default();
        for line in rules {
            stats.total_rules += 1;
            if line.contains(&self.message_prefix) {
                stats.generated_rules += 1;
            }
        }
        stats
    }

    fn validate_rule(&self, rule: &Rule) -> Result<(), AlertPipelineError> {
        let invalid = |reason: String| AlertPipelineError::RuleValidation {
            sid: rule.sid,
            reason,
        };

        if rule.raw.contains(['\n', '\r']) {
            return Err(invalid("rule text spans multiple lines".to_owned()));
        }
        let parsed = self
            .grammar
            .validate(&rule.raw)
            .map_err(|e| invalid(e.to_string()))?;
        if parsed.options.get("sid") != Some(rule.sid.to_string().as_str()) {
            return Err(invalid("sid option does not match rule sid".to_owned()));
        }
        if parsed.header.action != rule.action() {
            return Err(invalid("action does not match rule header".to_owned()));
        }
        Ok(())
    }

    /// 현재 저장소를 백업합니다. 실패는 경고만 남깁니다.
    async fn backup(&self) -> Option<PathBuf> {
        let backup = self.sibling(&format!(
            ".backup.{}",
            Local::now().format("%Y%m%d_%H%M%S_%6f")
        ));
        if let Err(e) = tokio::fs::copy(&self.store_path, &backup).await {
            tracing::warn!(
                backup = %backup.display(),
                error = %e,
                "failed to back up rule store, continuing with in-memory snapshot"
            );
            return None;
        }
        tracing::debug!(backup = %backup.display(), "rule store backed up");
        self.prune_backups().await;
        Some(backup)
    }

    /// 최신 `backup_retention`개만 남기고 오래된 백업을 삭제합니다.
    async fn prune_backups(&self) {
        let dir = self.store_dir();
        let prefix = format!("{}.backup.", self.file_name());

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to list backups");
                return;
            }
        };

        let mut backups = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(_) => std::time::SystemTime::UNIX_EPOCH,
            };
            backups.push((modified, name, entry.path()));
        }

        // 최신순 (수정 시각이 같으면 이름의 타임스탬프 순)
        backups.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        for (_, _, path) in backups.into_iter().skip(self.backup_retention) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(backup = %path.display(), "removed old backup"),
                Err(e) => tracing::warn!(
                    backup = %path.display(),
                    error = %e,
                    "failed to remove old backup"
                ),
            }
        }
    }

    /// 스테이징 파일에 쓴 뒤 저장소를 원자적으로 교체합니다.
    async fn replace_store(&self, content: &str) -> Result<(), AlertPipelineError> {
        let dir = self.store_dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| self.store_error(dir, e))?;

        let staging = self.sibling(".staging");
        tokio::fs::write(&staging, content)
            .await
            .map_err(|e| self.store_error(&staging, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &self.store_path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(self.store_error(&self.store_path, e));
        }
        Ok(())
    }

    /// 배포 전 내용으로 되돌립니다. 원래 파일이 없었다면 삭제합니다.
    async fn restore(&self, previous: Option<&str>) -> Result<(), AlertPipelineError> {
        match previous {
            Some(content) => self.replace_store(content).await?,
            None => match tokio::fs::remove_file(&self.store_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(self.store_error(&self.store_path, e)),
            },
        }
        tracing::info!(store = %self.store_path.display(), "rule store restored");
        Ok(())
    }

    fn finish(&self, outcome: DeployOutcome) -> DeployOutcome {
        metrics::counter!(m::DEPLOY_ATTEMPTS_TOTAL, m::LABEL_RESULT => outcome.as_str())
            .increment(1);
        if let DeployOutcome::Deployed { deployed, .. } = &outcome {
            tracing::info!(count = deployed.len(), "rules deployed and sensor reloaded");
        }
        outcome
    }

    /// 저장소가 있는 디렉토리. 상대 경로 파일 이름만 주어지면 현재 디렉토리입니다.
    fn store_dir(&self) -> &Path {
        match self.store_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn file_name(&self) -> String {
        self.store_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.store_path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn store_error(&self, path: &Path, e: std::io::Error) -> AlertPipelineError {
        AlertPipelineError::RuleStore {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
    }
}
