//! 분석/룰 히스토리 저장
//!
//! 두 히스토리 파일은 모두 JSON 배열이며, 기록할 때마다 보관 기간이 지난
//! 항목을 잘라낸 뒤 임시 파일 + rename으로 원자적으로 교체합니다.
//! 손상된 파일은 옆으로 옮겨 두고 빈 히스토리로 다시 시작하며, 읽기 실패 시에는
//! 기존 파일을 덮어쓰지 않고 에러를 반환합니다.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use rulesmith_core::types::{AlertRecord, AnalysisResult, FeatureVector};

use crate::error::AlertPipelineError;
use crate::rule::Rule;

/// 분석 히스토리 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub record: AlertRecord,
    pub features: FeatureVector,
    pub result: AnalysisResult,
}

/// 히스토리 저장소
pub struct HistoryStore {
    alert_path: PathBuf,
    rule_path: PathBuf,
    retention: Duration,
    lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(
        alert_path: impl Into<PathBuf>,
        rule_path: impl Into<PathBuf>,
        retention_days: u32,
    ) -> Self {
        Self {
            alert_path: alert_path.into(),
            rule_path: rule_path.into(),
            retention: Duration::days(i64::from(retention_days)),
            lock: Mutex::new(()),
        }
    }

    /// 분석 결과를 히스토리에 추가합니다.
    pub async fn append_analyses(
        &self,
        entries: Vec<AnalysisHistoryEntry>,
    ) -> Result<(), AlertPipelineError> {
        if entries.is_empty() {
            return Ok(());
        }
        let cutoff = Utc::now() - self.retention;
        let _guard = self.lock.lock().await;
        append(&self.alert_path, entries, |entry: &AnalysisHistoryEntry| {
            entry.timestamp > cutoff
        })
        .await
    }

    /// 배포된 룰을 히스토리에 추가합니다.
    pub async fn append_rules(&self, rules: &[Rule]) -> Result<(), AlertPipelineError> {
        if rules.is_empty() {
            return Ok(());
        }
        let cutoff = Utc::now() - self.retention;
        let _guard = self.lock.lock().await;
        append(&self.rule_path, rules.to_vec(), |rule: &Rule| {
            rule.created_at > cutoff
        })
        .await
    }

    pub fn alert_path(&self) -> &Path {
        &self.alert_path
    }

    pub fn rule_path(&self) -> &Path {
        &self.rule_path
    }
}

async fn append<T, F>(path: &Path, new: Vec<T>, keep: F) -> Result<(), AlertPipelineError>
where
    T: Serialize + DeserializeOwned,
    F: Fn(&T) -> bool,
{
    let mut entries: Vec<T> = load(path).await?;
    entries.extend(new);
    let before = entries.len();
    entries.retain(|entry| keep(entry));
    if entries.len() < before {
        tracing::debug!(
            path = %path.display(),
            removed = before - entries.len(),
            "expired history entries trimmed"
        );
    }
    write_json_atomic(path, &entries).await
}

/// 히스토리 파일을 읽습니다.
///
/// 읽기 실패는 에러로 반환되어 호출자가 이번 기록을 건너뜁니다.
/// 파싱할 수 없는 파일은 `<path>.corrupt.<timestamp>`로 옮긴 뒤 빈 히스토리로 시작합니다.
async fn load<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AlertPipelineError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AlertPipelineError::Storage {
                path: path.display().to_string(),
                reason: format!("failed to read history: {e}"),
            });
        }
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str(&content) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            let mut aside = path.to_path_buf().into_os_string();
            aside.push(format!(".corrupt.{}", Utc::now().format("%Y%m%d_%H%M%S_%6f")));
            let aside = PathBuf::from(aside);
            tokio::fs::rename(path, &aside)
                .await
                .map_err(|re| AlertPipelineError::Storage {
                    path: path.display().to_string(),
                    reason: format!("history is corrupt ({e}) and could not be moved aside: {re}"),
                })?;
            tracing::warn!(
                path = %path.display(),
                moved_to = %aside.display(),
                error = %e,
                "history file is corrupt, moved aside and starting fresh"
            );
            Ok(Vec::new())
        }
    }
}

/// 값을 JSON으로 직렬화하여 임시 파일에 쓴 뒤 rename으로 교체합니다.
pub async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), AlertPipelineError> {
    let storage_error = |p: &Path, reason: String| AlertPipelineError::Storage {
        path: p.display().to_string(),
        reason,
    };

    let json = serde_json::to_vec_pretty(value)?;
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| storage_error(dir, e.to_string()))?;
        }
    }

    let mut tmp = path.to_path_buf().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| storage_error(&tmp, e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| storage_error(path, e.to_string()))
}
