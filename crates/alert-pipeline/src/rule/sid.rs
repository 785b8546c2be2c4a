//! SID 할당기
//!
//! 시작 시 룰 디렉토리의 `*.rules` 파일을 스캔해 사용 중인 가장 큰 SID를 찾고,
//! 그 다음 값부터 순서대로 발급합니다. 주석 라인(`#`)의 SID는 무시합니다.

use std::path::Path;

use regex::Regex;

use crate::error::AlertPipelineError;

const SID_PATTERN: &str = r"\bsid\s*:\s*(\d+)";

/// 단조 증가 SID 발급기
///
/// `allocate`는 `&mut self`를 요구하므로 단독으로는 스레드 안전하지 않습니다.
/// 호출자는 [`RuleSynthesizer`](super::synthesizer::RuleSynthesizer)의 뮤텍스로
/// 접근을 직렬화합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidAllocator {
    next: u32,
}

impl SidAllocator {
    /// 디스크 스캔 없이 `start`부터 발급합니다.
    pub fn starting_at(start: u32) -> Self {
        Self { next: start }
    }

    /// 룰 디렉토리와 룰 저장소 파일을 스캔하여 할당기를 만듭니다.
    ///
    /// - 디렉토리가 없으면 `start`부터 시작합니다.
    /// - 디렉토리가 있지만 읽을 수 없으면 에러를 반환합니다.
    /// - 개별 파일을 읽을 수 없으면 경고를 남기고 건너뜁니다.
    pub async fn scan(
        rules_dir: &Path,
        store_path: &Path,
        start: u32,
    ) -> Result<Self, AlertPipelineError> {
        let pattern = Regex::new(SID_PATTERN)?;
        let mut files = Vec::new();

        match tokio::fs::read_dir(rules_dir).await {
            Ok(mut entries) => {
                while let Some(entry) =
                    entries
                        .next_entry()
                        .await
                        .map_err(|e| AlertPipelineError::RuleStore {
                            path: rules_dir.display().to_string(),
                            reason: e.to_string(),
                        })?
                {
                    let path = entry.path();
                    if path.extension().is_some_and(|ext| ext == "rules") {
                        files.push(path);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    dir = %rules_dir.display(),
                    start,
                    "rule directory does not exist, starting sid allocation at configured start"
                );
                return Ok(Self::starting_at(start));
            }
            Err(e) => {
                return Err(AlertPipelineError::RuleStore {
                    path: rules_dir.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        if !files.iter().any(|p| p == store_path) {
            files.push(store_path.to_path_buf());
        }

        let mut max_seen: Option<u32> = None;
        for path in &files {
            let content = match tokio::fs::read_to_string(path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to read rule file for sid scan, skipping"
                    );
                    continue;
                }
            };
            if let Some(found) = max_sid_in(&pattern, &content) {
                max_seen = Some(max_seen.map_or(found, |m| m.max(found)));
            }
        }

        let next = match max_seen {
            Some(max) => start.max(max.saturating_add(1)),
            None => start,
        };
        tracing::info!(
            files = files.len(),
            max_existing_sid = ?max_seen,
            next_sid = next,
            "sid allocator initialized"
        );
        Ok(Self { next })
    }

    /// 다음 SID를 발급합니다.
    pub fn allocate(&mut self) -> u32 {
        let sid = self.next;
        self.next = self.next.saturating_add(1);
        sid
    }

    /// 다음에 발급될 SID
    pub fn peek(&self) -> u32 {
        self.next
    }
}

/// 룰 텍스트에서 주석이 아닌 라인의 최대 SID를 찾습니다.
fn max_sid_in(pattern: &Regex, content: &str) -> Option<u32> {
    content
        .lines()
        .map(str::trim_start)
        .filter(|line| !line.starts_with('#'))
        .flat_map(|line| pattern.captures_iter(line))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .max()
}
