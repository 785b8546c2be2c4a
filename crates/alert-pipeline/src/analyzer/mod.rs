//! 분석 백엔드
//!
//! [`create_analyzer`]가 설정의 `backend` 값으로 구현체를 한 번 선택하고,
//! [`ResilientAnalyzer`]로 감싸 재시도와 실패 시 기본 결과를 보장합니다.

pub mod local;
pub mod remote;
pub mod resilient;

use std::sync::Arc;
use std::time::Duration;

use rulesmith_core::analysis::ThreatAnalyzer;
use rulesmith_core::config::AnalysisConfig;

pub use local::LocalAnalyzer;
pub use remote::{RemoteAnalyzer, RemoteAnalyzerConfig};
pub use resilient::{ResilientAnalyzer, RetryPolicy};

use crate::error::AlertPipelineError;

/// 설정에 맞는 분석기를 만듭니다.
///
/// `suggestion_threshold`는 원격 백엔드 프롬프트에 안내하는 룰 제안 기준입니다.
pub fn create_analyzer(
    config: &AnalysisConfig,
    suggestion_threshold: f64,
) -> Result<Arc<dyn ThreatAnalyzer>, AlertPipelineError> {
    let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
    let backend: Arc<dyn ThreatAnalyzer> = match config.backend.as_str() {
        "local" => Arc::new(LocalAnalyzer::new()),
        "remote" => {
            if config.api_key.trim().is_empty() {
                return Err(AlertPipelineError::Config {
                    field: "analysis.api_key".to_owned(),
                    reason: "remote backend requires an API key".to_owned(),
                });
            }
            let remote = RemoteAnalyzer::new(RemoteAnalyzerConfig {
                endpoint: config.api_endpoint.clone(),
                api_key: config.api_key.clone(),
                model: config.model_name.clone(),
                timeout,
                suggestion_threshold,
            })
            .map_err(|e| AlertPipelineError::Config {
                field: "analysis".to_owned(),
                reason: e.to_string(),
            })?;
            Arc::new(remote)
        }
        other => {
            return Err(AlertPipelineError::Config {
                field: "analysis.backend".to_owned(),
                reason: format!("unsupported backend: {other}"),
            });
        }
    };

    tracing::info!(
        backend = backend.name(),
        max_retries = config.max_retries,
        "analysis backend selected"
    );

    let policy = RetryPolicy {
        max_attempts: config.max_retries,
        backoff_base: Duration::from_millis(config.retry_backoff_base_ms),
        // 요청 타임아웃에 약간의 여유를 더해 HTTP 클라이언트가 먼저 끊도록 함
        attempt_timeout: timeout + Duration::from_secs(1),
    };
    Ok(Arc::new(ResilientAnalyzer::new(backend, policy)))
}
