//! 알림 파이프라인 에러 타입
//!
//! [`AlertPipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<AlertPipelineError> for RulesmithError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use rulesmith_core::error::{PipelineError, RulesmithError, StorageError};

/// 알림 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AlertPipelineError {
    /// 알림 라인 파싱 실패
    #[error("parse error: {reason}: {line}")]
    Parse {
        /// 실패 사유
        reason: String,
        /// 문제가 된 라인 (잘림)
        line: String,
    },

    /// 룰 텍스트가 룰 문법과 맞지 않음
    #[error("rule grammar error: {0}")]
    RuleGrammar(String),

    /// 룰 구조 검증 실패
    #[error("rule validation error: sid {sid}: {reason}")]
    RuleValidation {
        /// 문제가 된 룰 SID
        sid: u32,
        /// 검증 실패 사유
        reason: String,
    },

    /// 룰 저장소 디렉토리 접근 실패
    #[error("rule store error: {path}: {reason}")]
    RuleStore {
        /// 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 외부 명령 실행 실패
    #[error("command error: {command}: {reason}")]
    Command {
        /// 실행한 명령
        command: String,
        /// 에러 사유
        reason: String,
    },

    /// 히스토리/통계 저장 실패
    #[error("storage error: {path}: {reason}")]
    Storage {
        /// 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AlertPipelineError> for RulesmithError {
    fn from(err: AlertPipelineError) -> Self {
        match err {
            AlertPipelineError::RuleStore { path, reason } => {
                RulesmithError::Storage(StorageError::RuleStore { path, reason })
            }
            AlertPipelineError::Storage { path, reason } => {
                RulesmithError::Storage(StorageError::Write { path, reason })
            }
            AlertPipelineError::Io(e) => RulesmithError::Io(e),
            other => RulesmithError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
