//! 에러 타입: 도메인별 에러 정의

/// rulesmith 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RulesmithError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 위협 분석 에러
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// 스토리지 에러 (룰 저장소, 히스토리, 통계 파일)
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 백그라운드 태스크 실패
    #[error("task failed: {0}")]
    Task(String),
}

/// 위협 분석 에러
///
/// [`is_transient`](AnalysisError::is_transient)가 `true`인 에러만 재시도 대상입니다.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// 분석 백엔드와의 통신 실패 (네트워크, 타임아웃, 5xx)
    #[error("analysis backend unavailable: {0}")]
    Unavailable(String),

    /// 요청 한도 초과 (HTTP 429)
    #[error("analysis backend rate limited: {0}")]
    RateLimited(String),

    /// 백엔드 응답을 해석할 수 없음
    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),

    /// 요청 자체가 거부됨 (인증 실패, 4xx)
    #[error("analysis request rejected: {0}")]
    Rejected(String),
}

impl AnalysisError {
    /// 재시도로 회복될 수 있는 에러인지 여부
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 룰 저장소 디렉토리 접근 실패
    #[error("rule store unavailable: {path}: {reason}")]
    RuleStore { path: String, reason: String },

    /// 직렬화/역직렬화 실패
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// 파일 쓰기 실패
    #[error("write failed: {path}: {reason}")]
    Write { path: String, reason: String },
}
