#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`tailer`]: 추가 전용 알림 로그 폴링 (로테이션/truncation 감지)
//! - [`parser`]: fast-alert 라인 문법 파서
//! - [`feature`]: 알림 → 특징 벡터
//! - [`window`]: 배치 윈도우와 플러시 트리거
//! - [`orchestrator`]: 동시성 제한 분석 디스패치, 합성, 배포 흐름
//! - [`analyzer`]: 원격/로컬 분석 백엔드와 재시도 래퍼
//! - [`rule`]: 룰 문법, SID 할당, 합성, 배포
//! - [`history`]: 분석/룰 히스토리 저장
//! - [`stats`]: 세션 통계
//! - [`pipeline`]: 생명주기 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! StreamTailer -> AlertParser -> feature::extract -> BatchWindow
//!                                                       |
//!          DeploymentManager <- RuleSynthesizer <- ThreatAnalyzer (x K)
//!                 |
//!        validate / reload (SensorController)
//! ```

pub mod config;
pub mod error;
pub mod feature;
pub mod history;
pub mod orchestrator;
pub mod pipeline;
pub mod stats;
pub mod tailer;
pub mod window;

pub mod analyzer;
pub mod parser;
pub mod rule;

// --- 주요 타입 re-export ---

// 파이프라인
pub use orchestrator::{BatchOrchestrator, DispatchError, FlushReport};
pub use pipeline::{AlertPipeline, AlertPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::AlertPipelineError;

// 수집/파싱
pub use parser::{AlertParser, ParserStats};
pub use tailer::{StreamCursor, StreamTailer};
pub use window::{BatchWindow, FlushTrigger, PendingAlert};

// 분석
pub use analyzer::{LocalAnalyzer, RemoteAnalyzer, ResilientAnalyzer, RetryPolicy, create_analyzer};

// 룰
pub use rule::{
    DeployOutcome, DeploymentManager, ProcessSensorController, Rule, RuleGrammar, RuleStats,
    RuleSynthesizer, SensorController, SidAllocator, SynthesisPolicy,
};

// 히스토리/통계
pub use history::{AnalysisHistoryEntry, HistoryStore};
pub use stats::{FinalStats, PipelineStats, SessionStats};
