//! 탐지 룰 -- 합성, SID 할당, 배포
//!
//! - [`types`]: 룰 데이터 모델과 렌더링
//! - [`grammar`]: 룰 텍스트 파싱/검증
//! - [`sid`]: SID 할당기
//! - [`synthesizer`]: 분석 결과 → 룰
//! - [`command`]: 센서 검증/리로드 capability
//! - [`deploy`]: 백업, 스테이징, 검증, 커밋/롤백

pub mod command;
pub mod deploy;
pub mod grammar;
pub mod sid;
pub mod synthesizer;
pub mod types;

pub use command::{CommandOutcome, ProcessSensorController, ReloadMethod, SensorController};
pub use deploy::{DeployOutcome, DeploymentManager, RuleStats};
pub use grammar::{ParsedRule, RuleGrammar};
pub use sid::SidAllocator;
pub use synthesizer::{RuleSynthesizer, SynthesisPolicy};
pub use types::{Rule, RuleAction, RuleHeader, RuleOptions};
