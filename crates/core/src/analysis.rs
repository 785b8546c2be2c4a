//! 위협 분석 capability: 외부 분석 백엔드의 확장 포인트
//!
//! 원격 API, 로컬 휴리스틱 등 분석 백엔드는 모두 [`ThreatAnalyzer`]를 구현합니다.
//! 파이프라인은 `Arc<dyn ThreatAnalyzer>`만 알고 있으며, 구체 타입은
//! 시작 시점에 팩토리가 한 번 선택합니다.

use crate::error::AnalysisError;
use crate::pipeline::BoxFuture;
use crate::types::{AlertRecord, AnalysisResult, FeatureVector};

/// 알림 하나를 분석하여 위협 평가를 반환하는 trait
///
/// 구현체는 여러 태스크에서 동시에 호출될 수 있으므로 `Send + Sync`여야 합니다.
pub trait ThreatAnalyzer: Send + Sync {
    /// 분석기 이름 (로그/통계용)
    fn name(&self) -> &str;

    /// 알림과 특징 벡터를 분석합니다.
    fn analyze<'a>(
        &'a self,
        record: &'a AlertRecord,
        features: &'a FeatureVector,
    ) -> BoxFuture<'a, Result<AnalysisResult, AnalysisError>>;
}
