//! 로컬 휴리스틱 분석기
//!
//! 외부 호출 없이 특징 벡터만으로 결정적인 평가를 만듭니다.
//! 원격 백엔드를 쓸 수 없는 환경이나 테스트에서 사용합니다.

use rulesmith_core::analysis::ThreatAnalyzer;
use rulesmith_core::error::AnalysisError;
use rulesmith_core::pipeline::BoxFuture;
use rulesmith_core::types::{AlertRecord, AnalysisResult, FeatureVector, RecommendedAction};

/// 휴리스틱 결과의 위협 분류
pub const HEURISTIC_CLASSIFICATION: &str = "heuristic";

/// 위험 지표가 있을 때 더하는 신뢰도
const INDICATOR_BOOST: f64 = 0.3;

/// 심각도 점수가 없을 때의 기본 신뢰도
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// 특징 기반 휴리스틱 분석기
#[derive(Debug, Clone, Default)]
pub struct LocalAnalyzer;

impl LocalAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// 특징 벡터에서 평가를 계산합니다.
    pub fn assess(&self, record: &AlertRecord, features: &FeatureVector) -> AnalysisResult {
        let mut confidence = features
            .number("severity_score")
            .unwrap_or(DEFAULT_CONFIDENCE);
        if features.flag("suspicious_port") || features.flag("known_attack_pattern") {
            confidence = (confidence + INDICATOR_BOOST).min(1.0);
        }

        AnalysisResult::new(
            confidence,
            HEURISTIC_CLASSIFICATION,
            format!("Heuristic assessment of alert: {}", record.message),
            RecommendedAction::Monitor,
        )
        .with_context("heuristic", serde_json::Value::Bool(true))
        .with_context("features_count", serde_json::Value::from(features.len()))
    }
}

impl ThreatAnalyzer for LocalAnalyzer {
    fn name(&self) -> &str {
        "local"
    }

    fn analyze<'a>(
        &'a self,
        record: &'a AlertRecord,
        features: &'a FeatureVector,
    ) -> BoxFuture<'a, Result<AnalysisResult, AnalysisError>> {
        Box::pin(async move { Ok(self.assess(record, features)) })
    }
}
