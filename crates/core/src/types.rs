//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 알림 레코드, 특징 벡터, 분석 결과를 정의합니다.
//! 파이프라인의 모든 단계가 이 타입들로 데이터를 주고받습니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// 센서 알림 로그 한 줄에서 파싱된 알림 레코드
///
/// 파싱 이후에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// 알림 발생 시각 (로컬 시간, 연도는 현재 연도로 보정)
    pub timestamp: NaiveDateTime,
    /// 우선순위 (1이 가장 높음)
    pub priority: u32,
    /// 분류 텍스트
    pub classification: String,
    /// 알림 메시지
    pub message: String,
    /// 프로토콜 태그 (대문자)
    pub protocol: String,
    /// 출발지 주소
    pub src_ip: String,
    /// 출발지 포트 (`*`이면 `None`)
    pub src_port: Option<u16>,
    /// 목적지 주소
    pub dst_ip: String,
    /// 목적지 포트 (`*`이면 `None`)
    pub dst_port: Option<u16>,
    /// generator id
    pub gid: u32,
    /// signature id
    pub sid: u32,
    /// revision
    pub rev: u32,
    /// 원본 로그 라인
    pub raw: String,
}

impl AlertRecord {
    /// 알림 로그 형식으로 다시 렌더링합니다.
    pub fn render_line(&self) -> String {
        format!(
            "{}  [**] [{}:{}:{}] {} [**] [Classification: {}] [Priority: {}] {{{}}} {}:{} -> {}:{}",
            self.timestamp.format("%m/%d-%H:%M:%S%.6f"),
            self.gid,
            self.sid,
            self.rev,
            self.message,
            self.classification,
            self.priority,
            self.protocol,
            self.src_ip,
            render_port(self.src_port),
            self.dst_ip,
            render_port(self.dst_port),
        )
    }
}

fn render_port(port: Option<u16>) -> String {
    match port {
        Some(p) => p.to_string(),
        None => "*".to_owned(),
    }
}

impl fmt::Display for AlertRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}:{}] {} {} {}:{} -> {}:{}",
            self.gid,
            self.sid,
            self.rev,
            self.message,
            self.protocol,
            self.src_ip,
            render_port(self.src_port),
            self.dst_ip,
            render_port(self.dst_port),
        )
    }
}

/// 특징 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for FeatureValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u16> for FeatureValue {
    fn from(v: u16) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:.2}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

/// 알림 하나에서 유도된 특징 벡터
///
/// 키 순서가 고정되어 직렬화 결과가 결정적입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(BTreeMap<String, FeatureValue>);

impl FeatureVector {
    /// 빈 특징 벡터를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 특징을 추가합니다. 같은 키가 있으면 덮어씁니다.
    pub fn insert(&mut self, key: &str, value: impl Into<FeatureValue>) {
        self.0.insert(key.to_owned(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.0.get(key)
    }

    /// bool 특징을 조회합니다. 없거나 타입이 다르면 `false`입니다.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(FeatureValue::Bool(true)))
    }

    /// 수치 특징을 `f64`로 조회합니다.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            FeatureValue::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            FeatureValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// 텍스트 특징을 조회합니다.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            FeatureValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureValue)> {
        self.0.iter()
    }
}

/// 분석 결과가 권고하는 대응
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    /// 차단
    Block,
    /// 거부 (RST/ICMP unreachable)
    Reject,
    /// 관찰
    #[default]
    Monitor,
    /// 조사 필요
    Investigate,
    /// 무시
    Ignore,
}

impl RecommendedAction {
    /// 문자열에서 권고 대응을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않으며, 알 수 없는 값은 `Monitor`로 취급합니다.
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "block" | "drop" => Self::Block,
            "reject" => Self::Reject,
            "investigate" => Self::Investigate,
            "ignore" => Self::Ignore,
            _ => Self::Monitor,
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Reject => write!(f, "reject"),
            Self::Monitor => write!(f, "monitor"),
            Self::Investigate => write!(f, "investigate"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

/// 분석 실패 시 기본 결과의 신뢰도
pub const DEGRADED_CONFIDENCE: f64 = 0.5;

/// 분석 실패 시 기본 결과의 분류
pub const DEGRADED_CLASSIFICATION: &str = "analysis_error";

/// 위협 분석 결과
///
/// `rule_suggestion`은 외부에서 온 신뢰할 수 없는 텍스트입니다.
/// 룰로 사용하기 전에 반드시 파싱과 정제를 거쳐야 합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// 신뢰도 `[0.0, 1.0]`
    pub confidence: f64,
    /// 위협 분류
    pub threat_classification: String,
    /// 위협 설명
    pub threat_description: String,
    /// 권고 대응
    pub recommended_action: RecommendedAction,
    /// 추가 컨텍스트
    #[serde(default)]
    pub additional_context: serde_json::Map<String, serde_json::Value>,
    /// 제안된 룰 텍스트 (신뢰 불가)
    #[serde(default)]
    pub rule_suggestion: Option<String>,
    /// 분석 완료 시각
    pub analyzed_at: DateTime<Utc>,
    /// 분석 실패로 생성된 기본 결과 여부
    #[serde(default)]
    pub degraded: bool,
}

impl AnalysisResult {
    /// 새 분석 결과를 생성합니다. 신뢰도는 `[0.0, 1.0]`로 보정됩니다.
    pub fn new(
        confidence: f64,
        threat_classification: impl Into<String>,
        threat_description: impl Into<String>,
        recommended_action: RecommendedAction,
    ) -> Self {
        Self {
            confidence: clamp_confidence(confidence),
            threat_classification: threat_classification.into(),
            threat_description: threat_description.into(),
            recommended_action,
            additional_context: serde_json::Map::new(),
            rule_suggestion: None,
            analyzed_at: Utc::now(),
            degraded: false,
        }
    }

    /// 분석에 실패했을 때 사용하는 낮은 신뢰도의 기본 결과
    pub fn degraded(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut result = Self::new(
            DEGRADED_CONFIDENCE,
            DEGRADED_CLASSIFICATION,
            format!("failed to analyze alert: {reason}"),
            RecommendedAction::Investigate,
        );
        result
            .additional_context
            .insert("error".to_owned(), serde_json::Value::String(reason));
        result.degraded = true;
        result
    }

    /// 룰 제안을 덧붙입니다.
    pub fn with_rule_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.rule_suggestion = Some(suggestion.into());
        self
    }

    /// 추가 컨텍스트 항목을 덧붙입니다.
    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.additional_context.insert(key.to_owned(), value);
        self
    }

    /// 임계값 이상이고 기본 결과가 아닌지 여부
    pub fn is_actionable(&self, threshold: f64) -> bool {
        !self.degraded && self.confidence >= threshold
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} confidence={:.2} action={}",
            self.threat_classification, self.confidence, self.recommended_action,
        )
    }
}
