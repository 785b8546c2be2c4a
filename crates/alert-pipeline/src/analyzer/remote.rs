//! 원격 분석기 -- OpenAI 호환 chat completions API
//!
//! 알림과 특징을 프롬프트로 만들어 전송하고, 모델이 JSON 객체로 돌려준
//! 평가를 [`AnalysisResult`]로 변환합니다.
//!
//! # 에러 분류
//! - HTTP 429 → `RateLimited` (재시도)
//! - HTTP 5xx, 연결/타임아웃 → `Unavailable` (재시도)
//! - 그 외 HTTP 4xx → `Rejected` (재시도하지 않음)
//! - 응답 본문이 기대한 JSON이 아님 → `MalformedResponse` (재시도)

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use rulesmith_core::analysis::ThreatAnalyzer;
use rulesmith_core::error::AnalysisError;
use rulesmith_core::pipeline::BoxFuture;
use rulesmith_core::types::{AlertRecord, AnalysisResult, FeatureVector, RecommendedAction};

const SYSTEM_PROMPT: &str = r#"You are a cybersecurity expert specializing in network intrusion detection and threat analysis.
Your task is to analyze IDS/IPS alerts and provide a detailed threat assessment.

For each alert, provide:
1. Confidence score (0.0 to 1.0) - how confident you are this represents a real threat
2. Threat classification (e.g., malware, reconnaissance, exploit, false_positive)
3. Detailed threat description
4. Recommended action (block, reject, monitor, investigate, ignore)
5. Additional context about the threat
6. If confidence is very high, a single-line detection rule for similar threats

Consider source/destination addresses (internal vs external), ports and protocols,
the alert classification and message, time patterns, known attack signatures and
the likelihood of a false positive.

Respond with a JSON object only:
{
    "confidence": 0.95,
    "threat_classification": "malware",
    "threat_description": "Detailed description of the threat",
    "recommended_action": "block",
    "additional_context": {"key": "value"},
    "rule_suggestion": "alert tcp any any -> any any (msg:\"...\"; sid:1;)"
}"#;

const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u32 = 1000;

/// 원격 분석기 설정
#[derive(Debug, Clone)]
pub struct RemoteAnalyzerConfig {
    /// API base URL (`/chat/completions`가 뒤에 붙음)
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// 요청 타임아웃
    pub timeout: Duration,
    /// 룰 제안을 요청할 신뢰도 기준 (프롬프트 안내용)
    pub suggestion_threshold: f64,
}

/// OpenAI 호환 원격 분석기
pub struct RemoteAnalyzer {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    suggestion_threshold: f64,
}

impl RemoteAnalyzer {
    pub fn new(config: RemoteAnalyzerConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalysisError::Unavailable(format!("failed to build http client: {e}")))?;
        let url = format!("{}/chat/completions", config.endpoint.trim_end_matches('/'));
        Ok(Self {
            client,
            url,
            api_key: config.api_key,
            model: config.model,
            suggestion_threshold: config.suggestion_threshold,
        })
    }

    async fn request(
        &self,
        record: &AlertRecord,
        features: &FeatureVector,
    ) -> Result<AnalysisResult, AnalysisError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(record, features, self.suggestion_threshold)},
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AnalysisError::RateLimited(format!("HTTP {status}")));
        }
        if status.is_server_error() {
            return Err(AnalysisError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Rejected(format!(
                "HTTP {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Unavailable(e.to_string()))?;
        parse_completion(&text)
    }
}

impl ThreatAnalyzer for RemoteAnalyzer {
    fn name(&self) -> &str {
        "remote"
    }

    fn analyze<'a>(
        &'a self,
        record: &'a AlertRecord,
        features: &'a FeatureVector,
    ) -> BoxFuture<'a, Result<AnalysisResult, AnalysisError>> {
        Box::pin(self.request(record, features))
    }
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// 모델이 돌려주는 평가 JSON
#[derive(Deserialize)]
struct Assessment {
    #[serde(default)]
    confidence: f64,
    #[serde(default = "unknown")]
    threat_classification: String,
    #[serde(default)]
    threat_description: String,
    #[serde(default)]
    recommended_action: String,
    #[serde(default)]
    additional_context: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    rule_suggestion: Option<String>,
}

fn unknown() -> String {
    "unknown".to_owned()
}

/// chat completions 응답 본문을 분석 결과로 변환합니다.
pub fn parse_completion(body: &str) -> Result<AnalysisResult, AnalysisError> {
    let completion: Completion = serde_json::from_str(body)
        .map_err(|e| AnalysisError::MalformedResponse(format!("completion envelope: {e}")))?;
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AnalysisError::MalformedResponse("response has no content".to_owned()))?;
    parse_assessment(&content)
}

/// 모델이 작성한 평가 JSON을 분석 결과로 변환합니다.
pub fn parse_assessment(content: &str) -> Result<AnalysisResult, AnalysisError> {
    let assessment: Assessment = serde_json::from_str(content.trim())
        .map_err(|e| AnalysisError::MalformedResponse(format!("assessment: {e}")))?;

    let mut result = AnalysisResult::new(
        assessment.confidence,
        assessment.threat_classification,
        assessment.threat_description,
        RecommendedAction::from_str_loose(&assessment.recommended_action),
    );
    result.additional_context = assessment.additional_context;
    result.rule_suggestion = assessment
        .rule_suggestion
        .filter(|suggestion| !suggestion.trim().is_empty());
    Ok(result)
}

/// 알림 상세와 특징을 담은 사용자 프롬프트
pub fn build_prompt(record: &AlertRecord, features: &FeatureVector, suggestion_threshold: f64) -> String {
    let port = |p: Option<u16>| p.map_or_else(|| "*".to_owned(), |p| p.to_string());
    let show = |key: &str| {
        features
            .get(key)
            .map_or_else(|| "unknown".to_owned(), |value| value.to_string())
    };

    format!(
        "Analyze this IDS alert for threat assessment:

ALERT DETAILS:
- Timestamp: {timestamp}
- Message: {message}
- Classification: {classification}
- Priority: {priority}
- Rule: {gid}:{sid}:{rev}
- Protocol: {protocol}
- Source: {src}:{sport}
- Destination: {dst}:{dport}

EXTRACTED FEATURES:
- Source IP is private: {src_private}
- Destination IP is private: {dst_private}
- Traffic direction: {direction}
- Source port category: {src_cat}
- Destination port category: {dst_cat}
- Suspicious port detected: {suspicious}
- Known attack pattern: {pattern}
- Severity score: {severity:.2}
- Hour of day: {hour}
- Day of week: {dow}
- Weekend: {weekend}

If this is a high-confidence threat (>= {suggestion_threshold:.2}), suggest a single-line detection rule for similar attacks.",
        timestamp = record.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
        message = record.message,
        classification = record.classification,
        priority = record.priority,
        gid = record.gid,
        sid = record.sid,
        rev = record.rev,
        protocol = record.protocol,
        src = record.src_ip,
        sport = port(record.src_port),
        dst = record.dst_ip,
        dport = port(record.dst_port),
        src_private = show("src_is_private"),
        dst_private = show("dst_is_private"),
        direction = show("directionality"),
        src_cat = show("src_port_category"),
        dst_cat = show("dst_port_category"),
        suspicious = show("suspicious_port"),
        pattern = show("known_attack_pattern"),
        severity = features.number("severity_score").unwrap_or(0.0),
        hour = show("hour_of_day"),
        dow = show("day_of_week"),
        weekend = show("is_weekend"),
    )
}
