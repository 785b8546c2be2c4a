//! 룰 합성기 -- 신뢰도가 높은 분석 결과를 탐지 룰로 바꿉니다.
//!
//! # 합성 경로
//! 1. 분석 결과에 룰 제안이 있으면 룰 문법으로 파싱합니다. 성공하면 SID를
//!    새로 발급한 값으로 덮어쓰고 관리용 옵션(`classtype`, `reference`,
//!    `metadata`)을 주입합니다.
//! 2. 제안이 없거나 파싱에 실패하면 알림 레코드에서 룰을 직접 만듭니다.
//!
//! 룰 제안은 신뢰할 수 없는 외부 텍스트이므로 문법을 통과한 경우에만 사용합니다.

use chrono::{Local, Utc};

use rulesmith_core::metrics as m;
use rulesmith_core::types::{AlertRecord, AnalysisResult};

use super::grammar::{ParsedRule, RuleGrammar};
use super::sid::SidAllocator;
use super::types::{Rule, RuleAction, RuleHeader, RuleOptions};
use crate::error::AlertPipelineError;

/// 생성 메시지에 포함할 설명의 최대 길이 (문자 수)
const MAX_DESCRIPTION_CHARS: usize = 80;

/// 룰 합성 정책
#[derive(Debug, Clone)]
pub struct SynthesisPolicy {
    /// 이 값 미만의 신뢰도는 룰을 만들지 않음
    pub confidence_threshold: f64,
    /// 메시지/메타데이터 접두어
    pub message_prefix: String,
    /// 생성 경로의 `priority` 옵션 값
    pub default_priority: u32,
}

impl Default for SynthesisPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.98,
            message_prefix: "ML_GENERATED".to_owned(),
            default_priority: 1,
        }
    }
}

/// 룰 합성기
///
/// SID 할당기를 소유하며, 생성된 룰 하나당 정확히 하나의 SID를 소비합니다.
pub struct RuleSynthesizer {
    grammar: RuleGrammar,
    sids: SidAllocator,
    policy: SynthesisPolicy,
}

impl RuleSynthesizer {
    pub fn new(sids: SidAllocator, policy: SynthesisPolicy) -> Result<Self, AlertPipelineError> {
        Ok(Self {
            grammar: RuleGrammar::new()?,
            sids,
            policy,
        })
    }

    /// 다음에 발급될 SID
    pub fn next_sid(&self) -> u32 {
        self.sids.peek()
    }

    /// 분석 결과에서 룰을 합성합니다. 신뢰도가 임계값 미만이면 `None`.
    pub fn synthesize(&mut self, record: &AlertRecord, result: &AnalysisResult) -> Option<Rule> {
        if result.confidence < self.policy.confidence_threshold {
            tracing::debug!(
                alert_sid = record.sid,
                confidence = result.confidence,
                threshold = self.policy.confidence_threshold,
                "confidence below threshold, no rule synthesized"
            );
            return None;
        }

        let suggested = result
            .rule_suggestion
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .and_then(|text| match self.grammar.parse(text) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!(
                        alert_sid = record.sid,
                        error = %e,
                        "rule suggestion rejected, generating rule from alert"
                    );
                    None
                }
            });

        let rule = match suggested {
            Some(parsed) => self.from_suggestion(parsed, result),
            None => self.from_alert(record, result),
        };

        metrics::counter!(m::RULES_GENERATED_TOTAL).increment(1);
        tracing::info!(
            sid = rule.sid,
            action = %rule.action(),
            confidence = result.confidence,
            alert_sid = record.sid,
            "rule synthesized"
        );
        Some(rule)
    }

    fn from_suggestion(&mut self, parsed: ParsedRule, result: &AnalysisResult) -> Rule {
        let ParsedRule {
            header,
            mut options,
        } = parsed;
        let sid = self.sids.allocate();

        options.set("sid", sid.to_string());
        for key in ["msg", "rev", "priority"] {
            options.keep_first(key);
        }
        if !options.contains("msg") {
            options.set(
                "msg",
                quote(&format!(
                    "{}: {}",
                    self.policy.message_prefix,
                    sanitize_message(&result.threat_description)
                )),
            );
        }
        self.apply_managed_options(&mut options, result);
        if !options.contains("rev") {
            options.set("rev", "1");
        }

        let message = options.get("msg").unwrap_or_default().trim_matches('"').to_owned();
        self.finish(sid, message, header, options, result)
    }

    fn from_alert(&mut self, record: &AlertRecord, result: &AnalysisResult) -> Rule {
        let sid = self.sids.allocate();
        let header = RuleHeader {
            action: RuleAction::from_recommended(result.recommended_action),
            protocol: rule_protocol(&record.protocol),
            src_addr: record.src_ip.clone(),
            src_port: rule_port(record.src_port),
            direction: "->".to_owned(),
            dst_addr: record.dst_ip.clone(),
            dst_port: rule_port(record.dst_port),
        };

        let description: String = sanitize_message(&result.threat_description)
            .chars()
            .take(MAX_DESCRIPTION_CHARS)
            .collect();
        let message = format!("{}: {}", self.policy.message_prefix, description.trim_end());

        let mut options = RuleOptions::new();
        options.set("msg", quote(&message));
        options.set("sid", sid.to_string());
        options.set("rev", "1");
        options.set("classtype", sanitize_classtype(&result.threat_classification));
        options.set("priority", self.policy.default_priority.to_string());
        self.apply_managed_options(&mut options, result);

        self.finish(sid, message, header, options, result)
    }

    fn apply_managed_options(&self, options: &mut RuleOptions, result: &AnalysisResult) {
        options.set("classtype", sanitize_classtype(&result.threat_classification));
        options.set(
            "reference",
            format!("ml_analysis,confidence_{:.2}", result.confidence),
        );
        options.set(
            "metadata",
            format!(
                "{},generated_{}",
                self.policy.message_prefix,
                Local::now().format("%Y%m%d")
            ),
        );
    }

    fn finish(
        &self,
        sid: u32,
        message: String,
        header: RuleHeader,
        options: RuleOptions,
        result: &AnalysisResult,
    ) -> Rule {
        let raw = header.render_with(&options);
        Rule {
            sid,
            message,
            header,
            options,
            raw,
            created_at: Utc::now(),
            confidence: result.confidence,
        }
    }
}

fn quote(text: &str) -> String {
    format!("\"{text}\"")
}

/// 룰 옵션 값 안에서 문제가 되는 문자를 중화합니다.
fn sanitize_message(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '"' => '\'',
            ';' => ',',
            '\\' => '/',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect()
}

/// 분류를 `classtype` 값으로 쓸 수 있게 정리합니다.
fn sanitize_classtype(classification: &str) -> String {
    let cleaned: String = classification
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-');
    if cleaned.is_empty() {
        "unknown".to_owned()
    } else {
        cleaned.to_owned()
    }
}

fn rule_protocol(protocol: &str) -> String {
    let lower = protocol.trim().to_lowercase();
    if !lower.is_empty() && lower.chars().all(|c| c.is_ascii_alphanumeric()) {
        lower
    } else {
        "ip".to_owned()
    }
}

fn rule_port(port: Option<u16>) -> String {
    port.map_or_else(|| "any".to_owned(), |p| p.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rulesmith_core::types::RecommendedAction;

    fn record() -> AlertRecord {
        AlertRecord {
            timestamp: NaiveDate::from_ymd_opt(2025, 10, 26)
                .unwrap()
                .and_hms_micro_opt(11, 9, 9, 414_867)
                .unwrap(),
            priority: 1,
            classification: "Attempted Administrator Privilege Gain".to_owned(),
            message: "SSH Connection Attempt".to_owned(),
            protocol: "TCP".to_owned(),
            src_ip: "192.168.1.100".to_owned(),
            src_port: Some(22),
            dst_ip: "192.168.1.200".to_owned(),
            dst_port: Some(54321),
            gid: 1,
            sid: 1_000_001,
            rev: 1,
            raw: String::new(),
        }
    }

    fn synthesizer(start: u32) -> RuleSynthesizer {
        RuleSynthesizer::new(SidAllocator::starting_at(start), SynthesisPolicy::default()).unwrap()
    }

    #[test]
    fn below_threshold_yields_nothing_and_keeps_sid() {
        let mut synth = synthesizer(2_000_000);
        let result = AnalysisResult::new(0.5, "scan", "probe", RecommendedAction::Block);
        assert!(synth.synthesize(&record(), &result).is_none());
        assert_eq!(synth.next_sid(), 2_000_000);
    }

    #[test]
    fn generated_rule_from_block_recommendation() {
        let mut synth = synthesizer(2_000_000);
        let result = AnalysisResult::new(
            0.99,
            "Brute Force",
            "Repeated SSH login attempts",
            RecommendedAction::Block,
        );

        let rule = synth.synthesize(&record(), &result).unwrap();
        assert_eq!(rule.sid, 2_000_000);
        assert_eq!(rule.action(), RuleAction::Drop);
        assert_eq!(rule.header.protocol, "tcp");
        assert_eq!(rule.header.src_port, "22");
        assert_eq!(
            rule.options.keys().collect::<Vec<_>>(),
            vec!["msg", "sid", "rev", "classtype", "priority", "reference", "metadata"]
        );
        assert_eq!(rule.options.get("classtype"), Some("brute-force"));
        assert_eq!(rule.options.get("reference"), Some("ml_analysis,confidence_0.99"));
        assert_eq!(rule.message, "ML_GENERATED: Repeated SSH login attempts");
        assert!(rule.raw.starts_with(
            "drop tcp 192.168.1.100 22 -> 192.168.1.200 54321 (msg:\"ML_GENERATED: Repeated SSH login attempts\"; sid:2000000; rev:1;"
        ));
        assert_eq!(synth.next_sid(), 2_000_001);
    }

    #[test]
    fn suggestion_keeps_structure_but_replaces_sid() {
        let mut synth = synthesizer(2_000_000);
        let result = AnalysisResult::new(0.99, "trojan-activity", "C2", RecommendedAction::Monitor)
            .with_rule_suggestion(
                r#"alert tcp any any -> $HOME_NET 4444 (msg:"Backdoor; port"; content:"cmd"; sid:1; classtype:bogus;)"#,
            );

        let rule = synth.synthesize(&record(), &result).unwrap();
        assert_eq!(rule.sid, 2_000_000);
        assert_eq!(rule.header.dst_port, "4444");
        assert_eq!(rule.options.get("sid"), Some("2000000"));
        assert_eq!(rule.options.get("content"), Some("\"cmd\""));
        assert_eq!(rule.options.get("classtype"), Some("trojan-activity"));
        assert_eq!(rule.options.get("rev"), Some("1"));
        assert_eq!(rule.message, "Backdoor; port");
        assert!(RuleGrammar::new().unwrap().validate(&rule.raw).is_ok());
    }

    #[test]
    fn suggestion_with_repeated_managed_keys_keeps_first_values() {
        let mut synth = synthesizer(5);
        let result = AnalysisResult::new(0.99, "x", "d", RecommendedAction::Monitor)
            .with_rule_suggestion(
                r#"alert tcp any any -> any 22 (msg:"a"; msg:"b"; content:"x"; content:"y"; priority:1; priority:3; rev:1; rev:9; sid:1; sid:2;)"#,
            );

        let rule = synth.synthesize(&record(), &result).unwrap();
        let count = |key: &str| rule.options.keys().filter(|k| *k == key).count();
        for key in ["msg", "sid", "rev", "priority", "classtype", "reference", "metadata"] {
            assert_eq!(count(key), 1, "{key} must occur once in {}", rule.raw);
        }
        assert_eq!(count("content"), 2);
        assert_eq!(rule.options.get("msg"), Some("\"a\""));
        assert_eq!(rule.options.get("priority"), Some("1"));
        assert_eq!(rule.options.get("rev"), Some("1"));
        assert_eq!(rule.options.get("sid"), Some("5"));
        assert!(RuleGrammar::new().unwrap().validate(&rule.raw).is_ok());
    }

    #[test]
    fn suggestion_without_msg_gets_one() {
        let mut synth = synthesizer(10);
        let result = AnalysisResult::new(1.0, "x", "Needs a message", RecommendedAction::Monitor)
            .with_rule_suggestion("alert udp any any -> any 53 (content:\"evil\";)");
        let rule = synth.synthesize(&record(), &result).unwrap();
        assert_eq!(rule.message, "ML_GENERATED: Needs a message");
        assert_eq!(rule.options.keys().next(), Some("content"));
    }

    #[test]
    fn malformed_suggestion_falls_back_to_generated_rule() {
        let mut synth = synthesizer(2_000_000);
        let result = AnalysisResult::new(0.99, "scan", "Port scan", RecommendedAction::Reject)
            .with_rule_suggestion("please block this host");

        let rule = synth.synthesize(&record(), &result).unwrap();
        assert_eq!(rule.action(), RuleAction::Reject);
        assert_eq!(rule.options.get("priority"), Some("1"));
        assert_eq!(rule.sid, 2_000_000);
        assert_eq!(synth.next_sid(), 2_000_001);
    }

    #[test]
    fn multi_line_suggestion_is_rejected() {
        let mut synth = synthesizer(1);
        let result = AnalysisResult::new(0.99, "scan", "d", RecommendedAction::Monitor)
            .with_rule_suggestion(
                "alert tcp any any -> any any (msg:\"a\"; sid:1;)\nalert tcp any any -> any any (msg:\"b\"; sid:2;)",
            );
        let rule = synth.synthesize(&record(), &result).unwrap();
        assert!(rule.options.contains("priority"));
        assert!(!rule.raw.contains('\n'));
    }

    #[test]
    fn hostile_description_is_neutralized_and_truncated() {
        let mut synth = synthesizer(1);
        let description = format!("evil\"; sid:1; \\ {}\n", "a".repeat(200));
        let result = AnalysisResult::new(0.99, "", description, RecommendedAction::Monitor);

        let rule = synth.synthesize(&record(), &result).unwrap();
        let parsed = RuleGrammar::new().unwrap().validate(&rule.raw).unwrap();
        assert_eq!(parsed.options.get("sid"), Some("1"));
        assert_eq!(rule.options.get("classtype"), Some("unknown"));
        assert!(rule.message.chars().count() <= "ML_GENERATED: ".len() + MAX_DESCRIPTION_CHARS);
        assert!(!rule.message.contains('"'));
        assert!(!rule.message.contains(';'));
    }

    #[test]
    fn missing_ports_and_odd_protocol() {
        let mut synth = synthesizer(1);
        let mut r = record();
        r.src_port = None;
        r.dst_port = None;
        r.protocol = "PROTO:255".to_owned();
        let result = AnalysisResult::new(0.99, "x", "y", RecommendedAction::Monitor);
        let rule = synth.synthesize(&r, &result).unwrap();
        assert_eq!(rule.header.protocol, "ip");
        assert_eq!(rule.header.src_port, "any");
        assert_eq!(rule.header.dst_port, "any");
    }

    #[test]
    fn classtype_sanitization() {
        assert_eq!(
            sanitize_classtype("Attempted Administrator Privilege Gain"),
            "attempted-administrator-privilege-gain"
        );
        assert_eq!(sanitize_classtype("a;b\"c"), "a-b-c");
        assert_eq!(sanitize_classtype("  "), "unknown");
    }
}
