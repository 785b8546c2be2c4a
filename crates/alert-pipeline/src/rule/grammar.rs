//! 룰 텍스트 문법
//!
//! # 룰 형식
//! ```text
//! <action> <protocol> <src_addr> <src_port> <direction> <dst_addr> <dst_port> (<k1>:<v1>; <k2>; ...;)
//! ```
//!
//! 옵션은 따옴표 밖의 `;`로 구분되며, 각 옵션은 첫 번째 `:`에서 키와 값으로
//! 나뉩니다. 따옴표 안의 `\"`, `\;` 같은 이스케이프는 그대로 보존됩니다.

use regex::Regex;

use super::types::{RuleAction, RuleHeader, RuleOptions};
use crate::error::AlertPipelineError;

const RULE_PATTERN: &str = concat!(
    r"^(?P<action>alert|drop|reject|pass)\s+",
    r"(?P<proto>\w+)\s+",
    r"(?P<src>\S+)\s+(?P<sport>\S+)\s+",
    r"(?P<dir>->|<>)\s+",
    r"(?P<dst>\S+)\s+(?P<dport>\S+)\s+",
    r"\((?P<opts>.*)\)\s*;?\s*$",
);

const OPTION_KEY_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_.-]*$";

/// 파싱된 룰 (SID 할당 전)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRule {
    pub header: RuleHeader,
    pub options: RuleOptions,
}

/// 컴파일된 룰 문법
pub struct RuleGrammar {
    rule: Regex,
    option_key: Regex,
}

impl RuleGrammar {
    pub fn new() -> Result<Self, AlertPipelineError> {
        Ok(Self {
            rule: Regex::new(RULE_PATTERN)?,
            option_key: Regex::new(OPTION_KEY_PATTERN)?,
        })
    }

    /// 룰 텍스트 한 줄을 파싱합니다.
    pub fn parse(&self, text: &str) -> Result<ParsedRule, AlertPipelineError> {
        let text = text.trim();
        if text.contains(['\n', '\r']) {
            return Err(grammar_error("rule text spans multiple lines"));
        }

        let caps = self
            .rule
            .captures(text)
            .ok_or_else(|| grammar_error("rule header does not match rule grammar"))?;
        let field = |name: &str| -> Result<String, AlertPipelineError> {
            caps.name(name)
                .map(|m| m.as_str().to_owned())
                .ok_or_else(|| grammar_error(format!("missing {name}")))
        };

        let action_text = field("action")?;
        let action = RuleAction::parse(&action_text)
            .ok_or_else(|| grammar_error(format!("unknown action: {action_text}")))?;

        let header = RuleHeader {
            action,
            protocol: field("proto")?,
            src_addr: field("src")?,
            src_port: field("sport")?,
            direction: field("dir")?,
            dst_addr: field("dst")?,
            dst_port: field("dport")?,
        };
        let options = self.parse_options(&field("opts")?)?;
        if options.is_empty() {
            return Err(grammar_error("rule has no options"));
        }

        Ok(ParsedRule { header, options })
    }

    /// 옵션 본문(괄호 안)을 파싱합니다.
    pub fn parse_options(&self, body: &str) -> Result<RuleOptions, AlertPipelineError> {
        let mut options = RuleOptions::new();
        for segment in split_options(body)? {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = match segment.split_once(':') {
                Some((k, v)) => (k.trim(), Some(v.trim().to_owned())),
                None => (segment, None),
            };
            if !self.option_key.is_match(key) {
                return Err(grammar_error(format!("invalid option key: {key}")));
            }
            options.push(key, value);
        }
        Ok(options)
    }

    /// 배포 전 구조 검증
    ///
    /// 문법 일치, 한 줄, `msg`/`sid` 옵션 존재, `sid` 값이 숫자인지 확인합니다.
    pub fn validate(&self, text: &str) -> Result<ParsedRule, AlertPipelineError> {
        let parsed = self.parse(text)?;
        for required in ["msg", "sid"] {
            if !parsed.options.contains(required) {
                return Err(grammar_error(format!("missing required option: {required}")));
            }
        }
        let sid = parsed.options.get("sid").unwrap_or_default();
        if sid.parse::<u32>().is_err() {
            return Err(grammar_error(format!("sid is not a number: {sid}")));
        }
        Ok(parsed)
    }
}

/// 따옴표 밖의 `;`로 옵션 본문을 나눕니다.
fn split_options(body: &str) -> Result<Vec<&str>, AlertPipelineError> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                segments.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(grammar_error("unterminated quoted option value"));
    }
    segments.push(&body[start..]);
    Ok(segments)
}

fn grammar_error(reason: impl Into<String>) -> AlertPipelineError {
    AlertPipelineError::RuleGrammar(reason.into())
}
