//! fast-alert 라인 문법
//!
//! # 라인 형식
//! ```text
//! MM/DD-HH:MM:SS.ffffff  [**] [gid:sid:rev] <message> [**] [Classification: <text>] [Priority: <n>] {PROTO} <src>:<port|*> -> <dst>:<port|*>
//! ```
//!
//! 정규식과 캡처 이름을 이 모듈에 격리하여, 문법 변경이 파서의 나머지 부분에
//! 영향을 주지 않도록 합니다.

use regex::{Captures, Regex};

use crate::error::AlertPipelineError;

const ALERT_LINE_PATTERN: &str = concat!(
    r"^(?P<ts>\d{2}/\d{2}-\d{2}:\d{2}:\d{2}\.\d+)\s+\[\*\*\]\s+",
    r"\[(?P<gid>\d+):(?P<sid>\d+):(?P<rev>\d+)\]\s+",
    r"(?P<msg>.+?)\s+\[\*\*\]\s+",
    r"\[Classification:\s*(?P<class>[^\]]*)\]\s+",
    r"\[Priority:\s*(?P<prio>\d+)\]\s+",
    r"\{(?P<proto>[^}]+)\}\s+",
    r"(?P<src>\S+):(?P<sport>\d+|\*)\s+->\s+",
    r"(?P<dst>\S+):(?P<dport>\d+|\*)",
);

const TIMESTAMP_PATTERN: &str =
    r"^(?P<mon>\d{2})/(?P<day>\d{2})-(?P<h>\d{2}):(?P<m>\d{2}):(?P<s>\d{2})\.(?P<frac>\d+)$";

/// 문법에 맞는 라인에서 추출한 원시 필드
///
/// 숫자 변환과 의미 해석은 파서가 담당합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertFields<'a> {
    pub timestamp: &'a str,
    pub gid: &'a str,
    pub sid: &'a str,
    pub rev: &'a str,
    pub message: &'a str,
    pub classification: &'a str,
    pub priority: &'a str,
    pub protocol: &'a str,
    pub src_ip: &'a str,
    pub src_port: &'a str,
    pub dst_ip: &'a str,
    pub dst_port: &'a str,
}

/// 타임스탬프 구성 요소 (연도 없음)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampParts {
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// 마이크로초 (6자리로 보정됨)
    pub micros: u32,
}

/// 컴파일된 알림 라인 문법
pub struct AlertLineGrammar {
    line: Regex,
    timestamp: Regex,
}

impl AlertLineGrammar {
    /// 문법 정규식을 컴파일합니다.
    pub fn new() -> Result<Self, AlertPipelineError> {
        Ok(Self {
            line: Regex::new(ALERT_LINE_PATTERN)?,
            timestamp: Regex::new(TIMESTAMP_PATTERN)?,
        })
    }

    /// 라인을 문법에 맞춰 분해합니다. 맞지 않으면 `None`을 반환합니다.
    pub fn capture<'a>(&self, line: &'a str) -> Option<AlertFields<'a>> {
        let caps = self.line.captures(line)?;
        Some(AlertFields {
            timestamp: group(&caps, "ts")?,
            gid: group(&caps, "gid")?,
            sid: group(&caps, "sid")?,
            rev: group(&caps, "rev")?,
            message: group(&caps, "msg")?.trim(),
            classification: group(&caps, "class")?.trim(),
            priority: group(&caps, "prio")?,
            protocol: group(&caps, "proto")?.trim(),
            src_ip: group(&caps, "src")?,
            src_port: group(&caps, "sport")?,
            dst_ip: group(&caps, "dst")?,
            dst_port: group(&caps, "dport")?,
        })
    }

    /// `MM/DD-HH:MM:SS.ffffff` 타임스탬프를 분해합니다.
    ///
    /// 소수부는 6자리로 오른쪽 패딩되거나 잘립니다.
    /// 값의 범위(예: 2월 30일)는 검사하지 않습니다.
    pub fn timestamp_parts(&self, ts: &str) -> Option<TimestampParts> {
        let caps = self.timestamp.captures(ts)?;
        let num = |name: &str| -> Option<u32> { group(&caps, name)?.parse().ok() };

        let frac = group(&caps, "frac")?;
        let mut digits: String = frac.chars().take(6).collect();
        while digits.len() < 6 {
            digits.push('0');
        }

        Some(TimestampParts {
            month: num("mon")?,
            day: num("day")?,
            hour: num("h")?,
            minute: num("m")?,
            second: num("s")?,
            micros: digits.parse().ok()?,
        })
    }
}

fn group<'a>(caps: &Captures<'a>, name: &str) -> Option<&'a str> {
    caps.name(name).map(|m| m.as_str())
}
