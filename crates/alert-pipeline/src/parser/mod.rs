//! 알림 라인 파서 -- fast-alert 로그 한 줄을 [`AlertRecord`]로 변환합니다.
//!
//! 문법 자체는 [`grammar`] 모듈에 격리되어 있고, 이 모듈은 필드 변환,
//! 연도 보정, 카운터 집계를 담당합니다.
//!
//! # 사용 예시
//! ```ignore
//! use rulesmith_pipeline::parser::AlertParser;
//!
//! let parser = AlertParser::new()?;
//! let record = parser.parse("10/26-11:09:09.414867  [**] [1:1000001:1] ...")?;
//! assert_eq!(record.sid, 1000001);
//! ```

pub mod grammar;

pub use grammar::AlertLineGrammar;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

use rulesmith_core::types::AlertRecord;

use crate::error::AlertPipelineError;

/// 에러 메시지에 포함할 라인 최대 길이
const ERROR_LINE_PREVIEW: usize = 120;

/// 파서 카운터 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    /// 파싱 성공 수
    pub parsed_count: u64,
    /// 파싱 실패 수
    pub error_count: u64,
    /// 성공 + 실패
    pub total_processed: u64,
    /// 타임스탬프를 현재 시각으로 대체한 수
    pub timestamp_fallbacks: u64,
}

/// fast-alert 라인 파서
///
/// 카운터가 원자적이므로 `&self`로 여러 태스크에서 공유할 수 있습니다.
pub struct AlertParser {
    grammar: AlertLineGrammar,
    /// 최대 허용 라인 길이 (바이트)
    max_line_len: usize,
    parsed: AtomicU64,
    failed: AtomicU64,
    timestamp_fallbacks: AtomicU64,
}

impl AlertParser {
    /// 기본 설정으로 새 파서를 생성합니다.
    pub fn new() -> Result<Self, AlertPipelineError> {
        Ok(Self {
            grammar: AlertLineGrammar::new()?,
            max_line_len: 64 * 1024, // 64KB
            parsed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timestamp_fallbacks: AtomicU64::new(0),
        })
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn with_max_line_len(mut self, len: usize) -> Self {
        self.max_line_len = len;
        self
    }

    /// 한 줄을 파싱합니다.
    ///
    /// 빈 줄은 에러를 반환하지만 실패 카운터에는 반영하지 않습니다.
    pub fn parse(&self, line: &str) -> Result<AlertRecord, AlertPipelineError> {
        self.parse_at(line, Local::now().naive_local())
    }

    /// 여러 줄을 파싱합니다. 실패한 줄은 건너뛰며 배치를 중단하지 않습니다.
    pub fn parse_batch<S: AsRef<str>>(&self, lines: &[S]) -> Vec<AlertRecord> {
        let now = Local::now().naive_local();
        lines
            .iter()
            .map(|line| line.as_ref())
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match self.parse_at(line, now) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!(error = %e, "dropping unparsable alert line");
                    None
                }
            })
            .collect()
    }

    /// 기준 시각 `now`를 사용하여 파싱합니다.
    ///
    /// 연도는 `now`의 연도로 보정되고, 타임스탬프가 달력상 유효하지 않으면
    /// `now`로 대체됩니다.
    pub(crate) fn parse_at(
        &self,
        line: &str,
        now: NaiveDateTime,
    ) -> Result<AlertRecord, AlertPipelineError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(AlertPipelineError::Parse {
                reason: "empty line".to_owned(),
                line: String::new(),
            });
        }

        match self.parse_fields(line, now) {
            Ok(record) => {
                self.parsed.fetch_add(1, Ordering::Relaxed);
                Ok(record)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn parse_fields(
        &self,
        line: &str,
        now: NaiveDateTime,
    ) -> Result<AlertRecord, AlertPipelineError> {
        if line.len() > self.max_line_len {
            return Err(parse_error(
                format!("line too long: {} bytes (max: {})", line.len(), self.max_line_len),
                line,
            ));
        }

        let fields = self
            .grammar
            .capture(line)
            .ok_or_else(|| parse_error("line does not match alert grammar", line))?;

        let number = |value: &str, field: &str| -> Result<u32, AlertPipelineError> {
            value
                .parse::<u32>()
                .map_err(|_| parse_error(format!("invalid {field}: {value}"), line))
        };

        Ok(AlertRecord {
            timestamp: self.reconstruct_timestamp(fields.timestamp, now),
            priority: number(fields.priority, "priority")?,
            classification: fields.classification.to_owned(),
            message: fields.message.to_owned(),
            protocol: fields.protocol.to_uppercase(),
            src_ip: fields.src_ip.to_owned(),
            src_port: parse_port(fields.src_port)
                .map_err(|reason| parse_error(reason, line))?,
            dst_ip: fields.dst_ip.to_owned(),
            dst_port: parse_port(fields.dst_port)
                .map_err(|reason| parse_error(reason, line))?,
            gid: number(fields.gid, "gid")?,
            sid: number(fields.sid, "sid")?,
            rev: number(fields.rev, "rev")?,
            raw: line.to_owned(),
        })
    }

    fn reconstruct_timestamp(&self, ts: &str, now: NaiveDateTime) -> NaiveDateTime {
        let reconstructed = self.grammar.timestamp_parts(ts).and_then(|p| {
            NaiveDate::from_ymd_opt(now.year(), p.month, p.day)?
                .and_hms_micro_opt(p.hour, p.minute, p.second, p.micros)
        });

        match reconstructed {
            Some(timestamp) => timestamp,
            None => {
                self.timestamp_fallbacks.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    timestamp = ts,
                    "alert timestamp could not be reconstructed, using current time"
                );
                now
            }
        }
    }

    /// 카운터 스냅샷을 반환합니다.
    pub fn stats(&self) -> ParserStats {
        let parsed_count = self.parsed.load(Ordering::Relaxed);
        let error_count = self.failed.load(Ordering::Relaxed);
        ParserStats {
            parsed_count,
            error_count,
            total_processed: parsed_count + error_count,
            timestamp_fallbacks: self.timestamp_fallbacks.load(Ordering::Relaxed),
        }
    }
}

fn parse_port(value: &str) -> Result<Option<u16>, String> {
    if value == "*" {
        return Ok(None);
    }
    value
        .parse::<u16>()
        .map(Some)
        .map_err(|_| format!("invalid port: {value}"))
}

fn parse_error(reason: impl Into<String>, line: &str) -> AlertPipelineError {
    let preview: String = line.chars().take(ERROR_LINE_PREVIEW).collect();
    AlertPipelineError::Parse {
        reason: reason.into(),
        line: preview,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use proptest::prelude::*;

    const SSH_LINE: &str = "10/26-11:09:09.414867  [**] [1:1000001:1] SSH Connection Attempt [**] [Classification: Attempted Administrator Privilege Gain] [Priority: 1] {TCP} 192.168.1.100:22 -> 192.168.1.200:54321";

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn parses_ssh_alert() {
        let parser = AlertParser::new().unwrap();
        let record = parser.parse_at(SSH_LINE, fixed_now()).unwrap();

        assert_eq!(record.priority, 1);
        assert_eq!(record.protocol, "TCP");
        assert_eq!(record.src_ip, "192.168.1.100");
        assert_eq!(record.src_port, Some(22));
        assert_eq!(record.dst_ip, "192.168.1.200");
        assert_eq!(record.dst_port, Some(54321));
        assert_eq!((record.gid, record.sid, record.rev), (1, 1_000_001, 1));
        assert_eq!(record.message, "SSH Connection Attempt");
        assert_eq!(
            record.classification,
            "Attempted Administrator Privilege Gain"
        );
        assert_eq!(record.raw, SSH_LINE);
    }

    #[test]
    fn timestamp_uses_current_year() {
        let parser = AlertParser::new().unwrap();
        let record = parser.parse_at(SSH_LINE, fixed_now()).unwrap();
        let expected = NaiveDate::from_ymd_opt(2025, 10, 26)
            .unwrap()
            .and_hms_micro_opt(11, 9, 9, 414_867)
            .unwrap();
        assert_eq!(record.timestamp, expected);
    }

    #[test]
    fn parse_uses_wall_clock_year() {
        let parser = AlertParser::new().unwrap();
        let record = parser.parse(SSH_LINE).unwrap();
        assert_eq!(record.timestamp.year(), Local::now().year());
        assert_eq!(record.timestamp.hour(), 11);
    }

    #[test]
    fn invalid_calendar_date_falls_back_to_now() {
        let parser = AlertParser::new().unwrap();
        let line = SSH_LINE.replacen("10/26", "02/30", 1);
        let record = parser.parse_at(&line, fixed_now()).unwrap();

        assert_eq!(record.timestamp, fixed_now());
        let stats = parser.stats();
        assert_eq!(stats.timestamp_fallbacks, 1);
        assert_eq!(stats.parsed_count, 1);
        assert_eq!(stats.error_count, 0);
    }

    #[test]
    fn protocol_is_uppercased() {
        let parser = AlertParser::new().unwrap();
        let line = SSH_LINE.replace("{TCP}", "{udp}");
        let record = parser.parse_at(&line, fixed_now()).unwrap();
        assert_eq!(record.protocol, "UDP");
    }

    #[test]
    fn wildcard_ports_are_absent() {
        let parser = AlertParser::new().unwrap();
        let line = "01/02-03:04:05.000001  [**] [1:384:8] PROTOCOL-ICMP PING [**] [Classification: Misc activity] [Priority: 3] {ICMP} 10.0.0.1:* -> 10.0.0.2:*";
        let record = parser.parse_at(line, fixed_now()).unwrap();
        assert_eq!(record.src_port, None);
        assert_eq!(record.dst_port, None);
    }

    #[test]
    fn out_of_range_port_is_a_failure() {
        let parser = AlertParser::new().unwrap();
        let line = SSH_LINE.replace(":54321", ":70000");
        let err = parser.parse_at(&line, fixed_now()).unwrap_err();
        assert!(err.to_string().contains("invalid port"));
        assert_eq!(parser.stats().error_count, 1);
    }

    #[test]
    fn non_matching_lines_are_counted_and_dropped() {
        let parser = AlertParser::new().unwrap();
        let lines = vec![
            SSH_LINE.to_owned(),
            "Commencing packet processing".to_owned(),
            String::new(),
            "   ".to_owned(),
            SSH_LINE.to_owned(),
        ];

        let records = parser.parse_batch(&lines);

        assert_eq!(records.len(), 2);
        let stats = parser.stats();
        assert_eq!(stats.parsed_count, 2);
        // 빈 줄은 실패로 세지 않음
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.total_processed, 3);
    }

    #[test]
    fn overlong_line_is_rejected() {
        let parser = AlertParser::new().unwrap().with_max_line_len(32);
        assert!(parser.parse_at(SSH_LINE, fixed_now()).is_err());
    }

    #[test]
    fn leading_and_trailing_whitespace_is_trimmed() {
        let parser = AlertParser::new().unwrap();
        let padded = format!("  {SSH_LINE}\t ");
        let record = parser.parse_at(&padded, fixed_now()).unwrap();
        assert_eq!(record.raw, SSH_LINE);
    }

    fn arb_ip() -> impl Strategy<Value = String> {
        (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
            .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}"))
    }

    proptest! {
        #[test]
        fn parse_inverts_render(
            src in arb_ip(),
            dst in arb_ip(),
            sport in proptest::option::of(any::<u16>()),
            dport in proptest::option::of(any::<u16>()),
            priority in 1u32..5,
            sid in 1u32..10_000_000,
            message in "[A-Za-z][A-Za-z0-9 _./-]{0,40}[A-Za-z0-9]",
            classification in "[A-Za-z][A-Za-z0-9 -]{0,30}[A-Za-z]",
        ) {
            let parser = AlertParser::new().unwrap();
            let original = AlertRecord {
                timestamp: NaiveDate::from_ymd_opt(2025, 6, 15)
                    .unwrap()
                    .and_hms_micro_opt(8, 30, 1, 123_456)
                    .unwrap(),
                priority,
                classification,
                message,
                protocol: "TCP".to_owned(),
                src_ip: src,
                src_port: sport,
                dst_ip: dst,
                dst_port: dport,
                gid: 1,
                sid,
                rev: 2,
                raw: String::new(),
            };
            let line = original.render_line();
            let parsed = parser.parse_at(&line, fixed_now()).unwrap();

            prop_assert_eq!(&parsed.src_ip, &original.src_ip);
            prop_assert_eq!(&parsed.dst_ip, &original.dst_ip);
            prop_assert_eq!(parsed.src_port, original.src_port);
            prop_assert_eq!(parsed.dst_port, original.dst_port);
            prop_assert_eq!(parsed.priority, original.priority);
            prop_assert_eq!(&parsed.classification, &original.classification);
            prop_assert_eq!(&parsed.message, &original.message);
            prop_assert_eq!(parsed.sid, original.sid);
            prop_assert_eq!(parsed.timestamp, original.timestamp);
        }
    }
}
