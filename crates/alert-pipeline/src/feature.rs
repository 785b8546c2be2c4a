//! 특징 추출 -- [`AlertRecord`] 하나에서 [`FeatureVector`]를 유도합니다.
//!
//! 모든 함수는 순수 함수입니다. 같은 레코드는 항상 같은 특징 벡터를 만듭니다.

use std::net::IpAddr;

use chrono::{Datelike, Timelike};

use rulesmith_core::types::{AlertRecord, FeatureVector};

/// 공격에 자주 쓰이는 포트
pub const SUSPICIOUS_PORTS: [u16; 11] = [22, 23, 135, 139, 445, 1433, 3389, 5900, 6667, 31337, 12345];

/// 분류에 포함되면 심각도를 올리는 키워드 (소문자)
const HIGH_RISK_CLASSIFICATIONS: [&str; 6] = [
    "trojan-activity",
    "malware-cnc",
    "attempted-admin",
    "successful-admin",
    "attempted-dos",
    "denial-of-service",
];

/// 메시지/분류에 포함되면 알려진 공격 패턴으로 보는 키워드 (소문자)
const ATTACK_KEYWORDS: [&str; 14] = [
    "exploit",
    "backdoor",
    "trojan",
    "malware",
    "shellcode",
    "buffer overflow",
    "sql injection",
    "xss",
    "reconnaissance",
    "scan",
    "brute force",
    "denial of service",
    "dos",
    "ddos",
];

/// 트래픽 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directionality {
    /// 외부 → 내부
    Inbound,
    /// 내부 → 외부
    Outbound,
    /// 내부 → 내부
    Lateral,
    /// 외부 → 외부
    External,
}

impl Directionality {
    pub fn classify(src_private: bool, dst_private: bool) -> Self {
        match (src_private, dst_private) {
            (false, true) => Self::Inbound,
            (true, false) => Self::Outbound,
            (true, true) => Self::Lateral,
            (false, false) => Self::External,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Lateral => "lateral",
            Self::External => "external",
        }
    }
}

/// 레코드에서 특징 벡터를 추출합니다.
pub fn extract(record: &AlertRecord) -> FeatureVector {
    let mut fv = FeatureVector::new();

    // 기본 필드
    fv.insert("priority", record.priority);
    fv.insert("protocol", record.protocol.as_str());
    fv.insert("sid", record.sid);
    fv.insert("classification", record.classification.as_str());
    fv.insert("message", record.message.as_str());

    // 시간
    let weekday = record.timestamp.weekday().num_days_from_monday();
    fv.insert("hour_of_day", record.timestamp.hour());
    fv.insert("day_of_week", weekday);
    fv.insert("is_weekend", weekday >= 5);

    // 주소/포트
    let src_private = is_private_address(&record.src_ip);
    let dst_private = is_private_address(&record.dst_ip);
    fv.insert("src_ip", record.src_ip.as_str());
    fv.insert("src_port", record.src_port.unwrap_or(0));
    fv.insert("src_is_private", src_private);
    fv.insert("src_port_category", port_category(record.src_port));
    fv.insert("dst_ip", record.dst_ip.as_str());
    fv.insert("dst_port", record.dst_port.unwrap_or(0));
    fv.insert("dst_is_private", dst_private);
    fv.insert("dst_port_category", port_category(record.dst_port));

    // 방향
    let direction = Directionality::classify(src_private, dst_private);
    fv.insert("is_inbound", direction == Directionality::Inbound);
    fv.insert("is_outbound", direction == Directionality::Outbound);
    fv.insert("is_lateral", direction == Directionality::Lateral);
    fv.insert("directionality", direction.as_str());

    // 위험 지표
    fv.insert("severity_score", severity_score(record));
    fv.insert("suspicious_port", has_suspicious_port(record));
    fv.insert("known_attack_pattern", matches_attack_pattern(record));

    fv
}

/// 사설/루프백/링크로컬 주소 여부. 파싱할 수 없는 주소는 `false`입니다.
pub fn is_private_address(addr: &str) -> bool {
    match addr.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        Ok(IpAddr::V6(v6)) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                // fc00::/7 unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (first & 0xffc0) == 0xfe80
        }
        Err(_) => false,
    }
}

/// 포트 범주 (well_known, registered, dynamic, unknown)
pub fn port_category(port: Option<u16>) -> &'static str {
    match port {
        None => "unknown",
        Some(p) if p < 1024 => "well_known",
        Some(p) if p < 49152 => "registered",
        Some(_) => "dynamic",
    }
}

/// 심각도 점수 `[0.0, 1.0]`
pub fn severity_score(record: &AlertRecord) -> f64 {
    let mut score = match record.priority {
        1 => 0.4,
        2 => 0.3,
        3 => 0.2,
        _ => 0.1,
    };

    let classification = record.classification.to_lowercase();
    if HIGH_RISK_CLASSIFICATIONS
        .iter()
        .any(|keyword| classification.contains(keyword))
    {
        score += 0.3;
    }

    if matches!(record.protocol.as_str(), "TCP" | "UDP") {
        score += 0.1;
    }

    if has_suspicious_port(record) {
        score += 0.2;
    }

    // 부동소수 누적 오차 정리 후 범위 보정
    ((score * 100.0_f64).round() / 100.0).clamp(0.0, 1.0)
}

/// 출발지나 목적지 포트가 의심 포트 목록에 있는지 여부
pub fn has_suspicious_port(record: &AlertRecord) -> bool {
    [record.src_port, record.dst_port]
        .into_iter()
        .flatten()
        .any(|port| SUSPICIOUS_PORTS.contains(&port))
}

/// 메시지나 분류가 알려진 공격 키워드를 포함하는지 여부
pub fn matches_attack_pattern(record: &AlertRecord) -> bool {
    let text = format!("{} {}", record.message, record.classification).to_lowercase();
    ATTACK_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}
