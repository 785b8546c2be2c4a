//! 탐지 룰 타입 정의

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rulesmith_core::types::RecommendedAction;

/// 룰 액션
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Alert,
    Drop,
    Reject,
    Pass,
}

impl RuleAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "alert" => Some(Self::Alert),
            "drop" => Some(Self::Drop),
            "reject" => Some(Self::Reject),
            "pass" => Some(Self::Pass),
            _ => None,
        }
    }

    /// 분석 결과의 권고 대응을 룰 액션으로 변환합니다.
    pub fn from_recommended(action: RecommendedAction) -> Self {
        match action {
            RecommendedAction::Block => Self::Drop,
            RecommendedAction::Reject => Self::Reject,
            _ => Self::Alert,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Drop => "drop",
            Self::Reject => "reject",
            Self::Pass => "pass",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 룰 옵션 목록
///
/// 순서를 보존합니다. `set`으로 지정한 키는 하나만 남고, 그 외의 키
/// (`content` 등)는 중복될 수 있습니다. 값이 없는 옵션은 `None`입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleOptions(Vec<(String, Option<String>)>);

impl RuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 옵션을 끝에 추가합니다 (중복 허용).
    pub fn push(&mut self, key: &str, value: Option<String>) {
        self.0.push((key.to_owned(), value));
    }

    /// 키의 값을 설정합니다.
    ///
    /// 키가 이미 있으면 첫 번째 위치에서 값을 바꾸고 나머지 중복은 제거합니다.
    /// 없으면 끝에 추가합니다.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self.0.iter().position(|(k, _)| k == key) {
            Some(first) => {
                self.0[first].1 = value;
                let mut index = 0;
                self.0.retain(|(k, _)| {
                    let keep = index <= first || k != key;
                    index += 1;
                    keep
                });
            }
            None => self.0.push((key.to_owned(), value)),
        }
    }

    /// 키의 첫 번째 항목만 남기고 중복을 제거합니다.
    pub fn keep_first(&mut self, key: &str) {
        let mut seen = false;
        self.0.retain(|(k, _)| {
            if k != key {
                return true;
            }
            !std::mem::replace(&mut seen, true)
        });
    }

    /// 첫 번째로 나타나는 키의 값을 반환합니다. 값이 없는 옵션이면 `Some("")`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// `k:v; k2; k3:v3;` 형식으로 렌더링합니다.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(key);
            if let Some(value) = value {
                out.push(':');
                out.push_str(value);
            }
            out.push(';');
        }
        out
    }
}

/// 룰 헤더 (액션, 프로토콜, 주소/포트, 방향)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleHeader {
    pub action: RuleAction,
    pub protocol: String,
    pub src_addr: String,
    pub src_port: String,
    pub direction: String,
    pub dst_addr: String,
    pub dst_port: String,
}

impl RuleHeader {
    /// 헤더와 옵션을 룰 텍스트 한 줄로 렌더링합니다.
    pub fn render_with(&self, options: &RuleOptions) -> String {
        format!(
            "{} {} {} {} {} {} {} ({})",
            self.action,
            self.protocol,
            self.src_addr,
            self.src_port,
            self.direction,
            self.dst_addr,
            self.dst_port,
            options.render(),
        )
    }
}

/// 생성된 탐지 룰
///
/// 생성 후에는 변경되지 않으며, 룰 저장소에 기록하는 것은
/// 배포 관리자만 수행합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub sid: u32,
    /// `msg` 옵션 값 (따옴표 제외)
    pub message: String,
    #[serde(flatten)]
    pub header: RuleHeader,
    pub options: RuleOptions,
    /// 렌더링된 룰 텍스트 (한 줄)
    pub raw: String,
    pub created_at: DateTime<Utc>,
    /// 룰을 만든 분석 결과의 신뢰도
    pub confidence: f64,
}

impl Rule {
    pub fn action(&self) -> RuleAction {
        self.header.action
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
