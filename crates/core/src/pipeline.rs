//! 파이프라인 trait: 모듈 생명주기 정의

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::RulesmithError;

/// `dyn` trait 메서드가 반환하는 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작하지만 일부 기능이 저하됨
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 데몬이 관리하는 장기 실행 모듈의 생명주기
///
/// `start` → (실행) → `stop` 순서로 호출됩니다.
pub trait Pipeline: Send {
    /// 백그라운드 태스크를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), RulesmithError>> + Send;

    /// 백그라운드 태스크를 정지하고 종료 처리를 수행합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), RulesmithError>> + Send;

    /// 현재 상태를 보고합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
