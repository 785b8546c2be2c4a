//! 센서 제어 -- 룰 저장소 검증과 센서 리로드
//!
//! [`SensorController`] trait은 센서 프로세스와의 상호작용을 추상화합니다.
//! 운영 환경에서는 [`ProcessSensorController`]가 외부 명령을 실행하고,
//! 테스트에서는 mock 구현으로 검증/리로드 결과를 시뮬레이션합니다.
//!
//! ```text
//! DeploymentManager
//!        │
//!        ▼
//! SensorController (trait)
//!     │          │
//!     ▼          ▼
//! Process      Mock
//!     │
//!     ▼
//! snort -T / systemctl reload / pkill -HUP
//! ```

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// 진단 메시지로 남길 출력의 최대 길이 (바이트)
const DIAGNOSTIC_TAIL_BYTES: usize = 2048;

/// 리로드 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMethod {
    /// 기본 리로드 명령
    Primary,
    /// 기본 명령 실패 시 한 번 시도하는 대체 명령
    Fallback,
}

impl ReloadMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

/// 외부 명령 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// 종료 코드 0 여부
    pub success: bool,
    /// 실패 시 진단 메시지 (stderr/stdout 꼬리)
    pub diagnostic: String,
}

impl CommandOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            diagnostic: String::new(),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// 센서 검증/리로드 capability
///
/// 두 메서드 모두 실패를 에러가 아닌 [`CommandOutcome`]으로 보고합니다.
/// 타임아웃도 실패로 취급합니다.
pub trait SensorController: Send + Sync + 'static {
    /// 현재 룰 저장소를 포함한 센서 설정을 검증합니다.
    fn validate(&self) -> impl Future<Output = CommandOutcome> + Send;

    /// 센서가 룰을 다시 읽도록 합니다.
    fn reload(&self, method: ReloadMethod) -> impl Future<Output = CommandOutcome> + Send;
}

/// 외부 명령으로 센서를 제어하는 구현
///
/// 명령은 셸을 거치지 않고 `argv` 그대로 실행되며, 타임아웃 시 프로세스는
/// 종료됩니다 (`kill_on_drop`).
#[derive(Debug, Clone)]
pub struct ProcessSensorController {
    validate_command: Vec<String>,
    reload_command: Vec<String>,
    fallback_reload_command: Vec<String>,
    timeout: Duration,
}

impl ProcessSensorController {
    pub fn new(
        validate_command: Vec<String>,
        reload_command: Vec<String>,
        fallback_reload_command: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            validate_command,
            reload_command,
            fallback_reload_command,
            timeout,
        }
    }

    async fn run(&self, argv: &[String], purpose: &str) -> CommandOutcome {
        let Some((program, args)) = argv.split_first() else {
            return CommandOutcome::failed(format!("{purpose} command is not configured"));
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    command = %argv.join(" "),
                    error = %e,
                    "failed to spawn {purpose} command"
                );
                return CommandOutcome::failed(format!("failed to spawn {program}: {e}"));
            }
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => {
                tracing::debug!(command = %argv.join(" "), "{purpose} command succeeded");
                CommandOutcome::ok()
            }
            Ok(Ok(output)) => {
                let diagnostic = diagnostic_tail(&output.stderr, &output.stdout);
                tracing::warn!(
                    command = %argv.join(" "),
                    status = %output.status,
                    diagnostic = %diagnostic,
                    "{purpose} command failed"
                );
                CommandOutcome::failed(format!("{}: {diagnostic}", output.status))
            }
            Ok(Err(e)) => CommandOutcome::failed(format!("failed to wait for {program}: {e}")),
            Err(_elapsed) => {
                tracing::warn!(
                    command = %argv.join(" "),
                    timeout_secs = self.timeout.as_secs(),
                    "{purpose} command timed out"
                );
                CommandOutcome::failed(format!(
                    "{program} timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        }
    }
}

impl SensorController for ProcessSensorController {
    async fn validate(&self) -> CommandOutcome {
        self.run(&self.validate_command, "validate").await
    }

    async fn reload(&self, method: ReloadMethod) -> CommandOutcome {
        match method {
            ReloadMethod::Primary => self.run(&self.reload_command, "reload").await,
            ReloadMethod::Fallback => self.run(&self.fallback_reload_command, "fallback reload").await,
        }
    }
}

/// stderr 우선, 비어 있으면 stdout의 꼬리를 진단 메시지로 사용합니다.
fn diagnostic_tail(stderr: &[u8], stdout: &[u8]) -> String {
    let source = if stderr.iter().any(|b| !b.is_ascii_whitespace()) {
        stderr
    } else {
        stdout
    };
    let start = source.len().saturating_sub(DIAGNOSTIC_TAIL_BYTES);
    String::from_utf8_lossy(&source[start..]).trim().to_owned()
}

/// 테스트용 Mock 센서 컨트롤러
///
/// 검증/리로드 결과를 미리 정해두고 호출 횟수를 기록합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockSensorController {
    pub fail_validate: bool,
    pub fail_primary_reload: bool,
    pub fail_fallback_reload: bool,
    pub calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockSensorController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_validation(mut self) -> Self {
        self.fail_validate = true;
        self
    }

    pub fn with_failing_primary_reload(mut self) -> Self {
        self.fail_primary_reload = true;
        self
    }

    pub fn with_failing_fallback_reload(mut self) -> Self {
        self.fail_fallback_reload = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.to_owned());
        }
    }
}

#[cfg(test)]
impl SensorController for MockSensorController {
    async fn validate(&self) -> CommandOutcome {
        self.record("validate");
        if self.fail_validate {
            CommandOutcome::failed("ERROR: rule parse failure")
        } else {
            CommandOutcome::ok()
        }
    }

    async fn reload(&self, method: ReloadMethod) -> CommandOutcome {
        self.record(method.as_str());
        let fail = match method {
            ReloadMethod::Primary => self.fail_primary_reload,
            ReloadMethod::Fallback => self.fail_fallback_reload,
        };
        if fail {
            CommandOutcome::failed("mock reload failure")
        } else {
            CommandOutcome::ok()
        }
    }
}
