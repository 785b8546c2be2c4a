//! 알림 로그 tailer
//!
//! 추가 전용 알림 로그를 폴링하여 새로 추가된 완결 라인만 반환합니다.
//! `tail -F`와 유사하지만 폴링마다 한 번의 읽기만 수행합니다.
//!
//! # 커서 규칙
//! - 첫 폴링: 커서를 현재 EOF에 둡니다 (과거 내용은 재생하지 않음). 파일이 없으면 0.
//! - 파일 크기가 커서보다 작아졌거나 (truncation) 파일 identity가 바뀌면 (로테이션)
//!   커서를 0으로 되돌립니다.
//! - 마지막 줄바꿈 이후의 미완결 조각은 소비하지 않습니다. 다음 폴링에서
//!   줄바꿈이 붙은 뒤 온전한 라인으로 다시 읽힙니다.
//! - 한 번의 읽기 한도를 넘도록 줄바꿈이 없는 라인은 다음 줄바꿈까지 통째로 버립니다.
//!   잘린 나머지 조각이 라인으로 전달되지 않습니다.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::AlertPipelineError;

/// 파일 identity (unix: device + inode)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn from_metadata(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn from_metadata(_meta: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// 로그 파일 내 읽기 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    /// 다음에 읽을 바이트 오프셋 (`skipping`이 아니면 항상 라인 경계)
    pub offset: u64,
    /// 커서가 가리키는 파일의 identity
    pub identity: Option<FileIdentity>,
    /// 너무 긴 라인을 버리는 중이면 다음 줄바꿈까지 건너뜀
    pub skipping: bool,
}

/// 한 번의 읽기 결과
struct ReadChunk {
    lines: Vec<String>,
    consumed: u64,
    skipping: bool,
}

/// 알림 로그 tailer
pub struct StreamTailer {
    path: PathBuf,
    cursor: Option<StreamCursor>,
    /// 폴링 1회당 최대 읽기 바이트
    max_read_bytes: usize,
}

impl StreamTailer {
    /// 새 tailer를 생성합니다. 커서는 첫 폴링에서 초기화됩니다.
    pub fn new(path: impl Into<PathBuf>, max_read_bytes: usize) -> Self {
        Self {
            path: path.into(),
            cursor: None,
            max_read_bytes: max_read_bytes.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 현재 커서. 첫 폴링 전에는 `None`입니다.
    pub fn cursor(&self) -> Option<StreamCursor> {
        self.cursor
    }

    /// 새로 추가된 완결 라인을 읽습니다.
    ///
    /// 열기/읽기 실패 시 커서는 변경되지 않으며 에러를 반환합니다.
    pub async fn poll(&mut self) -> Result<Vec<String>, AlertPipelineError> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.cursor.is_none() {
                    tracing::info!(
                        path = %self.path.display(),
                        "alert log does not exist yet, will read from the beginning once created"
                    );
                    self.cursor = Some(StreamCursor {
                        offset: 0,
                        identity: None,
                        skipping: false,
                    });
                }
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let identity = FileIdentity::from_metadata(&meta);
        let size = meta.len();

        let Some(mut cursor) = self.cursor else {
            tracing::info!(
                path = %self.path.display(),
                offset = size,
                "alert log cursor initialized at end of file"
            );
            self.cursor = Some(StreamCursor {
                offset: size,
                identity,
                skipping: false,
            });
            return Ok(Vec::new());
        };

        let rotated = identity.is_some() && cursor.identity != identity;
        if rotated || size < cursor.offset {
            tracing::warn!(
                path = %self.path.display(),
                previous_offset = cursor.offset,
                size,
                rotated,
                "alert log truncated or rotated, reading from the beginning"
            );
            cursor.offset = 0;
            cursor.skipping = false;
        }
        cursor.identity = identity;

        if size == cursor.offset {
            self.cursor = Some(cursor);
            return Ok(Vec::new());
        }

        let chunk = self.read_from(cursor.offset, size, cursor.skipping).await?;
        cursor.offset += chunk.consumed;
        cursor.skipping = chunk.skipping;
        self.cursor = Some(cursor);
        Ok(chunk.lines)
    }

    /// `offset`부터 최대 `max_read_bytes`만큼 읽어 완결 라인을 분리합니다.
    ///
    /// `skipping`이면 첫 줄바꿈까지의 바이트를 라인으로 만들지 않고 버립니다.
    async fn read_from(
        &self,
        offset: u64,
        size: u64,
        skipping: bool,
    ) -> Result<ReadChunk, AlertPipelineError> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let available = size.saturating_sub(offset);
        let limit = available.min(self.max_read_bytes as u64);
        let mut buf = Vec::with_capacity(usize::try_from(limit).unwrap_or(self.max_read_bytes));
        file.take(limit).read_to_end(&mut buf).await?;

        let mut start = 0;
        if skipping {
            let Some(end) = buf.iter().position(|&b| b == b'\n') else {
                return Ok(ReadChunk {
                    lines: Vec::new(),
                    consumed: buf.len() as u64,
                    skipping: true,
                });
            };
            tracing::debug!(
                path = %self.path.display(),
                offset = offset + end as u64 + 1,
                "end of over-long line reached, resuming"
            );
            start = end + 1;
        }

        let rest = &buf[start..];
        let Some(last_newline) = rest.iter().rposition(|&b| b == b'\n') else {
            if start == 0 && buf.len() >= self.max_read_bytes {
                tracing::warn!(
                    path = %self.path.display(),
                    offset,
                    bytes = buf.len(),
                    "line exceeds max read size without a terminator, skipping to next line"
                );
                return Ok(ReadChunk {
                    lines: Vec::new(),
                    consumed: buf.len() as u64,
                    skipping: true,
                });
            }
            // 미완결 조각: 다음 폴링에서 다시 읽음
            return Ok(ReadChunk {
                lines: Vec::new(),
                consumed: start as u64,
                skipping: false,
            });
        };

        let complete = &rest[..=last_newline];
        let lines = complete
            .split(|&b| b == b'\n')
            .map(|raw| String::from_utf8_lossy(raw).trim_end_matches('\r').to_owned())
            .filter(|line| !line.trim().is_empty())
            .collect();

        Ok(ReadChunk {
            lines,
            consumed: (start + complete.len()) as u64,
            skipping: false,
        })
    }
}
