//! Errors - エラー型と分類
//!
//! - **SpindleError**: 呼び出し側に返るエラー（dispatch / register / unregister）
//! - **TaskError**: ネイティブ関数が隔離コンテキスト内で返すエラー
//! - **ArtifactError**: fragment のソースを保存する ArtifactStore のエラー
//!
//! リトライは行いません。必要なら呼び出し側が新しく dispatch します。

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::ids::ArtifactId;

/// ErrorKind は SpindleError の分類
///
/// - Caller: 呼び出し側の入力が不正（callable でない、名前が空、未登録）
/// - Worker: 隔離コンテキストの実行結果としてのエラー
/// - Infrastructure: artifact の保存などホスト側の障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Caller,
    Worker,
    Infrastructure,
}

/// FaultKind は WorkerFault の原因の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// callable がエラーを返した / throw した
    Raised,
    /// ネイティブ callable が panic した
    Panicked,
    /// コンテキスト自体の起動に失敗した
    Startup,
}

/// WorkerFault が運ぶ元の原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultCause {
    pub kind: FaultKind,
    pub message: String,
}

impl FaultCause {
    pub fn raised(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Raised,
            message: message.into(),
        }
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Panicked,
            message: message.into(),
        }
    }

    pub fn startup(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Startup,
            message: message.into(),
        }
    }
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FaultKind::Raised => write!(f, "{}", self.message),
            FaultKind::Panicked => write!(f, "panicked: {}", self.message),
            FaultKind::Startup => write!(f, "context failed to start: {}", self.message),
        }
    }
}

impl std::error::Error for FaultCause {}

#[derive(Debug, Error)]
pub enum SpindleError {
    #[error("target is not callable: {0}")]
    InvalidCallable(String),

    #[error("invalid function name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("no function registered under {0:?}")]
    UnregisteredFunction(String),

    #[error("worker fault: {0}")]
    WorkerFault(#[source] FaultCause),

    #[error("worker stopped with exit code {0}")]
    AbnormalExit(i32),

    #[error("arguments cannot be transferred: {0}")]
    Untransferable(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl SpindleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCallable(_)
            | Self::InvalidName { .. }
            | Self::UnregisteredFunction(_)
            | Self::Untransferable(_) => ErrorKind::Caller,
            Self::WorkerFault(_) | Self::AbnormalExit(_) => ErrorKind::Worker,
            Self::Artifact(_) => ErrorKind::Infrastructure,
        }
    }

    /// WorkerFault の場合はその原因を返す
    pub fn fault(&self) -> Option<&FaultCause> {
        match self {
            Self::WorkerFault(cause) => Some(cause),
            _ => None,
        }
    }
}

/// ネイティブ callable が返すエラー
///
/// `Exit` 以外はすべて呼び出し側で `SpindleError::WorkerFault` になります。
/// `Exit(code)` はコンテキストの終了コードとして扱われます。
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("argument {position}: {message}")]
    InvalidArgument { position: usize, message: String },

    #[error("result cannot be transferred: {0}")]
    Untransferable(String),

    #[error("exit requested with code {0}")]
    Exit(i32),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact {0} not found")]
    NotFound(ArtifactId),

    #[error("artifact io at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
