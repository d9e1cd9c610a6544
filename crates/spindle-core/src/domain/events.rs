//! Events - 隔離コンテキストから観測される終端イベント
//!
//! 1 つのコンテキストが出しうるイベントは次の 3 種類で、
//! 最初に届いたものだけが DispatchHandle の結果を決めます。
//! 2 つ目以降は無視されます。

use serde_json::Value;

use super::errors::{FaultCause, SpindleError};

#[derive(Debug, Clone, PartialEq)]
pub enum ContextEvent {
    /// callable の戻り値（outbound メッセージ）
    Reply(Value),
    /// callable の失敗、またはコンテキストの起動失敗
    Fault(FaultCause),
    /// コンテキストの終了
    Exit(i32),
}

impl ContextEvent {
    /// イベントを dispatch の結果に変換
    ///
    /// `Exit(0)` が reply より先に届くのは、callable が値を返さずに
    /// 正常終了を要求した場合だけです。その場合は "no value"（`Null`）で解決します。
    pub fn into_settlement(self) -> Result<Value, SpindleError> {
        match self {
            Self::Reply(value) => Ok(value),
            Self::Fault(cause) => Err(SpindleError::WorkerFault(cause)),
            Self::Exit(0) => Ok(Value::Null),
            Self::Exit(code) => Err(SpindleError::AbnormalExit(code)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Reply(_) => "reply",
            Self::Fault(_) => "fault",
            Self::Exit(_) => "exit",
        }
    }
}
