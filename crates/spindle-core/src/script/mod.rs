//! Fragment script engine.
//!
//! script callable は boa（JavaScript エンジン）で実行します。コンテキストごとに
//! 新しい `boa_engine::Context` を作るので、グローバルは dispatch 間で共有されません。
//! fragment は次の形に描画されます:
//!
//! ```text
//! const __spindle_task = (a, b) => a + b
//! ;
//! onmessage((message) => postMessage(__spindle_task(...message)));
//! ```
//!
//! - `engine`: `Interpreter`（fragment の評価と、メッセージの配達）
//! - `builtins`: `onmessage`, `postMessage`, `exit`, `log`, `sleep`, `setTimeout`, `clearTimeout`
//!
//! 値は JSON として境界を越えます。入力は `JsValue::from_json`、出力は
//! `JSON.stringify` を通すので `undefined` と `NaN` は `null` になります。

mod builtins;
mod engine;

use serde_json::Value;

pub use engine::{Interpreter, Termination};

/// Outbound side of the context's message channel (`postMessage`).
pub trait Outbound {
    fn post(&self, message: Value);
}

/// The fragment could not be set up in a fresh context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("cannot install globals: {0}")]
    Globals(String),
    #[error("fragment does not parse: {0}")]
    Syntax(String),
}
