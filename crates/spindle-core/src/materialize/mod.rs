//! Function Materializer - callable を隔離コンテキストで実行できる fragment に変換
//!
//! # callable の 2 つの形
//! - **Native**: Rust のクロージャ / `TaskFn`。型消去した `Arc<dyn DynFunction>` を
//!   そのままコンテキストへ渡す（ソーステキストは存在しないので artifact も作らない）
//! - **Script**: 関数式のソーステキスト。構文を検査し、衝突しない束縛名を選んで
//!   メッセージチャネルに配線した fragment プログラムを描画する
//!
//! 関数でない入力（`"1"` など）や入れ子の深すぎる入力は
//! `SpindleError::InvalidCallable` になります。

pub mod binding;
pub mod shape;

use std::fmt;
use std::sync::Arc;

use crate::domain::errors::SpindleError;
use crate::typed::{DynFunction, IntoFunction};

/// Something that can be dispatched or registered.
#[derive(Clone)]
pub enum Callable {
    Native(Arc<dyn DynFunction>),
    Script(Arc<str>),
}

impl Callable {
    /// Native callable: a closure taking up to eight deserializable arguments,
    /// or a `TaskFn`.
    ///
    /// ```ignore
    /// let add = Callable::function(|a: i64, b: i64| a + b);
    /// ```
    pub fn function<M>(f: impl IntoFunction<M>) -> Self {
        Self::Native(f.into_function())
    }

    /// Script callable given as function-expression source text.
    ///
    /// ```ignore
    /// let add = Callable::script("(a, b) => a + b");
    /// ```
    pub fn script(source: impl Into<String>) -> Self {
        Self::Script(Arc::from(source.into()))
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(function) => f.debug_tuple("Native").field(&function.label()).finish(),
            Self::Script(source) => f.debug_tuple("Script").field(source).finish(),
        }
    }
}

/// Dispatch target: a callable, or the name of a registered function.
#[derive(Debug, Clone)]
pub enum Target {
    Callable(Callable),
    Named(String),
}

impl From<Callable> for Target {
    fn from(callable: Callable) -> Self {
        Self::Callable(callable)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

/// Self-contained unit a context can run.
#[derive(Clone)]
pub enum Fragment {
    Native(Arc<dyn DynFunction>),
    Script(ScriptFragment),
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(function) => f.debug_tuple("Native").field(&function.label()).finish(),
            Self::Script(fragment) => f.debug_tuple("Script").field(fragment).finish(),
        }
    }
}

/// A rendered fragment program. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFragment {
    binding: String,
    program: Arc<str>,
}

impl ScriptFragment {
    pub fn binding(&self) -> &str {
        &self.binding
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

/// Converts a callable into a fragment.
///
/// Script sources must consist of exactly one function expression (arrow
/// function or `function` expression), optionally followed by `;`.
pub fn materialize(callable: &Callable) -> Result<Fragment, SpindleError> {
    match callable {
        Callable::Native(function) => Ok(Fragment::Native(Arc::clone(function))),
        Callable::Script(source) => materialize_script(source).map(Fragment::Script),
    }
}

fn materialize_script(source: &str) -> Result<ScriptFragment, SpindleError> {
    shape::check_function_expression(source)
        .map_err(|err| SpindleError::InvalidCallable(format!("{}: {err}", excerpt(source))))?;
    let binding = binding::choose_binding(source);
    let program = binding::render(&binding, source);
    Ok(ScriptFragment {
        binding,
        program: Arc::from(program),
    })
}

const EXCERPT_CHARS: usize = 40;

fn excerpt(source: &str) -> String {
    let trimmed = source.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return format!("`{trimmed}`");
    }
    let head: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    format!("`{head}...`")
}
