//! Typed - ネイティブ callable の型付き API
//!
//! # 二層構造
//! - **表層（Typed）**: クロージャ、`TaskFn` trait、`IntoArgs` - 型安全
//! - **内部（Dyn）**: `DynFunction` trait - object-safe、`serde_json::Value` でやり取り
//!
//! 型消去は materialize の時点で行われ、`Arc<dyn DynFunction>` がコンテキストの
//! スレッドへ渡されます。

pub mod args;
pub(crate) mod codec;
pub mod function;
pub mod scope;

pub use self::args::IntoArgs;
pub use self::function::{DynFunction, IntoFunction, TaskFn, TypedFunction};
pub use self::scope::Scope;
