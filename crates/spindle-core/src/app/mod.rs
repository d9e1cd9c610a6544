//! App - アプリケーション層
//!
//! ports と materialize / script / typed を組み合わせて dispatch を実装します。
//!
//! # 主要コンポーネント
//! - **SpindleBuilder**: 設定と起動時登録のワイヤリング
//! - **Spindle**: dispatch / register / unregister の表面
//! - **context**: 1 回の dispatch 専用の隔離コンテキスト（専用スレッド）
//! - **DispatchHandle**: 結果を 1 回だけ受け取る future
//! - **FunctionRegistry**: 名前付き関数の表

pub mod builder;
pub mod config;
pub(crate) mod context;
pub mod handle;
pub(crate) mod registry;
pub mod runtime;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, SpindleBuilder};
pub use self::config::{ConfigError, SpindleConfig};
pub use self::handle::DispatchHandle;
pub use self::runtime::Spindle;
pub use self::status::RuntimeStatus;
