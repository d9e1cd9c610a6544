//! spindle-core
//!
//! 関数と引数を隔離コンテキストに投げ、その戻り値を future で受け取るランタイム。
//!
//! ```ignore
//! let spindle = Spindle::new();
//! let sum = spindle.dispatch(Callable::script("(a, b) => a + b"), (1, 2)).await?;
//! ```
//!
//! # callable の 2 つの形
//! - **Native**: Rust のクロージャ / `TaskFn`。専用スレッド上の current-thread
//!   tokio runtime で実行されます
//! - **Script**: 関数式のソーステキスト。fragment プログラムに描画して artifact として
//!   保存し、専用スレッド上の boa（JavaScript エンジン）で実行されます
//!
//! どちらも 1 回の dispatch ごとに新しいコンテキスト（OS スレッド）を作り、
//! 引数と戻り値は JSON の値としてコピーされます。コンテキスト間で共有される状態はありません。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, name, errors, events）
//! - **ports**: 抽象化レイヤー（ArtifactStore, IdGenerator, Clock）
//! - **impls**: ports の実装（InMemoryArtifactStore, FileArtifactStore）
//! - **typed**: ネイティブ callable（TaskFn, IntoFunction, IntoArgs, Scope）
//! - **script**: boa（JavaScript エンジン）で fragment を実行する `Interpreter` と組み込み関数
//! - **materialize**: callable → fragment 変換（束縛名の選択と描画）
//! - **app**: Spindle, SpindleBuilder, 隔離コンテキスト, registry

pub mod app;
pub mod domain;
pub mod impls;
pub mod materialize;
pub mod ports;
pub mod script;
pub mod typed;

pub use self::app::{
    BuildError, ConfigError, DispatchHandle, RuntimeStatus, Spindle, SpindleBuilder,
    SpindleConfig,
};
pub use self::domain::{ErrorKind, FaultCause, FaultKind, SpindleError, TaskError};
pub use self::materialize::{Callable, Target};
pub use self::ports::ProvisionStrategy;
pub use self::typed::{IntoArgs, Scope, TaskFn};
