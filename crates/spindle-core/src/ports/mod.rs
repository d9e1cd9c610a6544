//! Ports - 抽象化レイヤー
//!
//! 時刻・ID 生成・fragment ソースの保存先を trait として切り出します。
//! 実装は `impls` にあります。

pub mod artifact_store;
pub mod clock;
pub mod id_generator;

pub use self::artifact_store::{ArtifactGuard, ArtifactHandle, ArtifactStore, ProvisionStrategy};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
