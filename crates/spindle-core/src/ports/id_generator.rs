//! IdGenerator port - ID 生成の抽象化
//!
//! テスト容易性のために、trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース

use crate::domain::ids::{ArtifactId, ContextId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator はコンテキストと artifact の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（dispatch は複数スレッドから呼ばれうる）
pub trait IdGenerator: Send + Sync {
    fn generate_context_id(&self) -> ContextId;

    fn generate_artifact_id(&self) -> ArtifactId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_context_id(&self) -> ContextId {
        ContextId::from(self.next_ulid())
    }

    fn generate_artifact_id(&self) -> ArtifactId {
        ArtifactId::from(self.next_ulid())
    }
}
