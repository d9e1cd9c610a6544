//! ArtifactStore port - fragment ソースの置き場所
//!
//! 隔離コンテキストはソーステキストから組み立てられます。そのテキストを
//! どこ経由で渡すかがこの port です。
//!
//! - `InMemoryArtifactStore`: プロセス内メモリ（eval チャネル相当）
//! - `FileArtifactStore`: 一時ディレクトリ上のファイル
//!
//! どちらを使っても dispatch の振る舞いは変わりません。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::errors::ArtifactError;
use crate::domain::ids::ArtifactId;

/// ソースの受け渡し方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStrategy {
    #[default]
    InMemory,
    TempFile,
}

/// 保存済み artifact への参照
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactHandle {
    id: ArtifactId,
    path: Option<PathBuf>,
}

impl ArtifactHandle {
    pub fn in_memory(id: ArtifactId) -> Self {
        Self { id, path: None }
    }

    pub fn on_disk(id: ArtifactId, path: PathBuf) -> Self {
        Self {
            id,
            path: Some(path),
        }
    }

    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// ArtifactStore は fragment のソースを保存・読み出し・削除する
///
/// 同期 API です。呼び出し元は dispatch 側（put）と隔離コンテキストの
/// スレッド（load）で、どちらも async ランタイムの外から呼ばれることがあります。
pub trait ArtifactStore: Send + Sync {
    fn put(&self, id: ArtifactId, source: &str) -> Result<ArtifactHandle, ArtifactError>;

    fn load(&self, handle: &ArtifactHandle) -> Result<String, ArtifactError>;

    fn delete(&self, handle: &ArtifactHandle) -> Result<(), ArtifactError>;

    /// まだ削除されていない artifact の数
    fn live(&self) -> usize;

    fn strategy(&self) -> ProvisionStrategy;
}

/// ArtifactGuard は artifact の所有権
///
/// 最後の所有者（`Arc<ArtifactGuard>` の最後の clone）が drop された時点で
/// artifact を削除します。1 回の dispatch 専用の artifact はコンテキストだけが、
/// registry の artifact は registry エントリと実行中のコンテキストが所有します。
pub struct ArtifactGuard {
    handle: ArtifactHandle,
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactGuard {
    pub fn new(handle: ArtifactHandle, store: Arc<dyn ArtifactStore>) -> Self {
        Self { handle, store }
    }

    /// ソースを書き込み、その所有権を返す
    pub fn put(
        store: &Arc<dyn ArtifactStore>,
        id: ArtifactId,
        source: &str,
    ) -> Result<Self, ArtifactError> {
        let handle = store.put(id, source)?;
        Ok(Self::new(handle, Arc::clone(store)))
    }

    pub fn handle(&self) -> &ArtifactHandle {
        &self.handle
    }

    pub fn load(&self) -> Result<String, ArtifactError> {
        self.store.load(&self.handle)
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        match self.store.delete(&self.handle) {
            Ok(()) => tracing::trace!(artifact = %self.handle.id(), "artifact reclaimed"),
            Err(err) => tracing::warn!(artifact = %self.handle.id(), error = %err, "failed to reclaim artifact"),
        }
    }
}

impl std::fmt::Debug for ArtifactGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactGuard")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
