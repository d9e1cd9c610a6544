//! InMemoryArtifactStore - プロセス内メモリに fragment ソースを置く
//!
//! ファイルを作らずにソースを直接コンテキストへ渡す方式（eval チャネル相当）。
//! デフォルトの ProvisionStrategy です。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::errors::ArtifactError;
use crate::domain::ids::ArtifactId;
use crate::ports::{ArtifactHandle, ArtifactStore, ProvisionStrategy};

/// InMemoryArtifactStore は fragment ソースを HashMap に保持
///
/// # 実装詳細
/// - HashMap<ArtifactId, Arc<str>> を Mutex で排他制御
/// - ロックは put/load/delete の中で完結（ロックを跨いだ処理はしない）
#[derive(Default)]
pub struct InMemoryArtifactStore {
    sources: Mutex<HashMap<ArtifactId, Arc<str>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(&self, id: ArtifactId, source: &str) -> Result<ArtifactHandle, ArtifactError> {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        sources.insert(id, Arc::from(source));
        Ok(ArtifactHandle::in_memory(id))
    }

    fn load(&self, handle: &ArtifactHandle) -> Result<String, ArtifactError> {
        let sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        sources
            .get(&handle.id())
            .map(|source| source.to_string())
            .ok_or(ArtifactError::NotFound(handle.id()))
    }

    fn delete(&self, handle: &ArtifactHandle) -> Result<(), ArtifactError> {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        sources
            .remove(&handle.id())
            .map(|_| ())
            .ok_or(ArtifactError::NotFound(handle.id()))
    }

    fn live(&self) -> usize {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn strategy(&self) -> ProvisionStrategy {
        ProvisionStrategy::InMemory
    }
}
