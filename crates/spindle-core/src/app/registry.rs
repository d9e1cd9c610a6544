//! FunctionRegistry - 名前 → 準備済み fragment の表
//!
//! # 実装詳細
//! - `RwLock<HashMap<FunctionName, Arc<RegistryEntry>>>`
//! - 同じ名前への register は最後の書き込みが勝つ（置き換えた古いエントリは破棄）
//! - エントリが所有する artifact は `Arc<ArtifactGuard>` で、実行中のコンテキストと
//!   共有される。unregister 直後でも、すでに起動したコンテキストは読み込みを終えられる
//! - `clear()` は Spindle の shutdown / drop から呼ばれる

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::context::Payload;
use crate::domain::name::FunctionName;

pub(crate) struct RegistryEntry {
    name: FunctionName,
    payload: Payload,
}

impl RegistryEntry {
    pub(crate) fn name(&self) -> &FunctionName {
        &self.name
    }
}

#[derive(Default)]
pub(crate) struct FunctionRegistry {
    entries: RwLock<HashMap<FunctionName, Arc<RegistryEntry>>>,
}

impl FunctionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `payload` under `name`, returning the entry it replaced.
    pub(crate) fn insert(&self, name: FunctionName, payload: Payload) -> Option<Arc<RegistryEntry>> {
        let entry = Arc::new(RegistryEntry {
            name: name.clone(),
            payload,
        });
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, entry)
    }

    pub(crate) fn remove(&self, name: &FunctionName) -> Option<Arc<RegistryEntry>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<Payload> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|entry| entry.payload.clone())
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .map(|name| name.as_str().to_string())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Removes every entry and returns how many there were.
    pub(crate) fn clear(&self) -> usize {
        let drained: Vec<_> = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        // artifact の削除はロックの外で行う
        let count = drained.len();
        drop(drained);
        count
    }
}
