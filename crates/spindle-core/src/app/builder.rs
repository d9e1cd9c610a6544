//! SpindleBuilder - ランタイムの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `function()` で起動時に登録する関数を追加
//! - `expect_functions()` で期待される関数名を設定
//! - `build()` 時に「期待集合 ⊆ 登録予定の集合」をチェックし、不足があれば
//!   `BuildError::MissingFunctions` を返す（artifact を作る前に検出する）

use std::sync::Arc;

use super::config::{ConfigError, SpindleConfig};
use super::runtime::Spindle;
use crate::domain::errors::{ArtifactError, SpindleError};
use crate::impls::{FileArtifactStore, InMemoryArtifactStore};
use crate::materialize::Callable;
use crate::ports::{ArtifactStore, IdGenerator, ProvisionStrategy, SystemClock, UlidGenerator};

/// SpindleBuilder は Spindle を構築
///
/// # 使用例
/// ```ignore
/// let spindle = Spindle::builder()
///     .config(SpindleConfig::from_path("spindle.json")?)
///     .function("add", Callable::function(|a: i64, b: i64| a + b))
///     .function("greet", Callable::script("(name) => 'hello ' + name"))
///     .expect_functions(&["add", "greet"])
///     .build()?;
/// ```
pub struct SpindleBuilder {
    config: SpindleConfig,
    store: Option<Arc<dyn ArtifactStore>>,
    ids: Option<Arc<dyn IdGenerator>>,
    functions: Vec<(String, Callable)>,
    expected_functions: Option<Vec<String>>,
}

/// BuildError は Spindle 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing functions: {0:?}. These functions were expected but not registered.")]
    MissingFunctions(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot create artifact store: {0}")]
    ArtifactStore(#[from] ArtifactError),

    #[error("cannot register function {name:?}: {source}")]
    Register {
        name: String,
        #[source]
        source: SpindleError,
    },
}

impl SpindleBuilder {
    pub fn new() -> Self {
        Self {
            config: SpindleConfig::default(),
            store: None,
            ids: None,
            functions: Vec::new(),
            expected_functions: None,
        }
    }

    pub fn config(mut self, config: SpindleConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `store` instead of the one selected by `config.provisioning`.
    pub fn artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Registers `callable` under `name` when the runtime is built.
    pub fn function(mut self, name: impl Into<String>, callable: Callable) -> Self {
        self.functions.push((name.into(), callable));
        self
    }

    /// 期待される関数名のリストを設定
    pub fn expect_functions(mut self, names: &[&str]) -> Self {
        self.expected_functions = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    /// Validates the configuration and builds the runtime.
    ///
    /// # 検証
    /// - 設定値（`SpindleConfig::validate`）
    /// - expect_functions() の名前が全て function() で追加されているか
    /// - 各関数の materialize（InvalidName / InvalidCallable は `BuildError::Register`）
    pub fn build(self) -> Result<Spindle, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_functions {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.functions.iter().any(|(registered, _)| registered == *name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingFunctions(missing));
            }
        }

        let store = match self.store {
            Some(store) => store,
            None => default_store(&self.config)?,
        };
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));

        let spindle = Spindle::assemble(self.config, store, ids);
        for (name, callable) in self.functions {
            spindle
                .register(&name, callable)
                .map_err(|source| BuildError::Register { name, source })?;
        }
        Ok(spindle)
    }
}

impl Default for SpindleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_store(config: &SpindleConfig) -> Result<Arc<dyn ArtifactStore>, ArtifactError> {
    let store: Arc<dyn ArtifactStore> = match (config.provisioning, &config.artifact_dir) {
        (ProvisionStrategy::InMemory, _) => Arc::new(InMemoryArtifactStore::new()),
        (ProvisionStrategy::TempFile, Some(dir)) => Arc::new(FileArtifactStore::in_dir(dir)?),
        (ProvisionStrategy::TempFile, None) => Arc::new(FileArtifactStore::temporary()?),
    };
    Ok(store)
}
