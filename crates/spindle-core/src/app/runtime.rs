//! Spindle - dispatch と named registry の表面
//!
//! # dispatch の流れ
//! 1. target を解決（callable なら materialize、名前なら registry を引く）
//! 2. 引数を JSON の値リストに変換（失敗したら `Untransferable`）
//! 3. script なら fragment を artifact として書き込む（1 回限りの所有権）
//! 4. 隔離コンテキストを起動して DispatchHandle を返す
//!
//! 1〜3 の失敗は同期的に返ります。コンテキストが起動した後の失敗は
//! すべて DispatchHandle の結果として届きます。

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use super::builder::SpindleBuilder;
use super::config::SpindleConfig;
use super::context::{self, ContextCounters, ContextSettings, Payload};
use super::handle::DispatchHandle;
use super::registry::FunctionRegistry;
use super::status::RuntimeStatus;
use crate::domain::errors::SpindleError;
use crate::domain::name::FunctionName;
use crate::impls::InMemoryArtifactStore;
use crate::materialize::{Callable, Fragment, Target, materialize};
use crate::ports::{ArtifactGuard, ArtifactStore, IdGenerator, SystemClock, UlidGenerator};
use crate::typed::IntoArgs;

/// Spindle はコンテキストの起動と関数の登録を担う
///
/// `Send + Sync` なので `Arc<Spindle>` にして複数のタスクから使えます。
/// drop すると registry を空にします（実行中のコンテキストはそのまま完走する）。
///
/// # 使用例
/// ```ignore
/// let spindle = Spindle::new();
///
/// let sum = spindle.dispatch(Callable::script("(a, b) => a + b"), (1, 2)).await?;
/// assert_eq!(sum, json!(3));
///
/// spindle.register("add", Callable::function(|a: i64, b: i64| a + b))?;
/// let sum = spindle.dispatch("add", (1, 2)).await?;
/// ```
pub struct Spindle {
    config: SpindleConfig,
    settings: ContextSettings,
    store: Arc<dyn ArtifactStore>,
    ids: Arc<dyn IdGenerator>,
    registry: FunctionRegistry,
    counters: ContextCounters,
}

impl Spindle {
    /// デフォルト設定（in-memory provisioning）の Spindle
    pub fn new() -> Self {
        Self::assemble(
            SpindleConfig::default(),
            Arc::new(InMemoryArtifactStore::new()),
            Arc::new(UlidGenerator::new(SystemClock)),
        )
    }

    pub fn builder() -> SpindleBuilder {
        SpindleBuilder::new()
    }

    pub(crate) fn assemble(
        config: SpindleConfig,
        store: Arc<dyn ArtifactStore>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        tracing::debug!(provisioning = ?store.strategy(), thread_name = %config.thread_name, "spindle ready");
        Self {
            settings: ContextSettings::from_config(&config),
            config,
            store,
            ids,
            registry: FunctionRegistry::new(),
            counters: ContextCounters::default(),
        }
    }

    pub fn config(&self) -> &SpindleConfig {
        &self.config
    }

    /// Starts `target` in a fresh isolated context.
    ///
    /// The context is running when this returns; the handle only observes it.
    pub fn spawn(
        &self,
        target: impl Into<Target>,
        args: impl IntoArgs,
    ) -> Result<DispatchHandle, SpindleError> {
        let payload = match target.into() {
            Target::Callable(callable) => self.provision(materialize(&callable)?)?,
            Target::Named(name) => self
                .registry
                .resolve(&name)
                .ok_or(SpindleError::UnregisteredFunction(name))?,
        };
        // 失敗時は payload の drop で artifact も消える
        let args = args
            .into_args()
            .map_err(|err| SpindleError::Untransferable(err.to_string()))?;

        let context_id = self.ids.generate_context_id();
        Ok(context::launch(
            context_id,
            payload,
            args,
            &self.settings,
            &self.counters,
        ))
    }

    /// Runs `target` with `args` in its own context and resolves with its
    /// return value.
    ///
    /// The context starts immediately, before the returned future is polled.
    /// Each call gets a new context; nothing is shared between calls.
    pub fn dispatch(
        &self,
        target: impl Into<Target>,
        args: impl IntoArgs,
    ) -> impl Future<Output = Result<Value, SpindleError>> + Send + 'static {
        let handle = self.spawn(target, args);
        async move { handle?.await }
    }

    /// Registers `callable` under `name`, replacing any previous entry.
    ///
    /// Dispatches already running with the old entry are not affected.
    pub fn register(&self, name: &str, callable: Callable) -> Result<(), SpindleError> {
        let name = FunctionName::parse(name)?;
        let payload = self.provision(materialize(&callable)?)?;
        let kind = payload.kind();
        match self.registry.insert(name.clone(), payload) {
            Some(previous) => {
                tracing::info!(function = %previous.name(), kind, "replaced registered function")
            }
            None => tracing::debug!(function = %name, kind, "registered function"),
        }
        Ok(())
    }

    /// Removes `name` from the registry. Removing an absent name is a no-op.
    pub fn unregister(&self, name: &str) -> Result<(), SpindleError> {
        let name = FunctionName::parse(name)?;
        if let Some(entry) = self.registry.remove(&name) {
            tracing::debug!(function = %entry.name(), "unregistered function");
        }
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// 登録済みの名前（ソート済み）
    pub fn registered_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            in_flight: self.counters.in_flight(),
            live_contexts: self.counters.live(),
            registered: self.registry.len(),
            live_artifacts: self.store.live(),
            provisioning: self.store.strategy(),
        }
    }

    /// Clears the registry. Running contexts are left to finish on their own.
    pub fn shutdown(&self) {
        let released = self.registry.clear();
        if released > 0 {
            tracing::info!(released, "registry cleared");
        }
    }

    fn provision(&self, fragment: Fragment) -> Result<Payload, SpindleError> {
        match fragment {
            Fragment::Native(function) => Ok(Payload::Native(function)),
            Fragment::Script(fragment) => {
                let id = self.ids.generate_artifact_id();
                let guard = ArtifactGuard::put(&self.store, id, fragment.program())?;
                tracing::trace!(artifact = %id, binding = fragment.binding(), "fragment provisioned");
                Ok(Payload::Script(Arc::new(guard)))
            }
        }
    }
}

impl Default for Spindle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Spindle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
