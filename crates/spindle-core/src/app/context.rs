//! Isolated Execution Context - fragment を専用スレッドで 1 回だけ実行する
//!
//! # ライフサイクル
//! 1. OS スレッドを起動（名前 `<thread_name>-<context id の末尾>`）
//! 2. fragment を組み立てる
//!    - Native: current-thread の tokio runtime + `LocalSet` を作る
//!    - Script: artifact からソースを読み込み（読んだ時点で所有権を手放す）、
//!      新しい boa の `Context` で評価する
//! 3. 引数リストを唯一のメッセージとして渡す
//! 4. 最初の終端イベント（reply / fault / exit）で DispatchHandle を settle
//!    （この時点で in-flight から外れる）
//! 5. runtime / インタプリタを drop してスレッドを終える（ここで live から外れる）
//!
//! 5 の時点で終わっていない detached タスクやタイマーは破棄されます（実行されない）。
//! キャンセル API はありません。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use serde_json::Value;
use tokio::task::LocalSet;

use super::config::SpindleConfig;
use super::handle::{DispatchHandle, Gauge, Settler};
use crate::domain::errors::{FaultCause, TaskError};
use crate::domain::events::ContextEvent;
use crate::domain::ids::ContextId;
use crate::ports::ArtifactGuard;
use crate::script::{Interpreter, Termination};
use crate::typed::{DynFunction, Scope};

/// What a context runs. Cheap to clone (shared ownership).
#[derive(Clone)]
pub(crate) enum Payload {
    Native(Arc<dyn DynFunction>),
    /// Rendered fragment program stored in the artifact store.
    Script(Arc<ArtifactGuard>),
}

impl Payload {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Native(_) => "native",
            Self::Script(_) => "script",
        }
    }
}

/// Per-context settings taken from `SpindleConfig`.
#[derive(Debug, Clone)]
pub(crate) struct ContextSettings {
    thread_name: String,
    stack_size: usize,
    max_call_depth: usize,
}

impl ContextSettings {
    pub(crate) fn from_config(config: &SpindleConfig) -> Self {
        Self {
            thread_name: config.thread_name.clone(),
            stack_size: config.stack_size,
            max_call_depth: config.max_call_depth,
        }
    }
}

/// Dispatches without a result yet, and context threads not yet torn down.
#[derive(Debug, Clone, Default)]
pub(crate) struct ContextCounters {
    in_flight: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl ContextCounters {
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Provisions an isolated context for one dispatch and sends it `args`.
///
/// Never fails synchronously: if the OS thread cannot be spawned the returned
/// handle is already settled with `WorkerFault(Startup)`.
pub(crate) fn launch(
    context_id: ContextId,
    payload: Payload,
    args: Vec<Value>,
    settings: &ContextSettings,
    counters: &ContextCounters,
) -> DispatchHandle {
    // live は in_flight より先に数え始め、後に外れる
    let live = Gauge::enter(&counters.live);
    let (settler, handle) = Settler::channel(context_id, &counters.in_flight);
    let settler = Arc::new(settler);

    tracing::debug!(context = %context_id, kind = payload.kind(), args = args.len(), "launching context");

    let thread_settler = Arc::clone(&settler);
    let max_call_depth = settings.max_call_depth;
    let spawned = thread::Builder::new()
        .name(format!("{}-{}", settings.thread_name, context_id.short()))
        .stack_size(settings.stack_size)
        .spawn(move || {
            let _live = live;
            let span = tracing::debug_span!("context", id = %context_id);
            let _entered = span.enter();

            let event = panic::catch_unwind(AssertUnwindSafe(|| {
                run(context_id, payload, args, &thread_settler, max_call_depth)
            }))
            .unwrap_or_else(|payload| {
                ContextEvent::Fault(FaultCause::panicked(panic_message(payload.as_ref())))
            });
            thread_settler.settle(event);
            tracing::debug!("context torn down");
        });

    if let Err(err) = spawned {
        tracing::warn!(context = %context_id, error = %err, "failed to spawn context thread");
        settler.settle(ContextEvent::Fault(FaultCause::startup(format!(
            "cannot spawn context thread: {err}"
        ))));
    }
    handle
}

/// Runs the fragment and returns the terminal event that follows a reply
/// (or replaces it when there was none).
fn run(
    context_id: ContextId,
    payload: Payload,
    args: Vec<Value>,
    settler: &Arc<Settler>,
    max_call_depth: usize,
) -> ContextEvent {
    match payload {
        Payload::Native(function) => run_native(context_id, function, args, settler),
        Payload::Script(artifact) => run_script(artifact, args, settler, max_call_depth),
    }
}

fn run_native(
    context_id: ContextId,
    function: Arc<dyn DynFunction>,
    args: Vec<Value>,
    settler: &Settler,
) -> ContextEvent {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            return ContextEvent::Fault(FaultCause::startup(format!(
                "cannot build context runtime: {err}"
            )));
        }
    };
    let local = LocalSet::new();
    let scope = Scope::new(context_id);

    tracing::trace!(function = function.label(), "invoking native function");
    let result = local.block_on(&runtime, function.invoke(scope.clone(), args));

    let event = match result {
        Ok(value) => {
            settler.settle(ContextEvent::Reply(value));
            ContextEvent::Exit(0)
        }
        Err(TaskError::Exit(code)) => ContextEvent::Exit(code),
        Err(err) => ContextEvent::Fault(FaultCause::raised(err.to_string())),
    };

    let pending = scope.unfinished();
    if pending > 0 {
        tracing::debug!(pending, "abandoning detached work");
    }
    // LocalSet と runtime を drop すると、残っているタスクは実行されずに破棄される
    drop(local);
    drop(runtime);
    event
}

fn run_script(
    artifact: Arc<ArtifactGuard>,
    args: Vec<Value>,
    settler: &Arc<Settler>,
    max_call_depth: usize,
) -> ContextEvent {
    let source = artifact.load();
    // 1 回限りの artifact はここで削除される（registry の artifact は残る）
    drop(artifact);
    let source = match source {
        Ok(source) => source,
        Err(err) => {
            return ContextEvent::Fault(FaultCause::startup(format!(
                "cannot load fragment: {err}"
            )));
        }
    };
    let mut interpreter = match Interpreter::new(max_call_depth, Box::new(Arc::clone(settler))) {
        Ok(interpreter) => interpreter,
        Err(err) => return ContextEvent::Fault(FaultCause::startup(err.to_string())),
    };
    let termination = match interpreter.run(&source) {
        Ok(Termination::Completed) => match interpreter.deliver(&Value::Array(args)) {
            Some(termination) => termination,
            None => {
                return ContextEvent::Fault(FaultCause::startup(
                    "fragment installed no message handler",
                ));
            }
        },
        Ok(early) => early,
        Err(err) => return ContextEvent::Fault(FaultCause::startup(err.to_string())),
    };

    let pending = interpreter.pending_timers();
    if pending > 0 {
        tracing::debug!(pending, "abandoning scheduled timers");
    }
    match termination {
        Termination::Completed => ContextEvent::Exit(0),
        Termination::Exited(code) => ContextEvent::Exit(code),
        Termination::Threw(message) => ContextEvent::Fault(FaultCause::raised(message)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::errors::{FaultKind, SpindleError};
    use crate::domain::ids::ArtifactId;
    use crate::impls::InMemoryArtifactStore;
    use crate::materialize::{Callable, Fragment, materialize};
    use crate::ports::ArtifactStore;
    use serde_json::json;
    use ulid::Ulid;

    fn settings() -> ContextSettings {
        ContextSettings::from_config(&SpindleConfig::default())
    }

    fn native(callable: Callable) -> Payload {
        match materialize(&callable).unwrap() {
            Fragment::Native(function) => Payload::Native(function),
            Fragment::Script(_) => panic!("expected native"),
        }
    }

    fn script(store: &Arc<dyn ArtifactStore>, source: &str) -> Payload {
        let Fragment::Script(fragment) = materialize(&Callable::script(source)).unwrap() else {
            panic!("expected script");
        };
        let id = ArtifactId::from_ulid(Ulid::new());
        Payload::Script(Arc::new(ArtifactGuard::put(store, id, fragment.program()).unwrap()))
    }

    async fn run_to_end(payload: Payload, args: Value) -> Result<Value, SpindleError> {
        let Value::Array(args) = args else {
            panic!("args must be a list");
        };
        let handle = launch(
            ContextId::from_ulid(Ulid::new()),
            payload,
            args,
            &settings(),
            &ContextCounters::default(),
        );
        handle.await
    }

    #[tokio::test]
    async fn native_reply() {
        let payload = native(Callable::function(|a: i64, b: i64| a + b));
        assert_eq!(run_to_end(payload, json!([1, 2])).await.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn native_panic_is_a_panicked_fault() {
        let payload = native(Callable::function(|a: i64| -> i64 {
            if a > 0 {
                panic!("refusing {a}");
            }
            a
        }));
        let err = run_to_end(payload, json!([1])).await.unwrap_err();
        let cause = err.fault().unwrap();
        assert_eq!(cause.kind, FaultKind::Panicked);
        assert_eq!(cause.message, "refusing 1");
    }

    #[tokio::test]
    async fn script_reply_and_transient_artifact_release() {
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryArtifactStore::new());
        let payload = script(&store, "(a, b, c, d) => a + b + c + d");
        assert_eq!(store.live(), 1);

        let value = run_to_end(payload, json!([1, 2, 3, 4])).await.unwrap();
        assert_eq!(value, json!(10));
        assert_eq!(store.live(), 0);
    }

    #[tokio::test]
    async fn shared_artifact_outlives_the_context() {
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryArtifactStore::new());
        let payload = script(&store, "(a) => a");
        let kept = payload.clone();

        run_to_end(payload, json!([5])).await.unwrap();
        assert_eq!(store.live(), 1);
        drop(kept);
        assert_eq!(store.live(), 0);
    }

    #[tokio::test]
    async fn missing_artifact_is_a_startup_fault() {
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryArtifactStore::new());
        let payload = script(&store, "(a) => a");
        if let Payload::Script(guard) = &payload {
            store.delete(guard.handle()).unwrap();
        }

        let err = run_to_end(payload, json!([1])).await.unwrap_err();
        assert_eq!(err.fault().unwrap().kind, FaultKind::Startup);
    }

    #[tokio::test]
    async fn in_flight_is_zero_once_the_result_is_visible() {
        let counters = ContextCounters::default();
        let payload = native(Callable::function(|ms: u64| {
            thread::sleep(Duration::from_millis(ms));
        }));
        let handle = launch(
            ContextId::from_ulid(Ulid::new()),
            payload,
            vec![json!(50)],
            &settings(),
            &counters,
        );
        assert_eq!(counters.in_flight(), 1);
        handle.await.unwrap();
        assert_eq!(counters.in_flight(), 0);

        // スレッドの後片付けは結果の後なので live はしばらく残りうる
        for _ in 0..100 {
            if counters.live() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(counters.live(), 0);
    }

    #[tokio::test]
    async fn script_without_handler_is_a_startup_fault() {
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryArtifactStore::new());
        let id = ArtifactId::from_ulid(Ulid::new());
        let payload = Payload::Script(Arc::new(
            ArtifactGuard::put(&store, id, "const quiet = 1;").unwrap(),
        ));
        let err = run_to_end(payload, json!([])).await.unwrap_err();
        let cause = err.fault().unwrap();
        assert_eq!(cause.kind, FaultKind::Startup);
        assert!(cause.message.contains("no message handler"), "{}", cause.message);
    }

    #[test]
    fn panic_messages() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42), "unknown panic");
    }
}
