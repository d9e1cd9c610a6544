//! DispatchHandle - 1 回の dispatch の結果を待つ future
//!
//! # Settle は 1 回だけ
//! コンテキストは `Settler` を通して終端イベント（reply / fault / exit）を送ります。
//! 最初のイベントが oneshot を消費し、それ以降のイベントは無視されます。
//! oneshot が結果なしで閉じた場合（コンテキストのスレッドが消えた）は
//! `WorkerFault(Startup)` として扱います。
//!
//! # in-flight の数え方
//! `Settler` は in-flight カウンタの `Gauge` を持ち、settle した時点（結果を送る前）で
//! 手放します。したがって handle の結果が見えた時点でカウンタは既に減っています。
//! スレッドがまだ後片付け中かどうかは別のカウンタ（live contexts）で数えます。

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::domain::errors::{FaultCause, SpindleError};
use crate::domain::events::ContextEvent;
use crate::domain::ids::ContextId;
use crate::script::Outbound;

type Settlement = Result<Value, SpindleError>;

/// Holds one unit of a shared counter until dropped.
pub(crate) struct Gauge(Arc<AtomicUsize>);

impl Gauge {
    pub(crate) fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for Gauge {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Pending {
    tx: oneshot::Sender<Settlement>,
    in_flight: Gauge,
}

/// Sending half: owned by the isolated context.
pub(crate) struct Settler {
    context_id: ContextId,
    tx: Mutex<Option<Pending>>,
}

impl Settler {
    /// Opens the dispatch and counts it in `in_flight` until it settles.
    pub(crate) fn channel(
        context_id: ContextId,
        in_flight: &Arc<AtomicUsize>,
    ) -> (Self, DispatchHandle) {
        let (tx, rx) = oneshot::channel();
        let settler = Self {
            context_id,
            tx: Mutex::new(Some(Pending {
                tx,
                in_flight: Gauge::enter(in_flight),
            })),
        };
        (settler, DispatchHandle { context_id, rx })
    }

    /// Settles the dispatch with `event` unless it is already settled.
    ///
    /// Returns `true` if this call settled it.
    pub(crate) fn settle(&self, event: ContextEvent) -> bool {
        let Some(Pending { tx, in_flight }) = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            tracing::trace!(context = %self.context_id, event = event.label(), "ignoring event after settlement");
            return false;
        };
        let label = event.label();
        let settlement = event.into_settlement();
        match &settlement {
            Ok(_) => tracing::debug!(context = %self.context_id, event = label, "dispatch resolved"),
            Err(err) => tracing::debug!(context = %self.context_id, event = label, error = %err, "dispatch rejected"),
        }
        drop(in_flight);
        // 呼び出し側が handle を drop していても問題ない
        let _ = tx.send(settlement);
        true
    }

    #[cfg(test)]
    pub(crate) fn is_settled(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// `postMessage` from a script fragment settles with a reply.
impl Outbound for Arc<Settler> {
    fn post(&self, message: Value) {
        self.settle(ContextEvent::Reply(message));
    }
}

/// Future returned by `Spindle::spawn`; resolves exactly once.
///
/// Dropping the handle does not stop the context; its result is discarded.
#[derive(Debug)]
#[must_use = "a DispatchHandle does nothing unless awaited"]
pub struct DispatchHandle {
    context_id: ContextId,
    rx: oneshot::Receiver<Settlement>,
}

impl DispatchHandle {
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }
}

impl Future for DispatchHandle {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(settlement)) => Poll::Ready(settlement),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SpindleError::WorkerFault(FaultCause::startup(
                "context terminated without settling the dispatch",
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}
