//! Scope - ネイティブ callable から見た隔離コンテキスト

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use tokio::task::JoinHandle;

use crate::domain::errors::TaskError;
use crate::domain::ids::ContextId;

/// Handle to the isolated context a native callable runs in.
///
/// コンテキストのスレッド上でだけ使われるので `Send` ではありません。
#[derive(Debug, Clone)]
pub struct Scope {
    context_id: ContextId,
    detached: Rc<RefCell<Vec<JoinHandle<()>>>>,
}

impl Scope {
    pub(crate) fn new(context_id: ContextId) -> Self {
        Self {
            context_id,
            detached: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Starts work the callable does not await.
    ///
    /// The work runs only while the context is alive: the context is torn down
    /// as soon as the callable returns, and anything still pending is dropped.
    /// Must be called on the context thread.
    pub fn spawn_detached<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        let handle = tokio::task::spawn_local(future);
        self.detached.borrow_mut().push(handle);
    }

    /// `return Err(scope.exit(code))` stops the context with an exit code.
    pub fn exit(&self, code: i32) -> TaskError {
        TaskError::Exit(code)
    }

    /// Detached work that has not finished yet.
    pub(crate) fn unfinished(&self) -> usize {
        self.detached
            .borrow()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}
