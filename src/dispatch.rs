// src/dispatch.rs - Hands work from background threads to the frame loop
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Deferred work. The frame loop lends its state `C` when the action runs.
pub type Action<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;

type Queue<C> = Arc<Mutex<VecDeque<Action<C>>>>;

fn lock<C>(queue: &Queue<C>) -> MutexGuard<'_, VecDeque<Action<C>>> {
    // Actions never run under the lock, so a poisoned queue is still consistent
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Consumer side of the action queue. Owned by the frame loop.
///
/// Producers get a [`DispatchHandle`] and may enqueue from any thread.
/// [`drain`](Self::drain) runs every action that was queued when it started,
/// in enqueue order, on the calling thread. Actions queued while a drain is
/// running wait for the next one.
pub struct MainThreadDispatcher<C> {
    queue: Queue<C>,
}

impl<C> MainThreadDispatcher<C> {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn handle(&self) -> DispatchHandle<C> {
        DispatchHandle {
            queue: Arc::clone(&self.queue),
        }
    }

    pub fn enqueue_action(&self, action: impl FnOnce(&mut C) + Send + 'static) {
        lock(&self.queue).push_back(Box::new(action));
    }

    /// Run the queued actions against `context`. Returns how many ran.
    pub fn drain(&mut self, context: &mut C) -> usize {
        let pending = std::mem::take(&mut *lock(&self.queue));
        let count = pending.len();
        for action in pending {
            action(context);
        }
        count
    }

    pub fn len(&self) -> usize {
        lock(&self.queue).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C> Default for MainThreadDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the action queue.
pub struct DispatchHandle<C> {
    queue: Queue<C>,
}

impl<C> DispatchHandle<C> {
    pub fn enqueue_action(&self, action: impl FnOnce(&mut C) + Send + 'static) {
        lock(&self.queue).push_back(Box::new(action));
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }
}

impl<C> Clone for DispatchHandle<C> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<C> fmt::Debug for DispatchHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("pending", &self.pending())
            .finish()
    }
}
