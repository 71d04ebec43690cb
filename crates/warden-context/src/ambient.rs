//! Ambient scope pointer
//!
//! The "current scope" of a stack is the one piece of state that is not shared: it
//! belongs to a logical execution path. Inside a future run through
//! [`with_ambient_scopes`] (or spawned with [`spawn_inheriting`]) it lives in tokio
//! task-local storage and follows the task across worker threads. Everywhere else it
//! lives in thread-local storage.
//!
//! Async code that enters scopes must run under [`with_ambient_scopes`]; otherwise
//! tasks sharing a worker thread would observe each other's scopes.

use crate::scope::ScopePath;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinHandle;
use uuid::Uuid;

type AmbientMap = HashMap<Uuid, ScopePath>;

thread_local! {
    static THREAD_AMBIENT: RefCell<AmbientMap> = RefCell::new(HashMap::new());
}

tokio::task_local! {
    static TASK_AMBIENT: RefCell<AmbientMap>;
}

/// Ambient path of `stack` on the calling execution path
pub(crate) fn current_path(stack: Uuid) -> Option<ScopePath> {
    TASK_AMBIENT
        .try_with(|ambient| ambient.borrow().get(&stack).cloned())
        .unwrap_or_else(|_| THREAD_AMBIENT.with(|ambient| ambient.borrow().get(&stack).cloned()))
}

/// Replace the ambient path of `stack`; `None` falls back to the default scope
pub(crate) fn set_path(stack: Uuid, path: Option<ScopePath>) {
    let apply = |ambient: &RefCell<AmbientMap>| {
        let mut ambient = ambient.borrow_mut();
        match path.clone() {
            Some(path) => ambient.insert(stack, path),
            None => ambient.remove(&stack),
        };
    };
    if TASK_AMBIENT.try_with(apply).is_err() {
        THREAD_AMBIENT.with(apply);
    }
}

/// Copy of every ambient path visible on the calling execution path
fn snapshot() -> AmbientMap {
    TASK_AMBIENT
        .try_with(|ambient| ambient.borrow().clone())
        .unwrap_or_else(|_| THREAD_AMBIENT.with(|ambient| ambient.borrow().clone()))
}

/// Run `future` with its own task-local ambient scopes, starting from the scopes
/// that are ambient for the caller. Scopes entered inside stay inside.
pub fn with_ambient_scopes<F>(future: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    TASK_AMBIENT.scope(RefCell::new(snapshot()), future)
}

/// Spawn a task that inherits the caller's ambient scopes
pub fn spawn_inheriting<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let inherited = snapshot();
    tokio::spawn(TASK_AMBIENT.scope(RefCell::new(inherited), future))
}
