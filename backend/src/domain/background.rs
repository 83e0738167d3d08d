//! Detached, best-effort background work.
//!
//! Usage counters, analytics and persisted broadcast writes run as detached
//! tasks with no result channel back to the caller. The request path never
//! awaits them; a failure is logged by the task itself and a process crash may
//! lose the update. This under-counting is an accepted trade-off.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::debug;

use super::TraceId;

/// Spawn `work` onto the runtime, carrying the caller's [`TraceId`] across.
///
/// The returned handle exists for tests; production callers drop it.
pub fn spawn_detached<F>(operation: &'static str, work: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let trace_id = TraceId::current();
    tokio::spawn(async move {
        debug!(operation, "background task started");
        match trace_id {
            Some(id) => TraceId::scope(id, work).await,
            None => work.await,
        }
    })
}
