//! Concurrent fan-out over work items
//!
//! One tokio task per item, all joined before returning. A failing item
//! never cancels its siblings; outcomes are collected into a
//! [`DispatchReport`].

use crate::error::{Error, Result};
use crate::lister::MessageId;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, warn};

/// Outcome of a fan-out.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub succeeded: Vec<MessageId>,
    pub failed: Vec<(MessageId, Error)>,
}

impl DispatchReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Collapse the report into the first failure, if any.
    pub fn into_result(self) -> Result<Vec<MessageId>> {
        match self.failed.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(self.succeeded),
        }
    }
}

/// Run `action` once per item, concurrently, and wait for all of them.
///
/// Items are processed in no particular order. An action that panics,
/// or whose task is cancelled, is recorded as a failure of its item, so
/// the report always accounts for every item.
pub async fn apply_to_all<F, Fut>(items: Vec<MessageId>, action: F) -> DispatchReport
where
    F: Fn(MessageId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let action = Arc::new(action);
    let mut tasks = JoinSet::new();
    let mut pending: HashMap<Id, MessageId> = HashMap::with_capacity(items.len());

    for item in items {
        let action = action.clone();
        let task_item = item.clone();
        let handle = tasks.spawn(async move { action(task_item).await });
        pending.insert(handle.id(), item);
    }
    debug!("Dispatched {} tasks", tasks.len());

    let mut report = DispatchReport::default();
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(join_err) => (join_err.id(), Err(task_failure(join_err))),
        };
        let Some(item) = pending.remove(&id) else {
            warn!("Finished task {} has no dispatched item", id);
            continue;
        };
        match outcome {
            Ok(()) => report.succeeded.push(item),
            Err(err) => {
                warn!("Item {} failed: {}", item, err);
                report.failed.push((item, err));
            }
        }
    }

    report
}

fn task_failure(join_err: JoinError) -> Error {
    if join_err.is_panic() {
        Error::Task(panic_message(join_err.into_panic().as_ref()))
    } else {
        Error::Task(format!("task did not complete: {join_err}"))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(|| "task panicked".to_string(), |msg| format!("task panicked: {msg}"))
}
