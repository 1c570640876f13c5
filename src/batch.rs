//! The mark-inbox-read run: list, then fan out one modify per message

use crate::client::GmailClient;
use crate::dispatch::{DispatchReport, apply_to_all};
use crate::error::Result;
use crate::lister::MessageId;
use crate::throttle::ThrottledExecutor;
use std::sync::Arc;
use tracing::info;

/// Mark every unread inbox message as read.
///
/// Listing and every modify call go through `executor`. `on_marked` is
/// called once per message right after it was marked. A listing failure
/// aborts the run; per-message failures are collected in the report.
pub async fn mark_inbox_read<P>(
    client: Arc<GmailClient>,
    executor: Arc<ThrottledExecutor>,
    on_marked: P,
) -> Result<DispatchReport>
where
    P: Fn(&MessageId) + Send + Sync + 'static,
{
    let ids = client.list_unread_ids(&executor).await?;
    Ok(mark_read_all(client, executor, ids, on_marked).await)
}

/// Mark the given messages as read, concurrently.
pub async fn mark_read_all<P>(
    client: Arc<GmailClient>,
    executor: Arc<ThrottledExecutor>,
    ids: Vec<MessageId>,
    on_marked: P,
) -> DispatchReport
where
    P: Fn(&MessageId) + Send + Sync + 'static,
{
    let on_marked = Arc::new(on_marked);
    let report = apply_to_all(ids, move |id| {
        let client = client.clone();
        let executor = executor.clone();
        let on_marked = on_marked.clone();
        async move {
            executor.execute(|| client.mark_read(&id)).await?;
            on_marked(&id);
            Ok(())
        }
    })
    .await;

    info!(
        "Marked {} of {} messages as read",
        report.succeeded.len(),
        report.total()
    );
    report
}
