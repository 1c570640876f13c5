//! Cursor-based pagination
//!
//! Collects work items across pages until the provider stops handing
//! out a continuation cursor.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tracing::debug;

/// Opaque Gmail message id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<MessageId>,
    /// Cursor for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
    pub result_size_estimate: Option<u32>,
}

/// Fetch every page and return the concatenated ids in page order.
///
/// `fetch_page` receives the cursor of the page to fetch (`None` for
/// the first page). Pages without items do not end the listing; only
/// a page without a cursor does.
pub async fn list_pending<F, Fut>(mut fetch_page: F) -> Result<Vec<MessageId>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<MessagePage>>,
{
    let mut ids = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetch_page(cursor.take()).await?;
        pages += 1;
        debug!(
            "Page {}: {} ids, more pages: {}",
            pages,
            page.ids.len(),
            page.next_cursor.is_some()
        );
        ids.extend(page.ids);

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(ids)
}
