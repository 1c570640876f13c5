//! Test data model for the fake Gmail server
//!
//! Provides a builder-style API for constructing mailbox state:
//!
//! ```ignore
//! let state = MailboxBuilder::new()
//!     .unread_inbox("m1")
//!     .read_inbox("m2")
//!     .message("m3", &["SPAM", "UNREAD"])
//!     .page_size(2)
//!     .throttle_modify("m1", 3)
//!     .build();
//! ```
//!
//! The state is shared with the server behind a mutex, so tests can
//! inspect it after a run: current labels, how many times each message
//! was modified, which page tokens were requested, and which form
//! bodies reached the token endpoint.

use std::collections::{BTreeSet, HashMap};

/// A message and the label ids currently on it.
#[derive(Debug, Clone)]
pub struct FakeMessage {
    pub id: String,
    pub labels: BTreeSet<String>,
}

impl FakeMessage {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Everything the fake server knows and records.
#[derive(Debug, Clone)]
pub struct GmailState {
    pub messages: Vec<FakeMessage>,
    /// Messages per list page.
    pub page_size: usize,
    /// Empty pages (with a cursor) served before the first real page.
    pub leading_empty_pages: u32,
    /// Remaining 429 responses for list calls.
    pub throttle_lists: u32,
    /// Remaining 429 responses per message id for modify calls.
    pub throttle_modifies: HashMap<String, u32>,
    /// `pageToken` of every list request, in arrival order.
    pub list_requests: Vec<Option<String>>,
    /// Number of modify requests received per message id.
    pub modify_calls: HashMap<String, u32>,
    /// Form bodies posted to the token endpoint.
    pub token_requests: Vec<HashMap<String, String>>,
    /// Access token handed out by the token endpoint.
    pub issued_token: String,
}

impl GmailState {
    pub fn message(&self, id: &str) -> Option<&FakeMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Ids of inbox messages still carrying `UNREAD`.
    pub fn unread_inbox_ids(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.has_label("INBOX") && m.has_label("UNREAD"))
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn total_modify_calls(&self) -> u32 {
        self.modify_calls.values().sum()
    }
}

/// Builder for constructing a `GmailState` step by step.
pub struct MailboxBuilder {
    state: GmailState,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            state: GmailState {
                messages: Vec::new(),
                page_size: 100,
                leading_empty_pages: 0,
                throttle_lists: 0,
                throttle_modifies: HashMap::new(),
                list_requests: Vec::new(),
                modify_calls: HashMap::new(),
                token_requests: Vec::new(),
                issued_token: super::TEST_TOKEN.to_string(),
            },
        }
    }

    /// Add a message with arbitrary labels.
    pub fn message(mut self, id: &str, labels: &[&str]) -> Self {
        self.state.messages.push(FakeMessage {
            id: id.to_string(),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
        });
        self
    }

    pub fn unread_inbox(self, id: &str) -> Self {
        self.message(id, &["INBOX", "UNREAD"])
    }

    pub fn read_inbox(self, id: &str) -> Self {
        self.message(id, &["INBOX"])
    }

    pub const fn page_size(mut self, size: usize) -> Self {
        self.state.page_size = size;
        self
    }

    pub const fn leading_empty_pages(mut self, count: u32) -> Self {
        self.state.leading_empty_pages = count;
        self
    }

    pub const fn throttle_lists(mut self, count: u32) -> Self {
        self.state.throttle_lists = count;
        self
    }

    /// Answer the next `count` modify calls for `id` with 429.
    pub fn throttle_modify(mut self, id: &str, count: u32) -> Self {
        self.state.throttle_modifies.insert(id.to_string(), count);
        self
    }

    pub fn issued_token(mut self, token: &str) -> Self {
        self.state.issued_token = token.to_string();
        self
    }

    pub fn build(self) -> GmailState {
        self.state
    }
}
