//! Gmail bulk mark-as-read
//!
//! Lists the unread messages in a Gmail inbox and clears their
//! `UNREAD` label concurrently. Every API call runs through a
//! [`ThrottledExecutor`] that caps in-flight requests, enforces a
//! per-window request quota and retries throttled calls with
//! exponential backoff.
//!
//! Authorization uses the Google installed-app OAuth flow with a
//! token cached on disk (see [`auth`]).

pub mod auth;
mod batch;
mod client;
mod config;
mod dispatch;
mod error;
mod label;
mod lister;
mod throttle;

pub use batch::{mark_inbox_read, mark_read_all};
pub use client::{GmailClient, ListQuery};
pub use config::{DEFAULT_API_URL, GmailConfig};
pub use dispatch::{DispatchReport, apply_to_all};
pub use error::{Error, Result};
pub use label::Label;
pub use lister::{MessageId, MessagePage, list_pending};
pub use throttle::{BudgetSnapshot, RetryPolicy, ThrottleConfig, ThrottledExecutor};
