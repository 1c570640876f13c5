//! Fake Gmail API server for integration testing
//!
//! An in-process HTTP server that speaks enough of the Gmail REST API
//! and the Google token endpoint to exercise the client end-to-end:
//!
//! list messages (paginated) -> modify labels per message -> token refresh
//!
//! ## Module layout
//!
//! - `server`: listener, router and the shared state handle
//! - `handlers`: one function per endpoint (list, modify, token)
//! - `mailbox`: test data model (messages, labels, scripted faults)

#![allow(dead_code)]

mod handlers;
pub mod mailbox;
mod server;

pub use mailbox::{GmailState, MailboxBuilder};
pub use server::FakeGmailServer;

/// Bearer token the fake server accepts on API calls.
pub const TEST_TOKEN: &str = "test-access-token";
