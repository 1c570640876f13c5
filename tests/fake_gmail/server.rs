//! In-process fake Gmail API server
//!
//! Binds `127.0.0.1:0` so every test gets its own OS-assigned port,
//! and serves the handlers with axum on a background tokio task.
//! Tests point the client at [`FakeGmailServer::url`] and inspect the
//! recorded state through [`FakeGmailServer::state`] afterwards.

use super::handlers::{list_messages, modify_message, token};
use super::mailbox::GmailState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub type SharedState = Arc<Mutex<GmailState>>;

pub struct FakeGmailServer {
    port: u16,
    state: SharedState,
    /// Background task serving the router; aborted on drop.
    handle: tokio::task::JoinHandle<()>,
}

impl FakeGmailServer {
    /// Start serving `state` on an ephemeral port.
    pub async fn start(state: GmailState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(state));

        let app = Router::new()
            .route("/gmail/v1/users/:user/messages", get(list_messages))
            .route(
                "/gmail/v1/users/:user/messages/:id/modify",
                post(modify_message),
            )
            .route("/token", post(token))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            port,
            state,
            handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Base URL, usable as the Gmail API URL.
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Token endpoint URL, for client secrets.
    pub fn token_uri(&self) -> String {
        format!("{}/token", self.url())
    }

    /// Snapshot of the current server state.
    pub fn state(&self) -> GmailState {
        self.state.lock().unwrap().clone()
    }
}

impl Drop for FakeGmailServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
