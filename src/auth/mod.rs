//! Google OAuth for the Gmail API
//!
//! - `secret`: `client_secret.json` parsing and consent URLs
//! - `token`: credential model and the on-disk token cache
//! - `flow`: loopback consent flow, code exchange and refresh

mod flow;
mod secret;
mod token;

pub use flow::Authorizer;
pub use secret::ClientSecret;
pub use token::{Credential, TokenStore};

use crate::error::Result;
use futures::future::{BoxFuture, FutureExt};

/// Scope needed to change labels on messages.
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Supplies the bearer token attached to every API call.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> BoxFuture<'_, Result<String>>;
}

/// A fixed access token, for callers that manage tokens themselves.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn access_token(&self) -> BoxFuture<'_, Result<String>> {
        let token = self.0.clone();
        async move { Ok(token) }.boxed()
    }
}
