//! Google OAuth client secret

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use url::Url;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client registration, as downloaded from the Google Cloud
/// console (`client_secret.json`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// The downloaded file wraps the registration in an `installed` or
/// `web` section depending on the client type.
#[derive(Deserialize)]
struct SecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecret {
    /// Parse the contents of a `client_secret.json` file.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SecretFile = serde_json::from_str(json)?;
        file.installed.or(file.web).ok_or_else(|| {
            Error::Config("client secret has neither an 'installed' nor a 'web' section".into())
        })
    }

    /// Read and parse a `client_secret.json` file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Cannot read client secret {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Consent page URL for the installed-app flow.
    ///
    /// Requests offline access so the response carries a refresh token.
    pub fn authorization_url(&self, scopes: &[&str], redirect_uri: &str, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.auth_uri)
            .map_err(|e| Error::Config(format!("Invalid auth_uri '{}': {e}", self.auth_uri)))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &scopes.join(" "))
            .append_pair("state", state)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url)
    }
}
