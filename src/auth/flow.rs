//! Installed-app OAuth flow
//!
//! Implements the authorization code flow with a loopback redirect:
//! 1. Start a callback server on `127.0.0.1` with an OS-assigned port
//! 2. Hand the consent URL to the caller (who shows it to the user)
//! 3. Wait for the browser redirect carrying the authorization code
//! 4. Exchange the code for tokens at the client's token endpoint
//!
//! Cached tokens are reused across runs and refreshed when they
//! expire, so the browser step normally happens only once.

use super::secret::ClientSecret;
use super::token::{Credential, TokenResponse, TokenStore};
use super::TokenSource;
use crate::error::{Error, Result};
use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// How long the consent flow waits for the browser redirect.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "<html><body><h1>Authorization complete</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h1>Authorization failed</h1>\
    <p>Return to the terminal for details.</p></body></html>";
const NOT_FOUND_PAGE: &str = "<html><body><h1>Not found</h1></body></html>";

/// Authorized session that keeps its access token fresh.
pub struct Authorizer {
    http: reqwest::Client,
    secret: ClientSecret,
    store: TokenStore,
    user: String,
    credential: Mutex<Credential>,
}

impl Authorizer {
    /// Obtain a credential for `user`.
    ///
    /// Reuses the cached token when still valid, refreshes it when
    /// expired, and falls back to the browser consent flow otherwise.
    /// `show_consent_url` is called with the URL the user must open.
    pub async fn authorize(
        secret: ClientSecret,
        scopes: &[&str],
        user: &str,
        store: TokenStore,
        show_consent_url: impl FnOnce(&Url),
    ) -> Result<Self> {
        let http = crate::client::http_client()?;

        let credential = match store.load(user).await? {
            Some(cached) if !cached.is_expired(Utc::now()) => {
                info!("Using cached token for {}", user);
                cached
            }
            Some(cached) if cached.refresh_token.is_some() => {
                match refresh(&http, &secret, &cached).await {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        warn!("Token refresh failed, requesting consent again: {}", e);
                        consent_flow(&http, &secret, scopes, show_consent_url).await?
                    }
                }
            }
            _ => consent_flow(&http, &secret, scopes, show_consent_url).await?,
        };

        let path = store.save(user, &credential).await?;
        info!("Credential file saved to: {}", path.display());

        Ok(Self {
            http,
            secret,
            store,
            user: user.to_string(),
            credential: Mutex::new(credential),
        })
    }

    /// Current access token, refreshed first if it has expired.
    pub async fn access_token(&self) -> Result<String> {
        let mut current = self.credential.lock().await;
        if current.is_expired(Utc::now()) {
            if current.refresh_token.is_none() {
                return Err(Error::Auth(
                    "access token expired and no refresh token is available".into(),
                ));
            }
            let fresh = refresh(&self.http, &self.secret, &current).await?;
            self.store.save(&self.user, &fresh).await?;
            *current = fresh;
        }
        Ok(current.access_token.clone())
    }
}

impl TokenSource for Authorizer {
    fn access_token(&self) -> BoxFuture<'_, Result<String>> {
        Self::access_token(self).boxed()
    }
}

async fn consent_flow(
    http: &reqwest::Client,
    secret: &ClientSecret,
    scopes: &[&str],
    show_consent_url: impl FnOnce(&Url),
) -> Result<Credential> {
    let server = tiny_http::Server::http("127.0.0.1:0")
        .map_err(|e| Error::Auth(format!("Failed to start callback server: {e}")))?;
    let port = server
        .server_addr()
        .to_ip()
        .map(|addr| addr.port())
        .ok_or_else(|| Error::Auth("Callback server has no IP address".into()))?;
    let redirect_uri = format!("http://127.0.0.1:{port}/");
    let state = generate_state();

    let url = secret.authorization_url(scopes, &redirect_uri, &state)?;
    show_consent_url(&url);

    let code = tokio::task::spawn_blocking(move || wait_for_code(&server, &state, CONSENT_TIMEOUT))
        .await
        .map_err(|e| Error::Task(format!("OAuth callback server failed: {e}")))??;
    exchange_code(http, secret, &code, &redirect_uri).await
}

/// Serve redirects until one carries the authorization result or
/// `timeout` elapses.
///
/// Each connection is handled by the server independently, so a
/// connection that never sends a request does not hold up the redirect.
fn wait_for_code(server: &tiny_http::Server, expected_state: &str, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let Some(request) = server.recv_timeout(remaining)? else {
            return Err(Error::Auth(format!(
                "Timed out after {}s waiting for the OAuth redirect",
                timeout.as_secs()
            )));
        };
        debug!("OAuth callback request: {} {}", request.method(), request.url());

        let outcome = parse_redirect(request.url(), expected_state);
        let page = match &outcome {
            Ok(Some(_)) => SUCCESS_PAGE,
            Ok(None) => NOT_FOUND_PAGE,
            Err(_) => FAILURE_PAGE,
        };
        respond(request, page);

        // `None` for favicon and other stray requests.
        if let Some(code) = outcome? {
            return Ok(code);
        }
    }
}

fn respond(request: tiny_http::Request, page: &str) {
    let mut response = tiny_http::Response::from_string(page);
    if let Ok(header) =
        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
    {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        debug!("Could not answer OAuth callback: {}", e);
    }
}

/// Extract the authorization code from a redirect target
/// (`/?code=...&state=...`).
///
/// Returns `Ok(None)` for requests that carry no authorization result.
pub(crate) fn parse_redirect(target: &str, expected_state: &str) -> Result<Option<String>> {
    let url = Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(target))
        .map_err(|e| Error::Auth(format!("Malformed redirect '{target}': {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match &*key {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(Error::Auth(format!("Authorization denied: {error}")));
    }
    let Some(code) = code else {
        return Ok(None);
    };
    if state.as_deref() != Some(expected_state) {
        return Err(Error::Auth("OAuth state mismatch in redirect".into()));
    }
    Ok(Some(code))
}

async fn exchange_code(
    http: &reqwest::Client,
    secret: &ClientSecret,
    code: &str,
    redirect_uri: &str,
) -> Result<Credential> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
        ("redirect_uri", redirect_uri),
    ];
    let response = token_request(http, &secret.token_uri, &params).await?;
    info!("Obtained OAuth tokens");
    Ok(Credential::from_response(response, Utc::now(), None))
}

async fn refresh(
    http: &reqwest::Client,
    secret: &ClientSecret,
    credential: &Credential,
) -> Result<Credential> {
    let refresh_token = credential
        .refresh_token
        .as_deref()
        .ok_or_else(|| Error::Auth("no refresh token".into()))?;
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
    ];
    let response = token_request(http, &secret.token_uri, &params).await?;
    info!("Refreshed access token");
    Ok(Credential::from_response(
        response,
        Utc::now(),
        credential.refresh_token.clone(),
    ))
}

async fn token_request(
    http: &reqwest::Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http.post(token_uri).form(params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(Error::Auth(format!(
            "Token endpoint returned {status}: {body}"
        )));
    }

    Ok(response.json().await?)
}

fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
