//! OAuth credential and its on-disk cache

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tokens are treated as expired this long before their actual expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

/// An OAuth access token with its refresh material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Credential {
    /// Whether the access token should no longer be used at `now`.
    ///
    /// Tokens without a known expiry never expire locally.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| now + Duration::seconds(EXPIRY_SKEW_SECS) >= at)
    }

    /// Build a credential from a token endpoint response.
    ///
    /// Refresh responses usually omit the refresh token; the previous
    /// one is kept in that case.
    pub(crate) fn from_response(
        response: TokenResponse,
        now: DateTime<Utc>,
        previous_refresh: Option<String>,
    ) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at: response
                .expires_in
                .map(|secs| now + Duration::seconds(secs)),
            scope: response.scope,
        }
    }
}

/// Body of a successful token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Directory-backed token cache, one JSON file per user key.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for `user`.
    #[must_use]
    pub fn path_for(&self, user: &str) -> PathBuf {
        let key: String = user
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{key}.json"))
    }

    /// Load the cached credential, `None` if nothing is cached yet.
    pub async fn load(&self, user: &str) -> Result<Option<Credential>> {
        let path = self.path_for(user);
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => {
                debug!("Loaded cached token from {}", path.display());
                Ok(Some(serde_json::from_str(&json)?))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist `credential`, creating the cache directory if needed.
    pub async fn save(&self, user: &str, credential: &Credential) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(user);
        let json = serde_json::to_string_pretty(credential)?;
        tokio::fs::write(&path, json).await?;
        debug!("Saved token to {}", path.display());
        Ok(path)
    }
}
