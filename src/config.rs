//! Run configuration

use crate::error::{Error, Result};
use crate::throttle::{RetryPolicy, ThrottleConfig};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Public Gmail REST endpoint.
pub const DEFAULT_API_URL: &str = "https://gmail.googleapis.com";

/// Configuration for one mark-as-read run
#[derive(Debug, Clone)]
pub struct GmailConfig {
    /// Path to the Google `client_secret.json`.
    pub client_secret: PathBuf,
    /// Directory holding the cached OAuth token.
    pub token_dir: PathBuf,
    /// Gmail user id; `me` is the authorized account.
    pub user: String,
    /// Base URL of the Gmail API, without trailing slash.
    pub api_url: String,
    /// `maxResults` for each list page; provider default when unset.
    pub page_size: Option<u32>,
    pub throttle: ThrottleConfig,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            client_secret: PathBuf::from("client_secret.json"),
            token_dir: PathBuf::from("token"),
            user: "me".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            page_size: None,
            throttle: ThrottleConfig::default(),
        }
    }
}

impl GmailConfig {
    /// Load configuration from environment variables
    ///
    /// Reads from `.env` file if present. All variables are optional:
    /// - `GMAIL_CLIENT_SECRET` (default: `client_secret.json`)
    /// - `GMAIL_TOKEN_DIR` (default: `token`)
    /// - `GMAIL_USER` (default: `me`)
    /// - `GMAIL_API_URL` (default: `https://gmail.googleapis.com`)
    /// - `GMAIL_PAGE_SIZE` (default: unset)
    /// - `GMAIL_MAX_IN_FLIGHT` (default: `100`)
    /// - `GMAIL_QUOTA` (default: `100`)
    /// - `GMAIL_QUOTA_WINDOW_SECS` (default: `60`)
    /// - `GMAIL_MAX_ATTEMPTS` (default: `5`)
    /// - `GMAIL_BASE_DELAY_MS` (default: `1000`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let retry_defaults = RetryPolicy::default();
        let throttle_defaults = ThrottleConfig::default();

        let page_size = lookup("GMAIL_PAGE_SIZE")
            .map(|v| parse_value("GMAIL_PAGE_SIZE", &v))
            .transpose()?;

        let window_secs = parse_or(
            &lookup,
            "GMAIL_QUOTA_WINDOW_SECS",
            throttle_defaults.window.as_secs(),
        )?;
        let base_delay_ms = parse_or(
            &lookup,
            "GMAIL_BASE_DELAY_MS",
            u64::try_from(retry_defaults.base_delay.as_millis()).unwrap_or(u64::MAX),
        )?;

        let throttle = ThrottleConfig {
            max_in_flight: parse_or(
                &lookup,
                "GMAIL_MAX_IN_FLIGHT",
                throttle_defaults.max_in_flight,
            )?,
            quota: parse_or(&lookup, "GMAIL_QUOTA", throttle_defaults.quota)?,
            window: Duration::from_secs(window_secs),
            retry: RetryPolicy {
                max_attempts: parse_or(
                    &lookup,
                    "GMAIL_MAX_ATTEMPTS",
                    retry_defaults.max_attempts,
                )?,
                base_delay: Duration::from_millis(base_delay_ms),
            },
        };
        throttle.validate()?;

        Ok(Self {
            client_secret: lookup("GMAIL_CLIENT_SECRET")
                .map_or(defaults.client_secret, PathBuf::from),
            token_dir: lookup("GMAIL_TOKEN_DIR").map_or(defaults.token_dir, PathBuf::from),
            user: lookup("GMAIL_USER").unwrap_or(defaults.user),
            api_url: lookup("GMAIL_API_URL")
                .map_or(defaults.api_url, |u| u.trim_end_matches('/').to_string()),
            page_size,
            throttle,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    lookup(name).map_or(Ok(default), |v| parse_value(name, &v))
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {name}: {e}")))
}
