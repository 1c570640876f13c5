//! Gmail REST client

use crate::auth::TokenSource;
use crate::config::GmailConfig;
use crate::error::{Error, Result};
use crate::label::Label;
use crate::lister::{MessageId, MessagePage, list_pending};
use crate::throttle::ThrottledExecutor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Google error reasons that mean "slow down" even on a 403.
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

/// Build the HTTP client shared by API and token requests.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("gmail-mark-read/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .build()?)
}

/// Filter for a message listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub label_ids: Vec<Label>,
    pub include_spam_trash: bool,
    /// Gmail search expression, e.g. `is:unread`.
    pub q: Option<String>,
}

impl ListQuery {
    /// Unread messages in the inbox, spam and trash excluded.
    #[must_use]
    pub fn unread_inbox() -> Self {
        Self {
            label_ids: vec![Label::Inbox],
            include_spam_trash: false,
            q: Some("is:unread".to_string()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
    result_size_estimate: Option<u32>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyMessageRequest<'a> {
    #[serde(skip_serializing_if = "no_labels")]
    add_label_ids: &'a [Label],
    #[serde(skip_serializing_if = "no_labels")]
    remove_label_ids: &'a [Label],
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn no_labels(labels: &&[Label]) -> bool {
    labels.is_empty()
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Client for the two Gmail calls the batch needs: list and modify
pub struct GmailClient {
    http: reqwest::Client,
    api_url: String,
    user: String,
    page_size: Option<u32>,
    tokens: Arc<dyn TokenSource>,
}

impl GmailClient {
    pub fn new(config: &GmailConfig, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            page_size: config.page_size,
            tokens,
        })
    }

    /// Fetch one page of message ids matching `query`.
    pub async fn list_page(&self, query: &ListQuery, cursor: Option<&str>) -> Result<MessagePage> {
        let url = self.messages_url(&[])?;

        let mut params: Vec<(&str, String)> = query
            .label_ids
            .iter()
            .map(|label| ("labelIds", label.to_string()))
            .collect();
        params.push(("includeSpamTrash", query.include_spam_trash.to_string()));
        if let Some(q) = &query.q {
            params.push(("q", q.clone()));
        }
        if let Some(size) = self.page_size {
            params.push(("maxResults", size.to_string()));
        }
        if let Some(cursor) = cursor {
            params.push(("pageToken", cursor.to_string()));
        }

        debug!("Listing messages (cursor: {:?})", cursor);
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;
        let body: ListMessagesResponse = check(response).await?.json().await?;

        Ok(MessagePage {
            ids: body
                .messages
                .into_iter()
                .map(|m| MessageId::new(m.id))
                .collect(),
            next_cursor: body.next_page_token,
            result_size_estimate: body.result_size_estimate,
        })
    }

    /// Ids of all unread inbox messages; every page goes through
    /// `executor`.
    pub async fn list_unread_ids(&self, executor: &ThrottledExecutor) -> Result<Vec<MessageId>> {
        let query = ListQuery::unread_inbox();
        let ids = list_pending(|cursor| {
            let query = &query;
            async move {
                executor
                    .execute(|| self.list_page(query, cursor.as_deref()))
                    .await
            }
        })
        .await?;

        info!("Found {} unread messages", ids.len());
        Ok(ids)
    }

    /// Add and remove labels on one message.
    pub async fn modify_labels(&self, id: &MessageId, add: &[Label], remove: &[Label]) -> Result<()> {
        let url = self.messages_url(&[id.as_str(), "modify"])?;
        let body = ModifyMessageRequest {
            add_label_ids: add,
            remove_label_ids: remove,
        };

        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Clear the unread marker on one message.
    pub async fn mark_read(&self, id: &MessageId) -> Result<()> {
        self.modify_labels(id, &[], &[Label::Unread]).await
    }

    /// `{api}/gmail/v1/users/{user}/messages[/extra...]`, each segment
    /// percent-encoded.
    fn messages_url(&self, extra: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| Error::Config(format!("Invalid API URL '{}': {e}", self.api_url)))?;
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("API URL '{}' cannot be a base", self.api_url)))?
            .pop_if_empty()
            .extend(["gmail", "v1", "users", self.user.as_str(), "messages"])
            .extend(extra);
        Ok(url)
    }
}

/// Pass successful responses through; map failures to [`Error`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status.as_u16(), &body))
}

/// Map a non-2xx status and body to the error taxonomy.
///
/// 429, and 403 with a rate-limit reason, are the throttling signal.
pub(crate) fn classify_failure(status: u16, body: &str) -> Error {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    let rate_reason = parsed.as_ref().is_some_and(|e| {
        e.error
            .errors
            .iter()
            .any(|d| RATE_LIMIT_REASONS.contains(&d.reason.as_str()))
    });

    if status == 429 || (status == 403 && rate_reason) {
        Error::RateLimited(message)
    } else {
        Error::Api { status, message }
    }
}
