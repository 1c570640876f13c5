//! Endpoint handlers for the fake Gmail server.
//!
//! - `GET /gmail/v1/users/{user}/messages`: paginated id listing
//! - `POST /gmail/v1/users/{user}/messages/{id}/modify`: label changes
//! - `POST /token`: OAuth code exchange and refresh
//!
//! Every request is recorded before the bearer token is checked, so
//! rejected calls still show up in the state. Page tokens are `e<n>`
//! while leading empty pages are being served and `o<offset>`
//! afterwards.

use super::mailbox::{FakeMessage, GmailState};
use super::server::SharedState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

/// Google-style error body.
fn error(status: StatusCode, reason: &str, message: &str) -> Response {
    let body = json!({
        "error": {
            "code": status.as_u16(),
            "message": message,
            "errors": [{ "domain": "global", "reason": reason, "message": message }],
        }
    });
    (status, Json(body)).into_response()
}

fn rate_limited() -> Response {
    error(
        StatusCode::TOO_MANY_REQUESTS,
        "rateLimitExceeded",
        "Too many concurrent requests for user",
    )
}

/// Reject requests without the currently issued bearer token.
fn authorized(headers: &HeaderMap, state: &GmailState) -> bool {
    let expected = format!("Bearer {}", state.issued_token);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected)
}

fn unauthorized() -> Response {
    error(
        StatusCode::UNAUTHORIZED,
        "authError",
        "Request had invalid authentication credentials.",
    )
}

fn matches_filter(message: &FakeMessage, params: &[(String, String)]) -> bool {
    let mut include_spam_trash = false;
    for (key, value) in params {
        match key.as_str() {
            "labelIds" if !message.has_label(value) => return false,
            "q" if value == "is:unread" && !message.has_label("UNREAD") => return false,
            "includeSpamTrash" => include_spam_trash = value == "true",
            _ => {}
        }
    }
    include_spam_trash || !(message.has_label("SPAM") || message.has_label("TRASH"))
}

pub async fn list_messages(
    State(shared): State<SharedState>,
    Path(_user): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let mut state = shared.lock().unwrap();
    let page_token = params
        .iter()
        .find(|(k, _)| k == "pageToken")
        .map(|(_, v)| v.clone());
    state.list_requests.push(page_token.clone());

    if !authorized(&headers, &state) {
        return unauthorized();
    }

    if state.throttle_lists > 0 {
        state.throttle_lists -= 1;
        return rate_limited();
    }

    let (empties_served, offset) = match page_token.as_deref() {
        None => (0, 0),
        Some(token) if token.starts_with('e') => (token[1..].parse().unwrap_or(0), 0),
        Some(token) if token.starts_with('o') => (u32::MAX, token[1..].parse().unwrap_or(0)),
        Some(_) => {
            return error(StatusCode::BAD_REQUEST, "invalidArgument", "Invalid pageToken");
        }
    };

    if empties_served < state.leading_empty_pages {
        return Json(json!({
            "resultSizeEstimate": 0,
            "nextPageToken": format!("e{}", empties_served + 1),
        }))
        .into_response();
    }

    let matching: Vec<&FakeMessage> = state
        .messages
        .iter()
        .filter(|m| matches_filter(m, &params))
        .collect();

    let page_size = params
        .iter()
        .find(|(k, _)| k == "maxResults")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(state.page_size);
    let end = (offset + page_size).min(matching.len());
    let page: Vec<_> = matching[offset.min(end)..end]
        .iter()
        .map(|m| json!({ "id": m.id, "threadId": format!("t-{}", m.id) }))
        .collect();

    let mut body = json!({ "resultSizeEstimate": matching.len() });
    if !page.is_empty() {
        body["messages"] = json!(page);
    }
    if end < matching.len() {
        body["nextPageToken"] = json!(format!("o{end}"));
    }
    Json(body).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    #[serde(default)]
    add_label_ids: Vec<String>,
    #[serde(default)]
    remove_label_ids: Vec<String>,
}

pub async fn modify_message(
    State(shared): State<SharedState>,
    Path((_user, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<ModifyRequest>,
) -> Response {
    let mut state = shared.lock().unwrap();
    *state.modify_calls.entry(id.clone()).or_insert(0) += 1;

    if !authorized(&headers, &state) {
        return unauthorized();
    }

    if let Some(remaining) = state.throttle_modifies.get_mut(&id) {
        if *remaining > 0 {
            *remaining -= 1;
            return rate_limited();
        }
    }

    let Some(message) = state.messages.iter_mut().find(|m| m.id == id) else {
        return error(
            StatusCode::NOT_FOUND,
            "notFound",
            "Requested entity was not found.",
        );
    };

    for label in request.remove_label_ids {
        message.labels.remove(&label);
    }
    message.labels.extend(request.add_label_ids);

    Json(json!({
        "id": message.id,
        "threadId": format!("t-{}", message.id),
        "labelIds": message.labels,
    }))
    .into_response()
}

pub async fn token(
    State(shared): State<SharedState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut state = shared.lock().unwrap();
    let grant = form.get("grant_type").cloned().unwrap_or_default();
    state.token_requests.push(form);

    match grant.as_str() {
        "authorization_code" => Json(json!({
            "access_token": state.issued_token,
            "expires_in": 3599,
            "refresh_token": "1//fake-refresh",
            "scope": "https://www.googleapis.com/auth/gmail.modify",
            "token_type": "Bearer",
        }))
        .into_response(),
        "refresh_token" => Json(json!({
            "access_token": state.issued_token,
            "expires_in": 3599,
            "token_type": "Bearer",
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        )
            .into_response(),
    }
}
