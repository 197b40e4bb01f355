//! JSON over HTTP with classified, retried failures.
//!
//! Retry strategy:
//! - HTTP 429 or 5xx → retryable
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error or timeout → retryable
//! - Body that is not valid JSON → fail immediately

use anyhow::Result;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

use civitas_core::retry::RetryPolicy;

use crate::activity::{run_activity, ActivityError};

/// Build the shared client used by HTTP connectors.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("civitas/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Read an API key from the environment variable named in config.
pub fn api_key_from_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ActivityError::non_retryable("missing_api_key", format!("{} not set", var)).into()),
    }
}

/// Map a non-success status to a classified error.
pub fn classify_status(status: StatusCode, body: &str) -> ActivityError {
    let error_type = format!("http_{}", status.as_u16());
    let message = format!("HTTP {}: {}", status, truncate(body, 300));
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ActivityError::retryable(error_type, message)
    } else {
        ActivityError::non_retryable(error_type, message)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

fn classify_transport(err: reqwest::Error) -> ActivityError {
    let error_type = if err.is_timeout() { "timeout" } else { "network" };
    ActivityError::retryable(error_type, err.to_string())
}

/// One request, no retries.
async fn fetch_json(
    client: &Client,
    method: Method,
    url: &str,
    headers: &[(&str, String)],
    body: Option<&Value>,
) -> Result<Value> {
    let mut req = client.request(method, url);
    for (name, value) in headers {
        req = req.header(*name, value);
    }
    if let Some(body) = body {
        req = req.json(body);
    }

    let resp = req.send().await.map_err(classify_transport)?;
    let status = resp.status();
    let text = resp.text().await.map_err(classify_transport)?;

    if !status.is_success() {
        return Err(classify_status(status, &text).into());
    }

    serde_json::from_str(&text)
        .map_err(|e| ActivityError::non_retryable("malformed_json", format!("{}: {}", url, e)).into())
}

/// `GET url` and decode the JSON body, retried under `policy`.
pub async fn get_json(
    client: &Client,
    url: &str,
    headers: &[(&str, String)],
    policy: &RetryPolicy,
) -> Result<Value> {
    let outcome = run_activity("http_get", policy, |_| {
        fetch_json(client, Method::GET, url, headers, None)
    })
    .await?;
    Ok(outcome.value)
}

/// `POST url` with a JSON body, retried under `policy`.
pub async fn post_json(
    client: &Client,
    url: &str,
    headers: &[(&str, String)],
    body: &Value,
    policy: &RetryPolicy,
) -> Result<Value> {
    let outcome = run_activity("http_post", policy, |_| {
        fetch_json(client, Method::POST, url, headers, Some(body))
    })
    .await?;
    Ok(outcome.value)
}
