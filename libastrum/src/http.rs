//! Shared HTTP plumbing for platform, AI and storage APIs
//!
//! Every outbound call goes through [`send_json`], which turns transport
//! failures and non-2xx answers into a single message of the form
//! `"<Label> API error: <status> - <message>"`.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

use crate::error::{ConfigError, Result};

const USER_AGENT: &str = concat!("astrumverse/", env!("CARGO_PKG_VERSION"));

/// Places a JSON error body may carry a human-readable message
const MESSAGE_POINTERS: &[&str] = &[
    "/message",
    "/error/message",
    "/error_description",
    "/detail",
    "/error",
    "/errors/0/message",
    "/title",
    "/error_summary",
];

/// Build the shared `reqwest` client
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| {
            ConfigError::InvalidValue {
                field: "http".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
}

/// A successful (2xx) answer
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body; non-JSON bodies are kept as a JSON string
    pub body: Value,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.body.pointer(pointer).and_then(Value::as_str)
    }
}

/// Send a request and classify the answer
///
/// # Errors
///
/// Returns the formatted error message on network failure or non-2xx status.
pub async fn send_json(label: &str, request: RequestBuilder) -> std::result::Result<ApiResponse, String> {
    let response = request
        .send()
        .await
        .map_err(|e| format!("{} API error: network - {}", label, e))?;

    let status = response.status();
    let headers = response.headers().clone();
    let raw = response
        .text()
        .await
        .map_err(|e| format!("{} API error: network - {}", label, e))?;
    let body = parse_body(&raw);

    if !status.is_success() {
        let message = error_message(&body, status);
        tracing::debug!("{} answered {}: {}", label, status.as_u16(), raw);
        return Err(format!(
            "{} API error: {} - {}",
            label,
            status.as_u16(),
            message
        ));
    }

    Ok(ApiResponse {
        status,
        headers,
        body,
    })
}

fn parse_body(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Best human-readable message from an error body
pub fn error_message(body: &Value, status: StatusCode) -> String {
    for pointer in MESSAGE_POINTERS {
        if let Some(Value::String(message)) = body.pointer(pointer) {
            if !message.trim().is_empty() {
                return message.trim().to_string();
            }
        }
    }
    if let Value::String(raw) = body {
        if !raw.trim().is_empty() {
            return raw.trim().to_string();
        }
    }
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}
