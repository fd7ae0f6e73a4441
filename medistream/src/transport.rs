// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Chat transport
//
// The HTTP boundary of a session: opens the answer byte stream for one
// question, or fetches a complete answer when streaming is off. Retry and
// backoff are the caller's business.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::Stream;
use futures_util::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::TransportConfig;
use crate::stream::Source;

// ---------------------------------------------------------------------------
// Transport types
// ---------------------------------------------------------------------------

/// Raw answer stream, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Body of a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: String,
}

impl ChatRequest {
    pub fn new(conversation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// Complete, non-streamed answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("chat request failed: {0}")]
    Transport(String),
    #[error("chat request timed out: {0}")]
    Timeout(String),
    /// Non-2xx response. `detail` is the `detail` field of a JSON error
    /// body, when there is one.
    #[error("chat backend responded with status {status}")]
    Status { status: u16, detail: Option<String> },
    #[error("invalid header \"{name}\": {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("failed to decode chat response: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// ChatTransport trait
// ---------------------------------------------------------------------------

/// Reaches the chat backend.
///
/// Implementations must be thread-safe; the client holds
/// `Arc<dyn ChatTransport>` and may serve several conversations at once.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Start a streamed answer. Resolves once the response head arrived;
    /// the body is read lazily from the returned stream.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;

    /// Fetch a complete answer in one response.
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// Reqwest transport
// ---------------------------------------------------------------------------

pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    chat_path: String,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Build on a caller-supplied client (proxies, TLS settings, pools).
    pub fn with_client(
        client: reqwest::Client,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    TransportError::InvalidHeader {
                        name: name.clone(),
                        reason: e.to_string(),
                    }
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_path: config.chat_path.clone(),
            headers,
            timeout: config.timeout_ms.map(Duration::from_millis),
        })
    }

    /// URL of the chat endpoint.
    pub fn endpoint(&self, stream: bool) -> String {
        let query = if stream { "?stream=true" } else { "" };
        format!("{}{}{}", self.base_url, self.chat_path, query)
    }

    async fn post(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, TransportError> {
        let mut req = self
            .client
            .post(self.endpoint(stream))
            .headers(self.headers.clone())
            .json(request);

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send().await.map_err(map_reqwest_error)?;

        let status = resp.status();
        if !status.is_success() {
            // An unreadable error body just means no detail
            let body = resp.bytes().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatTransport for ReqwestTransport {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let resp = self.post(request, true).await?;
        tracing::debug!(
            conversation_id = %request.conversation_id,
            status = resp.status().as_u16(),
            "answer stream opened"
        );
        Ok(Box::pin(resp.bytes_stream().map_err(map_reqwest_error)))
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        let resp = self.post(request, false).await?;
        let body = resp.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Transport(e.to_string())
    }
}

/// Extract `detail` from a JSON error body like `{"detail": "..."}`.
fn error_detail(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        detail: serde_json::Value,
    }

    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
