//! JSON-RPC over streamable HTTP.
//!
//! One POST per call. The body may come back as `application/json` or as a
//! `text/event-stream`; either way the caller sees a single result plus the
//! session id the server handed out (if any).

use crate::credentials::{CredentialResolver, SESSION_HEADER};
use crate::error::McpError;
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::sse::SseAccumulator;
use futures_util::StreamExt;
use relay_types::util::truncate_str;
use relay_types::{BoxFuture, ServerDescriptor};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// Longest response body quoted in an HTTP error, in bytes.
const MAX_ERROR_BODY: usize = 2_000;

/// Result of one JSON-RPC exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub result: Value,
    /// Session id from the response header, else the one that was sent.
    pub session_id: Option<String>,
}

impl RpcResponse {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Sends one JSON-RPC request to a server and returns its result.
pub trait RpcTransport: Send + Sync {
    fn call<'a>(
        &'a self,
        server: &'a ServerDescriptor,
        method: &'a str,
        params: Value,
        session_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<RpcResponse, McpError>>;
}

/// Production transport backed by reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    resolver: Arc<CredentialResolver>,
    timeout_ms: u64,
}

fn saturating_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

impl HttpTransport {
    pub fn new(resolver: CredentialResolver, timeout: Duration) -> Result<Self, McpError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| McpError::Network(e.to_string()))?;
        Ok(Self::with_client(http, resolver).with_timeout_ms(saturating_millis(timeout)))
    }

    /// Use a preconfigured client (tests pass one with proxies disabled).
    pub fn with_client(http: reqwest::Client, resolver: CredentialResolver) -> Self {
        Self {
            http,
            resolver: Arc::new(resolver),
            timeout_ms: 0,
        }
    }

    fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub async fn send(
        &self,
        server: &ServerDescriptor,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> Result<RpcResponse, McpError> {
        let kind = server.kind()?;
        let target = self.resolver.resolve(&kind, session_id);
        let request = JsonRpcRequest::new(uuid::Uuid::new_v4().to_string(), method, params);
        let body = serde_json::to_vec(&request)?;

        tracing::debug!("POST {} ({method})", target.url);

        let response = self
            .http
            .post(&target.url)
            .headers(target.headers)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_BOTH)
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify_reqwest(e))?;

        let status = response.status();
        let returned_session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
            .or_else(|| session_id.map(String::from));
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let result = if content_type.contains("text/event-stream") {
            let mut acc = SseAccumulator::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| self.classify_reqwest(e))?;
                acc.feed(&chunk)?;
            }
            acc.finish()?
        } else if content_type.contains("application/json") {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| self.classify_reqwest(e))?;
            let envelope: JsonRpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
                McpError::Protocol(format!("Failed to parse JSON-RPC response: {e}"))
            })?;
            envelope.into_result()?
        } else {
            return Err(McpError::UnsupportedContentType(content_type));
        };

        Ok(RpcResponse {
            result,
            session_id: returned_session,
        })
    }

    fn classify_reqwest(&self, e: reqwest::Error) -> McpError {
        if e.is_timeout() {
            McpError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else {
            McpError::Network(e.to_string())
        }
    }
}

impl RpcTransport for HttpTransport {
    fn call<'a>(
        &'a self,
        server: &'a ServerDescriptor,
        method: &'a str,
        params: Value,
        session_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<RpcResponse, McpError>> {
        Box::pin(self.send(server, method, params, session_id))
    }
}

/// Classify a non-2xx response. A JSON-RPC error body is surfaced as such.
fn classify_status(status: u16, body: &str) -> McpError {
    if let Ok(JsonRpcResponse {
        error: Some(err), ..
    }) = serde_json::from_str::<JsonRpcResponse>(body)
    {
        return err.into();
    }
    McpError::Http {
        status,
        body: truncate_str(body, MAX_ERROR_BODY).to_string(),
    }
}
