//! In-process transport for tests.

use crate::error::McpError;
use crate::transport::{RpcResponse, RpcTransport};
use relay_types::{BoxFuture, ServerDescriptor};
use serde_json::Value;
use std::sync::Mutex;

/// One call observed by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub server: ServerDescriptor,
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

type Handler = Box<dyn Fn(&RecordedCall) -> Result<RpcResponse, McpError> + Send + Sync>;

/// A transport that answers from a closure and records every call.
pub struct ScriptedTransport {
    handler: Handler,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&RecordedCall) -> Result<RpcResponse, McpError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of calls made with `method`.
    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }
}

impl RpcTransport for ScriptedTransport {
    fn call<'a>(
        &'a self,
        server: &'a ServerDescriptor,
        method: &'a str,
        params: Value,
        session_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<RpcResponse, McpError>> {
        Box::pin(async move {
            let call = RecordedCall {
                server: server.clone(),
                method: method.to_string(),
                params,
                session_id: session_id.map(String::from),
            };
            self.calls
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(call.clone());
            // Let sibling futures interleave like real network calls would.
            tokio::task::yield_now().await;
            (self.handler)(&call)
        })
    }
}
