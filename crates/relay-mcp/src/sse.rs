//! Server-Sent Events accumulator for JSON-RPC responses.
//!
//! Streamable-HTTP MCP servers may answer a request with an event stream
//! instead of a JSON body. Only `data:` lines matter: their values are
//! concatenated until a blank line (or the end of the stream) closes the
//! block, which is then parsed as a JSON-RPC envelope. The last `result`
//! seen wins; an `error` member fails the call immediately.

use crate::error::McpError;
use crate::jsonrpc::error_from_value;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No `data:` line since the last boundary.
    Idle,
    /// At least one `data:` line is buffered.
    Accumulating,
}

/// Incremental SSE reader that folds a stream into one JSON-RPC result.
#[derive(Debug)]
pub struct SseAccumulator {
    state: State,
    pending: Vec<u8>,
    data: String,
    last_result: Option<Value>,
}

impl Default for SseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SseAccumulator {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            pending: Vec::new(),
            data: String::new(),
            last_result: None,
        }
    }

    /// Feed raw bytes. Lines are only decoded once complete, so multi-byte
    /// characters split across chunks survive.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), McpError> {
        // Bytes before `scanned` are known to hold no newline.
        let scanned = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let pending = std::mem::take(&mut self.pending);
        let mut start = 0;
        let mut from = scanned;
        let mut outcome = Ok(());
        while let Some(offset) = pending[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            let line = String::from_utf8_lossy(&pending[start..end]).into_owned();
            start = end + 1;
            from = start;
            outcome = self.process_line(&line);
            if outcome.is_err() {
                break;
            }
        }
        self.pending = pending;
        self.pending.drain(..start);
        outcome
    }

    /// Close the stream and return the last result observed (`null` if none).
    pub fn finish(mut self) -> Result<Value, McpError> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.process_line(&line)?;
        }
        if self.state == State::Accumulating {
            self.flush()?;
        }
        Ok(self.last_result.unwrap_or(Value::Null))
    }

    fn process_line(&mut self, line: &str) -> Result<(), McpError> {
        let line = line.trim_end_matches('\r');
        if let Some(value) = line.strip_prefix("data:") {
            self.data.push_str(value.strip_prefix(' ').unwrap_or(value));
            self.state = State::Accumulating;
        } else if line.trim().is_empty() && self.state == State::Accumulating {
            self.flush()?;
        }
        // event:, id:, retry: and comments are ignored.
        Ok(())
    }

    fn flush(&mut self) -> Result<(), McpError> {
        let buffer = std::mem::take(&mut self.data);
        self.state = State::Idle;

        let envelope: Value = match serde_json::from_str(&buffer) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("Skipping malformed SSE data block: {e}");
                return Ok(());
            }
        };
        if let Some(err) = envelope.get("error").filter(|e| !e.is_null()) {
            return Err(error_from_value(err));
        }
        if let Some(result) = envelope.get("result") {
            self.last_result = Some(result.clone());
        }
        Ok(())
    }
}
