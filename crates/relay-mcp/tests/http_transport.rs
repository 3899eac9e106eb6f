//! Integration tests for `HttpTransport` and `ToolExecutor` over real HTTP.
//!
//! A raw TCP server plays the MCP endpoint: it answers each connection with a
//! canned response and records the request it received.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relay_mcp::{
    ClientIdentity, CredentialResolver, HttpTransport, McpError, RpcTransport, SecretStore,
    ToolExecutor,
};
use relay_store::{MemoryCache, MemoryStore};
use relay_types::{CallStatus, ServerDescriptor};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by the test server.
#[derive(Debug, Clone)]
struct SeenRequest {
    request_line: String,
    headers: HashMap<String, String>,
    body: String,
}

impl SeenRequest {
    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

fn http_response(status: &str, content_type: &str, extra_headers: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: {content_type}\r\n\
         {extra_headers}\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    )
}

fn json_ok(body: serde_json::Value) -> String {
    http_response("200 OK", "application/json", "", &body.to_string())
}

async fn read_request(socket: &mut TcpStream) -> SeenRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length")
                        .then(|| v.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }

    let text = String::from_utf8_lossy(&buf).into_owned();
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((&text, ""));
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    SeenRequest {
        request_line,
        headers,
        body: body.to_string(),
    }
}

/// Serve `responses` in order, one per connection. Returns the base URL and
/// the recorded requests.
async fn start_test_server(responses: Vec<String>) -> (String, Arc<Mutex<Vec<SeenRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);

    tokio::spawn(async move {
        for response in responses {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let request = read_request(&mut socket).await;
            seen_clone.lock().unwrap().push(request);
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}"), seen)
}

fn transport(secrets: &[(&str, &str)], provider_base: &str) -> HttpTransport {
    let values = secrets
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let http = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    HttpTransport::with_client(
        http,
        CredentialResolver::new(SecretStore::from_map(values), provider_base),
    )
}

#[tokio::test]
async fn json_response_returns_result_and_session() {
    let response = http_response(
        "200 OK",
        "application/json",
        "Mcp-Session-Id: server-sid\r\n",
        &json!({"jsonrpc": "2.0", "id": "x", "result": {"ok": true}}).to_string(),
    );
    let (base, seen) = start_test_server(vec![response]).await;
    let t = transport(&[], "http://unused");
    let server = ServerDescriptor::new(format!("{base}/mcp")).with_api_key("k1");

    let out = t.call(&server, "initialize", json!({}), None).await.unwrap();
    assert_eq!(out.result, json!({"ok": true}));
    assert_eq!(out.session_id.as_deref(), Some("server-sid"));

    let req = seen.lock().unwrap()[0].clone();
    assert_eq!(req.request_line, "POST /mcp HTTP/1.1");
    assert_eq!(req.headers["authorization"], "Bearer k1");
    assert_eq!(req.headers["accept"], "application/json, text/event-stream");
    assert!(req.headers["content-type"].starts_with("application/json"));
    let body = req.json();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["method"], "initialize");
    assert!(body["id"].is_string());
}

#[tokio::test]
async fn session_id_falls_back_to_the_one_sent() {
    let (base, seen) = start_test_server(vec![json_ok(json!({"result": 1}))]).await;
    let t = transport(&[], "http://unused");
    let server = ServerDescriptor::new(format!("{base}/mcp"));

    let out = t.call(&server, "tools/list", json!({}), Some("mine")).await.unwrap();
    assert_eq!(out.session_id.as_deref(), Some("mine"));
    assert_eq!(seen.lock().unwrap()[0].headers["mcp-session-id"], "mine");
}

#[tokio::test]
async fn sse_response_yields_last_result() {
    let body = "event: message\n\
                data: {\"jsonrpc\":\"2.0\",\"result\":{\"step\":1}}\n\
                \n\
                data: not-json\n\
                \n\
                event: message\n\
                data: {\"jsonrpc\":\"2.0\",\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"done\"}]}}\n\
                \n";
    let (base, _) = start_test_server(vec![http_response("200 OK", "text/event-stream", "", body)]).await;
    let t = transport(&[], "http://unused");
    let out = t
        .call(&ServerDescriptor::new(format!("{base}/mcp")), "tools/call", json!({}), None)
        .await
        .unwrap();
    assert_eq!(out.result["content"][0]["text"], "done");
}

#[tokio::test]
async fn json_rpc_error_envelope_is_surfaced() {
    let body = json!({"jsonrpc": "2.0", "id": "1", "error": {"code": -32602, "message": "bad args"}});
    let (base, _) = start_test_server(vec![json_ok(body)]).await;
    let t = transport(&[], "http://unused");
    let err = t
        .call(&ServerDescriptor::new(format!("{base}/mcp")), "tools/call", json!({}), None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "MCP error: bad args");
}

#[tokio::test]
async fn failed_status_with_plain_body_is_http_error() {
    let (base, _) = start_test_server(vec![http_response(
        "503 Service Unavailable",
        "text/plain",
        "",
        "overloaded",
    )])
    .await;
    let t = transport(&[], "http://unused");
    let err = t
        .call(&ServerDescriptor::new(format!("{base}/mcp")), "tools/call", json!({}), None)
        .await
        .unwrap_err();
    match err {
        McpError::Http { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_status_with_rpc_error_body_is_rpc_error() {
    let body = json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32000, "message": "Bad Request: No valid session ID"}});
    let (base, _) = start_test_server(vec![http_response(
        "400 Bad Request",
        "application/json",
        "",
        &body.to_string(),
    )])
    .await;
    let t = transport(&[], "http://unused");
    let err = t
        .call(&ServerDescriptor::new(format!("{base}/mcp")), "tools/call", json!({}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::JsonRpc { code: -32000, .. }));
}

#[tokio::test]
async fn unknown_content_type_is_rejected() {
    let (base, _) = start_test_server(vec![http_response("200 OK", "text/html", "", "<html/>")]).await;
    let t = transport(&[], "http://unused");
    let err = t
        .call(&ServerDescriptor::new(format!("{base}/mcp")), "tools/call", json!({}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::UnsupportedContentType(ct) if ct.contains("text/html")));
}

#[tokio::test]
async fn managed_call_goes_to_provider_relay() {
    let (base, seen) = start_test_server(vec![json_ok(json!({"result": {"tools": []}}))]).await;
    let t = transport(&[("SMITHERY_API_KEY", "provider-key")], &base);

    t.call(&ServerDescriptor::managed("team", "conn-9"), "tools/list", json!({}), Some("ignored"))
        .await
        .unwrap();

    let req = seen.lock().unwrap()[0].clone();
    assert_eq!(req.request_line, "POST /connect/team/conn-9/mcp HTTP/1.1");
    assert_eq!(req.headers["authorization"], "Bearer provider-key");
    assert!(!req.headers.contains_key("mcp-session-id"));
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let t = transport(&[], "http://unused");
    let err = t
        .call(&ServerDescriptor::new(format!("http://{addr}/mcp")), "initialize", json!({}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Network(_)));
}

#[tokio::test]
async fn executor_end_to_end_over_http() {
    let init = http_response(
        "200 OK",
        "application/json",
        "Mcp-Session-Id: e2e-session\r\n",
        &json!({"jsonrpc": "2.0", "id": "1", "result": {"protocolVersion": "2024-11-05"}}).to_string(),
    );
    let initialized = http_response("202 Accepted", "application/json", "", "{}");
    let call = http_response(
        "200 OK",
        "text/event-stream",
        "",
        "data: {\"jsonrpc\":\"2.0\",\"id\":\"3\",\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"42\"}]}}\n\n",
    );
    let (base, seen) = start_test_server(vec![init, initialized, call]).await;

    let store = Arc::new(MemoryStore::new());
    let exec = ToolExecutor::new(
        Arc::new(transport(&[], "http://unused")),
        Arc::new(MemoryCache::new()),
        store.clone(),
        ClientIdentity::default(),
    );
    let server = ServerDescriptor::new(format!("{base}/mcp"));
    let out = exec.execute(&server, "answer", json!({"q": "life"})).await;
    assert_eq!(out, "42");

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].json()["method"], "initialize");
    assert_eq!(seen[1].json()["method"], "notifications/initialized");
    assert_eq!(seen[1].headers["mcp-session-id"], "e2e-session");
    assert_eq!(seen[2].json()["method"], "tools/call");
    assert_eq!(seen[2].headers["mcp-session-id"], "e2e-session");
    assert_eq!(seen[2].json()["params"]["arguments"]["q"], "life");

    let rows = store.audit_entries();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, CallStatus::Success);
    assert_eq!(rows[0].tool_name, "answer");
}
