//! HTTP+SSE transport for MCP servers.
//!
//! The client keeps one `GET` event stream open. The server first announces
//! the endpoint to POST JSON-RPC messages to, then delivers every response as
//! a `message` event. Responses are matched to waiting requests by id.

use super::error::McpError;
use super::sse::{SseDecoder, SseEvent};
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use futures::StreamExt;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use url::Url;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// SSE transport for one MCP server
pub struct SseTransport {
    http: reqwest::Client,
    /// Where JSON-RPC messages are POSTed (announced by the server)
    endpoint: Url,
    next_id: AtomicU64,
    pending: PendingMap,
    /// Event stream reader; `None` once closed
    reader: Mutex<Option<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
}

impl SseTransport {
    /// Open the event stream and wait for the server to announce its endpoint
    pub async fn connect(url: &str) -> Result<Self, McpError> {
        let base = Url::parse(url).map_err(|e| McpError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let http = reqwest::Client::new();
        let response = http
            .get(base.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();

        let reader = tokio::spawn(read_events(
            response,
            endpoint_tx,
            pending.clone(),
            closed.clone(),
        ));

        let endpoint = match endpoint_rx.await {
            Ok(path) => match base.join(&path) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    reader.abort();
                    return Err(McpError::Protocol(format!(
                        "Invalid endpoint '{}': {}",
                        path, e
                    )));
                }
            },
            Err(_) => {
                reader.abort();
                return Err(McpError::ConnectionClosed);
            }
        };

        tracing::debug!("MCP endpoint for {}: {}", base, endpoint);

        Ok(Self {
            http,
            endpoint,
            next_id: AtomicU64::new(1),
            pending,
            reader: Mutex::new(Some(reader)),
            closed,
        })
    }

    /// Endpoint JSON-RPC messages are posted to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Whether the stream has ended or the transport was closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a request and wait for its response
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        // The reader may have finished before the waiter was registered
        if self.is_closed() {
            self.pending.lock().await.remove(&id);
            return Err(McpError::ConnectionClosed);
        }

        let request = JsonRpcRequest::new(id, method, params);
        tracing::debug!("MCP request {} -> {}", id, method);

        if let Err(e) = self.post(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = rx.await.map_err(|_| McpError::ConnectionClosed)?;

        if let Some(error) = response.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| McpError::Protocol("MCP response missing result".to_string()))
    }

    /// Send a notification (no response expected)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        if self.is_closed() {
            return Err(McpError::ConnectionClosed);
        }
        tracing::debug!("MCP notification -> {}", method);
        self.post(&JsonRpcNotification::new(method, params)).await
    }

    /// Stop the event stream and fail every outstanding request.
    ///
    /// Closing twice returns [`McpError::InvalidState`].
    pub async fn close(&self) -> Result<(), McpError> {
        let reader = self.reader.lock().await.take();
        let Some(reader) = reader else {
            return Err(McpError::InvalidState(
                "MCP connection already closed".to_string(),
            ));
        };

        reader.abort();
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the senders wakes every waiter with ConnectionClosed
        self.pending.lock().await.clear();
        Ok(())
    }

    async fn post<T: Serialize>(&self, body: &T) -> Result<(), McpError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(McpError::Protocol(format!(
                "POST {} returned {}: {}",
                self.endpoint, status, text
            )));
        }
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Ok(mut reader) = self.reader.try_lock() {
            if let Some(reader) = reader.take() {
                reader.abort();
            }
        }
    }
}

/// Read the event stream until it ends, routing responses to their waiters
async fn read_events(
    response: reqwest::Response,
    endpoint_tx: oneshot::Sender<String>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
) {
    let mut endpoint_tx = Some(endpoint_tx);
    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("MCP event stream error: {}", e);
                break;
            }
        };

        for event in decoder.feed(&chunk) {
            match event.event.as_str() {
                "endpoint" => {
                    if let Some(tx) = endpoint_tx.take() {
                        let _ = tx.send(event.data);
                    }
                }
                "message" => route_message(&pending, &event).await,
                other => tracing::trace!("Ignoring SSE event '{}'", other),
            }
        }
    }

    tracing::debug!("MCP event stream ended");
    closed.store(true, Ordering::SeqCst);
    pending.lock().await.clear();
}

async fn route_message(pending: &PendingMap, event: &SseEvent) {
    let value: Value = match serde_json::from_str(&event.data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Malformed MCP message: {}", e);
            return;
        }
    };

    // Server-initiated requests and notifications carry a method
    if let Some(method) = value.get("method").and_then(|m| m.as_str()) {
        tracing::debug!("Ignoring server message '{}'", method);
        return;
    }

    let response: JsonRpcResponse = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("Unexpected MCP message shape: {}", e);
            return;
        }
    };

    let Some(id) = response.id else {
        tracing::warn!("MCP response without id");
        return;
    };

    match pending.lock().await.remove(&id) {
        Some(tx) => {
            let _ = tx.send(response);
        }
        None => tracing::warn!("MCP response for unknown request {}", id),
    }
}
