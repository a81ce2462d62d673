//! Default backend wiring: a thin WebSocket shim for the DevTools automation
//! endpoint.
//!
//! Messages are `{id, method, params}` requests answered by `{id, result}` or
//! `{id, error}`; frames without an id are console/exception events. The
//! bridge core never sees any of this — it only consumes the capability
//! traits this module implements.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};
use weapp_core::{Error, Result};

use crate::{Connector, Element, LaunchOptions, Page, Session, SessionEvent};

const LAUNCH_ATTACH_TIMEOUT: Duration = Duration::from_secs(30);
const LAUNCH_POLL_INTERVAL: Duration = Duration::from_millis(500);

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;
type Subscribers = Arc<std::sync::Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>>;

/// Connector over the DevTools automation WebSocket endpoint.
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, ws_endpoint: &str) -> Result<Arc<dyn Session>> {
        let client = WireClient::connect(ws_endpoint).await?;
        Ok(Arc::new(WsSession {
            client: Arc::new(client),
        }))
    }

    async fn launch(&self, opts: &LaunchOptions) -> Result<Arc<dyn Session>> {
        let cli = opts.cli_path.clone().ok_or(Error::ToolNotFound)?;
        let project = opts.project_path.display().to_string();

        info!(cli = %cli.display(), project = %project, port = opts.port, "Launching WeChat DevTools");
        // The DevTools process outlives the bridge; we never hold its handle.
        Command::new(&cli)
            .args([
                "auto",
                "--project",
                &project,
                "--auto-port",
                &opts.port.to_string(),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::Process(format!("Failed to launch {}: {}", cli.display(), e))
            })?;

        // Poll the endpoint until the automation service is accepting.
        let endpoint = format!("ws://127.0.0.1:{}", opts.port);
        let start = Instant::now();
        loop {
            match WireClient::connect(&endpoint).await {
                Ok(client) => {
                    return Ok(Arc::new(WsSession {
                        client: Arc::new(client),
                    }))
                }
                Err(e) if start.elapsed() > LAUNCH_ATTACH_TIMEOUT => {
                    return Err(Error::Backend(format!(
                        "DevTools automation endpoint {} not ready after {}s: {}",
                        endpoint,
                        LAUNCH_ATTACH_TIMEOUT.as_secs(),
                        e
                    )));
                }
                Err(_) => tokio::time::sleep(LAUNCH_POLL_INTERVAL).await,
            }
        }
    }
}

/// Low-level message client: one writer task, one reader task, a pending map
/// keyed by request id, and a fan-out list of event subscribers.
struct WireClient {
    ws_tx: mpsc::Sender<String>,
    pending: Pending,
    subscribers: Subscribers,
    next_id: AtomicU64,
    reader: tokio::task::JoinHandle<()>,
    writer: tokio::task::JoinHandle<()>,
}

impl WireClient {
    async fn connect(ws_endpoint: &str) -> Result<Self> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        let (ws_stream, _) = connect_async(ws_endpoint).await.map_err(|e| {
            Error::Backend(format!("Failed to connect to {}: {}", ws_endpoint, e))
        })?;
        let (mut sink, mut stream) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(256);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let subscribers: Subscribers = Arc::new(std::sync::Mutex::new(Vec::new()));

        let writer = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(msg)).await {
                    warn!("Automation WebSocket write error: {}", e);
                    break;
                }
            }
        });

        let pending_clone = pending.clone();
        let subscribers_clone = subscribers.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        let Ok(msg) = serde_json::from_str::<Value>(&text) else {
                            let preview: String = text.chars().take(200).collect();
                            warn!("Unparseable automation message: {}", preview);
                            continue;
                        };
                        if let Some(id) = msg.get("id").and_then(Value::as_u64) {
                            let mut pending = pending_clone.lock().await;
                            if let Some(tx) = pending.remove(&id) {
                                let _ = tx.send(msg);
                            }
                        } else if let Some(event) = parse_event(&msg) {
                            if let Ok(mut subs) = subscribers_clone.lock() {
                                subs.retain(|tx| tx.send(event.clone()).is_ok());
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Automation WebSocket closed by backend");
                        break;
                    }
                    Err(e) => {
                        warn!("Automation WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self {
            ws_tx,
            pending,
            subscribers,
            next_id: AtomicU64::new(1),
            reader,
            writer,
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let msg = json!({ "id": id, "method": method, "params": params });

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        self.ws_tx
            .send(msg.to_string())
            .await
            .map_err(|_| Error::Backend("Automation connection is closed".to_string()))?;

        // No per-call timeout: a hung backend hangs the request, per the
        // accepted failure model. Process restart is the recovery path.
        let response = rx
            .await
            .map_err(|_| Error::Backend("Automation connection dropped mid-call".to_string()))?;

        if let Some(err) = response.get("error") {
            let text = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(Error::Backend(text));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }
}

impl Drop for WireClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn parse_event(msg: &Value) -> Option<SessionEvent> {
    let method = msg.get("method").and_then(Value::as_str)?;
    let params = msg.get("params").cloned().unwrap_or(Value::Null);
    match method {
        "App.console" => Some(SessionEvent::Console {
            level: params
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("log")
                .to_string(),
            text: render_console_args(&params),
        }),
        "App.exception" => Some(SessionEvent::Exception {
            text: params
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown exception")
                .to_string(),
        }),
        _ => None,
    }
}

fn render_console_args(params: &Value) -> String {
    match params.get("args").and_then(Value::as_array) {
        Some(args) => args
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        None => params
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    }
}

struct WsSession {
    client: Arc<WireClient>,
}

#[async_trait]
impl Session for WsSession {
    async fn current_page(&self) -> Result<Arc<dyn Page>> {
        let result = self.client.call("App.getCurrentPage", json!({})).await?;
        let page_id = result.get("pageId").cloned().unwrap_or(Value::Null);
        let path = result
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Arc::new(WsPage {
            client: self.client.clone(),
            page_id,
            path,
        }))
    }

    async fn navigate_to(&self, url: &str) -> Result<Value> {
        self.call_wx_method("navigateTo", &[json!({ "url": url })])
            .await
    }

    async fn evaluate(&self, script: &str, args: &[Value]) -> Result<Value> {
        self.client
            .call(
                "App.callFunction",
                json!({ "functionDeclaration": script, "args": args }),
            )
            .await
    }

    async fn call_wx_method(&self, method: &str, args: &[Value]) -> Result<Value> {
        self.client
            .call("App.callWxMethod", json!({ "method": method, "args": args }))
            .await
    }

    async fn disconnect(&self) -> Result<()> {
        // Dropping the client aborts the reader/writer tasks and closes the
        // socket; the backend treats that as a clean detach.
        self.client.reader.abort();
        self.client.writer.abort();
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.client.subscribe()
    }
}

struct WsPage {
    client: Arc<WireClient>,
    page_id: Value,
    path: String,
}

#[async_trait]
impl Page for WsPage {
    fn path(&self) -> String {
        self.path.clone()
    }

    async fn data(&self, path: Option<&str>) -> Result<Value> {
        let mut params = json!({ "pageId": self.page_id });
        if let Some(p) = path {
            params["path"] = json!(p);
        }
        let result = self.client.call("Page.getData", params).await?;
        Ok(field_or_whole(result, "data"))
    }

    async fn set_data(&self, data: Value) -> Result<()> {
        self.client
            .call("Page.setData", json!({ "pageId": self.page_id, "data": data }))
            .await?;
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Option<Arc<dyn Element>>> {
        let result = self
            .client
            .call(
                "Page.getElement",
                json!({ "pageId": self.page_id, "selector": selector }),
            )
            .await?;
        // The backend answers with an empty result when nothing matches.
        match result.get("elementId") {
            Some(id) if !id.is_null() => Ok(Some(Arc::new(WsElement {
                client: self.client.clone(),
                page_id: self.page_id.clone(),
                element_id: id.clone(),
            }))),
            _ => Ok(None),
        }
    }
}

struct WsElement {
    client: Arc<WireClient>,
    page_id: Value,
    element_id: Value,
}

impl WsElement {
    fn params(&self, extra: Value) -> Value {
        let mut params = json!({ "pageId": self.page_id, "elementId": self.element_id });
        if let Value::Object(map) = extra {
            for (k, v) in map {
                params[k] = v;
            }
        }
        params
    }
}

#[async_trait]
impl Element for WsElement {
    async fn text(&self) -> Result<Value> {
        let result = self.client.call("Element.getText", self.params(json!({}))).await?;
        Ok(field_or_whole(result, "text"))
    }

    async fn size(&self) -> Result<Value> {
        let result = self.client.call("Element.getSize", self.params(json!({}))).await?;
        Ok(field_or_whole(result, "size"))
    }

    async fn offset(&self) -> Result<Value> {
        let result = self
            .client
            .call("Element.getOffset", self.params(json!({})))
            .await?;
        Ok(field_or_whole(result, "offset"))
    }

    async fn attribute(&self, name: &str) -> Result<Value> {
        let result = self
            .client
            .call(
                "Element.getAttributes",
                self.params(json!({ "names": [name] })),
            )
            .await?;
        Ok(first_of(result, "attributes"))
    }

    async fn style(&self, name: &str) -> Result<Value> {
        let result = self
            .client
            .call("Element.getStyles", self.params(json!({ "names": [name] })))
            .await?;
        Ok(first_of(result, "styles"))
    }

    async fn tap(&self) -> Result<()> {
        self.client.call("Element.tap", self.params(json!({}))).await?;
        Ok(())
    }

    async fn input(&self, value: &str) -> Result<()> {
        self.client
            .call("Element.input", self.params(json!({ "value": value })))
            .await?;
        Ok(())
    }

    async fn trigger(&self, event_name: &str, detail: Value) -> Result<()> {
        self.client
            .call(
                "Element.triggerEvent",
                self.params(json!({ "type": event_name, "detail": detail })),
            )
            .await?;
        Ok(())
    }
}

fn field_or_whole(result: Value, key: &str) -> Value {
    result.get(key).cloned().unwrap_or(result)
}

fn first_of(result: Value, key: &str) -> Value {
    result
        .get(key)
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .cloned()
        .unwrap_or(Value::Null)
}
