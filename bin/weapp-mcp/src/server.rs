//! Line-delimited JSON-RPC 2.0 over stdio, MCP-flavored.
//!
//! One request per line, one response per line. Notifications (no `id`)
//! get no response. Tool failures never surface as JSON-RPC errors; they
//! travel inside the tool-call result envelope.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};
use weapp_bridge::Dispatcher;

const PROTOCOL_VERSION: &str = "2024-11-05";

pub async fn serve(mut dispatcher: Dispatcher) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Discarding malformed request line");
                write_line(&mut stdout, &error_response(Value::Null, -32700, "Parse error"))
                    .await?;
                continue;
            }
        };

        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let params = request.get("params").cloned().unwrap_or(Value::Null);

        let Some(id) = request.get("id").cloned() else {
            debug!(method, "Ignoring notification");
            continue;
        };

        let response = handle_request(&mut dispatcher, &method, &params, id).await;
        write_line(&mut stdout, &response).await?;
    }

    Ok(())
}

async fn handle_request(
    dispatcher: &mut Dispatcher,
    method: &str,
    params: &Value,
    id: Value,
) -> Value {
    match method {
        "initialize" => result_response(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "weapp-mcp",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        "ping" => result_response(id, json!({})),
        "tools/list" => result_response(id, json!({ "tools": Dispatcher::tool_schemas() })),
        "tools/call" => {
            let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
            let args = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));
            let envelope = dispatcher.dispatch(name, &args).await;
            result_response(id, envelope.to_mcp())
        }
        other => error_response(id, -32601, &format!("Method not found: {}", other)),
    }
}

fn result_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

async fn write_line(
    stdout: &mut tokio::io::Stdout,
    response: &Value,
) -> std::io::Result<()> {
    stdout.write_all(response.to_string().as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
