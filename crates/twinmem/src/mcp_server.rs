use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::tools::{DEFAULT_SEARCH_LIMIT, MemoryTools, ToolOutput};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "twinmem";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

/// JSON-RPC 2.0 Request
#[derive(Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Option<Value>,
    id: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Option<Value>,
}

impl JsonRpcResponse {
    fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

/// JSON-RPC 2.0 Error
#[derive(Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// MCP Tool Definition
#[derive(Serialize)]
struct McpToolDef {
    name: &'static str,
    description: &'static str,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

#[derive(Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Deserialize)]
struct SaveMemoryArgs {
    text: String,
}

#[derive(Deserialize)]
struct SearchMemoriesArgs {
    query: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

/// A `tools/call` that could not be dispatched.
struct InvalidParams(String);

fn get_tools() -> Vec<McpToolDef> {
    vec![
        McpToolDef {
            name: "save_memory",
            description: "Save information to long-term memory. The text is stored on both \
                          the primary and the secondary provider; near-duplicates of existing \
                          memories are not stored again.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "The content to remember, with any relevant details"
                    }
                },
                "required": ["text"]
            }),
        },
        McpToolDef {
            name: "get_all_memories",
            description: "List every stored memory, merged from both providers with \
                          duplicates removed.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        McpToolDef {
            name: "search_memories",
            description: "Semantic search across both providers. Primary results come first.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural-language description of what to look for"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "default": DEFAULT_SEARCH_LIMIT,
                        "description": "Maximum number of results"
                    }
                },
                "required": ["query"]
            }),
        },
        McpToolDef {
            name: "check_provider_health",
            description: "Check whether the primary and secondary providers answer requests.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        McpToolDef {
            name: "sync_providers",
            description: "Compare the number of memories held by each provider and report \
                          whether they have drifted apart. Nothing is copied.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}

/// MCP server exposing the memory tools over JSON-RPC 2.0.
pub(crate) struct McpServer {
    tools: MemoryTools,
}

impl McpServer {
    pub(crate) fn new(tools: MemoryTools) -> Self {
        Self { tools }
    }

    /// Handle one raw message. `None` means nothing is sent back.
    async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(e) => {
                error!("Failed to parse JSON-RPC request: {}", e);
                return Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };
        self.handle_request(request).await
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id;

        if request.method.starts_with("notifications/") {
            debug!(method = %request.method, "notification");
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::result(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": {}
                    },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            ),
            "tools/list" => JsonRpcResponse::result(id, json!({ "tools": get_tools() })),
            "tools/call" => match self.call_tool(request.params).await {
                Ok(output) => JsonRpcResponse::result(id, tool_result(output)),
                Err(InvalidParams(message)) => JsonRpcResponse::error(id, INVALID_PARAMS, message),
            },
            "ping" | "shutdown" => JsonRpcResponse::result(id, json!({})),
            other => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(response)
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<ToolOutput, InvalidParams> {
        let params = params.ok_or_else(|| InvalidParams("Missing params for tools/call".into()))?;
        let ToolCallParams { name, arguments } = serde_json::from_value(params)
            .map_err(|e| InvalidParams(format!("Invalid tools/call params: {e}")))?;
        let arguments = arguments.unwrap_or_else(|| json!({}));

        debug!(tool = %name, "tool call");

        let output = match name.as_str() {
            "save_memory" => {
                let args: SaveMemoryArgs = tool_args(&name, arguments)?;
                self.tools.save_memory(&args.text).await
            }
            "get_all_memories" => self.tools.get_all_memories().await,
            "search_memories" => {
                let args: SearchMemoriesArgs = tool_args(&name, arguments)?;
                self.tools.search_memories(&args.query, args.limit).await
            }
            "check_provider_health" => self.tools.check_provider_health().await,
            "sync_providers" => self.tools.sync_providers().await,
            _ => return Err(InvalidParams(format!("Unknown tool: {name}"))),
        };
        if output.is_error {
            warn!(tool = %name, message = %output.text, "tool reported an error");
        }
        Ok(output)
    }
}

fn tool_args<T: serde::de::DeserializeOwned>(
    tool: &str,
    arguments: Value,
) -> Result<T, InvalidParams> {
    serde_json::from_value(arguments)
        .map_err(|e| InvalidParams(format!("Invalid arguments for {tool}: {e}")))
}

fn tool_result(output: ToolOutput) -> Value {
    json!({
        "content": [
            {
                "type": "text",
                "text": output.text
            }
        ],
        "isError": output.is_error
    })
}

/// Serve newline-delimited JSON-RPC on stdin/stdout until stdin closes.
pub(crate) async fn run_stdio(server: Arc<McpServer>) -> Result<()> {
    info!("Starting MCP server on stdio");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read line from stdin")?
    {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!("Received: {}", trimmed);

        if let Some(response) = server.handle_message(trimmed).await {
            let mut payload =
                serde_json::to_vec(&response).context("Failed to serialize response")?;
            payload.push(b'\n');
            stdout
                .write_all(&payload)
                .await
                .context("Failed to write response to stdout")?;
            stdout.flush().await.context("Failed to flush stdout")?;
        }
    }

    info!("MCP server shutting down");
    Ok(())
}

pub(crate) fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(handle_http))
        .with_state(server)
}

async fn handle_http(State(server): State<Arc<McpServer>>, body: String) -> Response {
    match server.handle_message(&body).await {
        Some(response) => axum::Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Serve JSON-RPC over `POST /mcp` until Ctrl-C.
pub(crate) async fn run_http(server: Arc<McpServer>, host: &str, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind MCP HTTP endpoint at {host}:{port}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve local MCP HTTP address")?;

    info!(addr = %local_addr, "Starting MCP server on http (POST /mcp)");
    axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("MCP HTTP server stopped with error")?;

    info!("MCP server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
#[path = "mcp_server_tests.rs"]
mod tests;
