pub mod tools;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared::{CURRENT_HISTORY_KEY, ContestHistory, PlatformTab, SweepConfig, find_platform};
use std::io::{self, BufRead, Write};
use std::time::Duration;

use crate::session::{self, CommandRunner};
use crate::sweep::{BrowserChart, ChartSurface, SweepEngine};
use crate::ws_server::{self, Command, Response, ServerState};
use tools::get_tools;

#[derive(Debug, Deserialize)]
struct McpRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct McpResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<McpError>,
}

#[derive(Debug, Serialize)]
struct McpError {
    code: i32,
    message: String,
}

impl McpResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(McpError { code, message }),
        }
    }
}

/// Bridge and settings shared by every tool call.
struct ToolContext {
    runner: CommandRunner,
    config: SweepConfig,
}

impl ToolContext {
    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.bridge.command_timeout_ms)
    }

    fn chart(&self) -> BrowserChart<'_> {
        BrowserChart::new(&self.runner, &self.config.chart, self.timeout())
    }
}

pub async fn run_mcp_server(ws_port: u16, config: SweepConfig) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    log::info!("contest-sweep MCP server starting (ws_port: {})...", ws_port);

    let state = ServerState::new();
    let state_clone = state.clone();

    tokio::spawn(async move {
        log::info!("Starting WebSocket server on port {}...", ws_port);
        if let Err(e) = ws_server::start_server(ws_port, state_clone).await {
            log::error!("WebSocket server error: {:#}", e);
        }
    });

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    log::info!("WebSocket server started, ready for browser connections");

    let context = ToolContext {
        runner: CommandRunner::Local(state),
        config,
    };

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::error!("Read error: {}", e);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        log::debug!("Received: {}", line);

        let request: McpRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                log::error!("Parse error: {}", e);
                continue;
            }
        };

        let response = handle_request(request, &context).await;

        let response_json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to encode response: {}", e);
                continue;
            }
        };
        log::debug!("Sending: {}", response_json);

        if let Err(e) = writeln!(stdout, "{}", response_json).and_then(|_| stdout.flush()) {
            log::error!("Write error: {}", e);
            break;
        }
    }
}

async fn handle_request(request: McpRequest, context: &ToolContext) -> McpResponse {
    let id = request.id.unwrap_or(Value::Null);

    match request.method.as_str() {
        "initialize" => McpResponse::result(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "contest-sweep",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),

        "tools/list" => McpResponse::result(
            id,
            json!({
                "tools": get_tools().into_iter().map(|t| json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema
                })).collect::<Vec<_>>()
            }),
        ),

        "tools/call" => {
            let tool_name = request
                .params
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let arguments = request
                .params
                .get("arguments")
                .cloned()
                .unwrap_or(json!({}));

            match call_tool(tool_name, arguments, context).await {
                Ok(result) => McpResponse::result(
                    id,
                    json!({
                        "content": [{
                            "type": "text",
                            "text": result
                        }]
                    }),
                ),
                Err(e) => McpResponse::error(id, -32000, e),
            }
        }

        "notifications/initialized" => McpResponse::result(id, json!(null)),

        _ => McpResponse::error(id, -32601, format!("Method not found: {}", request.method)),
    }
}

fn pretty(value: &impl Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}

fn string_arg<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Configured tab for `label`, or an ad-hoc one keyed by `key` or the label.
fn resolve_platform(platforms: &[PlatformTab], label: &str, key: Option<&str>) -> PlatformTab {
    let mut tab = find_platform(platforms, label)
        .cloned()
        .unwrap_or_else(|| PlatformTab::new(label, label));
    if let Some(key) = key {
        tab.key = key.to_string();
    }
    tab
}

/// Configured platforms, optionally narrowed to `names` (labels or keys).
fn select_platforms(platforms: &[PlatformTab], names: Option<&Vec<Value>>) -> Result<Vec<PlatformTab>, String> {
    let Some(names) = names else {
        return Ok(platforms.to_vec());
    };
    names
        .iter()
        .map(|name| {
            let name = name.as_str().ok_or("platforms must be strings")?;
            find_platform(platforms, name)
                .cloned()
                .ok_or_else(|| format!("Unknown platform: {}", name))
        })
        .collect()
}

async fn call_tool(name: &str, args: Value, context: &ToolContext) -> Result<String, String> {
    match name {
        "sweep_status" => {
            if !context.runner.is_connected().await {
                return Ok("Extension not connected. Load the bridge extension in the browser.".into());
            }
            match context
                .runner
                .send_command(Command::GetStatus, context.timeout())
                .await
            {
                Ok(Response::Status {
                    connected,
                    page_url,
                    page_ready,
                }) => Ok(format!(
                    "Connected: {}\nPage URL: {}\nPage Ready: {}",
                    connected,
                    page_url.unwrap_or_else(|| "N/A".into()),
                    page_ready
                )),
                Ok(r) => Ok(format!("Connected: true\nResponse: {:?}", r)),
                Err(e) => Err(format!("Status check failed: {}", e)),
            }
        }

        "sweep_open_profile" => {
            let username = string_arg(&args, "username").ok_or("username parameter required")?;
            let platform = string_arg(&args, "platform");
            session::open_profile(&context.runner, &context.config, username, platform)
                .await
                .map(|url| format!("Opened {}", url))
                .map_err(|e| format!("{:#}", e))
        }

        "sweep_read_panel" => match context.chart().read_panel().await {
            Ok(Some(panel)) => pretty(&panel),
            Ok(None) => Ok("No info panel found".into()),
            Err(e) => Err(format!("{:#}", e)),
        },

        "sweep_platform" => {
            let label = string_arg(&args, "label").ok_or("label parameter required")?;
            let platform = resolve_platform(&context.config.platforms, label, string_arg(&args, "key"));

            let engine = SweepEngine::new(context.config.clone());
            let series = engine.sweep_platform(&context.chart(), &platform).await;
            pretty(&ContestHistory::from([(platform.key, series)]))
        }

        "sweep_profile" => {
            let platforms = select_platforms(
                &context.config.platforms,
                args.get("platforms").and_then(|v| v.as_array()),
            )?;

            let engine = SweepEngine::new(context.config.clone());
            let history = engine.sweep_platforms(&context.chart(), &platforms).await;
            pretty(&history)
        }

        "sweep_current" => {
            let engine = SweepEngine::new(context.config.clone());
            let series = engine.sweep_chart(&context.chart()).await;
            pretty(&ContestHistory::from([(CURRENT_HISTORY_KEY.to_string(), series)]))
        }

        _ => Err(format!("Unknown tool: {}", name)),
    }
}
