pub mod config;
mod polling;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use shared::{CURRENT_HISTORY_KEY, ContestHistory, SweepConfig, profile_url};
use std::sync::Arc;
use tokio::time::{Duration, sleep};

use crate::sweep::{BrowserChart, SweepEngine};
use crate::ws_server::{Command, RemoteBridge, Response, ServerState};

pub use config::load_config;
pub use polling::{wait_for_container, wait_for_page_ready};

/// Where commands go: straight to an in-process bridge, or through a
/// running daemon.
pub enum CommandRunner {
    Local(Arc<ServerState>),
    Remote(RemoteBridge),
}

impl CommandRunner {
    pub async fn send_command(&self, command: Command, timeout: Duration) -> Result<Response> {
        match self {
            CommandRunner::Local(state) => state.send_command_with_timeout(command, timeout).await,
            CommandRunner::Remote(bridge) => bridge.send_command(command, timeout).await,
        }
    }

    /// Evaluate `script` in the page and return its value.
    pub async fn evaluate(&self, script: &str, timeout: Duration) -> Result<Value> {
        let response = self
            .send_command(
                Command::EvaluateJs {
                    script: script.to_string(),
                },
                timeout,
            )
            .await?;
        js_value(response)
    }

    pub async fn is_connected(&self) -> bool {
        match self {
            CommandRunner::Local(state) => state.is_connected().await,
            CommandRunner::Remote(bridge) => bridge.is_connected().await,
        }
    }
}

fn js_value(response: Response) -> Result<Value> {
    match response {
        Response::JsResult { result } => Ok(result),
        Response::Success { data } => Ok(data.unwrap_or(Value::Null)),
        Response::Error { message } => bail!("Page script failed: {}", message),
        other => bail!("Unexpected response: {:?}", other),
    }
}

/// Navigate to the profile page and wait until the chart can be swept.
pub async fn open_profile(
    runner: &CommandRunner,
    config: &SweepConfig,
    username: &str,
    platform: Option<&str>,
) -> Result<String> {
    let username = username.trim();
    if username.is_empty() {
        bail!("Username must not be empty");
    }

    let url = profile_url(&config.chart.profile_base_url, username, platform);
    let timeout = Duration::from_millis(config.bridge.command_timeout_ms);
    log::info!("Opening {}", url);

    let response = runner
        .send_command(Command::Navigate { url: url.clone() }, timeout)
        .await
        .with_context(|| format!("Failed to navigate to {}", url))?;
    if let Response::Error { message } = response {
        bail!("Navigation to {} failed: {}", url, message);
    }

    wait_for_page_ready(runner, timeout).await?;
    wait_for_container(runner, &config.chart.container_selector, timeout).await?;
    sleep(Duration::from_millis(config.chart.page_settle_ms)).await;

    Ok(url)
}

/// What one profile run should recover.
#[derive(Debug, Clone)]
pub struct SweepRequest {
    pub username: String,
    /// Open this platform's sub-view instead of the tabbed overview.
    pub platform: Option<String>,
    /// Sweep the displayed chart only, without switching tabs.
    pub current: bool,
}

impl SweepRequest {
    fn sweeps_current_chart(&self) -> bool {
        self.current || self.platform.is_some()
    }
}

/// Open the requested profile and recover its contest history.
///
/// Per-platform failures inside the sweep only empty that platform's series;
/// errors here mean the profile could not be opened at all.
pub async fn run_sweep(
    runner: &CommandRunner,
    config: &SweepConfig,
    request: &SweepRequest,
) -> Result<ContestHistory> {
    if !runner.is_connected().await {
        bail!(
            "Browser extension not connected.\n\
             Start the bridge with: contest-sweep server"
        );
    }

    open_profile(runner, config, &request.username, request.platform.as_deref()).await?;

    let engine = SweepEngine::new(config.clone());
    let chart = BrowserChart::new(
        runner,
        &config.chart,
        Duration::from_millis(config.bridge.command_timeout_ms),
    );

    let cancel = engine.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing with what was collected");
            cancel.cancel();
        }
    });

    let history = if request.sweeps_current_chart() {
        let series = engine.sweep_chart(&chart).await;
        ContestHistory::from([(CURRENT_HISTORY_KEY.to_string(), series)])
    } else {
        engine.sweep_profile(&chart).await
    };

    interrupt.abort();
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::sync::Mutex;
    use tokio::net::TcpListener;
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    use crate::ws_server::{self, ClientType, Hello, Request, ResponseMessage};

    #[test]
    fn js_values_are_unwrapped() {
        let value = js_value(Response::JsResult { result: Value::Bool(true) }).unwrap();
        assert_eq!(value, Value::Bool(true));
        assert_eq!(js_value(Response::Success { data: None }).unwrap(), Value::Null);

        let err = js_value(Response::Error { message: "ReferenceError".into() }).unwrap_err();
        assert!(err.to_string().contains("ReferenceError"));
        assert!(js_value(Response::Pong).is_err());
    }

    #[test]
    fn platform_view_sweeps_current_chart() {
        let request = SweepRequest {
            username: "alice".into(),
            platform: Some("leetcode".into()),
            current: false,
        };
        assert!(request.sweeps_current_chart());
        let request = SweepRequest { platform: None, ..request };
        assert!(!request.sweeps_current_chart());
    }

    /// Local bridge with a page that is ready once navigated and always has the chart container.
    async fn local_runner(visited: Arc<Mutex<Vec<String>>>) -> CommandRunner {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = ServerState::new();
        tokio::spawn(ws_server::serve(listener, state.clone()));

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{}", port)).await.unwrap();
        let hello = serde_json::to_string(&Hello { client_type: ClientType::Extension }).unwrap();
        ws.send(Message::Text(hello.into())).await.unwrap();

        tokio::spawn(async move {
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let request: Request = serde_json::from_str(&text).unwrap();
                let response = match request.command {
                    Command::Navigate { url } => {
                        visited.lock().unwrap().push(url);
                        Response::Success { data: None }
                    }
                    Command::GetStatus => {
                        let visited = visited.lock().unwrap();
                        Response::Status {
                            connected: true,
                            page_url: visited.last().cloned(),
                            page_ready: !visited.is_empty(),
                        }
                    }
                    Command::EvaluateJs { .. } => Response::JsResult { result: Value::Bool(true) },
                    _ => Response::Pong,
                };
                let reply = serde_json::to_string(&ResponseMessage { id: request.id, response }).unwrap();
                ws.send(Message::Text(reply.into())).await.unwrap();
            }
        });

        let runner = CommandRunner::Local(state);
        for _ in 0..500 {
            if runner.is_connected().await {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        runner
    }

    #[tokio::test]
    async fn open_profile_navigates_and_waits() {
        let visited = Arc::new(Mutex::new(Vec::new()));
        let runner = local_runner(visited.clone()).await;
        let mut config = SweepConfig::default();
        config.chart.page_settle_ms = 0;

        let url = open_profile(&runner, &config, " alice ", Some("codechef")).await.unwrap();

        assert_eq!(url, "https://codolio.com/profile/alice/problemSolving/codechef");
        assert_eq!(*visited.lock().unwrap(), vec![url]);
    }

    #[tokio::test]
    async fn open_profile_rejects_blank_username() {
        let runner = CommandRunner::Local(ServerState::new());
        let err = open_profile(&runner, &SweepConfig::default(), "  ", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Username"));
    }

    #[tokio::test]
    async fn sweep_requires_connected_extension() {
        let runner = CommandRunner::Local(ServerState::new());
        let request = SweepRequest {
            username: "alice".into(),
            platform: None,
            current: false,
        };
        let err = run_sweep(&runner, &SweepConfig::default(), &request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not connected"));
    }
}
