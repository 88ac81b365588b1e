pub mod client;
pub mod protocol;

use anyhow::{Context, Result, bail};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};

pub use client::{RemoteBridge, send_command_to_server};
pub use protocol::*;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Broker between the browser extension and whoever issues commands.
pub struct ServerState {
    extension_tx: RwLock<Option<mpsc::Sender<String>>>,
    pending_requests: RwLock<HashMap<u64, oneshot::Sender<Response>>>,
    next_id: RwLock<u64>,
}

impl ServerState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            extension_tx: RwLock::new(None),
            pending_requests: RwLock::new(HashMap::new()),
            next_id: RwLock::new(1),
        })
    }

    pub async fn send_command(&self, command: Command) -> Result<Response> {
        self.send_command_with_timeout(command, DEFAULT_COMMAND_TIMEOUT)
            .await
    }

    pub async fn send_command_with_timeout(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<Response> {
        let extension_tx = self.extension_tx.read().await;
        let tx = extension_tx
            .as_ref()
            .context("No extension connected")?
            .clone();
        drop(extension_tx);

        let mut next_id = self.next_id.write().await;
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        let (response_tx, response_rx) = oneshot::channel();
        self.pending_requests.write().await.insert(id, response_tx);

        let request = Request {
            id,
            command,
            timeout_ms: None,
        };
        let json = serde_json::to_string(&request)?;

        if let Err(e) = tx.send(json).await {
            self.pending_requests.write().await.remove(&id);
            return Err(e).context("Failed to send to extension");
        }

        let response = match tokio::time::timeout(timeout, response_rx).await {
            Ok(response) => response.context("Response channel closed")?,
            Err(_) => {
                self.pending_requests.write().await.remove(&id);
                bail!("Timeout waiting for response after {}ms", timeout.as_millis());
            }
        };

        Ok(response)
    }

    pub async fn is_connected(&self) -> bool {
        self.extension_tx.read().await.is_some()
    }
}

pub async fn run_server_daemon(port: u16) {
    let state = ServerState::new();
    if let Err(e) = start_server(port, state).await {
        log::error!("WebSocket server error: {:#}", e);
    }
}

pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("WebSocket server listening on {}", addr);
    serve(listener, state).await
}

pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        log::debug!("New connection from {}", peer);
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state).await {
                log::error!("Connection error: {:#}", e);
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) -> Result<()> {
    let mut ws_stream = accept_async(stream).await?;

    let hello = loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => {
                break serde_json::from_str::<Hello>(&text)
                    .with_context(|| format!("Expected hello, got: {}", text.as_str()))?;
            }
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    };

    match hello.client_type {
        ClientType::Extension => handle_extension(ws_stream, state).await,
        ClientType::Client => handle_client(ws_stream, state).await,
    }
}

async fn handle_extension(
    ws_stream: WebSocketStream<TcpStream>,
    state: Arc<ServerState>,
) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (tx, mut rx) = mpsc::channel::<String>(32);
    if state.extension_tx.write().await.replace(tx).is_some() {
        log::warn!("Extension reconnected, replacing previous connection");
    }
    log::info!("Extension connected");

    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                ws_tx.send(Message::Text(msg.into())).await?;
            }
            Some(msg) = ws_rx.next() => {
                match msg {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ResponseMessage>(&text) {
                            Ok(response_msg) => {
                                if let Some(tx) = state.pending_requests.write().await.remove(&response_msg.id) {
                                    let _ = tx.send(response_msg.response);
                                }
                            }
                            Err(e) => log::debug!("Ignoring extension message: {}", e),
                        }
                    }
                    Ok(Message::Close(_)) => {
                        log::info!("Extension disconnected");
                        break;
                    }
                    Err(e) => {
                        log::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            else => break,
        }
    }

    *state.extension_tx.write().await = None;
    Ok(())
}

/// Relay requests from a command client to the extension, answering each
/// with the client's own request id.
async fn handle_client(ws_stream: WebSocketStream<TcpStream>, state: Arc<ServerState>) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<ResponseMessage>(32);
    log::debug!("Command client connected");

    loop {
        tokio::select! {
            Some(reply) = rx.recv() => {
                let json = serde_json::to_string(&reply)?;
                ws_tx.send(Message::Text(json.into())).await?;
            }
            Some(msg) = ws_rx.next() => {
                match msg {
                    Ok(Message::Text(text)) => {
                        let request = match serde_json::from_str::<Request>(&text) {
                            Ok(request) => request,
                            Err(e) => {
                                log::warn!("Malformed client request: {}", e);
                                continue;
                            }
                        };
                        let state = state.clone();
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            let timeout = request
                                .timeout_ms
                                .map(Duration::from_millis)
                                .unwrap_or(DEFAULT_COMMAND_TIMEOUT);
                            let response = state
                                .send_command_with_timeout(request.command, timeout)
                                .await
                                .unwrap_or_else(|e| Response::Error { message: format!("{:#}", e) });
                            let _ = tx.send(ResponseMessage { id: request.id, response }).await;
                        });
                    }
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        log::debug!("Client connection error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            else => break,
        }
    }

    log::debug!("Command client disconnected");
    Ok(())
}
