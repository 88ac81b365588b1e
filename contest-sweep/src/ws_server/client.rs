use anyhow::{Context, Result, bail};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use super::{ClientType, Command, DEFAULT_COMMAND_TIMEOUT, Hello, Request, Response, ResponseMessage};

// Lets the daemon report its own timeout before ours fires.
const RELAY_GRACE: Duration = Duration::from_secs(2);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Connection {
    socket: Socket,
    next_id: u64,
}

/// Persistent command connection to a running bridge daemon.
pub struct RemoteBridge {
    connection: Mutex<Connection>,
}

impl RemoteBridge {
    pub async fn connect(port: u16) -> Result<Self> {
        let url = format!("ws://127.0.0.1:{}", port);
        let (mut socket, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to connect to bridge daemon at {}", url))?;

        let hello = serde_json::to_string(&Hello {
            client_type: ClientType::Client,
        })?;
        socket
            .send(Message::Text(hello.into()))
            .await
            .context("Failed to send hello")?;

        Ok(Self {
            connection: Mutex::new(Connection { socket, next_id: 1 }),
        })
    }

    /// Send one command and wait for its reply.
    ///
    /// `timeout` is forwarded to the daemon as the extension timeout. Calls are
    /// serialized on the connection.
    pub async fn send_command(&self, command: Command, timeout: Duration) -> Result<Response> {
        let mut connection = self.connection.lock().await;
        let id = connection.next_id;
        connection.next_id += 1;

        let request = Request {
            id,
            command,
            timeout_ms: Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
        };
        let json = serde_json::to_string(&request)?;
        connection
            .socket
            .send(Message::Text(json.into()))
            .await
            .context("Failed to send to bridge daemon")?;

        let wait = timeout.saturating_add(RELAY_GRACE);
        tokio::time::timeout(wait, read_reply(&mut connection.socket, id))
            .await
            .context("Timeout waiting for bridge daemon")?
    }

    /// True when the daemon answers and reports an attached extension.
    pub async fn is_connected(&self) -> bool {
        matches!(
            self.send_command(Command::GetStatus, DEFAULT_COMMAND_TIMEOUT).await,
            Ok(Response::Status { connected: true, .. })
        )
    }

    pub async fn close(self) -> Result<()> {
        let mut connection = self.connection.into_inner();
        connection.socket.close(None).await?;
        Ok(())
    }
}

async fn read_reply(socket: &mut Socket, id: u64) -> Result<Response> {
    while let Some(message) = socket.next().await {
        match message.context("Bridge connection error")? {
            Message::Text(text) => match serde_json::from_str::<ResponseMessage>(&text) {
                Ok(reply) if reply.id == id => return Ok(reply.response),
                Ok(reply) => log::debug!("Dropping stale reply {}", reply.id),
                Err(e) => log::debug!("Ignoring daemon message: {}", e),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    bail!("Bridge daemon closed the connection")
}

/// Connect, send a single command with the default timeout, disconnect.
pub async fn send_command_to_server(port: u16, command: Command) -> Result<Response> {
    let bridge = RemoteBridge::connect(port).await?;
    let response = bridge
        .send_command(command, DEFAULT_COMMAND_TIMEOUT)
        .await;
    if let Err(e) = bridge.close().await {
        log::debug!("Closing bridge connection failed: {}", e);
    }
    response
}
