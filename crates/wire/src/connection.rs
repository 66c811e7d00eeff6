use cubewright_core::{Command, SessionParams};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::codec::{Codec, ReadOutcome};
use crate::error::{Result, WireError};
use crate::types::{JointsResponse, ReadMode};

/// Dials the simulation server and runs the password handshake.
///
/// Cheap to clone; every unit of work in a batch holds its own copy.
#[derive(Debug, Clone)]
pub struct Connector {
    params: Arc<SessionParams>,
    codec: Codec,
    read_mode: ReadMode,
}

impl Connector {
    pub fn new(params: SessionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            codec: Codec::new(params.sentinel.clone()),
            params: Arc::new(params),
            read_mode: ReadMode::default(),
        })
    }

    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn read_mode(&self) -> ReadMode {
        self.read_mode
    }

    /// Establish the transport without authenticating.
    pub async fn open(&self) -> Result<Connection> {
        let address = &self.params.address;
        let stream = timeout(self.params.connect_timeout, TcpStream::connect(address.as_str()))
            .await
            .map_err(|_| WireError::Connect {
                address: address.clone(),
                reason: "connect timed out".to_string(),
            })?
            .map_err(|e| WireError::Connect {
                address: address.clone(),
                reason: e.to_string(),
            })?;

        stream.set_nodelay(true).map_err(|e| WireError::Connect {
            address: address.clone(),
            reason: e.to_string(),
        })?;

        Ok(Connection {
            stream,
            codec: self.codec.clone(),
            read_timeout: self.params.read_timeout,
            read_mode: self.read_mode,
            peer: address.clone(),
        })
    }

    /// Send the shared secret as the first frame and read one reply.
    ///
    /// The reply content is not inspected; any text, including none, counts
    /// as accepted unless the connector is in strict read mode.
    pub async fn authenticate(&self, conn: &mut Connection) -> Result<String> {
        let frame = self.codec.encode_text(&self.params.password)?;
        conn.write_frame(&frame).await?;
        let ack = conn.receive_checked().await?;
        debug!(peer = %conn.peer, ack_len = ack.len(), "Authenticated");
        Ok(ack)
    }

    /// Open and authenticate a connection ready for commands.
    pub async fn connect(&self) -> Result<Connection> {
        let mut conn = self.open().await?;
        self.authenticate(&mut conn).await?;
        Ok(conn)
    }

    /// Per-operation pattern: connect, send one command, optionally read
    /// one reply, close.
    pub async fn oneshot(&self, command: &Command, expect_reply: bool) -> Result<Option<String>> {
        let mut conn = self.connect().await?;
        conn.send(command).await?;
        let reply = if expect_reply {
            Some(conn.receive_checked().await?)
        } else {
            None
        };
        conn.close().await;
        Ok(reply)
    }

    /// Ask the server which joints touch `cube_name`.
    pub async fn query_joints(&self, cube_name: &str) -> Result<Vec<String>> {
        let reply = self
            .oneshot(&Command::joints_for(cube_name), true)
            .await?
            .unwrap_or_default();

        let parsed: JointsResponse = serde_json::from_str(&reply).map_err(|e| {
            WireError::Decode(format!("joints for {}: {} (reply: {:?})", cube_name, e, reply))
        })?;
        Ok(parsed.joints)
    }
}

/// One authenticated TCP connection. Commands on it are strictly sequential.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    codec: Codec,
    read_timeout: Duration,
    read_mode: ReadMode,
    peer: String,
}

impl Connection {
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub async fn send(&mut self, command: &Command) -> Result<()> {
        let frame = self.codec.encode(command)?;
        self.write_frame(&frame).await?;
        debug!(
            peer = %self.peer,
            command = command.kind(),
            subject = command.subject(),
            "Command sent"
        );
        Ok(())
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.stream.write_all(frame).await.map_err(WireError::Write)?;
        self.stream.flush().await.map_err(WireError::Write)
    }

    /// One bounded decode cycle, reporting exactly how it ended.
    pub async fn receive(&mut self) -> ReadOutcome {
        self.codec.decode(&mut self.stream, self.read_timeout).await
    }

    /// One bounded decode cycle filtered through the connection's read mode.
    pub async fn receive_checked(&mut self) -> Result<String> {
        let outcome = self.receive().await;
        if !outcome.is_complete() {
            warn!(
                component = "connection",
                peer = %self.peer,
                status = ?outcome.status,
                received = outcome.received,
                "Response ended before sentinel"
            );
        }
        outcome.into_checked(self.read_mode)
    }

    /// Send a command and read its reply.
    pub async fn request(&mut self, command: &Command) -> Result<String> {
        self.send(command).await?;
        self.receive_checked().await
    }

    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(peer = %self.peer, error = %e, "Shutdown failed");
        }
    }
}
