//! Line-delimited JSON over TCP.
//!
//! Every frame is one JSON object on its own line, tagged by `type`:
//!
//! ```text
//! client -> {"type":"connect","client_id":"svc","user":"app","password":"..."}
//! broker <- {"type":"connected"}            or {"type":"refused","reason":"..."}
//! client -> {"type":"publish","message":{...}}
//! broker <- {"type":"ack"}
//! ```
//!
//! Publishes are acknowledged in order. A publish whose acknowledgement
//! does not arrive within the ack timeout fails, and the channel retries it
//! on the next connection.

use super::{fault_channel, EstablishedConnection, FaultNotifier, Transport, TransportConnection};
use crate::channel::ChannelSettings;
use crate::error::TransportError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Connect {
        client_id: String,
        user: Option<String>,
        password: String,
    },
    Connected,
    Refused {
        reason: String,
    },
    Publish {
        message: Message,
    },
    Ack,
}

/// Writes one frame followed by a newline.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> io::Result<()> {
    let mut line = serde_json::to_vec(frame).map_err(io::Error::other)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

/// Reads the next frame, skipping blank lines. `None` means end of stream.
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<Frame>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            break;
        }
    }
    serde_json::from_str(line.trim_end())
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Transport for `tcp://host:port` URLs.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
    ack_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }
}

impl TcpTransport {
    /// Bounds both the TCP connect and the handshake.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ..Self::default()
        }
    }

    /// How long a publish waits for its acknowledgement before the
    /// connection is considered dead.
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    async fn handshake(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        writer: &mut OwnedWriteHalf,
        settings: &ChannelSettings,
    ) -> Result<(), TransportError> {
        let hello = Frame::Connect {
            client_id: settings.client_id.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
        };
        write_frame(writer, &hello).await.map_err(unavailable)?;

        let reply = timeout(self.connect_timeout, read_frame(reader))
            .await
            .map_err(|_| TransportError::Unavailable("handshake timed out".to_string()))?
            .map_err(unavailable)?;
        match reply {
            Some(Frame::Connected) => Ok(()),
            Some(Frame::Refused { reason }) => Err(TransportError::Rejected(reason)),
            Some(other) => Err(TransportError::Unavailable(format!(
                "unexpected handshake reply: {other:?}"
            ))),
            None => Err(TransportError::Unavailable(
                "broker closed the connection during handshake".to_string(),
            )),
        }
    }
}

fn unavailable(err: io::Error) -> TransportError {
    TransportError::Unavailable(err.to_string())
}

fn lost(err: io::Error) -> TransportError {
    TransportError::ConnectionLost(err.to_string())
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(
        &self,
        settings: &ChannelSettings,
    ) -> Result<EstablishedConnection, TransportError> {
        let address = settings.address();
        let stream = timeout(self.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| TransportError::Unavailable(format!("connect to {address} timed out")))?
            .map_err(unavailable)?;
        let _ = stream.set_nodelay(true);

        let (read, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read);
        self.handshake(&mut reader, &mut writer, settings).await?;
        debug!(%address, client_id = %settings.client_id, "tcp transport connected");

        let (notifier, faults) = fault_channel();
        let (acks_tx, acks) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(read_loop(reader, acks_tx, notifier));

        let connection = TcpConnection {
            link: Mutex::new(TcpLink { writer, acks }),
            reader_task,
            ack_timeout: self.ack_timeout,
        };
        Ok(EstablishedConnection::new(Box::new(connection), faults))
    }
}

async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    acks: mpsc::UnboundedSender<()>,
    notifier: FaultNotifier,
) {
    let fault = loop {
        match read_frame(&mut reader).await {
            Ok(Some(Frame::Ack)) => {
                let _ = acks.send(());
            }
            Ok(Some(frame)) => debug!(?frame, "ignoring unexpected frame from broker"),
            Ok(None) => {
                break TransportError::ConnectionLost("broker closed the connection".to_string())
            }
            Err(err) => break lost(err),
        }
    };
    drop(acks);
    notifier.notify(fault);
}

struct TcpLink {
    writer: OwnedWriteHalf,
    acks: mpsc::UnboundedReceiver<()>,
}

struct TcpConnection {
    link: Mutex<TcpLink>,
    reader_task: JoinHandle<()>,
    ack_timeout: Duration,
}

#[async_trait]
impl TransportConnection for TcpConnection {
    async fn publish(&self, message: &Message) -> Result<(), TransportError> {
        let mut link = self.link.lock().await;
        let frame = Frame::Publish {
            message: message.clone(),
        };
        write_frame(&mut link.writer, &frame).await.map_err(lost)?;
        match timeout(self.ack_timeout, link.acks.recv()).await {
            Ok(Some(())) => Ok(()),
            Ok(None) => Err(TransportError::ConnectionLost(
                "connection closed before acknowledgement".to_string(),
            )),
            Err(_) => Err(TransportError::ConnectionLost(format!(
                "no acknowledgement within {:?}",
                self.ack_timeout
            ))),
        }
    }

    async fn close(&self) {
        self.reader_task.abort();
        let mut link = self.link.lock().await;
        let _ = link.writer.shutdown().await;
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
