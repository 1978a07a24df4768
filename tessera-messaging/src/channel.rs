//! The broker-backed sender that survives connection loss.

use crate::error::{MessagingError, MessagingResult, TransportError};
use crate::manager::SenderStrategy;
use crate::message::Message;
use crate::sender::MessageSender;
use crate::transport::{EstablishedConnection, Transport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tessera_common::{keys, ConfigError, ConfigResult, Properties};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_CLIENT_ID: &str = "tessera";

/// Validated connection settings for a [`ResilientChannelSender`].
#[derive(Clone)]
pub struct ChannelSettings {
    /// Transport descriptor, `scheme://address`.
    pub url: String,
    pub user: Option<String>,
    pub password: String,
    pub client_id: String,
    /// Delay before the first reconnect attempt after a failure.
    pub reconnect_delay: Duration,
    /// Upper bound for the doubling reconnect delay.
    pub max_reconnect_delay: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: None,
            password: String::new(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            reconnect_delay: Duration::from_millis(100),
            max_reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl std::fmt::Debug for ChannelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("max_reconnect_delay", &self.max_reconnect_delay)
            .finish()
    }
}

impl ChannelSettings {
    /// Reads `transport.*` settings. The password is required and may come
    /// from `transport.password` or from the file named by
    /// `transport.password.file`; the file is read here and only here.
    pub fn from_properties(properties: &Properties) -> ConfigResult<Self> {
        let url = properties.require(keys::TRANSPORT_URL)?.to_string();
        let settings = Self {
            url,
            user: properties.get(keys::TRANSPORT_USER).map(str::to_string),
            password: properties
                .require_credential(keys::TRANSPORT_PASSWORD, keys::TRANSPORT_PASSWORD_FILE)?,
            client_id: properties
                .get(keys::TRANSPORT_CLIENT_ID)
                .unwrap_or(DEFAULT_CLIENT_ID)
                .to_string(),
            ..Self::default()
        };
        settings.scheme()?;
        Ok(settings)
    }

    /// The part of the URL before `://`.
    pub fn scheme(&self) -> ConfigResult<&str> {
        match self.url.split_once("://") {
            Some((scheme, _)) if !scheme.is_empty() => Ok(scheme),
            _ => Err(ConfigError::InvalidProperty {
                key: keys::TRANSPORT_URL.to_string(),
                reason: format!("expected scheme://address, got {:?}", self.url),
            }),
        }
    }

    /// The part of the URL after `://`, or the whole URL without a scheme.
    pub fn address(&self) -> &str {
        self.url
            .split_once("://")
            .map_or(self.url.as_str(), |(_, address)| address)
    }
}

/// Lifecycle of a [`ResilientChannelSender`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Connected,
    Closed,
}

enum Command {
    Deliver {
        message: Message,
        reply: oneshot::Sender<MessagingResult<()>>,
    },
}

/// A [`MessageSender`] backed by a broker connection that repairs itself.
///
/// One background task owns the connection and processes deliveries in
/// submission order. When the transport reports a fault, or a publish
/// fails, the task drops the connection, reconnects with a doubling delay
/// for as long as it takes, and retries the message in flight. Callers only
/// see a send take longer.
///
/// Dropping the sender stops the task, as does [`ResilientChannelSender::stop`].
pub struct ResilientChannelSender {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ChannelState>,
    shutdown: watch::Sender<bool>,
    reconnects: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ResilientChannelSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientChannelSender")
            .field("state", &self.state())
            .field("reconnects", &self.reconnect_count())
            .finish_non_exhaustive()
    }
}

impl ResilientChannelSender {
    /// Connects through `transport` and starts the delivery task.
    ///
    /// Waits until the first connection is established, retrying
    /// unreachable brokers indefinitely. A broker that refuses the settings
    /// fails construction with a configuration error.
    pub async fn connect(
        settings: ChannelSettings,
        transport: Arc<dyn Transport>,
    ) -> MessagingResult<Self> {
        let mut delay = settings.reconnect_delay;
        let connection = loop {
            match transport.connect(&settings).await {
                Ok(connection) => break connection,
                Err(TransportError::Rejected(reason)) => {
                    return Err(ConfigError::Rejected(reason).into());
                }
                Err(err) => {
                    warn!(url = %settings.url, error = %err, ?delay, "broker unreachable, retrying");
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay, settings.max_reconnect_delay);
                }
            }
        };
        info!(url = %settings.url, client_id = %settings.client_id, "channel connected");

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ChannelState::Connected);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let reconnects = Arc::new(AtomicU64::new(0));

        let worker = ChannelWorker {
            settings,
            transport,
            commands: command_rx,
            state: state_tx,
            shutdown: shutdown_rx,
            reconnects: reconnects.clone(),
        };
        let handle = tokio::spawn(worker.run(connection));

        Ok(Self {
            commands,
            state,
            shutdown,
            reconnects,
            worker: Mutex::new(Some(handle)),
        })
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Successful reconnects since construction.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Closes the connection and fails every pending and future send with
    /// [`MessagingError::ChannelClosed`]. Calling it again does nothing.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let worker = self.worker.lock().unwrap().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

#[async_trait]
impl MessageSender for ResilientChannelSender {
    async fn deliver(&self, message: Message) -> MessagingResult<()> {
        let stopped = *self.shutdown.borrow();
        if stopped {
            return Err(MessagingError::ChannelClosed);
        }
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Deliver { message, reply })
            .map_err(|_| MessagingError::ChannelClosed)?;
        response.await.unwrap_or(Err(MessagingError::ChannelClosed))
    }

    fn strategy(&self) -> Option<SenderStrategy> {
        Some(SenderStrategy::Channel)
    }
}

impl Drop for ResilientChannelSender {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

fn next_delay(delay: Duration, max: Duration) -> Duration {
    (delay * 2).min(max)
}

struct ChannelWorker {
    settings: ChannelSettings,
    transport: Arc<dyn Transport>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ChannelState>,
    shutdown: watch::Receiver<bool>,
    reconnects: Arc<AtomicU64>,
}

impl ChannelWorker {
    async fn run(mut self, mut current: EstablishedConnection) {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => break,

                fault = current.faults.recv() => {
                    warn!(url = %self.settings.url, error = %fault, "transport fault, reconnecting");
                    if !self.reconnect(&mut current).await {
                        break;
                    }
                }

                command = self.commands.recv() => match command {
                    Some(Command::Deliver { message, reply }) => {
                        let result = self.deliver(&mut current, message).await;
                        let closed = matches!(result, Err(MessagingError::ChannelClosed));
                        let _ = reply.send(result);
                        if closed {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        self.close(current).await;
    }

    /// Publishes `message`, reconnecting and retrying until it is accepted.
    /// A stop request abandons the publish even when the broker never answers.
    async fn deliver(
        &mut self,
        current: &mut EstablishedConnection,
        message: Message,
    ) -> MessagingResult<()> {
        loop {
            let published = tokio::select! {
                biased;
                _ = self.shutdown.changed() => return Err(MessagingError::ChannelClosed),
                published = current.connection.publish(&message) => published,
            };
            match published {
                Ok(()) => {
                    debug!(destination = %message.destination, "message published");
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        destination = %message.destination,
                        error = %err,
                        "publish failed, reconnecting"
                    );
                    if !self.reconnect(current).await {
                        return Err(MessagingError::ChannelClosed);
                    }
                }
            }
        }
    }

    /// Replaces `current` with a fresh connection. Returns `false` if the
    /// sender was stopped first.
    async fn reconnect(&mut self, current: &mut EstablishedConnection) -> bool {
        self.state.send_replace(ChannelState::Connecting);
        current.connection.close().await;

        let mut delay = self.settings.reconnect_delay;
        loop {
            let attempt = tokio::select! {
                biased;
                _ = self.shutdown.changed() => return false,
                attempt = self.transport.connect(&self.settings) => attempt,
            };
            match attempt {
                Ok(next) => {
                    *current = next;
                    let count = self.reconnects.fetch_add(1, Ordering::SeqCst) + 1;
                    self.state.send_replace(ChannelState::Connected);
                    info!(url = %self.settings.url, reconnects = count, "channel reconnected");
                    return true;
                }
                Err(err) => {
                    warn!(url = %self.settings.url, error = %err, ?delay, "reconnect attempt failed");
                    tokio::select! {
                        biased;
                        _ = self.shutdown.changed() => return false,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = next_delay(delay, self.settings.max_reconnect_delay);
                }
            }
        }
    }

    async fn close(mut self, current: EstablishedConnection) {
        current.connection.close().await;
        self.state.send_replace(ChannelState::Closed);
        self.commands.close();
        while let Ok(Command::Deliver { reply, .. }) = self.commands.try_recv() {
            let _ = reply.send(Err(MessagingError::ChannelClosed));
        }
        info!(url = %self.settings.url, "channel closed");
    }
}
