//! Broker transports.
//!
//! A [`Transport`] opens connections. Each [`EstablishedConnection`] pairs
//! the connection with a [`FaultReceiver`] that resolves once the
//! connection dies, which lets the channel sender react to failures that
//! happen between publishes.

mod memory;
mod tcp;

pub use memory::MemoryBroker;
pub use tcp::{read_frame, write_frame, Frame, TcpTransport};

use crate::channel::ChannelSettings;
use crate::error::TransportError;
use crate::message::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tessera_common::{keys, ConfigError, ConfigResult};
use tokio::sync::oneshot;

/// Opens connections to a broker.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects and authenticates with the given settings.
    ///
    /// [`TransportError::Rejected`] means the settings will never work;
    /// every other error may succeed on a later attempt.
    async fn connect(&self, settings: &ChannelSettings)
        -> Result<EstablishedConnection, TransportError>;
}

/// A live connection to a broker.
#[async_trait]
pub trait TransportConnection: Send + Sync {
    /// Publishes one message; returns after the broker accepted it.
    async fn publish(&self, message: &Message) -> Result<(), TransportError>;

    /// Releases the connection. Must be safe to call on a dead connection.
    async fn close(&self);
}

/// A connection together with its fault notification.
pub struct EstablishedConnection {
    pub connection: Box<dyn TransportConnection>,
    pub faults: FaultReceiver,
}

impl EstablishedConnection {
    pub fn new(connection: Box<dyn TransportConnection>, faults: FaultReceiver) -> Self {
        Self { connection, faults }
    }
}

/// Creates a connected fault notifier/receiver pair.
pub fn fault_channel() -> (FaultNotifier, FaultReceiver) {
    let (tx, rx) = oneshot::channel();
    (FaultNotifier(tx), FaultReceiver(rx))
}

/// Transport-side half of a fault notification. Dropping it without
/// notifying also counts as a fault.
#[derive(Debug)]
pub struct FaultNotifier(oneshot::Sender<TransportError>);

impl FaultNotifier {
    pub fn notify(self, error: TransportError) {
        let _ = self.0.send(error);
    }
}

#[derive(Debug)]
pub struct FaultReceiver(oneshot::Receiver<TransportError>);

impl FaultReceiver {
    /// Waits until the connection reports a fatal error.
    ///
    /// Must not be polled again after it returned.
    pub async fn recv(&mut self) -> TransportError {
        match (&mut self.0).await {
            Ok(error) => error,
            Err(_) => TransportError::ConnectionLost("fault notifier dropped".to_string()),
        }
    }
}

/// Transports keyed by the scheme of `transport.url`.
///
/// The default registry knows `tcp`.
pub struct TransportRegistry {
    transports: RwLock<HashMap<String, Arc<dyn Transport>>>,
}

impl Default for TransportRegistry {
    fn default() -> Self {
        let registry = Self::empty();
        registry.register("tcp", Arc::new(TcpTransport::default()));
        registry
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transports = self.transports.read().unwrap();
        let mut schemes: Vec<_> = transports.keys().collect();
        schemes.sort();
        f.debug_struct("TransportRegistry")
            .field("schemes", &schemes)
            .finish()
    }
}

impl TransportRegistry {
    pub fn empty() -> Self {
        Self {
            transports: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `transport` for `scheme`, replacing any earlier registration.
    pub fn register(&self, scheme: impl Into<String>, transport: Arc<dyn Transport>) {
        self.transports
            .write()
            .unwrap()
            .insert(scheme.into(), transport);
    }

    pub fn get(&self, scheme: &str) -> ConfigResult<Arc<dyn Transport>> {
        self.transports
            .read()
            .unwrap()
            .get(scheme)
            .cloned()
            .ok_or_else(|| ConfigError::InvalidProperty {
                key: keys::TRANSPORT_URL.to_string(),
                reason: format!("no transport registered for scheme {scheme:?}"),
            })
    }
}
