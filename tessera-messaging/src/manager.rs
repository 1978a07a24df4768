//! Per-consumer sender resolution.

use crate::channel::{ChannelSettings, ResilientChannelSender};
use crate::error::{MessagingError, MessagingResult};
use crate::logging::LoggingSender;
use crate::sender::MessageSender;
use crate::transport::{Transport, TransportRegistry};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tessera_common::{keys, Properties, Strategy, StrategyBindings};
use tokio::sync::OnceCell;
use tracing::info;

/// The sender implementations a [`MessageSenderManager`] can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenderStrategy {
    /// A [`ResilientChannelSender`] on the transport named by `transport.url`.
    Channel,
    /// A [`LoggingSender`].
    Logging,
}

impl Strategy for SenderStrategy {
    fn from_properties(properties: &Properties) -> Self {
        if properties.contains_key(keys::TRANSPORT_URL) {
            SenderStrategy::Channel
        } else {
            SenderStrategy::Logging
        }
    }
}

type SenderSlot = Arc<OnceCell<Arc<dyn MessageSender>>>;

/// Hands out message senders per consuming type.
///
/// Resolution follows the same order as repositories: a strategy bound to
/// the consumer type, then the default strategy, then the properties. One
/// sender is built per (strategy, consumer type) and shared afterwards.
/// Concurrent first calls wait for a single construction; a failed
/// construction is not remembered.
pub struct MessageSenderManager {
    bindings: StrategyBindings<SenderStrategy>,
    transports: TransportRegistry,
    instances: Mutex<HashMap<(SenderStrategy, TypeId), SenderSlot>>,
}

impl Default for MessageSenderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageSenderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSenderManager")
            .field("bindings", &self.bindings)
            .field("transports", &self.transports)
            .finish_non_exhaustive()
    }
}

impl MessageSenderManager {
    pub fn new() -> Self {
        Self::with_transports(TransportRegistry::default())
    }

    pub fn with_transports(transports: TransportRegistry) -> Self {
        Self {
            bindings: StrategyBindings::new(),
            transports,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Makes `transport` available for `scheme://` URLs.
    pub fn register_transport(&self, scheme: impl Into<String>, transport: Arc<dyn Transport>) {
        self.transports.register(scheme, transport);
    }

    pub fn set_strategy<C: 'static>(&self, strategy: SenderStrategy) {
        self.bindings.set_strategy::<C>(strategy);
    }

    /// `None` restores configuration-driven resolution.
    pub fn set_default_strategy(&self, strategy: Option<SenderStrategy>) {
        self.bindings.set_default_strategy(strategy);
    }

    /// Removes all bindings and forgets cached senders. Channel senders
    /// nobody else holds are stopped when dropped.
    pub fn default_settings(&self) {
        self.bindings.default_settings();
        self.instances.lock().unwrap().clear();
    }

    pub fn strategy_for<C: 'static>(&self, properties: &Properties) -> SenderStrategy {
        self.bindings.resolve(TypeId::of::<C>(), properties)
    }

    /// Returns the sender for consumer type `C`, creating it on first use.
    ///
    /// Creating a channel sender waits until the broker accepts the first
    /// connection.
    pub async fn get_message_sender<C: 'static>(
        &self,
        properties: &Properties,
    ) -> MessagingResult<Arc<dyn MessageSender>> {
        let strategy = self.strategy_for::<C>(properties);
        let slot = self
            .instances
            .lock()
            .unwrap()
            .entry((strategy, TypeId::of::<C>()))
            .or_default()
            .clone();

        let sender = slot
            .get_or_try_init(|| async {
                let sender = self.create(strategy, properties).await?;
                info!(consumer = std::any::type_name::<C>(), ?strategy, "created message sender");
                Ok::<_, MessagingError>(sender)
            })
            .await?;
        Ok(sender.clone())
    }

    async fn create(
        &self,
        strategy: SenderStrategy,
        properties: &Properties,
    ) -> MessagingResult<Arc<dyn MessageSender>> {
        match strategy {
            SenderStrategy::Logging => Ok(Arc::new(LoggingSender::new())),
            SenderStrategy::Channel => {
                let settings = ChannelSettings::from_properties(properties)?;
                let transport = self.transports.get(settings.scheme()?)?;
                let sender = ResilientChannelSender::connect(settings, transport).await?;
                Ok(Arc::new(sender))
            }
        }
    }
}
