//! Resilient message sending for Tessera.
//!
//! Callers obtain an [`Arc<dyn MessageSender>`](MessageSender) from a
//! [`MessageSenderManager`] and address messages with the fluent builder
//! from [`MessageSenderExt`]:
//!
//! ```no_run
//! # async fn demo() -> tessera_messaging::MessagingResult<()> {
//! use tessera_common::Properties;
//! use tessera_messaging::{MessageSenderExt, MessageSenderManager};
//!
//! struct Billing;
//!
//! let manager = MessageSenderManager::new();
//! let sender = manager.get_message_sender::<Billing>(&Properties::new()).await?;
//! sender
//!     .send("invoice 42 paid")
//!     .to_queue("billing.events")
//!     .add_header("tenant", "acme")
//!     .as_string()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! The broker-backed [`ResilientChannelSender`] owns its connection on a
//! background task. Transport faults trigger a reconnect and the message in
//! flight is retried, so callers never observe a lost connection.

mod channel;
mod error;
mod logging;
mod manager;
mod message;
mod sender;
pub mod transport;

pub use channel::{ChannelSettings, ChannelState, ResilientChannelSender};
pub use error::{MessagingError, MessagingResult, TransportError};
pub use logging::LoggingSender;
pub use manager::{MessageSenderManager, SenderStrategy};
pub use message::{Destination, DestinationKind, Message, MessageBody};
pub use sender::{AddressedMessage, MessageSender, MessageSenderExt};
pub use transport::{MemoryBroker, TcpTransport, Transport, TransportRegistry};
