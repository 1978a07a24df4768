//! The sender contract and its fluent builder.

use crate::error::{MessagingError, MessagingResult};
use crate::manager::SenderStrategy;
use crate::message::{Destination, Message, MessageBody};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Something that can deliver a fully addressed [`Message`].
///
/// Most callers never call [`MessageSender::deliver`] directly and use the
/// builder from [`MessageSenderExt`] instead.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Hands the message to the underlying transport.
    ///
    /// Returns once the transport accepted the message.
    async fn deliver(&self, message: Message) -> MessagingResult<()>;

    /// The built-in strategy this sender implements, if any.
    fn strategy(&self) -> Option<SenderStrategy> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Text,
    Bytes,
}

/// Fluent entry points available on every [`MessageSender`].
pub trait MessageSenderExt: MessageSender {
    /// Starts a message that will be delivered as a text body.
    fn send<T>(&self, payload: T) -> AddressedMessage<'_, Self, T> {
        AddressedMessage::new(self, payload, BodyKind::Text)
    }

    /// Starts a message that will be delivered as a byte body.
    fn send_binary<T>(&self, payload: T) -> AddressedMessage<'_, Self, T> {
        AddressedMessage::new(self, payload, BodyKind::Bytes)
    }
}

impl<S: MessageSender + ?Sized> MessageSenderExt for S {}

/// A message under construction.
///
/// `to_queue` and `to_topic` overwrite each other, and `add_header` keeps
/// the last value per name. Nothing is sent until one of the terminal
/// encoders runs; they consume the builder so it cannot be sent twice.
#[must_use = "a message is only sent by as_string or as_json"]
pub struct AddressedMessage<'a, S: ?Sized, T> {
    sender: &'a S,
    payload: T,
    kind: BodyKind,
    destination: Option<Destination>,
    headers: BTreeMap<String, String>,
}

impl<'a, S, T> AddressedMessage<'a, S, T>
where
    S: MessageSender + ?Sized,
{
    fn new(sender: &'a S, payload: T, kind: BodyKind) -> Self {
        Self {
            sender,
            payload,
            kind,
            destination: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn to_queue(mut self, name: impl Into<String>) -> Self {
        self.destination = Some(Destination::queue(name));
        self
    }

    pub fn to_topic(mut self, name: impl Into<String>) -> Self {
        self.destination = Some(Destination::topic(name));
        self
    }

    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Encodes the payload with its `Display` form and sends it.
    pub async fn as_string(self) -> MessagingResult<()>
    where
        T: Display,
    {
        let (sender, message) = self.into_message(|payload| Ok(payload.to_string()))?;
        sender.deliver(message).await
    }

    /// Encodes the payload as JSON and sends it.
    pub async fn as_json(self) -> MessagingResult<()>
    where
        T: Serialize,
    {
        let (sender, message) = self.into_message(|payload| Ok(serde_json::to_string(payload)?))?;
        sender.deliver(message).await
    }

    fn into_message(
        self,
        encode: impl FnOnce(&T) -> MessagingResult<String>,
    ) -> MessagingResult<(&'a S, Message)> {
        let destination = self.destination.ok_or(MessagingError::MissingDestination)?;
        let text = encode(&self.payload)?;
        let body = match self.kind {
            BodyKind::Text => MessageBody::Text(text),
            BodyKind::Bytes => MessageBody::Bytes(text.into_bytes()),
        };
        let message = Message {
            destination,
            headers: self.headers,
            body,
        };
        Ok((self.sender, message))
    }
}
