#![allow(dead_code)]

use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tessera_common::{keys, Properties};
use tessera_messaging::{ChannelSettings, Message, MessageSender, MessagingResult};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

pub const WAIT: Duration = Duration::from_secs(5);

/// Routes test logs through `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Keeps every delivered message for inspection.
#[derive(Default)]
pub struct RecordingSender {
    pub messages: Mutex<Vec<Message>>,
}

impl RecordingSender {
    pub fn taken(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn deliver(&self, message: Message) -> MessagingResult<()> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

pub fn broker_properties(scheme: &str) -> Properties {
    Properties::new()
        .with(keys::TRANSPORT_URL, format!("{scheme}://local"))
        .with(keys::TRANSPORT_USER, "app")
        .with(keys::TRANSPORT_PASSWORD, "secret")
}

/// Settings with short reconnect delays so tests do not crawl.
pub fn fast_settings(url: &str) -> ChannelSettings {
    ChannelSettings {
        url: url.to_string(),
        user: Some("app".to_string()),
        password: "secret".to_string(),
        reconnect_delay: Duration::from_millis(10),
        max_reconnect_delay: Duration::from_millis(50),
        ..ChannelSettings::default()
    }
}

pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("timed out")
}

pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    within(rx.recv()).await.expect("subscription closed")
}

/// Polls `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}
