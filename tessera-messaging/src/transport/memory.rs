use super::{fault_channel, EstablishedConnection, FaultNotifier, Transport, TransportConnection};
use crate::channel::ChannelSettings;
use crate::error::TransportError;
use crate::message::{DestinationKind, Message};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// An in-process broker.
///
/// Queues buffer messages until a consumer subscribes and deliver each
/// message to one consumer. Topics fan out to the subscribers present at
/// publish time. The broker can refuse connections and sever live ones,
/// which makes it the usual backend for exercising reconnection.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Default)]
struct BrokerInner {
    state: Mutex<BrokerState>,
    credentials: Option<(Option<String>, String)>,
    connects: AtomicU64,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    topics: HashMap<String, Vec<mpsc::UnboundedSender<Message>>>,
    links: Vec<Arc<Link>>,
    unavailable: bool,
}

#[derive(Default)]
struct QueueState {
    backlog: VecDeque<Message>,
    consumer: Option<mpsc::UnboundedSender<Message>>,
}

struct Link {
    open: AtomicBool,
    notifier: Mutex<Option<FaultNotifier>>,
}

impl Link {
    fn shut(&self) -> Option<FaultNotifier> {
        self.open.store(false, Ordering::SeqCst);
        self.notifier.lock().unwrap().take()
    }
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock().unwrap();
        f.debug_struct("MemoryBroker")
            .field("queues", &state.queues.len())
            .field("topics", &state.topics.len())
            .field("live_connections", &state.links.len())
            .finish_non_exhaustive()
    }
}

impl MemoryBroker {
    /// A broker that accepts any credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker that only accepts the given user and password.
    pub fn with_credentials(user: Option<&str>, password: &str) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                credentials: Some((user.map(str::to_string), password.to_string())),
                ..BrokerInner::default()
            }),
        }
    }

    /// Attaches the consumer of `queue`, replacing any previous one.
    /// Buffered messages are handed over first.
    pub fn subscribe_queue(&self, queue: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.state.lock().unwrap();
        let entry = state.queues.entry(queue.to_string()).or_default();
        while let Some(message) = entry.backlog.pop_front() {
            let _ = tx.send(message);
        }
        entry.consumer = Some(tx);
        rx
    }

    pub fn subscribe_topic(&self, topic: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .state
            .lock()
            .unwrap()
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Messages waiting in `queue` for a consumer.
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.inner
            .state
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map_or(0, |q| q.backlog.len())
    }

    /// Makes later connection attempts fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.inner.state.lock().unwrap().unavailable = !available;
    }

    /// Kills every live connection and reports the fault to its owner.
    /// Returns the number of connections severed.
    pub fn sever_connections(&self) -> usize {
        let links = std::mem::take(&mut self.inner.state.lock().unwrap().links);
        let count = links.len();
        for link in links {
            if let Some(notifier) = link.shut() {
                notifier.notify(TransportError::ConnectionLost(
                    "connection severed by broker".to_string(),
                ));
            }
        }
        debug!(count, "severed broker connections");
        count
    }

    /// Successful connections accepted since the broker was created.
    pub fn connection_count(&self) -> u64 {
        self.inner.connects.load(Ordering::SeqCst)
    }

    fn route(&self, message: &Message) {
        let mut state = self.inner.state.lock().unwrap();
        let name = message.destination.name.clone();
        match message.destination.kind {
            DestinationKind::Queue => {
                let queue = state.queues.entry(name).or_default();
                let undelivered = match &queue.consumer {
                    Some(consumer) => consumer.send(message.clone()).err().map(|e| e.0),
                    None => Some(message.clone()),
                };
                if let Some(message) = undelivered {
                    queue.consumer = None;
                    queue.backlog.push_back(message);
                }
            }
            DestinationKind::Topic => {
                if let Some(subscribers) = state.topics.get_mut(&name) {
                    subscribers.retain(|s| s.send(message.clone()).is_ok());
                }
            }
        }
    }

    fn check_credentials(&self, settings: &ChannelSettings) -> Result<(), TransportError> {
        match &self.inner.credentials {
            Some((user, password)) if *user != settings.user || *password != settings.password => {
                Err(TransportError::Rejected("invalid credentials".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for MemoryBroker {
    async fn connect(
        &self,
        settings: &ChannelSettings,
    ) -> Result<EstablishedConnection, TransportError> {
        self.check_credentials(settings)?;

        let (notifier, faults) = fault_channel();
        let link = Arc::new(Link {
            open: AtomicBool::new(true),
            notifier: Mutex::new(Some(notifier)),
        });
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.unavailable {
                return Err(TransportError::Unavailable("broker is down".to_string()));
            }
            state.links.push(link.clone());
        }
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        debug!(client_id = %settings.client_id, "memory broker accepted connection");

        let connection = MemoryConnection {
            broker: self.clone(),
            link,
        };
        Ok(EstablishedConnection::new(Box::new(connection), faults))
    }
}

struct MemoryConnection {
    broker: MemoryBroker,
    link: Arc<Link>,
}

#[async_trait]
impl TransportConnection for MemoryConnection {
    async fn publish(&self, message: &Message) -> Result<(), TransportError> {
        if !self.link.open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionLost(
                "connection is closed".to_string(),
            ));
        }
        self.broker.route(message);
        Ok(())
    }

    async fn close(&self) {
        // The notifier is dropped without a fault; nobody listens anymore.
        drop(self.link.shut());
        self.broker
            .inner
            .state
            .lock()
            .unwrap()
            .links
            .retain(|l| !Arc::ptr_eq(l, &self.link));
    }
}
