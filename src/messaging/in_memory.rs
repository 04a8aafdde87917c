//! In-memory transport for testing and single-process scenarios.
//!
//! This module provides a thread-safe in-memory namespace of topics and
//! subscriptions plus a [`MessagingFactory`] over it, useful for:
//! - Unit and integration testing without a broker
//! - Single-process applications
//! - Development and prototyping

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::endpoint::{ReceiveMode, SubscriptionClient, TopicClient};
use super::envelope::{BrokeredMessage, LockToken};
use super::error::{MessagingError, TransportError};
use super::factory::MessagingFactory;

/// Topics and subscriptions living in process memory.
///
/// Features:
/// - Thread-safe (can be shared across threads via `Clone`)
/// - Every subscription of a topic receives its own copy of each message
/// - Clients on the same subscription compete for messages
/// - Reachability can be switched off to simulate a lost connection
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use bus_composition::messaging::{
///     BrokeredMessage, InMemoryMessagingFactory, InMemoryNamespace, MessagingFactory,
///     ReceiveMode,
/// };
///
/// let namespace = InMemoryNamespace::new();
/// namespace.create_topic("orders");
/// namespace.create_subscription("orders", "billing").unwrap();
///
/// let factory = InMemoryMessagingFactory::new(namespace);
/// let sender = factory.create_topic_client("orders").unwrap();
/// let receiver = factory
///     .create_subscription_client("orders", "billing", ReceiveMode::ReceiveAndDelete)
///     .unwrap();
///
/// sender.send(BrokeredMessage::from_text("placed")).unwrap();
/// let message = receiver.receive(Duration::from_millis(100)).unwrap().unwrap();
/// assert_eq!(message.body_str(), Some("placed"));
/// ```
#[derive(Clone)]
pub struct InMemoryNamespace {
    inner: Arc<NamespaceState>,
}

struct NamespaceState {
    topics: RwLock<HashMap<String, Topic>>,
    reachable: AtomicBool,
}

#[derive(Default)]
struct Topic {
    subscriptions: HashMap<String, Arc<SubscriptionQueue>>,
    next_sequence: AtomicU64,
}

impl Default for InMemoryNamespace {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNamespace {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NamespaceState {
                topics: RwLock::new(HashMap::new()),
                reachable: AtomicBool::new(true),
            }),
        }
    }

    /// Create a topic. Returns false if it already existed.
    pub fn create_topic(&self, path: &str) -> bool {
        let mut topics = self.write_topics();
        if topics.contains_key(path) {
            return false;
        }
        topics.insert(path.to_string(), Topic::default());
        true
    }

    /// Create a subscription on an existing topic. Idempotent.
    pub fn create_subscription(&self, topic: &str, name: &str) -> Result<(), TransportError> {
        let mut topics = self.write_topics();
        let entry = topics
            .get_mut(topic)
            .ok_or_else(|| TransportError::TopicNotFound(topic.to_string()))?;
        entry
            .subscriptions
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(SubscriptionQueue::default()));
        Ok(())
    }

    /// Remove a topic and all its subscriptions.
    pub fn delete_topic(&self, path: &str) -> bool {
        self.write_topics().remove(path).is_some()
    }

    pub fn delete_subscription(&self, topic: &str, name: &str) -> bool {
        self.write_topics()
            .get_mut(topic)
            .is_some_and(|t| t.subscriptions.remove(name).is_some())
    }

    pub fn topic_exists(&self, path: &str) -> bool {
        self.read_topics().contains_key(path)
    }

    pub fn subscription_exists(&self, topic: &str, name: &str) -> bool {
        self.read_topics()
            .get(topic)
            .is_some_and(|t| t.subscriptions.contains_key(name))
    }

    /// Switch reachability; while unreachable every transport call fails
    /// with `ConnectionFailed`.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.inner.reachable.load(Ordering::SeqCst)
    }

    /// Messages waiting to be received on a subscription.
    pub fn pending_count(&self, topic: &str, name: &str) -> usize {
        self.queue(topic, name)
            .map(|queue| {
                let state = queue.lock();
                state.ready.len()
            })
            .unwrap_or(0)
    }

    /// Messages received in peek-lock mode and not yet settled.
    pub fn locked_count(&self, topic: &str, name: &str) -> usize {
        self.queue(topic, name)
            .map(|queue| {
                let state = queue.lock();
                state.locked.len()
            })
            .unwrap_or(0)
    }

    fn ensure_reachable(&self) -> Result<(), TransportError> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(TransportError::ConnectionFailed(
                "in-memory namespace is unreachable".into(),
            ))
        }
    }

    fn publish(&self, topic: &str, message: BrokeredMessage) -> Result<(), TransportError> {
        self.ensure_reachable()?;
        let topics = self.read_topics();
        let entry = topics
            .get(topic)
            .ok_or_else(|| TransportError::TopicNotFound(topic.to_string()))?;

        let sequence = entry.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        for queue in entry.subscriptions.values() {
            let mut copy = message.clone();
            copy.stamp_sequence(sequence);
            queue.push(copy);
        }
        trace!(
            topic,
            sequence,
            subscriptions = entry.subscriptions.len(),
            "published message"
        );
        Ok(())
    }

    fn queue(&self, topic: &str, name: &str) -> Result<Arc<SubscriptionQueue>, TransportError> {
        let topics = self.read_topics();
        let entry = topics
            .get(topic)
            .ok_or_else(|| TransportError::TopicNotFound(topic.to_string()))?;
        entry
            .subscriptions
            .get(name)
            .cloned()
            .ok_or_else(|| TransportError::SubscriptionNotFound {
                topic: topic.to_string(),
                subscription: name.to_string(),
            })
    }

    fn read_topics(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Topic>> {
        self.inner
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_topics(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Topic>> {
        self.inner
            .topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct SubscriptionQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<BrokeredMessage>,
    locked: HashMap<LockToken, BrokeredMessage>,
}

impl SubscriptionQueue {
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, message: BrokeredMessage) {
        self.lock().ready.push_back(message);
        self.available.notify_one();
    }

    /// Wait for the next message. Gives up early once `closed` is set.
    fn take(&self, timeout: Duration, mode: ReceiveMode, closed: &AtomicBool) -> Option<BrokeredMessage> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if closed.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(mut message) = state.ready.pop_front() {
                match mode {
                    ReceiveMode::PeekLock => {
                        let token = LockToken::new();
                        message.stamp_delivery(Some(token));
                        state.locked.insert(token, message.clone());
                    }
                    ReceiveMode::ReceiveAndDelete => message.stamp_delivery(None),
                }
                return Some(message);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let (guard, _) = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Wake every blocked receiver so it can observe a close.
    fn wake_all(&self) {
        let _state = self.lock();
        self.available.notify_all();
    }

    fn complete(&self, token: &LockToken) -> Result<(), TransportError> {
        self.lock()
            .locked
            .remove(token)
            .map(|_| ())
            .ok_or_else(|| TransportError::LockLost(token.to_string()))
    }

    fn abandon(&self, token: &LockToken) -> Result<(), TransportError> {
        let mut state = self.lock();
        let message = state
            .locked
            .remove(token)
            .ok_or_else(|| TransportError::LockLost(token.to_string()))?;
        // Redeliver ahead of newer messages.
        state.ready.push_front(message);
        drop(state);
        self.available.notify_one();
        Ok(())
    }
}

/// Send endpoint over an [`InMemoryNamespace`] topic.
pub struct InMemoryTopicClient {
    path: String,
    namespace: InMemoryNamespace,
    closed: AtomicBool,
}

impl TopicClient for InMemoryTopicClient {
    fn path(&self) -> &str {
        &self.path
    }

    fn send(&self, message: BrokeredMessage) -> Result<(), MessagingError> {
        if self.is_closed() {
            return Err(MessagingError::EndpointClosed(self.path.clone()));
        }
        self.namespace.publish(&self.path, message)?;
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(topic = %self.path, "topic client closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Receive endpoint over an [`InMemoryNamespace`] subscription.
pub struct InMemorySubscriptionClient {
    topic_path: String,
    name: String,
    mode: ReceiveMode,
    namespace: InMemoryNamespace,
    queue: Arc<SubscriptionQueue>,
    held: Mutex<HashSet<LockToken>>,
    closed: AtomicBool,
}

impl InMemorySubscriptionClient {
    fn ensure_open(&self) -> Result<(), MessagingError> {
        if self.is_closed() {
            Err(self.closed_error())
        } else {
            Ok(())
        }
    }

    fn closed_error(&self) -> MessagingError {
        MessagingError::EndpointClosed(format!("{}/{}", self.topic_path, self.name))
    }

    fn ensure_peek_lock(&self, operation: &str) -> Result<(), MessagingError> {
        match self.mode {
            ReceiveMode::PeekLock => Ok(()),
            ReceiveMode::ReceiveAndDelete => Err(TransportError::UnsupportedOperation(format!(
                "{} requires peek-lock mode",
                operation
            ))
            .into()),
        }
    }

    fn held(&self) -> std::sync::MutexGuard<'_, HashSet<LockToken>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SubscriptionClient for InMemorySubscriptionClient {
    fn topic_path(&self) -> &str {
        &self.topic_path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> ReceiveMode {
        self.mode
    }

    fn receive(&self, timeout: Duration) -> Result<Option<BrokeredMessage>, MessagingError> {
        self.ensure_open()?;
        self.namespace.ensure_reachable()?;

        let Some(message) = self.queue.take(timeout, self.mode, &self.closed) else {
            self.ensure_open()?;
            return Ok(None);
        };
        if let Some(token) = message.lock_token() {
            // `close` drains `held` under this lock, so a lock taken after
            // the drain has to be released here.
            let mut held = self.held();
            if self.is_closed() {
                drop(held);
                let _ = self.queue.abandon(&token);
                return Err(self.closed_error());
            }
            held.insert(token);
        }
        Ok(Some(message))
    }

    fn complete(&self, lock_token: &LockToken) -> Result<(), MessagingError> {
        self.ensure_open()?;
        self.ensure_peek_lock("complete")?;
        self.queue.complete(lock_token)?;
        self.held().remove(lock_token);
        Ok(())
    }

    fn abandon(&self, lock_token: &LockToken) -> Result<(), MessagingError> {
        self.ensure_open()?;
        self.ensure_peek_lock("abandon")?;
        self.queue.abandon(lock_token)?;
        self.held().remove(lock_token);
        Ok(())
    }

    fn close(&self) {
        let held: Vec<LockToken> = {
            let mut held = self.held();
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            held.drain().collect()
        };
        // Unsettled peek-locks go back to the subscription.
        for token in &held {
            let _ = self.queue.abandon(token);
        }
        self.queue.wake_all();
        debug!(
            topic = %self.topic_path,
            subscription = %self.name,
            released = held.len(),
            "subscription client closed"
        );
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// [`MessagingFactory`] over an [`InMemoryNamespace`].
pub struct InMemoryMessagingFactory {
    namespace: InMemoryNamespace,
    state: Mutex<FactoryState>,
}

#[derive(Default)]
struct FactoryState {
    closed: bool,
    topic_clients: Vec<Arc<InMemoryTopicClient>>,
    subscription_clients: Vec<Arc<InMemorySubscriptionClient>>,
}

impl InMemoryMessagingFactory {
    pub fn new(namespace: InMemoryNamespace) -> Self {
        Self {
            namespace,
            state: Mutex::new(FactoryState::default()),
        }
    }

    pub fn namespace(&self) -> &InMemoryNamespace {
        &self.namespace
    }

    /// Endpoints created by this factory that are still open.
    ///
    /// Endpoints closed individually are dropped from tracking on the next
    /// creation call.
    pub fn open_endpoints(&self) -> usize {
        let state = self.state();
        state.topic_clients.iter().filter(|c| !c.is_closed()).count()
            + state
                .subscription_clients
                .iter()
                .filter(|c| !c.is_closed())
                .count()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FactoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_state(&self) -> Result<std::sync::MutexGuard<'_, FactoryState>, MessagingError> {
        let state = self.state();
        if state.closed {
            return Err(MessagingError::FactoryClosed);
        }
        Ok(state)
    }
}

impl MessagingFactory for InMemoryMessagingFactory {
    fn create_subscription_client(
        &self,
        topic_path: &str,
        name: &str,
        mode: ReceiveMode,
    ) -> Result<Arc<dyn SubscriptionClient>, MessagingError> {
        // Held for the whole call so a concurrent close cannot miss this endpoint.
        let mut state = self.open_state()?;
        self.namespace.ensure_reachable()?;
        let queue = self.namespace.queue(topic_path, name)?;

        let client = Arc::new(InMemorySubscriptionClient {
            topic_path: topic_path.to_string(),
            name: name.to_string(),
            mode,
            namespace: self.namespace.clone(),
            queue,
            held: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        });
        state.subscription_clients.retain(|c| !c.is_closed());
        state.subscription_clients.push(client.clone());
        debug!(topic = topic_path, subscription = name, ?mode, "subscription client created");
        Ok(client)
    }

    fn create_topic_client(&self, path: &str) -> Result<Arc<dyn TopicClient>, MessagingError> {
        let mut state = self.open_state()?;
        self.namespace.ensure_reachable()?;
        if !self.namespace.topic_exists(path) {
            return Err(TransportError::TopicNotFound(path.to_string()).into());
        }

        let client = Arc::new(InMemoryTopicClient {
            path: path.to_string(),
            namespace: self.namespace.clone(),
            closed: AtomicBool::new(false),
        });
        state.topic_clients.retain(|c| !c.is_closed());
        state.topic_clients.push(client.clone());
        debug!(topic = path, "topic client created");
        Ok(client)
    }

    fn create_brokered_message(
        &self,
        body: &mut dyn Read,
        length: u64,
    ) -> Result<BrokeredMessage, MessagingError> {
        drop(self.open_state()?);
        Ok(BrokeredMessage::read_from(body, length)?)
    }

    fn close(&self) {
        let mut state = self.state();
        if state.closed {
            return;
        }
        state.closed = true;

        let topics = std::mem::take(&mut state.topic_clients);
        let subscriptions = std::mem::take(&mut state.subscription_clients);
        for client in &topics {
            client.close();
        }
        for client in &subscriptions {
            client.close();
        }
        debug!(
            topic_clients = topics.len(),
            subscription_clients = subscriptions.len(),
            "messaging factory closed"
        );
    }

    fn is_closed(&self) -> bool {
        self.state().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace_with(topic: &str, subscriptions: &[&str]) -> InMemoryNamespace {
        let namespace = InMemoryNamespace::new();
        namespace.create_topic(topic);
        for name in subscriptions {
            namespace.create_subscription(topic, name).unwrap();
        }
        namespace
    }

    #[test]
    fn send_fans_out_to_every_subscription() {
        let namespace = namespace_with("orders", &["billing", "shipping"]);
        let factory = InMemoryMessagingFactory::new(namespace.clone());

        let sender = factory.create_topic_client("orders").unwrap();
        sender.send(BrokeredMessage::from_text("one")).unwrap();
        sender
            .send_batch(vec![
                BrokeredMessage::from_text("two"),
                BrokeredMessage::from_text("three"),
            ])
            .unwrap();

        assert_eq!(namespace.pending_count("orders", "billing"), 3);
        assert_eq!(namespace.pending_count("orders", "shipping"), 3);
    }

    #[test]
    fn sequence_numbers_increase_per_topic() {
        let namespace = namespace_with("orders", &["billing"]);
        let factory = InMemoryMessagingFactory::new(namespace);
        let sender = factory.create_topic_client("orders").unwrap();
        let receiver = factory
            .create_subscription_client("orders", "billing", ReceiveMode::ReceiveAndDelete)
            .unwrap();

        sender.send(BrokeredMessage::from_text("a")).unwrap();
        sender.send(BrokeredMessage::from_text("b")).unwrap();

        let first = receiver.receive(Duration::from_millis(10)).unwrap().unwrap();
        let second = receiver.receive(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(first.sequence_number(), Some(1));
        assert_eq!(second.sequence_number(), Some(2));
    }

    #[test]
    fn receive_times_out_when_empty() {
        let namespace = namespace_with("orders", &["billing"]);
        let factory = InMemoryMessagingFactory::new(namespace);
        let receiver = factory
            .create_subscription_client("orders", "billing", ReceiveMode::PeekLock)
            .unwrap();

        assert!(receiver.receive(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn settle_requires_peek_lock() {
        let namespace = namespace_with("orders", &["billing"]);
        let factory = InMemoryMessagingFactory::new(namespace);
        let receiver = factory
            .create_subscription_client("orders", "billing", ReceiveMode::ReceiveAndDelete)
            .unwrap();

        let err = receiver.complete(&LockToken::new()).unwrap_err();
        assert!(matches!(
            err,
            MessagingError::Transport(TransportError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn unknown_lock_token_is_lock_lost() {
        let namespace = namespace_with("orders", &["billing"]);
        let factory = InMemoryMessagingFactory::new(namespace);
        let receiver = factory
            .create_subscription_client("orders", "billing", ReceiveMode::PeekLock)
            .unwrap();

        assert!(matches!(
            receiver.abandon(&LockToken::new()),
            Err(MessagingError::Transport(TransportError::LockLost(_)))
        ));
    }

    #[test]
    fn namespace_management() {
        let namespace = InMemoryNamespace::new();
        assert!(namespace.create_topic("t"));
        assert!(!namespace.create_topic("t"));
        assert!(matches!(
            namespace.create_subscription("missing", "s"),
            Err(TransportError::TopicNotFound(_))
        ));

        namespace.create_subscription("t", "s").unwrap();
        assert!(namespace.subscription_exists("t", "s"));
        assert!(namespace.delete_subscription("t", "s"));
        assert!(!namespace.subscription_exists("t", "s"));
        assert!(namespace.delete_topic("t"));
        assert!(!namespace.topic_exists("t"));
    }

    #[test]
    fn closed_endpoints_are_released_on_next_create() {
        let namespace = namespace_with("orders", &["billing"]);
        let factory = InMemoryMessagingFactory::new(namespace);

        let sender = factory.create_topic_client("orders").unwrap();
        let receiver = factory
            .create_subscription_client("orders", "billing", ReceiveMode::PeekLock)
            .unwrap();
        sender.close();
        receiver.close();
        assert_eq!(Arc::strong_count(&sender), 2);

        for _ in 0..100 {
            factory.create_topic_client("orders").unwrap().close();
            factory
                .create_subscription_client("orders", "billing", ReceiveMode::PeekLock)
                .unwrap()
                .close();
        }

        assert_eq!(Arc::strong_count(&sender), 1);
        assert_eq!(Arc::strong_count(&receiver), 1);
        let state = factory.state();
        assert!(state.topic_clients.len() <= 1);
        assert!(state.subscription_clients.len() <= 1);
    }

    #[test]
    fn poisoned_topic_lock_is_recovered() {
        let namespace = namespace_with("orders", &["billing"]);
        let poisoner = namespace.clone();
        let _ = std::thread::spawn(move || {
            let _topics = poisoner.write_topics();
            panic!("poison the topic map");
        })
        .join();

        let factory = InMemoryMessagingFactory::new(namespace.clone());
        let sender = factory.create_topic_client("orders").unwrap();
        sender.send(BrokeredMessage::from_text("after")).unwrap();
        assert_eq!(namespace.pending_count("orders", "billing"), 1);
    }
}
