//! In-process external systems
//!
//! Each type implements the connector trait of one external system and keeps
//! all state in memory. They model the behavior the bridges depend on
//! (unknown destinations are rejected, handles close once, syncpoint gets,
//! push delivery with acknowledgement tracking) and expose inspection
//! helpers for tests and the sandbox runner.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::notification::{
    MessageAttribute, Notification, NotificationClient, NotificationConnector,
    NotificationListener, PublishRequest, SubscribeRequest,
};
use super::pubsub::{
    MessageId, OutgoingMessage, PubSubClient, PubSubConnector, PubSubConsumer, PubSubListener,
    PubSubMessage, PubSubProducer,
};
use super::queue_manager::{
    InputQueue, MqMessage, OutputQueue, QueueManager, QueueManagerConnector,
};
use super::{ConnectParams, ExternalError, ExternalHandle, ExternalResult};

/// Release a handle once; a second release reports `Closed`
fn release(closed: &AtomicBool, open_handles: &AtomicUsize) -> ExternalResult<()> {
    if closed.swap(true, Ordering::SeqCst) {
        return Err(ExternalError::Closed);
    }
    open_handles.fetch_sub(1, Ordering::SeqCst);
    Ok(())
}

fn ensure_open(closed: &AtomicBool) -> ExternalResult<()> {
    if closed.load(Ordering::SeqCst) {
        Err(ExternalError::Closed)
    } else {
        Ok(())
    }
}

// =============================================================================
// Queue manager
// =============================================================================

/// In-memory queue manager
#[derive(Clone, Default)]
pub struct MemoryQueueManager {
    state: Arc<QmState>,
}

#[derive(Default)]
struct QmState {
    queues: Mutex<HashMap<String, VecDeque<MqMessage>>>,
    unreachable: AtomicBool,
    connections: AtomicUsize,
    open_handles: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryQueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a queue; opening an undefined queue is rejected
    pub fn define_queue(&self, name: &str) {
        self.state
            .queues
            .lock()
            .entry(name.to_string())
            .or_default();
    }

    /// Make connection attempts (and puts on open queues) fail
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Put a message as an external application would. Returns false for an undefined queue.
    pub fn enqueue(&self, queue: &str, mut message: MqMessage) -> bool {
        match self.state.queues.lock().get_mut(queue) {
            Some(messages) => {
                message.put_time.get_or_insert_with(SystemTime::now);
                messages.push_back(message);
                true
            }
            None => false,
        }
    }

    pub fn depth(&self, queue: &str) -> usize {
        self.state
            .queues
            .lock()
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Remove and return everything on a queue
    pub fn drain(&self, queue: &str) -> Vec<MqMessage> {
        self.state
            .queues
            .lock()
            .get_mut(queue)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// Messages put through bridge output queues
    pub fn put_count(&self) -> usize {
        self.state.puts.load(Ordering::SeqCst)
    }

    pub fn open_handles(&self) -> usize {
        self.state.open_handles.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueManagerConnector for MemoryQueueManager {
    async fn connect(
        &self,
        queue_manager: &str,
        params: &ConnectParams,
    ) -> ExternalResult<Arc<dyn QueueManager>> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(ExternalError::Unreachable(params.endpoint()));
        }
        self.state.connections.fetch_add(1, Ordering::SeqCst);
        debug!("memory queue manager '{}': connected", queue_manager);
        Ok(Arc::new(MemoryQmConnection {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryQmConnection {
    state: Arc<QmState>,
    closed: AtomicBool,
}

impl MemoryQmConnection {
    fn check_queue(&self, queue: &str) -> ExternalResult<()> {
        ensure_open(&self.closed)?;
        if !self.state.queues.lock().contains_key(queue) {
            return Err(ExternalError::Rejected(format!(
                "unknown object name '{}'",
                queue
            )));
        }
        self.state.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl QueueManager for MemoryQmConnection {
    async fn open_output(&self, queue: &str) -> ExternalResult<Arc<dyn OutputQueue>> {
        self.check_queue(queue)?;
        Ok(Arc::new(MemoryOutputQueue {
            state: self.state.clone(),
            queue: queue.to_string(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn open_input(&self, queue: &str) -> ExternalResult<Arc<dyn InputQueue>> {
        self.check_queue(queue)?;
        Ok(Arc::new(MemoryInputQueue {
            state: self.state.clone(),
            queue: queue.to_string(),
            pending: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }))
    }

    async fn disconnect(&self) -> ExternalResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ExternalError::Closed);
        }
        self.state.connections.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryOutputQueue {
    state: Arc<QmState>,
    queue: String,
    closed: AtomicBool,
}

#[async_trait]
impl ExternalHandle for MemoryOutputQueue {
    async fn close(&self) -> ExternalResult<()> {
        release(&self.closed, &self.state.open_handles)
    }
}

#[async_trait]
impl OutputQueue for MemoryOutputQueue {
    async fn put(&self, mut message: MqMessage) -> ExternalResult<()> {
        ensure_open(&self.closed)?;
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(ExternalError::Transport("connection broken".to_string()));
        }
        message.put_time = Some(SystemTime::now());
        let mut queues = self.state.queues.lock();
        let queue = queues
            .get_mut(&self.queue)
            .ok_or_else(|| ExternalError::Rejected(format!("queue '{}' deleted", self.queue)))?;
        queue.push_back(message);
        self.state.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryInputQueue {
    state: Arc<QmState>,
    queue: String,
    pending: Mutex<Vec<MqMessage>>,
    closed: AtomicBool,
}

impl MemoryInputQueue {
    fn take(&self) -> Option<MqMessage> {
        let message = self.state.queues.lock().get_mut(&self.queue)?.pop_front()?;
        self.pending.lock().push(message.clone());
        Some(message)
    }

    fn restore_pending(&self) {
        let pending: Vec<MqMessage> = self.pending.lock().drain(..).collect();
        if pending.is_empty() {
            return;
        }
        let mut queues = self.state.queues.lock();
        if let Some(queue) = queues.get_mut(&self.queue) {
            for message in pending.into_iter().rev() {
                queue.push_front(message);
            }
        }
    }
}

#[async_trait]
impl ExternalHandle for MemoryInputQueue {
    async fn close(&self) -> ExternalResult<()> {
        release(&self.closed, &self.state.open_handles)?;
        self.restore_pending();
        Ok(())
    }
}

#[async_trait]
impl InputQueue for MemoryInputQueue {
    async fn get(&self, wait: Duration) -> ExternalResult<Option<MqMessage>> {
        ensure_open(&self.closed)?;
        if let Some(message) = self.take() {
            return Ok(Some(message));
        }
        if wait.is_zero() {
            return Ok(None);
        }
        tokio::time::sleep(wait).await;
        ensure_open(&self.closed)?;
        Ok(self.take())
    }

    async fn commit(&self) -> ExternalResult<()> {
        ensure_open(&self.closed)?;
        self.pending.lock().clear();
        Ok(())
    }

    async fn backout(&self) -> ExternalResult<()> {
        ensure_open(&self.closed)?;
        self.restore_pending();
        Ok(())
    }
}

// =============================================================================
// Pub/sub log
// =============================================================================

/// In-memory pub/sub log. Topics are created on first use unless denied.
#[derive(Clone, Default)]
pub struct MemoryPubSub {
    state: Arc<PsState>,
}

#[derive(Default)]
struct PsState {
    topics: Mutex<HashMap<String, PsTopic>>,
    denied: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
    next_id: AtomicU64,
    connections: AtomicUsize,
    open_handles: AtomicUsize,
}

#[derive(Default)]
struct PsTopic {
    sent: Vec<OutgoingMessage>,
    consumers: Vec<PsConsumerSlot>,
    acknowledged: Vec<MessageId>,
}

struct PsConsumerSlot {
    consumer: Arc<MemoryConsumer>,
    tx: mpsc::UnboundedSender<PubSubMessage>,
}

impl PsState {
    fn next_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn dispatch(&self, message: PubSubMessage) {
        let topics = self.topics.lock();
        if let Some(topic) = topics.get(&message.topic) {
            for slot in &topic.consumers {
                let _ = slot.tx.send(message.clone());
            }
        }
    }

    fn check_topic(&self, topic: &str) -> ExternalResult<()> {
        if self.denied.lock().contains(topic) {
            return Err(ExternalError::Rejected(format!(
                "topic '{}' not authorized",
                topic
            )));
        }
        Ok(())
    }
}

impl MemoryPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject producers and subscriptions on a topic
    pub fn deny_topic(&self, topic: &str) {
        self.state.denied.lock().insert(topic.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Publish as an external producer would, delivering to every subscribed consumer
    pub fn publish(&self, topic: &str, data: impl Into<Bytes>, properties: &[(&str, &str)]) -> MessageId {
        let id = self.state.next_id();
        self.state.dispatch(PubSubMessage {
            id,
            topic: topic.to_string(),
            data: data.into(),
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            event_time: Some(SystemTime::now()),
            redelivery_count: 0,
        });
        id
    }

    /// Messages sent by producers on a topic
    pub fn sent(&self, topic: &str) -> Vec<OutgoingMessage> {
        self.state
            .topics
            .lock()
            .get(topic)
            .map(|t| t.sent.clone())
            .unwrap_or_default()
    }

    pub fn acknowledged(&self, topic: &str) -> Vec<MessageId> {
        self.state
            .topics
            .lock()
            .get(topic)
            .map(|t| t.acknowledged.clone())
            .unwrap_or_default()
    }

    /// Messages delivered to consumers of a topic and not yet acknowledged
    pub fn unacknowledged(&self, topic: &str) -> usize {
        self.state
            .topics
            .lock()
            .get(topic)
            .map_or(0, |t| {
                t.consumers
                    .iter()
                    .map(|s| s.consumer.unacked.lock().len())
                    .sum()
            })
    }

    /// Redeliver every unacknowledged message on a topic
    pub fn redeliver(&self, topic: &str) {
        let topics = self.state.topics.lock();
        if let Some(topic) = topics.get(topic) {
            for slot in &topic.consumers {
                let pending: Vec<PubSubMessage> =
                    slot.consumer.unacked.lock().values().cloned().collect();
                for mut message in pending {
                    message.redelivery_count += 1;
                    let _ = slot.tx.send(message);
                }
            }
        }
    }

    pub fn consumer_count(&self, topic: &str) -> usize {
        self.state
            .topics
            .lock()
            .get(topic)
            .map_or(0, |t| t.consumers.len())
    }

    pub fn open_handles(&self) -> usize {
        self.state.open_handles.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PubSubConnector for MemoryPubSub {
    async fn connect(
        &self,
        service_url: &str,
        _params: &ConnectParams,
    ) -> ExternalResult<Arc<dyn PubSubClient>> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(ExternalError::Unreachable(service_url.to_string()));
        }
        self.state.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryPubSubClient {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryPubSubClient {
    state: Arc<PsState>,
    closed: AtomicBool,
}

#[async_trait]
impl PubSubClient for MemoryPubSubClient {
    async fn create_producer(
        &self,
        topic: &str,
        _producer_name: &str,
    ) -> ExternalResult<Arc<dyn PubSubProducer>> {
        ensure_open(&self.closed)?;
        self.state.check_topic(topic)?;
        self.state
            .topics
            .lock()
            .entry(topic.to_string())
            .or_default();
        self.state.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryProducer {
            state: self.state.clone(),
            topic: topic.to_string(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn subscribe(
        &self,
        topic: &str,
        subscription: &str,
        listener: Arc<dyn PubSubListener>,
    ) -> ExternalResult<Arc<dyn PubSubConsumer>> {
        ensure_open(&self.closed)?;
        self.state.check_topic(topic)?;

        let consumer = Arc::new(MemoryConsumer {
            id: self.state.next_id.fetch_add(1, Ordering::SeqCst),
            topic: topic.to_string(),
            state: self.state.clone(),
            unacked: Mutex::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        });
        let (tx, mut rx) = mpsc::unbounded_channel::<PubSubMessage>();

        self.state
            .topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .consumers
            .push(PsConsumerSlot {
                consumer: consumer.clone(),
                tx,
            });
        self.state.open_handles.fetch_add(1, Ordering::SeqCst);
        debug!("memory pubsub: subscription '{}' on '{}'", subscription, topic);

        // Client-owned delivery task, one message at a time
        let delivery = consumer.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if delivery.closed.load(Ordering::SeqCst) {
                    break;
                }
                delivery.unacked.lock().insert(message.id, message.clone());
                listener.received(delivery.as_ref(), message).await;
            }
        });

        Ok(consumer)
    }

    async fn close(&self) -> ExternalResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ExternalError::Closed);
        }
        self.state.connections.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryProducer {
    state: Arc<PsState>,
    topic: String,
    closed: AtomicBool,
}

#[async_trait]
impl ExternalHandle for MemoryProducer {
    async fn close(&self) -> ExternalResult<()> {
        release(&self.closed, &self.state.open_handles)
    }
}

#[async_trait]
impl PubSubProducer for MemoryProducer {
    async fn send(&self, message: OutgoingMessage) -> ExternalResult<MessageId> {
        ensure_open(&self.closed)?;
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(ExternalError::Transport("connection broken".to_string()));
        }
        let id = self.state.next_id();
        let delivered = PubSubMessage {
            id,
            topic: self.topic.clone(),
            data: message.data.clone(),
            properties: message.properties().to_vec(),
            event_time: message.event_time,
            redelivery_count: 0,
        };
        self.state
            .topics
            .lock()
            .entry(self.topic.clone())
            .or_default()
            .sent
            .push(message);
        self.state.dispatch(delivered);
        Ok(id)
    }
}

struct MemoryConsumer {
    id: u64,
    topic: String,
    state: Arc<PsState>,
    unacked: Mutex<BTreeMap<MessageId, PubSubMessage>>,
    closed: AtomicBool,
}

#[async_trait]
impl ExternalHandle for MemoryConsumer {
    async fn close(&self) -> ExternalResult<()> {
        release(&self.closed, &self.state.open_handles)?;
        if let Some(topic) = self.state.topics.lock().get_mut(&self.topic) {
            topic.consumers.retain(|slot| slot.consumer.id != self.id);
        }
        Ok(())
    }
}

#[async_trait]
impl PubSubConsumer for MemoryConsumer {
    async fn acknowledge(&self, id: MessageId) -> ExternalResult<()> {
        ensure_open(&self.closed)?;
        if self.unacked.lock().remove(&id).is_none() {
            return Err(ExternalError::Rejected(format!("unknown message id {}", id)));
        }
        if let Some(topic) = self.state.topics.lock().get_mut(&self.topic) {
            topic.acknowledged.push(id);
        }
        Ok(())
    }
}

// =============================================================================
// Notification fan-out
// =============================================================================

/// In-memory notification service. Topics must be created before use.
#[derive(Clone, Default)]
pub struct MemoryNotificationService {
    state: Arc<NsState>,
}

#[derive(Default)]
struct NsState {
    topics: Mutex<HashMap<String, Vec<PublishRequest>>>,
    subscriptions: Mutex<HashMap<String, NsSubscription>>,
    unreachable: AtomicBool,
    next_id: AtomicU64,
    connections: AtomicUsize,
    acknowledged: AtomicUsize,
    rejected: Mutex<Vec<Notification>>,
}

struct NsSubscription {
    topic_arn: String,
    tx: mpsc::UnboundedSender<Notification>,
}

impl NsState {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn fan_out(&self, topic_arn: &str, message: &str, attributes: &[(String, MessageAttribute)]) {
        let message_id = format!("msg-{}", self.next_id());
        let subscriptions = self.subscriptions.lock();
        for (subscription_arn, subscription) in subscriptions.iter() {
            if subscription.topic_arn != topic_arn {
                continue;
            }
            let _ = subscription.tx.send(Notification {
                message_id: message_id.clone(),
                topic_arn: topic_arn.to_string(),
                subscription_arn: subscription_arn.clone(),
                message: message.to_string(),
                attributes: attributes.to_vec(),
                timestamp: SystemTime::now(),
            });
        }
    }
}

impl MemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_topic(&self, topic_arn: &str) {
        self.state
            .topics
            .lock()
            .entry(topic_arn.to_string())
            .or_default();
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Deliver a notification as an external publisher would
    pub fn deliver(&self, topic_arn: &str, message: &str, attributes: &[(&str, &str)]) {
        let attributes: Vec<(String, MessageAttribute)> = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), MessageAttribute::string(*v)))
            .collect();
        self.state.fan_out(topic_arn, message, &attributes);
    }

    /// Requests published to a topic through a client
    pub fn published(&self, topic_arn: &str) -> Vec<PublishRequest> {
        self.state
            .topics
            .lock()
            .get(topic_arn)
            .cloned()
            .unwrap_or_default()
    }

    pub fn subscription_count(&self) -> usize {
        self.state.subscriptions.lock().len()
    }

    /// Notifications the listener accepted
    pub fn acknowledged(&self) -> usize {
        self.state.acknowledged.load(Ordering::SeqCst)
    }

    /// Notifications the listener refused, kept for redelivery
    pub fn rejected(&self) -> Vec<Notification> {
        self.state.rejected.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationConnector for MemoryNotificationService {
    async fn connect(&self, params: &ConnectParams) -> ExternalResult<Arc<dyn NotificationClient>> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(ExternalError::Unreachable(params.endpoint()));
        }
        self.state.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryNotificationClient {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryNotificationClient {
    state: Arc<NsState>,
    closed: AtomicBool,
}

#[async_trait]
impl NotificationClient for MemoryNotificationClient {
    async fn topic_exists(&self, topic_arn: &str) -> ExternalResult<bool> {
        ensure_open(&self.closed)?;
        Ok(self.state.topics.lock().contains_key(topic_arn))
    }

    async fn publish(&self, request: PublishRequest) -> ExternalResult<String> {
        ensure_open(&self.closed)?;
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(ExternalError::Transport("connection broken".to_string()));
        }
        {
            let mut topics = self.state.topics.lock();
            let published = topics.get_mut(&request.topic_arn).ok_or_else(|| {
                ExternalError::Rejected(format!("topic '{}' not found", request.topic_arn))
            })?;
            published.push(request.clone());
        }
        self.state
            .fan_out(&request.topic_arn, &request.message, request.attributes());
        Ok(format!("msg-{}", self.state.next_id()))
    }

    async fn subscribe(
        &self,
        request: SubscribeRequest,
        listener: Arc<dyn NotificationListener>,
    ) -> ExternalResult<String> {
        ensure_open(&self.closed)?;
        if !self.state.topics.lock().contains_key(&request.topic_arn) {
            return Err(ExternalError::Rejected(format!(
                "topic '{}' not found",
                request.topic_arn
            )));
        }

        let subscription_arn = format!("{}:{}", request.topic_arn, self.state.next_id());
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        self.state.subscriptions.lock().insert(
            subscription_arn.clone(),
            NsSubscription {
                topic_arn: request.topic_arn.clone(),
                tx,
            },
        );
        debug!(
            "memory notification: {} subscription {} -> {}",
            request.protocol, subscription_arn, request.endpoint
        );

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                match listener.on_notification(notification.clone()).await {
                    Ok(()) => {
                        state.acknowledged.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(_) => state.rejected.lock().push(notification),
                }
            }
        });

        Ok(subscription_arn)
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> ExternalResult<()> {
        match self.state.subscriptions.lock().remove(subscription_arn) {
            Some(_) => Ok(()),
            None => Err(ExternalError::Rejected(format!(
                "subscription '{}' not found",
                subscription_arn
            ))),
        }
    }

    async fn close(&self) -> ExternalResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ExternalError::Closed);
        }
        self.state.connections.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_syncpoint() {
        let qm = MemoryQueueManager::new();
        qm.define_queue("Q1");
        let conn = qm
            .connect("QM1", &ConnectParams::default())
            .await
            .unwrap();
        let input = conn.open_input("Q1").await.unwrap();

        qm.enqueue("Q1", MqMessage::new("a"));
        qm.enqueue("Q1", MqMessage::new("b"));

        let first = input.get(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.payload.as_ref(), b"a");
        input.backout().await.unwrap();
        assert_eq!(qm.depth("Q1"), 2);

        let again = input.get(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(again.payload.as_ref(), b"a");
        input.commit().await.unwrap();
        assert_eq!(qm.depth("Q1"), 1);
    }

    #[tokio::test]
    async fn test_queue_rejects_unknown_and_counts_handles() {
        let qm = MemoryQueueManager::new();
        qm.define_queue("Q1");
        let conn = qm
            .connect("QM1", &ConnectParams::default())
            .await
            .unwrap();

        assert!(matches!(
            conn.open_output("MISSING").await,
            Err(ExternalError::Rejected(_))
        ));

        let output = conn.open_output("Q1").await.unwrap();
        assert_eq!(qm.open_handles(), 1);
        output.close().await.unwrap();
        assert_eq!(output.close().await, Err(ExternalError::Closed));
        assert_eq!(qm.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_queue_manager() {
        let qm = MemoryQueueManager::new();
        qm.set_unreachable(true);
        let result = qm
            .connect(
                "QM1",
                &ConnectParams {
                    host: "mq.example.com".to_string(),
                    port: 1414,
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ExternalError::Unreachable(ref e)) if e == "mq.example.com:1414"));
        assert_eq!(qm.connections(), 0);
    }
}
