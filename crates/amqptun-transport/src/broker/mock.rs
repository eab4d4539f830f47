// ============================================
// File: crates/amqptun-transport/src/broker/mock.rs
// ============================================
//! # In-Memory Topic Exchange
//!
//! ## Creation Reason
//! Lets several tunnel nodes talk to each other inside one test process,
//! with the same routing semantics as a RabbitMQ topic exchange.
//!
//! ## Main Functionality
//! - [`MockExchange`]: shared exchange; routes by AMQP topic matching
//! - [`MockBroker`]: one node's session with its own queue
//! - Failure switches for bind, unbind, publish and consume
//!
//! ## Usage in Tests
//! ```ignore
//! let exchange = MockExchange::new("ip-router");
//! let a = MockBroker::connect(&exchange);
//! let b = MockBroker::connect(&exchange);
//!
//! a.bind("10.2.*.*").await?;
//! b.publish("10.2.5.9", &packet).await?;
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A message is delivered once per queue, however many bindings match
//! - `close()` drops the queue, which ends its delivery stream
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use amqptun_core::topic_matches;
use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use parking_lot::Mutex;
use tracing::trace;

use super::{Broker, Delivery, DeliveryStream};
use crate::error::{Result, TransportError};

// ============================================
// MockExchange
// ============================================

#[derive(Default)]
struct ExchangeState {
    next_queue_id: u64,
    /// (queue, binding pattern)
    bindings: BTreeSet<(String, String)>,
    queues: HashMap<String, UnboundedSender<Result<Delivery>>>,
    published: Vec<(String, Bytes)>,
}

/// In-memory topic exchange shared by mock brokers.
pub struct MockExchange {
    name: String,
    state: Mutex<ExchangeState>,
}

impl MockExchange {
    /// Creates an empty exchange.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(ExchangeState::default()),
        })
    }

    /// Exchange name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publishes a message and routes it to every queue with a matching
    /// binding. Returns how many queues received it.
    pub fn publish(&self, routing_key: &str, body: &[u8]) -> usize {
        let body = Bytes::copy_from_slice(body);
        let mut state = self.state.lock();
        state.published.push((routing_key.to_owned(), body.clone()));

        let targets: BTreeSet<&String> = state
            .bindings
            .iter()
            .filter(|(_, pattern)| topic_matches(pattern, routing_key))
            .map(|(queue, _)| queue)
            .collect();

        let mut delivered = 0;
        for queue in targets {
            if let Some(tx) = state.queues.get(queue) {
                let delivery = Delivery {
                    routing_key: routing_key.to_owned(),
                    body: body.clone(),
                };
                if tx.unbounded_send(Ok(delivery)).is_ok() {
                    delivered += 1;
                }
            }
        }

        trace!("Routed {} to {} queue(s)", routing_key, delivered);
        delivered
    }

    /// Every message published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, Bytes)> {
        self.state.lock().published.clone()
    }

    /// Current bindings as (queue, pattern) pairs.
    #[must_use]
    pub fn bindings(&self) -> Vec<(String, String)> {
        self.state.lock().bindings.iter().cloned().collect()
    }

    fn declare_queue(&self) -> (String, UnboundedReceiver<Result<Delivery>>) {
        let mut state = self.state.lock();
        state.next_queue_id += 1;
        let queue = format!("amq.gen-{}", state.next_queue_id);

        let (tx, rx) = unbounded();
        state.queues.insert(queue.clone(), tx);
        (queue, rx)
    }

    fn delete_queue(&self, queue: &str) {
        let mut state = self.state.lock();
        state.queues.remove(queue);
        state.bindings.retain(|(q, _)| q != queue);
    }

    fn inject(&self, queue: &str, item: Result<Delivery>) -> bool {
        self.state
            .lock()
            .queues
            .get(queue)
            .is_some_and(|tx| tx.unbounded_send(item).is_ok())
    }
}

impl std::fmt::Debug for MockExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockExchange")
            .field("name", &self.name)
            .field("queues", &state.queues.len())
            .field("bindings", &state.bindings.len())
            .field("published", &state.published.len())
            .finish()
    }
}

// ============================================
// MockBroker
// ============================================

/// One session on a [`MockExchange`], owning a server-named queue.
pub struct MockBroker {
    exchange: Arc<MockExchange>,
    queue: String,
    receiver: Mutex<Option<UnboundedReceiver<Result<Delivery>>>>,
    fail_bind: AtomicBool,
    fail_unbind: AtomicBool,
    fail_publish: AtomicBool,
    fail_consume: AtomicBool,
    closed: AtomicBool,
}

impl MockBroker {
    /// Declares a fresh queue on `exchange`.
    #[must_use]
    pub fn connect(exchange: &Arc<MockExchange>) -> Self {
        let (queue, rx) = exchange.declare_queue();
        Self {
            exchange: Arc::clone(exchange),
            queue,
            receiver: Mutex::new(Some(rx)),
            fail_bind: AtomicBool::new(false),
            fail_unbind: AtomicBool::new(false),
            fail_publish: AtomicBool::new(false),
            fail_consume: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Makes subsequent binds fail.
    pub fn set_bind_failure(&self, fail: bool) {
        self.fail_bind.store(fail, Ordering::Release);
    }

    /// Makes subsequent unbinds fail.
    pub fn set_unbind_failure(&self, fail: bool) {
        self.fail_unbind.store(fail, Ordering::Release);
    }

    /// Makes subsequent publishes fail.
    pub fn set_publish_failure(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::Release);
    }

    /// Makes the next `consume()` fail to register.
    pub fn set_consume_failure(&self, fail: bool) {
        self.fail_consume.store(fail, Ordering::Release);
    }

    /// Pushes an error into this session's delivery stream.
    pub fn fail_delivery(&self, reason: &str) {
        let err = TransportError::consume_failed(&self.queue, reason);
        self.exchange.inject(&self.queue, Err(err));
    }

    /// Whether the delivery stream has been handed out by `consume()`.
    #[must_use]
    pub fn consume_registered(&self) -> bool {
        self.receiver.lock().is_none()
    }

    /// Whether `close()` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Broker for MockBroker {
    fn queue_name(&self) -> &str {
        &self.queue
    }

    fn exchange_name(&self) -> &str {
        self.exchange.name()
    }

    async fn bind(&self, routing_key: &str) -> Result<()> {
        if self.fail_bind.load(Ordering::Acquire) {
            return Err(TransportError::bind_failed(self.exchange.name(), routing_key, "access refused"));
        }

        self.exchange
            .state
            .lock()
            .bindings
            .insert((self.queue.clone(), routing_key.to_owned()));
        Ok(())
    }

    async fn unbind(&self, routing_key: &str) -> Result<()> {
        if self.fail_unbind.load(Ordering::Acquire) {
            return Err(TransportError::unbind_failed(self.exchange.name(), routing_key, "channel closed"));
        }

        self.exchange
            .state
            .lock()
            .bindings
            .remove(&(self.queue.clone(), routing_key.to_owned()));
        Ok(())
    }

    async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<()> {
        if self.fail_publish.load(Ordering::Acquire) || self.is_closed() {
            return Err(TransportError::publish_failed(routing_key, "channel closed"));
        }

        self.exchange.publish(routing_key, body);
        Ok(())
    }

    async fn consume(&self) -> Result<DeliveryStream> {
        if self.fail_consume.load(Ordering::Acquire) {
            return Err(TransportError::consume_failed(&self.queue, "access refused"));
        }

        let rx = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| TransportError::consume_failed(&self.queue, "consumer already registered"))?;

        Ok(rx.boxed())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.exchange.delete_queue(&self.queue);
        Ok(())
    }
}

impl std::fmt::Debug for MockBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBroker")
            .field("exchange", &self.exchange.name())
            .field("queue", &self.queue)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn next(stream: &mut DeliveryStream) -> Delivery {
        tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .expect("delivery timed out")
            .expect("stream ended")
            .expect("delivery error")
    }

    #[tokio::test]
    async fn test_queues_are_server_named_and_distinct() {
        let exchange = MockExchange::new("ip-router");
        let a = MockBroker::connect(&exchange);
        let b = MockBroker::connect(&exchange);

        assert!(a.queue_name().starts_with("amq.gen-"));
        assert_ne!(a.queue_name(), b.queue_name());
        assert_eq!(a.exchange_name(), "ip-router");
    }

    #[tokio::test]
    async fn test_topic_routing() {
        let exchange = MockExchange::new("ip-router");
        let a = MockBroker::connect(&exchange);
        a.bind("10.2.*.*").await.unwrap();
        let mut stream = a.consume().await.unwrap();

        assert_eq!(exchange.publish("10.2.5.9", b"hit"), 1);
        assert_eq!(exchange.publish("10.3.0.1", b"miss"), 0);

        let delivery = next(&mut stream).await;
        assert_eq!(delivery.routing_key, "10.2.5.9");
        assert_eq!(&delivery.body[..], b"hit");
        assert_eq!(exchange.published().len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_bindings_deliver_once() {
        let exchange = MockExchange::new("ip-router");
        let a = MockBroker::connect(&exchange);
        a.bind("10.*.*.*").await.unwrap();
        a.bind("10.2.*.*").await.unwrap();

        assert_eq!(exchange.publish("10.2.0.1", b"x"), 1);
    }

    #[tokio::test]
    async fn test_unbind_and_duplicate_bind() {
        let exchange = MockExchange::new("ip-router");
        let a = MockBroker::connect(&exchange);

        a.bind("10.1.0.1").await.unwrap();
        a.bind("10.1.0.1").await.unwrap();
        assert_eq!(exchange.bindings().len(), 1);

        a.unbind("10.1.0.1").await.unwrap();
        assert!(exchange.bindings().is_empty());
        assert_eq!(exchange.publish("10.1.0.1", b"x"), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_switches() {
        let exchange = MockExchange::new("ip-router");
        let a = MockBroker::connect(&exchange);

        a.set_bind_failure(true);
        let err = a.bind("10.2.*.*").await.unwrap_err();
        assert!(matches!(err, TransportError::BindFailed { .. }));
        assert!(exchange.bindings().is_empty());

        a.set_bind_failure(false);
        a.bind("10.2.*.*").await.unwrap();

        a.set_unbind_failure(true);
        let err = a.unbind("10.2.*.*").await.unwrap_err();
        assert!(matches!(err, TransportError::UnbindFailed { .. }));
        assert_eq!(exchange.bindings().len(), 1);
    }

    #[tokio::test]
    async fn test_consume_once_and_failures() {
        let exchange = MockExchange::new("ip-router");
        let a = MockBroker::connect(&exchange);

        a.set_consume_failure(true);
        assert!(a.consume().await.is_err());
        a.set_consume_failure(false);

        let _stream = a.consume().await.unwrap();
        assert!(a.consume().await.is_err());

        a.set_publish_failure(true);
        let err = a.publish("10.0.0.1", b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::PublishFailed { .. }));
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let exchange = MockExchange::new("ip-router");
        let a = MockBroker::connect(&exchange);
        a.bind("#").await.unwrap();
        let mut stream = a.consume().await.unwrap();

        a.close().await.unwrap();

        assert!(a.is_closed());
        assert!(exchange.bindings().is_empty());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_fail_delivery_surfaces_error() {
        let exchange = MockExchange::new("ip-router");
        let a = MockBroker::connect(&exchange);
        let mut stream = a.consume().await.unwrap();

        a.fail_delivery("connection reset");

        let item = stream.next().await.unwrap();
        assert!(matches!(item, Err(TransportError::ConsumeFailed { .. })));
    }
}
