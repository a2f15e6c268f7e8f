// Message Broker Port
// Durable queue with at-least-once delivery and explicit ack/nack

use crate::error::Result;
use async_trait::async_trait;

/// Broker-assigned handle used to settle a delivery
pub type DeliveryTag = i64;

/// One delivered, not yet settled message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub queue: String,
    pub body: Vec<u8>,
    /// How many times this message has been handed out, this one included
    pub delivery_count: i64,
}

impl Delivery {
    pub fn redelivered(&self) -> bool {
        self.delivery_count > 1
    }
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Declare a durable queue (idempotent)
    async fn declare_queue(&self, queue: &str) -> Result<()>;

    /// Append a message to a declared queue
    async fn publish(&self, queue: &str, body: &[u8]) -> Result<DeliveryTag>;

    /// Cap unacknowledged deliveries for `queue` (0 = unlimited)
    async fn set_prefetch(&self, queue: &str, count: usize) -> Result<()>;

    /// Claim the oldest ready message
    ///
    /// Returns `None` when the queue is empty or the prefetch window is full.
    async fn next_delivery(&self, queue: &str) -> Result<Option<Delivery>>;

    /// Settle a delivery: the message is removed for good
    async fn ack(&self, tag: DeliveryTag) -> Result<()>;

    /// Negative acknowledgement: requeue for redelivery, or drop
    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<()>;

    /// Return every unacknowledged message of `queue` to the ready state
    ///
    /// Used at startup to take back deliveries held by a consumer that died.
    async fn recover(&self, queue: &str) -> Result<u64>;

    /// Number of messages still held for `queue` (ready + unacked)
    async fn depth(&self, queue: &str) -> Result<i64>;

    /// Release the channel; later calls fail
    async fn close(&self) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct StoredMessage {
        queue: String,
        body: Vec<u8>,
        delivery_count: i64,
        unacked: bool,
    }

    #[derive(Default)]
    struct BrokerState {
        queues: HashMap<String, usize>, // queue -> prefetch
        // Keyed by tag; BTreeMap keeps publish order for FIFO claims
        messages: BTreeMap<DeliveryTag, StoredMessage>,
        next_tag: DeliveryTag,
        acked: Vec<DeliveryTag>,
        nacked: Vec<DeliveryTag>,
        closed: bool,
    }

    /// In-memory broker with the same semantics as the durable adapter
    #[derive(Default)]
    pub struct InMemoryBroker {
        state: Mutex<BrokerState>,
    }

    impl InMemoryBroker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn acked(&self) -> Vec<DeliveryTag> {
            self.state.lock().unwrap().acked.clone()
        }

        pub fn nacked(&self) -> Vec<DeliveryTag> {
            self.state.lock().unwrap().nacked.clone()
        }

        pub fn unacked_count(&self, queue: &str) -> usize {
            self.state
                .lock()
                .unwrap()
                .messages
                .values()
                .filter(|m| m.queue == queue && m.unacked)
                .count()
        }

        pub fn is_closed(&self) -> bool {
            self.state.lock().unwrap().closed
        }
    }

    fn ensure_open(state: &BrokerState) -> Result<()> {
        if state.closed {
            return Err(AppError::Broker("channel closed".to_string()));
        }
        Ok(())
    }

    #[async_trait]
    impl MessageBroker for InMemoryBroker {
        async fn declare_queue(&self, queue: &str) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            ensure_open(&state)?;
            state.queues.entry(queue.to_string()).or_insert(0);
            Ok(())
        }

        async fn publish(&self, queue: &str, body: &[u8]) -> Result<DeliveryTag> {
            let mut state = self.state.lock().unwrap();
            ensure_open(&state)?;
            if !state.queues.contains_key(queue) {
                return Err(AppError::Broker(format!("queue {} not declared", queue)));
            }
            state.next_tag += 1;
            let tag = state.next_tag;
            state.messages.insert(
                tag,
                StoredMessage {
                    queue: queue.to_string(),
                    body: body.to_vec(),
                    delivery_count: 0,
                    unacked: false,
                },
            );
            Ok(tag)
        }

        async fn set_prefetch(&self, queue: &str, count: usize) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            ensure_open(&state)?;
            state.queues.insert(queue.to_string(), count);
            Ok(())
        }

        async fn next_delivery(&self, queue: &str) -> Result<Option<Delivery>> {
            let mut state = self.state.lock().unwrap();
            ensure_open(&state)?;

            let prefetch = state.queues.get(queue).copied().unwrap_or(0);
            let in_flight = state
                .messages
                .values()
                .filter(|m| m.queue == queue && m.unacked)
                .count();
            if prefetch > 0 && in_flight >= prefetch {
                return Ok(None);
            }

            let next = state
                .messages
                .iter_mut()
                .find(|(_, m)| m.queue == queue && !m.unacked);
            Ok(next.map(|(tag, message)| {
                message.unacked = true;
                message.delivery_count += 1;
                Delivery {
                    tag: *tag,
                    queue: message.queue.clone(),
                    body: message.body.clone(),
                    delivery_count: message.delivery_count,
                }
            }))
        }

        async fn ack(&self, tag: DeliveryTag) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            ensure_open(&state)?;
            let known = matches!(state.messages.get(&tag), Some(m) if m.unacked);
            if !known {
                return Err(AppError::Broker(format!("unknown delivery tag {}", tag)));
            }
            state.messages.remove(&tag);
            state.acked.push(tag);
            Ok(())
        }

        async fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            ensure_open(&state)?;
            let known = matches!(state.messages.get(&tag), Some(m) if m.unacked);
            if !known {
                return Err(AppError::Broker(format!("unknown delivery tag {}", tag)));
            }
            if requeue {
                if let Some(message) = state.messages.get_mut(&tag) {
                    message.unacked = false;
                }
            } else {
                state.messages.remove(&tag);
            }
            state.nacked.push(tag);
            Ok(())
        }

        async fn recover(&self, queue: &str) -> Result<u64> {
            let mut state = self.state.lock().unwrap();
            ensure_open(&state)?;
            let mut recovered = 0;
            for message in state.messages.values_mut() {
                if message.queue == queue && message.unacked {
                    message.unacked = false;
                    recovered += 1;
                }
            }
            Ok(recovered)
        }

        async fn depth(&self, queue: &str) -> Result<i64> {
            let state = self.state.lock().unwrap();
            ensure_open(&state)?;
            Ok(state.messages.values().filter(|m| m.queue == queue).count() as i64)
        }

        async fn close(&self) -> Result<()> {
            self.state.lock().unwrap().closed = true;
            Ok(())
        }
    }
}
