// SQLite MessageBroker Implementation
//
// Messages live in `queue_messages`. A claim flips READY -> UNACKED in one
// UPDATE ... RETURNING, so a message is never handed out twice at once.

use async_trait::async_trait;
use frameforge_core::error::{AppError, Result};
use frameforge_core::port::{Delivery, DeliveryTag, MessageBroker, TimeProvider};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const STATE_READY: &str = "READY";
const STATE_UNACKED: &str = "UNACKED";

fn broker_error(err: sqlx::Error) -> AppError {
    AppError::Broker(err.to_string())
}

pub struct SqliteMessageBroker {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    /// Per-queue unacked window; a channel setting, not persisted
    prefetch: Mutex<HashMap<String, usize>>,
    closed: AtomicBool,
}

impl SqliteMessageBroker {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
            prefetch: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::Broker("channel closed".to_string()));
        }
        Ok(())
    }

    fn prefetch_for(&self, queue: &str) -> Result<usize> {
        let prefetch = self
            .prefetch
            .lock()
            .map_err(|_| AppError::Internal("prefetch table poisoned".to_string()))?;
        Ok(prefetch.get(queue).copied().unwrap_or(0))
    }
}

#[async_trait]
impl MessageBroker for SqliteMessageBroker {
    async fn declare_queue(&self, queue: &str) -> Result<()> {
        self.ensure_open()?;
        let result = sqlx::query(
            "INSERT INTO queues (name, created_at) VALUES (?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(queue)
        .bind(self.time_provider.now_millis())
        .execute(&self.pool)
        .await
        .map_err(broker_error)?;

        if result.rows_affected() > 0 {
            info!(queue = %queue, "Queue declared");
        }
        Ok(())
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<DeliveryTag> {
        self.ensure_open()?;
        let declared: Option<String> = sqlx::query_scalar("SELECT name FROM queues WHERE name = ?")
            .bind(queue)
            .fetch_optional(&self.pool)
            .await
            .map_err(broker_error)?;
        if declared.is_none() {
            return Err(AppError::Broker(format!("queue {} not declared", queue)));
        }

        let tag: DeliveryTag = sqlx::query_scalar(
            r#"
            INSERT INTO queue_messages (queue, body, state, delivery_count, enqueued_at)
            VALUES (?, ?, ?, 0, ?)
            RETURNING id
            "#,
        )
        .bind(queue)
        .bind(body)
        .bind(STATE_READY)
        .bind(self.time_provider.now_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(broker_error)?;

        debug!(queue = %queue, tag = tag, bytes = body.len(), "Message published");
        Ok(tag)
    }

    async fn set_prefetch(&self, queue: &str, count: usize) -> Result<()> {
        self.ensure_open()?;
        self.prefetch
            .lock()
            .map_err(|_| AppError::Internal("prefetch table poisoned".to_string()))?
            .insert(queue.to_string(), count);
        Ok(())
    }

    async fn next_delivery(&self, queue: &str) -> Result<Option<Delivery>> {
        self.ensure_open()?;
        let window = match self.prefetch_for(queue)? {
            0 => i64::MAX,
            n => i64::try_from(n).unwrap_or(i64::MAX),
        };

        // Claim the oldest READY message unless the unacked window is full
        let row = sqlx::query_as::<_, DeliveryRow>(
            r#"
            UPDATE queue_messages
            SET state = ?, delivery_count = delivery_count + 1, delivered_at = ?
            WHERE id = (
                SELECT id FROM queue_messages
                WHERE queue = ? AND state = ?
                ORDER BY id ASC
                LIMIT 1
            )
              AND (
                SELECT COUNT(*) FROM queue_messages
                WHERE queue = ? AND state = ?
              ) < ?
            RETURNING id, queue, body, delivery_count
            "#,
        )
        .bind(STATE_UNACKED)
        .bind(self.time_provider.now_millis())
        .bind(queue)
        .bind(STATE_READY)
        .bind(queue)
        .bind(STATE_UNACKED)
        .bind(window)
        .fetch_optional(&self.pool)
        .await
        .map_err(broker_error)?;

        Ok(row.map(DeliveryRow::into_delivery))
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<()> {
        self.ensure_open()?;
        let result = sqlx::query("DELETE FROM queue_messages WHERE id = ? AND state = ?")
            .bind(tag)
            .bind(STATE_UNACKED)
            .execute(&self.pool)
            .await
            .map_err(broker_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Broker(format!("unknown delivery tag {}", tag)));
        }
        Ok(())
    }

    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> Result<()> {
        self.ensure_open()?;
        let result = if requeue {
            sqlx::query("UPDATE queue_messages SET state = ? WHERE id = ? AND state = ?")
                .bind(STATE_READY)
                .bind(tag)
                .bind(STATE_UNACKED)
                .execute(&self.pool)
                .await
        } else {
            sqlx::query("DELETE FROM queue_messages WHERE id = ? AND state = ?")
                .bind(tag)
                .bind(STATE_UNACKED)
                .execute(&self.pool)
                .await
        }
        .map_err(broker_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Broker(format!("unknown delivery tag {}", tag)));
        }
        debug!(tag = tag, requeue = requeue, "Delivery rejected");
        Ok(())
    }

    async fn recover(&self, queue: &str) -> Result<u64> {
        self.ensure_open()?;
        let result =
            sqlx::query("UPDATE queue_messages SET state = ? WHERE queue = ? AND state = ?")
                .bind(STATE_READY)
                .bind(queue)
                .bind(STATE_UNACKED)
                .execute(&self.pool)
                .await
                .map_err(broker_error)?;

        Ok(result.rows_affected())
    }

    async fn depth(&self, queue: &str) -> Result<i64> {
        self.ensure_open()?;
        let depth: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue_messages WHERE queue = ?")
            .bind(queue)
            .fetch_one(&self.pool)
            .await
            .map_err(broker_error)?;

        Ok(depth)
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Broker channel closed");
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: i64,
    queue: String,
    body: Vec<u8>,
    delivery_count: i64,
}

impl DeliveryRow {
    fn into_delivery(self) -> Delivery {
        Delivery {
            tag: self.id,
            queue: self.queue,
            body: self.body,
            delivery_count: self.delivery_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use frameforge_core::port::time_provider::SystemTimeProvider;

    const QUEUE: &str = "image-generation";

    async fn setup_test_db() -> (SqlitePool, SqliteMessageBroker) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let broker = SqliteMessageBroker::new(pool.clone(), Arc::new(SystemTimeProvider));
        broker.declare_queue(QUEUE).await.unwrap();
        (pool, broker)
    }

    #[tokio::test]
    async fn test_deliveries_are_fifo() {
        let (_, broker) = setup_test_db().await;
        for body in [&b"first"[..], &b"second"[..], &b"third"[..]] {
            broker.publish(QUEUE, body).await.unwrap();
        }

        let mut bodies = Vec::new();
        while let Some(delivery) = broker.next_delivery(QUEUE).await.unwrap() {
            assert!(!delivery.redelivered());
            bodies.push(delivery.body.clone());
            broker.ack(delivery.tag).await.unwrap();
        }

        assert_eq!(bodies, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
        assert_eq!(broker.depth(QUEUE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_prefetch_bounds_unacked_deliveries() {
        let (_, broker) = setup_test_db().await;
        broker.set_prefetch(QUEUE, 2).await.unwrap();
        for i in 0..4 {
            broker.publish(QUEUE, format!("m{}", i).as_bytes()).await.unwrap();
        }

        let a = broker.next_delivery(QUEUE).await.unwrap().unwrap();
        let _b = broker.next_delivery(QUEUE).await.unwrap().unwrap();
        assert!(broker.next_delivery(QUEUE).await.unwrap().is_none());

        broker.ack(a.tag).await.unwrap();
        let c = broker.next_delivery(QUEUE).await.unwrap().unwrap();
        assert_eq!(c.body, b"m2");
    }

    #[tokio::test]
    async fn test_nack_requeue_redelivers() {
        let (_, broker) = setup_test_db().await;
        broker.publish(QUEUE, b"retry-me").await.unwrap();

        let first = broker.next_delivery(QUEUE).await.unwrap().unwrap();
        broker.nack(first.tag, true).await.unwrap();

        let second = broker.next_delivery(QUEUE).await.unwrap().unwrap();
        assert_eq!(second.tag, first.tag);
        assert_eq!(second.delivery_count, 2);
        assert!(second.redelivered());
    }

    #[tokio::test]
    async fn test_nack_without_requeue_drops() {
        let (_, broker) = setup_test_db().await;
        broker.publish(QUEUE, b"poison").await.unwrap();

        let delivery = broker.next_delivery(QUEUE).await.unwrap().unwrap();
        broker.nack(delivery.tag, false).await.unwrap();

        assert_eq!(broker.depth(QUEUE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_settling_twice_fails() {
        let (_, broker) = setup_test_db().await;
        broker.publish(QUEUE, b"once").await.unwrap();
        let delivery = broker.next_delivery(QUEUE).await.unwrap().unwrap();

        broker.ack(delivery.tag).await.unwrap();
        assert!(matches!(
            broker.ack(delivery.tag).await,
            Err(AppError::Broker(_))
        ));
        assert!(broker.nack(delivery.tag, true).await.is_err());
    }

    #[tokio::test]
    async fn test_recover_after_restart() {
        let (pool, broker) = setup_test_db().await;
        broker.publish(QUEUE, b"held").await.unwrap();
        broker.next_delivery(QUEUE).await.unwrap().unwrap();
        broker.close().await.unwrap();

        // A fresh channel on the same database sees the stranded delivery
        let restarted = SqliteMessageBroker::new(pool, Arc::new(SystemTimeProvider));
        assert!(restarted.next_delivery(QUEUE).await.unwrap().is_none());
        assert_eq!(restarted.recover(QUEUE).await.unwrap(), 1);

        let again = restarted.next_delivery(QUEUE).await.unwrap().unwrap();
        assert_eq!(again.body, b"held");
        assert!(again.redelivered());
    }

    #[tokio::test]
    async fn test_publish_to_undeclared_queue_fails() {
        let (_, broker) = setup_test_db().await;
        let result = broker.publish("nowhere", b"x").await;
        assert!(matches!(result, Err(AppError::Broker(_))));
    }

    #[tokio::test]
    async fn test_closed_channel_rejects_calls() {
        let (_, broker) = setup_test_db().await;
        broker.close().await.unwrap();
        broker.close().await.unwrap();

        assert!(broker.publish(QUEUE, b"late").await.is_err());
        assert!(broker.next_delivery(QUEUE).await.is_err());
    }
}
