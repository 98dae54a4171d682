//! Producer adapter shared by every virtual user.

use crate::{
    batch::Batch,
    client::BrokerClient,
    codec::{encode_message, Record},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surge_core::{Error, Message, Result, Topic};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a produce call, for the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Every message of the batch was accepted
    Acknowledged,
    /// No message of the batch was accepted
    Failed(Error),
}

/// Accounting for one [`ProducerAdapter::send`] call.
///
/// `succeeded_count + failed_count` always equals the batch length.
#[derive(Debug, Clone, PartialEq)]
pub struct SendResult {
    /// Messages accepted by the broker
    pub succeeded_count: usize,
    /// Messages not accepted
    pub failed_count: usize,
    /// Wall time of the produce call
    pub elapsed: Duration,
    /// Serialized JSON bytes of the accepted messages
    pub bytes: u64,
    /// Classified result
    pub outcome: SendOutcome,
}

impl SendResult {
    fn failed(len: usize, elapsed: Duration, error: Error) -> Self {
        Self {
            succeeded_count: 0,
            failed_count: len,
            elapsed,
            bytes: 0,
            outcome: SendOutcome::Failed(error),
        }
    }

    /// Whether the batch was acknowledged.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SendOutcome::Acknowledged)
    }

    /// Number of messages covered by this result.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded_count + self.failed_count
    }

    /// Latency attributed to each message: the batch round trip divided evenly.
    #[must_use]
    pub fn per_message_latency(&self) -> Duration {
        match u32::try_from(self.total()) {
            Ok(0) => self.elapsed,
            Ok(n) => self.elapsed / n,
            Err(_) => Duration::ZERO,
        }
    }
}

/// Encodes messages, hands them to the broker client and classifies the result.
///
/// No retries: a failed call is reported once for the whole batch.
#[derive(Debug)]
pub struct ProducerAdapter {
    client: Arc<dyn BrokerClient>,
    topic: Topic,
    closed: AtomicBool,
}

impl ProducerAdapter {
    /// Create an adapter writing to `topic` through `client`.
    #[must_use]
    pub fn new(client: Arc<dyn BrokerClient>, topic: Topic) -> Self {
        Self { client, topic, closed: AtomicBool::new(false) }
    }

    /// Topic this adapter writes to.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send a batch with one all-or-nothing produce call.
    pub async fn send(&self, batch: &Batch) -> SendResult {
        let len = batch.len();
        if self.is_closed() {
            return SendResult::failed(len, Duration::ZERO, Error::Closed);
        }

        let records = match batch.iter().map(encode_message).collect::<Result<Vec<Record>>>() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, messages = len, "Failed to encode batch");
                return SendResult::failed(len, Duration::ZERO, e);
            },
        };
        let bytes: u64 = records.iter().map(|r| r.message_len as u64).sum();

        let start = Instant::now();
        let result = self.client.produce(&self.topic, &records).await;
        let elapsed = start.elapsed();

        match result {
            Ok(()) => SendResult {
                succeeded_count: len,
                failed_count: 0,
                elapsed,
                bytes,
                outcome: SendOutcome::Acknowledged,
            },
            Err(e) => {
                debug!(error = %e, messages = len, ?elapsed, "Produce call failed");
                SendResult::failed(len, elapsed, e)
            },
        }
    }

    /// Send a single message.
    pub async fn send_one(&self, message: Message) -> SendResult {
        self.send(&Batch::single(message)).await
    }

    /// Close the underlying client. Later calls are no-ops.
    ///
    /// # Errors
    /// Returns the client's error if closing fails.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.client.close().await?;
        info!(topic = %self.topic, "Producer closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SimulatedBroker;
    use surge_core::EventType;

    fn message() -> Message {
        Message::builder()
            .event_type(EventType::LoadTest)
            .payload("{}")
            .build()
            .unwrap()
    }

    fn adapter(broker: SimulatedBroker) -> ProducerAdapter {
        ProducerAdapter::new(Arc::new(broker), Topic::new("t").unwrap())
    }

    #[tokio::test]
    async fn test_send_one_acknowledged() {
        let producer = adapter(SimulatedBroker::instant());
        let result = producer.send_one(message()).await;

        assert!(result.is_success());
        assert_eq!(result.succeeded_count, 1);
        assert!(result.bytes > 0);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let producer = adapter(SimulatedBroker::instant());
        producer.close().await.unwrap();
        producer.close().await.unwrap();

        let result = producer.send_one(message()).await;
        assert_eq!(result.outcome, SendOutcome::Failed(Error::Closed));
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.bytes, 0);
    }

    #[test]
    fn test_per_message_latency() {
        let result = SendResult {
            succeeded_count: 4,
            failed_count: 0,
            elapsed: Duration::from_millis(100),
            bytes: 0,
            outcome: SendOutcome::Acknowledged,
        };
        assert_eq!(result.per_message_latency(), Duration::from_millis(25));
    }
}
