//! Broker client seam.
//!
//! [`BrokerClient`] is the only thing the producer knows about the broker. The shipped
//! implementation is [`SimulatedBroker`], an in-process stand-in with a configurable
//! round-trip latency and failure ratio.

use crate::codec::Record;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use surge_core::{config::SimulationSection, Error, Result, Topic};
use tracing::{debug, trace};

/// Client capable of producing record batches to a topic.
///
/// A produce call is all-or-nothing: either every record of the slice is accepted or the
/// call fails. Implementations are shared across tasks and must not interleave the
/// records of concurrent calls.
#[async_trait]
pub trait BrokerClient: Send + Sync + std::fmt::Debug {
    /// Produce `records` to `topic` in order.
    async fn produce(&self, topic: &Topic, records: &[Record]) -> Result<()>;

    /// Release the connection. Calling it more than once is allowed.
    async fn close(&self) -> Result<()>;
}

/// Batch accepted by a [`SimulatedBroker`].
#[derive(Debug, Clone)]
pub struct AcceptedBatch {
    /// Topic written to
    pub topic: Topic,
    /// Records in the order they were produced
    pub records: Vec<Record>,
}

/// In-process broker that sleeps for a random latency and fails a fraction of calls.
#[derive(Debug)]
pub struct SimulatedBroker {
    min_latency: Duration,
    max_latency: Duration,
    failure_ratio: f64,
    capture: bool,
    accepted: Mutex<Vec<AcceptedBatch>>,
    produced_records: AtomicU64,
    failed_calls: AtomicU64,
    closed: AtomicBool,
}

impl SimulatedBroker {
    /// Create a simulated broker from the `[simulation]` config section.
    #[must_use]
    pub fn new(settings: &SimulationSection) -> Self {
        Self {
            min_latency: settings.min_latency,
            max_latency: settings.max_latency.max(settings.min_latency),
            failure_ratio: settings.failure_ratio.clamp(0.0, 1.0),
            capture: false,
            accepted: Mutex::new(Vec::new()),
            produced_records: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// A broker that answers immediately and never fails.
    #[must_use]
    pub fn instant() -> Self {
        Self::new(&SimulationSection {
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
            failure_ratio: 0.0,
        })
    }

    /// Keep a copy of every accepted batch, see [`accepted`](Self::accepted).
    #[must_use]
    pub fn with_capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Batches accepted so far (empty unless capture is enabled).
    #[must_use]
    pub fn accepted(&self) -> Vec<AcceptedBatch> {
        self.accepted.lock().clone()
    }

    /// Total records accepted.
    #[must_use]
    pub fn produced_records(&self) -> u64 {
        self.produced_records.load(Ordering::Relaxed)
    }

    /// Produce calls that failed.
    #[must_use]
    pub fn failed_calls(&self) -> u64 {
        self.failed_calls.load(Ordering::Relaxed)
    }

    /// Whether [`close`](BrokerClient::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn sample_latency(&self) -> Duration {
        if self.max_latency <= self.min_latency {
            return self.min_latency;
        }
        rand::thread_rng().gen_range(self.min_latency..=self.max_latency)
    }

    fn should_fail(&self) -> bool {
        self.failure_ratio > 0.0 && rand::thread_rng().gen_bool(self.failure_ratio)
    }
}

#[async_trait]
impl BrokerClient for SimulatedBroker {
    async fn produce(&self, topic: &Topic, records: &[Record]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let latency = self.sample_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.should_fail() {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
            debug!(topic = %topic, records = records.len(), "Simulated produce failure");
            return Err(Error::broker("simulated produce failure"));
        }

        if self.capture {
            self.accepted.lock().push(AcceptedBatch {
                topic: topic.clone(),
                records: records.to_vec(),
            });
        }
        self.produced_records.fetch_add(records.len() as u64, Ordering::Relaxed);
        trace!(topic = %topic, records = records.len(), ?latency, "Batch accepted");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(records = self.produced_records(), "Simulated broker closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn record(n: u8) -> Record {
        Record { key: Bytes::from(vec![n]), value: Bytes::from(vec![n, n]), message_len: 2 }
    }

    fn topic() -> Topic {
        Topic::new("high-volume-topic").unwrap()
    }

    #[tokio::test]
    async fn test_accepts_whole_batch() {
        let broker = SimulatedBroker::instant().with_capture();
        broker.produce(&topic(), &[record(1), record(2)]).await.unwrap();

        let accepted = broker.accepted();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].records, vec![record(1), record(2)]);
        assert_eq!(broker.produced_records(), 2);
    }

    #[tokio::test]
    async fn test_always_failing_broker() {
        let broker = SimulatedBroker::new(&SimulationSection {
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
            failure_ratio: 1.0,
        });

        let err = broker.produce(&topic(), &[record(1)]).await.unwrap_err();
        assert!(matches!(err, Error::Broker { .. }));
        assert_eq!(broker.produced_records(), 0);
        assert_eq!(broker.failed_calls(), 1);
    }

    #[tokio::test]
    async fn test_closed_broker_rejects() {
        let broker = SimulatedBroker::instant();
        broker.close().await.unwrap();
        broker.close().await.unwrap();
        assert_eq!(broker.produce(&topic(), &[record(1)]).await, Err(Error::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let broker = SimulatedBroker::new(&SimulationSection {
            min_latency: Duration::from_millis(20),
            max_latency: Duration::from_millis(20),
            failure_ratio: 0.0,
        });

        let start = tokio::time::Instant::now();
        broker.produce(&topic(), &[record(1)]).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
