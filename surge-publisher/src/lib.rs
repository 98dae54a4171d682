//! # Surge Publisher
//!
//! Producer side of the Surge load generator.
//!
//! This crate provides:
//! - The [`BrokerClient`] seam and an in-process [`SimulatedBroker`]
//! - Base64 wire [`Record`]s built from messages
//! - Non-empty [`Batch`]es sent with one all-or-nothing call
//! - The shared [`ProducerAdapter`], which classifies every call as a [`SendResult`]
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use surge_core::{EventType, Message, Topic};
//! use surge_publisher::{ProducerAdapter, SimulatedBroker};
//!
//! # async fn example() -> surge_core::Result<()> {
//! let producer = ProducerAdapter::new(Arc::new(SimulatedBroker::instant()), Topic::new("orders")?);
//!
//! let message = Message::builder()
//!     .event_type(EventType::LoadTest)
//!     .payload("{}")
//!     .build()?;
//! let result = producer.send_one(message).await;
//! assert!(result.is_success());
//! producer.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod client;
pub mod codec;
pub mod config;
pub mod producer;

pub use batch::Batch;
pub use client::{AcceptedBatch, BrokerClient, SimulatedBroker};
pub use codec::{decode_record, encode_message, Record};
pub use config::PublisherConfig;
pub use producer::{ProducerAdapter, SendOutcome, SendResult};
pub use surge_core::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{Batch, BrokerClient, ProducerAdapter, PublisherConfig, SendOutcome, SendResult};
    pub use surge_core::prelude::*;
}
