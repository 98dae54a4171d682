//! # Surge Core
//!
//! Shared building blocks for the Surge broker load generator.
//!
//! - [`message`]: the synthetic event sent to the broker and its embedded order payload
//! - [`config`]: layered configuration (defaults, TOML file, environment)
//! - [`error`]: error type and result alias used across the workspace
//! - [`types`]: small shared types such as [`BrokerList`]
//!
//! ## Quick Start
//!
//! ```rust
//! use surge_core::{EventType, Message};
//!
//! let message = Message::builder()
//!     .event_type(EventType::LoadTest)
//!     .payload(r#"{"test":"connection"}"#)
//!     .source("docs")
//!     .build()?;
//!
//! assert!(message.message_id.as_uuid().is_some());
//! # Ok::<(), surge_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod message;
pub mod prelude;
pub mod types;

pub use crate::{
    config::LoadGenConfig,
    error::{Error, Result},
    message::{Amount, EventType, Message, MessageBuilder, MessageId, OrderPayload, Topic},
    types::{BrokerList, Timestamp},
};
