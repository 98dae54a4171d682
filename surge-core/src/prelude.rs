//! # Prelude
//!
//! Commonly used types from the Surge core library.

pub use crate::{
    config::{ConfigLoader, LoadGenConfig},
    error::{Error, Result},
    message::{Amount, EventType, Message, MessageBuilder, MessageId, OrderPayload, Topic},
    types::{BrokerList, Timestamp},
};

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
