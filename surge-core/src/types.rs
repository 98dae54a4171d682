//! Common types used throughout Surge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp type for message creation and run bookkeeping.
pub type Timestamp = DateTime<Utc>;

/// Ordered list of broker endpoints (`host:port`).
///
/// Deserializes from either a list or a comma-separated string, so both the TOML file and
/// the `KAFKA_BROKERS` variable can feed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BrokerList(Vec<String>);

impl BrokerList {
    /// Create a broker list from endpoints.
    ///
    /// # Errors
    /// Returns an error if the list is empty or an endpoint is blank.
    pub fn new(endpoints: Vec<String>) -> crate::Result<Self> {
        if endpoints.is_empty() {
            return Err(crate::Error::configuration("at least one broker endpoint is required"));
        }
        if endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(crate::Error::configuration("broker endpoints cannot be blank"));
        }
        Ok(Self(endpoints))
    }

    /// Endpoints in declaration order.
    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        &self.0
    }

    /// Number of endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a validated list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for BrokerList {
    type Err = crate::Error;

    /// Parse a comma-separated endpoint list, e.g. `kafka-1:9092,kafka-2:9092`.
    fn from_str(s: &str) -> crate::Result<Self> {
        let endpoints = s
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(endpoints)
    }
}

impl<'de> Deserialize<'de> for BrokerList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            List(Vec<String>),
            Csv(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::List(endpoints) => Self::new(endpoints),
            Repr::Csv(csv) => csv.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for BrokerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl Default for BrokerList {
    fn default() -> Self {
        Self(vec!["localhost:9092".to_string()])
    }
}
