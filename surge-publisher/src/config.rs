//! Publisher configuration types.

use surge_core::{config::SimulationSection, BrokerList, LoadGenConfig, Result, Topic};

/// Settings needed to build a [`ProducerAdapter`](crate::ProducerAdapter).
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Broker endpoints, reported in the banner
    pub brokers: BrokerList,

    /// Validated destination topic
    pub topic: Topic,

    /// Simulated broker behaviour
    pub simulation: SimulationSection,
}

impl PublisherConfig {
    /// Extract publisher settings from the run configuration.
    ///
    /// # Errors
    /// Returns an error if the configured topic is not a valid topic name.
    pub fn from_loadgen(config: &LoadGenConfig) -> Result<Self> {
        Ok(Self {
            brokers: config.broker.brokers.clone(),
            topic: Topic::new(config.broker.topic.clone())?,
            simulation: config.simulation.clone(),
        })
    }
}
