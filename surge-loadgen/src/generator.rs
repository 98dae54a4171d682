//! Synthetic message generation.
//!
//! Every message carries an [`OrderPayload`] except the setup probe. Generation never
//! fails: payload serialization of a plain struct is infallible in practice, and an error
//! there degrades to an empty object rather than aborting an iteration.

use rand::{distributions::Alphanumeric, Rng};
use surge_core::{Amount, EventType, Message, MessageId, OrderPayload};
use uuid::Uuid;

/// `source` of regular traffic.
pub const PRODUCER_SOURCE: &str = "surge-producer";
/// `source` of duplicate re-sends.
pub const DUPLICATE_SOURCE: &str = "surge-duplicate-test";
/// `source` of the setup probe.
pub const SETUP_SOURCE: &str = "surge-setup";

/// Generate a regular `LOAD_TEST` message with a fresh v4 id.
#[must_use]
pub fn generate() -> Message {
    generate_with(&mut rand::thread_rng())
}

/// [`generate`] drawing from the given RNG.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Message {
    let id = MessageId::new();
    let correlation: String = (0..6).map(|_| char::from(rng.sample(Alphanumeric))).collect();
    let payload = random_order(rng, &id);

    assemble(id, EventType::LoadTest, payload, PRODUCER_SOURCE, format!("corr-{correlation}"))
}

/// Generate a `DUPLICATE_TEST` message that reuses `message_id` with a fresh payload.
#[must_use]
pub fn generate_duplicate(message_id: &MessageId) -> Message {
    generate_duplicate_with(&mut rand::thread_rng(), message_id)
}

/// [`generate_duplicate`] drawing from the given RNG.
pub fn generate_duplicate_with<R: Rng + ?Sized>(rng: &mut R, message_id: &MessageId) -> Message {
    let payload = random_order(rng, message_id);
    assemble(
        message_id.clone(),
        EventType::DuplicateTest,
        payload,
        DUPLICATE_SOURCE,
        format!("dup-{message_id}"),
    )
}

/// The connectivity probe sent once during setup.
#[must_use]
pub fn setup_probe() -> Message {
    assemble(
        MessageId::from_string(format!("setup-{}", Uuid::new_v4())),
        EventType::SetupProbe,
        r#"{"test":"connection"}"#.to_string(),
        SETUP_SOURCE,
        "setup".to_string(),
    )
}

/// Random order for `id`: amount uniform in whole cents over [10.00, 1000.00], 1-10 items.
pub fn random_order<R: Rng + ?Sized>(rng: &mut R, id: &MessageId) -> String {
    let order = OrderPayload {
        order_id: format!("ORD-{id}"),
        customer_id: format!("CUST-{}", rng.gen_range(1000..=9999)),
        amount: Amount::from_cents(rng.gen_range(Amount::MIN.cents()..=Amount::MAX.cents())),
        items: rng.gen_range(1..=10),
    };
    order.to_json().unwrap_or_else(|_| "{}".to_string())
}

fn assemble(
    message_id: MessageId,
    event_type: EventType,
    payload: String,
    source: &str,
    correlation_id: String,
) -> Message {
    Message {
        message_id,
        event_type,
        payload,
        timestamp: chrono::Utc::now(),
        source: source.to_string(),
        correlation_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let message = generate();
        assert_eq!(message.event_type, EventType::LoadTest);
        assert_eq!(message.source, PRODUCER_SOURCE);
        assert_eq!(message.message_id.as_uuid().map(|u| u.get_version_num()), Some(4));

        let correlation = message.correlation_id.strip_prefix("corr-").unwrap();
        assert_eq!(correlation.len(), 6);
        assert!(correlation.chars().all(|c| c.is_ascii_alphanumeric()));

        let order = message.order().unwrap();
        assert_eq!(order.order_id, format!("ORD-{}", message.message_id));
    }

    #[test]
    fn test_setup_probe() {
        let probe = setup_probe();
        assert!(probe.message_id.as_str().starts_with("setup-"));
        assert_eq!(probe.event_type, EventType::SetupProbe);
        assert_eq!(probe.payload, r#"{"test":"connection"}"#);
        assert_eq!(probe.correlation_id, "setup");
        assert!(probe.order().is_err());
    }

    #[test]
    fn test_duplicate_correlation() {
        let id = MessageId::from_string("abc");
        let dup = generate_duplicate(&id);
        assert_eq!(dup.correlation_id, "dup-abc");
        assert_eq!(dup.source, DUPLICATE_SOURCE);
        assert_eq!(dup.order().unwrap().order_id, "ORD-abc");
    }
}
