//! Wire-format checks for messages as the downstream consumer reads them.

use proptest::prelude::*;
use surge_core::{Amount, EventType, Message, MessageId, OrderPayload};

fn order_message(cents: u64, items: u32) -> Message {
    let id = MessageId::new();
    let payload = OrderPayload {
        order_id: format!("ORD-{id}"),
        customer_id: "CUST-4242".to_string(),
        amount: Amount::from_cents(cents),
        items,
    };

    Message::builder()
        .message_id(id)
        .event_type(EventType::LoadTest)
        .payload(payload.to_json().unwrap())
        .source("surge-producer")
        .correlation_id("corr-AbC123")
        .build()
        .unwrap()
}

#[test]
fn test_message_json_round_trip_preserves_fields() {
    let message = order_message(99_999, 7);
    let decoded: Message = serde_json::from_str(&message.to_json().unwrap()).unwrap();

    assert_eq!(decoded, message);
    assert_eq!(decoded.order().unwrap().amount, Amount::from_cents(99_999));
}

#[test]
fn test_timestamp_is_iso8601() {
    let message = order_message(1_000, 1);
    let json: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
    let timestamp = json["timestamp"].as_str().unwrap();

    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[test]
fn test_setup_probe_event_name() {
    let json = serde_json::to_string(&EventType::SetupProbe).unwrap();
    assert_eq!(json, "\"K6_SETUP\"");
}

proptest! {
    #[test]
    fn amount_serializes_with_at_most_two_decimals(cents in 1_000u64..=100_000) {
        let text = serde_json::to_string(&Amount::from_cents(cents)).unwrap();
        let decimals = text.split('.').nth(1).map_or(0, str::len);
        prop_assert!(decimals <= 2, "{} has {} decimals", text, decimals);

        let back: Amount = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(back, Amount::from_cents(cents));
    }
}
