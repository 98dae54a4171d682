//! Batch accounting through the producer adapter against the simulated broker.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use surge_core::{config::SimulationSection, EventType, Message, MessageId, Topic};
use surge_publisher::{
    codec::{decode_key, decode_record},
    Batch, ProducerAdapter, SendOutcome, SimulatedBroker,
};

fn messages(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| {
            Message::builder()
                .event_type(EventType::LoadTest)
                .payload(format!("{{\"seq\":{i}}}"))
                .source("surge-producer")
                .build()
                .unwrap()
        })
        .collect()
}

fn failing_broker() -> SimulatedBroker {
    SimulatedBroker::new(&SimulationSection {
        min_latency: Duration::ZERO,
        max_latency: Duration::ZERO,
        failure_ratio: 1.0,
    })
}

#[tokio::test]
async fn test_batch_counts_add_up_on_success() {
    for n in [1, 10, 200, 500] {
        let broker = Arc::new(SimulatedBroker::instant());
        let producer = ProducerAdapter::new(broker.clone(), Topic::new("orders").unwrap());

        let result = producer.send(&Batch::new(messages(n)).unwrap()).await;

        assert_eq!(result.succeeded_count + result.failed_count, n);
        assert_eq!(result.succeeded_count, n);
        assert_eq!(result.outcome, SendOutcome::Acknowledged);
        assert_eq!(broker.produced_records(), n as u64);
    }
}

#[tokio::test]
async fn test_batch_counts_add_up_on_failure() {
    for n in [1, 10, 200, 500] {
        let producer = ProducerAdapter::new(Arc::new(failing_broker()), Topic::new("orders").unwrap());

        let result = producer.send(&Batch::new(messages(n)).unwrap()).await;

        assert_eq!(result.succeeded_count + result.failed_count, n);
        assert_eq!(result.failed_count, n);
        assert_eq!(result.bytes, 0);
        assert!(matches!(result.outcome, SendOutcome::Failed(_)));
    }
}

#[tokio::test]
async fn test_bytes_match_message_json() {
    let broker = Arc::new(SimulatedBroker::instant().with_capture());
    let producer = ProducerAdapter::new(broker.clone(), Topic::new("orders").unwrap());
    let batch = Batch::new(messages(3)).unwrap();

    let result = producer.send(&batch).await;

    let expected: u64 = batch.iter().map(|m| m.to_json().unwrap().len() as u64).sum();
    assert_eq!(result.bytes, expected);

    // base64 on the wire is larger than what throughput reports
    let wire: u64 = broker.accepted()[0].records.iter().map(|r| r.value.len() as u64).sum();
    assert!(wire > result.bytes);
}

#[tokio::test]
async fn test_records_keyed_by_message_id_in_order() {
    let broker = Arc::new(SimulatedBroker::instant().with_capture());
    let producer = ProducerAdapter::new(broker.clone(), Topic::new("orders").unwrap());
    let batch = Batch::new(messages(4)).unwrap();

    producer.send(&batch).await;

    let records = &broker.accepted()[0].records;
    for (record, message) in records.iter().zip(batch.iter()) {
        assert_eq!(decode_key(record).unwrap(), message.message_id.as_str());
        assert_eq!(&decode_record(record).unwrap(), message);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batches_stay_intact() {
    let broker = Arc::new(SimulatedBroker::instant().with_capture());
    let producer = Arc::new(ProducerAdapter::new(broker.clone(), Topic::new("orders").unwrap()));

    let sends = (0..16).map(|_| {
        let producer = producer.clone();
        tokio::spawn(async move { producer.send(&Batch::new(messages(25)).unwrap()).await })
    });
    for result in join_all(sends).await {
        assert!(result.unwrap().is_success());
    }

    let accepted = broker.accepted();
    assert_eq!(accepted.len(), 16);
    for batch in accepted {
        let seqs: Vec<String> = batch
            .records
            .iter()
            .map(|r| decode_record(r).unwrap().payload)
            .collect();
        let expected: Vec<String> = (0..25).map(|i| format!("{{\"seq\":{i}}}")).collect();
        assert_eq!(seqs, expected);
    }
}

#[tokio::test]
async fn test_duplicate_ids_are_sent_as_is() {
    let broker = Arc::new(SimulatedBroker::instant().with_capture());
    let producer = ProducerAdapter::new(broker.clone(), Topic::new("orders").unwrap());
    let id = MessageId::from_string("dup-target");

    for _ in 0..2 {
        let message = Message::builder()
            .message_id(id.clone())
            .event_type(EventType::DuplicateTest)
            .payload("{}")
            .build()
            .unwrap();
        assert!(producer.send_one(message).await.is_success());
    }

    let keys: Vec<String> =
        broker.accepted().iter().map(|b| decode_key(&b.records[0]).unwrap()).collect();
    assert_eq!(keys, ["dup-target", "dup-target"]);
}
