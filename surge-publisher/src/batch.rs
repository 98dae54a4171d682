//! Non-empty message batches handed to the producer in one call.

use surge_core::{Error, Message, Result};

/// Ordered, non-empty group of messages sent with a single all-or-nothing produce call.
#[derive(Debug, Clone)]
pub struct Batch {
    messages: Vec<Message>,
}

impl Batch {
    /// Create a batch from messages, preserving their order.
    ///
    /// # Errors
    /// Returns [`Error::EmptyBatch`] if `messages` is empty.
    pub fn new(messages: Vec<Message>) -> Result<Self> {
        if messages.is_empty() {
            return Err(Error::EmptyBatch);
        }
        Ok(Self { messages })
    }

    /// A batch holding exactly one message.
    #[must_use]
    pub fn single(message: Message) -> Self {
        Self { messages: vec![message] }
    }

    /// Number of messages in the batch (at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages in send order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Iterate over the messages in send order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Take the messages back out.
    #[must_use]
    pub fn into_inner(self) -> Vec<Message> {
        self.messages
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl TryFrom<Vec<Message>> for Batch {
    type Error = Error;

    fn try_from(messages: Vec<Message>) -> Result<Self> {
        Self::new(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_core::EventType;

    fn message(n: usize) -> Message {
        Message::builder()
            .event_type(EventType::LoadTest)
            .payload(format!("{{\"n\":{n}}}"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert_eq!(Batch::new(Vec::new()).unwrap_err(), Error::EmptyBatch);
    }

    #[test]
    fn test_batch_preserves_order() {
        let messages: Vec<_> = (0..5).map(message).collect();
        let ids: Vec<_> = messages.iter().map(|m| m.message_id.clone()).collect();
        let batch = Batch::new(messages).unwrap();

        assert_eq!(batch.len(), 5);
        assert!(!batch.is_empty());
        assert!(batch.iter().map(|m| &m.message_id).eq(ids.iter()));
    }
}
