//! Outbound message queue (§4.1). Decouples publish attempts from the
//! transport: `peek` must be followed by a successful transport send before
//! the message is `pop`ped, so a transport failure leaves the message at the
//! head, unchanged, for the next `publish()` call to retry.

use crate::limits;
use std::collections::VecDeque;

/// A serialized `(topic, payload)` pair awaiting transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
}

impl OutboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> crate::Result<Self> {
        let topic = topic.into();
        let payload = payload.into();
        if topic.len() > limits::TOPIC_SIZE || payload.len() > limits::PAYLOAD_SIZE {
            return Err(crate::ConnectorError::MessageTooLarge);
        }
        Ok(Self { topic, payload })
    }

    /// Approximate on-the-wire size in bytes, used for ring capacity
    /// accounting (topic + payload, ignoring MQTT framing overhead).
    fn byte_len(&self) -> usize {
        self.topic.len() + self.payload.len()
    }
}

/// Any component implementing these four operations can back the outbound
/// queue — an in-memory ring (below) or a user-supplied persistence backend.
pub trait OutboundBackend {
    /// Enqueue `msg`. Returns `false` (queue left unchanged) if it does not
    /// fit and the wrap policy forbids eviction.
    fn push(&mut self, msg: OutboundMessage) -> bool;
    /// Return the head without removing it.
    fn peek(&self) -> Option<&OutboundMessage>;
    /// Remove and return the head.
    fn pop(&mut self) -> Option<OutboundMessage>;
    /// Whether the queue holds no messages.
    fn is_empty(&self) -> bool;
    /// Number of messages currently queued.
    fn len(&self) -> usize;
}

/// An in-memory ring over a caller-specified byte budget, built on a
/// `VecDeque`. This is the reference backend; callers needing persistence
/// across process restarts supply their own [`OutboundBackend`].
pub struct RingQueue {
    messages: VecDeque<OutboundMessage>,
    capacity_bytes: usize,
    used_bytes: usize,
    wrap: bool,
}

impl RingQueue {
    /// `capacity_bytes` bounds the sum of `topic.len() + payload.len()` of
    /// all queued messages. `wrap`: on overflow, evict the oldest record
    /// (`true`) or reject the push (`false`).
    pub fn new(capacity_bytes: usize, wrap: bool) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity_bytes,
            used_bytes: 0,
            wrap,
        }
    }
}

impl OutboundBackend for RingQueue {
    fn push(&mut self, msg: OutboundMessage) -> bool {
        let needed = msg.byte_len();
        if needed > self.capacity_bytes {
            return false;
        }

        if !self.wrap {
            if self.used_bytes + needed > self.capacity_bytes {
                return false;
            }
        } else {
            while self.used_bytes + needed > self.capacity_bytes {
                match self.messages.pop_front() {
                    Some(evicted) => self.used_bytes -= evicted.byte_len(),
                    None => break,
                }
            }
        }

        self.used_bytes += needed;
        self.messages.push_back(msg);
        true
    }

    fn peek(&self) -> Option<&OutboundMessage> {
        self.messages.front()
    }

    fn pop(&mut self) -> Option<OutboundMessage> {
        let msg = self.messages.pop_front()?;
        self.used_bytes -= msg.byte_len();
        Some(msg)
    }

    fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn len(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(n: usize) -> OutboundMessage {
        OutboundMessage::new(format!("t{n}"), "x".repeat(8)).unwrap()
    }

    #[test]
    fn fifo_order() {
        let mut q = RingQueue::new(1_000_000, false);
        for i in 0..5 {
            assert!(q.push(msg(i)));
        }
        for i in 0..5 {
            assert_eq!(q.peek().unwrap().topic, format!("t{i}"));
            let popped = q.pop().unwrap();
            assert_eq!(popped.topic, format!("t{i}"));
        }
        assert!(q.is_empty());
        assert!(q.pop().is_none());
    }

    #[test]
    fn wrap_false_rejects_on_overflow_and_is_unchanged() {
        let one = msg(0).byte_len();
        let mut q = RingQueue::new(one * 2, false);
        assert!(q.push(msg(0)));
        assert!(q.push(msg(1)));
        assert!(!q.push(msg(2)));
        assert_eq!(q.len(), 2);
        assert_eq!(q.peek().unwrap().topic, "t0");
    }

    #[test]
    fn wrap_true_evicts_oldest() {
        let one = msg(0).byte_len();
        let mut q = RingQueue::new(one * 2, true);
        assert!(q.push(msg(0)));
        assert!(q.push(msg(1)));
        assert!(q.push(msg(2)));
        assert_eq!(q.len(), 2);
        assert_eq!(q.peek().unwrap().topic, "t1");
    }

    #[test]
    fn push_larger_than_capacity_fails() {
        let mut q = RingQueue::new(4, true);
        assert!(!q.push(msg(0)));
        assert!(q.is_empty());
    }

    fn msg_sized(topic: &str, n: usize) -> OutboundMessage {
        OutboundMessage::new(topic, "x".repeat(n)).unwrap()
    }

    #[test]
    fn push_fails_fully_leaves_queue_unchanged_on_exact_boundary() {
        let mut q = RingQueue::new(20, false);
        assert!(q.push(msg_sized("a", 10))); // 11 bytes used
        assert!(!q.push(msg_sized("bb", 10))); // would need 12 more, only 9 left
        assert_eq!(q.len(), 1);
        assert_eq!(q.peek().unwrap().topic, "a");
    }
}
