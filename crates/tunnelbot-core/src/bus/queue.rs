//! Async message bus — one bounded queue per direction.
//!
//! Inbound: transports push chat messages, the dispatcher pops them.
//! Outbound: modules push replies and announcements, the channel manager
//! pops them and delivers each to the transport it names.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, Mutex};

use super::types::{InboundMessage, OutboundMessage};

pub type SendError<T> = mpsc::error::SendError<T>;

/// A bounded multi-producer queue whose receiving end is shared.
struct Queue<T> {
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
    closed: AtomicBool,
}

impl<T> Queue<T> {
    fn bounded(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            closed: AtomicBool::new(false),
        }
    }

    async fn push(&self, item: T) -> Result<(), SendError<T>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(mpsc::error::SendError(item));
        }
        self.tx.send(item).await
    }

    /// Reject further pushes. Queued items can still be popped.
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    async fn pop(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    async fn try_pop(&self) -> Option<T> {
        self.rx.lock().await.try_recv().ok()
    }
}

pub struct MessageBus {
    inbound: Queue<InboundMessage>,
    outbound: Queue<OutboundMessage>,
}

impl MessageBus {
    /// Both queues hold up to `capacity` messages before senders wait.
    pub fn new(capacity: usize) -> Self {
        Self {
            inbound: Queue::bounded(capacity),
            outbound: Queue::bounded(capacity),
        }
    }

    pub async fn publish_inbound(&self, msg: InboundMessage) -> Result<(), SendError<InboundMessage>> {
        self.inbound.push(msg).await
    }

    /// Next inbound message, waiting until one arrives.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        self.inbound.pop().await
    }

    pub async fn publish_outbound(
        &self,
        msg: OutboundMessage,
    ) -> Result<(), SendError<OutboundMessage>> {
        self.outbound.push(msg).await
    }

    /// Next outbound message, waiting until one arrives.
    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        self.outbound.pop().await
    }

    /// Refuse new outbound messages, e.g. once transports are stopping.
    pub fn close_outbound(&self) {
        self.outbound.close();
    }

    /// Next outbound message if one is already queued.
    pub async fn try_consume_outbound(&self) -> Option<OutboundMessage> {
        self.outbound.try_pop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_directions_are_independent() {
        let bus = MessageBus::new(4);
        bus.publish_inbound(InboundMessage::new("discord", 1, "user", "!api"))
            .await
            .unwrap();

        assert!(bus.try_consume_outbound().await.is_none());
        let msg = bus.consume_inbound().await.unwrap();
        assert_eq!((msg.channel_id, msg.content.as_str()), (1, "!api"));
    }

    #[tokio::test]
    async fn test_outbound_keeps_order() {
        let bus = MessageBus::new(4);
        for n in 1..=3 {
            bus.publish_outbound(OutboundMessage::new("discord", 7, format!("update {n}")))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        while let Some(msg) = bus.try_consume_outbound().await {
            seen.push(msg.content);
        }
        assert_eq!(seen, vec!["update 1", "update 2", "update 3"]);
    }

    #[tokio::test]
    async fn test_closed_outbound_rejects_new_messages() {
        let bus = MessageBus::new(4);
        bus.publish_outbound(OutboundMessage::new("discord", 1, "queued"))
            .await
            .unwrap();
        bus.close_outbound();

        let err = bus
            .publish_outbound(OutboundMessage::new("discord", 1, "late"))
            .await
            .unwrap_err();
        assert_eq!(err.0.content, "late");
        assert_eq!(bus.try_consume_outbound().await.unwrap().content, "queued");

        bus.publish_inbound(InboundMessage::new("discord", 1, "u", "!api"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_applies_backpressure() {
        let bus = Arc::new(MessageBus::new(1));
        bus.publish_outbound(OutboundMessage::new("discord", 1, "first"))
            .await
            .unwrap();

        let producer = bus.clone();
        let blocked = tokio::spawn(async move {
            producer
                .publish_outbound(OutboundMessage::new("discord", 1, "second"))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        assert_eq!(bus.consume_outbound().await.unwrap().content, "first");
        blocked.await.unwrap().unwrap();
        assert_eq!(bus.consume_outbound().await.unwrap().content, "second");
    }

    #[tokio::test]
    async fn test_concurrent_transports_publish() {
        let bus = Arc::new(MessageBus::new(8));

        let handles: Vec<_> = (1..=3u64)
            .map(|id| {
                let bus = bus.clone();
                tokio::spawn(async move {
                    bus.publish_inbound(InboundMessage::new("discord", id, "u", "!weburl"))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(bus.consume_inbound().await.unwrap().channel_id);
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
