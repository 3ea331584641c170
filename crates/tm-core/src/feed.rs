//! # Live Feeds
//!
//! A live feed is the receiving half of a standing query. The store pushes
//! the full current result set on establishment and after every change that
//! touches the query; dropping the feed releases the query on the store side.

use tokio::sync::mpsc;

/// One notification from a standing query.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent<T> {
    /// The complete, current result set.
    Snapshot(Vec<T>),
    /// The store broke the channel. No further snapshots follow.
    Error(String),
}

/// Receiving half handed to the subscriber.
#[derive(Debug)]
pub struct LiveFeed<T> {
    rx: mpsc::UnboundedReceiver<FeedEvent<T>>,
}

/// Sending half kept by the store.
#[derive(Debug)]
pub struct FeedSender<T> {
    tx: mpsc::UnboundedSender<FeedEvent<T>>,
}

impl<T> Clone for FeedSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

/// Opens a feed; events are delivered in the order they are sent.
pub fn channel<T>() -> (FeedSender<T>, LiveFeed<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FeedSender { tx }, LiveFeed { rx })
}

impl<T> LiveFeed<T> {
    /// Waits for the next event. `None` once the store side is gone.
    pub async fn next(&mut self) -> Option<FeedEvent<T>> {
        self.rx.recv().await
    }

    /// Non-blocking variant, mostly useful in tests.
    pub fn try_next(&mut self) -> Option<FeedEvent<T>> {
        self.rx.try_recv().ok()
    }
}

impl<T> FeedSender<T> {
    /// Returns false when the subscriber has gone away.
    pub fn snapshot(&self, items: Vec<T>) -> bool {
        self.tx.send(FeedEvent::Snapshot(items)).is_ok()
    }

    pub fn error(&self, reason: impl Into<String>) -> bool {
        self.tx.send(FeedEvent::Error(reason.into())).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_send_order() {
        let (tx, mut feed) = channel();
        assert!(tx.snapshot(vec![1]));
        assert!(tx.snapshot(vec![1, 2]));
        assert!(tx.error("gone"));
        assert_eq!(feed.next().await, Some(FeedEvent::Snapshot(vec![1])));
        assert_eq!(feed.next().await, Some(FeedEvent::Snapshot(vec![1, 2])));
        assert_eq!(feed.next().await, Some(FeedEvent::Error("gone".into())));
    }

    #[test]
    fn dropping_the_feed_closes_the_sender() {
        let (tx, feed) = channel::<u8>();
        drop(feed);
        assert!(tx.is_closed());
        assert!(!tx.snapshot(vec![1]));
    }
}
