//! In-process change fan-out shared by the store backends

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::broadcast;

use super::DocPath;

/// Buffered changes per document before a slow subscriber starts lagging
const FEED_CAPACITY: usize = 64;

/// A change pushed to document subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum DocChange {
    Updated(Value),
    Deleted,
}

/// One broadcast channel per watched document
#[derive(Default)]
pub struct ChangeFeed {
    channels: Mutex<HashMap<DocPath, broadcast::Sender<DocChange>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, path: &DocPath) -> broadcast::Receiver<DocChange> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(path.clone())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .subscribe()
    }

    /// Deliver a change to current subscribers. Channels nobody listens to are dropped.
    pub fn publish(&self, path: &DocPath, change: DocChange) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = channels.get(path) {
            if tx.send(change).is_err() {
                channels.remove(path);
            }
        }
    }

    pub fn subscriber_count(&self, path: &DocPath) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.get(path).map_or(0, |tx| tx.receiver_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DuelId;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let feed = ChangeFeed::new();
        let path = DocPath::Duel(DuelId::from("d1"));
        let mut rx = feed.subscribe(&path);

        feed.publish(&path, DocChange::Deleted);
        assert_eq!(rx.recv().await.unwrap(), DocChange::Deleted);
    }

    #[test]
    fn test_unwatched_channel_dropped() {
        let feed = ChangeFeed::new();
        let path = DocPath::Duel(DuelId::from("d1"));
        drop(feed.subscribe(&path));

        feed.publish(&path, DocChange::Deleted);
        assert_eq!(feed.subscriber_count(&path), 0);
        assert!(feed.channels.lock().unwrap().is_empty());
    }
}
