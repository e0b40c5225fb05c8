//! Replicated document store abstraction
//!
//! Every device reads and writes the same documents:
//!
//! ```text
//! duels/{duelId}                     Duel
//! users/{uid}                        UserDoc (progress + daily quests)
//! users/{uid}/notifications/{id}     Notification
//! ```
//!
//! The only concurrency primitive is a per-document versioned
//! compare-and-set. [`transact_duel`] and [`transact_user`] build the
//! read → decide → write → retry-on-conflict transaction on top of it.
//!
//! # Usage
//!
//! ```ignore
//! let store: Arc<dyn ProgressStore> = Arc::new(MemoryStore::new());
//! let settled = transact_duel(store.as_ref(), &duel_id, &policy, |duel| {
//!     // inspect the fresh snapshot, decide to commit or skip
//! })
//! .await?;
//! ```

mod error;
mod feed;
mod memory;
mod sqlite;
mod transaction;

pub use error::StoreError;
pub use feed::{ChangeFeed, DocChange};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use transaction::{transact_duel, transact_user, RetryPolicy, TxDecision};

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::domain::{Duel, DuelId, Notification, UserDoc, UserId};

/// Address of a single document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocPath {
    Duel(DuelId),
    User(UserId),
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocPath::Duel(id) => write!(f, "duels/{}", id),
            DocPath::User(uid) => write!(f, "users/{}", uid),
        }
    }
}

/// A document body together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Backend for the shared documents
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Read a document
    async fn get(&self, path: &DocPath) -> Result<Option<Versioned<Value>>, StoreError>;

    /// Write a document if it is still at `expected_version`
    /// (`None` = the document must not exist yet). Returns the new version,
    /// or [`StoreError::Conflict`] if someone else wrote first.
    async fn compare_and_set(
        &self,
        path: &DocPath,
        expected_version: Option<u64>,
        value: Value,
    ) -> Result<u64, StoreError>;

    /// Remove a document. Subscribers receive [`DocChange::Deleted`].
    async fn delete(&self, path: &DocPath) -> Result<(), StoreError>;

    /// Change notifications for one document, starting from now
    fn subscribe(&self, path: &DocPath) -> broadcast::Receiver<DocChange>;

    async fn push_notification(
        &self,
        user: &UserId,
        notification: &Notification,
    ) -> Result<(), StoreError>;

    /// A user's feed, newest first
    async fn notifications(&self, user: &UserId) -> Result<Vec<Notification>, StoreError>;

    async fn mark_notification_read(&self, user: &UserId, id: &str) -> Result<(), StoreError>;
}

fn decode<T: serde::de::DeserializeOwned>(
    doc: Option<Versioned<Value>>,
) -> Result<Option<Versioned<T>>, StoreError> {
    doc.map(|d| -> Result<_, StoreError> {
        Ok(Versioned {
            version: d.version,
            value: serde_json::from_value(d.value)?,
        })
    })
    .transpose()
}

/// Typed read of `duels/{id}`
pub async fn load_duel(
    store: &dyn ProgressStore,
    id: &DuelId,
) -> Result<Option<Versioned<Duel>>, StoreError> {
    decode(store.get(&DocPath::Duel(id.clone())).await?)
}

/// Typed read of `users/{uid}`
pub async fn load_user(
    store: &dyn ProgressStore,
    uid: &UserId,
) -> Result<Option<Versioned<UserDoc>>, StoreError> {
    decode(store.get(&DocPath::User(uid.clone())).await?)
}

/// What a duel subscriber sees
#[derive(Debug, Clone, PartialEq)]
pub enum DuelEvent {
    Changed(Duel),
    Deleted,
}

/// Live view of one duel document: the current snapshot first, then every change
pub struct DuelSubscription {
    duel_id: DuelId,
    pending: Option<DuelEvent>,
    rx: broadcast::Receiver<DocChange>,
}

impl DuelSubscription {
    /// Wait for the next snapshot. `Ok(None)` once the store is gone.
    ///
    /// A subscriber that fell behind gets the latest state re-read from `store`
    /// instead of the missed intermediate versions.
    pub async fn next(
        &mut self,
        store: &dyn ProgressStore,
    ) -> Result<Option<DuelEvent>, StoreError> {
        if let Some(event) = self.pending.take() {
            return Ok(Some(event));
        }

        match self.rx.recv().await {
            Ok(DocChange::Updated(value)) => {
                Ok(Some(DuelEvent::Changed(serde_json::from_value(value)?)))
            }
            Ok(DocChange::Deleted) => Ok(Some(DuelEvent::Deleted)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(duel = %self.duel_id, skipped, "duel subscriber lagged, re-reading");
                Ok(Some(snapshot_event(load_duel(store, &self.duel_id).await?)))
            }
            Err(broadcast::error::RecvError::Closed) => Ok(None),
        }
    }
}

fn snapshot_event(doc: Option<Versioned<Duel>>) -> DuelEvent {
    match doc {
        Some(d) => DuelEvent::Changed(d.value),
        None => DuelEvent::Deleted,
    }
}

/// Subscribe to a duel and read its current state
pub async fn watch_duel(
    store: &dyn ProgressStore,
    id: &DuelId,
) -> Result<DuelSubscription, StoreError> {
    // Subscribe before reading so no write can fall between the two
    let rx = store.subscribe(&DocPath::Duel(id.clone()));
    let current = load_duel(store, id).await?;
    Ok(DuelSubscription {
        duel_id: id.clone(),
        pending: Some(snapshot_event(current)),
        rx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_paths() {
        assert_eq!(DocPath::Duel(DuelId::from("d1")).to_string(), "duels/d1");
        assert_eq!(DocPath::User(UserId::from("u1")).to_string(), "users/u1");
    }
}
