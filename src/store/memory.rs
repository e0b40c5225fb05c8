//! In-memory store with race injection for tests and local simulation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use super::{ChangeFeed, DocChange, DocPath, ProgressStore, StoreError, Versioned};
use crate::domain::{Notification, UserId};

/// Called right before a compare-and-set touches the document
pub type CommitHook = Arc<dyn Fn(&MemoryStore, &DocPath) + Send + Sync>;

/// Process-local document store.
///
/// Every read and write yields to the scheduler first, so concurrently
/// running tasks really interleave between a transaction's read and its
/// compare-and-set.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<DocPath, Versioned<Value>>>,
    notifications: Mutex<HashMap<UserId, Vec<Notification>>>,
    feed: ChangeFeed,
    injected_conflicts: AtomicU32,
    commit_hook: Mutex<Option<CommitHook>>,
    commits: AtomicU64,
    conflicts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` compare-and-set calls with a conflict
    pub fn inject_conflicts(&self, n: u32) {
        self.injected_conflicts.store(n, Ordering::SeqCst);
    }

    /// Run `hook` before every compare-and-set, e.g. to write the document
    /// behind the caller's back with [`MemoryStore::force_put`].
    pub fn set_commit_hook(&self, hook: impl Fn(&MemoryStore, &DocPath) + Send + Sync + 'static) {
        *self.commit_hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    pub fn clear_commit_hook(&self) {
        *self.commit_hook.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Unconditional write that still bumps the version and notifies subscribers
    pub fn force_put(&self, path: &DocPath, value: Value) -> u64 {
        let version = {
            let mut docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
            let version = docs.get(path).map_or(1, |d| d.version + 1);
            docs.insert(
                path.clone(),
                Versioned {
                    version,
                    value: value.clone(),
                },
            );
            version
        };
        self.feed.publish(path, DocChange::Updated(value));
        version
    }

    /// Successful compare-and-set calls so far
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Rejected compare-and-set calls so far (real or injected)
    pub fn conflict_count(&self) -> u64 {
        self.conflicts.load(Ordering::SeqCst)
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn conflict(&self, path: &DocPath) -> StoreError {
        self.conflicts.fetch_add(1, Ordering::SeqCst);
        StoreError::Conflict(path.to_string())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Versioned<Value>>, StoreError> {
        tokio::task::yield_now().await;
        let docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.get(path).cloned())
    }

    async fn compare_and_set(
        &self,
        path: &DocPath,
        expected_version: Option<u64>,
        value: Value,
    ) -> Result<u64, StoreError> {
        tokio::task::yield_now().await;

        let hook = self
            .commit_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook(self, path);
        }

        if self.take_injected_conflict() {
            return Err(self.conflict(path));
        }

        let version = {
            let mut docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
            let current = docs.get(path).map(|d| d.version);
            if current != expected_version {
                drop(docs);
                return Err(self.conflict(path));
            }
            let version = current.map_or(1, |v| v + 1);
            docs.insert(
                path.clone(),
                Versioned {
                    version,
                    value: value.clone(),
                },
            );
            version
        };

        self.commits.fetch_add(1, Ordering::SeqCst);
        self.feed.publish(path, DocChange::Updated(value));
        Ok(version)
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        let removed = self
            .docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        if removed.is_none() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        self.feed.publish(path, DocChange::Deleted);
        Ok(())
    }

    fn subscribe(&self, path: &DocPath) -> broadcast::Receiver<DocChange> {
        self.feed.subscribe(path)
    }

    async fn push_notification(
        &self,
        user: &UserId,
        notification: &Notification,
    ) -> Result<(), StoreError> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user.clone())
            .or_default()
            .push(notification.clone());
        Ok(())
    }

    async fn notifications(&self, user: &UserId) -> Result<Vec<Notification>, StoreError> {
        let feeds = self.notifications.lock().unwrap_or_else(PoisonError::into_inner);
        let mut list = feeds.get(user).cloned().unwrap_or_default();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn mark_notification_read(&self, user: &UserId, id: &str) -> Result<(), StoreError> {
        let mut feeds = self.notifications.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = feeds
            .get_mut(user)
            .and_then(|list| list.iter_mut().find(|n| n.id == id))
            .ok_or_else(|| StoreError::NotFound(format!("users/{}/notifications/{}", user, id)))?;
        entry.read = true;
        Ok(())
    }
}
