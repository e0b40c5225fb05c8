//! Atomic read-modify-write transactions on a single document

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{DocPath, ProgressStore, StoreError, Versioned};
use crate::domain::{Duel, DuelId, UserDoc, UserId};
use crate::error::DuelError;

/// What a transaction body decided after looking at the fresh document
#[derive(Debug)]
pub enum TxDecision<T, R> {
    /// Write `T` (only if nobody else wrote in between) and return `R`
    Commit(T, R),
    /// Leave the document untouched and return `R`
    Skip(R),
}

/// Bounded local retry for conflicting transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Multiplied by the attempt number before re-reading
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

async fn transact<T, R, F>(
    store: &dyn ProgressStore,
    path: DocPath,
    policy: &RetryPolicy,
    mut body: F,
) -> Result<R, DuelError>
where
    T: Serialize + DeserializeOwned + Send,
    R: Send,
    F: FnMut(Option<T>) -> Result<TxDecision<T, R>, DuelError> + Send,
{
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        let current = store.get(&path).await?;
        let (expected_version, doc) = match current {
            Some(Versioned { version, value }) => (
                Some(version),
                Some(serde_json::from_value::<T>(value).map_err(StoreError::from)?),
            ),
            None => (None, None),
        };

        let (next, result) = match body(doc)? {
            TxDecision::Skip(result) => return Ok(result),
            TxDecision::Commit(next, result) => (next, result),
        };

        let value = serde_json::to_value(&next).map_err(StoreError::from)?;
        match store.compare_and_set(&path, expected_version, value).await {
            Ok(_) => return Ok(result),
            Err(e) if e.is_transient() => {
                debug!(doc = %path, attempt, "transaction conflict, retrying with fresh data");
                if attempt < max_attempts {
                    tokio::time::sleep(policy.backoff * attempt).await;
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(DuelError::RetriesExhausted {
        doc: path.to_string(),
        attempts: max_attempts,
    })
}

/// Atomic transaction on `duels/{id}`.
///
/// `body` sees the current duel (`None` if the document does not exist) and
/// may run several times; it must not have side effects beyond its return value.
pub async fn transact_duel<R, F>(
    store: &dyn ProgressStore,
    id: &DuelId,
    policy: &RetryPolicy,
    body: F,
) -> Result<R, DuelError>
where
    R: Send,
    F: FnMut(Option<Duel>) -> Result<TxDecision<Duel, R>, DuelError> + Send,
{
    transact(store, DocPath::Duel(id.clone()), policy, body).await
}

/// Atomic transaction on `users/{uid}`. Same contract as [`transact_duel`].
pub async fn transact_user<R, F>(
    store: &dyn ProgressStore,
    uid: &UserId,
    policy: &RetryPolicy,
    body: F,
) -> Result<R, DuelError>
where
    R: Send,
    F: FnMut(Option<UserDoc>) -> Result<TxDecision<UserDoc, R>, DuelError> + Send,
{
    transact(store, DocPath::User(uid.clone()), policy, body).await
}
