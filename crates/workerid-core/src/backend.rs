//! The contract a shared store must satisfy to host allocator state.

use async_trait::async_trait;

use crate::command::LeaseCommand;
use crate::command::LeaseReply;
use crate::error::BackendError;
use crate::keys::PoolKeys;

/// A store that can execute allocation commands atomically.
///
/// The essential primitive is [`LeaseBackend::apply`]: one command runs as a
/// single isolated step, with no other client interleaving between its reads
/// and writes. Any store with sorted-set and hash semantics, container TTLs,
/// and a single-shot atomic script facility can implement this (Redis,
/// KeyDB, Dragonfly); the in-memory backend in `workerid-testing` implements
/// it under a mutex.
#[async_trait]
pub trait LeaseBackend: Send + Sync {
    /// Execute one allocation command as a single isolated step.
    async fn apply(&self, keys: &PoolKeys, command: LeaseCommand) -> Result<LeaseReply, BackendError>;

    /// The backend's own wall clock in Unix seconds.
    ///
    /// Used instead of the local clock when `clock_sync` is enabled, so that
    /// lease issuance and expiry checks share one clock across skewed peers.
    async fn now_unix_secs(&self) -> Result<i64, BackendError>;

    /// Read a pool member's availability score: 0 = free, otherwise the
    /// lease expiry in Unix seconds. `None` if the member does not exist.
    ///
    /// A read-only probe for tests and operators; it takes no part in the
    /// allocation protocol.
    async fn slot_score(&self, keys: &PoolKeys, worker_id: u32) -> Result<Option<i64>, BackendError>;
}

#[async_trait]
impl<T: LeaseBackend + ?Sized> LeaseBackend for std::sync::Arc<T> {
    async fn apply(&self, keys: &PoolKeys, command: LeaseCommand) -> Result<LeaseReply, BackendError> {
        (**self).apply(keys, command).await
    }

    async fn now_unix_secs(&self) -> Result<i64, BackendError> {
        (**self).now_unix_secs().await
    }

    async fn slot_score(&self, keys: &PoolKeys, worker_id: u32) -> Result<Option<i64>, BackendError> {
        (**self).slot_score(keys, worker_id).await
    }
}
