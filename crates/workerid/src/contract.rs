//! The allocator contract.

use async_trait::async_trait;
use workerid_core::AllocatorError;
use workerid_core::LeaseToken;

/// A leased worker ID: the identifier plus the token proving ownership.
///
/// The token is bound to this lease for its whole lifetime. Renewal keeps
/// the token and moves the expiry; release and takeover destroy the record,
/// and the token is never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// The allocated worker ID, in `[1, N]`.
    pub worker_id: u32,
    /// Proof of ownership for renew and release.
    pub token: LeaseToken,
}

/// A bounded pool of worker IDs with lease semantics.
///
/// All operations are synchronous from the caller's perspective: each either
/// succeeds or returns exactly one [`AllocatorError`], and nothing is
/// retried internally. Dropping an operation future may leave a completed
/// backend step in place; callers treat success-without-return as success
/// and release on a best-effort basis.
#[async_trait]
pub trait Allocator: Send + Sync {
    /// Reserve a free (or expired) worker ID and bind a fresh token to it.
    ///
    /// Returns [`AllocatorError::NoAvailableId`] when every pool member is
    /// under a live lease. Not idempotent: each call claims a new lease.
    async fn acquire(&self) -> Result<Lease, AllocatorError>;

    /// Extend the lease on `worker_id` to `now + lease duration`.
    ///
    /// Succeeds only if `token` matches the live lease and the lease has not
    /// expired.
    async fn renew(&self, worker_id: u32, token: &LeaseToken) -> Result<(), AllocatorError>;

    /// Voluntarily return `worker_id` to the free pool.
    ///
    /// Same preconditions as [`Allocator::renew`].
    async fn release(&self, worker_id: u32, token: &LeaseToken) -> Result<(), AllocatorError>;
}

#[async_trait]
impl<T: Allocator + ?Sized> Allocator for std::sync::Arc<T> {
    async fn acquire(&self) -> Result<Lease, AllocatorError> {
        (**self).acquire().await
    }

    async fn renew(&self, worker_id: u32, token: &LeaseToken) -> Result<(), AllocatorError> {
        (**self).renew(worker_id, token).await
    }

    async fn release(&self, worker_id: u32, token: &LeaseToken) -> Result<(), AllocatorError> {
        (**self).release(worker_id, token).await
    }
}
