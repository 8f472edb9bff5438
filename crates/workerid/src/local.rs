//! Single-process allocator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use workerid_core::AllocatorConfig;
use workerid_core::AllocatorError;
use workerid_core::LeaseToken;
use workerid_time::ClockSource;
use workerid_time::SystemClock;

use crate::contract::Allocator;
use crate::contract::Lease;
use crate::token::mint_token;

/// A live lease on one worker ID.
#[derive(Debug, Clone)]
struct LeaseRecord {
    token: LeaseToken,
    expires_at: i64,
}

/// Both views of the pool, guarded by one mutex.
///
/// Invariant: `slots[id] > 0` iff `leases[id]` exists with the same expiry;
/// `slots[id] == 0` iff no record exists for `id`.
#[derive(Debug)]
struct LocalPool {
    /// Availability scores: 0 = free, otherwise lease expiry in Unix seconds.
    slots: HashMap<u32, i64>,
    /// Live lease records.
    leases: HashMap<u32, LeaseRecord>,
}

/// Single-process implementation of [`Allocator`].
///
/// Intended for deployments that need the allocator contract without a
/// shared backend. The lease discipline is identical to the shared variant
/// — including strict double-release: once released, a worker ID has no
/// record, so a second release returns [`AllocatorError::NotAssigned`] — so
/// the same client code runs against either implementation.
///
/// Every operation takes the one internal mutex and never suspends while
/// holding it.
pub struct LocalAllocator {
    max_worker_id: u32,
    lease_secs: i64,
    clock: Arc<dyn ClockSource>,
    pool: Mutex<LocalPool>,
}

impl LocalAllocator {
    /// Build a local allocator from the given configuration.
    ///
    /// The cluster name is ignored; there is no shared state to namespace.
    pub fn new(config: AllocatorConfig) -> Result<Self, AllocatorError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a local allocator reading time from the given source.
    pub fn with_clock(config: AllocatorConfig, clock: Arc<dyn ClockSource>) -> Result<Self, AllocatorError> {
        config.validate()?;
        let max_worker_id = config.resolved_max_worker_id();
        // Every member starts free; both maps exist from construction on.
        let slots = (1..=max_worker_id).map(|id| (id, 0)).collect();
        Ok(Self {
            max_worker_id,
            lease_secs: config.resolved_lease_secs(),
            clock,
            pool: Mutex::new(LocalPool {
                slots,
                leases: HashMap::new(),
            }),
        })
    }

    /// Upper bound of the pool (inclusive).
    pub fn max_worker_id(&self) -> u32 {
        self.max_worker_id
    }

    /// The availability score of a pool member: 0 = free, otherwise the
    /// lease expiry in Unix seconds. `None` outside the pool.
    pub async fn slot_score(&self, worker_id: u32) -> Option<i64> {
        self.pool.lock().await.slots.get(&worker_id).copied()
    }

    fn check_worker_id(&self, worker_id: u32) -> Result<(), AllocatorError> {
        if worker_id == 0 || worker_id > self.max_worker_id {
            return Err(AllocatorError::InvalidWorkerId {
                worker_id,
                max_worker_id: self.max_worker_id,
            });
        }
        Ok(())
    }

    /// Look up the lease for `worker_id` and verify `token` against it.
    fn check_lease(pool: &LocalPool, worker_id: u32, token: &LeaseToken, now: i64) -> Result<(), AllocatorError> {
        let Some(record) = pool.leases.get(&worker_id) else {
            return Err(AllocatorError::NotAssigned { worker_id });
        };
        if record.token != *token {
            return Err(AllocatorError::TokenMismatch { worker_id });
        }
        if record.expires_at <= now {
            return Err(AllocatorError::TokenExpired {
                worker_id,
                expired_at: record.expires_at,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Allocator for LocalAllocator {
    async fn acquire(&self) -> Result<Lease, AllocatorError> {
        let now = self.clock.now_unix_secs();
        let mut pool = self.pool.lock().await;

        // Free slots sit at score 0 and expired leases have fallen behind
        // the clock; either is claimable. Selection order is unspecified.
        let claimed = pool
            .slots
            .iter()
            .find(|(_, score)| **score <= now)
            .map(|(worker_id, _)| *worker_id);
        let Some(worker_id) = claimed else {
            return Err(AllocatorError::NoAvailableId);
        };

        let token = mint_token()?;
        let expires_at = now + self.lease_secs;
        pool.slots.insert(worker_id, expires_at);
        // Overwrites the stale record on takeover of an expired lease.
        pool.leases.insert(worker_id, LeaseRecord {
            token: token.clone(),
            expires_at,
        });

        debug!(worker_id, expires_at, "acquired worker ID");
        Ok(Lease { worker_id, token })
    }

    async fn renew(&self, worker_id: u32, token: &LeaseToken) -> Result<(), AllocatorError> {
        self.check_worker_id(worker_id)?;
        let now = self.clock.now_unix_secs();
        let mut pool = self.pool.lock().await;

        Self::check_lease(&pool, worker_id, token, now)?;
        let expires_at = now + self.lease_secs;
        pool.slots.insert(worker_id, expires_at);
        if let Some(record) = pool.leases.get_mut(&worker_id) {
            record.expires_at = expires_at;
        }

        debug!(worker_id, expires_at, "renewed worker ID lease");
        Ok(())
    }

    async fn release(&self, worker_id: u32, token: &LeaseToken) -> Result<(), AllocatorError> {
        self.check_worker_id(worker_id)?;
        let now = self.clock.now_unix_secs();
        let mut pool = self.pool.lock().await;

        Self::check_lease(&pool, worker_id, token, now)?;
        pool.leases.remove(&worker_id);
        pool.slots.insert(worker_id, 0);

        debug!(worker_id, "released worker ID");
        Ok(())
    }
}
