//! Cluster-shared allocator.
//!
//! N cooperating processes allocate from one pool hosted on a shared store.
//! Correctness under contention comes entirely from the backend's atomic
//! command execution ([`LeaseBackend::apply`]): each operation is one
//! round-trip that reads, decides, and writes in a single isolated step.
//! There is no client-side locking, no background sweeper, and no internal
//! retry — an expired lease is reclaimed implicitly by whichever acquire
//! observes it first.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;
use workerid_core::AllocatorConfig;
use workerid_core::AllocatorError;
use workerid_core::BackendError;
use workerid_core::LeaseBackend;
use workerid_core::LeaseCommand;
use workerid_core::LeaseFault;
use workerid_core::LeaseReply;
use workerid_core::LeaseToken;
use workerid_core::PoolKeys;
use workerid_time::ClockSource;
use workerid_time::SystemClock;

use crate::contract::Allocator;
use crate::contract::Lease;
use crate::token::mint_token;

/// Multi-process implementation of [`Allocator`] over a [`LeaseBackend`].
///
/// Construction requires a cluster name (the backend namespace) and seeds
/// the pool idempotently: the seed command populates members only when the
/// pool is empty, so any number of processes can construct allocators
/// against the same namespace concurrently.
///
/// With `clock_sync` enabled, every operation fetches the backend's clock
/// before issuing its command, keeping lease issuance and expiry validation
/// on a single clock across machines with skewed local time. The timestamp
/// still travels as a command argument — the backend never reads its own
/// clock mid-step.
pub struct SharedAllocator<B: LeaseBackend + ?Sized> {
    backend: Arc<B>,
    keys: PoolKeys,
    max_worker_id: u32,
    lease_secs: i64,
    clock_sync: bool,
    clock: Arc<dyn ClockSource>,
}

impl<B: LeaseBackend + ?Sized + 'static> SharedAllocator<B> {
    /// Build a shared allocator and seed the pool if needed.
    pub async fn new(backend: Arc<B>, config: AllocatorConfig) -> Result<Self, AllocatorError> {
        Self::with_clock(backend, config, Arc::new(SystemClock)).await
    }

    /// Build a shared allocator reading local time from the given source.
    ///
    /// The source is consulted only when `clock_sync` is off; otherwise the
    /// backend clock wins.
    pub async fn with_clock(
        backend: Arc<B>,
        config: AllocatorConfig,
        clock: Arc<dyn ClockSource>,
    ) -> Result<Self, AllocatorError> {
        config.validate()?;
        config.require_cluster()?;
        let keys = PoolKeys::new(config.cluster.clone())?;

        let allocator = Self {
            backend,
            keys,
            max_worker_id: config.resolved_max_worker_id(),
            lease_secs: config.resolved_lease_secs(),
            clock_sync: config.clock_sync,
            clock,
        };
        allocator.seed().await?;
        Ok(allocator)
    }

    /// Upper bound of the pool (inclusive).
    pub fn max_worker_id(&self) -> u32 {
        self.max_worker_id
    }

    /// The backend keys this allocator operates on.
    pub fn keys(&self) -> &PoolKeys {
        &self.keys
    }

    /// The current lease expiry of a pool member, or `None` if the member is
    /// free or unknown. A read-only probe; it takes no part in allocation.
    pub async fn lease_expiry(&self, worker_id: u32) -> Result<Option<i64>, AllocatorError> {
        self.check_worker_id(worker_id)?;
        let score = self.backend.slot_score(&self.keys, worker_id).await?;
        Ok(score.filter(|expiry| *expiry > 0))
    }

    async fn seed(&self) -> Result<(), AllocatorError> {
        let command = LeaseCommand::Seed {
            pool_size: self.max_worker_id,
        };
        match self.backend.apply(&self.keys, command).await? {
            LeaseReply::Seeded { added: 0 } => {
                debug!(cluster = %self.keys.cluster(), "worker ID pool already seeded");
                Ok(())
            }
            LeaseReply::Seeded { added } => {
                info!(cluster = %self.keys.cluster(), pool_size = added, "seeded worker ID pool");
                Ok(())
            }
            other => Err(unexpected_reply("seed", &other).into()),
        }
    }

    /// The time every command argument is derived from: the backend clock
    /// when `clock_sync` is on, the local source otherwise.
    async fn current_time(&self) -> Result<i64, AllocatorError> {
        if self.clock_sync {
            Ok(self.backend.now_unix_secs().await?)
        } else {
            Ok(self.clock.now_unix_secs())
        }
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

    fn fault_to_error(worker_id: u32, fault: LeaseFault) -> AllocatorError {
        match fault {
            LeaseFault::NotAssigned => AllocatorError::NotAssigned { worker_id },
            LeaseFault::TokenMismatch => AllocatorError::TokenMismatch { worker_id },
            LeaseFault::TokenExpired { expired_at_unix_secs } => AllocatorError::TokenExpired {
                worker_id,
                expired_at: expired_at_unix_secs,
            },
            LeaseFault::CorruptRecord { reason } => AllocatorError::InvalidToken { reason },
        }
    }
}

fn unexpected_reply(command: &'static str, reply: &LeaseReply) -> BackendError {
    BackendError::UnexpectedReply {
        command,
        reason: format!("{reply:?}"),
    }
}

#[async_trait]
impl<B: LeaseBackend + ?Sized + 'static> Allocator for SharedAllocator<B> {
    async fn acquire(&self) -> Result<Lease, AllocatorError> {
        let token = mint_token()?;
        let now = self.current_time().await?;
        let command = LeaseCommand::Acquire {
            now_unix_secs: now,
            lease_secs: self.lease_secs,
            token: token.clone(),
        };

        match self.backend.apply(&self.keys, command).await? {
            LeaseReply::Acquired { worker_id } => {
                debug!(
                    cluster = %self.keys.cluster(),
                    worker_id,
                    expires_at = now + self.lease_secs,
                    "acquired worker ID"
                );
                Ok(Lease { worker_id, token })
            }
            // An empty selection comes back as a dedicated reply, never as a
            // bare backend null.
            LeaseReply::Exhausted => Err(AllocatorError::NoAvailableId),
            other => Err(unexpected_reply("acquire", &other).into()),
        }
    }

    async fn renew(&self, worker_id: u32, token: &LeaseToken) -> Result<(), AllocatorError> {
        self.check_worker_id(worker_id)?;
        let now = self.current_time().await?;
        let command = LeaseCommand::Renew {
            worker_id,
            token: token.clone(),
            now_unix_secs: now,
            lease_secs: self.lease_secs,
        };

        match self.backend.apply(&self.keys, command).await? {
            LeaseReply::Renewed { expires_at_unix_secs } => {
                debug!(
                    cluster = %self.keys.cluster(),
                    worker_id,
                    expires_at = expires_at_unix_secs,
                    "renewed worker ID lease"
                );
                Ok(())
            }
            LeaseReply::Denied { fault } => Err(Self::fault_to_error(worker_id, fault)),
            other => Err(unexpected_reply("renew", &other).into()),
        }
    }

    async fn release(&self, worker_id: u32, token: &LeaseToken) -> Result<(), AllocatorError> {
        self.check_worker_id(worker_id)?;
        let now = self.current_time().await?;
        let command = LeaseCommand::Release {
            worker_id,
            token: token.clone(),
            now_unix_secs: now,
        };

        match self.backend.apply(&self.keys, command).await? {
            LeaseReply::Released => {
                debug!(cluster = %self.keys.cluster(), worker_id, "released worker ID");
                Ok(())
            }
            LeaseReply::Denied { fault } => Err(Self::fault_to_error(worker_id, fault)),
            other => Err(unexpected_reply("release", &other).into()),
        }
    }
}
