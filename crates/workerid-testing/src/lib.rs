//! Deterministic in-memory backend for allocator tests.
//!
//! [`DeterministicLeaseBackend`] implements the [`LeaseBackend`] contract
//! without network I/O, mirroring the production backend's semantics: a
//! scored pool per namespace, raw `"<token>:<expires-at>"` records, and a
//! container-level TTL on the record map. Commands execute under one mutex,
//! which gives the same isolation a server-side script does.
//!
//! The backend clock is injectable, so tests can drive lease expiry and TTL
//! eviction by advancing a `SimulatedClock` instead of sleeping.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use workerid_core::BackendError;
use workerid_core::LeaseBackend;
use workerid_core::LeaseCommand;
use workerid_core::LeaseFault;
use workerid_core::LeaseReply;
use workerid_core::LeaseToken;
use workerid_core::PoolKeys;
use workerid_time::ClockSource;
use workerid_time::SystemClock;

/// Multiplier applied to the lease duration for the record map's TTL.
const RECORD_TTL_FACTOR: i64 = 3;

/// State of one cluster namespace.
#[derive(Debug, Default)]
struct PoolState {
    /// Pool members scored by lease expiry; 0 = free.
    slots: BTreeMap<u32, i64>,
    /// Raw lease records, `"<token>:<expires-at>"`.
    records: HashMap<u32, String>,
    /// Deadline after which the whole record map is dropped, mirroring a
    /// container-level TTL.
    records_deadline: Option<i64>,
}

/// In-memory deterministic implementation of [`LeaseBackend`].
///
/// Namespaces are independent: two allocators with distinct cluster names
/// share no state even on the same backend instance. Cloned `Arc`s share
/// state, standing in for multiple processes talking to one store.
pub struct DeterministicLeaseBackend {
    pools: Mutex<HashMap<String, PoolState>>,
    clock: Arc<dyn ClockSource>,
}

impl DeterministicLeaseBackend {
    /// A backend using the system clock.
    pub fn new() -> Arc<Self> {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// A backend whose own clock is the given source.
    ///
    /// This clock serves `now_unix_secs` (the `clock_sync` path) and drives
    /// record-map TTL eviction, independent of the timestamps carried inside
    /// commands.
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Arc<Self> {
        Arc::new(Self {
            pools: Mutex::new(HashMap::new()),
            clock,
        })
    }

    /// The raw stored record for a worker ID, if any.
    pub async fn raw_record(&self, keys: &PoolKeys, worker_id: u32) -> Option<String> {
        let now = self.clock.now_unix_secs();
        let mut pools = self.pools.lock().await;
        let state = pools.entry(keys.namespace()).or_default();
        Self::evict_expired_records(state, now);
        state.records.get(&worker_id).cloned()
    }

    /// Overwrite the stored record for a worker ID with an arbitrary string.
    ///
    /// Lets tests exercise the corrupt-record path without reaching into
    /// backend internals elsewhere.
    pub async fn inject_raw_record(&self, keys: &PoolKeys, worker_id: u32, raw: &str) {
        let mut pools = self.pools.lock().await;
        let state = pools.entry(keys.namespace()).or_default();
        state.records.insert(worker_id, raw.to_string());
    }

    /// The record map's TTL deadline, if armed.
    pub async fn records_deadline(&self, keys: &PoolKeys) -> Option<i64> {
        let mut pools = self.pools.lock().await;
        pools.entry(keys.namespace()).or_default().records_deadline
    }

    /// Drop the record map once its deadline has passed, like `EXPIRE` on
    /// the containing key.
    fn evict_expired_records(state: &mut PoolState, now: i64) {
        if let Some(deadline) = state.records_deadline {
            if now >= deadline {
                state.records.clear();
                state.records_deadline = None;
            }
        }
    }

    fn arm_record_ttl(state: &mut PoolState, now: i64, lease_secs: i64) {
        state.records_deadline = Some(now + lease_secs * RECORD_TTL_FACTOR);
    }

    fn apply_seed(state: &mut PoolState, pool_size: u32) -> LeaseReply {
        if !state.slots.is_empty() {
            return LeaseReply::Seeded { added: 0 };
        }
        for worker_id in 1..=pool_size {
            state.slots.insert(worker_id, 0);
        }
        LeaseReply::Seeded { added: pool_size }
    }

    fn apply_acquire(
        state: &mut PoolState,
        backend_now: i64,
        now: i64,
        lease_secs: i64,
        token: &LeaseToken,
    ) -> LeaseReply {
        // Any member at or below `now` is claimable: free slots sit at 0 and
        // expired leases have fallen behind the clock. Which one is picked is
        // unspecified by the contract.
        let claimed = state
            .slots
            .iter()
            .find(|(_, score)| **score <= now)
            .map(|(worker_id, _)| *worker_id);
        let Some(worker_id) = claimed else {
            return LeaseReply::Exhausted;
        };
        let expires_at = now + lease_secs;
        state.slots.insert(worker_id, expires_at);
        state.records.insert(worker_id, format!("{}:{}", token.as_str(), expires_at));
        Self::arm_record_ttl(state, backend_now, lease_secs);
        LeaseReply::Acquired { worker_id }
    }

    /// Validate the stored record against a supplied token. Returns the
    /// record's expiry on success.
    fn check_record(state: &PoolState, worker_id: u32, token: &LeaseToken, now: i64) -> Result<i64, LeaseFault> {
        let Some(raw) = state.records.get(&worker_id) else {
            return Err(LeaseFault::NotAssigned);
        };
        let Some((stored_token, raw_expiry)) = raw.split_once(':') else {
            return Err(LeaseFault::CorruptRecord {
                reason: format!("record {raw:?} has no separator"),
            });
        };
        let Ok(expires_at) = raw_expiry.parse::<i64>() else {
            return Err(LeaseFault::CorruptRecord {
                reason: format!("expiry {raw_expiry:?} is not a timestamp"),
            });
        };
        if stored_token != token.as_str() {
            return Err(LeaseFault::TokenMismatch);
        }
        if expires_at <= now {
            return Err(LeaseFault::TokenExpired {
                expired_at_unix_secs: expires_at,
            });
        }
        Ok(expires_at)
    }

    fn apply_renew(
        state: &mut PoolState,
        backend_now: i64,
        worker_id: u32,
        token: &LeaseToken,
        now: i64,
        lease_secs: i64,
    ) -> LeaseReply {
        if let Err(fault) = Self::check_record(state, worker_id, token, now) {
            return LeaseReply::Denied { fault };
        }
        let expires_at = now + lease_secs;
        state.slots.insert(worker_id, expires_at);
        state.records.insert(worker_id, format!("{}:{}", token.as_str(), expires_at));
        Self::arm_record_ttl(state, backend_now, lease_secs);
        LeaseReply::Renewed {
            expires_at_unix_secs: expires_at,
        }
    }

    fn apply_release(state: &mut PoolState, worker_id: u32, token: &LeaseToken, now: i64) -> LeaseReply {
        if let Err(fault) = Self::check_record(state, worker_id, token, now) {
            return LeaseReply::Denied { fault };
        }
        state.records.remove(&worker_id);
        state.slots.insert(worker_id, 0);
        LeaseReply::Released
    }
}

#[async_trait]
impl LeaseBackend for DeterministicLeaseBackend {
    async fn apply(&self, keys: &PoolKeys, command: LeaseCommand) -> Result<LeaseReply, BackendError> {
        let backend_now = self.clock.now_unix_secs();
        let mut pools = self.pools.lock().await;
        let state = pools.entry(keys.namespace()).or_default();
        Self::evict_expired_records(state, backend_now);

        let reply = match command {
            LeaseCommand::Seed { pool_size } => Self::apply_seed(state, pool_size),
            LeaseCommand::Acquire {
                now_unix_secs,
                lease_secs,
                token,
            } => Self::apply_acquire(state, backend_now, now_unix_secs, lease_secs, &token),
            LeaseCommand::Renew {
                worker_id,
                token,
                now_unix_secs,
                lease_secs,
            } => Self::apply_renew(state, backend_now, worker_id, &token, now_unix_secs, lease_secs),
            LeaseCommand::Release {
                worker_id,
                token,
                now_unix_secs,
            } => Self::apply_release(state, worker_id, &token, now_unix_secs),
        };
        Ok(reply)
    }

    async fn now_unix_secs(&self) -> Result<i64, BackendError> {
        Ok(self.clock.now_unix_secs())
    }

    async fn slot_score(&self, keys: &PoolKeys, worker_id: u32) -> Result<Option<i64>, BackendError> {
        let pools = self.pools.lock().await;
        Ok(pools
            .get(&keys.namespace())
            .and_then(|state| state.slots.get(&worker_id))
            .copied())
    }
}
