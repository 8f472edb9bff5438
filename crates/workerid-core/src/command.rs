//! The atomic command set executed by lease backends.
//!
//! Every state transition of the allocation protocol is one command, and a
//! backend executes each command as a single isolated step: on Redis a
//! command maps to one server-side script, in memory to one mutex-guarded
//! transition. Client code never mutates backend state outside these
//! commands, and no client-side lock exists anywhere in the protocol.

use serde::Deserialize;
use serde::Serialize;

use crate::token::LeaseToken;

/// One atomic step of the allocation protocol.
///
/// Timestamps are Unix epoch seconds supplied by the driver, never read
/// inside the backend step itself: replicated script executors forbid
/// non-deterministic calls, so `now` always arrives as an argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseCommand {
    /// Populate the pool with members `1..=pool_size` at score 0, only if it
    /// is currently empty. Idempotent across concurrent first constructions.
    Seed {
        /// Number of pool members.
        pool_size: u32,
    },
    /// Claim any member whose score is at or below `now` (free or expired),
    /// bind it to `token`, and move its score to `now + lease_secs`.
    Acquire {
        /// Current time in Unix seconds.
        now_unix_secs: i64,
        /// Lease duration in seconds.
        lease_secs: i64,
        /// Freshly minted token to bind to the claimed member.
        token: LeaseToken,
    },
    /// Extend the lease on `worker_id` if `token` matches the live record.
    Renew {
        /// The leased member.
        worker_id: u32,
        /// Token proving ownership.
        token: LeaseToken,
        /// Current time in Unix seconds.
        now_unix_secs: i64,
        /// Lease duration in seconds.
        lease_secs: i64,
    },
    /// Return `worker_id` to the free pool if `token` matches the live
    /// record.
    Release {
        /// The leased member.
        worker_id: u32,
        /// Token proving ownership.
        token: LeaseToken,
        /// Current time in Unix seconds.
        now_unix_secs: i64,
    },
}

impl LeaseCommand {
    /// Stable command name for logs and error reasons.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Seed { .. } => "seed",
            Self::Acquire { .. } => "acquire",
            Self::Renew { .. } => "renew",
            Self::Release { .. } => "release",
        }
    }
}

/// Result of a successfully executed command.
///
/// A `Denied` reply is a protocol outcome, not a backend failure: the step
/// ran atomically and concluded the caller does not hold the lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseReply {
    /// Seeding ran; `added` is 0 when the pool was already populated.
    Seeded {
        /// Members inserted by this command.
        added: u32,
    },
    /// Acquire claimed a member.
    Acquired {
        /// The claimed member.
        worker_id: u32,
    },
    /// Acquire found no member at or below `now`; the pool is saturated.
    Exhausted,
    /// Renew extended the lease.
    Renewed {
        /// The new expiry in Unix seconds.
        expires_at_unix_secs: i64,
    },
    /// Release returned the member to the free pool.
    Released,
    /// The command was refused by the lease discipline.
    Denied {
        /// Why the command was refused.
        fault: LeaseFault,
    },
}

/// Lease-discipline refusals shared by renew and release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseFault {
    /// No record exists for the worker ID.
    NotAssigned,
    /// A record exists but its token differs from the supplied one.
    TokenMismatch,
    /// The record matched but its expiry has passed.
    TokenExpired {
        /// Unix timestamp (seconds) at which the lease ended.
        expired_at_unix_secs: i64,
    },
    /// The stored record cannot be parsed as `"<token>:<expires-at>"`.
    CorruptRecord {
        /// Description of the malformed record.
        reason: String,
    },
}
