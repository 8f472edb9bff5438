//! Allocator configuration and its resolution rules.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::AllocatorError;

/// Pool size used when neither `max_worker_id` nor `worker_id_bits` is set.
pub const DEFAULT_MAX_WORKER_ID: u32 = 1000;

/// Lease duration used when `max_lease` is unset or zero.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(300);

/// Upper bound on `worker_id_bits`.
pub const MAX_WORKER_ID_BITS: u8 = 20;

/// Upper bound on the pool size. Seeding is O(N) on the backend, so the pool
/// is capped at `2^MAX_WORKER_ID_BITS - 1` members.
pub const MAX_POOL_SIZE: u32 = (1 << MAX_WORKER_ID_BITS) - 1;

/// Configuration shared by both allocator variants.
///
/// Pool sizing resolves as follows: an explicit non-zero `max_worker_id`
/// wins; otherwise `worker_id_bits = b` yields `2^b - 1`; otherwise
/// [`DEFAULT_MAX_WORKER_ID`]. Worker ID zero is never a pool member.
///
/// The `cluster` name namespaces backend keys and is required for the shared
/// variant; the local variant ignores it. `clock_sync` routes time
/// acquisition through the backend clock, which keeps expiry comparisons on
/// one clock when peer machines are skewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Cluster namespace for backend keys.
    pub cluster: String,
    /// Pool size as a bit width: `N = 2^bits - 1`.
    pub worker_id_bits: Option<u8>,
    /// Pool size as an explicit upper bound (inclusive).
    pub max_worker_id: Option<u32>,
    /// Maximum duration of a single lease.
    pub max_lease: Duration,
    /// Use the backend clock instead of the local one.
    pub clock_sync: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            cluster: String::new(),
            worker_id_bits: None,
            max_worker_id: None,
            max_lease: DEFAULT_LEASE,
            clock_sync: false,
        }
    }
}

impl AllocatorConfig {
    /// Default configuration for the given cluster namespace.
    pub fn for_cluster(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            ..Self::default()
        }
    }

    /// Validate field ranges. Does not require a cluster name; the shared
    /// variant additionally calls [`AllocatorConfig::require_cluster`].
    pub fn validate(&self) -> Result<(), AllocatorError> {
        if let Some(bits) = self.worker_id_bits {
            if bits == 0 || bits > MAX_WORKER_ID_BITS {
                return Err(AllocatorError::InvalidConfiguration {
                    reason: format!("worker_id_bits {bits} outside [1, {MAX_WORKER_ID_BITS}]"),
                });
            }
        }
        if let Some(max) = self.max_worker_id {
            if max > MAX_POOL_SIZE {
                return Err(AllocatorError::InvalidConfiguration {
                    reason: format!("max_worker_id {max} exceeds pool bound {MAX_POOL_SIZE}"),
                });
            }
        }
        Ok(())
    }

    /// Fail unless a cluster name is present.
    pub fn require_cluster(&self) -> Result<(), AllocatorError> {
        if self.cluster.is_empty() {
            return Err(AllocatorError::InvalidConfiguration {
                reason: "cluster name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The resolved pool upper bound `N`; pool membership is `[1, N]`.
    pub fn resolved_max_worker_id(&self) -> u32 {
        if let Some(max) = self.max_worker_id {
            if max > 0 {
                return max;
            }
        }
        if let Some(bits) = self.worker_id_bits {
            if (1..=MAX_WORKER_ID_BITS).contains(&bits) {
                return (1u32 << bits) - 1;
            }
        }
        DEFAULT_MAX_WORKER_ID
    }

    /// The resolved lease duration in whole seconds (at least 1).
    pub fn resolved_lease_secs(&self) -> i64 {
        let secs = self.max_lease.as_secs();
        if secs == 0 {
            return DEFAULT_LEASE.as_secs() as i64;
        }
        secs as i64
    }
}
