//! Leased worker ID allocation.
//!
//! Hands out small, dense integer identifiers (the `worker` field of a
//! Snowflake-style unique-ID scheme) from a bounded pool. Each ID is leased
//! to exactly one holder at a time; the holder renews periodically or loses
//! the ID to another requester. Crashed holders need no cleanup: an expired
//! lease is reclaimed by the next acquire.
//!
//! Two implementations of the [`Allocator`] contract:
//!
//! - [`LocalAllocator`] — a single process, a mutex, in-memory state. Same
//!   lease discipline, no backend.
//! - [`SharedAllocator`] — many processes against a shared store
//!   implementing [`LeaseBackend`], every state transition one atomic
//!   backend command.
//!
//! ```ignore
//! use workerid::{Allocator, SharedAllocator, AllocatorConfig};
//! use workerid_backend_redis::RedisLeaseBackend;
//!
//! let backend = Arc::new(RedisLeaseBackend::connect("redis://127.0.0.1/").await?);
//! let allocator = SharedAllocator::new(backend, AllocatorConfig::for_cluster("prod")).await?;
//!
//! let lease = allocator.acquire().await?;
//! // ... build Snowflake IDs with lease.worker_id, renew well inside the
//! // lease duration, release on shutdown ...
//! allocator.release(lease.worker_id, &lease.token).await?;
//! ```

mod contract;
mod local;
mod shared;
mod token;

pub use contract::Allocator;
pub use contract::Lease;
pub use local::LocalAllocator;
pub use shared::SharedAllocator;
// Re-export the shared types so callers need only this crate.
pub use workerid_core::AllocatorConfig;
pub use workerid_core::AllocatorError;
pub use workerid_core::BackendError;
pub use workerid_core::LeaseBackend;
pub use workerid_core::LeaseToken;
pub use workerid_core::PoolKeys;
pub use workerid_time::ClockSource;
pub use workerid_time::SystemClock;
