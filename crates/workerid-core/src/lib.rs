//! Shared types for the worker ID allocator.
//!
//! This crate defines everything the allocator implementations and their
//! backends agree on:
//!
//! - [`AllocatorError`] / [`BackendError`]: the closed error taxonomy
//! - [`AllocatorConfig`]: pool sizing, lease duration, cluster namespacing
//! - [`LeaseToken`]: the 22-character URL-safe proof of ownership
//! - [`PoolKeys`]: the backend key layout for a cluster namespace
//! - [`LeaseCommand`] / [`LeaseReply`]: the atomic command set a backend
//!   executes in single isolated steps
//! - [`LeaseBackend`]: the contract a shared store must satisfy
//!
//! Allocator implementations live in the `workerid` crate; backends in
//! `workerid-backend-redis` (production) and `workerid-testing`
//! (deterministic, in-memory).

mod backend;
mod command;
mod config;
mod error;
mod keys;
mod token;

pub use backend::LeaseBackend;
pub use command::LeaseCommand;
pub use command::LeaseFault;
pub use command::LeaseReply;
pub use config::AllocatorConfig;
pub use config::DEFAULT_LEASE;
pub use config::DEFAULT_MAX_WORKER_ID;
pub use config::MAX_POOL_SIZE;
pub use config::MAX_WORKER_ID_BITS;
pub use error::AllocatorError;
pub use error::BackendError;
pub use keys::PoolKeys;
pub use token::LeaseToken;
pub use token::TOKEN_BYTES;
pub use token::TOKEN_LEN;
