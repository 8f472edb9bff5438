//! Error types for allocator and backend operations.

use thiserror::Error;

/// Errors surfaced by allocator operations.
///
/// This is a closed set: every operation returns at most one of these kinds,
/// and nothing is retried internally. `NoAvailableId` is a transient
/// condition worth backing off and retrying; `TokenExpired` and `NotAssigned`
/// mean the caller has lost the ID and must acquire a new one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    /// The pool has no free or expired slot to hand out.
    #[error("no available worker IDs")]
    NoAvailableId,

    /// The supplied worker ID is outside the pool range.
    #[error("worker ID {worker_id} outside pool range [1, {max_worker_id}]")]
    InvalidWorkerId {
        /// The ID the caller supplied.
        worker_id: u32,
        /// Upper bound of the pool (inclusive).
        max_worker_id: u32,
    },

    /// A token failed shape validation, or a stored record is malformed.
    #[error("invalid lease token: {reason}")]
    InvalidToken {
        /// What was wrong with the token or record.
        reason: String,
    },

    /// No lease record exists for the worker ID.
    #[error("worker ID {worker_id} is not assigned")]
    NotAssigned {
        /// The ID the caller supplied.
        worker_id: u32,
    },

    /// A lease record exists but the supplied token differs from it.
    #[error("token does not match the live lease on worker ID {worker_id}")]
    TokenMismatch {
        /// The ID the caller supplied.
        worker_id: u32,
    },

    /// The lease matched but its expiry has already passed.
    #[error("lease on worker ID {worker_id} expired at {expired_at}")]
    TokenExpired {
        /// The ID the caller supplied.
        worker_id: u32,
        /// Unix timestamp (seconds) at which the lease ended.
        expired_at: i64,
    },

    /// Constructor-time validation failed.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What was missing or out of range.
        reason: String,
    },

    /// The backend store failed; the wrapped cause is informational.
    #[error("backend operation failed: {source}")]
    Backend {
        /// Underlying backend failure.
        #[from]
        source: BackendError,
    },
}

/// Failures originating in a backend store or its driver.
///
/// These are opaque to the allocation protocol; they wrap transport, script,
/// and decoding problems with human-readable reasons.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached or the connection was lost.
    #[error("backend unavailable: {reason}")]
    Unavailable {
        /// Driver-level description of the connection failure.
        reason: String,
    },

    /// A command or script failed on the backend.
    #[error("{command} command failed: {reason}")]
    Command {
        /// Name of the failing command.
        command: &'static str,
        /// Driver-level description of the failure.
        reason: String,
    },

    /// The backend answered with something the driver cannot interpret.
    #[error("unexpected reply to {command}: {reason}")]
    UnexpectedReply {
        /// Name of the command that produced the reply.
        command: &'static str,
        /// Description of the malformed reply.
        reason: String,
    },

    /// The OS entropy source failed while minting a token.
    #[error("entropy source failed: {reason}")]
    Entropy {
        /// Description of the entropy failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_worker_id_display() {
        let err = AllocatorError::InvalidWorkerId {
            worker_id: 1024,
            max_worker_id: 1023,
        };
        assert_eq!(err.to_string(), "worker ID 1024 outside pool range [1, 1023]");
    }

    #[test]
    fn token_expired_display() {
        let err = AllocatorError::TokenExpired {
            worker_id: 7,
            expired_at: 1_700_000_000,
        };
        assert_eq!(err.to_string(), "lease on worker ID 7 expired at 1700000000");
    }

    #[test]
    fn backend_error_wraps_into_allocator_error() {
        let backend = BackendError::Command {
            command: "acquire",
            reason: "connection reset".to_string(),
        };
        let err: AllocatorError = backend.clone().into();
        assert_eq!(err, AllocatorError::Backend { source: backend });
        assert!(err.to_string().contains("acquire command failed"));
    }

    #[test]
    fn errors_are_comparable() {
        assert_eq!(AllocatorError::NoAvailableId, AllocatorError::NoAvailableId);
        assert_ne!(
            AllocatorError::NotAssigned { worker_id: 1 },
            AllocatorError::NotAssigned { worker_id: 2 }
        );
    }
}
