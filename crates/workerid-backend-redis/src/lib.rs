//! Redis-protocol lease backend.
//!
//! Implements [`LeaseBackend`] on any store speaking RESP with server-side
//! scripting (Redis, KeyDB, Dragonfly). Every [`LeaseCommand`] maps to one
//! Lua script, so each protocol step executes atomically on the backend's
//! single-threaded script executor — the only isolation mechanism in play.
//! No client-side locks, ever: a lock would add latency and a lost-lock
//! failure mode without adding correctness on top of the scripts.
//!
//! Both pool keys carry the cluster hash-tag, so the multi-key scripts are
//! valid against clustered deployments.
//!
//! State layout per cluster namespace:
//!
//! - `{workerid:cluster:<name>}:ids` — sorted set of worker IDs scored by
//!   lease expiry, score 0 = free
//! - `{workerid:cluster:<name>}:tokens` — hash of `id -> "<token>:<expiry>"`,
//!   with a container TTL of three lease durations as a safety net against
//!   a crashed final holder pinning memory forever

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::debug;
use workerid_core::BackendError;
use workerid_core::LeaseBackend;
use workerid_core::LeaseCommand;
use workerid_core::LeaseFault;
use workerid_core::LeaseReply;
use workerid_core::PoolKeys;

/// Seed the pool with members `1..N` at score 0, only when the sorted set is
/// empty. Re-running against a populated pool is a no-op, which makes
/// concurrent first construction safe without any partial-seed window.
const SEED_SCRIPT: &str = r#"
if redis.call('ZCARD', KEYS[1]) > 0 then
    return 0
end
local pool_size = tonumber(ARGV[1])
for id = 1, pool_size do
    redis.call('ZADD', KEYS[1], 0, tostring(id))
end
return pool_size
"#;

/// Claim any member scored at or below `now` (free or expired), bind the
/// token, and push the score to `now + lease`. Returns the claimed ID, or
/// nil when the pool is saturated.
const ACQUIRE_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local lease = tonumber(ARGV[2])

local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', now, 'LIMIT', 0, 1)
if #ids == 0 then
    return nil
end

local worker_id = ids[1]
local expires_at = now + lease
redis.call('ZADD', KEYS[1], expires_at, worker_id)
redis.call('HSET', KEYS[2], worker_id, ARGV[3] .. ':' .. expires_at)
redis.call('EXPIRE', KEYS[2], lease * 3)
return worker_id
"#;

/// Validate the stored record against the supplied token and extend the
/// lease. Status codes are decoded by [`decode_renew`].
const RENEW_SCRIPT: &str = r#"
local entry = redis.call('HGET', KEYS[2], ARGV[1])
if not entry then
    return {-1}
end
local sep = string.find(entry, ':', 1, true)
if not sep then
    return {-4}
end
local stored_token = string.sub(entry, 1, sep - 1)
local expires_at = tonumber(string.sub(entry, sep + 1))
if not expires_at then
    return {-4}
end
if stored_token ~= ARGV[2] then
    return {-2}
end
local now = tonumber(ARGV[3])
if expires_at <= now then
    return {-3, expires_at}
end
local lease = tonumber(ARGV[4])
local new_expires_at = now + lease
redis.call('HSET', KEYS[2], ARGV[1], ARGV[2] .. ':' .. new_expires_at)
redis.call('ZADD', KEYS[1], new_expires_at, ARGV[1])
redis.call('EXPIRE', KEYS[2], lease * 3)
return {1, new_expires_at}
"#;

/// Validate like renew, then delete the record and drop the member's score
/// back to 0.
const RELEASE_SCRIPT: &str = r#"
local entry = redis.call('HGET', KEYS[2], ARGV[1])
if not entry then
    return {-1}
end
local sep = string.find(entry, ':', 1, true)
if not sep then
    return {-4}
end
local stored_token = string.sub(entry, 1, sep - 1)
local expires_at = tonumber(string.sub(entry, sep + 1))
if not expires_at then
    return {-4}
end
if stored_token ~= ARGV[2] then
    return {-2}
end
if expires_at <= tonumber(ARGV[3]) then
    return {-3, expires_at}
end
redis.call('HDEL', KEYS[2], ARGV[1])
redis.call('ZADD', KEYS[1], 0, ARGV[1])
return {1}
"#;

/// [`LeaseBackend`] over a Redis-protocol store.
///
/// Cheap to clone via the underlying multiplexed connection manager; one
/// instance can serve any number of allocators and cluster namespaces.
pub struct RedisLeaseBackend {
    manager: ConnectionManager,
    seed: Script,
    acquire: Script,
    renew: Script,
    release: Script,
}

impl RedisLeaseBackend {
    /// Wrap an existing connection manager.
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            seed: Script::new(SEED_SCRIPT),
            acquire: Script::new(ACQUIRE_SCRIPT),
            renew: Script::new(RENEW_SCRIPT),
            release: Script::new(RELEASE_SCRIPT),
        }
    }

    /// Connect to the store at `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        let client = redis::Client::open(url).map_err(|err| BackendError::Unavailable {
            reason: err.to_string(),
        })?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|err| BackendError::Unavailable {
                reason: err.to_string(),
            })?;
        debug!(url, "connected lease backend");
        Ok(Self::new(manager))
    }
}

fn command_failed(command: &'static str, err: redis::RedisError) -> BackendError {
    BackendError::Command {
        command,
        reason: err.to_string(),
    }
}

/// Decode the renew script's status reply.
fn decode_renew(status: &[i64]) -> Result<LeaseReply, BackendError> {
    match status {
        [1, expires_at] => Ok(LeaseReply::Renewed {
            expires_at_unix_secs: *expires_at,
        }),
        _ => decode_fault("renew", status),
    }
}

/// Decode the release script's status reply.
fn decode_release(status: &[i64]) -> Result<LeaseReply, BackendError> {
    match status {
        [1] => Ok(LeaseReply::Released),
        _ => decode_fault("release", status),
    }
}

fn decode_fault(command: &'static str, status: &[i64]) -> Result<LeaseReply, BackendError> {
    let fault = match status {
        [-1] => LeaseFault::NotAssigned,
        [-2] => LeaseFault::TokenMismatch,
        [-3, expired_at] => LeaseFault::TokenExpired {
            expired_at_unix_secs: *expired_at,
        },
        [-4] => LeaseFault::CorruptRecord {
            reason: "stored lease record is malformed".to_string(),
        },
        other => {
            return Err(BackendError::UnexpectedReply {
                command,
                reason: format!("status {other:?}"),
            })
        }
    };
    Ok(LeaseReply::Denied { fault })
}

#[async_trait]
impl LeaseBackend for RedisLeaseBackend {
    async fn apply(&self, keys: &PoolKeys, command: LeaseCommand) -> Result<LeaseReply, BackendError> {
        let name = command.name();
        let mut conn = self.manager.clone();
        match command {
            LeaseCommand::Seed { pool_size } => {
                let added: u32 = self
                    .seed
                    .key(keys.slots_key())
                    .arg(pool_size)
                    .invoke_async(&mut conn)
                    .await
                    .map_err(|err| command_failed(name, err))?;
                Ok(LeaseReply::Seeded { added })
            }
            LeaseCommand::Acquire {
                now_unix_secs,
                lease_secs,
                token,
            } => {
                let claimed: Option<u32> = self
                    .acquire
                    .key(keys.slots_key())
                    .key(keys.tokens_key())
                    .arg(now_unix_secs)
                    .arg(lease_secs)
                    .arg(token.as_str())
                    .invoke_async(&mut conn)
                    .await
                    .map_err(|err| command_failed(name, err))?;
                // nil from the script means an empty selection, which is a
                // protocol outcome rather than a backend failure.
                Ok(match claimed {
                    Some(worker_id) => LeaseReply::Acquired { worker_id },
                    None => LeaseReply::Exhausted,
                })
            }
            LeaseCommand::Renew {
                worker_id,
                token,
                now_unix_secs,
                lease_secs,
            } => {
                let status: Vec<i64> = self
                    .renew
                    .key(keys.slots_key())
                    .key(keys.tokens_key())
                    .arg(worker_id)
                    .arg(token.as_str())
                    .arg(now_unix_secs)
                    .arg(lease_secs)
                    .invoke_async(&mut conn)
                    .await
                    .map_err(|err| command_failed(name, err))?;
                decode_renew(&status)
            }
            LeaseCommand::Release {
                worker_id,
                token,
                now_unix_secs,
            } => {
                let status: Vec<i64> = self
                    .release
                    .key(keys.slots_key())
                    .key(keys.tokens_key())
                    .arg(worker_id)
                    .arg(token.as_str())
                    .arg(now_unix_secs)
                    .invoke_async(&mut conn)
                    .await
                    .map_err(|err| command_failed(name, err))?;
                decode_release(&status)
            }
        }
    }

    async fn now_unix_secs(&self) -> Result<i64, BackendError> {
        let mut conn = self.manager.clone();
        let (secs, _micros): (i64, i64) = redis::cmd("TIME")
            .query_async(&mut conn)
            .await
            .map_err(|err| command_failed("time", err))?;
        Ok(secs)
    }

    async fn slot_score(&self, keys: &PoolKeys, worker_id: u32) -> Result<Option<i64>, BackendError> {
        let mut conn = self.manager.clone();
        let score: Option<f64> = redis::cmd("ZSCORE")
            .arg(keys.slots_key())
            .arg(worker_id)
            .query_async(&mut conn)
            .await
            .map_err(|err| command_failed("zscore", err))?;
        Ok(score.map(|s| s as i64))
    }
}
