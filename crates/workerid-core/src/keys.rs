//! Backend key layout for a cluster namespace.

use serde::Deserialize;
use serde::Serialize;

use crate::error::AllocatorError;

/// Keys for one cluster's allocator state.
///
/// Two keys live under the namespace `{workerid:cluster:<name>}`:
///
/// - `...:ids` — ordered collection of pool members scored by lease expiry
///   (score 0 = free)
/// - `...:tokens` — map from worker ID to `"<token>:<expires-at>"`
///
/// The braces are a hash-tag: both keys land in the same hash slot, so a
/// clustered backend can execute multi-key scripts over them on one shard.
/// Distinct cluster names share no state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKeys {
    cluster: String,
}

impl PoolKeys {
    /// Build the key set for a cluster. The name must be non-empty.
    pub fn new(cluster: impl Into<String>) -> Result<Self, AllocatorError> {
        let cluster = cluster.into();
        if cluster.is_empty() {
            return Err(AllocatorError::InvalidConfiguration {
                reason: "cluster name must not be empty".to_string(),
            });
        }
        Ok(Self { cluster })
    }

    /// The cluster name this key set belongs to.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// The shared hash-tagged namespace prefix.
    pub fn namespace(&self) -> String {
        format!("{{workerid:cluster:{}}}", self.cluster)
    }

    /// Key of the scored pool collection.
    pub fn slots_key(&self) -> String {
        format!("{}:ids", self.namespace())
    }

    /// Key of the token record map.
    pub fn tokens_key(&self) -> String {
        format!("{}:tokens", self.namespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let keys = PoolKeys::new("prod-eu").unwrap();
        assert_eq!(keys.slots_key(), "{workerid:cluster:prod-eu}:ids");
        assert_eq!(keys.tokens_key(), "{workerid:cluster:prod-eu}:tokens");
    }

    #[test]
    fn both_keys_share_the_hash_tag() {
        let keys = PoolKeys::new("c1").unwrap();
        let tag = keys.namespace();
        assert!(keys.slots_key().starts_with(&tag));
        assert!(keys.tokens_key().starts_with(&tag));
    }

    #[test]
    fn distinct_clusters_use_distinct_keys() {
        let a = PoolKeys::new("a").unwrap();
        let b = PoolKeys::new("b").unwrap();
        assert_ne!(a.slots_key(), b.slots_key());
        assert_ne!(a.tokens_key(), b.tokens_key());
    }

    #[test]
    fn empty_cluster_rejected() {
        assert!(matches!(
            PoolKeys::new(""),
            Err(AllocatorError::InvalidConfiguration { .. })
        ));
    }
}
