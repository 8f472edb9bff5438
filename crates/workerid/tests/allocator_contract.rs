//! Contract tests run against both allocator implementations.
//!
//! Everything here goes through `Arc<dyn Allocator>`, so the same client
//! code paths are exercised against the local allocator and the shared
//! allocator on the deterministic backend.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use workerid::Allocator;
use workerid::AllocatorConfig;
use workerid::AllocatorError;
use workerid::LeaseToken;
use workerid::LocalAllocator;
use workerid::SharedAllocator;
use workerid_testing::DeterministicLeaseBackend;

fn config(cluster: &str, max_worker_id: u32) -> AllocatorConfig {
    AllocatorConfig {
        max_worker_id: Some(max_worker_id),
        max_lease: Duration::from_secs(60),
        ..AllocatorConfig::for_cluster(cluster)
    }
}

async fn implementations(cluster: &str, max_worker_id: u32) -> Vec<(&'static str, Arc<dyn Allocator>)> {
    let local = LocalAllocator::new(config(cluster, max_worker_id)).unwrap();
    let shared = SharedAllocator::new(DeterministicLeaseBackend::new(), config(cluster, max_worker_id))
        .await
        .unwrap();
    vec![("local", Arc::new(local)), ("shared", Arc::new(shared))]
}

#[tokio::test]
async fn lease_lifecycle() {
    for (name, allocator) in implementations("lifecycle", 10).await {
        let lease = allocator.acquire().await.unwrap();
        assert!((1..=10).contains(&lease.worker_id), "{name}: id out of range");

        allocator.renew(lease.worker_id, &lease.token).await.unwrap();
        allocator.release(lease.worker_id, &lease.token).await.unwrap();

        assert_eq!(
            allocator.renew(lease.worker_id, &lease.token).await,
            Err(AllocatorError::NotAssigned {
                worker_id: lease.worker_id
            }),
            "{name}: renew after release"
        );
    }
}

#[tokio::test]
async fn foreign_token_is_rejected() {
    let foreign = LeaseToken::parse("AAAAAAAAAAAAAAAAAAAAAA").unwrap();
    for (name, allocator) in implementations("foreign", 10).await {
        let lease = allocator.acquire().await.unwrap();
        assert_ne!(lease.token, foreign, "{name}: astronomically unlucky mint");

        assert_eq!(
            allocator.renew(lease.worker_id, &foreign).await,
            Err(AllocatorError::TokenMismatch {
                worker_id: lease.worker_id
            }),
            "{name}: renew with foreign token"
        );
        assert_eq!(
            allocator.release(lease.worker_id, &foreign).await,
            Err(AllocatorError::TokenMismatch {
                worker_id: lease.worker_id
            }),
            "{name}: release with foreign token"
        );

        // The real token still works.
        allocator.renew(lease.worker_id, &lease.token).await.unwrap();
    }
}

#[tokio::test]
async fn pool_exhaustion_and_recovery() {
    for (name, allocator) in implementations("drain", 3).await {
        let mut leases = Vec::new();
        for _ in 0..3 {
            leases.push(allocator.acquire().await.unwrap());
        }

        let ids: HashSet<u32> = leases.iter().map(|l| l.worker_id).collect();
        let tokens: HashSet<&LeaseToken> = leases.iter().map(|l| &l.token).collect();
        assert_eq!(ids.len(), 3, "{name}: duplicate IDs");
        assert_eq!(tokens.len(), 3, "{name}: duplicate tokens");

        assert_eq!(
            allocator.acquire().await,
            Err(AllocatorError::NoAvailableId),
            "{name}: acquire from saturated pool"
        );

        let freed = leases.pop().unwrap();
        allocator.release(freed.worker_id, &freed.token).await.unwrap();

        let lease = allocator.acquire().await.unwrap();
        assert_eq!(lease.worker_id, freed.worker_id, "{name}: only free slot must be reused");
        assert_ne!(lease.token, freed.token, "{name}: token reuse");
    }
}

#[tokio::test]
async fn every_token_matches_the_documented_shape() {
    for (name, allocator) in implementations("shape", 50).await {
        for _ in 0..20 {
            let lease = allocator.acquire().await.unwrap();
            let token = lease.token.as_str();
            assert_eq!(token.len(), 22, "{name}: token length");
            assert!(
                token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
                "{name}: token alphabet: {token:?}"
            );
        }
    }
}

#[tokio::test]
async fn concurrent_acquires_are_disjoint() {
    for (name, allocator) in implementations("parallel", 1023).await {
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.acquire().await.unwrap() })
            })
            .collect();

        let mut ids = HashSet::new();
        let mut tokens = HashSet::new();
        for handle in handles {
            let lease = handle.await.unwrap();
            assert!(ids.insert(lease.worker_id), "{name}: duplicate ID");
            assert!(tokens.insert(lease.token), "{name}: duplicate token");
        }
        assert_eq!(ids.len(), 5, "{name}");
    }
}
