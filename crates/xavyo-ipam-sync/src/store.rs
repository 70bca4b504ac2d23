//! Local inventory gateway trait and in-memory implementation.
//!
//! The reconciler never talks to a storage engine directly. It lists identity
//! projections, hydrates the records it is about to update, and issues one
//! batch call per phase through [`IpamStore`].

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::{AddressIdentity, LocalAddress, LocalPool, PoolIdentity};

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence gateway for mirrored pools and addresses.
///
/// Pool ranges travel inside their pool: creating a pool creates its ranges
/// and the store assigns their ids.
#[async_trait]
pub trait IpamStore: Send + Sync {
    /// Identity projections of every pool under a pool server.
    async fn list_pool_identities(&self, server_id: &str) -> StoreResult<Vec<PoolIdentity>>;

    /// One page of full pools under a pool server, ordered by id.
    async fn list_pools(
        &self,
        server_id: &str,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<LocalPool>>;

    /// Hydrate pools by id.
    async fn load_pools(&self, ids: &[u64]) -> StoreResult<Vec<LocalPool>>;

    /// Create pools (and their ranges), returning them with ids assigned.
    async fn create_pools(
        &self,
        server_id: &str,
        pools: Vec<LocalPool>,
    ) -> StoreResult<Vec<LocalPool>>;

    /// Persist changes to existing pools.
    async fn save_pools(&self, server_id: &str, pools: Vec<LocalPool>) -> StoreResult<()>;

    /// Remove pools (and everything under them).
    async fn remove_pools(&self, server_id: &str, ids: Vec<u64>) -> StoreResult<()>;

    /// Identity projections of every address under a pool.
    async fn list_address_identities(&self, pool_id: u64) -> StoreResult<Vec<AddressIdentity>>;

    /// Hydrate addresses by id.
    async fn load_addresses(&self, ids: &[u64]) -> StoreResult<Vec<LocalAddress>>;

    /// Create addresses under a pool, returning them with ids assigned.
    async fn create_addresses(
        &self,
        pool_id: u64,
        addresses: Vec<LocalAddress>,
    ) -> StoreResult<Vec<LocalAddress>>;

    /// Persist changes to existing addresses.
    async fn save_addresses(&self, pool_id: u64, addresses: Vec<LocalAddress>) -> StoreResult<()>;

    /// Remove addresses from a pool.
    async fn remove_addresses(&self, pool_id: u64, ids: Vec<u64>) -> StoreResult<()>;
}

/// A call made against [`InMemoryIpamStore`], recorded for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    LoadPools(Vec<u64>),
    CreatePools(usize),
    SavePools(Vec<u64>),
    RemovePools(Vec<u64>),
    ListPools { offset: usize, limit: usize },
    LoadAddresses(Vec<u64>),
    CreateAddresses { pool_id: u64, count: usize },
    SaveAddresses { pool_id: u64, ids: Vec<u64> },
    RemoveAddresses { pool_id: u64, ids: Vec<u64> },
}

#[derive(Debug, Default)]
struct Inventory {
    next_id: u64,
    pools: BTreeMap<u64, LocalPool>,
    addresses: BTreeMap<u64, LocalAddress>,
    calls: Vec<StoreCall>,
}

impl Inventory {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of [`IpamStore`] for tests and tooling.
#[derive(Debug, Default)]
pub struct InMemoryIpamStore {
    inner: RwLock<Inventory>,
}

impl InMemoryIpamStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All pools under a server, ordered by id.
    pub async fn pools(&self, server_id: &str) -> Vec<LocalPool> {
        self.inner
            .read()
            .await
            .pools
            .values()
            .filter(|p| p.parent_server_id == server_id)
            .cloned()
            .collect()
    }

    /// All addresses under a pool, ordered by id.
    pub async fn addresses(&self, pool_id: u64) -> Vec<LocalAddress> {
        self.inner
            .read()
            .await
            .addresses
            .values()
            .filter(|a| a.parent_pool_id == Some(pool_id))
            .cloned()
            .collect()
    }

    /// Calls recorded so far.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.inner.read().await.calls.clone()
    }

    /// Forget recorded calls.
    pub async fn clear_calls(&self) {
        self.inner.write().await.calls.clear();
    }
}

#[async_trait]
impl IpamStore for InMemoryIpamStore {
    async fn list_pool_identities(&self, server_id: &str) -> StoreResult<Vec<PoolIdentity>> {
        let inner = self.inner.read().await;
        Ok(inner
            .pools
            .values()
            .filter(|p| p.parent_server_id == server_id)
            .filter_map(LocalPool::identity)
            .collect())
    }

    async fn list_pools(
        &self,
        server_id: &str,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<LocalPool>> {
        let mut inner = self.inner.write().await;
        inner.calls.push(StoreCall::ListPools { offset, limit });
        Ok(inner
            .pools
            .values()
            .filter(|p| p.parent_server_id == server_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn load_pools(&self, ids: &[u64]) -> StoreResult<Vec<LocalPool>> {
        let mut inner = self.inner.write().await;
        inner.calls.push(StoreCall::LoadPools(ids.to_vec()));
        Ok(ids
            .iter()
            .filter_map(|id| inner.pools.get(id).cloned())
            .collect())
    }

    async fn create_pools(
        &self,
        server_id: &str,
        pools: Vec<LocalPool>,
    ) -> StoreResult<Vec<LocalPool>> {
        let mut inner = self.inner.write().await;
        inner.calls.push(StoreCall::CreatePools(pools.len()));

        let mut created = Vec::with_capacity(pools.len());
        for mut pool in pools {
            let id = inner.allocate_id();
            pool.id = Some(id);
            pool.parent_server_id = server_id.to_string();
            for range in &mut pool.ranges {
                range.id = Some(inner.allocate_id());
            }
            inner.pools.insert(id, pool.clone());
            created.push(pool);
        }
        Ok(created)
    }

    async fn save_pools(&self, server_id: &str, pools: Vec<LocalPool>) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .calls
            .push(StoreCall::SavePools(pools.iter().filter_map(|p| p.id).collect()));

        for pool in pools {
            let id = pool.id.ok_or_else(|| StoreError::not_found("pool", "<unsaved>"))?;
            match inner.pools.get_mut(&id) {
                Some(existing) if existing.parent_server_id == server_id => *existing = pool,
                _ => return Err(StoreError::not_found("pool", id)),
            }
        }
        Ok(())
    }

    async fn remove_pools(&self, server_id: &str, ids: Vec<u64>) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.calls.push(StoreCall::RemovePools(ids.clone()));

        let doomed: HashSet<u64> = ids
            .into_iter()
            .filter(|id| {
                inner
                    .pools
                    .get(id)
                    .is_some_and(|p| p.parent_server_id == server_id)
            })
            .collect();
        inner.pools.retain(|id, _| !doomed.contains(id));
        inner
            .addresses
            .retain(|_, a| a.parent_pool_id.map_or(true, |pid| !doomed.contains(&pid)));
        Ok(())
    }

    async fn list_address_identities(&self, pool_id: u64) -> StoreResult<Vec<AddressIdentity>> {
        let inner = self.inner.read().await;
        Ok(inner
            .addresses
            .values()
            .filter(|a| a.parent_pool_id == Some(pool_id))
            .filter_map(|a| {
                a.id.map(|id| AddressIdentity {
                    id,
                    external_id: a.external_id.clone(),
                    ip_address: Some(a.ip_address.clone()),
                })
            })
            .collect())
    }

    async fn load_addresses(&self, ids: &[u64]) -> StoreResult<Vec<LocalAddress>> {
        let mut inner = self.inner.write().await;
        inner.calls.push(StoreCall::LoadAddresses(ids.to_vec()));
        Ok(ids
            .iter()
            .filter_map(|id| inner.addresses.get(id).cloned())
            .collect())
    }

    async fn create_addresses(
        &self,
        pool_id: u64,
        addresses: Vec<LocalAddress>,
    ) -> StoreResult<Vec<LocalAddress>> {
        let mut inner = self.inner.write().await;
        if !inner.pools.contains_key(&pool_id) {
            return Err(StoreError::not_found("pool", pool_id));
        }
        inner.calls.push(StoreCall::CreateAddresses {
            pool_id,
            count: addresses.len(),
        });

        let mut created = Vec::with_capacity(addresses.len());
        for mut address in addresses {
            let id = inner.allocate_id();
            address.id = Some(id);
            address.parent_pool_id = Some(pool_id);
            inner.addresses.insert(id, address.clone());
            created.push(address);
        }
        Ok(created)
    }

    async fn save_addresses(&self, pool_id: u64, addresses: Vec<LocalAddress>) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.calls.push(StoreCall::SaveAddresses {
            pool_id,
            ids: addresses.iter().filter_map(|a| a.id).collect(),
        });

        for address in addresses {
            let id = address
                .id
                .ok_or_else(|| StoreError::not_found("address", "<unsaved>"))?;
            match inner.addresses.get_mut(&id) {
                Some(existing) if existing.parent_pool_id == Some(pool_id) => *existing = address,
                _ => return Err(StoreError::not_found("address", id)),
            }
        }
        Ok(())
    }

    async fn remove_addresses(&self, pool_id: u64, ids: Vec<u64>) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.calls.push(StoreCall::RemoveAddresses {
            pool_id,
            ids: ids.clone(),
        });

        let doomed: HashSet<u64> = ids.into_iter().collect();
        inner
            .addresses
            .retain(|id, a| !(doomed.contains(id) && a.parent_pool_id == Some(pool_id)));
        Ok(())
    }
}
