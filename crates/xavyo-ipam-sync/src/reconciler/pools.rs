//! Pool reconciliation: remote IP ranges into local pools.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::ReconcileOutcome;
use crate::error::IpamResult;
use crate::models::{
    strip_prefix_len, LocalPool, PoolIdentity, PoolRange, PoolType, RangeBounds, RemoteNetwork,
};
use crate::store::IpamStore;

/// What a pool pass will do, computed before any side effect.
#[derive(Debug, Default)]
pub struct PoolPlan<'a> {
    /// Remote networks with no local pool, in remote order.
    pub create: Vec<&'a RemoteNetwork>,
    /// Local pool id paired with its remote network.
    pub matched: Vec<(u64, &'a RemoteNetwork)>,
    /// Local pools with no remote network.
    pub remove: Vec<u64>,
}

/// Match local pools to remote networks on `externalId == id`.
///
/// Duplicate remote ids keep their first occurrence. A local pool without an
/// external id, or whose external id is already claimed by another local
/// pool, matches nothing and is removed.
#[must_use]
pub fn plan_pools<'a>(local: &[PoolIdentity], remote: &'a [RemoteNetwork]) -> PoolPlan<'a> {
    let mut remote_order: Vec<String> = Vec::with_capacity(remote.len());
    let mut remote_by_key: HashMap<String, &RemoteNetwork> = HashMap::with_capacity(remote.len());
    for network in remote {
        let key = network.id.to_string();
        if !remote_by_key.contains_key(&key) {
            remote_order.push(key.clone());
            remote_by_key.insert(key, network);
        }
    }

    let mut local_by_key: HashMap<&str, u64> = HashMap::with_capacity(local.len());
    let mut plan = PoolPlan::default();
    for identity in local {
        match identity.external_id.as_deref() {
            Some(key) if !local_by_key.contains_key(key) => {
                local_by_key.insert(key, identity.id);
            }
            _ => plan.remove.push(identity.id),
        }
    }

    let remote_keys: HashSet<&str> = remote_order.iter().map(String::as_str).collect();
    let local_keys: HashSet<&str> = local_by_key.keys().copied().collect();

    for key in &remote_order {
        let network = remote_by_key[key.as_str()];
        match local_by_key.get(key.as_str()) {
            Some(&local_id) => plan.matched.push((local_id, network)),
            None => plan.create.push(network),
        }
    }

    let mut stale: Vec<u64> = local_keys
        .difference(&remote_keys)
        .map(|key| local_by_key[key])
        .collect();
    stale.sort_unstable();
    plan.remove.extend(stale);

    plan
}

/// Build a new local pool from a remote network.
#[must_use]
pub fn pool_from_network(server_id: &str, network: &RemoteNetwork) -> LocalPool {
    let pool_type = PoolType::from(network.address_family);
    LocalPool {
        id: None,
        external_id: Some(network.id.to_string()),
        display_name: network.display_name.clone(),
        cidr: network.start_address.clone(),
        pool_type,
        ranges: vec![PoolRange {
            id: None,
            bounds: RangeBounds::new(
                pool_type,
                strip_prefix_len(&network.start_address),
                strip_prefix_len(&network.end_address),
            ),
        }],
        ip_free_count: network.size,
        ip_count: network.size,
        parent_server_id: server_id.to_string(),
    }
}

/// Copy changed remote fields onto a pool. Returns whether anything changed.
pub fn apply_network(pool: &mut LocalPool, network: &RemoteNetwork) -> bool {
    let mut dirty = false;
    if pool.display_name != network.display_name {
        pool.display_name.clone_from(&network.display_name);
        dirty = true;
    }
    if pool.cidr != network.start_address {
        pool.cidr.clone_from(&network.start_address);
        dirty = true;
    }
    dirty
}

/// Bring the pools under `server_id` in line with `remote`.
///
/// An empty `remote` removes every local pool.
pub async fn reconcile_pools(
    store: &dyn IpamStore,
    server_id: &str,
    remote: &[RemoteNetwork],
) -> IpamResult<ReconcileOutcome> {
    let local = store.list_pool_identities(server_id).await?;
    let plan = plan_pools(&local, remote);
    debug!(
        server_id = %server_id,
        local = local.len(),
        remote = remote.len(),
        create = plan.create.len(),
        matched = plan.matched.len(),
        remove = plan.remove.len(),
        "Planned pool reconciliation"
    );

    let mut outcome = ReconcileOutcome::default();

    if !plan.create.is_empty() {
        let additions: Vec<LocalPool> = plan
            .create
            .iter()
            .map(|network| pool_from_network(server_id, network))
            .collect();
        outcome.created = additions.len();
        store.create_pools(server_id, additions).await?;
    }

    if !plan.matched.is_empty() {
        let ids: Vec<u64> = plan.matched.iter().map(|(id, _)| *id).collect();
        let by_id: HashMap<u64, &RemoteNetwork> = plan.matched.iter().copied().collect();

        let mut dirty = Vec::new();
        for mut pool in store.load_pools(&ids).await? {
            let network = pool.id.and_then(|id| by_id.get(&id).copied());
            match network {
                Some(network) if apply_network(&mut pool, network) => dirty.push(pool),
                _ => outcome.unchanged += 1,
            }
        }

        if !dirty.is_empty() {
            outcome.updated = dirty.len();
            store.save_pools(server_id, dirty).await?;
        }
    }

    if !plan.remove.is_empty() {
        outcome.removed = plan.remove.len();
        store.remove_pools(server_id, plan.remove).await?;
    }

    info!(
        server_id = %server_id,
        created = outcome.created,
        updated = outcome.updated,
        removed = outcome.removed,
        unchanged = outcome.unchanged,
        "Pool reconciliation completed"
    );
    Ok(outcome)
}
