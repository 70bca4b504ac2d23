//! Address reconciliation: remote IP records into local addresses, pool by pool.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use tracing::{debug, info, instrument, warn};

use super::ReconcileOutcome;
use crate::client::{IpamClient, ResourceKind};
use crate::error::IpamResult;
use crate::fetch::{fetch_all, PageLimits};
use crate::models::{AddressIdentity, IpType, LocalAddress, LocalPool, RemoteAddress};
use crate::session::Session;
use crate::store::IpamStore;

/// One matching rule between local and remote addresses.
///
/// A rule matches when both sides produce the same key.
#[derive(Clone, Copy)]
pub struct AddressMatcher {
    pub name: &'static str,
    pub local_key: fn(&AddressIdentity) -> Option<String>,
    pub remote_key: fn(&RemoteAddress) -> Option<String>,
}

impl std::fmt::Debug for AddressMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressMatcher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn local_external_id(local: &AddressIdentity) -> Option<String> {
    local.external_id.clone()
}

fn remote_id(remote: &RemoteAddress) -> Option<String> {
    Some(remote.id.to_string())
}

fn local_ip(local: &AddressIdentity) -> Option<String> {
    local.ip_address.clone()
}

fn remote_bare_ip(remote: &RemoteAddress) -> Option<String> {
    Some(remote.bare_address().to_string())
}

/// Matching rules, tried in order: external id first, then bare address for
/// records created locally before their external id was known.
pub const ADDRESS_MATCHERS: &[AddressMatcher] = &[
    AddressMatcher {
        name: "external_id",
        local_key: local_external_id,
        remote_key: remote_id,
    },
    AddressMatcher {
        name: "ip_address",
        local_key: local_ip,
        remote_key: remote_bare_ip,
    },
];

/// Result of matching one pool's addresses.
#[derive(Debug, Default)]
struct AddressPlan<'a> {
    create: Vec<&'a RemoteAddress>,
    matched: Vec<(u64, &'a RemoteAddress)>,
    remove: Vec<u64>,
}

fn plan_addresses<'a>(
    local: &[AddressIdentity],
    remote: &'a [RemoteAddress],
    matchers: &[AddressMatcher],
) -> AddressPlan<'a> {
    let mut unclaimed_local: HashSet<u64> = local.iter().map(|l| l.id).collect();
    let mut claimed_remote: HashSet<usize> = HashSet::new();
    let mut seen_remote_ids: HashSet<u64> = HashSet::new();
    let mut plan = AddressPlan::default();

    for matcher in matchers {
        let mut index: HashMap<String, u64> = HashMap::new();
        for identity in local.iter().filter(|l| unclaimed_local.contains(&l.id)) {
            if let Some(key) = (matcher.local_key)(identity) {
                index.entry(key).or_insert(identity.id);
            }
        }

        for (position, address) in remote.iter().enumerate() {
            if claimed_remote.contains(&position) {
                continue;
            }
            let Some(local_id) = (matcher.remote_key)(address).and_then(|k| index.remove(&k))
            else {
                continue;
            };
            unclaimed_local.remove(&local_id);
            claimed_remote.insert(position);
            seen_remote_ids.insert(address.id);
            plan.matched.push((local_id, address));
        }
    }

    for (position, address) in remote.iter().enumerate() {
        if !claimed_remote.contains(&position) && seen_remote_ids.insert(address.id) {
            plan.create.push(address);
        }
    }

    plan.remove = local
        .iter()
        .map(|l| l.id)
        .filter(|id| unclaimed_local.contains(id))
        .collect();
    plan
}

/// Build a local address under `pool` from a remote record.
#[must_use]
pub fn address_from_remote(pool: &LocalPool, remote: &RemoteAddress) -> LocalAddress {
    let ip_address = remote.bare_address().to_string();
    let parent_range_id = ip_address
        .parse::<IpAddr>()
        .ok()
        .and_then(|ip| pool.range_containing(&ip))
        .and_then(|range| range.id);

    LocalAddress {
        id: None,
        external_id: Some(remote.id.to_string()),
        ip_address,
        ip_type: IpType::from_status(remote.status.as_deref()),
        hostname: hostname_of(remote),
        parent_pool_id: pool.id,
        parent_range_id,
    }
}

fn hostname_of(remote: &RemoteAddress) -> Option<String> {
    remote
        .dns_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Copy changed remote fields onto an address. `ipType` is always recomputed.
pub fn apply_remote(address: &mut LocalAddress, remote: &RemoteAddress) -> bool {
    let mut dirty = false;

    let external_id = Some(remote.id.to_string());
    if address.external_id != external_id {
        address.external_id = external_id;
        dirty = true;
    }

    let bare = remote.bare_address();
    if address.ip_address != bare {
        address.ip_address = bare.to_string();
        dirty = true;
    }

    let ip_type = IpType::from_status(remote.status.as_deref());
    if address.ip_type != ip_type {
        address.ip_type = ip_type;
        dirty = true;
    }

    let hostname = hostname_of(remote);
    if address.hostname != hostname {
        address.hostname = hostname;
        dirty = true;
    }

    dirty
}

/// Keep only remote records that fall inside one of the pool's ranges.
#[must_use]
pub fn within_pool(pool: &LocalPool, remote: Vec<RemoteAddress>) -> Vec<RemoteAddress> {
    if pool.ranges.is_empty() {
        return remote;
    }
    remote
        .into_iter()
        .filter(|address| {
            address
                .bare_address()
                .parse::<IpAddr>()
                .is_ok_and(|ip| pool.range_containing(&ip).is_some())
        })
        .collect()
}

/// Bring the addresses of one pool in line with `remote`.
pub async fn reconcile_pool_addresses(
    store: &dyn IpamStore,
    pool: &LocalPool,
    remote: &[RemoteAddress],
) -> IpamResult<ReconcileOutcome> {
    let Some(pool_id) = pool.id else {
        return Ok(ReconcileOutcome::default());
    };

    let local = store.list_address_identities(pool_id).await?;
    let plan = plan_addresses(&local, remote, ADDRESS_MATCHERS);
    let mut outcome = ReconcileOutcome::default();

    if !plan.create.is_empty() {
        let additions: Vec<LocalAddress> = plan
            .create
            .iter()
            .map(|remote| address_from_remote(pool, remote))
            .collect();
        outcome.created = additions.len();
        store.create_addresses(pool_id, additions).await?;
    }

    if !plan.matched.is_empty() {
        let ids: Vec<u64> = plan.matched.iter().map(|(id, _)| *id).collect();
        let by_id: HashMap<u64, &RemoteAddress> = plan.matched.iter().copied().collect();

        let mut dirty = Vec::new();
        for mut address in store.load_addresses(&ids).await? {
            let remote = address.id.and_then(|id| by_id.get(&id).copied());
            match remote {
                Some(remote) if apply_remote(&mut address, remote) => dirty.push(address),
                _ => outcome.unchanged += 1,
            }
        }

        if !dirty.is_empty() {
            outcome.updated = dirty.len();
            store.save_addresses(pool_id, dirty).await?;
        }
    }

    if !plan.remove.is_empty() {
        outcome.removed = plan.remove.len();
        store.remove_addresses(pool_id, plan.remove).await?;
    }

    debug!(
        pool_id,
        created = outcome.created,
        updated = outcome.updated,
        removed = outcome.removed,
        "Address reconciliation for pool completed"
    );
    Ok(outcome)
}

/// Totals of an address sync across every pool of a server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSyncSummary {
    pub pools: usize,
    pub outcome: ReconcileOutcome,
    /// External ids of pools whose address listing ended early.
    pub partial_pools: Vec<String>,
}

/// Reconcile addresses for every pool under `server_id`.
///
/// Pools are read from the store `group_size` at a time and each group is
/// fully reconciled before the next is read.
#[instrument(skip(client, session, store, limits))]
pub async fn sync_addresses(
    client: &IpamClient,
    session: &Session,
    store: &dyn IpamStore,
    server_id: &str,
    limits: PageLimits,
    group_size: usize,
) -> IpamResult<AddressSyncSummary> {
    let group_size = group_size.max(1);
    let mut summary = AddressSyncSummary::default();
    let mut offset = 0;

    loop {
        let group = store.list_pools(server_id, offset, group_size).await?;
        let group_len = group.len();

        for pool in &group {
            let filters = [("parent", pool.cidr.clone())];
            let fetched =
                fetch_all::<RemoteAddress>(client, session, ResourceKind::Addresses, &filters, limits)
                    .await;

            if let Some(failure) = &fetched.failure {
                warn!(
                    pool_id = ?pool.id,
                    external_id = ?pool.external_id,
                    fetched = fetched.items.len(),
                    error = %failure,
                    "Address listing incomplete, reconciling with partial results"
                );
                summary
                    .partial_pools
                    .push(pool.external_id.clone().unwrap_or_default());
            }

            let remote = within_pool(pool, fetched.items);
            summary.outcome += reconcile_pool_addresses(store, pool, &remote).await?;
            summary.pools += 1;
        }

        if group_len < group_size {
            break;
        }
        offset += group_size;
    }

    info!(
        server_id = %server_id,
        pools = summary.pools,
        created = summary.outcome.created,
        updated = summary.outcome.updated,
        removed = summary.outcome.removed,
        "Address reconciliation completed"
    );
    Ok(summary)
}
