//! Reconciliation of remote IPAM collections into the local inventory.
//!
//! Each pass indexes local identity projections and the remote collection by
//! match key, set-differences the key spaces, and issues at most one create,
//! one save and one remove call per entity kind to the [`IpamStore`].
//!
//! [`IpamStore`]: crate::store::IpamStore

pub mod addresses;
pub mod pools;

pub use addresses::{
    reconcile_pool_addresses, sync_addresses, AddressMatcher, AddressSyncSummary,
    ADDRESS_MATCHERS,
};
pub use pools::{plan_pools, reconcile_pools, PoolPlan};

use std::ops::AddAssign;

/// Counts of what one reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl ReconcileOutcome {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.removed == 0
    }
}

impl AddAssign for ReconcileOutcome {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.removed += other.removed;
        self.unchanged += other.unchanged;
    }
}
