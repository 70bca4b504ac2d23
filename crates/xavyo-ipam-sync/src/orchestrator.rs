//! Refresh cycle for pool servers.
//!
//! One cycle walks a pool server through connectivity probe, authentication,
//! a single test listing, network reconciliation and (optionally) address
//! reconciliation. Each gate short-circuits the cycle with an error status.
//! The session is always logged out once it has been opened.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::client::{IpamClient, ResourceKind};
use crate::config::PoolServerConfig;
use crate::error::{IpamError, IpamResult};
use crate::fetch::{fetch_all, PageLimits};
use crate::models::RemoteNetwork;
use crate::reconciler::{reconcile_pools, sync_addresses, AddressSyncSummary, ReconcileOutcome};
use crate::session::{Credentials, Session};
use crate::status::{IntegrationStatus, StatusReporter};
use crate::store::IpamStore;

/// Status message when the configuration does not validate.
pub const STATUS_INVALID_CONFIG: &str = "invalid configuration";
/// Status message when the service host cannot be reached.
pub const STATUS_UNREACHABLE: &str = "api not reachable";
/// Status message when the token request fails.
pub const STATUS_AUTH_FAILED: &str = "error authenticating";
/// Status message when the test listing fails.
pub const STATUS_CALL_FAILED: &str = "error calling service";
/// Status message when reconciliation against the store fails.
pub const STATUS_SYNC_FAILED: &str = "error syncing";

/// Summary of one refresh cycle.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub server_id: String,
    pub status: IntegrationStatus,
    pub pools: ReconcileOutcome,
    /// Present when address inventory ran.
    pub addresses: Option<AddressSyncSummary>,
    /// The network listing ended early; pools were reconciled against what arrived.
    pub pool_fetch_partial: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    fn begin(server_id: &str) -> Self {
        let now = Utc::now();
        Self {
            server_id: server_id.to_string(),
            status: IntegrationStatus::Syncing,
            pools: ReconcileOutcome::default(),
            addresses: None,
            pool_fetch_partial: false,
            started_at: now,
            finished_at: now,
        }
    }

    /// Whether any pool's address listing ended early.
    #[must_use]
    pub fn address_fetch_partial(&self) -> bool {
        self.addresses
            .as_ref()
            .is_some_and(|summary| !summary.partial_pools.is_empty())
    }
}

/// A cycle aborted at one of its gates.
struct CycleFailure {
    status: &'static str,
    error: IpamError,
}

fn at(status: &'static str) -> impl FnOnce(IpamError) -> CycleFailure {
    move |error| CycleFailure { status, error }
}

/// A configured pool server.
#[derive(Debug, Clone)]
pub struct PoolServer {
    pub id: String,
    pub config: PoolServerConfig,
}

impl PoolServer {
    pub fn new(id: impl Into<String>, config: PoolServerConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }
}

/// Runs refresh cycles against a local inventory and reports status changes.
#[derive(Clone)]
pub struct PoolServerOrchestrator {
    store: Arc<dyn IpamStore>,
    reporter: Arc<dyn StatusReporter>,
}

impl PoolServerOrchestrator {
    pub fn new(store: Arc<dyn IpamStore>, reporter: Arc<dyn StatusReporter>) -> Self {
        Self { store, reporter }
    }

    /// Refresh every server. Servers run concurrently and share no state
    /// besides the store and reporter.
    pub async fn refresh_all(&self, servers: &[PoolServer]) -> Vec<SyncReport> {
        join_all(
            servers
                .iter()
                .map(|server| self.refresh(&server.id, &server.config)),
        )
        .await
    }

    /// Run one refresh cycle for a pool server.
    #[instrument(skip(self, config), fields(service_url = %config.service_url))]
    pub async fn refresh(&self, server_id: &str, config: &PoolServerConfig) -> SyncReport {
        info!(server_id = %server_id, "Starting pool server refresh");
        let mut report = SyncReport::begin(server_id);

        let status = match self.run_cycle(server_id, config, &mut report).await {
            Ok(()) => IntegrationStatus::Ok,
            Err(failure) => {
                error!(
                    server_id = %server_id,
                    status = failure.status,
                    error = %failure.error,
                    "Pool server refresh failed"
                );
                IntegrationStatus::error(failure.status)
            }
        };

        self.reporter.report(server_id, status.clone()).await;
        report.status = status;
        report.finished_at = Utc::now();

        info!(
            server_id = %server_id,
            status = %report.status,
            pools_created = report.pools.created,
            pools_updated = report.pools.updated,
            pools_removed = report.pools.removed,
            duration_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Pool server refresh finished"
        );
        report
    }

    async fn run_cycle(
        &self,
        server_id: &str,
        config: &PoolServerConfig,
        report: &mut SyncReport,
    ) -> Result<(), CycleFailure> {
        config
            .validate()
            .map_err(|e| at(STATUS_INVALID_CONFIG)(IpamError::from(e)))?;

        let client = IpamClient::new(config).map_err(at(STATUS_UNREACHABLE))?;
        client.probe().await.map_err(at(STATUS_UNREACHABLE))?;

        let credentials = Credentials::from_config(config);
        let session = Session::open(&client, &credentials)
            .await
            .map_err(at(STATUS_AUTH_FAILED))?;

        let result = self
            .sync_with_session(server_id, config, &client, &session, report)
            .await;
        session.close(&client).await;
        result
    }

    async fn sync_with_session(
        &self,
        server_id: &str,
        config: &PoolServerConfig,
        client: &IpamClient,
        session: &Session,
        report: &mut SyncReport,
    ) -> Result<(), CycleFailure> {
        client
            .list_page::<RemoteNetwork>(session, ResourceKind::Networks, &[], 1, 0)
            .await
            .map_err(at(STATUS_CALL_FAILED))?;

        self.reporter
            .report(server_id, IntegrationStatus::Syncing)
            .await;

        let limits = PageLimits {
            page_size: config.page_size,
            max_pages: config.max_pages,
        };

        let pools = self
            .sync_pools(server_id, client, session, limits, report)
            .await
            .map_err(at(STATUS_SYNC_FAILED))?;
        report.pools = pools;

        if config.inventory_existing {
            let summary = sync_addresses(
                client,
                session,
                self.store.as_ref(),
                server_id,
                limits,
                config.pool_group_size as usize,
            )
            .await
            .map_err(at(STATUS_SYNC_FAILED))?;
            report.addresses = Some(summary);
        }

        Ok(())
    }

    async fn sync_pools(
        &self,
        server_id: &str,
        client: &IpamClient,
        session: &Session,
        limits: PageLimits,
        report: &mut SyncReport,
    ) -> IpamResult<ReconcileOutcome> {
        let networks =
            fetch_all::<RemoteNetwork>(client, session, ResourceKind::Networks, &[], limits).await;

        if let Some(failure) = &networks.failure {
            warn!(
                server_id = %server_id,
                fetched = networks.items.len(),
                error = %failure,
                "Network listing incomplete, reconciling with partial results"
            );
            report.pool_fetch_partial = true;
        }

        reconcile_pools(self.store.as_ref(), server_id, &networks.items).await
    }
}
