//! IPAM pool server synchronization.
//!
//! Mirrors the IP ranges and address records of a remote IPAM service into a
//! local inventory:
//!
//! - [`orchestrator`] runs a refresh cycle per pool server (probe, session,
//!   test call, network and address reconciliation, status reporting)
//! - [`fetch`] walks paginated listings with a page ceiling
//! - [`reconciler`] diffs remote collections against local identities and
//!   batches creates, saves and removals through [`store::IpamStore`]
//! - [`allocator`] reserves single host records on demand

pub mod allocator;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod orchestrator;
pub mod reconciler;
pub mod session;
pub mod status;
pub mod store;
pub mod throttle;

pub use allocator::{allocate, AllocationRequest};
pub use client::{IpamClient, ResourceKind};
pub use config::PoolServerConfig;
pub use error::{AllocationError, IpamError, IpamResult, StoreError, ValidationErrors};
pub use fetch::{fetch_all, FetchOutcome, PageLimits};
pub use orchestrator::{PoolServer, PoolServerOrchestrator, SyncReport};
pub use reconciler::ReconcileOutcome;
pub use session::{Credentials, Session};
pub use status::{IntegrationStatus, StatusReporter};
pub use store::{InMemoryIpamStore, IpamStore};
