//! On-demand host record allocation.
//!
//! Reserves one address in the remote IPAM for a hostname, either at a
//! requested address or at the next free address of a pool's range, and
//! returns the resulting local address record.

use std::net::IpAddr;
use tracing::{debug, info, instrument, warn};

use crate::client::IpamClient;
use crate::error::{AllocationError, IpamError};
use crate::models::{AddressRecordRequest, IpType, LocalAddress, LocalPool, RemoteAddress};
use crate::session::{Credentials, Session};

/// Status given to every record this allocator writes.
pub const RESERVED_STATUS: &str = "reserved";

/// A host record allocation request.
#[derive(Debug, Clone, Copy)]
pub struct AllocationRequest<'a> {
    pub pool: &'a LocalPool,
    /// Address to reserve; `None` lets the service pick the next free one.
    pub requested_address: Option<&'a str>,
    /// Host name to record; `None` or empty leaves the DNS name blank.
    pub hostname: Option<&'a str>,
    pub domain_suffix: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Address(IpAddr),
    /// Next free address in the remote range with this id.
    NextFree(&'a str),
}

/// Append `suffix` to `hostname` unless it already ends with it.
/// An empty hostname stays empty.
#[must_use]
pub fn qualify_hostname(hostname: &str, suffix: Option<&str>) -> String {
    let hostname = hostname.trim().trim_end_matches('.');
    if hostname.is_empty() {
        return String::new();
    }
    let Some(suffix) = suffix.map(|s| s.trim_matches('.')).filter(|s| !s.is_empty()) else {
        return hostname.to_string();
    };
    if hostname == suffix || hostname.ends_with(&format!(".{suffix}")) {
        hostname.to_string()
    } else {
        format!("{hostname}.{suffix}")
    }
}

/// Reserve an address for a host.
///
/// A requested address is validated before any remote call. An existing
/// record at that address is replaced, otherwise a new one is created.
#[instrument(skip(client, credentials, request), fields(hostname = ?request.hostname))]
pub async fn allocate(
    client: &IpamClient,
    credentials: &Credentials,
    request: AllocationRequest<'_>,
) -> Result<LocalAddress, AllocationError> {
    let requested = request
        .requested_address
        .map(|raw| {
            raw.trim()
                .parse::<IpAddr>()
                .map_err(|_| AllocationError::InvalidAddress(raw.to_string()))
        })
        .transpose()?;

    let target = match requested {
        Some(ip) => Target::Address(ip),
        None => Target::NextFree(request.pool.external_id.as_deref().ok_or_else(|| {
            AllocationError::UpstreamFailure("pool has not been synced yet".to_string())
        })?),
    };
    let dns_name = request
        .hostname
        .map(|hostname| qualify_hostname(hostname, request.domain_suffix))
        .unwrap_or_default();

    let session = Session::open(client, credentials)
        .await
        .map_err(upstream)?;
    let result = reserve(client, &session, request.pool, target, &dns_name).await;
    session.close(client).await;

    let remote = result.map_err(|e| {
        warn!(error = %e, "Host record allocation failed");
        upstream(e)
    })?;

    let address = to_local(request.pool, &remote, dns_name);
    info!(
        external_id = ?address.external_id,
        ip_address = %address.ip_address,
        "Host record allocated"
    );
    Ok(address)
}

async fn reserve(
    client: &IpamClient,
    session: &Session,
    pool: &LocalPool,
    target: Target<'_>,
    dns_name: &str,
) -> Result<RemoteAddress, IpamError> {
    let ip = match target {
        Target::Address(ip) => ip,
        Target::NextFree(range_id) => {
            debug!(range_id, "Requesting next available address");
            let record = AddressRecordRequest {
                address: None,
                status: RESERVED_STATUS.to_string(),
                dns_name: dns_name.to_string(),
            };
            return client.allocate_next_address(session, range_id, &record).await;
        }
    };

    let address = match pool.prefix_len() {
        Some(len) => format!("{ip}/{len}"),
        None => ip.to_string(),
    };
    let record = AddressRecordRequest {
        address: Some(address),
        status: RESERVED_STATUS.to_string(),
        dns_name: dns_name.to_string(),
    };

    match client.find_address(session, &ip.to_string()).await? {
        Some(existing) => {
            debug!(id = existing.id, "Replacing existing address record");
            client.replace_address(session, existing.id, &record).await
        }
        None => {
            debug!(address = %ip, "Creating address record");
            client.create_address(session, &record).await
        }
    }
}

fn to_local(pool: &LocalPool, remote: &RemoteAddress, dns_name: String) -> LocalAddress {
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
        ip_type: IpType::Reserved,
        hostname: Some(dns_name).filter(|name| !name.is_empty()),
        parent_pool_id: pool.id,
        parent_range_id,
    }
}

fn upstream(error: IpamError) -> AllocationError {
    AllocationError::UpstreamFailure(error.to_string())
}
