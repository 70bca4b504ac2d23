//! Remote (IPAM service) and local (inventory) record types.

use serde::{Deserialize, Deserializer, Serialize};
use std::net::IpAddr;

// ── Remote wire types ─────────────────────────────────────────────────

/// One page of a listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: Option<u64>,
    /// URL of the next page, absent on the last one.
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Address family of a remote network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Map the numeric family used by the service.
    #[must_use]
    pub fn from_version(version: u64) -> Option<Self> {
        match version {
            4 => Some(Self::V4),
            6 => Some(Self::V6),
            _ => None,
        }
    }
}

/// An IP range as the service exposes it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteNetwork {
    pub id: u64,
    #[serde(alias = "display", default)]
    pub display_name: String,
    pub start_address: String,
    pub end_address: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "family", alias = "address_family", deserialize_with = "deserialize_family")]
    pub address_family: AddressFamily,
}

/// An individual IP record as the service exposes it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteAddress {
    pub id: u64,
    pub address: String,
    #[serde(default, deserialize_with = "deserialize_status")]
    pub status: Option<String>,
    #[serde(default)]
    pub dns_name: Option<String>,
}

impl RemoteAddress {
    /// Address with any prefix length removed.
    #[must_use]
    pub fn bare_address(&self) -> &str {
        strip_prefix_len(&self.address)
    }
}

/// Body sent when creating or replacing an address record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AddressRecordRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub status: String,
    pub dns_name: String,
}

/// Values the service uses either bare or wrapped as `{"value": .., "label": ..}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Choice<T> {
    Bare(T),
    Labelled { value: T },
}

impl<T> Choice<T> {
    fn into_value(self) -> T {
        match self {
            Self::Bare(v) | Self::Labelled { value: v } => v,
        }
    }
}

fn deserialize_family<'de, D>(deserializer: D) -> Result<AddressFamily, D::Error>
where
    D: Deserializer<'de>,
{
    let version = Choice::<u64>::deserialize(deserializer)?.into_value();
    AddressFamily::from_version(version).ok_or_else(|| {
        serde::de::Error::custom(format!("unsupported address family: {version}"))
    })
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Choice<String>>::deserialize(deserializer)?.map(Choice::into_value))
}

// ── Local inventory types ─────────────────────────────────────────────

/// Pool address family in the local inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    V4,
    V6,
}

impl From<AddressFamily> for PoolType {
    fn from(family: AddressFamily) -> Self {
        match family {
            AddressFamily::V4 => Self::V4,
            AddressFamily::V6 => Self::V6,
        }
    }
}

/// Start/end pair of a pool range, keyed by family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeBounds {
    V4 {
        #[serde(rename = "startAddress")]
        start_address: String,
        #[serde(rename = "endAddress")]
        end_address: String,
    },
    V6 {
        #[serde(rename = "startIPv6")]
        start_ipv6: String,
        #[serde(rename = "endIPv6")]
        end_ipv6: String,
    },
}

impl RangeBounds {
    /// Build bounds for the given pool type.
    pub fn new(pool_type: PoolType, start: impl Into<String>, end: impl Into<String>) -> Self {
        match pool_type {
            PoolType::V4 => Self::V4 {
                start_address: start.into(),
                end_address: end.into(),
            },
            PoolType::V6 => Self::V6 {
                start_ipv6: start.into(),
                end_ipv6: end.into(),
            },
        }
    }

    #[must_use]
    pub fn start(&self) -> &str {
        match self {
            Self::V4 { start_address, .. } => start_address,
            Self::V6 { start_ipv6, .. } => start_ipv6,
        }
    }

    #[must_use]
    pub fn end(&self) -> &str {
        match self {
            Self::V4 { end_address, .. } => end_address,
            Self::V6 { end_ipv6, .. } => end_ipv6,
        }
    }

    /// Whether `address` lies between start and end, inclusive.
    ///
    /// Unparseable bounds or mixed families never contain anything.
    #[must_use]
    pub fn contains(&self, address: &IpAddr) -> bool {
        let (Ok(start), Ok(end)) = (
            self.start().parse::<IpAddr>(),
            self.end().parse::<IpAddr>(),
        ) else {
            return false;
        };
        match (start, end, address) {
            (IpAddr::V4(s), IpAddr::V4(e), IpAddr::V4(a)) => s <= *a && *a <= e,
            (IpAddr::V6(s), IpAddr::V6(e), IpAddr::V6(a)) => s <= *a && *a <= e,
            _ => false,
        }
    }
}

/// A range record attached to a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRange {
    /// Assigned by the store on create.
    pub id: Option<u64>,
    #[serde(flatten)]
    pub bounds: RangeBounds,
}

/// A network pool mirrored from the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPool {
    /// Assigned by the store on create.
    pub id: Option<u64>,
    pub external_id: Option<String>,
    pub display_name: String,
    pub cidr: String,
    #[serde(rename = "type")]
    pub pool_type: PoolType,
    pub ranges: Vec<PoolRange>,
    pub ip_free_count: u64,
    pub ip_count: u64,
    pub parent_server_id: String,
}

impl LocalPool {
    /// The range containing `address`, if any.
    #[must_use]
    pub fn range_containing(&self, address: &IpAddr) -> Option<&PoolRange> {
        self.ranges.iter().find(|r| r.bounds.contains(address))
    }

    /// Identity projection; `None` until the store has assigned an id.
    #[must_use]
    pub fn identity(&self) -> Option<PoolIdentity> {
        self.id.map(|id| PoolIdentity {
            id,
            external_id: self.external_id.clone(),
        })
    }

    /// Prefix length carried by `cidr`, if any.
    #[must_use]
    pub fn prefix_len(&self) -> Option<&str> {
        self.cidr.split_once('/').map(|(_, len)| len)
    }
}

/// Identity projection of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolIdentity {
    pub id: u64,
    pub external_id: Option<String>,
}

/// How an address is used, derived from the remote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpType {
    Reserved,
    Assigned,
    Unmanaged,
    Used,
}

impl IpType {
    /// Project a remote status onto a local address type.
    ///
    /// First match wins: "reserved", then "deprecated", then absent/empty,
    /// then anything else.
    #[must_use]
    pub fn from_status(status: Option<&str>) -> Self {
        match status.map(str::trim) {
            Some(s) if s.contains("reserved") => Self::Reserved,
            Some(s) if s.contains("deprecated") => Self::Unmanaged,
            None | Some("") => Self::Used,
            Some(_) => Self::Assigned,
        }
    }
}

/// An individual IP record mirrored into the local inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAddress {
    /// Assigned by the store on create.
    pub id: Option<u64>,
    pub external_id: Option<String>,
    pub ip_address: String,
    pub ip_type: IpType,
    pub hostname: Option<String>,
    pub parent_pool_id: Option<u64>,
    pub parent_range_id: Option<u64>,
}

/// Identity projection of an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressIdentity {
    pub id: u64,
    pub external_id: Option<String>,
    pub ip_address: Option<String>,
}

/// Remove a trailing `/len` from an address.
#[must_use]
pub fn strip_prefix_len(address: &str) -> &str {
    address.split_once('/').map_or(address, |(addr, _)| addr)
}
