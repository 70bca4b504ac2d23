//! Integration status reporting for pool servers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Status shown on a pool server's integration status field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum IntegrationStatus {
    Syncing,
    Ok,
    Error(String),
}

impl IntegrationStatus {
    /// Create an error status.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl std::fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syncing => f.write_str("syncing"),
            Self::Ok => f.write_str("ok"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Receives status transitions for pool servers.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, server_id: &str, status: IntegrationStatus);
}

/// A recorded status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub server_id: String,
    pub status: IntegrationStatus,
    pub reported_at: DateTime<Utc>,
}

/// Keeps every reported transition in memory.
#[derive(Debug, Default)]
pub struct InMemoryStatusReporter {
    updates: RwLock<Vec<StatusUpdate>>,
}

impl InMemoryStatusReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses reported for one server, oldest first.
    pub async fn history(&self, server_id: &str) -> Vec<IntegrationStatus> {
        self.updates
            .read()
            .await
            .iter()
            .filter(|u| u.server_id == server_id)
            .map(|u| u.status.clone())
            .collect()
    }

    /// Most recent status for one server.
    pub async fn latest(&self, server_id: &str) -> Option<IntegrationStatus> {
        self.history(server_id).await.pop()
    }
}

#[async_trait]
impl StatusReporter for InMemoryStatusReporter {
    async fn report(&self, server_id: &str, status: IntegrationStatus) {
        self.updates.write().await.push(StatusUpdate {
            server_id: server_id.to_string(),
            status,
            reported_at: Utc::now(),
        });
    }
}
