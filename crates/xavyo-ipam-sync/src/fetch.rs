//! Paginated bulk fetch of remote collections.

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::client::{IpamClient, ResourceKind};
use crate::session::Session;

/// Page size used when fetching remote collections.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Pagination ceiling per listing.
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// Everything a listing returned, plus how it ended.
#[derive(Debug, Clone)]
pub struct FetchOutcome<T> {
    /// Items in the order the service returned them.
    pub items: Vec<T>,
    /// Requests issued.
    pub pages: u32,
    /// Set when a page request failed; `items` then holds the earlier pages.
    pub failure: Option<String>,
    /// Set when the pagination ceiling stopped the fetch.
    pub truncated: bool,
}

impl<T> FetchOutcome<T> {
    /// Whether the listing completed without a failed request.
    ///
    /// An empty but complete listing is a valid result.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Pagination settings for one listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Fetch a whole remote collection page by page.
///
/// Continues only while the service reports a next page and the last page was
/// non-empty; stops after `max_pages` requests. A failed request ends the
/// fetch and the items gathered so far are returned with `failure` set.
#[instrument(skip(client, session, filters), fields(kind = %kind))]
pub async fn fetch_all<T: DeserializeOwned>(
    client: &IpamClient,
    session: &Session,
    kind: ResourceKind,
    filters: &[(&str, String)],
    limits: PageLimits,
) -> FetchOutcome<T> {
    let mut outcome = FetchOutcome {
        items: Vec::new(),
        pages: 0,
        failure: None,
        truncated: false,
    };
    let mut offset: u64 = 0;

    loop {
        if outcome.pages >= limits.max_pages {
            warn!(
                pages = outcome.pages,
                fetched = outcome.items.len(),
                "Reached pagination ceiling, stopping fetch"
            );
            outcome.truncated = true;
            break;
        }

        outcome.pages += 1;
        let page = match client
            .list_page::<T>(session, kind, filters, limits.page_size, offset)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    offset,
                    fetched = outcome.items.len(),
                    error = %e,
                    "Listing failed, returning partial results"
                );
                outcome.failure = Some(e.to_string());
                break;
            }
        };

        let received = page.results.len();
        outcome.items.extend(page.results);
        debug!(offset, received, total = outcome.items.len(), "Fetched page");

        if page.next.is_none() || received == 0 {
            break;
        }
        // The service may cap a page below `limit`; continue from what arrived.
        offset += received as u64;
    }

    outcome
}
