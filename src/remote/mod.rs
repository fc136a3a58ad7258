// src/remote/mod.rs
pub mod client;
pub mod mock;

use async_trait::async_trait;

use crate::feed::types::{FeedItem, SightingDetail};

/// Transport statuses we treat as "try again next cycle / next attempt".
pub const TRANSIENT_STATUSES: [u16; 3] = [502, 503, 504];

/// Error taxonomy for the remote feed service.
///
/// Only `Auth` is fatal to the whole watcher. `Transient` is deferred to the
/// next scheduled cycle (or retried with backoff inside enrichment).
/// `ItemUnavailable` is an expected condition, not a failure: the postcard
/// has already been collected or expired on the remote side.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("authentication failed (invalid credentials)")]
    Auth,

    #[error("transient remote error (status {status})")]
    Transient { status: u16 },

    #[error("item {id} is no longer available for sighting lookup")]
    ItemUnavailable { id: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Classify an HTTP status: 502/503/504 are transient, 401/403 is an
    /// auth failure, anything else non-2xx is a protocol error.
    pub fn from_status(status: u16) -> Self {
        if TRANSIENT_STATUSES.contains(&status) {
            Self::Transient { status }
        } else if status == 401 || status == 403 {
            Self::Auth
        } else {
            Self::Protocol(format!("unexpected status {status}"))
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The remote feed service as the core depends on it. The production
/// implementation is [`client::BirdBuddyClient`]; tests script
/// [`mock::MockFeedService`].
#[async_trait]
pub trait FeedService: Send + Sync {
    /// Establish or refresh the session. `Auth` is fatal and non-retryable.
    async fn authenticate(&self) -> RemoteResult<()>;

    /// Recent activity, bounded window, newest first is NOT guaranteed.
    /// May return fewer items than requested.
    async fn fetch_feed(&self) -> RemoteResult<Vec<FeedItem>>;

    /// Items still awaiting collection. Authoritative source for
    /// "can still enrich via sighting lookup".
    async fn fetch_uncollected(&self) -> RemoteResult<Vec<FeedItem>>;

    /// Expensive secondary lookup: detailed media + species for one item.
    /// Only valid while the item is uncollected; returns
    /// [`RemoteError::ItemUnavailable`] once it has transitioned.
    async fn fetch_sighting_detail(&self, item_id: &str) -> RemoteResult<SightingDetail>;

    /// Commit an enrichment result back to the remote side. Best-effort:
    /// callers log and continue on failure.
    async fn mark_collected(&self, item_id: &str, detail: &SightingDetail) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(RemoteError::from_status(503).is_transient());
        assert!(RemoteError::from_status(504).is_transient());
        assert!(matches!(RemoteError::from_status(401), RemoteError::Auth));
        assert!(matches!(
            RemoteError::from_status(500),
            RemoteError::Protocol(_)
        ));
    }
}
