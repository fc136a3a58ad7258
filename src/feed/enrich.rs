// src/feed/enrich.rs
use std::time::Duration;

use metrics::counter;

use crate::feed::types::{FeedItem, SightingDetail};
use crate::remote::{FeedService, RemoteError};

/// Outcome of a resolution attempt. `NotAvailable` covers every expected
/// "nothing to enrich" condition: item already carries media, item is not in
/// the uncollected subset, or the remote reports it has transitioned.
#[derive(Debug)]
pub enum EnrichmentOutcome {
    Enriched(SightingDetail),
    NotAvailable,
}

/// Resolves missing media/species for one item via the sighting lookup,
/// retrying with exponential backoff on transient remote errors only.
#[derive(Debug, Clone)]
pub struct EnrichmentResolver {
    base_delay: Duration,
    max_attempts: u32,
}

impl Default for EnrichmentResolver {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 3,
        }
    }
}

impl EnrichmentResolver {
    #[cfg(test)]
    pub fn with_backoff(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Resolve enrichment for `item`. Transport-level errors other than the
    /// transient statuses abort enrichment for this item and are returned to
    /// the caller, which proceeds without media.
    pub async fn resolve(
        &self,
        service: &dyn FeedService,
        item: &FeedItem,
        is_uncollected: bool,
    ) -> Result<EnrichmentOutcome, RemoteError> {
        if item.has_media() || !is_uncollected {
            return Ok(EnrichmentOutcome::NotAvailable);
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            counter!("enrich_attempts_total").increment(1);

            match service.fetch_sighting_detail(&item.id).await {
                Ok(detail) => return Ok(EnrichmentOutcome::Enriched(detail)),
                Err(RemoteError::ItemUnavailable { id }) => {
                    counter!("enrich_unavailable_total").increment(1);
                    tracing::debug!(item_id = %id, "sighting no longer available");
                    return Ok(EnrichmentOutcome::NotAvailable);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.base_delay * 2u32.pow(attempt - 1);
                    counter!("enrich_retries_total").increment(1);
                    tracing::warn!(
                        item_id = %item.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient sighting error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::{new_postcard, sighting_with_media, MockFeedService, ScriptedError};

    fn resolver() -> EnrichmentResolver {
        EnrichmentResolver::with_backoff(Duration::from_millis(10), 3)
    }

    #[tokio::test(start_paused = true)]
    async fn item_with_media_is_not_looked_up() {
        let svc = MockFeedService::new();
        let item = crate::remote::mock::collected_postcard("c1", "https://x/c.jpg");
        let out = resolver().resolve(&svc, &item, true).await.unwrap();
        assert!(matches!(out, EnrichmentOutcome::NotAvailable));
        assert_eq!(svc.sighting_call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_until_success() {
        let svc = MockFeedService::new();
        svc.push_sighting_failure(ScriptedError::Transient(503));
        svc.push_sighting_failure(ScriptedError::Transient(502));
        svc.add_sighting("p1", sighting_with_media("p1", "https://x/img.jpg", "Blue Tit"));

        let out = resolver()
            .resolve(&svc, &new_postcard("p1"), true)
            .await
            .unwrap();
        match out {
            EnrichmentOutcome::Enriched(detail) => {
                assert_eq!(detail.species, vec!["Blue Tit".to_string()]);
            }
            other => panic!("expected enriched, got {other:?}"),
        }
        assert_eq!(svc.sighting_call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_exhaust_after_max_attempts() {
        let svc = MockFeedService::new();
        for _ in 0..5 {
            svc.push_sighting_failure(ScriptedError::Transient(504));
        }
        let err = resolver()
            .resolve(&svc, &new_postcard("p1"), true)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(svc.sighting_call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_error_aborts_without_retry() {
        let svc = MockFeedService::new();
        svc.push_sighting_failure(ScriptedError::Protocol("boom".into()));
        let err = resolver()
            .resolve(&svc, &new_postcard("p1"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Protocol(_)));
        assert_eq!(svc.sighting_call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn already_collected_elsewhere_is_not_an_error() {
        let svc = MockFeedService::new();
        // No sighting configured for the id -> mock reports ItemUnavailable.
        let out = resolver()
            .resolve(&svc, &new_postcard("p1"), true)
            .await
            .unwrap();
        assert!(matches!(out, EnrichmentOutcome::NotAvailable));
    }
}
