// src/feed/mod.rs
pub mod enrich;
pub mod scheduler;
pub mod store;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::events::EventSink;
use crate::feed::enrich::{EnrichmentOutcome, EnrichmentResolver};
use crate::feed::store::{SeenStore, StoreError};
use crate::feed::types::{FeedItem, NewFeedEvent};
use crate::remote::{FeedService, RemoteError};

/// One-time metrics registration (so series show up on exporters).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_cycles_total", "Processing cycles started.");
        describe_counter!("feed_cycles_failed_total", "Cycles aborted by a remote failure.");
        describe_counter!("feed_items_candidates_total", "Candidate items across both sources.");
        describe_counter!("feed_events_emitted_total", "New-item events fired.");
        describe_counter!(
            "feed_commit_failures_total",
            "Seen-set commits that failed (items may be re-emitted)."
        );
        describe_counter!("feed_items_rejected_total", "Feed nodes dropped by the parser.");
        describe_counter!("enrich_attempts_total", "Sighting lookups attempted.");
        describe_counter!("enrich_retries_total", "Sighting lookups retried after 502/503/504.");
        describe_counter!("enrich_unavailable_total", "Sightings no longer available.");
        describe_counter!("remote_requests_total", "GraphQL requests sent.");
        describe_counter!("remote_errors_total", "GraphQL requests failed.");
        describe_gauge!("feed_last_cycle_ts", "Unix ts when a cycle last completed.");
    });
}

/// Why a cycle stopped early. Only `Auth` tears the watcher down;
/// `Transient` is retried on the next scheduled tick without flipping
/// availability; anything else marks the run failed but the schedule
/// continues.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("fatal auth failure: {0}")]
    Auth(#[source] RemoteError),

    #[error("transient remote failure, deferring to next cycle: {0}")]
    Transient(#[source] RemoteError),

    #[error("remote failure: {0}")]
    Remote(#[source] RemoteError),

    #[error("seen-set load failed: {0}")]
    Store(#[from] StoreError),
}

impl From<RemoteError> for CycleError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Auth => Self::Auth(RemoteError::Auth),
            RemoteError::Transient { .. } => Self::Transient(e),
            other => Self::Remote(other),
        }
    }
}

impl CycleError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// What one cycle did, for logging and tests.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub candidates: usize,
    pub new_items: usize,
    pub emitted: usize,
    /// False when the seen-set commit failed; already-fired events stand and
    /// the next cycle may re-emit (designed at-least-once trade-off).
    pub committed: bool,
}

/// Everything one watcher instance needs. An explicit context value, not a
/// singleton: multiple accounts run independent processors concurrently.
#[derive(Clone)]
pub struct WatcherContext {
    pub service: Arc<dyn FeedService>,
    pub store: Arc<dyn SeenStore>,
    pub sink: Arc<dyn EventSink>,
}

/// The orchestrating state machine: authenticate, fetch both sources, split
/// candidates against the seen-set, enrich new items, emit, then commit the
/// union. Emission strictly precedes commit so a crash mid-cycle can only
/// cause re-emission, never loss.
pub struct FeedProcessor {
    ctx: WatcherContext,
    resolver: EnrichmentResolver,
}

impl FeedProcessor {
    pub fn new(ctx: WatcherContext) -> Self {
        Self {
            ctx,
            resolver: EnrichmentResolver::default(),
        }
    }

    /// Run one full poll-process-emit cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        ensure_metrics_described();
        counter!("feed_cycles_total").increment(1);

        let svc = self.ctx.service.as_ref();

        svc.authenticate().await.map_err(|e| {
            counter!("feed_cycles_failed_total").increment(1);
            CycleError::from(e)
        })?;

        let (candidates, uncollected_ids) = self.fetch_candidates(svc).await.map_err(|e| {
            counter!("feed_cycles_failed_total").increment(1);
            e
        })?;
        counter!("feed_items_candidates_total").increment(candidates.len() as u64);

        let seen = self.ctx.store.load().await.map_err(|e| {
            counter!("feed_cycles_failed_total").increment(1);
            CycleError::Store(e)
        })?;

        // Every candidate id joins the pending accumulator, new or not, so a
        // partially-processed item is never retried as new later.
        let mut pending: HashSet<String> = HashSet::with_capacity(candidates.len());
        let mut report = CycleReport {
            candidates: candidates.len(),
            committed: true,
            ..Default::default()
        };

        for mut item in candidates {
            pending.insert(item.id.clone());
            if seen.contains(&item.id) {
                continue;
            }
            report.new_items += 1;

            self.enrich(svc, &mut item, &uncollected_ids).await;

            let event = NewFeedEvent::from_item(&item);
            tracing::info!(
                item_id = %item.id,
                kind = item.kind.as_str(),
                media_count = event.media_count,
                "new feed item"
            );
            self.ctx.sink.emit(&event).await;
            counter!("feed_events_emitted_total").increment(1);
            report.emitted += 1;
        }

        // Emit-then-commit: the union write is the last step of the cycle.
        let union: HashSet<String> = seen.union(&pending).cloned().collect();
        if let Err(e) = self.ctx.store.commit(&union).await {
            counter!("feed_commit_failures_total").increment(1);
            tracing::warn!(error = %e, "seen-set commit failed; items may be re-emitted next cycle");
            report.committed = false;
        }

        gauge!("feed_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::debug!(
            candidates = report.candidates,
            new = report.new_items,
            emitted = report.emitted,
            committed = report.committed,
            "cycle finished"
        );
        Ok(report)
    }

    /// Fetch both sources and union them by id in arrival order. Collected
    /// items arrive only via the feed; enrichable ones via the uncollected
    /// list, possibly before the feed window picks them up.
    async fn fetch_candidates(
        &self,
        svc: &dyn FeedService,
    ) -> Result<(Vec<FeedItem>, HashSet<String>), CycleError> {
        let feed = svc.fetch_feed().await?;
        let uncollected = svc.fetch_uncollected().await?;

        let uncollected_ids: HashSet<String> =
            uncollected.iter().map(|i| i.id.clone()).collect();

        let mut by_id: HashSet<String> = HashSet::new();
        let mut candidates = Vec::with_capacity(feed.len() + uncollected.len());
        for item in feed.into_iter().chain(uncollected) {
            if by_id.insert(item.id.clone()) {
                candidates.push(item);
            }
        }
        Ok((candidates, uncollected_ids))
    }

    /// Step 5b/5c: sighting lookup for media-less uncollected items, then a
    /// best-effort mark-collected. Nothing here ever aborts the cycle.
    async fn enrich(&self, svc: &dyn FeedService, item: &mut FeedItem, uncollected: &HashSet<String>) {
        let is_uncollected = uncollected.contains(&item.id);
        match self.resolver.resolve(svc, item, is_uncollected).await {
            Ok(EnrichmentOutcome::Enriched(detail)) => {
                item.media = detail.media.clone();
                item.species = detail.species.clone();
                if let Err(e) = svc.mark_collected(&item.id, &detail).await {
                    tracing::warn!(item_id = %item.id, error = %e, "mark_collected failed (best-effort)");
                }
            }
            Ok(EnrichmentOutcome::NotAvailable) => {}
            Err(e) => {
                tracing::warn!(item_id = %item.id, error = %e, "enrichment failed, emitting without media");
            }
        }
    }
}
