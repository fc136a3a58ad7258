// src/feed/scheduler.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::feed::store::{SeenStore, StoreResult};
use crate::feed::{CycleError, FeedProcessor, WatcherContext};

/// Shared between the running scheduler and its handle.
struct Shared {
    refresh: Notify,
    last_success: RwLock<Option<DateTime<Utc>>>,
    available: AtomicBool,
}

/// External control surface for a running watcher: the two on-demand
/// triggers plus availability introspection.
#[derive(Clone)]
pub struct WatcherHandle {
    shared: Arc<Shared>,
    store: Arc<dyn SeenStore>,
}

impl WatcherHandle {
    /// Request an immediate out-of-band run. While a cycle is in flight the
    /// request coalesces into at most one pending follow-up run (`Notify`
    /// holds a single permit).
    pub fn refresh_now(&self) {
        self.shared.refresh.notify_one();
    }

    /// Clear the seen storage so previously delivered items are reprocessed.
    pub async fn reset_seen(&self) -> StoreResult<()> {
        self.store.reset().await
    }

    /// Timestamp of the last successful cycle, if any.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.shared.last_success.read().expect("last_success lock poisoned")
    }

    /// False after an auth failure or a non-transient cycle failure.
    /// Transient (502/503/504) failures do not flip this.
    pub fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::SeqCst)
    }
}

/// Drives the processor on a fixed interval and on explicit triggers.
/// Guarantees at most one cycle in flight: the run loop is the only caller.
/// Changing the interval means dropping the scheduler and building a new one.
pub struct PollScheduler {
    processor: FeedProcessor,
    interval: Duration,
    shared: Arc<Shared>,
}

impl PollScheduler {
    pub fn new(ctx: WatcherContext, interval: Duration) -> (Self, WatcherHandle) {
        let shared = Arc::new(Shared {
            refresh: Notify::new(),
            last_success: RwLock::new(None),
            available: AtomicBool::new(true),
        });
        let handle = WatcherHandle {
            shared: shared.clone(),
            store: ctx.store.clone(),
        };
        (
            Self {
                processor: FeedProcessor::new(ctx),
                interval,
                shared,
            },
            handle,
        )
    }

    /// Run until a fatal error. The first cycle fires immediately; afterwards
    /// cycles run on every tick or refresh request, strictly one at a time.
    pub async fn run(self) -> Result<(), CycleError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shared.refresh.notified() => {
                    tracing::debug!("on-demand refresh requested");
                }
            }

            match self.processor.run_cycle().await {
                Ok(report) => {
                    *self
                        .shared
                        .last_success
                        .write()
                        .expect("last_success lock poisoned") = Some(Utc::now());
                    self.shared.available.store(true, Ordering::SeqCst);
                    if report.emitted > 0 {
                        tracing::info!(emitted = report.emitted, "cycle emitted events");
                    }
                }
                Err(e) if e.is_fatal() => {
                    self.shared.available.store(false, Ordering::SeqCst);
                    tracing::error!(error = %e, "fatal failure, stopping watcher");
                    return Err(e);
                }
                Err(e) if e.is_transient() => {
                    // Deferred to the next scheduled cycle; availability and
                    // last-success timestamp stay untouched.
                    tracing::debug!(error = %e, "transient failure, will retry on next tick");
                }
                Err(e) => {
                    self.shared.available.store(false, Ordering::SeqCst);
                    tracing::warn!(error = %e, "cycle failed");
                }
            }
        }
    }
}
