//! birdwatch — Binary Entrypoint
//! Loads the account config, builds the remote client and runs the poll
//! scheduler until shutdown, logging every new feed item through the
//! tracing sink.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use birdwatch::config::AccountConfig;
use birdwatch::{BirdBuddyClient, JsonSeenStore, PollScheduler, TracingSink, WatcherContext};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("birdwatch=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AccountConfig::load_default()?;
    tracing::info!(
        email = %cfg.email,
        interval_secs = cfg.poll_interval().as_secs(),
        "starting watcher"
    );

    let ctx = WatcherContext {
        service: Arc::new(BirdBuddyClient::new(
            cfg.email.clone(),
            cfg.password.clone(),
            cfg.locale.clone(),
        )),
        store: Arc::new(JsonSeenStore::new(&cfg.seen_path)),
        sink: Arc::new(TracingSink),
    };
    let (scheduler, handle) = PollScheduler::new(ctx, cfg.poll_interval());

    tokio::select! {
        res = scheduler.run() => {
            // Only a fatal (auth) failure ends the run loop.
            res?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(available = handle.is_available(), "shutting down");
        }
    }
    Ok(())
}
