// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod events;
pub mod feed;
pub mod remote;

// ---- Re-exports for stable public API ----
pub use crate::events::{ChannelSink, EventSink, RecordingSink, TracingSink};
pub use crate::feed::scheduler::{PollScheduler, WatcherHandle};
pub use crate::feed::store::{JsonSeenStore, MemorySeenStore, SeenStore};
pub use crate::feed::types::{FeedItem, FeedItemKind, MediaRef, NewFeedEvent};
pub use crate::feed::{CycleError, CycleReport, FeedProcessor, WatcherContext};
pub use crate::remote::{client::BirdBuddyClient, FeedService, RemoteError};
