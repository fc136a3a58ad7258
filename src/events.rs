// src/events.rs
// Event sink seam: the processor fires NewFeedEvent values here and never
// waits for acknowledgment.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::feed::types::{NewFeedEvent, EVENT_NEW_FEED_ITEM};

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Fire one event. Sinks absorb their own delivery problems; emission
    /// must never fail the processing cycle.
    async fn emit(&self, event: &NewFeedEvent);
}

/// Forwards events into an unbounded channel for in-process consumers.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<NewFeedEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NewFeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: &NewFeedEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::warn!(item_id = %event.item_id, "event receiver dropped, event discarded");
        }
    }
}

/// Structured-log sink, useful as the default consumer in the binary.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn emit(&self, event: &NewFeedEvent) {
        tracing::info!(
            target: "events",
            event_type = EVENT_NEW_FEED_ITEM,
            item_id = %event.item_id,
            kind = event.kind.as_str(),
            media_count = event.media_count,
            has_media = event.has_media,
            species = ?event.species,
            "new feed item"
        );
    }
}

/// Records every emitted event; the assertion surface for tests.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NewFeedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> Vec<NewFeedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn emitted_ids(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.item_id.clone())
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: &NewFeedEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
