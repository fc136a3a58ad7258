// src/remote/mock.rs
// Scriptable in-memory FeedService for tests (and offline demos).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::feed::types::{parse_feed_item, FeedItem, SightingDetail};
use crate::remote::{FeedService, RemoteError, RemoteResult};

/// Cloneable stand-in for [`RemoteError`] so tests can queue failures.
#[derive(Debug, Clone)]
pub enum ScriptedError {
    Auth,
    Transient(u16),
    ItemUnavailable,
    Protocol(String),
}

impl ScriptedError {
    fn into_remote(self, id: &str) -> RemoteError {
        match self {
            Self::Auth => RemoteError::Auth,
            Self::Transient(status) => RemoteError::Transient { status },
            Self::ItemUnavailable => RemoteError::ItemUnavailable { id: id.to_string() },
            Self::Protocol(msg) => RemoteError::Protocol(msg),
        }
    }
}

/// Scripted remote service. Queued failures are consumed one per call;
/// with an empty queue the call succeeds against the configured data.
#[derive(Default)]
pub struct MockFeedService {
    pub feed: Mutex<Vec<FeedItem>>,
    pub uncollected: Mutex<Vec<FeedItem>>,
    pub sightings: Mutex<HashMap<String, SightingDetail>>,

    pub auth_failures: Mutex<VecDeque<ScriptedError>>,
    pub feed_failures: Mutex<VecDeque<ScriptedError>>,
    pub sighting_failures: Mutex<VecDeque<ScriptedError>>,
    pub fail_mark_collected: AtomicBool,

    pub sighting_calls: Mutex<Vec<String>>,
    pub mark_collected_calls: Mutex<Vec<String>>,
}

impl MockFeedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_feed(&self, items: Vec<FeedItem>) {
        *self.feed.lock().unwrap() = items;
    }

    pub fn set_uncollected(&self, items: Vec<FeedItem>) {
        *self.uncollected.lock().unwrap() = items;
    }

    pub fn add_sighting(&self, id: &str, detail: SightingDetail) {
        self.sightings.lock().unwrap().insert(id.to_string(), detail);
    }

    pub fn push_sighting_failure(&self, err: ScriptedError) {
        self.sighting_failures.lock().unwrap().push_back(err);
    }

    pub fn sighting_call_count(&self) -> usize {
        self.sighting_calls.lock().unwrap().len()
    }
}

fn pop(queue: &Mutex<VecDeque<ScriptedError>>) -> Option<ScriptedError> {
    queue.lock().unwrap().pop_front()
}

#[async_trait]
impl FeedService for MockFeedService {
    async fn authenticate(&self) -> RemoteResult<()> {
        match pop(&self.auth_failures) {
            Some(e) => Err(e.into_remote("")),
            None => Ok(()),
        }
    }

    async fn fetch_feed(&self) -> RemoteResult<Vec<FeedItem>> {
        match pop(&self.feed_failures) {
            Some(e) => Err(e.into_remote("")),
            None => Ok(self.feed.lock().unwrap().clone()),
        }
    }

    async fn fetch_uncollected(&self) -> RemoteResult<Vec<FeedItem>> {
        Ok(self.uncollected.lock().unwrap().clone())
    }

    async fn fetch_sighting_detail(&self, item_id: &str) -> RemoteResult<SightingDetail> {
        self.sighting_calls.lock().unwrap().push(item_id.to_string());
        if let Some(e) = pop(&self.sighting_failures) {
            return Err(e.into_remote(item_id));
        }
        self.sightings
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or_else(|| RemoteError::ItemUnavailable {
                id: item_id.to_string(),
            })
    }

    async fn mark_collected(&self, item_id: &str, _detail: &SightingDetail) -> RemoteResult<()> {
        self.mark_collected_calls
            .lock()
            .unwrap()
            .push(item_id.to_string());
        if self.fail_mark_collected.load(Ordering::SeqCst) {
            return Err(RemoteError::Transient { status: 503 });
        }
        Ok(())
    }
}

// --- Test data helpers ---

/// A fresh (unenriched) postcard awaiting collection.
pub fn new_postcard(id: &str) -> FeedItem {
    parse_feed_item(&json!({
        "id": id,
        "__typename": "FeedItemNewPostcard",
        "createdAt": "2026-05-01T08:00:00Z",
        "medias": [],
    }))
    .expect("valid postcard fixture")
}

/// A collected postcard that already carries media in the feed response.
pub fn collected_postcard(id: &str, content_url: &str) -> FeedItem {
    parse_feed_item(&json!({
        "id": id,
        "__typename": "FeedItemCollectedPostcard",
        "createdAt": "2026-05-01T09:00:00Z",
        "medias": [
            { "id": format!("{id}-m0"), "__typename": "MediaImage", "contentUrl": content_url },
        ],
    }))
    .expect("valid collected fixture")
}

/// A sighting detail with one image and one identified species.
pub fn sighting_with_media(id: &str, content_url: &str, species: &str) -> SightingDetail {
    SightingDetail {
        media: vec![crate::feed::types::MediaRef {
            id: format!("{id}-s0"),
            content_url: Some(content_url.to_string()),
            thumbnail_url: None,
            is_video: false,
        }],
        species: vec![species.to_string()],
        raw: json!({ "sightingReport": { "reportToken": "tok" } }),
    }
}
