// src/feed/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Feed event type fired for every newly discovered item.
pub const EVENT_NEW_FEED_ITEM: &str = "new_feed_item";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedItemKind {
    NewPostcard,
    CollectedPostcard,
    Other,
}

impl FeedItemKind {
    pub fn from_typename(t: &str) -> Self {
        match t {
            "FeedItemNewPostcard" => Self::NewPostcard,
            "FeedItemCollectedPostcard" => Self::CollectedPostcard,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewPostcard => "new_postcard",
            Self::CollectedPostcard => "collected_postcard",
            Self::Other => "other",
        }
    }
}

/// One media attachment resolved from the image/video sum-type.
/// Invariant: at least one of `content_url` / `thumbnail_url` is present;
/// the boundary parser drops attachments violating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub id: String,
    pub content_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_video: bool,
}

impl MediaRef {
    /// Preferred URL for display: full content if we have it, thumbnail otherwise.
    pub fn best_url(&self) -> Option<&str> {
        self.content_url
            .as_deref()
            .or(self.thumbnail_url.as_deref())
    }
}

/// One unit of activity from the remote feed. Constructed fresh on every
/// poll by [`parse_feed_item`]; only its `id` is ever persisted.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub id: String,
    pub kind: FeedItemKind,
    pub created_at: Option<DateTime<Utc>>,
    pub media: Vec<MediaRef>,
    /// Species names already attached by enrichment (empty until resolved).
    pub species: Vec<String>,
    /// Raw node as received, kept for the forward-compatible `item_data`
    /// payload on the emitted event.
    pub raw: Value,
}

impl FeedItem {
    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }
}

/// Result of the expensive sighting lookup for one uncollected postcard.
#[derive(Debug, Clone, Default)]
pub struct SightingDetail {
    pub media: Vec<MediaRef>,
    pub species: Vec<String>,
    /// Full sighting report, handed back verbatim to `mark_collected`.
    pub raw: Value,
}

/// The emitted notification payload. Immutable once constructed;
/// emission is fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeedEvent {
    pub item_id: String,
    pub kind: FeedItemKind,
    pub created_at: Option<DateTime<Utc>>,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub media_count: usize,
    pub media_urls: Vec<String>,
    pub species: Vec<String>,
    pub has_media: bool,
    pub item_data: Value,
}

impl NewFeedEvent {
    pub fn from_item(item: &FeedItem) -> Self {
        let best = item.media.first();
        Self {
            item_id: item.id.clone(),
            kind: item.kind,
            created_at: item.created_at,
            media_url: best.and_then(|m| m.best_url().map(str::to_string)),
            thumbnail_url: best.and_then(|m| m.thumbnail_url.clone()),
            media_count: item.media.len(),
            media_urls: item
                .media
                .iter()
                .filter_map(|m| m.best_url().map(str::to_string))
                .collect(),
            species: item.species.clone(),
            has_media: !item.media.is_empty(),
            item_data: item.raw.clone(),
        }
    }
}

/// Strict boundary parser: turns one raw feed node into a [`FeedItem`].
/// Returns `None` for malformed entries (most importantly: missing id),
/// which are dropped at ingestion instead of handled ad hoc downstream.
pub fn parse_feed_item(node: &Value) -> Option<FeedItem> {
    let id = node.get("id")?.as_str()?.trim();
    if id.is_empty() {
        return None;
    }

    let kind = node
        .get("__typename")
        .and_then(Value::as_str)
        .map(FeedItemKind::from_typename)
        .unwrap_or(FeedItemKind::Other);

    let created_at = node
        .get("createdAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let media = node
        .get("medias")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(parse_media_ref).collect())
        .unwrap_or_default();

    Some(FeedItem {
        id: id.to_string(),
        kind,
        created_at,
        media,
        species: Vec::new(),
        raw: node.clone(),
    })
}

/// Parse one attachment of the media sum-type. Drops entries that carry
/// neither a content URL nor a thumbnail.
pub fn parse_media_ref(node: &Value) -> Option<MediaRef> {
    let id = node.get("id")?.as_str()?.to_string();
    let is_video = node
        .get("__typename")
        .and_then(Value::as_str)
        .map(|t| t == "MediaVideo")
        .unwrap_or(false);
    let content_url = node
        .get("contentUrl")
        .and_then(Value::as_str)
        .map(str::to_string);
    let thumbnail_url = node
        .get("thumbnailUrl")
        .and_then(Value::as_str)
        .map(str::to_string);

    if content_url.is_none() && thumbnail_url.is_none() {
        return None;
    }

    Some(MediaRef {
        id,
        content_url,
        thumbnail_url,
        is_video,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_without_id_is_rejected() {
        assert!(parse_feed_item(&json!({ "__typename": "FeedItemNewPostcard" })).is_none());
        assert!(parse_feed_item(&json!({ "id": "  " })).is_none());
        assert!(parse_feed_item(&json!("just-a-string")).is_none());
    }

    #[test]
    fn typename_maps_to_kind() {
        let it = parse_feed_item(&json!({
            "id": "f1",
            "__typename": "FeedItemCollectedPostcard",
        }))
        .unwrap();
        assert_eq!(it.kind, FeedItemKind::CollectedPostcard);

        let other = parse_feed_item(&json!({ "id": "f2", "__typename": "FeedItemMystery" })).unwrap();
        assert_eq!(other.kind, FeedItemKind::Other);
    }

    #[test]
    fn media_without_any_url_is_dropped() {
        let it = parse_feed_item(&json!({
            "id": "f1",
            "__typename": "FeedItemCollectedPostcard",
            "medias": [
                { "id": "m1", "__typename": "MediaImage", "contentUrl": "https://x/a.jpg" },
                { "id": "m2", "__typename": "MediaVideo" },
                { "id": "m3", "__typename": "MediaVideo", "thumbnailUrl": "https://x/b.jpg" },
            ],
        }))
        .unwrap();
        assert_eq!(it.media.len(), 2);
        assert!(it.media[1].is_video);
        assert_eq!(it.media[1].best_url(), Some("https://x/b.jpg"));
    }

    #[test]
    fn event_payload_picks_best_media() {
        let it = parse_feed_item(&json!({
            "id": "f1",
            "__typename": "FeedItemNewPostcard",
            "createdAt": "2026-05-01T10:00:00Z",
            "medias": [
                { "id": "m1", "__typename": "MediaVideo", "thumbnailUrl": "https://x/t.jpg" },
                { "id": "m2", "__typename": "MediaImage", "contentUrl": "https://x/c.jpg" },
            ],
        }))
        .unwrap();
        let ev = NewFeedEvent::from_item(&it);
        assert_eq!(ev.media_count, 2);
        assert!(ev.has_media);
        // First attachment wins, falling back to its thumbnail.
        assert_eq!(ev.media_url.as_deref(), Some("https://x/t.jpg"));
        assert_eq!(ev.media_urls.len(), 2);
        assert!(ev.created_at.is_some());
    }
}
