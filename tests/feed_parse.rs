// tests/feed_parse.rs
// Boundary parsing against a realistic batched feed response.

use birdwatch::feed::types::{parse_feed_item, FeedItemKind};
use serde_json::Value;

fn fixture_nodes() -> Vec<Value> {
    let body: Value =
        serde_json::from_str(include_str!("fixtures/feed_response.json")).expect("valid fixture");
    body.pointer("/data/me/feed/edges")
        .and_then(Value::as_array)
        .expect("edges array")
        .iter()
        .filter_map(|e| e.get("node").cloned())
        .collect()
}

#[test]
fn nodes_without_id_are_dropped_the_rest_parse() {
    let nodes = fixture_nodes();
    assert_eq!(nodes.len(), 4);

    let items: Vec<_> = nodes.iter().filter_map(parse_feed_item).collect();
    // The fourth node carries no id and must contribute nothing.
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| !i.id.is_empty()));
}

#[test]
fn kinds_and_media_come_through_the_sum_type() {
    let items: Vec<_> = fixture_nodes().iter().filter_map(parse_feed_item).collect();

    let collected = &items[0];
    assert_eq!(collected.kind, FeedItemKind::CollectedPostcard);
    assert_eq!(collected.media.len(), 2);
    assert!(!collected.media[0].is_video);
    assert_eq!(
        collected.media[0].content_url.as_deref(),
        Some("https://media.example/full/91aa.jpg")
    );
    // The video exposes only a thumbnail; the invariant still holds.
    assert!(collected.media[1].is_video);
    assert!(collected.media[1].content_url.is_none());
    assert_eq!(
        collected.media[1].best_url(),
        Some("https://media.example/thumbs/91ab.jpg")
    );

    let fresh = &items[1];
    assert_eq!(fresh.kind, FeedItemKind::NewPostcard);
    assert!(!fresh.has_media());
    assert!(fresh.created_at.is_some());

    // Unknown typenames are kept as Other, not rejected.
    assert_eq!(items[2].kind, FeedItemKind::Other);
}
