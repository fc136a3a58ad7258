// src/remote/client.rs
use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::feed::types::{parse_feed_item, parse_media_ref, FeedItem, SightingDetail};
use crate::remote::{FeedService, RemoteError, RemoteResult};

const DEFAULT_GRAPHQL_URL: &str = "https://graphql.birdbuddy.com/graphql";

/// Feed edges requested per poll. The remote may return fewer.
const FEED_PAGE_SIZE: u32 = 50;

/// One batched query: up to 50 most recent feed edges with type-discriminated
/// postcard fragments, media resolved through the image/video sum-type.
const FEED_QUERY: &str = r#"
query Feed($first: Int!) {
  me {
    feed(first: $first) {
      edges {
        node {
          __typename
          id
          createdAt
          ... on FeedItemNewPostcard {
            medias { ...MediaFields }
          }
          ... on FeedItemCollectedPostcard {
            medias { ...MediaFields }
          }
        }
      }
    }
  }
}
fragment MediaFields on Media {
  __typename
  id
  thumbnailUrl
  ... on MediaImage { contentUrl(size: ORIGINAL) }
  ... on MediaVideo { contentUrl }
}
"#;

const UNCOLLECTED_QUERY: &str = r#"
query UncollectedPostcards {
  me {
    uncollectedPostcards {
      __typename
      id
      createdAt
    }
  }
}
"#;

const SIGN_IN_MUTATION: &str = r#"
mutation SignIn($email: String!, $password: String!, $locale: String) {
  authEmailSignIn(emailSignInInput: { email: $email, password: $password, locale: $locale }) {
    accessToken
  }
}
"#;

const SIGHTING_FROM_POSTCARD_MUTATION: &str = r#"
mutation SightingFromPostcard($feedItemId: ID!) {
  sightingCreateFromPostcard(sightingCreateFromPostcardInput: { feedItemId: $feedItemId }) {
    sightingReport {
      reportToken
      sightings { __typename species { name } }
    }
    medias {
      __typename
      id
      thumbnailUrl
      contentUrl
    }
  }
}
"#;

const FINISH_POSTCARD_MUTATION: &str = r#"
mutation FinishPostcard($feedItemId: ID!, $reportToken: String) {
  sightingReportPostcardFinish(sightingReportPostcardFinishInput: {
    feedItemId: $feedItemId, reportToken: $reportToken
  }) {
    success
  }
}
"#;

/// Reqwest-backed implementation of [`FeedService`]. One instance per
/// configured account; holds the session token behind an `RwLock` so cycles
/// can refresh it without external locking.
pub struct BirdBuddyClient {
    http: Client,
    url: String,
    email: String,
    password: String,
    locale: String,
    access_token: RwLock<Option<String>>,
}

impl BirdBuddyClient {
    pub fn new(email: String, password: String, locale: String) -> Self {
        Self::with_url(DEFAULT_GRAPHQL_URL.to_string(), email, password, locale)
    }

    /// Point the client at a non-default endpoint (local stub servers in tests).
    pub fn with_url(url: String, email: String, password: String, locale: String) -> Self {
        Self {
            http: Client::new(),
            url,
            email,
            password,
            locale,
            access_token: RwLock::new(None),
        }
    }

    /// Send one GraphQL request and classify the outcome per the error
    /// taxonomy. Returns the `data` value on success.
    async fn graphql(&self, query: &str, variables: Value) -> RemoteResult<Value> {
        counter!("remote_requests_total").increment(1);

        let mut req = self
            .http
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = self.access_token.read().await.as_deref() {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            counter!("remote_errors_total").increment(1);
            RemoteError::Http(e)
        })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            counter!("remote_errors_total").increment(1);
            let err = RemoteError::from_status(status);
            if matches!(err, RemoteError::Auth) {
                *self.access_token.write().await = None;
            }
            return Err(err);
        }

        let body: Value = resp.json().await?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                counter!("remote_errors_total").increment(1);
                let err = classify_graphql_errors(errors);
                if matches!(err, RemoteError::Auth) {
                    // Invalidated session: drop the token so the next
                    // sign-in starts fresh.
                    *self.access_token.write().await = None;
                }
                return Err(err);
            }
        }

        body.get("data")
            .cloned()
            .ok_or_else(|| RemoteError::Protocol("response missing data".into()))
    }

    /// Data-path request. An auth-shaped failure of a previously valid
    /// session means the token expired, not that the credentials are bad:
    /// sign in again once and retry. Only a rejected fresh sign-in
    /// surfaces as [`RemoteError::Auth`].
    async fn authed_graphql(&self, query: &str, variables: Value) -> RemoteResult<Value> {
        let had_session = self.access_token.read().await.is_some();
        match self.graphql(query, variables.clone()).await {
            Err(RemoteError::Auth) if had_session => {
                // graphql() already dropped the expired token.
                self.authenticate().await?;
                self.graphql(query, variables).await
            }
            other => other,
        }
    }
}

/// Map GraphQL-level errors onto the taxonomy by extension code.
fn classify_graphql_errors(errors: &[Value]) -> RemoteError {
    let code = errors[0]
        .pointer("/extensions/code")
        .and_then(Value::as_str)
        .unwrap_or_default();
    match code {
        "UNAUTHENTICATED" | "AUTH_TOKEN_INVALID" => RemoteError::Auth,
        "NOT_FOUND" | "ALREADY_COLLECTED" | "POSTCARD_EXPIRED" => RemoteError::ItemUnavailable {
            id: errors[0]
                .pointer("/extensions/feedItemId")
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_string(),
        },
        _ => {
            let msg = errors[0]
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown graphql error");
            RemoteError::Protocol(msg.to_string())
        }
    }
}

fn parse_items(nodes: &[Value]) -> Vec<FeedItem> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut dropped = 0usize;
    for node in nodes {
        match parse_feed_item(node) {
            Some(it) => out.push(it),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        counter!("feed_items_rejected_total").increment(dropped as u64);
        tracing::debug!(dropped, "dropped malformed feed nodes");
    }
    out
}

#[async_trait]
impl FeedService for BirdBuddyClient {
    async fn authenticate(&self) -> RemoteResult<()> {
        // Re-login only when we have no usable token. A token invalidated
        // mid-session is dropped by graphql() and re-established through the
        // data-path retry in authed_graphql().
        if self.access_token.read().await.is_some() {
            return Ok(());
        }

        // Transport and server-side failures (5xx, malformed body) keep their
        // own classification here: only an explicit credential rejection or a
        // success response without a token is an auth failure.
        let data = self
            .graphql(
                SIGN_IN_MUTATION,
                json!({
                    "email": self.email,
                    "password": self.password,
                    "locale": self.locale,
                }),
            )
            .await?;

        let token = data
            .pointer("/authEmailSignIn/accessToken")
            .and_then(Value::as_str)
            .ok_or(RemoteError::Auth)?
            .to_string();
        *self.access_token.write().await = Some(token);
        tracing::debug!("session established");
        Ok(())
    }

    async fn fetch_feed(&self) -> RemoteResult<Vec<FeedItem>> {
        let data = self
            .authed_graphql(FEED_QUERY, json!({ "first": FEED_PAGE_SIZE }))
            .await?;
        let nodes: Vec<Value> = data
            .pointer("/me/feed/edges")
            .and_then(Value::as_array)
            .map(|edges| {
                edges
                    .iter()
                    .filter_map(|e| e.get("node").cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(parse_items(&nodes))
    }

    async fn fetch_uncollected(&self) -> RemoteResult<Vec<FeedItem>> {
        let data = self.authed_graphql(UNCOLLECTED_QUERY, json!({})).await?;
        let nodes = data
            .pointer("/me/uncollectedPostcards")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(parse_items(&nodes))
    }

    async fn fetch_sighting_detail(&self, item_id: &str) -> RemoteResult<SightingDetail> {
        let data = self
            .authed_graphql(
                SIGHTING_FROM_POSTCARD_MUTATION,
                json!({ "feedItemId": item_id }),
            )
            .await?;
        let sighting = data
            .get("sightingCreateFromPostcard")
            .cloned()
            .ok_or_else(|| RemoteError::Protocol("missing sightingCreateFromPostcard".into()))?;

        let media = sighting
            .get("medias")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(parse_media_ref).collect())
            .unwrap_or_default();
        let species = sighting
            .pointer("/sightingReport/sightings")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.pointer("/species/name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(SightingDetail {
            media,
            species,
            raw: sighting,
        })
    }

    async fn mark_collected(&self, item_id: &str, detail: &SightingDetail) -> RemoteResult<()> {
        let report_token = detail
            .raw
            .pointer("/sightingReport/reportToken")
            .and_then(Value::as_str);
        self.authed_graphql(
            FINISH_POSTCARD_MUTATION,
            json!({ "feedItemId": item_id, "reportToken": report_token }),
        )
        .await?;
        Ok(())
    }
}
