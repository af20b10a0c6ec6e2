use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use log::warn;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

use crate::backend::{ChangeFeedConnection, ChangeFeedTransport, FeedBackend, NewPost};
use crate::error::FeedError;
use crate::models::{ChangeEvent, CommentRecord, FeedPage, FeedScope, PostRecord};

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Network(err.to_string())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, FeedError> {
    if response.status().is_success() {
        return Ok(response);
    }
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        // the target was deleted out from under the mutation
        return Err(FeedError::Stale);
    }
    let status = response.status().as_u16();
    let reason = response.text().await.unwrap_or_default();
    Err(FeedError::Rejected { status, reason })
}

/// `FeedBackend` over the feed service's JSON API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: String,
}

impl HttpBackend {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikedPostIds {
    liked_post_ids: Vec<String>,
}

impl FeedBackend for HttpBackend {
    async fn fetch_page(
        &self,
        scope: &FeedScope,
        offset: usize,
        page_size: usize,
    ) -> Result<FeedPage, FeedError> {
        let response = self
            .client
            .get(format!("{}/feed", self.base))
            .query(&[
                ("scope", scope.as_query().to_owned()),
                ("offset", offset.to_string()),
                ("pageSize", page_size.to_string()),
            ])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn fetch_viewer_likes(
        &self,
        post_ids: &[String],
        viewer_id: &str,
    ) -> Result<HashSet<String>, FeedError> {
        let response = self
            .client
            .post(format!("{}/likes/query", self.base))
            .json(&json!({ "postIds": post_ids, "viewerId": viewer_id }))
            .send()
            .await?;
        let liked: LikedPostIds = check(response).await?.json().await?;
        Ok(liked.liked_post_ids.into_iter().collect())
    }

    async fn create_post(&self, post: NewPost) -> Result<PostRecord, FeedError> {
        let response = self
            .client
            .post(format!("{}/posts", self.base))
            .json(&post)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn toggle_like(
        &self,
        post_id: &str,
        viewer_id: &str,
        intended_state: bool,
    ) -> Result<(), FeedError> {
        let response = self
            .client
            .put(format!("{}/posts/{post_id}/likes", self.base))
            .json(&json!({ "viewerId": viewer_id, "intendedState": intended_state }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn create_comment(
        &self,
        post_id: &str,
        author_id: &str,
        body: &str,
    ) -> Result<CommentRecord, FeedError> {
        let response = self
            .client
            .post(format!("{}/posts/{post_id}/comments", self.base))
            .json(&json!({ "authorId": author_id, "body": body }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<CommentRecord>, FeedError> {
        let response = self
            .client
            .get(format!("{}/posts/{post_id}/comments", self.base))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Change-notification channel as a long-lived NDJSON stream: one
/// `ChangeEvent` per line.
#[derive(Debug, Clone)]
pub struct HttpChangeFeed {
    client: reqwest::Client,
    base: String,
}

impl HttpChangeFeed {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
        }
    }
}

pub struct HttpChangeFeedConnection {
    chunks: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    buffer: Vec<u8>,
}

impl ChangeFeedConnection for HttpChangeFeedConnection {
    async fn next_event(&mut self) -> Option<ChangeEvent> {
        loop {
            if let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=newline).collect();
                let line = &line[..line.len() - 1];
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_slice(line) {
                    Ok(event) => return Some(event),
                    Err(err) => {
                        warn!("unparseable change event skipped: {err}");
                        continue;
                    }
                }
            }
            match self.chunks.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(err)) => {
                    warn!("change stream read failed: {err}");
                    return None;
                }
                None => return None,
            }
        }
    }
}

impl ChangeFeedTransport for HttpChangeFeed {
    type Connection = HttpChangeFeedConnection;

    async fn connect(&self, scope: &FeedScope) -> Result<HttpChangeFeedConnection, FeedError> {
        let response = self
            .client
            .get(format!("{}/feed/changes", self.base))
            .query(&[("scope", scope.as_query())])
            .send()
            .await?;
        let response = check(response).await?;
        Ok(HttpChangeFeedConnection {
            chunks: response.bytes_stream().boxed(),
            buffer: Vec::new(),
        })
    }
}
