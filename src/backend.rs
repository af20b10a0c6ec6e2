use std::collections::HashSet;
use std::future::Future;

use crate::error::FeedError;
use crate::models::{ChangeEvent, CommentRecord, FeedPage, FeedScope, PostRecord};

/// New-post payload for the remote write.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub author_id: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<crate::models::MediaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagged_item_ref: Option<String>,
}

/// Request/response surface of the external feed service.
///
/// Every consistency hazard lives on this side of the seam: between issuing
/// one of these calls and its completion, arbitrary other events may run.
pub trait FeedBackend {
    /// Fetch one page of the scope's feed, newest-first. An empty page is a
    /// valid result, not an error.
    fn fetch_page(
        &self,
        scope: &FeedScope,
        offset: usize,
        page_size: usize,
    ) -> impl Future<Output = Result<FeedPage, FeedError>> + Send;

    /// Which of the given posts the viewer has liked, used to hydrate
    /// `viewer_has_liked` for a freshly fetched page.
    fn fetch_viewer_likes(
        &self,
        post_ids: &[String],
        viewer_id: &str,
    ) -> impl Future<Output = Result<HashSet<String>, FeedError>> + Send;

    fn create_post(
        &self,
        post: NewPost,
    ) -> impl Future<Output = Result<PostRecord, FeedError>> + Send;

    fn toggle_like(
        &self,
        post_id: &str,
        viewer_id: &str,
        intended_state: bool,
    ) -> impl Future<Output = Result<(), FeedError>> + Send;

    fn create_comment(
        &self,
        post_id: &str,
        author_id: &str,
        body: &str,
    ) -> impl Future<Output = Result<CommentRecord, FeedError>> + Send;

    /// All comments of a post, oldest-first.
    fn fetch_comments(
        &self,
        post_id: &str,
    ) -> impl Future<Output = Result<Vec<CommentRecord>, FeedError>> + Send;
}

/// A live connection to the change-notification channel. Yields events until
/// the connection drops, then returns `None`; the subscriber resubscribes.
pub trait ChangeFeedConnection: Send {
    fn next_event(&mut self) -> impl Future<Output = Option<ChangeEvent>> + Send;
}

/// Transport behind the live notification channel. One subscription per
/// viewed scope; the connection is long-lived and has no timeout.
pub trait ChangeFeedTransport: Send + Sync {
    type Connection: ChangeFeedConnection;

    fn connect(
        &self,
        scope: &FeedScope,
    ) -> impl Future<Output = Result<Self::Connection, FeedError>> + Send;
}
