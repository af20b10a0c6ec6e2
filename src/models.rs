use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};

/// The logical partition of the feed being viewed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedScope {
    /// The shared community feed.
    Global,
    /// A single profile's posts, by author id.
    Profile(String),
}

impl FeedScope {
    pub(crate) fn as_query(&self) -> &str {
        match self {
            FeedScope::Global => "global",
            FeedScope::Profile(author) => author,
        }
    }
}

/// Identifies a post. Server ids are opaque strings assigned on write
/// confirmation; local ids exist only between an optimistic insert and its
/// confirmation (or rollback) and never leave the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PostId {
    Local(u64),
    Server(String),
}

impl PostId {
    pub fn is_local(&self) -> bool {
        matches!(self, PostId::Local(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommentId {
    Local(u64),
    Server(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Confirmed,
    Pending,
    Failed,
}

/// Server-assigned creation time, or the pending sentinel for an optimistic
/// entry the server has not timestamped yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedAt {
    Pending,
    At(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub uri: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub author_id: String,
    pub author_display_name: String,
    pub author_avatar_ref: Option<String>,
    /// May be empty when media is present.
    pub body: String,
    pub media: Option<MediaRef>,
    pub tagged_item_ref: Option<String>,
    pub created_at: CreatedAt,
    pub like_count: u32,
    pub comment_count: u32,
    /// `None` until the viewer's like-state has been fetched or asserted
    /// locally.
    pub viewer_has_liked: Option<bool>,
    pub sync_state: SyncState,
}

impl Post {
    /// Identity of a post's content within one author, used to pair an
    /// optimistic pending entry with its server-confirmed counterpart.
    pub fn content_hash(&self) -> u64 {
        content_hash(&self.body, self.media.as_ref().map(|m| m.uri.as_str()))
    }
}

pub(crate) fn content_hash(body: &str, media_uri: Option<&str>) -> u64 {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    media_uri.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: String,
    pub author_display_name: String,
    pub author_avatar_ref: Option<String>,
    pub body: String,
    pub created_at: CreatedAt,
}

/// Confirmed post as the backend serves it, with the author's display fields
/// joined server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: String,
    pub author_id: String,
    pub author_display_name: String,
    #[serde(default)]
    pub author_avatar_ref: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub media: Option<MediaRef>,
    #[serde(default)]
    pub tagged_item_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub comment_count: u32,
}

impl PostRecord {
    /// Ingest a confirmed record. The viewer's like-state is unknown until
    /// hydrated separately.
    pub fn into_post(self) -> Post {
        Post {
            id: PostId::Server(self.id),
            author_id: self.author_id,
            author_display_name: self.author_display_name,
            author_avatar_ref: self.author_avatar_ref,
            body: self.body,
            media: self.media,
            tagged_item_ref: self.tagged_item_ref,
            created_at: CreatedAt::At(self.created_at),
            like_count: self.like_count,
            comment_count: self.comment_count,
            viewer_has_liked: None,
            sync_state: SyncState::Confirmed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_display_name: String,
    #[serde(default)]
    pub author_avatar_ref: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl CommentRecord {
    pub fn into_comment(self) -> Comment {
        Comment {
            id: CommentId::Server(self.id),
            post_id: PostId::Server(self.post_id),
            author_id: self.author_id,
            author_display_name: self.author_display_name,
            author_avatar_ref: self.author_avatar_ref,
            body: self.body,
            created_at: CreatedAt::At(self.created_at),
        }
    }
}

/// One page of the feed, newest-first, with the offset the next request
/// should start from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<PostRecord>,
    pub cursor_offset: usize,
}

/// Content of a post the viewer is about to publish.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub body: String,
    pub media: Option<MediaRef>,
    pub tagged_item_ref: Option<String>,
}

/// The viewer's identity as the engine renders it into optimistic entries.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
}

/// A write made by any client, pushed over the live notification channel.
/// Delivery order is not guaranteed relative to the viewer's own writes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "record", rename_all = "lowercase")]
pub enum ChangeEvent {
    Insert(PostRecord),
    Delete { id: String },
}
