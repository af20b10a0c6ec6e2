mod backend;
mod config;
mod cursor;
mod error;
mod feed;
mod http;
mod models;
mod mutations;
mod store;
mod subscriber;
#[cfg(test)]
mod testutil;
mod viewport;

pub use backend::{ChangeFeedConnection, ChangeFeedTransport, FeedBackend, NewPost};
pub use config::Config;
pub use cursor::{CursorState, PageRequest, PaginationCursor};
pub use error::FeedError;
pub use feed::FeedSession;
pub use http::{HttpBackend, HttpChangeFeed};
pub use models::{
    ChangeEvent, Comment, CommentId, CommentRecord, CreatedAt, FeedPage, FeedScope, MediaKind,
    MediaRef, Post, PostDraft, PostId, PostRecord, SyncState, Viewer,
};
pub use mutations::{MutationCoordinator, SharedStore};
pub use store::{FeedStore, StoreGeneration};
pub use subscriber::{ChangeFeedSubscriber, SubscriberHandle};
pub use viewport::{ViewportLoadTrigger, ViewportMetrics};
