use log::{debug, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::backend::{FeedBackend, NewPost};
use crate::error::FeedError;
use crate::models::{
    Comment, CommentId, CreatedAt, Post, PostDraft, PostId, SyncState, Viewer,
};
use crate::store::{FeedStore, StoreGeneration};

pub type SharedStore = Arc<Mutex<FeedStore>>;

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Applies local-first mutations to the store, issues the matching remote
/// write, and rolls back on failure.
///
/// Every mutation follows the same protocol: apply the tentative effect
/// synchronously, await the remote write, then either reconcile (swap
/// temporary ids for server-assigned ones) or apply the exact inverse of the
/// tentative effect. Same-post mutations are serialized FIFO through a
/// per-post lock, so an un-like can never overtake the like it follows.
pub struct MutationCoordinator<B> {
    store: SharedStore,
    backend: Arc<B>,
    viewer: Viewer,
    generation: StoreGeneration,
    write_timeout: Duration,
    next_local_id: AtomicU64,
    post_locks: Mutex<HashMap<PostId, Arc<Mutex<()>>>>,
}

impl<B: FeedBackend> MutationCoordinator<B> {
    pub fn new(
        store: SharedStore,
        backend: Arc<B>,
        viewer: Viewer,
        generation: StoreGeneration,
    ) -> Self {
        Self {
            store,
            backend,
            viewer,
            generation,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            next_local_id: AtomicU64::new(1),
            post_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    fn next_local_id(&self) -> u64 {
        self.next_local_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Bounds a remote write: a write that has not confirmed within the
    /// timeout is treated as failed and rolled back.
    async fn write<T>(
        &self,
        fut: impl Future<Output = Result<T, FeedError>>,
    ) -> Result<T, FeedError> {
        match timeout(self.write_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Network("write timed out".into())),
        }
    }

    /// Publishes a post. The pending entry appears at the head of the feed
    /// immediately; on confirmation it is swapped for the server record, on
    /// failure it is removed and the error surfaced.
    ///
    /// Re-submitting identical content while the first submit is still
    /// pending is absorbed: the existing pending id is returned and no
    /// second remote write goes out.
    pub async fn create_post(&self, draft: PostDraft) -> Result<PostId, FeedError> {
        let temp = PostId::Local(self.next_local_id());
        let post = Post {
            id: temp.clone(),
            author_id: self.viewer.id.clone(),
            author_display_name: self.viewer.display_name.clone(),
            author_avatar_ref: self.viewer.avatar_ref.clone(),
            body: draft.body.clone(),
            media: draft.media.clone(),
            tagged_item_ref: draft.tagged_item_ref.clone(),
            created_at: CreatedAt::Pending,
            like_count: 0,
            comment_count: 0,
            viewer_has_liked: Some(false),
            sync_state: SyncState::Pending,
        };
        let hash = post.content_hash();

        {
            let mut store = self.store.lock().await;
            if !store.insert_pending(post) {
                let existing = store
                    .find_pending_by_content(&self.viewer.id, hash)
                    .unwrap_or_else(|| temp.clone());
                debug!("duplicate pending submit absorbed as {existing:?}");
                return Ok(existing);
            }
        }

        let stamp = self.generation.current();
        let result = self
            .write(self.backend.create_post(NewPost {
                author_id: self.viewer.id.clone(),
                body: draft.body,
                media: draft.media,
                tagged_item_ref: draft.tagged_item_ref,
            }))
            .await;

        match result {
            Ok(record) => {
                let server_id = PostId::Server(record.id.clone());
                if self.generation.is_current(stamp) {
                    self.store.lock().await.replace(&temp, record.into_post());
                } else {
                    debug!("post confirmation for a stale store discarded");
                }
                Ok(server_id)
            }
            Err(err) => {
                if self.generation.is_current(stamp) {
                    self.store.lock().await.remove(&temp);
                }
                warn!("post write failed, optimistic entry rolled back: {err}");
                Err(err)
            }
        }
    }

    /// Flips the viewer's like-state on a post. The flip and count
    /// adjustment land immediately; the remote write follows, serialized
    /// FIFO with any other in-flight toggle on the same post.
    ///
    /// Toggling a post that is gone, or not yet confirmed, is a no-op.
    pub async fn toggle_like(&self, id: &PostId) -> Result<(), FeedError> {
        let PostId::Server(server_id) = id else {
            debug!("like on an unconfirmed post ignored");
            return Ok(());
        };

        let intended = {
            let mut store = self.store.lock().await;
            let Some(post) = store.get(id) else {
                return Ok(());
            };
            let intended = !post.viewer_has_liked.unwrap_or(false);
            store.adjust_like(id, intended);
            intended
        };

        let lock = self.post_lock(id).await;
        let stamp = self.generation.current();
        let result = {
            let _serialized = lock.lock().await;
            self.write(
                self.backend
                    .toggle_like(server_id, &self.viewer.id, intended),
            )
            .await
        };
        self.release_post_lock(id, lock).await;

        if let Err(err) = result {
            if self.generation.is_current(stamp) {
                // guarded inverse: if a queued toggle has already flipped the
                // state past us, this collapses to a no-op instead of
                // desynchronizing the flag/counter pair
                self.store.lock().await.adjust_like(id, !intended);
            }
            if matches!(err, FeedError::Stale) {
                // the post was deleted under us; its removal arrives over
                // the change feed
                debug!("like target vanished server-side, absorbed");
                return Ok(());
            }
            warn!("like toggle failed, reverted: {err}");
            return Err(err);
        }
        // success: the server does not echo a new count, local state stands
        Ok(())
    }

    /// Appends a comment. The pending comment and the count bump land
    /// immediately; on confirmation the temporary comment is swapped for the
    /// server record. Returns `None` when the target post is gone or not yet
    /// confirmed (absorbed no-op).
    pub async fn create_comment(
        &self,
        id: &PostId,
        body: String,
    ) -> Result<Option<CommentId>, FeedError> {
        let PostId::Server(server_post_id) = id else {
            debug!("comment on an unconfirmed post ignored");
            return Ok(None);
        };

        let temp = CommentId::Local(self.next_local_id());
        {
            let mut store = self.store.lock().await;
            if store.get(id).is_none() {
                return Ok(None);
            }
            store.append_comment(
                id,
                Comment {
                    id: temp.clone(),
                    post_id: id.clone(),
                    author_id: self.viewer.id.clone(),
                    author_display_name: self.viewer.display_name.clone(),
                    author_avatar_ref: self.viewer.avatar_ref.clone(),
                    body: body.clone(),
                    created_at: CreatedAt::Pending,
                },
            );
        }

        let stamp = self.generation.current();
        let result = self
            .write(
                self.backend
                    .create_comment(server_post_id, &self.viewer.id, &body),
            )
            .await;

        match result {
            Ok(record) => {
                let confirmed_id = CommentId::Server(record.id.clone());
                if self.generation.is_current(stamp) {
                    self.store
                        .lock()
                        .await
                        .replace_comment(id, &temp, record.into_comment());
                }
                Ok(Some(confirmed_id))
            }
            Err(err) => {
                if self.generation.is_current(stamp) {
                    self.store.lock().await.remove_comment(id, &temp);
                }
                if matches!(err, FeedError::Stale) {
                    debug!("comment target vanished server-side, absorbed");
                    return Ok(None);
                }
                warn!("comment write failed, rolled back: {err}");
                Err(err)
            }
        }
    }

    async fn post_lock(&self, id: &PostId) -> Arc<Mutex<()>> {
        self.post_locks
            .lock()
            .await
            .entry(id.clone())
            .or_default()
            .clone()
    }

    async fn release_post_lock(&self, id: &PostId, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.post_locks.lock().await;
        if let Some(entry) = locks.get(id) {
            // only the map holds it: no toggle is queued behind us
            if Arc::strong_count(entry) == 1 {
                locks.remove(id);
            }
        }
    }
}
