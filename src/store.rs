use chrono::Duration;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::{Comment, CommentId, CreatedAt, Post, PostId, SyncState};

/// Monotonic stamp identifying the current lifetime of the store. Bumped
/// whenever the viewed scope changes; a callback that captured an older
/// stamp must discard its result instead of writing to the store.
#[derive(Debug, Clone, Default)]
pub struct StoreGeneration(Arc<AtomicU64>);

impl StoreGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_current(&self, stamp: u64) -> bool {
        self.current() == stamp
    }
}

/// How close in time a confirmed post must be to count as "the same post"
/// when a `replace` falls back to authorship matching.
const REPLACE_PROXIMITY_SECS: i64 = 300;

/// In-memory ordered collection of posts plus per-post comment caches.
/// Single source of truth for the rendered feed.
///
/// All mutations are synchronous and complete before the next event runs;
/// ordering is the internal `Vec` order, newest-first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedStore {
    posts: Vec<Post>,
    comments: HashMap<PostId, Vec<Comment>>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest-first projection for the UI.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| &p.id == id)
    }

    pub fn contains_confirmed(&self, server_id: &str) -> bool {
        self.posts
            .iter()
            .any(|p| matches!(&p.id, PostId::Server(s) if s == server_id))
    }

    /// Server ids currently held, for deduplicating a freshly fetched page.
    pub fn confirmed_ids(&self) -> HashSet<String> {
        self.posts
            .iter()
            .filter_map(|p| match &p.id {
                PostId::Server(s) => Some(s.clone()),
                PostId::Local(_) => None,
            })
            .collect()
    }

    pub fn comments_for(&self, id: &PostId) -> Option<&[Comment]> {
        self.comments.get(id).map(|c| c.as_slice())
    }

    /// Adds a confirmed post to the front. No-op if a post with the same
    /// server id is already present.
    pub fn insert_at_head(&mut self, post: Post) {
        if let PostId::Server(server_id) = &post.id {
            if self.contains_confirmed(server_id) {
                debug!("insert_at_head: {server_id} already present, skipping");
                return;
            }
        }
        self.posts.insert(0, post);
    }

    /// Adds an optimistic pending post to the front. Returns `false` without
    /// inserting when the author already has a pending entry with the same
    /// content, which keeps a double-submit from producing two entries.
    pub fn insert_pending(&mut self, post: Post) -> bool {
        let hash = post.content_hash();
        if self
            .find_pending_by_content(&post.author_id, hash)
            .is_some()
        {
            debug!(
                "insert_pending: author {} already has a pending entry for this content",
                post.author_id
            );
            return false;
        }
        self.posts.insert(0, post);
        true
    }

    /// Pending entry by the given author whose content hashes to `hash`.
    pub fn find_pending_by_content(&self, author_id: &str, hash: u64) -> Option<PostId> {
        self.posts
            .iter()
            .find(|p| {
                p.sync_state == SyncState::Pending
                    && p.author_id == author_id
                    && p.content_hash() == hash
            })
            .map(|p| p.id.clone())
    }

    /// Appends an already-ordered, already-deduplicated page to the tail.
    pub fn append_page(&mut self, posts: Vec<Post>) {
        self.posts.extend(posts);
    }

    /// Swaps a pending entry for its confirmed counterpart, migrating the
    /// comment cache to the new id. If no entry with `temp_id` exists (it was
    /// already superseded by a notification), falls back to a head insert
    /// deduplicated by authorship and timestamp proximity.
    pub fn replace(&mut self, temp_id: &PostId, confirmed: Post) {
        if let Some(idx) = self.posts.iter().position(|p| &p.id == temp_id) {
            let mut confirmed = confirmed;
            if confirmed.viewer_has_liked.is_none() {
                confirmed.viewer_has_liked = self.posts[idx].viewer_has_liked;
            }
            let new_id = confirmed.id.clone();
            self.posts[idx] = confirmed;
            if let Some(mut cached) = self.comments.remove(temp_id) {
                for comment in &mut cached {
                    comment.post_id = new_id.clone();
                }
                self.comments.insert(new_id, cached);
            }
            return;
        }
        if self.supersedes(&confirmed) {
            debug!("replace: confirmed counterpart already present, skipping");
            return;
        }
        self.insert_at_head(confirmed);
    }

    fn supersedes(&self, confirmed: &Post) -> bool {
        let CreatedAt::At(created) = confirmed.created_at else {
            return false;
        };
        self.posts.iter().any(|p| {
            p.sync_state == SyncState::Confirmed
                && p.author_id == confirmed.author_id
                && match p.created_at {
                    CreatedAt::At(existing) => {
                        (existing - created).abs() <= Duration::seconds(REPLACE_PROXIMITY_SECS)
                    }
                    CreatedAt::Pending => false,
                }
        })
    }

    /// Deletes a post and its comment cache. Idempotent: removing an absent
    /// id is a no-op and returns `false`.
    pub fn remove(&mut self, id: &PostId) -> bool {
        self.comments.remove(id);
        let before = self.posts.len();
        self.posts.retain(|p| &p.id != id);
        self.posts.len() != before
    }

    /// Sets the viewer's like-state and adjusts the count by one in the
    /// matching direction. Idempotent: asserting the state the post already
    /// holds changes nothing, so the flag and the counter move in lockstep
    /// and the count cannot go negative.
    pub fn adjust_like(&mut self, id: &PostId, viewer_liked: bool) {
        let Some(post) = self.posts.iter_mut().find(|p| &p.id == id) else {
            return;
        };
        if post.viewer_has_liked == Some(viewer_liked) {
            return;
        }
        post.viewer_has_liked = Some(viewer_liked);
        if viewer_liked {
            post.like_count += 1;
        } else {
            post.like_count = post.like_count.saturating_sub(1);
        }
    }

    /// Replaces the whole comment cache for a post (the "load on expand"
    /// fetch). Does not touch `comment_count`.
    pub fn attach_comments(&mut self, id: &PostId, comments: Vec<Comment>) {
        if self.get(id).is_none() {
            return;
        }
        self.comments.insert(id.clone(), comments);
    }

    /// Appends one comment and bumps the parent's `comment_count`, so the
    /// exact inverse is `remove_comment`.
    pub fn append_comment(&mut self, id: &PostId, comment: Comment) {
        let Some(post) = self.posts.iter_mut().find(|p| &p.id == id) else {
            return;
        };
        post.comment_count += 1;
        self.comments.entry(id.clone()).or_default().push(comment);
    }

    /// Inverse of `append_comment`. Idempotent on an absent comment id.
    pub fn remove_comment(&mut self, id: &PostId, comment_id: &CommentId) -> bool {
        let Some(cached) = self.comments.get_mut(id) else {
            return false;
        };
        let before = cached.len();
        cached.retain(|c| &c.id != comment_id);
        if cached.len() == before {
            return false;
        }
        if cached.is_empty() {
            // an emptied cache must be indistinguishable from one never loaded
            self.comments.remove(id);
        }
        if let Some(post) = self.posts.iter_mut().find(|p| &p.id == id) {
            post.comment_count = post.comment_count.saturating_sub(1);
        }
        true
    }

    /// Swaps a pending comment for its confirmed counterpart, leaving the
    /// parent's `comment_count` untouched.
    pub fn replace_comment(&mut self, id: &PostId, temp_id: &CommentId, confirmed: Comment) {
        let Some(cached) = self.comments.get_mut(id) else {
            return;
        };
        if let Some(slot) = cached.iter_mut().find(|c| &c.id == temp_id) {
            *slot = confirmed;
        }
    }

    /// Drops everything. Used when the viewed scope changes.
    pub fn clear(&mut self) {
        self.posts.clear();
        self.comments.clear();
    }
}
