//! In-memory backend and transport fakes for the engine's tests.

use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

use crate::backend::{ChangeFeedConnection, ChangeFeedTransport, FeedBackend, NewPost};
use crate::error::FeedError;
use crate::models::{
    ChangeEvent, CommentRecord, CreatedAt, FeedPage, FeedScope, Post, PostId, PostRecord,
    SyncState,
};

pub fn confirmed_post(id: &str, author: &str, body: &str) -> Post {
    Post {
        id: PostId::Server(id.to_string()),
        author_id: author.to_string(),
        author_display_name: author.to_string(),
        author_avatar_ref: None,
        body: body.to_string(),
        media: None,
        tagged_item_ref: None,
        created_at: CreatedAt::At(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
        like_count: 0,
        comment_count: 0,
        viewer_has_liked: None,
        sync_state: SyncState::Confirmed,
    }
}

/// Scriptable `FeedBackend`. Results are queued per operation; writes can be
/// held open on a gate to test in-flight interleavings.
pub struct FakeBackend {
    pages: Mutex<VecDeque<Result<FeedPage, FeedError>>>,
    viewer_likes: Mutex<HashSet<String>>,
    post_results: Mutex<VecDeque<Result<PostRecord, FeedError>>>,
    like_results: Mutex<VecDeque<Result<(), FeedError>>>,
    comment_results: Mutex<VecDeque<Result<CommentRecord, FeedError>>>,
    comment_lists: Mutex<HashMap<String, Vec<CommentRecord>>>,
    calls: Mutex<Vec<String>>,
    like_intents: Mutex<Vec<(String, bool)>>,
    hold_posts: AtomicBool,
    post_gate: Semaphore,
    hold_likes: AtomicBool,
    like_gate: Semaphore,
    hold_pages: AtomicBool,
    page_gate: Semaphore,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(VecDeque::new()),
            viewer_likes: Mutex::new(HashSet::new()),
            post_results: Mutex::new(VecDeque::new()),
            like_results: Mutex::new(VecDeque::new()),
            comment_results: Mutex::new(VecDeque::new()),
            comment_lists: Mutex::new(HashMap::new()),
            calls: Mutex::new(vec![]),
            like_intents: Mutex::new(vec![]),
            hold_posts: AtomicBool::new(false),
            post_gate: Semaphore::new(0),
            hold_likes: AtomicBool::new(false),
            like_gate: Semaphore::new(0),
            hold_pages: AtomicBool::new(false),
            page_gate: Semaphore::new(0),
        }
    }

    pub fn record(&self, id: &str, author: &str, body: &str) -> PostRecord {
        PostRecord {
            id: id.to_string(),
            author_id: author.to_string(),
            author_display_name: author.to_string(),
            author_avatar_ref: None,
            body: body.to_string(),
            media: None,
            tagged_item_ref: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            like_count: 0,
            comment_count: 0,
        }
    }

    pub fn comment_record(&self, id: &str, post_id: &str, author: &str, body: &str) -> CommentRecord {
        CommentRecord {
            id: id.to_string(),
            post_id: post_id.to_string(),
            author_id: author.to_string(),
            author_display_name: author.to_string(),
            author_avatar_ref: None,
            body: body.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    pub fn push_page(&self, page: Result<FeedPage, FeedError>) {
        self.pages.lock().unwrap().push_back(page);
    }

    pub fn set_viewer_likes(&self, ids: &[&str]) {
        let mut likes = self.viewer_likes.lock().unwrap();
        likes.clear();
        likes.extend(ids.iter().map(|s| s.to_string()));
    }

    pub fn push_post_result(&self, result: Result<PostRecord, FeedError>) {
        self.post_results.lock().unwrap().push_back(result);
    }

    pub fn push_like_result(&self, result: Result<(), FeedError>) {
        self.like_results.lock().unwrap().push_back(result);
    }

    pub fn push_comment_result(&self, result: Result<CommentRecord, FeedError>) {
        self.comment_results.lock().unwrap().push_back(result);
    }

    pub fn set_comments(&self, post_id: &str, comments: Vec<CommentRecord>) {
        self.comment_lists
            .lock()
            .unwrap()
            .insert(post_id.to_string(), comments);
    }

    pub fn hold_post_writes(&self) {
        self.hold_posts.store(true, Ordering::SeqCst);
    }

    pub fn release_post_write(&self) {
        self.post_gate.add_permits(1);
    }

    pub fn hold_like_writes(&self) {
        self.hold_likes.store(true, Ordering::SeqCst);
    }

    pub fn release_like_write(&self) {
        self.like_gate.add_permits(1);
    }

    pub fn hold_page_fetches(&self) {
        self.hold_pages.store(true, Ordering::SeqCst);
    }

    pub fn release_page_fetch(&self) {
        self.page_gate.add_permits(1);
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    pub fn like_intents(&self) -> Vec<(String, bool)> {
        self.like_intents.lock().unwrap().clone()
    }

    fn note(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

impl FeedBackend for FakeBackend {
    async fn fetch_page(
        &self,
        _scope: &FeedScope,
        offset: usize,
        _page_size: usize,
    ) -> Result<FeedPage, FeedError> {
        self.note("fetch_page");
        if self.hold_pages.load(Ordering::SeqCst) {
            let permit = self.page_gate.acquire().await.map_err(|_| {
                FeedError::Network("gate closed".into())
            })?;
            permit.forget();
        }
        self.pages.lock().unwrap().pop_front().unwrap_or(Ok(FeedPage {
            posts: vec![],
            cursor_offset: offset,
        }))
    }

    async fn fetch_viewer_likes(
        &self,
        post_ids: &[String],
        _viewer_id: &str,
    ) -> Result<HashSet<String>, FeedError> {
        self.note("fetch_viewer_likes");
        let likes = self.viewer_likes.lock().unwrap();
        Ok(post_ids
            .iter()
            .filter(|id| likes.contains(*id))
            .cloned()
            .collect())
    }

    async fn create_post(&self, post: NewPost) -> Result<PostRecord, FeedError> {
        self.note("create_post");
        if self.hold_posts.load(Ordering::SeqCst) {
            let permit = self.post_gate.acquire().await.map_err(|_| {
                FeedError::Network("gate closed".into())
            })?;
            permit.forget();
        }
        self.post_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.record("generated", &post.author_id, &post.body)))
    }

    async fn toggle_like(
        &self,
        post_id: &str,
        _viewer_id: &str,
        intended_state: bool,
    ) -> Result<(), FeedError> {
        self.note("toggle_like");
        self.like_intents
            .lock()
            .unwrap()
            .push((post_id.to_string(), intended_state));
        if self.hold_likes.load(Ordering::SeqCst) {
            let permit = self.like_gate.acquire().await.map_err(|_| {
                FeedError::Network("gate closed".into())
            })?;
            permit.forget();
        }
        self.like_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn create_comment(
        &self,
        post_id: &str,
        author_id: &str,
        body: &str,
    ) -> Result<CommentRecord, FeedError> {
        self.note("create_comment");
        self.comment_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.comment_record("generated", post_id, author_id, body)))
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<CommentRecord>, FeedError> {
        self.note("fetch_comments");
        Ok(self
            .comment_lists
            .lock()
            .unwrap()
            .get(post_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// One scripted connection: its events are delivered in order, then the
/// connection either hangs open or drops (forcing a resubscribe).
pub struct Script {
    pub events: Vec<ChangeEvent>,
    pub then_drop: bool,
}

impl Script {
    pub fn deliver(events: Vec<ChangeEvent>) -> Self {
        Self {
            events,
            then_drop: false,
        }
    }

    pub fn deliver_then_drop(events: Vec<ChangeEvent>) -> Self {
        Self {
            events,
            then_drop: true,
        }
    }
}

/// Scriptable `ChangeFeedTransport`: each `connect` consumes the next
/// script; once scripts run out, connections hang open silently.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<VecDeque<Script>>,
    connects: Mutex<Vec<FeedScope>>,
}

impl FakeTransport {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            connects: Mutex::new(vec![]),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn connected_scopes(&self) -> Vec<FeedScope> {
        self.connects.lock().unwrap().clone()
    }
}

pub struct FakeConnection {
    events: VecDeque<ChangeEvent>,
    then_drop: bool,
}

impl ChangeFeedConnection for FakeConnection {
    async fn next_event(&mut self) -> Option<ChangeEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }
        if self.then_drop {
            return None;
        }
        std::future::pending().await
    }
}

impl ChangeFeedTransport for FakeTransport {
    type Connection = FakeConnection;

    async fn connect(&self, scope: &FeedScope) -> Result<FakeConnection, FeedError> {
        self.connects.lock().unwrap().push(scope.clone());
        let script = self.scripts.lock().unwrap().pop_front();
        Ok(match script {
            Some(script) => FakeConnection {
                events: script.events.into(),
                then_drop: script.then_drop,
            },
            None => FakeConnection {
                events: VecDeque::new(),
                then_drop: false,
            },
        })
    }
}
