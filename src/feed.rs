use log::{info, warn};
use std::sync::{Arc, Mutex as SyncMutex};
use tokio::sync::Mutex;

use crate::backend::{ChangeFeedTransport, FeedBackend};
use crate::cursor::PaginationCursor;
use crate::error::FeedError;
use crate::models::{Comment, FeedScope, Post, PostId, Viewer};
use crate::mutations::{MutationCoordinator, SharedStore};
use crate::store::{FeedStore, StoreGeneration};
use crate::subscriber::{ChangeFeedSubscriber, SubscriberHandle};
use crate::viewport::{ViewportLoadTrigger, ViewportMetrics};

/// One viewer's live view of one feed scope: the store, its pagination
/// cursor, the optimistic mutation coordinator, and the change-feed
/// subscription, wired together.
///
/// Everything async suspends only on the backend seam; between a request
/// and its completion any other session event may run, which is why the
/// cursor guard, the store's dedup rules, and the generation stamp exist.
pub struct FeedSession<B, T: ChangeFeedTransport> {
    store: SharedStore,
    backend: Arc<B>,
    transport: Arc<T>,
    viewer: Viewer,
    scope: FeedScope,
    cursor: SyncMutex<PaginationCursor>,
    coordinator: MutationCoordinator<B>,
    trigger: ViewportLoadTrigger,
    generation: StoreGeneration,
    page_size: usize,
    subscription: Option<SubscriberHandle>,
}

impl<B, T> FeedSession<B, T>
where
    B: FeedBackend + Send + Sync + 'static,
    T: ChangeFeedTransport + 'static,
{
    /// Builds a session and subscribes to the scope's change feed. Must be
    /// called within a tokio runtime.
    pub fn new(
        backend: Arc<B>,
        transport: Arc<T>,
        viewer: Viewer,
        scope: FeedScope,
        page_size: usize,
    ) -> Self {
        let store: SharedStore = Arc::new(Mutex::new(FeedStore::new()));
        let generation = StoreGeneration::new();
        let coordinator = MutationCoordinator::new(
            store.clone(),
            backend.clone(),
            viewer.clone(),
            generation.clone(),
        );
        let subscription = ChangeFeedSubscriber::new(
            transport.clone(),
            store.clone(),
            generation.clone(),
            viewer.id.clone(),
        )
        .spawn(scope.clone());
        info!("feed session opened on {scope:?}");
        Self {
            store,
            backend,
            transport,
            viewer,
            scope,
            cursor: SyncMutex::new(PaginationCursor::new(page_size)),
            coordinator,
            trigger: ViewportLoadTrigger::default(),
            generation,
            page_size,
            subscription: Some(subscription),
        }
    }

    pub fn with_trigger(mut self, trigger: ViewportLoadTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Local-first mutations: posts, likes, comments.
    pub fn mutations(&self) -> &MutationCoordinator<B> {
        &self.coordinator
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn scope(&self) -> &FeedScope {
        &self.scope
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.lock().expect("cursor lock").is_exhausted()
    }

    /// Newest-first snapshot of the rendered feed.
    pub async fn posts(&self) -> Vec<Post> {
        self.store.lock().await.posts().to_vec()
    }

    /// Loads the next (older) page and appends it to the store. Returns the
    /// number of posts the server sent, before local dedup. Re-entrant calls
    /// while a fetch is in flight, and calls after exhaustion, return 0
    /// without a network request.
    pub async fn load_next_page(&self) -> Result<usize, FeedError> {
        let request = {
            let mut cursor = self.cursor.lock().expect("cursor lock");
            match cursor.begin() {
                Some(request) => request,
                None => return Ok(0),
            }
        };
        let stamp = self.generation.current();

        let page = match self
            .backend
            .fetch_page(&self.scope, request.offset, request.page_size)
            .await
        {
            Ok(page) => page,
            Err(err) => {
                if self.generation.is_current(stamp) {
                    // Idle, not Exhausted: the same offset can be retried
                    self.cursor.lock().expect("cursor lock").fail();
                }
                return Err(err);
            }
        };
        if !self.generation.is_current(stamp) {
            return Ok(0);
        }

        // Exhaustion is judged on what the server sent, not on what survives
        // dedup against posts that arrived over the change feed meanwhile.
        let returned = page.posts.len();

        let ids: Vec<String> = page.posts.iter().map(|r| r.id.clone()).collect();
        let liked = match self.backend.fetch_viewer_likes(&ids, &self.viewer.id).await {
            Ok(liked) => Some(liked),
            Err(err) => {
                warn!("like hydration failed, leaving like-state unknown: {err}");
                None
            }
        };
        if !self.generation.is_current(stamp) {
            return Ok(0);
        }

        {
            let mut store = self.store.lock().await;
            let existing = store.confirmed_ids();
            let posts: Vec<Post> = page
                .posts
                .into_iter()
                .filter(|record| !existing.contains(&record.id))
                .map(|record| {
                    let server_id = record.id.clone();
                    let mut post = record.into_post();
                    if let Some(liked) = &liked {
                        post.viewer_has_liked = Some(liked.contains(&server_id));
                    }
                    post
                })
                .collect();
            store.append_page(posts);
        }
        self.cursor.lock().expect("cursor lock").complete(returned);
        Ok(returned)
    }

    /// Applies the viewport trigger to a scroll event.
    pub async fn on_scroll(&self, metrics: ViewportMetrics) -> Result<usize, FeedError> {
        if self.trigger.should_load(metrics) {
            self.load_next_page().await
        } else {
            Ok(0)
        }
    }

    /// Loads a post's comments into its cache (the "load on expand" fetch).
    /// A vanished or still-pending post is a no-op.
    pub async fn expand_comments(&self, id: &PostId) -> Result<Vec<Comment>, FeedError> {
        let PostId::Server(server_id) = id else {
            return Ok(vec![]);
        };
        let stamp = self.generation.current();
        let records = self.backend.fetch_comments(server_id).await?;
        if !self.generation.is_current(stamp) {
            return Ok(vec![]);
        }
        let comments: Vec<Comment> = records.into_iter().map(|r| r.into_comment()).collect();
        let mut store = self.store.lock().await;
        store.attach_comments(id, comments.clone());
        Ok(comments)
    }

    /// Discards the local view and reloads the scope from the top. Any
    /// in-flight results for the old view are discarded when they land.
    pub async fn refresh(&mut self) -> Result<usize, FeedError> {
        self.rearm(self.scope.clone()).await;
        self.load_next_page().await
    }

    /// Switches to a different feed scope and loads its first page.
    pub async fn set_scope(&mut self, scope: FeedScope) -> Result<usize, FeedError> {
        info!("feed scope changed to {scope:?}");
        self.rearm(scope).await;
        self.load_next_page().await
    }

    async fn rearm(&mut self, scope: FeedScope) {
        if let Some(subscription) = self.subscription.take() {
            subscription.shutdown().await;
        }
        self.generation.bump();
        self.store.lock().await.clear();
        {
            let mut cursor = self.cursor.lock().expect("cursor lock");
            *cursor = PaginationCursor::new(self.page_size);
        }
        self.scope = scope;
        self.subscription = Some(
            ChangeFeedSubscriber::new(
                self.transport.clone(),
                self.store.clone(),
                self.generation.clone(),
                self.viewer.id.clone(),
            )
            .spawn(self.scope.clone()),
        );
    }

    /// Tears down the change-feed subscription. In-flight requests complete
    /// but their results are discarded.
    pub async fn close(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.shutdown().await;
        }
        self.generation.bump();
        info!("feed session closed");
    }
}
