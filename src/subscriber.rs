use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::backend::{ChangeFeedConnection, ChangeFeedTransport};
use crate::models::{content_hash, ChangeEvent, FeedScope, PostId};
use crate::mutations::SharedStore;
use crate::store::StoreGeneration;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Maintains a live subscription to insert/delete notifications for one
/// scope and reconciles them into the store without duplicating the
/// viewer's own optimistic entries.
///
/// A dropped connection is logged and silently resubscribed. Events missed
/// during the disconnection window are not backfilled; the next manual page
/// load or refresh closes the gap.
pub struct ChangeFeedSubscriber<T> {
    transport: Arc<T>,
    store: SharedStore,
    generation: StoreGeneration,
    viewer_id: String,
    reconnect_delay: Duration,
}

/// Owns the subscription task. Dropping the handle (or calling `shutdown`)
/// tears the connection down rather than leaking it.
pub struct SubscriberHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SubscriberHandle {
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        let _ = (&mut self.task).await;
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
        self.task.abort();
    }
}

impl<T: ChangeFeedTransport + 'static> ChangeFeedSubscriber<T> {
    pub fn new(
        transport: Arc<T>,
        store: SharedStore,
        generation: StoreGeneration,
        viewer_id: String,
    ) -> Self {
        Self {
            transport,
            store,
            generation,
            viewer_id,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    /// Subscribes to `scope` on a background task and returns its handle.
    pub fn spawn(self, scope: FeedScope) -> SubscriberHandle {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            let stamp = self.generation.current();
            loop {
                let connection = tokio::select! {
                    _ = stopped.changed() => return,
                    connection = self.transport.connect(&scope) => connection,
                };
                let mut connection = match connection {
                    Ok(connection) => {
                        info!("change feed subscribed to {scope:?}");
                        connection
                    }
                    Err(err) => {
                        warn!("change feed connect failed: {err}; retrying");
                        tokio::select! {
                            _ = stopped.changed() => return,
                            _ = sleep(self.reconnect_delay) => continue,
                        }
                    }
                };
                loop {
                    let event = tokio::select! {
                        _ = stopped.changed() => return,
                        event = connection.next_event() => event,
                    };
                    match event {
                        Some(event) => {
                            if !self.generation.is_current(stamp) {
                                debug!("change feed outlived its store, stopping");
                                return;
                            }
                            self.apply(event).await;
                        }
                        None => {
                            // no backfill: anything missed while down is
                            // picked up by the next manual page load
                            warn!("change feed connection dropped; resubscribing");
                            break;
                        }
                    }
                }
                tokio::select! {
                    _ = stopped.changed() => return,
                    _ = sleep(self.reconnect_delay) => {}
                }
            }
        });
        SubscriberHandle { stop, task }
    }

    async fn apply(&self, event: ChangeEvent) {
        match event {
            ChangeEvent::Insert(record) => {
                let mut store = self.store.lock().await;
                if record.author_id == self.viewer_id {
                    // the viewer's own write coming back around: this is the
                    // confirmation path, not a fresh insert
                    let hash =
                        content_hash(&record.body, record.media.as_ref().map(|m| m.uri.as_str()));
                    if let Some(temp) = store.find_pending_by_content(&self.viewer_id, hash) {
                        debug!("insert notification confirms pending entry {temp:?}");
                        store.replace(&temp, record.into_post());
                        return;
                    }
                }
                store.insert_at_head(record.into_post());
            }
            ChangeEvent::Delete { id } => {
                let removed = self.store.lock().await.remove(&PostId::Server(id.clone()));
                if removed {
                    debug!("post {id} removed by delete notification");
                }
            }
        }
    }
}
