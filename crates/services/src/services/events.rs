use std::{sync::Arc, time::Duration};

use chrono::Utc;
use db::{DBService, entities::event_outbox, events::EventOwner, models::event_outbox::EventOutbox};
use futures_util::{Stream, StreamExt};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use uuid::Uuid;

#[path = "events/types.rs"]
pub mod types;

pub use types::{EventError, UserEvent};

const OUTBOX_POLL_INTERVAL: Duration = Duration::from_millis(250);
const OUTBOX_BATCH_LIMIT: u64 = 100;
const OUTBOX_PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const OUTBOX_RETENTION_DAYS: i64 = 7;
const MAX_DISPATCH_ATTEMPTS: i32 = 5;
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventService {
    db: DBService,
    sender: broadcast::Sender<UserEvent>,
    closed: Arc<watch::Sender<bool>>,
}

impl EventService {
    pub fn new(db: DBService) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (closed, _) = watch::channel(false);
        Self {
            db,
            sender,
            closed: Arc::new(closed),
        }
    }

    /// Ends every open and future user stream. Called when shutdown starts so
    /// long-lived SSE connections do not hold the server open.
    pub fn close_streams(&self) {
        self.closed.send_replace(true);
        tracing::debug!(subscribers = self.subscriber_count(), "closing event streams");
    }

    pub fn spawn_outbox_worker(&self) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            service.run_outbox_loop().await;
        })
    }

    pub fn spawn_prune_worker(&self) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(OUTBOX_PRUNE_INTERVAL);
            loop {
                interval.tick().await;
                match service.prune_published().await {
                    Ok(0) => {}
                    Ok(pruned) => tracing::debug!(pruned, "pruned published outbox rows"),
                    Err(err) => tracing::warn!(error = %err, "event outbox prune failed"),
                }
            }
        })
    }

    async fn run_outbox_loop(&self) {
        loop {
            if let Err(err) = self.flush_pending().await {
                tracing::error!(error = %err, "event outbox flush failed");
            }
            tokio::time::sleep(OUTBOX_POLL_INTERVAL).await;
        }
    }

    /// Publishes one batch of outbox rows. Returns how many were delivered.
    pub async fn flush_pending(&self) -> Result<usize, EventError> {
        let entries = EventOutbox::fetch_unpublished(&self.db.pool, OUTBOX_BATCH_LIMIT).await?;
        let mut delivered = 0;

        for entry in entries {
            match self.dispatch_entry(&entry) {
                Ok(()) => {
                    EventOutbox::mark_published(&self.db.pool, entry.id).await?;
                    delivered += 1;
                }
                Err(err) => {
                    let err_msg = err.to_string();
                    tracing::warn!(
                        event_id = entry.uuid.to_string(),
                        event_type = entry.event_type.as_str(),
                        error = %err_msg,
                        "event dispatch failed"
                    );
                    EventOutbox::mark_failed(&self.db.pool, entry.id, &err_msg).await?;
                    if entry.attempts + 1 >= MAX_DISPATCH_ATTEMPTS {
                        tracing::error!(
                            event_id = entry.uuid.to_string(),
                            "dropping undeliverable outbox event"
                        );
                        EventOutbox::mark_published(&self.db.pool, entry.id).await?;
                    }
                }
            }
        }

        Ok(delivered)
    }

    fn dispatch_entry(&self, entry: &event_outbox::Model) -> Result<(), EventError> {
        let owner: EventOwner = serde_json::from_value(entry.payload.clone())?;
        let event = UserEvent {
            user_id: owner.user_id,
            event_type: entry.event_type.clone(),
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_uuid,
            payload: entry.payload.clone(),
        };
        // no connected listeners is not a failure
        let _ = self.sender.send(event);
        Ok(())
    }

    pub async fn prune_published(&self) -> Result<u64, EventError> {
        let cutoff = Utc::now() - chrono::Duration::days(OUTBOX_RETENTION_DAYS);
        Ok(EventOutbox::prune_published_before(&self.db.pool, cutoff).await?)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Live events for one user. Lagging receivers skip what they missed.
    pub fn stream_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Stream<Item = UserEvent> + Send + use<> {
        let mut closed = self.closed.subscribe();
        let shutdown = async move {
            // a dropped sender also ends the stream
            let _ = closed.wait_for(|closed| *closed).await;
        };
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(move |received| async move {
                match received {
                    Ok(event) if event.user_id == user_id => Some(event),
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(%user_id, skipped, "event stream lagged");
                        None
                    }
                }
            })
            .take_until(shutdown)
    }
}
