//! Notification Service (expanded; spec.md §2 names it, SPEC_FULL.md §4.11
//! details it): persists per-user notifications, publishes to a
//! `tokio::sync::broadcast` channel standing in for the out-of-scope
//! WebSocket transport, and enforces a time+count retention bound. Grounded
//! on `original_source/app/services/notifications_service.py`'s
//! create-then-trim shape; the channel replaces its WebSocket push, which
//! is an external transport collaborator here (spec.md §1).

use bson::doc;
use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::TryStreamExt;
use mongodb::options::FindOptions;
use tokio::sync::broadcast;

use marketfeed_types::PlatformError;
use marketfeed_types::model::Notification;

use crate::store::{new_object_id, parse_object_id, DocumentStore};

const RETAIN_DAYS: i64 = 90;
const MAX_PER_USER: u64 = 1000;

/// Persists notifications and fans them out to live subscribers.
pub struct NotificationService {
    store: DocumentStore,
    tx: broadcast::Sender<Notification>,
}

impl NotificationService {
    /// `channel_capacity` bounds how many unread broadcasts a lagging
    /// subscriber can fall behind before messages are dropped for it
    /// (`tokio::sync::broadcast` semantics); it does not bound persistence.
    #[must_use]
    pub fn new(store: DocumentStore, channel_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity);
        Self { store, tx }
    }

    /// Subscribe to live notifications; the transport layer (WebSocket or
    /// otherwise) bridges this to its own clients.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Persist a notification, broadcast it, and trim this user's history
    /// to the retention bound.
    pub async fn create_and_publish(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
    ) -> Result<String, PlatformError> {
        let id = new_object_id();
        let notification = Notification {
            id: Some(id.clone()),
            user_id: user_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            read: false,
            created_at: Utc::now(),
        };

        let oid = parse_object_id(&id)?;
        let mut doc_body = bson::to_document(&notification).map_err(|e| PlatformError::Store(e.to_string()))?;
        doc_body.remove("id");
        doc_body.insert("_id", oid);
        self.store.raw_notifications().insert_one(doc_body).await.map_err(|e| PlatformError::Store(e.to_string()))?;

        let _ = self.tx.send(notification);
        self.enforce_retention(user_id).await;
        Ok(id)
    }

    /// Delete anything older than [`RETAIN_DAYS`], then trim the oldest
    /// surplus beyond [`MAX_PER_USER`] (spec.md's count bound).
    async fn enforce_retention(&self, user_id: &str) {
        let cutoff = Utc::now() - ChronoDuration::days(RETAIN_DAYS);
        let _ = self
            .store
            .notification()
            .delete_many(doc! {"user_id": user_id, "created_at": {"$lt": cutoff}})
            .await;

        let Ok(count) = self.store.notification().count_documents(doc! {"user_id": user_id}).await else { return };
        if count <= MAX_PER_USER {
            return;
        }
        let skip = count - MAX_PER_USER;

        let opts = FindOptions::builder().sort(doc! {"created_at": 1}).limit(skip as i64).build();
        let Ok(cursor) = self
            .store
            .raw_notifications()
            .find(doc! {"user_id": user_id})
            .with_options(opts)
            .await
        else {
            return;
        };
        let Ok(stale): Result<Vec<bson::Document>, _> = cursor.try_collect().await else { return };
        let ids: Vec<bson::Bson> = stale.into_iter().filter_map(|d| d.get("_id").cloned()).collect();
        if !ids.is_empty() {
            let _ = self.store.raw_notifications().delete_many(doc! {"_id": {"$in": ids}}).await;
        }
    }

    /// Count of unread notifications for `user_id`.
    pub async fn unread_count(&self, user_id: &str) -> Result<u64, PlatformError> {
        self.store
            .notification()
            .count_documents(doc! {"user_id": user_id, "read": false})
            .await
            .map_err(|e| PlatformError::Store(e.to_string()))
    }

    /// Page through a user's notifications, newest first.
    pub async fn list(&self, user_id: &str, page: u64, page_size: u64) -> Result<Vec<Notification>, PlatformError> {
        let page = page.max(1);
        let skip = (page - 1) * page_size;
        let opts = FindOptions::builder().sort(doc! {"created_at": -1}).skip(skip).limit(page_size as i64).build();
        let cursor = self
            .store
            .notification()
            .find(doc! {"user_id": user_id})
            .with_options(opts)
            .await
            .map_err(|e| PlatformError::Store(e.to_string()))?;
        cursor.try_collect().await.map_err(|e| PlatformError::Store(e.to_string()))
    }

    /// Mark one notification read; returns whether it existed and was
    /// previously unread.
    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<bool, PlatformError> {
        let oid = parse_object_id(notification_id)?;
        let result = self
            .store
            .raw_notifications()
            .update_one(doc! {"_id": oid, "user_id": user_id}, doc! {"$set": {"read": true}})
            .await
            .map_err(|e| PlatformError::Store(e.to_string()))?;
        Ok(result.modified_count > 0)
    }

    /// Mark every unread notification for `user_id` read; returns how many
    /// changed.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64, PlatformError> {
        let result = self
            .store
            .raw_notifications()
            .update_many(doc! {"user_id": user_id, "read": false}, doc! {"$set": {"read": true}})
            .await
            .map_err(|e| PlatformError::Store(e.to_string()))?;
        Ok(result.modified_count)
    }
}
