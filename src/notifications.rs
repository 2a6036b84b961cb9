//! Unread-message count feed for one user.
//!
//! The feed owns a background task watching the conversations collection.
//! It is created with the store it watches, started explicitly and stopped
//! explicitly (or on drop); nothing about it is global.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::StorageResult;
use crate::storage::Storage;

pub struct NotificationFeed {
    storage: Arc<Storage>,
    user_id: String,
    receiver: Option<watch::Receiver<u32>>,
    task: Option<JoinHandle<()>>,
}

impl NotificationFeed {
    pub fn new(storage: Arc<Storage>, user_id: impl Into<String>) -> Self {
        Self {
            storage,
            user_id: user_id.into(),
            receiver: None,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Publishes the current count and begins following changes. Calling
    /// `start` on a running feed is a no-op. Must run inside a tokio runtime.
    pub fn start(&mut self) -> StorageResult<()> {
        if self.is_running() {
            return Ok(());
        }

        // Subscribe before reading so no change between the two is missed
        let mut subscriber = self.storage.watch_conversations();
        let initial = self.storage.unread_total(&self.user_id)?;
        let (sender, receiver) = watch::channel(initial);

        let storage = Arc::clone(&self.storage);
        let user_id = self.user_id.clone();
        let task = tokio::spawn(async move {
            while let Some(_event) = (&mut subscriber).await {
                if sender.is_closed() {
                    break;
                }
                match storage.unread_total(&user_id) {
                    Ok(count) => {
                        sender.send_if_modified(|current| {
                            if *current == count {
                                return false;
                            }
                            *current = count;
                            true
                        });
                    }
                    Err(err) => {
                        tracing::warn!(user_id = %user_id, error = %err, "unread count refresh failed");
                    }
                }
            }
            tracing::debug!(user_id = %user_id, "notification feed ended");
        });

        self.receiver = Some(receiver);
        self.task = Some(task);
        tracing::debug!(user_id = %self.user_id, unread = initial, "notification feed started");
        Ok(())
    }

    /// Stops following changes. Existing receivers see no further updates.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(user_id = %self.user_id, "notification feed stopped");
        }
    }

    /// Latest published count, `None` before `start`.
    pub fn current(&self) -> Option<u32> {
        self.receiver.as_ref().map(|rx| *rx.borrow())
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<u32>> {
        self.receiver.clone()
    }
}

impl Drop for NotificationFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
