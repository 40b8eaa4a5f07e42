//! Notification watcher. Turns mailbox signals into deduplicated,
//! strictly ordered handler calls.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::parse::parse_notification;
use super::{Mailbox, NotificationHandler};
use crate::error::MailError;

/// High-water mark of delivered UIDs. Starts at zero, never decreases.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchCursor(u32);

impl WatchCursor {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn position(&self) -> u32 {
        self.0
    }

    /// Move past `uid`. Returns `false` if `uid` is at or below the mark.
    pub fn advance(&mut self, uid: u32) -> bool {
        if uid <= self.0 {
            return false;
        }
        self.0 = uid;
        true
    }
}

/// Owns the inbound mailbox and the cursor for one sender filter.
pub struct NotificationWatcher<M> {
    mailbox: M,
    sender: String,
    cursor: WatchCursor,
}

impl<M: Mailbox + 'static> NotificationWatcher<M> {
    pub fn new(mailbox: M, sender: impl Into<String>) -> Self {
        Self {
            mailbox,
            sender: sender.into(),
            cursor: WatchCursor::new(),
        }
    }

    pub fn cursor(&self) -> WatchCursor {
        self.cursor
    }

    /// Handle one new-mail signal: search, order by UID, skip anything the
    /// cursor has passed, and deliver the rest one at a time.
    ///
    /// A message that fails to parse is logged and skipped; the cursor still
    /// moves past it. Returns the number of notifications delivered.
    pub async fn poll(&mut self, handler: &dyn NotificationHandler) -> Result<usize, MailError> {
        debug!("Checking email content");
        let mut batch = self.mailbox.fetch_unseen_from(&self.sender).await?;

        if batch.is_empty() {
            info!("No new emails found");
            return Ok(0);
        }

        batch.sort_by_key(|m| m.uid);

        let mut delivered = 0;
        for raw in batch {
            if !self.cursor.advance(raw.uid) {
                debug!(
                    uid = raw.uid,
                    cursor = self.cursor.position(),
                    "Skipping already delivered message"
                );
                continue;
            }

            let notification = match parse_notification(&raw) {
                Ok(n) => n,
                Err(e) => {
                    warn!(uid = raw.uid, "{e}");
                    continue;
                }
            };

            let span = info_span!("notification", uid = raw.uid, delivery_id = %Uuid::new_v4());
            handler.handle(notification).instrument(span).await;
            delivered += 1;
        }

        Ok(delivered)
    }

    /// Wait for signals forever, polling after each one.
    ///
    /// Only returns on a mailbox error; a lost connection is not retried.
    pub async fn run(mut self, handler: Arc<dyn NotificationHandler>) -> Result<(), MailError> {
        info!(sender = %self.sender, "Monitoring inbox");
        loop {
            self.mailbox.wait_for_mail().await?;
            debug!("New mail signalled");
            self.poll(handler.as_ref()).await?;
        }
    }

    /// Start watching on a background task.
    pub fn subscribe(self, handler: Arc<dyn NotificationHandler>) -> Subscription {
        Subscription {
            task: tokio::spawn(self.run(handler)),
        }
    }
}

/// Handle to a running watch.
pub struct Subscription {
    task: JoinHandle<Result<(), MailError>>,
}

impl Subscription {
    /// Stop watching. In-flight handler work is dropped.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    /// Resolve when the watch ends. `Ok` only after `cancel`.
    pub async fn closed(self) -> Result<(), MailError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(MailError::Connection(format!("watch task panicked: {e}"))),
        }
    }
}
