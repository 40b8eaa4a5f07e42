//! Mailbox I/O: IMAP IDLE watch for inbound, SMTP via lettre for outbound.
//!
//! The watcher owns its `Mailbox` and delivers `Notification`s to a single
//! `NotificationHandler`, one at a time and oldest first.

pub mod imap;
pub mod parse;
pub mod smtp;
pub mod watcher;

pub use imap::ImapMailbox;
pub use smtp::SmtpNotifier;
pub use watcher::{NotificationWatcher, Subscription, WatchCursor};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MailError;

/// An undecoded message as fetched from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub uid: u32,
    pub bytes: Vec<u8>,
}

/// A parsed inbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Per-mailbox, monotonically increasing id. The dedup key.
    pub uid: u32,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub date: Option<DateTime<Utc>>,
}

/// Inbound side of an authenticated mailbox session.
#[async_trait]
pub trait Mailbox: Send {
    /// Block until the server signals new mail.
    async fn wait_for_mail(&mut self) -> Result<(), MailError>;

    /// Fetch unread messages from `sender`. Fetching marks them read.
    async fn fetch_unseen_from(&mut self, sender: &str) -> Result<Vec<RawMessage>, MailError>;
}

/// Outbound mail, independent of the inbound connection.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Receives each new notification. The next one is not delivered until
/// this returns.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, notification: Notification);
}
