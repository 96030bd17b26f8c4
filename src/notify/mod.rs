//! Outbound new-chapter notifications.
//!
//! The core only builds structured [`Notification`] values; turning them into
//! chat messages is the job of whatever sits behind a [`Notifier`].

mod webhook;

pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Dispatch timed out")]
    Timeout,
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Could not encode notification: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Dispatch rejected: {0}")]
    Rejected(String),
}

/// A user to ping alongside a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Mention(String);

impl Mention {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }

    pub fn user_id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<@{}>", self.0)
    }
}

/// Space-separated mention markup, as the chat platform expects in content.
pub fn mention_line(mentions: &[Mention]) -> String {
    mentions
        .iter()
        .map(Mention::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Everything a renderer needs to announce one new chapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title_id: String,
    pub title_name: String,
    pub chapter_id: String,
    pub chapter_number: f64,
    /// Ordinal formatted with one decimal place.
    pub chapter_label: String,
    pub released_at: Option<DateTime<Utc>>,
    pub chapter_url: String,
    pub cover_url: Option<String>,
}

/// Delivery channel for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification to `channel`, pinging `mentions`.
    ///
    /// Best-effort: callers treat any error as "not delivered this cycle".
    async fn dispatch(
        &self,
        channel: &str,
        mentions: &[Mention],
        notification: &Notification,
    ) -> Result<(), NotifyError>;
}

/// Notifier that only logs; used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(
        &self,
        channel: &str,
        mentions: &[Mention],
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            channel = %channel,
            mentions = %mention_line(mentions),
            title = %notification.title_name,
            chapter = %notification.chapter_label,
            url = %notification.chapter_url,
            "Dry run: would notify"
        );
        Ok(())
    }
}
