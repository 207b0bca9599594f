// src/notify/mod.rs
pub mod email;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::CheckError;
use crate::source::Source;

pub use email::{EmailConfig, EmailNotifier};

pub const TRAILER: &str = "You are receiving this notification because new data was found.";

/// Outbound channel. Implementations do not retry; a failed send is reported
/// and the unchanged state makes the next run try again.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), CheckError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Self-contained message: label, literal value and locator, then the trailer.
    pub fn for_change(source: &Source, latest: &str) -> Self {
        let subject = format!("Update detected: {}", source.label);
        let body = format!(
            "A new update has been detected in:\n\n{}\nLatest Entry: {}\n\nURL: {}\n\n{}",
            source.label, latest, source.locator, TRAILER
        );
        Self { subject, body }
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn Notifier>) -> Self {
        Self { transport }
    }

    pub async fn notify_change(&self, source: &Source, latest: &str) -> Result<(), CheckError> {
        let n = Notification::for_change(source, latest);
        self.transport.send(&n.subject, &n.body).await?;
        tracing::info!(
            source = %source.id,
            channel = self.transport.name(),
            "notification sent"
        );
        Ok(())
    }
}

/// Test double: records every message; optionally fails every send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), CheckError> {
        if self.fail {
            return Err(CheckError::DeliveryFailed("simulated transport error".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(Notification {
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
