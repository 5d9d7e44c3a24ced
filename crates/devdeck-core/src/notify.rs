//! Best-effort admin notifications.
//!
//! A `Notifier` holds an ordered list of delivery channels and a destination.
//! Channels are tried in order until one succeeds; every failure is logged
//! and swallowed. Callers use `notify`, which spawns the delivery and returns
//! immediately.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::Result;

/// One way of getting a message to the admin chat.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, destination: &str, html: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct Notifier {
    destination: Option<String>,
    channels: Vec<Arc<dyn DeliveryChannel>>,
}

impl Notifier {
    pub fn new(destination: impl Into<String>, channels: Vec<Arc<dyn DeliveryChannel>>) -> Self {
        Self {
            destination: Some(destination.into()),
            channels,
        }
    }

    /// Notifier that never sends anything (bot token or chat id not configured).
    pub fn disabled() -> Self {
        Self {
            destination: None,
            channels: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.destination.is_some() && !self.channels.is_empty()
    }

    /// Try each channel in order. Returns whether any channel delivered.
    pub async fn send(&self, html: &str) -> bool {
        let Some(destination) = self.destination.as_deref() else {
            debug!("notifier not configured, skipping notification");
            return false;
        };

        for (idx, channel) in self.channels.iter().enumerate() {
            match channel.deliver(destination, html).await {
                Ok(()) => {
                    info!(channel = channel.name(), destination, "notification sent");
                    return true;
                }
                Err(e) if idx + 1 < self.channels.len() => {
                    warn!(
                        channel = channel.name(),
                        error = %e,
                        "notification failed, trying fallback"
                    );
                }
                Err(e) => {
                    error!(
                        channel = channel.name(),
                        error = %e,
                        "notification failed on every channel"
                    );
                }
            }
        }
        false
    }

    /// Fire-and-forget: deliver on a background task.
    pub fn notify(&self, html: impl Into<String>) {
        if !self.is_enabled() {
            debug!("notifier not configured, skipping notification");
            return;
        }
        let this = self.clone();
        let html = html.into();
        tokio::spawn(async move {
            this.send(&html).await;
        });
    }

    /// Like `notify`, for an optional event produced by a domain operation.
    pub fn notify_event(&self, event: Option<String>) {
        if let Some(html) = event {
            self.notify(html);
        }
    }
}
