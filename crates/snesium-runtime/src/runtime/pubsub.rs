use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use snesium_debug::Notification;
use tracing::warn;

use super::types::NOTIFY_TIMEOUT;

/// Fan-out of engine notifications to subscribed sessions.
pub(crate) struct NotificationHub {
    subscribers: Vec<Sender<Notification>>,
}

impl NotificationHub {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, sender: Sender<Notification>) {
        self.subscribers.push(sender);
    }

    /// Frame notifications are dropped when a queue is full; everything else
    /// waits briefly for space. Disconnected subscribers are removed.
    pub(crate) fn broadcast(&mut self, notification: Notification) {
        self.subscribers.retain(|tx| match &notification {
            Notification::FrameDone => !matches!(
                tx.try_send(Notification::FrameDone),
                Err(TrySendError::Disconnected(_))
            ),
            other => match tx.send_timeout(other.clone(), NOTIFY_TIMEOUT) {
                Ok(()) => true,
                Err(SendTimeoutError::Timeout(dropped)) => {
                    warn!(?dropped, "notification queue full, dropping");
                    true
                }
                Err(SendTimeoutError::Disconnected(_)) => false,
            },
        });
    }
}
