use std::collections::VecDeque;
use std::time::Duration;

use crate::error::Failure;

pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Positive,
    Negative,
}

/// A transient, non-blocking message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub detail: Option<String>,
    pub timeout: Duration,
}

/// Pending notifications raised by a controller, drained by the UI.
#[derive(Debug, Clone, Default)]
pub struct Notifications {
    queue: VecDeque<Notification>,
}

impl Notifications {
    pub fn positive(&mut self, message: impl Into<String>) {
        self.queue.push_back(Notification {
            kind: NotificationKind::Positive,
            message: message.into(),
            detail: None,
            timeout: NOTIFICATION_TIMEOUT,
        });
    }

    pub fn negative(&mut self, failure: &Failure) {
        self.queue.push_back(Notification {
            kind: NotificationKind::Negative,
            message: failure.summary.clone(),
            detail: Some(failure.detail.clone()),
            timeout: NOTIFICATION_TIMEOUT,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }
}

/// Answer to a blocking confirm dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accepted,
    Declined,
}
