//! User-facing notifications
//!
//! The controller reports outcomes as toast-style notifications. Their
//! text is fixed and never contains error details.

/// Visual weight of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A short message for the person filling the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: &'static str,
    pub description: &'static str,
}

impl Notification {
    pub const SENT: Notification = Notification {
        kind: NotificationKind::Success,
        title: "Message sent!",
        description: "We will get back to you as soon as possible.",
    };

    pub const FAILED: Notification = Notification {
        kind: NotificationKind::Error,
        title: "Error",
        description: "Something went wrong. Please try again later.",
    };
}

/// Receives notifications emitted by the controller
pub trait Notifier {
    fn notify(&self, notification: &Notification);
}

impl<F> Notifier for F
where
    F: Fn(&Notification),
{
    fn notify(&self, notification: &Notification) {
        self(notification)
    }
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        match notification.kind {
            NotificationKind::Success => {
                log::info!("{}: {}", notification.title, notification.description)
            }
            NotificationKind::Error => {
                log::warn!("{}: {}", notification.title, notification.description)
            }
        }
    }
}
