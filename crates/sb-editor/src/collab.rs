//! External collaborators: confirmation dialog and message surface.

use std::future::Future;
use std::pin::Pin;

/// Asks the user a yes/no question. Cancel, dismissal and rejection all
/// resolve to `false`.
pub trait ConfirmDialog {
    fn confirm(&self, prompt: &str) -> Pin<Box<dyn Future<Output = bool>>>;
}

/// Severity of a toast message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Warning,
    Danger,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Info => "info",
            MessageKind::Success => "success",
            MessageKind::Warning => "warning",
            MessageKind::Danger => "danger",
        }
    }
}

/// Fire-and-forget user notification.
pub trait MessageSurface {
    fn message(&self, text: &str, kind: MessageKind);
}

/// Writes messages to the log instead of the page.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessages;

impl MessageSurface for LogMessages {
    fn message(&self, text: &str, kind: MessageKind) {
        match kind {
            MessageKind::Warning | MessageKind::Danger => log::warn!("[{}] {text}", kind.as_str()),
            MessageKind::Info | MessageKind::Success => log::info!("[{}] {text}", kind.as_str()),
        }
    }
}
