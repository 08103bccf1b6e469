pub mod notify;
pub mod overlay;
pub mod telegram;

use std::time::Duration;
use thiserror::Error;

pub use notify::{NativeNotifier, Notifier};
pub use overlay::{overlay_channel, OverlayApp, OverlayHandle, OverlayQueue};
pub use telegram::{MessageSink, TelegramSink};

/// One popup waiting to be shown by the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    pub text: String,
    pub duration: Duration,
    pub is_error: bool,
}

impl DeliveryRequest {
    pub fn new(text: impl Into<String>, duration: Duration, is_error: bool) -> Self {
        Self {
            text: text.into(),
            duration,
            is_error,
        }
    }
}

/// A failure local to one sink. Never stops the other sinks.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("overlay is no longer running")]
    OverlayClosed,
    #[error("native notification failed: {0}")]
    Notification(String),
    #[error("native notifications are not available in this build")]
    NotificationUnsupported,
    #[error("telegram is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("nothing to send")]
    Empty,
    #[error("telegram request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("telegram returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("telegram rejected the message: {0}")]
    Rejected(String),
}
