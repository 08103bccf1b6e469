use super::DeliveryError;

/// Native desktop notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Summary line of every answer notification. Errors always go to the overlay.
pub const NOTIFICATION_TITLE: &str = "Answer";

#[derive(Default)]
pub struct NativeNotifier {
    #[cfg_attr(not(feature = "notify"), allow(dead_code))]
    sound: Option<String>,
}

impl NativeNotifier {
    pub fn new(sound: Option<String>) -> Self {
        Self { sound }
    }
}

#[cfg(feature = "notify")]
impl Notifier for NativeNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), DeliveryError> {
        let mut notification = notify_rust::Notification::new();
        notification.summary(title).body(body);
        if let Some(sound) = &self.sound {
            notification.sound_name(sound);
        }
        notification
            .show()
            .map(|_| ())
            .map_err(|e| DeliveryError::Notification(e.to_string()))
    }
}

#[cfg(not(feature = "notify"))]
impl Notifier for NativeNotifier {
    fn notify(&self, _title: &str, _body: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotificationUnsupported)
    }
}
