//! Desktop notifications for incoming calls.

use serde::Serialize;

use super::calls::CallRecord;

/// A notification to show to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesktopNotification {
    pub title: String,
    pub text: String,
}

impl DesktopNotification {
    pub fn incoming_call(call: &CallRecord) -> Self {
        Self {
            title: "New Call".to_string(),
            text: format!("Incoming Call from {}", call.caller()),
        }
    }
}

/// Platform notification backend.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &DesktopNotification);
}

/// Backend used when the embedder provides none.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &DesktopNotification) {
        log::info!("Notification: {} - {}", notification.title, notification.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_call_prefers_user_name() {
        let call = CallRecord {
            from_user_name: Some("Ann Lee".to_string()),
            from: Some("+15550001".to_string()),
            ..CallRecord::new("1")
        };
        let notification = DesktopNotification::incoming_call(&call);
        assert_eq!(notification.title, "New Call");
        assert_eq!(notification.text, "Incoming Call from Ann Lee");
    }

    #[test]
    fn test_incoming_call_falls_back_to_number() {
        let call = CallRecord {
            from: Some("+15550001".to_string()),
            ..CallRecord::new("1")
        };
        assert_eq!(
            DesktopNotification::incoming_call(&call).text,
            "Incoming Call from +15550001"
        );
    }
}
