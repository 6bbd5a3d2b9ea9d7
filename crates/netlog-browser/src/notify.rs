use netlog_core::Rating;
use serde::Serialize;

/// Live event pushed to session subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Notification {
    Status {
        message: String,
    },
    Request {
        #[serde(rename = "type")]
        resource_type: String,
        method: String,
        url: String,
    },
    Response {
        duration_ms: f64,
        size: u64,
        url: String,
        status: u16,
    },
    WebVital {
        name: String,
        value: f64,
        rating: Rating,
        url: String,
    },
}

impl Notification {
    pub fn status(message: impl Into<String>) -> Self {
        Notification::Status {
            message: message.into(),
        }
    }
}
