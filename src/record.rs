use chrono::{DateTime, Utc};
use serde::Serialize;

pub const UNKNOWN_SENDER_NAME: &str = "Unknown";
pub const UNKNOWN_SENDER_EMAIL: &str = "unknown@unknown.com";
pub const NO_SUBJECT: &str = "(No subject)";

/// One normalized message summary, as produced by a message source.
///
/// `sender_email` is the aggregation key: it is always trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub sender_name: String,
    pub sender_email: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(
        sender_name: Option<&str>,
        sender_email: Option<&str>,
        subject: Option<&str>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sender_name: non_blank(sender_name)
                .unwrap_or(UNKNOWN_SENDER_NAME)
                .to_string(),
            sender_email: non_blank(sender_email)
                .unwrap_or(UNKNOWN_SENDER_EMAIL)
                .to_lowercase(),
            subject: non_blank(subject).unwrap_or(NO_SUBJECT).to_string(),
            received_at,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
