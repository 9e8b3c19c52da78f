use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Content;

/// Update times larger than this are taken to be milliseconds. The value is
/// 2001-01-01T00:00:00Z expressed in milliseconds; no plausible seconds-based
/// timestamp exceeds it.
const MILLIS_EPOCH_THRESHOLD: f64 = 978_307_200_000.0;

/// A conversation session owned by the client until deletion.
///
/// `id` is immutable once assigned and `last_update_time` only increases;
/// the store enforces both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    /// Unix seconds, normalized on ingress via [`normalize_update_time`].
    pub last_update_time: i64,
    #[serde(default)]
    pub title: String,
}

impl Session {
    /// Build a session from a server summary, normalizing its timestamp.
    pub fn from_summary(summary: SessionSummary) -> Self {
        Self {
            id: summary.id,
            app_name: summary.app_name,
            user_id: summary.user_id,
            last_update_time: normalize_update_time(summary.last_update_time),
            title: summary.title.unwrap_or_default(),
        }
    }
}

/// Session summary as returned by the server's list/create endpoints.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSummary {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    /// Seconds or milliseconds depending on backend version; may be absent.
    pub last_update_time: Option<f64>,
    pub title: Option<String>,
}

/// Full session payload from the get-session endpoint, including the event
/// history used to reconstruct messages.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionDetail {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub last_update_time: Option<f64>,
    pub events: Vec<SessionEvent>,
}

/// One recorded event from a session's history.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionEvent {
    pub id: String,
    pub author: String,
    /// Unix seconds with fractional part, as the server records them.
    pub timestamp: Option<f64>,
    pub content: Option<Content>,
}

/// Normalize a server-provided update time to unix seconds.
///
/// Absent, zero, negative or non-finite values are replaced with the current
/// time. Values large enough to be milliseconds are divided down.
pub fn normalize_update_time(raw: Option<f64>) -> i64 {
    let now = Utc::now().timestamp();
    match raw {
        None => now,
        Some(v) if !v.is_finite() || v <= 0.0 => now,
        Some(v) if v > MILLIS_EPOCH_THRESHOLD => (v / 1000.0) as i64,
        Some(v) => v as i64,
    }
}

/// Convert an event timestamp (fractional unix seconds) to a `DateTime`,
/// falling back to the current time when absent or out of range.
pub fn event_timestamp(raw: Option<f64>) -> DateTime<Utc> {
    raw.filter(|v| v.is_finite() && *v > 0.0)
        .and_then(|v| {
            let secs = v.trunc() as i64;
            let nanos = (v.fract() * 1_000_000_000.0) as u32;
            DateTime::from_timestamp(secs, nanos)
        })
        .unwrap_or_else(Utc::now)
}
