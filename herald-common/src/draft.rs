use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

/// Unsent work saved by the presentation layer while no run is active.
///
/// `recipients` is the raw, un-normalized recipient text exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "numbers")]
    pub recipients: String,
    #[serde(alias = "timestamp", deserialize_with = "saved_at")]
    pub saved_at: DateTime<Utc>,
}

impl Draft {
    #[must_use]
    pub fn new(message: impl Into<String>, recipients: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recipients: recipients.into(),
            saved_at: Utc::now(),
        }
    }

    /// A draft with neither a message nor recipients is not worth restoring
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.message.trim().is_empty() && self.recipients.trim().is_empty()
    }
}

/// RFC 3339, or a timestamp without offset taken as local time.
///
/// Older drafts were stamped as `2024-05-01T10:00:00.123456`.
fn saved_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;

    if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(at.with_timezone(&Utc));
    }

    let naive = raw
        .parse::<NaiveDateTime>()
        .map_err(|e| de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))?;

    Ok(Local
        .from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| naive.and_utc(), |at| at.with_timezone(&Utc)))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn saved_drafts_round_trip() {
        let draft = Draft::new("Meeting at 5", "9876543210");
        let json = serde_json::to_string(&draft).expect("serialize");
        let back: Draft = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, draft);
    }

    #[test]
    fn offsetless_timestamps_are_local_time() {
        let draft: Draft = serde_json::from_str(
            r#"{"message":"Hi","numbers":"9876543210","timestamp":"2024-05-01T10:00:00.123456"}"#,
        )
        .expect("deserialize");

        let local = draft.saved_at.with_timezone(&Local);
        assert_eq!((local.year(), local.month(), local.day()), (2024, 5, 1));
        assert_eq!((local.hour(), local.minute()), (10, 0));
        assert_eq!(draft.recipients, "9876543210");
    }

    #[test]
    fn garbage_timestamps_are_rejected() {
        let result = serde_json::from_str::<Draft>(r#"{"message":"Hi","saved_at":"yesterday"}"#);
        assert!(result.is_err());
    }
}
