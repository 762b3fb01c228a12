use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// The body sent to every recipient of a run.
///
/// The body is opaque to the engine; any length limit belongs to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Arc<str>);

impl Message {
    #[must_use]
    pub fn new(body: impl AsRef<str>) -> Self {
        Self(Arc::from(body.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the body has nothing but whitespace in it
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// A single-line preview of at most `max_chars` characters, with `...`
    /// appended when the body was cut short.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.0.replace(['\r', '\n'], " ");
        if flat.chars().count() > max_chars {
            let mut cut: String = flat.chars().take(max_chars).collect();
            cut.push_str("...");
            cut
        } else {
            flat
        }
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Message;

    #[test]
    fn blank_messages() {
        assert!(Message::from("   \n\t").is_blank());
        assert!(!Message::from(" hi ").is_blank());
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let message = Message::from("héllo\nworld");
        assert_eq!(message.preview(5), "héllo...");
        assert_eq!(message.preview(50), "héllo world");
    }
}
