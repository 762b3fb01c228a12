//! Recipient normalization.
//!
//! Raw recipient text is a comma separated list of phone numbers as typed by
//! an operator: spaces, dashes, brackets and a leading `+` are all common. Each
//! token is reduced to its digits and classified as either a [`RecipientId`]
//! (country code followed by a ten digit subscriber number) or an
//! [`InvalidRecipient`] carrying the reason it was rejected.
//!
//! Ten digits that already begin with the country code are rejected rather
//! than guessed at: there is no way to tell a local number that happens to
//! start with `91` from a prefixed number that lost a digit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Country code every [`RecipientId`] starts with
pub const COUNTRY_CODE: &str = "91";

/// Digits in a subscriber number, excluding the country code
pub const SUBSCRIBER_DIGITS: usize = 10;

/// Total digits in a normalized identifier
pub const RECIPIENT_DIGITS: usize = COUNTRY_CODE.len() + SUBSCRIBER_DIGITS;

/// A normalized, dispatchable recipient: `91` followed by ten digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    /// Accept an identifier that is already in normalized form.
    ///
    /// # Errors
    /// Returns the classification failure if `value` is not exactly twelve
    /// ASCII digits beginning with the country code.
    pub fn parse(value: &str) -> Result<Self, InvalidRecipient> {
        if value.len() == RECIPIENT_DIGITS
            && value.starts_with(COUNTRY_CODE)
            && value.bytes().all(|b| b.is_ascii_digit())
        {
            return Ok(Self(value.to_string()));
        }

        match classify(value) {
            Ok(id) if id.0 == value => Ok(id),
            Ok(_) => Err(InvalidRecipient::new(
                value,
                InvalidReason::NotNormalized,
                digit_count(value),
            )),
            Err(invalid) => Err(invalid),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ten digit subscriber number without the country code
    #[must_use]
    pub fn subscriber(&self) -> &str {
        &self.0[COUNTRY_CODE.len()..]
    }
}

impl<'de> Deserialize<'de> for RecipientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecipientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Why a token could not be turned into a [`RecipientId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// The token contained no digits at all
    NoDigits,
    /// Ten digits starting with the country code
    AmbiguousCountryPrefix,
    /// Fewer digits than a subscriber number
    TooShort,
    /// More digits than can be safely interpreted
    TooLong,
    /// Only produced by [`RecipientId::parse`]: valid, but punctuated or
    /// missing the country code
    NotNormalized,
}

impl InvalidReason {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NoDigits => "no_digits",
            Self::AmbiguousCountryPrefix => "ambiguous_country_prefix",
            Self::TooShort => "too_short",
            Self::TooLong => "too_long",
            Self::NotNormalized => "not_normalized",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A rejected token. Reported to the caller, never dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRecipient {
    /// The token as typed, with surrounding whitespace removed
    pub raw: String,
    pub reason: InvalidReason,
    /// Number of digits found in the token
    pub digits: usize,
}

impl InvalidRecipient {
    fn new(raw: &str, reason: InvalidReason, digits: usize) -> Self {
        Self {
            raw: raw.to_string(),
            reason,
            digits,
        }
    }

    fn describe(&self) -> String {
        let detail = match self.reason {
            InvalidReason::NoDigits => "no digits".to_string(),
            InvalidReason::AmbiguousCountryPrefix => {
                format!("{SUBSCRIBER_DIGITS} digits starting with {COUNTRY_CODE}")
            }
            InvalidReason::TooShort => format!("too short: {} digits", self.digits),
            InvalidReason::TooLong => format!("too long: {} digits", self.digits),
            InvalidReason::NotNormalized => "not in normalized form".to_string(),
        };

        format!("{} ({detail})", self.raw)
    }
}

impl fmt::Display for InvalidRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl std::error::Error for InvalidRecipient {}

/// Result of normalizing a batch, both halves in input order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalized {
    pub valid: Vec<RecipientId>,
    pub invalid: Vec<InvalidRecipient>,
}

impl Normalized {
    /// Total number of non-empty tokens seen
    #[must_use]
    pub fn total(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }

    /// `true` when every token was valid
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
    }

    /// One line batch description for the pre-send report
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_clean() {
            format!("{} recipients (all valid)", self.valid.len())
        } else {
            format!(
                "{} valid, {} invalid ({} total)",
                self.valid.len(),
                self.invalid.len(),
                self.total()
            )
        }
    }
}

fn digit_count(token: &str) -> usize {
    token.bytes().filter(u8::is_ascii_digit).count()
}

/// Classify one trimmed, non-empty token
fn classify(token: &str) -> Result<RecipientId, InvalidRecipient> {
    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    let len = digits.len();
    let reject = |reason| Err(InvalidRecipient::new(token, reason, len));

    if digits.is_empty() {
        return reject(InvalidReason::NoDigits);
    }

    if digits.starts_with(COUNTRY_CODE) {
        match len {
            RECIPIENT_DIGITS => Ok(RecipientId(digits)),
            SUBSCRIBER_DIGITS => reject(InvalidReason::AmbiguousCountryPrefix),
            n if n > RECIPIENT_DIGITS => reject(InvalidReason::TooLong),
            _ => reject(InvalidReason::TooShort),
        }
    } else {
        match len {
            SUBSCRIBER_DIGITS => Ok(RecipientId(format!("{COUNTRY_CODE}{digits}"))),
            n if n > SUBSCRIBER_DIGITS => reject(InvalidReason::TooLong),
            _ => reject(InvalidReason::TooShort),
        }
    }
}

/// Split `raw` on commas and classify every non-empty token.
pub fn normalize(raw: &str) -> Normalized {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .fold(Normalized::default(), |mut out, token| {
            match classify(token) {
                Ok(id) => out.valid.push(id),
                Err(invalid) => out.invalid.push(invalid),
            }
            out
        })
}
