//! Property tests for recipient normalization

use herald_common::{InvalidReason, normalize};
use proptest::prelude::*;

/// Ten digits that do not begin with the country code
fn local_number() -> impl Strategy<Value = String> {
    "[0-9]{10}".prop_filter("must not start with 91", |s| !s.starts_with("91"))
}

/// Wrap digits in the punctuation operators tend to type
fn decorate(digits: &str, style: u8) -> String {
    match style % 4 {
        0 => digits.to_string(),
        1 => format!("+{digits}"),
        2 => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        _ => digits
            .chars()
            .enumerate()
            .map(|(i, c)| if i % 2 == 1 { format!("{c} ") } else { c.to_string() })
            .collect(),
    }
}

proptest! {
    #[test]
    fn local_numbers_gain_country_code(digits in local_number(), style in any::<u8>()) {
        let out = normalize(&decorate(&digits, style));

        prop_assert!(out.invalid.is_empty());
        prop_assert_eq!(out.valid.len(), 1);
        prop_assert_eq!(out.valid[0].as_str(), format!("91{digits}"));
    }

    #[test]
    fn ten_digits_with_prefix_are_ambiguous(rest in "[0-9]{8}") {
        let token = format!("91{rest}");
        let out = normalize(&token);

        prop_assert!(out.valid.is_empty());
        prop_assert_eq!(out.invalid.len(), 1);
        prop_assert_eq!(out.invalid[0].reason, InvalidReason::AmbiguousCountryPrefix);
    }

    #[test]
    fn normalizing_is_idempotent(batch in prop::collection::vec(local_number(), 0..20)) {
        let first = normalize(&batch.join(", "));
        let rendered = first
            .valid
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let second = normalize(&rendered);

        prop_assert!(second.invalid.is_empty());
        prop_assert_eq!(second.valid, first.valid);
    }

    #[test]
    fn order_and_count_are_preserved(tokens in prop::collection::vec("[0-9a-z +()-]{0,16}", 0..30)) {
        let out = normalize(&tokens.join(","));
        let non_empty = tokens.iter().filter(|t| !t.trim().is_empty()).count();

        prop_assert_eq!(out.total(), non_empty);

        let raws: Vec<_> = tokens
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        let invalid_raws: Vec<_> = out.invalid.iter().map(|i| i.raw.as_str()).collect();
        let expected: Vec<_> = raws
            .iter()
            .copied()
            .filter(|raw| invalid_raws.contains(raw))
            .collect();
        prop_assert_eq!(invalid_raws, expected);
    }
}
