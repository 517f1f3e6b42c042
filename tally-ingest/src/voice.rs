//! Amount and merchant from a spoken expense ("coffee 4.50 at Blue Bottle").

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceDraft {
    pub amount: Option<f64>,
    pub merchant: Option<String>,
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d{1,2})?)").expect("voice amount regex"))
}

fn merchant_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bat\s+(.+)$").expect("voice merchant regex"))
}

/// First number is the amount; everything after the first standalone "at" is
/// the merchant, otherwise the whole utterance.
pub fn parse_voice_text(text: &str) -> VoiceDraft {
    let text = text.trim();
    let amount = amount_re()
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok());
    let merchant = merchant_re()
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .or_else(|| Some(text.to_string()))
        .filter(|m| !m.is_empty());
    VoiceDraft { amount, merchant }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_and_merchant() {
        let v = parse_voice_text("Spent 23.75 at Trader Joe's ");
        assert_eq!(v.amount, Some(23.75));
        assert_eq!(v.merchant.as_deref(), Some("Trader Joe's"));
    }

    #[test]
    fn test_without_at_uses_whole_text() {
        let v = parse_voice_text("uber 18 dollars");
        assert_eq!(v.amount, Some(18.0));
        assert_eq!(v.merchant.as_deref(), Some("uber 18 dollars"));
    }

    #[test]
    fn test_no_amount() {
        let v = parse_voice_text("lunch AT the diner");
        assert_eq!(v.amount, None);
        assert_eq!(v.merchant.as_deref(), Some("the diner"));
        assert_eq!(parse_voice_text("  "), VoiceDraft::default());
    }

    #[test]
    fn test_first_at_starts_merchant() {
        let v = parse_voice_text("coffee at 9 at Blue Bottle");
        assert_eq!(v.amount, Some(9.0));
        assert_eq!(v.merchant.as_deref(), Some("9 at Blue Bottle"));
        // "at" inside a word is not a separator.
        let v = parse_voice_text("5 for a hat at Target");
        assert_eq!(v.merchant.as_deref(), Some("Target"));
    }
}
