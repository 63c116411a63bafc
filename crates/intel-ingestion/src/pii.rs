use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+").unwrap());
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+?\d{1,4}?[-.\s]?\(?\d{1,3}?\)?[-.\s]?\d{1,4}[-.\s]?\d{1,4}[-.\s]?\d{1,9}").unwrap()
});
static SSN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}[- ]?\d{2}[- ]?\d{4}\b").unwrap());
static CREDIT_CARD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:\d[ -]*?){13,16}\b").unwrap());

/// Redacts email, phone, SSN and credit-card-shaped substrings. Pattern
/// order matters: broader number patterns run last so an SSN or card
/// number isn't partially eaten by the phone pattern first.
pub fn redact_pii(text: &str) -> String {
    if text.is_empty() {
        return text.to_string();
    }
    let redacted = EMAIL_RE.replace_all(text, "[REDACTED_EMAIL]");
    let redacted = PHONE_RE.replace_all(&redacted, "[REDACTED_PHONE]");
    let redacted = SSN_RE.replace_all(&redacted, "[REDACTED_SSN]");
    let redacted = CREDIT_CARD_RE.replace_all(&redacted, "[REDACTED_CC]");
    redacted.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_email_addresses() {
        let text = "contact jane.doe@example.com for details";
        assert!(redact_pii(text).contains("[REDACTED_EMAIL]"));
        assert!(!redact_pii(text).contains("jane.doe@example.com"));
    }

    #[test]
    fn leaves_plain_text_unchanged() {
        let text = "quarterly revenue grew 12% year over year";
        assert_eq!(redact_pii(text), text);
    }

    #[test]
    fn empty_text_passes_through() {
        assert_eq!(redact_pii(""), "");
    }
}
