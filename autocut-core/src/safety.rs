//! Text safety filter for narration input.
//!
//! Recent speech text is untrusted: participants may read out phone numbers,
//! card numbers, or worse on a live mic. Anything the filter flags is
//! redacted before the narrator may quote it.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PII_PATTERNS: Vec<(Regex, &'static str)> = vec![
        // Card numbers, spoken or pasted into chat overlays
        (Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").unwrap(), "CARD"),

        // US social security numbers
        (Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(), "SSN"),

        // Email addresses
        (Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(), "EMAIL"),

        // Phone numbers in common formats
        (Regex::new(r"(?:\+?1[-.\s]?)?\(?[2-9]\d{2}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap(), "PHONE"),

        // Street-address-looking fragments ("123 Maple Street")
        (Regex::new(r"(?i)\b\d{1,5}\s+[a-z]+\s+(?:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr)\b").unwrap(), "ADDRESS"),
    ];

    static ref PROFANITY: Regex = Regex::new(
        r"(?i)\b(?:fuck\w*|shit\w*|bitch\w*|asshole|bastard|damn(?:it)?|crap)\b"
    ).unwrap();
}

/// Flags raised on a piece of speech text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafetyFlags {
    pub pii: bool,
    pub profanity: bool,
}

impl SafetyFlags {
    pub fn clean(&self) -> bool {
        !self.pii && !self.profanity
    }
}

pub fn scan(text: &str) -> SafetyFlags {
    SafetyFlags {
        pii: PII_PATTERNS.iter().any(|(p, _)| p.is_match(text)),
        profanity: PROFANITY.is_match(text),
    }
}

/// Redact anything flaggable, leaving the rest of the text intact.
pub fn sanitize(text: &str) -> String {
    let mut out = text.to_string();
    for (pattern, label) in PII_PATTERNS.iter() {
        let replacement = format!("[{}]", label);
        out = pattern.replace_all(&out, replacement.as_str()).to_string();
    }
    PROFANITY.replace_all(&out, "[BLEEP]").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_redacts_card_and_email() {
        let input = "my card is 1234-5678-9012-3456 and mail me at test@example.com";
        let out = sanitize(input);
        assert_eq!(out, "my card is [CARD] and mail me at [EMAIL]");
    }

    #[test]
    fn sanitize_redacts_phone() {
        assert_eq!(sanitize("call 234-567-8901 now"), "call [PHONE] now");
    }

    #[test]
    fn sanitize_bleeps_profanity() {
        let out = sanitize("that was a damn good goal");
        assert_eq!(out, "that was a [BLEEP] good goal");
    }

    #[test]
    fn scan_flags_are_independent() {
        let flags = scan("email test@example.com, what the fuck");
        assert!(flags.pii);
        assert!(flags.profanity);
        assert!(!flags.clean());
    }

    #[test]
    fn clean_text_passes_through() {
        let input = "the crowd is on its feet";
        assert!(scan(input).clean());
        assert_eq!(sanitize(input), input);
    }

    #[test]
    fn address_fragment_is_redacted() {
        let out = sanitize("I live at 42 Maple Street actually");
        assert!(out.contains("[ADDRESS]"), "got: {}", out);
    }
}
