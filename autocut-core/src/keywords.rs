//! Whole-word, case-insensitive keyword matching against transcripts.

use regex::Regex;

/// A compiled keyword bag. Built once at startup from configuration.
#[derive(Debug)]
pub struct KeywordBag {
    pattern: Option<Regex>,
}

impl KeywordBag {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let escaped: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        if escaped.is_empty() {
            return Self { pattern: None };
        }
        // One alternation keeps matching a single pass per transcript.
        let pattern = format!(r"(?i)\b(?:{})\b", escaped.join("|"));
        Self {
            pattern: Some(Regex::new(&pattern).expect("escaped keywords always compile")),
        }
    }

    /// All keyword hits in order of appearance, lowercased, duplicates kept
    /// (the booster counts occurrences).
    pub fn extract(&self, text: &str) -> Vec<String> {
        match &self.pattern {
            Some(re) => re
                .find_iter(text)
                .map(|m| m.as_str().to_lowercase())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_whole_words_case_insensitive() {
        let bag = KeywordBag::new(&["goal", "wow"]);
        assert_eq!(bag.extract("GOAL! what a goal. wow"), vec!["goal", "goal", "wow"]);
    }

    #[test]
    fn no_substring_matches() {
        let bag = KeywordBag::new(&["goal"]);
        assert!(bag.extract("goalkeeper").is_empty());
        assert!(bag.extract("goals").is_empty());
        assert_eq!(bag.extract("own goal, again"), vec!["goal"]);
    }

    #[test]
    fn empty_bag_matches_nothing() {
        let bag = KeywordBag::new::<&str>(&[]);
        assert!(bag.is_empty());
        assert!(bag.extract("goal").is_empty());
    }
}
