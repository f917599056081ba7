//! Tokens and token patterns
//!
//! A [`Token`] is the smallest lexical unit the stream emits: a type name, the
//! exact matched text, and its span in original-source coordinates. Tokens are
//! matched against [`TokenPattern`] values, which select either every token of
//! a type or one specific spelling of it.

use serde::{Deserialize, Serialize};

use crate::location::SourceLocation;

/// A single token extracted from the input string.
///
/// Tokens are immutable once emitted; the stream hands out clones so parsers
/// can hold on to them across backtracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The token type name, as declared by the matching syntax rule.
    pub kind: String,
    /// The exact matched text. Synthetic tokens (`indent`, `dedent`, `eof`)
    /// carry an empty value.
    pub value: String,
    /// Start of the token in original-source coordinates.
    pub location: SourceLocation,
    /// End of the token, always at or after `location`.
    pub end_location: SourceLocation,
}

impl Token {
    pub fn new(
        kind: impl Into<String>,
        value: impl Into<String>,
        location: SourceLocation,
        end_location: SourceLocation,
    ) -> Self {
        Token {
            kind: kind.into(),
            value: value.into(),
            location,
            end_location,
        }
    }

    /// Match the token against a single pattern.
    pub fn matches(&self, pattern: &TokenPattern) -> bool {
        match pattern {
            TokenPattern::Kind(kind) => self.kind == *kind,
            TokenPattern::Exact(kind, value) => self.kind == *kind && self.value == *value,
        }
    }

    /// Match the token against any of the given patterns.
    pub fn matches_any(&self, patterns: &[TokenPattern]) -> bool {
        patterns.iter().any(|pattern| self.matches(pattern))
    }
}

/// A predicate over tokens: a bare type name, or a type name plus the exact
/// token value.
///
/// Both forms convert from the obvious literals, so call sites stay terse:
///
/// ```
/// use tokenstream::TokenPattern;
///
/// let by_kind: TokenPattern = "word".into();
/// let by_value: TokenPattern = ("brace", "(").into();
/// assert_ne!(by_kind, by_value);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenPattern {
    /// Any token of the given type.
    Kind(String),
    /// A token of the given type with exactly the given value.
    Exact(String, String),
}

impl From<&str> for TokenPattern {
    fn from(kind: &str) -> Self {
        TokenPattern::Kind(kind.to_string())
    }
}

impl From<String> for TokenPattern {
    fn from(kind: String) -> Self {
        TokenPattern::Kind(kind)
    }
}

impl From<(&str, &str)> for TokenPattern {
    fn from((kind, value): (&str, &str)) -> Self {
        TokenPattern::Exact(kind.to_string(), value.to_string())
    }
}

impl From<(String, String)> for TokenPattern {
    fn from((kind, value): (String, String)) -> Self {
        TokenPattern::Exact(kind, value)
    }
}

/// Return a human-readable description of an expected-pattern set.
///
/// Type names are sorted and deduplicated, long lists are truncated, and the
/// result reads like prose: `"bracket '[', number or word"`.
pub fn explain_patterns(patterns: &[TokenPattern]) -> String {
    const MAX_EXPLICIT: usize = 6;

    if patterns.is_empty() {
        return "anything".to_string();
    }

    let mut names: Vec<String> = patterns
        .iter()
        .map(|pattern| match pattern {
            TokenPattern::Kind(kind) => kind.clone(),
            TokenPattern::Exact(kind, value) => format!("{kind} '{value}'"),
        })
        .collect();
    names.sort();
    names.dedup();

    if names.len() > MAX_EXPLICIT {
        let extra = names.len() - MAX_EXPLICIT;
        names.truncate(MAX_EXPLICIT);
        names.push(format!("{extra} other tokens"));
    }

    match names.split_last() {
        Some((last, [])) => last.clone(),
        Some((last, head)) => format!("{} or {}", head.join(", "), last),
        None => "anything".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{INITIAL_LOCATION, UNKNOWN_LOCATION};

    fn token(kind: &str, value: &str) -> Token {
        Token::new(kind, value, INITIAL_LOCATION, UNKNOWN_LOCATION)
    }

    #[test]
    fn match_by_kind() {
        assert!(token("word", "hello").matches(&"word".into()));
        assert!(!token("word", "hello").matches(&"number".into()));
    }

    #[test]
    fn match_by_kind_and_value() {
        assert!(token("brace", "(").matches(&("brace", "(").into()));
        assert!(!token("brace", ")").matches(&("brace", "(").into()));
    }

    #[test]
    fn match_any() {
        let patterns: Vec<TokenPattern> = vec!["word".into(), ("brace", "(").into()];
        assert!(token("brace", "(").matches_any(&patterns));
        assert!(!token("brace", ")").matches_any(&patterns));
    }

    #[test]
    fn explain_single_pattern() {
        assert_eq!(explain_patterns(&["word".into()]), "word");
        assert_eq!(explain_patterns(&[("brace", "(").into()]), "brace '('");
    }

    #[test]
    fn explain_joins_with_trailing_or() {
        let patterns: Vec<TokenPattern> = vec!["word".into(), "number".into(), "brace".into()];
        assert_eq!(explain_patterns(&patterns), "brace, number or word");
    }

    #[test]
    fn explain_empty_set() {
        assert_eq!(explain_patterns(&[]), "anything");
    }

    #[test]
    fn explain_deduplicates() {
        let patterns: Vec<TokenPattern> = vec!["word".into(), "word".into()];
        assert_eq!(explain_patterns(&patterns), "word");
    }

    #[test]
    fn explain_truncates_long_lists() {
        let patterns: Vec<TokenPattern> =
            (0..9).map(|i| TokenPattern::Kind(format!("t{i}"))).collect();
        assert_eq!(
            explain_patterns(&patterns),
            "t0, t1, t2, t3, t4, t5 or 3 other tokens"
        );
    }
}
