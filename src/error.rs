//! The `InvalidSyntax` error family
//!
//! Every failure the stream surfaces is an [`InvalidSyntax`] value: a generic
//! message, an unexpected end of input, or an unexpected token. Errors carry
//! their span in original-source coordinates, a bag of alternative errors
//! accumulated while trying speculative branches, and free-form notes.
//!
//! The merging rules in [`InvalidSyntax::add_alternative`] and
//! [`InvalidSyntax::merge`] implement "furthest partial parse wins": errors of
//! the same kind at the same position pool their expected patterns, errors at
//! different positions keep the one that got further as the representative.

use std::fmt;

use crate::location::{SourceLocation, INITIAL_LOCATION};
use crate::token::{explain_patterns, Token, TokenPattern};

/// Convenience alias for fallible stream operations.
pub type SyntaxResult<T> = Result<T, InvalidSyntax>;

/// Classification of a syntax error.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxErrorKind {
    /// Unclassified invalid syntax.
    Message(String),
    /// The input ended while one of the expected patterns was demanded.
    UnexpectedEof { expected: Vec<TokenPattern> },
    /// A token was extracted that matches none of the expected patterns.
    UnexpectedToken {
        token: Token,
        expected: Vec<TokenPattern>,
    },
}

/// An error raised when the input contains invalid syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidSyntax {
    pub kind: SyntaxErrorKind,
    /// The location of the error.
    pub location: SourceLocation,
    /// The end location of the error.
    pub end_location: SourceLocation,
    /// Other alternative errors associated with this one.
    pub alternatives: Vec<InvalidSyntax>,
    /// Free-form notes attached by the parser.
    pub notes: Vec<String>,
}

impl InvalidSyntax {
    fn new(kind: SyntaxErrorKind) -> Self {
        InvalidSyntax {
            kind,
            location: INITIAL_LOCATION,
            end_location: INITIAL_LOCATION,
            alternatives: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Create a generic syntax error with the given message.
    pub fn message(message: impl Into<String>) -> Self {
        InvalidSyntax::new(SyntaxErrorKind::Message(message.into()))
    }

    /// Create an unexpected-end-of-input error.
    pub fn unexpected_eof(expected: Vec<TokenPattern>) -> Self {
        InvalidSyntax::new(SyntaxErrorKind::UnexpectedEof { expected })
    }

    /// Create an unexpected-token error.
    pub fn unexpected_token(token: Token, expected: Vec<TokenPattern>) -> Self {
        InvalidSyntax::new(SyntaxErrorKind::UnexpectedToken { token, expected })
    }

    /// Set the span of the error.
    pub fn at(mut self, location: SourceLocation, end_location: SourceLocation) -> Self {
        self.location = location;
        self.end_location = end_location.max(location);
        self
    }

    /// Attach a note to the error.
    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Return a string representing the error and its location in a given file.
    pub fn format(&self, filename: &str) -> String {
        self.location.format(filename, &self.to_string())
    }

    /// Associate an alternative error.
    ///
    /// Errors of the same kind at the same location pool their expected
    /// patterns instead, so the final message lists every alternative that was
    /// tried at that exact position.
    pub fn add_alternative(&mut self, mut other: InvalidSyntax) {
        let pooled = match (&mut self.kind, &mut other.kind) {
            (
                SyntaxErrorKind::UnexpectedToken { expected, .. },
                SyntaxErrorKind::UnexpectedToken {
                    expected: other_expected,
                    ..
                },
            ) if self.location == other.location => {
                expected.append(other_expected);
                true
            }
            (
                SyntaxErrorKind::UnexpectedEof { expected },
                SyntaxErrorKind::UnexpectedEof {
                    expected: other_expected,
                },
            ) if self.location == other.location => {
                expected.append(other_expected);
                true
            }
            _ => false,
        };
        if !pooled {
            self.alternatives.push(other);
        }
    }

    /// Combine two branch failures into the more informative one.
    ///
    /// The error whose location is greater represents the furthest successful
    /// partial parse and becomes the representative; the other is demoted into
    /// its alternatives bag (or pooled, per [`InvalidSyntax::add_alternative`]).
    pub fn merge(self, other: InvalidSyntax) -> InvalidSyntax {
        if other.location > self.location {
            let mut other = other;
            other.add_alternative(self);
            other
        } else {
            let mut this = self;
            this.add_alternative(other);
            this
        }
    }
}

impl fmt::Display for InvalidSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SyntaxErrorKind::Message(message) => write!(f, "{message}"),
            SyntaxErrorKind::UnexpectedEof { expected } => {
                if expected.is_empty() {
                    write!(f, "Reached end of file unexpectedly.")
                } else {
                    write!(
                        f,
                        "Expected {} but reached end of file.",
                        explain_patterns(expected)
                    )
                }
            }
            SyntaxErrorKind::UnexpectedToken { token, expected } => {
                let mut value = token.value.clone();
                if value.chars().count() > 32 {
                    value = value.chars().take(30).collect();
                    value.push_str("...");
                }
                let value = if value.is_empty() {
                    String::new()
                } else {
                    format!(" '{value}'")
                };
                write!(
                    f,
                    "Expected {} but got {}{}.",
                    explain_patterns(expected),
                    token.kind,
                    value
                )
            }
        }
    }
}

impl std::error::Error for InvalidSyntax {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::UNKNOWN_LOCATION;

    fn token(kind: &str, value: &str) -> Token {
        Token::new(kind, value, INITIAL_LOCATION, UNKNOWN_LOCATION)
    }

    #[test]
    fn display_unexpected_token() {
        let error = InvalidSyntax::unexpected_token(token("word", "hello"), vec!["number".into()]);
        assert_eq!(error.to_string(), "Expected number but got word 'hello'.");
    }

    #[test]
    fn display_unexpected_token_without_patterns() {
        let error = InvalidSyntax::unexpected_token(token("invalid", "!?"), Vec::new());
        assert_eq!(error.to_string(), "Expected anything but got invalid '!?'.");
    }

    #[test]
    fn display_truncates_long_values() {
        let value = "x".repeat(40);
        let error = InvalidSyntax::unexpected_token(token("word", &value), vec!["number".into()]);
        let rendered = error.to_string();
        assert!(rendered.contains(&format!("'{}...'", "x".repeat(30))));
    }

    #[test]
    fn display_unexpected_eof() {
        let error = InvalidSyntax::unexpected_eof(vec!["word".into()]);
        assert_eq!(error.to_string(), "Expected word but reached end of file.");
        let bare = InvalidSyntax::unexpected_eof(Vec::new());
        assert_eq!(bare.to_string(), "Reached end of file unexpectedly.");
    }

    #[test]
    fn format_with_filename() {
        let error =
            InvalidSyntax::message("broken").at(SourceLocation::new(3, 1, 4), UNKNOWN_LOCATION);
        assert_eq!(error.format("demo.txt"), "demo.txt:1:4: broken");
    }

    #[test]
    fn alternatives_pool_expected_patterns_at_same_location() {
        let mut first = InvalidSyntax::unexpected_token(token("word", "hello"), vec!["add".into()]);
        let second = InvalidSyntax::unexpected_token(token("word", "hello"), vec!["sub".into()]);
        first.add_alternative(second);

        assert!(first.alternatives.is_empty());
        assert_eq!(
            first.to_string(),
            "Expected add or sub but got word 'hello'."
        );
    }

    #[test]
    fn alternatives_of_different_kinds_are_bagged() {
        let mut first = InvalidSyntax::unexpected_token(token("word", "hello"), vec!["add".into()]);
        first.add_alternative(InvalidSyntax::unexpected_eof(vec!["sub".into()]));
        assert_eq!(first.alternatives.len(), 1);
    }

    #[test]
    fn merge_keeps_the_furthest_error() {
        let near = InvalidSyntax::message("near").at(SourceLocation::new(2, 1, 3), UNKNOWN_LOCATION);
        let far = InvalidSyntax::message("far").at(SourceLocation::new(7, 1, 8), UNKNOWN_LOCATION);

        let merged = near.clone().merge(far.clone());
        assert_eq!(merged.to_string(), "far");
        assert_eq!(merged.alternatives.len(), 1);

        let merged = far.merge(near);
        assert_eq!(merged.to_string(), "far");
    }
}
