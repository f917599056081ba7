//! Source locations and coordinate mapping
//!
//! A [`SourceLocation`] is an immutable (byte offset, line, column) triple.
//! Offsets index into the input string, line and column are 1-based and count
//! characters, which keeps error messages readable for multi-byte input.
//!
//! Locations come in two coordinate systems: positions in the text the lexer
//! actually scans (which may have been rewritten by a preprocessor) and
//! positions in the original source. [`SourceLocation::map`] projects between
//! the two through a sorted list of checkpoint pairs, so tokens and errors can
//! always be reported against the text the user wrote.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The location of the first character of an input string.
pub const INITIAL_LOCATION: SourceLocation = SourceLocation {
    pos: 0,
    lineno: 1,
    colno: 1,
};

/// Sentinel for a location that hasn't been resolved yet.
pub const UNKNOWN_LOCATION: SourceLocation = SourceLocation {
    pos: -1,
    lineno: 0,
    colno: 0,
};

/// A position within an input string.
///
/// Locations are ordered lexicographically with the offset as the primary
/// key, which is what lets error selection keep the furthest partial parse.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SourceLocation {
    /// Byte offset into the input string.
    pub pos: isize,
    /// 1-based line number.
    pub lineno: usize,
    /// 1-based column number, counted in characters.
    pub colno: usize,
}

impl SourceLocation {
    pub fn new(pos: isize, lineno: usize, colno: usize) -> Self {
        SourceLocation { pos, lineno, colno }
    }

    /// Whether the location is unknown.
    pub fn is_unknown(&self) -> bool {
        self.pos < 0
    }

    /// Return a message formatted with the given filename and the current location.
    ///
    /// ```
    /// use tokenstream::SourceLocation;
    ///
    /// let message = SourceLocation::new(42, 3, 12).format("path/to/file.txt", "Some error message");
    /// assert_eq!(message, "path/to/file.txt:3:12: Some error message");
    /// ```
    pub fn format(&self, filename: &str, message: &str) -> String {
        format!("{}:{}:{}: {}", filename, self.lineno, self.colno, message)
    }

    /// Create a modified source location along the horizontal axis.
    pub fn with_horizontal_offset(self, offset: isize) -> SourceLocation {
        if self.is_unknown() {
            return self;
        }
        SourceLocation {
            pos: self.pos + offset,
            lineno: self.lineno,
            colno: (self.colno as isize + offset).max(0) as usize,
        }
    }

    /// Return the source location after skipping over a piece of text.
    ///
    /// The column resets to the length of the trailing line when the text
    /// contains a line break.
    pub fn skip_over(self, text: &str) -> SourceLocation {
        let pos = self.pos + text.len() as isize;
        match text.rfind('\n') {
            Some(line_start) => SourceLocation {
                pos,
                lineno: self.lineno + text.matches('\n').count(),
                colno: text[line_start + 1..].chars().count() + 1,
            },
            None => SourceLocation {
                pos,
                lineno: self.lineno,
                colno: self.colno + text.chars().count(),
            },
        }
    }

    /// Project the location from one coordinate system into another.
    ///
    /// The mappings are parallel sorted sequences of corresponding locations.
    /// The last input mapping at or before the location anchors the
    /// projection; locations before the first mapping point are unchanged.
    pub fn map(
        self,
        input_mappings: &[SourceLocation],
        output_mappings: &[SourceLocation],
    ) -> SourceLocation {
        let index = input_mappings.partition_point(|mapping| *mapping <= self);
        if index == 0 {
            return self;
        }
        self.relocate(input_mappings[index - 1], output_mappings[index - 1])
    }

    /// Return the current location transformed relative to the target location.
    ///
    /// The column is only re-based while still on the target's line.
    pub fn relocate(self, base: SourceLocation, target: SourceLocation) -> SourceLocation {
        let pos = target.pos + (self.pos - base.pos);
        let lineno =
            (target.lineno as isize + (self.lineno as isize - base.lineno as isize)) as usize;
        let colno = if lineno == target.lineno {
            (target.colno as isize + (self.colno as isize - base.colno as isize)) as usize
        } else {
            self.colno
        };
        SourceLocation { pos, lineno, colno }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lineno, self.colno)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_over_single_line() {
        let location = INITIAL_LOCATION.skip_over("hello");
        assert_eq!(location, SourceLocation::new(5, 1, 6));
    }

    #[test]
    fn skip_over_line_break() {
        let location = INITIAL_LOCATION.skip_over("hello\nworld");
        assert_eq!(location, SourceLocation::new(11, 2, 6));
    }

    #[test]
    fn skip_over_counts_characters_not_bytes() {
        let location = INITIAL_LOCATION.skip_over("héllo");
        assert_eq!(location.pos, 6);
        assert_eq!(location.colno, 6);
    }

    #[test]
    fn horizontal_offset() {
        assert_eq!(
            INITIAL_LOCATION.with_horizontal_offset(41),
            SourceLocation::new(41, 1, 42)
        );
        assert_eq!(
            UNKNOWN_LOCATION.with_horizontal_offset(41),
            UNKNOWN_LOCATION
        );
    }

    #[test]
    fn map_without_mappings_is_identity() {
        assert_eq!(INITIAL_LOCATION.map(&[], &[]), INITIAL_LOCATION);
    }

    #[test]
    fn map_through_checkpoint_pairs() {
        let input = [SourceLocation::new(16, 2, 27), SourceLocation::new(19, 2, 30)];
        let output = [SourceLocation::new(24, 3, 8), SourceLocation::new(67, 4, 12)];

        assert_eq!(INITIAL_LOCATION.map(&input, &output), INITIAL_LOCATION);
        assert_eq!(
            SourceLocation::new(15, 2, 26).map(&input, &output),
            SourceLocation::new(15, 2, 26)
        );
        assert_eq!(
            SourceLocation::new(16, 2, 27).map(&input, &output),
            SourceLocation::new(24, 3, 8)
        );
        assert_eq!(
            SourceLocation::new(18, 2, 29).map(&input, &output),
            SourceLocation::new(26, 3, 10)
        );
        assert_eq!(
            SourceLocation::new(19, 2, 30).map(&input, &output),
            SourceLocation::new(67, 4, 12)
        );
        assert_eq!(
            SourceLocation::new(31, 3, 6).map(&input, &output),
            SourceLocation::new(79, 5, 6)
        );
    }

    #[test]
    fn ordering_uses_offset_first() {
        assert!(SourceLocation::new(3, 1, 4) < SourceLocation::new(5, 1, 2));
        assert!(UNKNOWN_LOCATION < INITIAL_LOCATION);
    }
}
