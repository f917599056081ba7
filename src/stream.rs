//! The token stream facade
//!
//! [`TokenStream`] owns the whole tokenizing pipeline: the lazy regex-driven
//! lexing loop, the scoped syntax-rule stack, the append-only token buffer
//! with its integer cursor, the indentation extension, and the
//! checkpoint-based backtracking primitives.
//!
//! Design notes
//!
//! Tokens are lexed on demand into an append-only buffer. The cursor is an
//! index into that buffer, so backtracking is a pure integer rewind and a
//! rolled-back parse replays buffered tokens without touching the regex
//! engine again.
//!
//! Scopes are expressed as closures: each scope method snapshots exactly
//! the state it owns, runs the closure, and restores the snapshot before
//! returning, on both the success and the error path.
//!
//! Compiled rule-sets are memoized process-wide. Structurally equal scopes
//! reuse one compiled alternation no matter how often a grammar rule is
//! re-entered.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{InvalidSyntax, SyntaxErrorKind, SyntaxResult};
use crate::location::{SourceLocation, INITIAL_LOCATION};
use crate::token::{Token, TokenPattern};

/// Ordered syntax rules: a pattern of `None` is an explicit off-marker that
/// masks any same-named rule from an outer scope.
pub type SyntaxRules = Vec<(String, Option<String>)>;

/// A preprocessed input: the rewritten text plus the parallel mapping tables
/// anchoring it back to the original source.
pub type PreprocessedSource = (String, Vec<SourceLocation>, Vec<SourceLocation>);

/// Rules appended after the scope's own rules. The catch-all `invalid` rule
/// guarantees the lexing loop always advances while input remains.
const IMPLICIT_RULES: [(&str, &str); 3] = [
    ("newline", r"\n"),
    ("whitespace", r"[ \t]+"),
    ("invalid", r".+"),
];

/// Tab stop used when comparing indentation widths.
const TAB_WIDTH: usize = 8;

static REGEX_CACHE: Lazy<RwLock<HashMap<Vec<(String, String)>, Arc<Regex>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Fetch the compiled alternation for a rule-set, compiling at most once
/// process-wide per distinct ordered rule tuple.
fn compiled_regex(rules: &SyntaxRules) -> Arc<Regex> {
    let active: Vec<(String, String)> = rules
        .iter()
        .filter_map(|(name, pattern)| pattern.as_ref().map(|p| (name.clone(), p.clone())))
        .collect();

    if let Some(regex) = REGEX_CACHE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&active)
    {
        return Arc::clone(regex);
    }

    let regex = Arc::new(bake_regex(&active));
    let mut cache = REGEX_CACHE.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(cache.entry(active).or_insert(regex))
}

fn bake_regex(active: &[(String, String)]) -> Regex {
    let mut pattern = String::from(r"\A(?:");
    let mut separator = "";

    let implicit = IMPLICIT_RULES
        .iter()
        .filter(|(name, _)| !active.iter().any(|(declared, _)| declared == name))
        .copied();

    for (name, rule) in active
        .iter()
        .map(|(name, rule)| (name.as_str(), rule.as_str()))
        .chain(implicit)
    {
        pattern.push_str(&format!("{separator}(?P<{name}>{rule})"));
        separator = "|";
    }
    pattern.push(')');

    Regex::new(&pattern)
        .unwrap_or_else(|error| panic!("failed to compile syntax rules: {error}"))
}

/// Tab-expanded width of a run of leading whitespace.
fn expanded_width(value: &str) -> usize {
    value.chars().fold(0, |width, c| {
        if c == '\t' {
            (width / TAB_WIDTH + 1) * TAB_WIDTH
        } else {
            width + 1
        }
    })
}

/// Commit handle yielded by [`TokenStream::checkpoint`].
///
/// Until [`Checkpoint::commit`] is invoked the stream rewinds to the saved
/// cursor position when the checkpointed closure returns; committing makes the
/// closure's progress permanent. Committing more than once is a no-op.
#[derive(Debug)]
pub struct Checkpoint {
    committed: bool,
}

impl Checkpoint {
    /// Keep the state of the stream at the end of the checkpointed closure.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Whether the checkpoint was committed.
    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

/// A versatile token stream for handwritten parsers.
///
/// Grammar rules declare the tokens they recognize with [`syntax`] scopes,
/// pull tokens with [`expect`]/[`get`]/[`peek`], and try speculative parses
/// with [`checkpoint`]/[`alternative`]/[`choose`].
///
/// ```
/// use tokenstream::TokenStream;
///
/// let mut stream = TokenStream::new("hello world");
/// let words = stream.syntax(&[("word", r"[a-z]+")], |stream| {
///     stream.iter().map(|token| token.value).collect::<Vec<_>>()
/// });
/// assert_eq!(words, ["hello", "world"]);
/// ```
///
/// A stream is a mutable cursor over a shared buffer and is not meant to be
/// used from multiple threads; use [`TokenStream::copy`] to explore a
/// sub-region independently.
///
/// [`syntax`]: TokenStream::syntax
/// [`expect`]: TokenStream::expect
/// [`get`]: TokenStream::get
/// [`peek`]: TokenStream::peek
/// [`checkpoint`]: TokenStream::checkpoint
/// [`alternative`]: TokenStream::alternative
/// [`choose`]: TokenStream::choose
pub struct TokenStream {
    source: Arc<str>,
    preprocessed: Arc<str>,
    source_mappings: Arc<[SourceLocation]>,
    preprocessed_mappings: Arc<[SourceLocation]>,

    syntax_rules: SyntaxRules,
    regex: Arc<Regex>,

    /// Position of the next token to extract, in preprocessed coordinates.
    location: SourceLocation,

    /// Cursor into the token buffer; -1 before the first token.
    index: isize,
    tokens: Vec<Token>,

    indentation: Vec<usize>,
    indentation_skip: HashSet<String>,
    ignored_tokens: HashSet<String>,

    data: HashMap<String, Box<dyn Any>>,
    eof_emitted: bool,
}

impl TokenStream {
    /// Create a stream over the given input string.
    pub fn new(source: impl Into<String>) -> Self {
        let source: Arc<str> = source.into().into();
        let preprocessed = Arc::clone(&source);
        Self::from_parts(source, preprocessed, Vec::new().into(), Vec::new().into())
    }

    /// Create a stream whose input is rewritten by a preprocessing pass.
    ///
    /// The preprocessor receives the original text and returns the rewritten
    /// text plus two parallel mapping tables: corresponding locations in the
    /// original and in the rewritten text at every point where the two
    /// diverge. Token spans and error locations stay anchored to the original
    /// source.
    pub fn with_preprocessor(
        source: impl Into<String>,
        preprocessor: impl FnOnce(&str) -> PreprocessedSource,
    ) -> Self {
        let source: Arc<str> = source.into().into();
        let (preprocessed, source_mappings, preprocessed_mappings) = preprocessor(&source);
        Self::from_parts(
            source,
            preprocessed.into(),
            source_mappings.into(),
            preprocessed_mappings.into(),
        )
    }

    fn from_parts(
        source: Arc<str>,
        preprocessed: Arc<str>,
        source_mappings: Arc<[SourceLocation]>,
        preprocessed_mappings: Arc<[SourceLocation]>,
    ) -> Self {
        let syntax_rules = SyntaxRules::new();
        let regex = compiled_regex(&syntax_rules);
        TokenStream {
            source,
            preprocessed,
            source_mappings,
            preprocessed_mappings,
            syntax_rules,
            regex,
            location: INITIAL_LOCATION,
            index: -1,
            tokens: Vec::new(),
            indentation: Vec::new(),
            indentation_skip: HashSet::new(),
            ignored_tokens: ["whitespace", "newline", "eof"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            data: HashMap::new(),
            eof_emitted: false,
        }
    }

    /// Create an independent stream over the same input.
    ///
    /// The copy shares the immutable input text (and the process-wide
    /// compiled-regex cache) but starts with its own buffer, cursor, and
    /// scopes, so exploratory sub-parses don't affect this stream.
    pub fn copy(&self) -> TokenStream {
        Self::from_parts(
            Arc::clone(&self.source),
            Arc::clone(&self.preprocessed),
            Arc::clone(&self.source_mappings),
            Arc::clone(&self.preprocessed_mappings),
        )
    }

    /// The original input string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The input string the lexer scans, as rewritten by the preprocessor.
    pub fn preprocessed_source(&self) -> &str {
        &self.preprocessed
    }

    /// The currently active syntax rules, innermost first.
    pub fn syntax_rules(&self) -> &[(String, Option<String>)] {
        &self.syntax_rules
    }

    /// All tokens extracted so far, including ignored ones.
    ///
    /// The buffer is append-only and also holds tokens beyond the cursor that
    /// were buffered for backtracking; prefer [`TokenStream::expect`],
    /// [`TokenStream::peek`], and friends over indexing into it.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The current token, if the stream started extracting tokens.
    pub fn current(&self) -> Option<&Token> {
        if self.index >= 0 {
            self.tokens.get(self.index as usize)
        } else {
            None
        }
    }

    /// The token extracted immediately before the current one.
    ///
    /// Unlike `peek(-1)` this does not skip ignored tokens.
    pub fn previous(&self) -> Option<&Token> {
        if self.index >= 1 {
            self.tokens.get(self.index as usize - 1)
        } else {
            None
        }
    }

    /// The remaining unconsumed original source text.
    pub fn leftover(&self) -> &str {
        let pos = self
            .current()
            .map(|token| token.end_location.pos.max(0) as usize)
            .unwrap_or(0);
        &self.source[pos.min(self.source.len())..]
    }

    /// [`TokenStream::head`] with the usual width for error messages.
    pub fn head_default(&self) -> &str {
        self.head(50)
    }

    /// Preview up to `characters` characters ahead of the current token,
    /// truncated at the first line break. Useful for error messages.
    pub fn head(&self, characters: usize) -> &str {
        let line = self.leftover().split('\n').next().unwrap_or("");
        match line.char_indices().nth(characters) {
            Some((cut, _)) => &line[..cut],
            None => line,
        }
    }

    // Lexing loop ----------------------------------------------------------

    /// Append a token at the current lexing position, projecting its span
    /// into original-source coordinates.
    fn emit(&mut self, kind: &str, value: &str) {
        let end = self.location.skip_over(value);
        self.tokens.push(Token {
            kind: kind.to_string(),
            value: value.to_string(),
            location: self
                .location
                .map(&self.preprocessed_mappings, &self.source_mappings),
            end_location: end.map(&self.preprocessed_mappings, &self.source_mappings),
        });
        self.location = end;
    }

    /// Width of pending indentation to reconcile before emitting `upcoming`,
    /// if the indentation extension should run at all.
    fn pending_indentation(&self, upcoming: &str) -> Option<usize> {
        if self.indentation.is_empty() || self.indentation_skip.contains(upcoming) {
            return None;
        }
        let last = self.tokens.last()?;
        if last.kind == "whitespace" && last.location.colno == 1 {
            Some(expanded_width(&last.value))
        } else if last.kind == "newline" && upcoming != "whitespace" && upcoming != "newline" {
            // A line with zero leading whitespace still closes open indents.
            Some(0)
        } else {
            None
        }
    }

    fn reconcile_indentation(&mut self, upcoming: &str) {
        let Some(width) = self.pending_indentation(upcoming) else {
            return;
        };
        while self.indentation.last().is_some_and(|top| width < *top) {
            self.emit("dedent", "");
            self.indentation.pop();
        }
        if self.indentation.last().is_some_and(|top| width > *top) {
            self.indentation.push(width);
            self.emit("indent", "");
        }
    }

    /// Extract at least one more token into the buffer. Returns false once
    /// the input, pending dedents, and the final `eof` token are exhausted.
    fn pull(&mut self) -> bool {
        let pos = self.location.pos.max(0) as usize;
        if pos < self.preprocessed.len() {
            let text = Arc::clone(&self.preprocessed);
            let rest = &text[pos..];
            let regex = Arc::clone(&self.regex);
            let matched = regex
                .captures(rest)
                .and_then(|captures| {
                    regex
                        .capture_names()
                        .flatten()
                        .find_map(|name| Some((name, captures.name(name)?.as_str())))
                })
                .filter(|(_, value)| !value.is_empty());

            match matched {
                Some((kind, value)) => {
                    self.reconcile_indentation(kind);
                    self.emit(kind, value);
                }
                None => {
                    // A zero-width rule match would stall the stream; consume
                    // one character as invalid input instead.
                    let width = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                    self.reconcile_indentation("invalid");
                    self.emit("invalid", &rest[..width]);
                }
            }
            return true;
        }

        if self.indentation.len() > 1 {
            self.emit("dedent", "");
            self.indentation.pop();
            return true;
        }

        if !self.eof_emitted {
            self.eof_emitted = true;
            self.emit("eof", "");
            return true;
        }

        false
    }

    /// Clear upcoming precomputed tokens and rewind the lexing position to
    /// the end of the last consumed token.
    ///
    /// Tokens buffered beyond the cursor were lexed under state that is no
    /// longer in effect whenever a scope changes the recognizable syntax, so
    /// the scope methods crop on entry and on exit.
    fn crop(&mut self) {
        let keep = (self.index + 1).max(0) as usize;
        if keep < self.tokens.len() {
            self.tokens.truncate(keep);
        }
        self.location = match self.current() {
            Some(token) => token
                .end_location
                .map(&self.source_mappings, &self.preprocessed_mappings),
            None => INITIAL_LOCATION,
        };
        self.eof_emitted = matches!(self.current(), Some(token) if token.kind == "eof");
    }

    // Navigation -----------------------------------------------------------

    fn advance_raw(&mut self) -> Option<Token> {
        while self.index + 1 >= self.tokens.len() as isize {
            if !self.pull() {
                return None;
            }
        }
        self.index += 1;
        Some(self.tokens[self.index as usize].clone())
    }

    /// Advance to the next non-ignored token, lexing on demand.
    ///
    /// Ignored tokens stay in the buffer so backtracking and
    /// [`TokenStream::intercept`] can still observe them.
    pub fn advance(&mut self) -> Option<Token> {
        loop {
            let token = self.advance_raw()?;
            if !self.ignored_tokens.contains(&token.kind) {
                return Some(token);
            }
        }
    }

    /// Iterate over the remaining non-ignored tokens.
    pub fn iter(&mut self) -> impl Iterator<Item = Token> + '_ {
        std::iter::from_fn(move || self.advance())
    }

    /// Iterate over the remaining tokens, erroring on `invalid` input.
    ///
    /// This is the zero-pattern collect form: it consumes the whole stream
    /// but refuses text that no syntax rule recognized.
    pub fn remaining(&mut self) -> impl Iterator<Item = SyntaxResult<Token>> + '_ {
        std::iter::from_fn(move || {
            let token = self.advance()?;
            Some(if token.kind == "invalid" {
                Err(self.emit_error(InvalidSyntax::unexpected_token(token, Vec::new())))
            } else {
                Ok(token)
            })
        })
    }

    /// Peek around the current token without moving the cursor.
    ///
    /// `peek(1)` is the next token the stream would return; larger `n` looks
    /// further ahead. Negative `n` looks backward through already-consumed,
    /// non-ignored tokens. Returns `None` past either end.
    pub fn peek(&mut self, n: isize) -> Option<Token> {
        let saved = self.index;
        let result = self.peek_walk(n);
        self.index = saved;
        result
    }

    fn peek_walk(&mut self, mut n: isize) -> Option<Token> {
        let mut token = None;
        while n < 0 {
            if self.index <= 0 {
                return None;
            }
            let mut found = false;
            while self.index > 0 {
                self.index -= 1;
                let candidate = &self.tokens[self.index as usize];
                if !self.ignored_tokens.contains(&candidate.kind) {
                    token = Some(candidate.clone());
                    found = true;
                    break;
                }
            }
            if !found {
                return None;
            }
            n += 1;
        }
        for _ in 0..n {
            token = Some(self.advance()?);
        }
        token
    }

    // Matching -------------------------------------------------------------

    /// Stamp an error with a location before it leaves the stream.
    fn emit_error(&self, mut error: InvalidSyntax) -> InvalidSyntax {
        let location = self
            .current()
            .map(|token| token.end_location)
            .unwrap_or(INITIAL_LOCATION);
        error.location = location;
        error.end_location = location;
        if let SyntaxErrorKind::UnexpectedToken { token, .. } = &error.kind {
            error.location = token.location;
            error.end_location = token.end_location;
        }
        error
    }

    fn pattern_allows(&self, token: &Token, patterns: &[TokenPattern]) -> bool {
        if patterns.is_empty() {
            token.kind != "invalid"
        } else {
            token.matches_any(patterns)
        }
    }

    /// Consume and return the next token if it matches one of the patterns.
    ///
    /// An empty pattern slice matches anything except `invalid` input. Raises
    /// `UnexpectedToken` when the next token matches no pattern and
    /// `UnexpectedEOF` when the input is exhausted.
    pub fn expect_any(&mut self, patterns: &[TokenPattern]) -> SyntaxResult<Token> {
        match self.peek(1) {
            Some(token) => {
                if self.pattern_allows(&token, patterns) {
                    self.advance();
                    Ok(token)
                } else {
                    Err(self.emit_error(InvalidSyntax::unexpected_token(
                        token,
                        patterns.to_vec(),
                    )))
                }
            }
            None => Err(self.emit_error(InvalidSyntax::unexpected_eof(patterns.to_vec()))),
        }
    }

    /// Consume and return the next token if it matches the pattern.
    ///
    /// ```
    /// use tokenstream::TokenStream;
    ///
    /// let mut stream = TokenStream::new("hello world");
    /// stream.syntax(&[("word", r"[a-z]+")], |stream| {
    ///     assert_eq!(stream.expect("word")?.value, "hello");
    ///     assert_eq!(stream.expect(("word", "world"))?.value, "world");
    ///     Ok::<_, tokenstream::InvalidSyntax>(())
    /// }).unwrap();
    /// ```
    pub fn expect(&mut self, pattern: impl Into<TokenPattern>) -> SyntaxResult<Token> {
        self.expect_any(&[pattern.into()])
    }

    /// Like [`TokenStream::expect_any`] but reports which pattern matched:
    /// the result holds the token at the index of the matching pattern and
    /// `None` everywhere else.
    pub fn expect_slots(&mut self, patterns: &[TokenPattern]) -> SyntaxResult<Vec<Option<Token>>> {
        if let Some(slots) = self.collect_slots(patterns) {
            return Ok(slots);
        }
        match self.peek(1) {
            Some(token) => Err(self.emit_error(InvalidSyntax::unexpected_token(
                token,
                patterns.to_vec(),
            ))),
            None => Err(self.emit_error(InvalidSyntax::unexpected_eof(patterns.to_vec()))),
        }
    }

    /// Non-raising [`TokenStream::expect`]: `None` when the next token
    /// doesn't match or the stream ended.
    pub fn get(&mut self, pattern: impl Into<TokenPattern>) -> Option<Token> {
        self.get_any(&[pattern.into()])
    }

    /// Non-raising [`TokenStream::expect_any`].
    pub fn get_any(&mut self, patterns: &[TokenPattern]) -> Option<Token> {
        let token = self.peek(1)?;
        if self.pattern_allows(&token, patterns) {
            self.advance();
            Some(token)
        } else {
            None
        }
    }

    /// One step of collecting tokens against a pattern set.
    ///
    /// Returns the token at the index of the first matching pattern, or
    /// `None` (consuming nothing) at the first token that matches no pattern,
    /// so a `while let` loop collects a run of matches:
    ///
    /// ```
    /// use tokenstream::TokenStream;
    ///
    /// let mut stream = TokenStream::new("hello world 123");
    /// stream.syntax(&[("word", r"[a-z]+"), ("number", r"[0-9]+")], |stream| {
    ///     let mut words = 0;
    ///     let mut numbers = 0;
    ///     while let Some(slots) = stream.collect_slots(&["word".into(), "number".into()]) {
    ///         if slots[0].is_some() { words += 1; }
    ///         if slots[1].is_some() { numbers += 1; }
    ///     }
    ///     assert_eq!((words, numbers), (2, 1));
    /// });
    /// ```
    pub fn collect_slots(&mut self, patterns: &[TokenPattern]) -> Option<Vec<Option<Token>>> {
        if patterns.is_empty() {
            return None;
        }
        let token = self.peek(1)?;
        let slots: Vec<Option<Token>> = patterns
            .iter()
            .map(|pattern| token.matches(pattern).then(|| token.clone()))
            .collect();
        if slots.iter().all(Option::is_none) {
            return None;
        }
        self.advance();
        Some(slots)
    }

    /// One step of scanning for a terminator.
    ///
    /// Returns `true` while the next token doesn't match any of the given
    /// patterns, consumes the terminator and returns `false` once it does,
    /// and raises `UnexpectedEOF` if the input ends first.
    pub fn peek_until(&mut self, patterns: &[TokenPattern]) -> SyntaxResult<bool> {
        match self.peek(1) {
            Some(token) if token.matches_any(patterns) => {
                self.advance();
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Err(self.emit_error(InvalidSyntax::unexpected_eof(patterns.to_vec()))),
        }
    }

    /// Raise `UnexpectedToken` if any non-ignored input remains.
    pub fn expect_eof(&mut self) -> SyntaxResult<()> {
        self.intercept(&["eof"], |stream| stream.expect("eof").map(|_| ()))
    }

    // Scopes ---------------------------------------------------------------

    fn scoped_syntax<T>(
        &mut self,
        entries: SyntaxRules,
        replace: bool,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let previous_rules = std::mem::take(&mut self.syntax_rules);
        let previous_regex = Arc::clone(&self.regex);

        let mut combined = entries;
        if !replace {
            let inherited: Vec<(String, Option<String>)> = previous_rules
                .iter()
                .filter(|(name, _)| !combined.iter().any(|(declared, _)| declared == name))
                .cloned()
                .collect();
            combined.extend(inherited);
        }
        self.syntax_rules = combined;
        self.regex = compiled_regex(&self.syntax_rules);
        self.crop();

        let result = f(self);

        self.syntax_rules = previous_rules;
        self.regex = previous_regex;
        self.crop();
        result
    }

    /// Extend the recognized token syntax for the extent of the closure.
    ///
    /// Rules declared here take precedence over same-named rules from outer
    /// scopes. Entering and exiting the scope discards tokens buffered beyond
    /// the cursor, since they were lexed under a rule-set no longer in effect.
    ///
    /// Panics if one of the rule patterns is not a valid regular expression.
    pub fn syntax<T>(&mut self, rules: &[(&str, &str)], f: impl FnOnce(&mut Self) -> T) -> T {
        let entries = rules
            .iter()
            .map(|(name, pattern)| (name.to_string(), Some(pattern.to_string())))
            .collect();
        self.scoped_syntax(entries, false, f)
    }

    /// Disable the given rules for the extent of the closure.
    ///
    /// Unlike simply shadowing, the rules are removed from visibility: nested
    /// scopes see them as absent unless they re-declare them.
    pub fn disable_syntax<T>(&mut self, names: &[&str], f: impl FnOnce(&mut Self) -> T) -> T {
        let entries = names.iter().map(|name| (name.to_string(), None)).collect();
        self.scoped_syntax(entries, false, f)
    }

    /// Overwrite the recognized token syntax instead of extending it.
    pub fn reset_syntax<T>(&mut self, rules: &[(&str, &str)], f: impl FnOnce(&mut Self) -> T) -> T {
        let entries = rules
            .iter()
            .map(|(name, pattern)| (name.to_string(), Some(pattern.to_string())))
            .collect();
        self.scoped_syntax(entries, true, f)
    }

    fn scoped_indent<T>(
        &mut self,
        enable: bool,
        skip: Option<&[&str]>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let previous_indentation = std::mem::replace(
            &mut self.indentation,
            if enable { vec![0] } else { Vec::new() },
        );
        let previous_skip = skip.map(|skip| {
            std::mem::replace(
                &mut self.indentation_skip,
                skip.iter().map(|kind| kind.to_string()).collect(),
            )
        });
        self.crop();

        let result = f(self);

        self.indentation = previous_indentation;
        if let Some(previous) = previous_skip {
            self.indentation_skip = previous;
        }
        self.crop();
        result
    }

    /// Enable indentation tracking for the extent of the closure.
    ///
    /// While enabled the stream tracks the current indentation level and
    /// emits balanced `indent`/`dedent` tokens when it changes; every level
    /// still open at end of input is closed with a final `dedent`.
    pub fn indent<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scoped_indent(true, None, f)
    }

    /// Like [`TokenStream::indent`], but tokens of the given types don't
    /// trigger indentation changes. The usual candidate is comments.
    pub fn indent_with_skip<T>(&mut self, skip: &[&str], f: impl FnOnce(&mut Self) -> T) -> T {
        self.scoped_indent(true, Some(skip), f)
    }

    /// Disable indentation tracking for the extent of the closure.
    ///
    /// This clears the indentation stack; re-enabling starts back at level 0.
    /// Different from ignoring `indent`/`dedent` tokens, which leaves the
    /// stack in place.
    pub fn indent_disabled<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scoped_indent(false, None, f)
    }

    /// Stop skipping tokens of the given types for the extent of the closure.
    ///
    /// Lets a parser explicitly observe tokens ignored by default, like
    /// `whitespace` and `newline`.
    pub fn intercept<T>(&mut self, kinds: &[&str], f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.ignored_tokens.clone();
        for kind in kinds {
            self.ignored_tokens.remove(*kind);
        }
        let result = f(self);
        self.ignored_tokens = previous;
        result
    }

    /// Skip tokens of the given types for the extent of the closure.
    pub fn ignore<T>(&mut self, kinds: &[&str], f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.ignored_tokens.clone();
        for kind in kinds {
            self.ignored_tokens.insert(kind.to_string());
        }
        let result = f(self);
        self.ignored_tokens = previous;
        result
    }

    /// Attach a value to the stream for the extent of the closure.
    ///
    /// This passes parser configuration down a call chain without global
    /// state; any previously provided value for the key is restored on exit.
    pub fn provide<T>(
        &mut self,
        key: &str,
        value: impl Any,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let previous = self.data.insert(key.to_string(), Box::new(value));
        let result = f(self);
        match previous {
            Some(value) => {
                self.data.insert(key.to_string(), value);
            }
            None => {
                self.data.remove(key);
            }
        }
        result
    }

    /// Remove the given keys from the attached data for the extent of the
    /// closure.
    pub fn reset<T>(&mut self, keys: &[&str], f: impl FnOnce(&mut Self) -> T) -> T {
        let previous: Vec<(String, Option<Box<dyn Any>>)> = keys
            .iter()
            .map(|key| (key.to_string(), self.data.remove(*key)))
            .collect();
        let result = f(self);
        for (key, value) in previous {
            if let Some(value) = value {
                self.data.insert(key, value);
            }
        }
        result
    }

    /// Look up a value attached with [`TokenStream::provide`].
    pub fn data<T: Any>(&self, key: &str) -> Option<&T> {
        self.data.get(key)?.downcast_ref()
    }

    // Backtracking ---------------------------------------------------------

    /// Run a speculative parse that rewinds unless committed.
    ///
    /// The closure receives a [`Checkpoint`] handle. If it never commits, the
    /// cursor rewinds to where it was on entry and a syntax error raised by
    /// the closure is swallowed (`Ok(None)`). Buffered tokens are kept across
    /// the rewind and replayed on the next advance, so nothing is re-lexed.
    /// After a commit, progress is permanent and errors propagate.
    pub fn checkpoint<T>(
        &mut self,
        f: impl FnOnce(&mut Self, &mut Checkpoint) -> SyntaxResult<T>,
    ) -> SyntaxResult<Option<T>> {
        let saved = self.index;
        let mut handle = Checkpoint { committed: false };
        match f(self, &mut handle) {
            Ok(value) => {
                if !handle.committed {
                    self.index = saved;
                }
                Ok(Some(value))
            }
            Err(error) => {
                if handle.committed {
                    Err(error)
                } else {
                    self.index = saved;
                    Ok(None)
                }
            }
        }
    }

    /// A checkpoint that commits automatically when the closure succeeds.
    ///
    /// With `active` false this is a plain pass-through: no rewind, and
    /// errors propagate. Useful when only some branches of a parse should be
    /// speculative.
    pub fn alternative<T>(
        &mut self,
        active: bool,
        f: impl FnOnce(&mut Self) -> SyntaxResult<T>,
    ) -> SyntaxResult<Option<T>> {
        if !active {
            return f(self).map(Some);
        }
        self.checkpoint(|stream, commit| {
            let value = f(stream)?;
            commit.commit();
            Ok(value)
        })
    }

    /// Trial each option in turn, returning the first that succeeds.
    ///
    /// All but the last option run speculatively: a failure rewinds the
    /// cursor and is folded into a running best error per
    /// [`InvalidSyntax::merge`], so the most informative failure represents
    /// the whole set. The last option's error is raised as-is with the merged
    /// best error attached as an alternative.
    pub fn choose<T>(
        &mut self,
        options: &mut [&mut dyn FnMut(&mut TokenStream) -> SyntaxResult<T>],
    ) -> SyntaxResult<T> {
        if options.is_empty() {
            return Err(self.emit_error(InvalidSyntax::message("no alternatives to choose from")));
        }
        let last = options.len() - 1;
        let mut best: Option<InvalidSyntax> = None;

        for (i, option) in options.iter_mut().enumerate() {
            if i == last {
                return option(self).map_err(|mut error| {
                    if let Some(best) = best.take() {
                        error.add_alternative(best);
                    }
                    error
                });
            }
            let saved = self.index;
            match option(self) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    self.index = saved;
                    best = Some(match best.take() {
                        Some(current) => current.merge(error),
                        None => error,
                    });
                }
            }
        }
        unreachable!("the last option either returned or errored");
    }
}
