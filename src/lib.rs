//! # tokenstream
//!
//! A versatile token stream for handwritten recursive-descent parsers.
//!
//! The stream lexes input lazily against scoped, regex-based syntax rules, so
//! each grammar rule declares exactly the tokens it understands and nested
//! rules layer on top of each other. Tokens are buffered, which makes
//! backtracking a cheap integer rewind instead of a re-lex.
//!
//! ```
//! use tokenstream::{SyntaxResult, TokenStream};
//!
//! fn parse_greeting(stream: &mut TokenStream) -> SyntaxResult<(String, String)> {
//!     stream.syntax(&[("word", r"[a-z]+")], |stream| {
//!         let greeting = stream.expect("word")?;
//!         let name = stream.expect("word")?;
//!         stream.expect_eof()?;
//!         Ok((greeting.value, name.value))
//!     })
//! }
//!
//! let mut stream = TokenStream::new("hello world");
//! let (greeting, name) = parse_greeting(&mut stream).unwrap();
//! assert_eq!(greeting, "hello");
//! assert_eq!(name, "world");
//! ```
//!
//! Beyond the basics the stream supports indentation tracking with balanced
//! `indent`/`dedent` tokens, checkpoints and alternatives for speculative
//! parsing, informative error merging across failed branches, and
//! preprocessing with location mapping back to the original source. The
//! runnable parsers under `demos/` show complete clients.

mod error;
mod location;
mod stream;
mod token;

pub use error::{InvalidSyntax, SyntaxErrorKind, SyntaxResult};
pub use location::{SourceLocation, INITIAL_LOCATION, UNKNOWN_LOCATION};
pub use stream::{Checkpoint, PreprocessedSource, SyntaxRules, TokenStream};
pub use token::{explain_patterns, Token, TokenPattern};
