//! Property-based tests for the lexing loop
//!
//! These ensure the stream never loses input, never stalls, and keeps its
//! structural guarantees on arbitrary text.

use proptest::prelude::*;
use tokenstream::TokenStream;

/// Every character of the input ends up in exactly one token, in order.
fn lex_all(source: &str) -> Vec<tokenstream::Token> {
    let mut stream = TokenStream::new(source.to_string());
    stream.syntax(&[("word", r"[a-z]+"), ("number", r"[0-9]+")], |stream| {
        stream.intercept(&["whitespace", "newline"], |stream| {
            stream.iter().collect()
        })
    })
}

proptest! {
    #[test]
    fn concatenated_tokens_reproduce_the_input(source in "[a-z0-9 \t\n!?.]{0,64}") {
        let rebuilt: String = lex_all(&source)
            .iter()
            .map(|token| token.value.as_str())
            .collect();
        prop_assert_eq!(rebuilt, source);
    }

    #[test]
    fn token_spans_are_contiguous(source in "[a-z0-9 \t\n!?.]{0,64}") {
        let tokens = lex_all(&source);
        let mut pos = 0;
        for token in &tokens {
            prop_assert_eq!(token.location.pos, pos);
            prop_assert!(token.end_location.pos >= token.location.pos);
            pos = token.end_location.pos;
        }
        prop_assert_eq!(pos as usize, source.len());
    }

    #[test]
    fn peek_agrees_with_advance(source in "[a-z0-9 \n]{0,64}") {
        let mut stream = TokenStream::new(source);
        stream.syntax(&[("word", r"[a-z]+"), ("number", r"[0-9]+")], |stream| {
            loop {
                let peeked = stream.peek(1);
                let advanced = stream.advance();
                prop_assert_eq!(&peeked, &advanced);
                if advanced.is_none() {
                    break;
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn indentation_is_always_balanced(
        lines in prop::collection::vec(("[ \t]{0,6}", "[a-z]{1,4}"), 0..12),
    ) {
        let source: String = lines
            .iter()
            .map(|(indent, word)| format!("{indent}{word}\n"))
            .collect();

        let mut stream = TokenStream::new(source);
        let kinds: Vec<String> = stream.syntax(&[("word", r"[a-z]+")], |stream| {
            stream.indent(|stream| {
                stream.intercept(&["indent", "dedent"], |stream| {
                    stream.iter().map(|token| token.kind).collect()
                })
            })
        });

        let mut depth = 0_i64;
        for kind in &kinds {
            match kind.as_str() {
                "indent" => depth += 1,
                "dedent" => depth -= 1,
                _ => {}
            }
            prop_assert!(depth >= 0);
        }
        prop_assert_eq!(depth, 0);
    }
}
