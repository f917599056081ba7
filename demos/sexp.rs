//! An s-expression parser built on the token stream.
//!
//! ```text
//! cargo run --example sexp -- "(add (mul 2 3) 4)"
//! ```

use clap::Parser;
use tokenstream::{SyntaxResult, TokenStream};

#[derive(Parser)]
#[command(about = "Parse an s-expression")]
struct Args {
    /// The expression to parse.
    expression: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Sexp {
    Number(i64),
    Name(String),
    List(Vec<Sexp>),
}

impl std::fmt::Display for Sexp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sexp::Number(number) => write!(f, "{number}"),
            Sexp::Name(name) => write!(f, "{name}"),
            Sexp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn main() {
    let args = Args::parse();
    match parse_sexp(&args.expression) {
        Ok(expression) => println!("{expression:#?}"),
        Err(error) => {
            eprintln!("{}", error.format("<expression>"));
            std::process::exit(1);
        }
    }
}

fn parse_sexp(source: &str) -> SyntaxResult<Sexp> {
    let mut stream = TokenStream::new(source);
    stream.syntax(
        &[
            ("brace", r"\(|\)"),
            ("number", r"-?[0-9]+"),
            ("name", r"[a-zA-Z_][a-zA-Z0-9_]*"),
        ],
        |stream| {
            let expression = parse_expression(stream)?;
            stream.expect_eof()?;
            Ok(expression)
        },
    )
}

fn parse_expression(stream: &mut TokenStream) -> SyntaxResult<Sexp> {
    let slots = stream.expect_slots(&[("brace", "(").into(), "number".into(), "name".into()])?;

    if slots[0].is_some() {
        let mut items = Vec::new();
        while stream.peek_until(&[("brace", ")").into()])? {
            items.push(parse_expression(stream)?);
        }
        return Ok(Sexp::List(items));
    }
    if let Some(number) = &slots[1] {
        return number.value.parse().map(Sexp::Number).map_err(|_| {
            tokenstream::InvalidSyntax::message(format!("number '{}' is out of range", number.value))
                .at(number.location, number.end_location)
        });
    }
    Ok(Sexp::Name(slots[2].as_ref().unwrap().value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(value: i64) -> Sexp {
        Sexp::Number(value)
    }

    fn name(value: &str) -> Sexp {
        Sexp::Name(value.to_string())
    }

    #[test]
    fn parses_atoms() {
        assert_eq!(parse_sexp("42").unwrap(), number(42));
        assert_eq!(parse_sexp("-7").unwrap(), number(-7));
        assert_eq!(parse_sexp("hello").unwrap(), name("hello"));
    }

    #[test]
    fn parses_nested_lists() {
        let expression = parse_sexp("(add (mul 2 3) 4)").unwrap();
        assert_eq!(
            expression,
            Sexp::List(vec![
                name("add"),
                Sexp::List(vec![name("mul"), number(2), number(3)]),
                number(4),
            ])
        );
    }

    #[test]
    fn parses_empty_list() {
        assert_eq!(parse_sexp("()").unwrap(), Sexp::List(Vec::new()));
    }

    #[test]
    fn display_round_trips() {
        let source = "(add (mul 2 3) 4)";
        assert_eq!(parse_sexp(source).unwrap().to_string(), source);
    }

    #[test]
    fn unterminated_list_reports_eof() {
        let error = parse_sexp("(add 1 2").unwrap_err();
        assert_eq!(error.to_string(), "Expected brace ')' but reached end of file.");
    }
}
