//! A four-function calculator built on the token stream.
//!
//! ```text
//! cargo run --example calculator -- "1 + 2 * (3 + 4)"
//! ```

use clap::Parser;
use tokenstream::{SyntaxResult, TokenStream};

#[derive(Parser)]
#[command(about = "Evaluate an arithmetic expression")]
struct Args {
    /// The expression to evaluate.
    expression: String,
}

fn main() {
    let args = Args::parse();
    match calculate(&args.expression) {
        Ok(result) => println!("{result}"),
        Err(error) => {
            eprintln!("{}", error.format("<expression>"));
            std::process::exit(1);
        }
    }
}

fn calculate(source: &str) -> SyntaxResult<f64> {
    let mut stream = TokenStream::new(source);
    stream.syntax(
        &[
            ("number", r"[0-9]+(?:\.[0-9]+)?"),
            ("add", r"\+"),
            ("sub", "-"),
            ("mul", r"\*"),
            ("div", "/"),
            ("paren", r"[()]"),
        ],
        |stream| {
            let result = calculate_sum(stream)?;
            stream.expect_eof()?;
            Ok(result)
        },
    )
}

fn calculate_sum(stream: &mut TokenStream) -> SyntaxResult<f64> {
    let mut result = calculate_product(stream)?;
    while let Some(slots) = stream.collect_slots(&[("add", "+").into(), ("sub", "-").into()]) {
        let term = calculate_product(stream)?;
        if slots[0].is_some() {
            result += term;
        } else {
            result -= term;
        }
    }
    Ok(result)
}

fn calculate_product(stream: &mut TokenStream) -> SyntaxResult<f64> {
    let mut result = calculate_value(stream)?;
    while let Some(slots) = stream.collect_slots(&[("mul", "*").into(), ("div", "/").into()]) {
        let factor = calculate_value(stream)?;
        if slots[0].is_some() {
            result *= factor;
        } else {
            result /= factor;
        }
    }
    Ok(result)
}

fn calculate_value(stream: &mut TokenStream) -> SyntaxResult<f64> {
    let slots = stream.expect_slots(&["number".into(), ("paren", "(").into()])?;
    if let Some(number) = &slots[0] {
        // The rule only admits digits and dots, but "1.2.3" still slips
        // through it; surface that as a syntax error at the token.
        number.value.parse().map_err(|_| {
            tokenstream::InvalidSyntax::message(format!("invalid number '{}'", number.value))
                .at(number.location, number.end_location)
        })
    } else {
        let result = calculate_sum(stream)?;
        stream.expect(("paren", ")"))?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", 1.0)]
    #[case("1 + 2", 3.0)]
    #[case("1 + 2 * 3", 7.0)]
    #[case("(1 + 2) * 3", 9.0)]
    #[case("8 / 2 - 1", 3.0)]
    #[case("2 * (3 + 4) * 0.5", 7.0)]
    fn evaluates(#[case] source: &str, #[case] expected: f64) {
        assert_eq!(calculate(source).unwrap(), expected);
    }

    #[test]
    fn dangling_operator_is_rejected() {
        let error = calculate("4 * -").unwrap_err();
        assert!(error.to_string().starts_with("Expected"));
    }

    #[test]
    fn trailing_input_is_rejected() {
        let error = calculate("1 + 2 x").unwrap_err();
        assert_eq!(error.to_string(), "Expected eof but got invalid 'x'.");
    }

    #[test]
    fn unbalanced_parens_report_eof() {
        let error = calculate("(1 + 2").unwrap_err();
        assert!(error.to_string().contains("end of file"));
    }
}
