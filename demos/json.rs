//! A JSON parser built on the token stream.
//!
//! Reads one document from stdin, or keeps reading lines until the input
//! forms a complete value, and prints the re-serialized result.
//!
//! ```text
//! echo '{"greeting": ["hello", "world"]}' | cargo run --example json
//! ```

use std::io::{self, BufRead, Write};

use clap::Parser;
use serde_json::Value;
use tokenstream::{InvalidSyntax, SyntaxErrorKind, SyntaxResult, TokenStream};

#[derive(Parser)]
#[command(about = "Parse JSON from stdin")]
struct Args {
    /// Keep prompting for more lines instead of reading stdin to the end.
    #[arg(long)]
    interactive: bool,
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let stdin = io::stdin();

    if !args.interactive {
        let mut source = String::new();
        for line in stdin.lock().lines() {
            source.push_str(&line?);
            source.push('\n');
        }
        match parse_json(&source) {
            Ok(value) => println!("{value}"),
            Err(error) => {
                eprintln!("{}", error.format("<stdin>"));
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let mut source = String::new();
    print!("> ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        source.push_str(&line?);
        source.push('\n');
        match parse_json(&source) {
            Ok(value) => {
                println!("{value}");
                source.clear();
                print!("> ");
            }
            // An unexpected end of input just means the value continues on
            // the next line.
            Err(error) if matches!(error.kind, SyntaxErrorKind::UnexpectedEof { .. }) => {
                print!(". ");
            }
            Err(error) => {
                eprintln!("{}", error.format("<stdin>"));
                source.clear();
                print!("> ");
            }
        }
        io::stdout().flush()?;
    }
    Ok(())
}

fn parse_json(source: &str) -> SyntaxResult<Value> {
    let mut stream = TokenStream::new(source);
    stream.syntax(
        &[
            ("curly", r"\{|\}"),
            ("bracket", r"\[|\]"),
            ("string", r#""(?:\\.|[^\\\n"])*""#),
            ("number", r"-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?"),
            ("colon", ":"),
            ("comma", ","),
            ("literal", r"\w+"),
        ],
        |stream| {
            let value = parse_value(stream)?;
            stream.expect_eof()?;
            Ok(value)
        },
    )
}

fn parse_value(stream: &mut TokenStream) -> SyntaxResult<Value> {
    let slots = stream.expect_slots(&[
        ("curly", "{").into(),
        ("bracket", "[").into(),
        "string".into(),
        "number".into(),
        "literal".into(),
    ])?;

    if slots[0].is_some() {
        return parse_object(stream);
    }
    if slots[1].is_some() {
        return parse_array(stream);
    }
    if let Some(string) = &slots[2] {
        return Ok(Value::String(unquote_string(string)?));
    }
    if let Some(number) = &slots[3] {
        let parsed: f64 = number.value.parse().map_err(|_| {
            InvalidSyntax::message(format!("invalid number '{}'", number.value))
                .at(number.location, number.end_location)
        })?;
        return Ok(serde_json::Number::from_f64(parsed)
            .map(Value::Number)
            .unwrap_or(Value::Null));
    }

    let literal = slots[4].as_ref().unwrap();
    match literal.value.as_str() {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "null" => Ok(Value::Null),
        other => Err(InvalidSyntax::message(format!("invalid literal '{other}'"))
            .at(literal.location, literal.end_location)),
    }
}

fn parse_object(stream: &mut TokenStream) -> SyntaxResult<Value> {
    let mut entries = serde_json::Map::new();
    if stream.get(("curly", "}")).is_some() {
        return Ok(Value::Object(entries));
    }
    loop {
        let key = stream.expect("string")?;
        let key = unquote_string(&key)?;
        stream.expect("colon")?;
        entries.insert(key, parse_value(stream)?);

        let slots = stream.expect_slots(&[("comma", ",").into(), ("curly", "}").into()])?;
        if slots[1].is_some() {
            return Ok(Value::Object(entries));
        }
    }
}

fn parse_array(stream: &mut TokenStream) -> SyntaxResult<Value> {
    let mut items = Vec::new();
    if stream.get(("bracket", "]")).is_some() {
        return Ok(Value::Array(items));
    }
    loop {
        items.push(parse_value(stream)?);
        let slots = stream.expect_slots(&[("comma", ",").into(), ("bracket", "]").into()])?;
        if slots[1].is_some() {
            return Ok(Value::Array(items));
        }
    }
}

/// Resolve the escape sequences of a quoted string token.
fn unquote_string(token: &tokenstream::Token) -> SyntaxResult<String> {
    let inner = &token.value[1..token.value.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        let escape = chars.next().unwrap_or('\\');
        match escape {
            '"' => result.push('"'),
            '\\' => result.push('\\'),
            '/' => result.push('/'),
            'b' => result.push('\u{0008}'),
            'f' => result.push('\u{000C}'),
            'n' => result.push('\n'),
            'r' => result.push('\r'),
            't' => result.push('\t'),
            'u' => {
                let digits: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32);
                match code {
                    Some(c) => result.push(c),
                    None => {
                        return Err(InvalidSyntax::message(format!(
                            "invalid unicode escape '\\u{digits}'"
                        ))
                        .at(token.location, token.end_location))
                    }
                }
            }
            other => {
                return Err(InvalidSyntax::message(format!("invalid escape '\\{other}'"))
                    .at(token.location, token.end_location))
            }
        }
    }
    Ok(result)
}
