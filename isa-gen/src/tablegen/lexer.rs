//! Low-level token parsers for the TableGen grammar.
//!
//! Everything here borrows from the input `&str`; ownership and interning
//! happen later, in the lowering pass (see [`super::intern`]).

use nom::branch::alt;
use nom::bytes::complete::{tag, take_until, take_while, take_while1};
use nom::character::complete::{char, digit1, hex_digit1, one_of};
use nom::combinator::{cut, map, map_res, opt, recognize, value};
use nom::multi::many0;
use nom::sequence::{pair, preceded, terminated};
use nom::IResult;

/// Consumes whitespace and `//` line comments. Whitespace is
/// insignificant except inside string literals.
pub fn ws0(input: &str) -> IResult<&str, ()> {
    let (input, _) = many0(alt((
        value((), take_while1(|c: char| c.is_whitespace())),
        value((), pair(tag("//"), take_while(|c: char| c != '\n'))),
    )))(input)?;
    Ok((input, ()))
}

/// Runs `inner`, skipping any trailing whitespace/comments.
pub fn lexeme<'a, O, F>(mut inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    move |input: &'a str| {
        let (input, out) = inner(input)?;
        let (input, _) = ws0(input)?;
        Ok((input, out))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A bare identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn raw_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        nom::character::complete::satisfy(is_ident_start),
        take_while(is_ident_continue),
    ))(input)
}

pub fn identifier(input: &str) -> IResult<&str, &str> {
    lexeme(raw_identifier)(input)
}

/// Matches a fixed keyword, requiring it not be a prefix of a longer
/// identifier (so `bit` does not accidentally consume part of `bits`).
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    lexeme(move |input: &'a str| {
        let (rest, ident) = raw_identifier(input)?;
        if ident == kw {
            Ok((rest, ident))
        } else {
            Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        }
    })
}

pub fn symbol<'a>(sym: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    lexeme(tag(sym))
}

fn raw_integer(input: &str) -> IResult<&str, i64> {
    let (input, neg) = opt(char('-'))(input)?;
    let (input, value) = alt((
        map_res(preceded(tag("0x"), cut(hex_digit1)), |d: &str| {
            i64::from_str_radix(d, 16)
        }),
        map_res(digit1, |d: &str| d.parse::<i64>()),
    ))(input)?;
    Ok((input, if neg.is_some() { -value } else { value }))
}

/// A signed integer literal, decimal or `0x`-prefixed hexadecimal.
pub fn integer(input: &str) -> IResult<&str, i64> {
    lexeme(raw_integer)(input)
}

fn escaped_char(input: &str) -> IResult<&str, char> {
    preceded(
        char('\\'),
        alt((
            value('\n', char('n')),
            value('\t', char('t')),
            value('"', char('"')),
            value('\\', char('\\')),
        )),
    )(input)
}

/// A single-line string literal: `"` ... `"`, with `\n`/`\t`/`\"`/`\\`
/// escapes, containing no literal newline.
fn single_line_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let mut out = String::new();
    let mut rest = input;
    loop {
        if let Ok((r, _)) = char::<_, nom::error::Error<&str>>('"')(rest) {
            return Ok((r, out));
        }
        if let Ok((r, c)) = escaped_char(rest) {
            out.push(c);
            rest = r;
            continue;
        }
        let mut chars = rest.chars();
        match chars.next() {
            Some('\n') | None => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    rest,
                    nom::error::ErrorKind::Char,
                )))
            }
            Some(c) => {
                out.push(c);
                rest = chars.as_str();
            }
        }
    }
}

/// A multi-line string literal: `"` immediately followed by end-of-line,
/// continuing until a line whose first character is `"`.
fn multi_line_string(input: &str) -> IResult<&str, String> {
    let (input, _) = terminated(char('"'), char('\n'))(input)?;
    let mut lines = Vec::new();
    let mut rest = input;
    loop {
        let (after_line, line) = take_while(|c: char| c != '\n')(rest)?;
        if line.starts_with('"') {
            let closing = &line[1..];
            let remainder = if closing.is_empty() {
                after_line
            } else {
                // Whatever trails the closing quote on its line (e.g. `;`)
                // is left for the caller to parse next.
                closing
            };
            return Ok((remainder, lines.join("\n")));
        }
        lines.push(line.to_string());
        match char::<_, nom::error::Error<&str>>('\n')(after_line) {
            Ok((r, _)) => rest = r,
            Err(_) => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    after_line,
                    nom::error::ErrorKind::Eof,
                )))
            }
        }
    }
}

/// A string literal in either the single-line or multi-line form.
pub fn string_literal(input: &str) -> IResult<&str, String> {
    lexeme(alt((multi_line_string, single_line_string)))(input)
}

/// A single bit literal: `0`, `1`.
pub fn bit_literal(input: &str) -> IResult<&str, bool> {
    lexeme(map(one_of("01"), |c| c == '1'))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identifiers() {
        assert_eq!(identifier("ADD_rr rest").unwrap().1, "ADD_rr");
        assert_eq!(identifier("_underscore").unwrap().1, "_underscore");
    }

    #[test]
    fn keyword_does_not_match_longer_identifier() {
        assert!(keyword("bit")("bits<4>").is_err());
        assert!(keyword("bit")("bit x").is_ok());
    }

    #[test]
    fn parses_hex_and_decimal_integers() {
        assert_eq!(integer("0x10").unwrap().1, 16);
        assert_eq!(integer("-0x10").unwrap().1, -16);
        assert_eq!(integer("42").unwrap().1, 42);
        assert_eq!(integer("-3").unwrap().1, -3);
    }

    #[test]
    fn parses_single_line_string_with_escapes() {
        let (rest, s) = string_literal(r#""add $rD, $rS\n" rest"#).unwrap();
        assert_eq!(s, "add $rD, $rS\n");
        assert_eq!(rest, "rest");
    }

    #[test]
    fn parses_multiline_string_preserving_trailing_whitespace() {
        let input = "\"\nfirst line\nsecond line\"; def Foo";
        let (rest, s) = string_literal(input).unwrap();
        assert_eq!(s, "first line\nsecond line");
        assert_eq!(rest.trim_start(), "; def Foo");
    }
}
