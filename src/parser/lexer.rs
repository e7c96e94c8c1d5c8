// Lexer utilities for filter expressions

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{not, peek, recognize},
    number::complete::double,
    sequence::{delimited, pair, terminated},
    IResult,
};

/// Run `inner` with surrounding whitespace skipped
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Parse a bare column name
/// Format: [a-zA-Z_][a-zA-Z0-9_.]*
pub fn identifier(input: &str) -> IResult<&str, String> {
    let (input, ident) = recognize(pair(
        satisfy(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)?;

    Ok((input, ident.to_string()))
}

/// Parse a column name that may contain spaces or operators
/// Format: `...`
pub fn quoted_identifier(input: &str) -> IResult<&str, String> {
    let (input, content) = delimited(char('`'), take_while1(|c| c != '`'), char('`'))(input)?;

    Ok((input, content.to_string()))
}

/// Parse a string literal, empty strings included
/// Format: "..." or '...'
pub fn string_literal(input: &str) -> IResult<&str, String> {
    let (input, content) = alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
    ))(input)?;

    Ok((input, content.to_string()))
}

/// Numeric literal; response codes are compared as floats
pub fn number_literal(input: &str) -> IResult<&str, f64> {
    double(input)
}

/// Parse a word that must not run on into an identifier (`and` but not `android`)
pub fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(peek(satisfy(is_ident_char))))
}
