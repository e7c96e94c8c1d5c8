// Filter expression parser: boolean combinations of column comparisons

use super::ast::{CompareOp, FilterExpr, FilterValue};
use super::lexer::{identifier, keyword, number_literal, quoted_identifier, string_literal, ws};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{all_consuming, map, not, value},
    multi::many0,
    sequence::{delimited, preceded, terminated},
    IResult,
};

/// Parse a complete filter expression.
/// Format: `age >= 30 && (sex == "f" || not member == 1)`
pub fn parse_filter_expression(input: &str) -> Result<FilterExpr, String> {
    match all_consuming(ws(or_expr))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let rest = e.input.trim();
            if rest.is_empty() {
                Err("unexpected end of expression".to_string())
            } else {
                Err(format!("unexpected input at '{}'", rest))
            }
        }
        Err(nom::Err::Incomplete(_)) => Err("incomplete expression".to_string()),
    }
}

fn or_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("||"), tag("|"), keyword("or")))),
        and_expr,
    ))(input)?;

    let expr = rest
        .into_iter()
        .fold(first, |acc, rhs| FilterExpr::Or(Box::new(acc), Box::new(rhs)));
    Ok((input, expr))
}

fn and_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("&&"), tag("&"), keyword("and")))),
        unary,
    ))(input)?;

    let expr = rest
        .into_iter()
        .fold(first, |acc, rhs| FilterExpr::And(Box::new(acc), Box::new(rhs)));
    Ok((input, expr))
}

fn unary(input: &str) -> IResult<&str, FilterExpr> {
    alt((
        map(
            preceded(
                ws(alt((terminated(tag("!"), not(char('='))), keyword("not")))),
                unary,
            ),
            |inner| FilterExpr::Not(Box::new(inner)),
        ),
        primary,
    ))(input)
}

fn primary(input: &str) -> IResult<&str, FilterExpr> {
    alt((
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        comparison,
        value(FilterExpr::Literal(true), ws(keyword("true"))),
        value(FilterExpr::Literal(false), ws(keyword("false"))),
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, FilterExpr> {
    let (input, column) = ws(alt((quoted_identifier, identifier)))(input)?;
    let (input, op) = ws(compare_op)(input)?;
    let (input, value) = ws(alt((
        map(number_literal, FilterValue::Number),
        map(string_literal, FilterValue::Text),
    )))(input)?;

    Ok((input, FilterExpr::Compare { column, op, value }))
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        value(CompareOp::Eq, tag("==")),
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Gt, tag(">")),
    ))(input)
}
