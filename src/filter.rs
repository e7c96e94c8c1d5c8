// Group predicates: parsed filter expressions evaluated row by row

use crate::config::{GroupConfig, GroupFilter};
use crate::csv_reader::{Cell, CsvData};
use crate::error::{PlotError, Result};
use crate::parser::{parse_filter_expression, CompareOp, FilterExpr, FilterValue};

/// A configured group with its filter compiled once.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPredicate {
    pub name: String,
    source: String,
    expr: FilterExpr,
}

impl GroupPredicate {
    pub fn compile(group: &GroupConfig) -> Result<Self> {
        let expr = match &group.filter {
            GroupFilter::Constant(value) => FilterExpr::Literal(*value),
            GroupFilter::Expression(text) => {
                parse_filter_expression(text).map_err(|reason| PlotError::Filter {
                    group: group.name.clone(),
                    filter: text.clone(),
                    reason,
                })?
            }
        };
        Ok(Self {
            name: group.name.clone(),
            source: group.filter.to_string(),
            expr,
        })
    }

    /// Compile every group, preserving declaration order.
    pub fn compile_all(groups: &[GroupConfig]) -> Result<Vec<Self>> {
        groups.iter().map(Self::compile).collect()
    }

    /// One flag per row of `table`.
    pub fn evaluate(&self, table: &CsvData) -> Result<Vec<bool>> {
        let bound = bind(&self.expr, table).map_err(|reason| PlotError::Filter {
            group: self.name.clone(),
            filter: self.source.clone(),
            reason,
        })?;

        Ok(table.rows.iter().map(|row| bound.matches(row)).collect())
    }
}

/// Expression with column names resolved to indices of one table.
enum Bound<'a> {
    Literal(bool),
    Compare {
        index: usize,
        op: CompareOp,
        value: &'a FilterValue,
    },
    Not(Box<Bound<'a>>),
    And(Box<Bound<'a>>, Box<Bound<'a>>),
    Or(Box<Bound<'a>>, Box<Bound<'a>>),
}

fn bind<'a>(expr: &'a FilterExpr, table: &CsvData) -> std::result::Result<Bound<'a>, String> {
    Ok(match expr {
        FilterExpr::Literal(b) => Bound::Literal(*b),
        FilterExpr::Compare { column, op, value } => {
            let index = table
                .find_column(column)
                .ok_or_else(|| format!("column '{}' does not exist", column))?;
            Bound::Compare {
                index,
                op: *op,
                value,
            }
        }
        FilterExpr::Not(inner) => Bound::Not(Box::new(bind(inner, table)?)),
        FilterExpr::And(lhs, rhs) => {
            Bound::And(Box::new(bind(lhs, table)?), Box::new(bind(rhs, table)?))
        }
        FilterExpr::Or(lhs, rhs) => {
            Bound::Or(Box::new(bind(lhs, table)?), Box::new(bind(rhs, table)?))
        }
    })
}

impl Bound<'_> {
    fn matches(&self, row: &[String]) -> bool {
        match self {
            Bound::Literal(b) => *b,
            Bound::Compare { index, op, value } => {
                let raw = row.get(*index).map(String::as_str).unwrap_or("");
                compare_cell(raw, *op, value)
            }
            Bound::Not(inner) => !inner.matches(row),
            Bound::And(lhs, rhs) => lhs.matches(row) && rhs.matches(row),
            Bound::Or(lhs, rhs) => lhs.matches(row) || rhs.matches(row),
        }
    }
}

/// Numeric literals never match a missing or non-numeric cell, except via `!=`.
fn compare_cell(raw: &str, op: CompareOp, value: &FilterValue) -> bool {
    match value {
        FilterValue::Number(rhs) => match Cell::parse(raw) {
            Cell::Number(lhs) => op.apply(&lhs, rhs),
            Cell::Missing | Cell::Text(_) => op == CompareOp::Ne,
        },
        FilterValue::Text(rhs) => op.apply(raw.trim(), rhs.as_str()),
    }
}
