//! Condition matching for priority and pattern rules.
//!
//! A condition maps field names to either an expected value (equality) or
//! an operator object such as `{">=": 3, "<": 5}`. Every entry must hold
//! for the row to match. The `entity_type` key selects a collection and is
//! not compared.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::models::coerce::{coerce_number, render};
use crate::models::Record;

const ENTITY_TYPE: &str = "entity_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
    Ne,
    Contains,
}

impl Operator {
    fn parse(symbol: &str) -> Option<Self> {
        Some(match symbol {
            ">=" => Operator::Ge,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            "contains" => Operator::Contains,
            _ => return None,
        })
    }

    fn holds(self, actual: Option<&Value>, operand: &Value) -> bool {
        match self {
            Operator::Eq => loosely_equal(actual, operand),
            Operator::Ne => !loosely_equal(actual, operand),
            Operator::Contains => actual.is_some_and(|a| render(a).contains(&render(operand))),
            Operator::Ge => compare(actual, operand).is_some_and(|o| o != Ordering::Less),
            Operator::Le => compare(actual, operand).is_some_and(|o| o != Ordering::Greater),
            Operator::Gt => compare(actual, operand) == Some(Ordering::Greater),
            Operator::Lt => compare(actual, operand) == Some(Ordering::Less),
        }
    }
}

/// Numeric when both sides read as numbers, lexical when both are text.
fn compare(actual: Option<&Value>, operand: &Value) -> Option<Ordering> {
    let actual = actual?;
    if let (Some(a), Some(b)) = (coerce_number(actual), coerce_number(operand)) {
        return a.partial_cmp(&b);
    }
    match (actual, operand) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn loosely_equal(actual: Option<&Value>, expected: &Value) -> bool {
    let Some(actual) = actual else {
        return expected.is_null();
    };
    if actual == expected {
        return true;
    }
    match (coerce_number(actual), coerce_number(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Whether `record` satisfies every entry of `condition`.
///
/// Unknown operators are ignored. A missing or incomparable field fails
/// ordering operators.
pub fn matches(record: &Record, condition: &Map<String, Value>) -> bool {
    condition
        .iter()
        .filter(|(field, _)| field.as_str() != ENTITY_TYPE)
        .all(|(field, expected)| {
            let actual = record.get(field);
            match expected {
                Value::Object(operators) => operators.iter().all(|(symbol, operand)| {
                    Operator::parse(symbol).map_or(true, |op| op.holds(actual, operand))
                }),
                _ => loosely_equal(actual, expected),
            }
        })
}
