//! Typed views over loosely-typed cells.
//!
//! Spreadsheet cells carry lists as JSON text, comma-separated text, or
//! real arrays, and numbers as either numbers or numeric strings. The
//! helpers here turn a raw [`Value`] into the typed shape a check needs
//! and classify anything that does not fit, so that callers decide
//! whether an unreadable cell is a finding, a repair, or simply no match.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::fields;
use super::Record;

/// Widest `a-b` phase range that is expanded.
pub const MAX_PHASE_SPAN: i64 = 10_000;

/// A parsed `PreferredPhases` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseSpec {
    /// An explicit list of phases.
    List(Vec<i64>),
    /// An inclusive `start-end` range. Empty when `start > end`.
    Range { start: i64, end: i64 },
    /// A single phase number.
    Single(i64),
    /// Text that describes no phases.
    Malformed,
}

impl PhaseSpec {
    /// Parses a raw cell.
    ///
    /// Accepted forms: an array of integers, a JSON array in text, an
    /// integer, digits, or `a-b` (exactly one hyphen, both sides integers).
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::from_items(items),
            Value::Number(_) => coerce_integer(value).map_or(Self::Malformed, Self::Single),
            Value::String(s) => Self::parse_text(s.trim()),
            _ => Self::Malformed,
        }
    }

    fn parse_text(text: &str) -> Self {
        if text.is_empty() {
            return Self::Malformed;
        }
        if text.starts_with('[') {
            return match serde_json::from_str::<Value>(text) {
                Ok(Value::Array(items)) => Self::from_items(&items),
                _ => Self::Malformed,
            };
        }
        if text.contains('-') {
            let bounds: Vec<&str> = text.split('-').collect();
            return match bounds.as_slice() {
                [start, end] => match (start.trim().parse::<i64>(), end.trim().parse::<i64>()) {
                    (Ok(start), Ok(end)) if end.saturating_sub(start) <= MAX_PHASE_SPAN => {
                        Self::Range { start, end }
                    }
                    _ => Self::Malformed,
                },
                _ => Self::Malformed,
            };
        }
        text.parse().map_or(Self::Malformed, Self::Single)
    }

    fn from_items(items: &[Value]) -> Self {
        items
            .iter()
            .map(coerce_integer)
            .collect::<Option<Vec<i64>>>()
            .map_or(Self::Malformed, Self::List)
    }

    /// Expands to the list of phases, ascending for ranges.
    pub fn phases(&self) -> Vec<i64> {
        match self {
            Self::List(phases) => phases.clone(),
            Self::Range { start, end } => (*start..=*end).collect(),
            Self::Single(phase) => vec![*phase],
            Self::Malformed => Vec::new(),
        }
    }

    /// Whether the cell could be read.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Malformed)
    }
}

/// A parsed `AvailableSlots` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotList {
    /// A list whose elements are all integers.
    Slots(Vec<i64>),
    /// A list with at least one non-integer element; holds its length.
    NonInteger(usize),
    /// Not a list at all.
    Malformed,
}

impl SlotList {
    /// Parses a raw cell: a JSON array, or text holding one.
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::from_items(items),
            Value::String(s) => match serde_json::from_str::<Value>(s.trim()) {
                Ok(Value::Array(items)) => Self::from_items(&items),
                _ => Self::Malformed,
            },
            _ => Self::Malformed,
        }
    }

    fn from_items(items: &[Value]) -> Self {
        items
            .iter()
            .map(Value::as_i64)
            .collect::<Option<Vec<i64>>>()
            .map_or(Self::NonInteger(items.len()), Self::Slots)
    }

    /// Number of slots; zero when the cell is not a list.
    pub fn len(&self) -> usize {
        match self {
            Self::Slots(slots) => slots.len(),
            Self::NonInteger(len) => *len,
            Self::Malformed => 0,
        }
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every element is an integer.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Slots(_))
    }
}

/// A parsed `AttributesJSON` cell.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributesValue {
    /// A JSON object, given directly or as text.
    Object(Map<String, Value>),
    /// Well-formed JSON that is not an object.
    NotObject,
    /// Text that is not JSON at all.
    Invalid,
}

impl AttributesValue {
    /// Parses a raw cell.
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map.clone()),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => Self::Object(map),
                Ok(_) => Self::NotObject,
                Err(_) => Self::Invalid,
            },
            _ => Self::NotObject,
        }
    }

    /// The attribute map, if the cell holds one.
    pub fn into_object(self) -> Option<Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }
}

/// Python-style falsiness: null, blank text, zero, false, or an empty container.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Display text of a cell. Strings are unquoted; null is empty.
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reads a finite number from a number or numeric text.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        _ => None,
    }
}

/// Reads an integer from an integral number or integer text.
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Writes a number back as an integer when it has no fractional part.
pub fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Parses a list of identities from an array, JSON text, or comma-separated text.
///
/// Entries are trimmed; blank entries are dropped.
pub fn parse_id_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().map(render).collect(),
        Value::String(s) => {
            let text = s.trim();
            if text.starts_with('[') {
                match serde_json::from_str::<Value>(text) {
                    Ok(Value::Array(items)) => items.iter().map(render).collect(),
                    _ => split_commas(text.trim_start_matches('[').trim_end_matches(']')),
                }
            } else {
                split_commas(text)
            }
        }
        Value::Number(n) => vec![n.to_string()],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn split_commas(text: &str) -> Vec<String> {
    text.split(',').map(str::to_string).collect()
}

/// Parses a skill list, keeping first-seen order and dropping repeats.
pub fn parse_skill_list(value: &Value) -> Vec<String> {
    let mut seen = BTreeSet::new();
    parse_id_list(value)
        .into_iter()
        .filter(|skill| seen.insert(skill.clone()))
        .collect()
}

/// Parses a skill set.
pub fn parse_skill_set(value: &Value) -> BTreeSet<String> {
    parse_id_list(value).into_iter().collect()
}

/// Writes a list back in the same representation the original cell used.
pub fn list_like(original: &Value, items: &[String]) -> Value {
    match original {
        Value::Array(_) => Value::from(items.to_vec()),
        _ => Value::from(items.join(",")),
    }
}

/// Phases a row occupies.
///
/// A row with an explicit `Phase` column occupies exactly that phase.
/// Otherwise `PreferredPhases` is used when present.
pub fn row_phases(record: &Record) -> Vec<i64> {
    if let Some(phase) = record.get(fields::PHASE) {
        return coerce_integer(phase).into_iter().collect();
    }
    record
        .get(fields::PREFERRED_PHASES)
        .map(|value| PhaseSpec::parse(value).phases())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_spec_forms() {
        assert_eq!(PhaseSpec::parse(&json!("1-3")).phases(), vec![1, 2, 3]);
        assert_eq!(PhaseSpec::parse(&json!("[2,4]")).phases(), vec![2, 4]);
        assert_eq!(PhaseSpec::parse(&json!([5, "6"])).phases(), vec![5, 6]);
        assert_eq!(PhaseSpec::parse(&json!("2")), PhaseSpec::Single(2));
        assert_eq!(PhaseSpec::parse(&json!(4)), PhaseSpec::Single(4));
    }

    #[test]
    fn test_phase_spec_malformed() {
        assert_eq!(PhaseSpec::parse(&json!("abc")), PhaseSpec::Malformed);
        assert_eq!(PhaseSpec::parse(&json!("1-2-3")), PhaseSpec::Malformed);
        assert_eq!(PhaseSpec::parse(&json!("-3")), PhaseSpec::Malformed);
        assert_eq!(PhaseSpec::parse(&json!("[1,")), PhaseSpec::Malformed);
        assert_eq!(PhaseSpec::parse(&json!("")), PhaseSpec::Malformed);
        assert_eq!(PhaseSpec::parse(&json!(null)), PhaseSpec::Malformed);
        assert!(PhaseSpec::parse(&json!("1-999999")).phases().is_empty());
    }

    #[test]
    fn test_reversed_range_is_empty() {
        let spec = PhaseSpec::parse(&json!("5-2"));
        assert_eq!(spec, PhaseSpec::Range { start: 5, end: 2 });
        assert!(spec.phases().is_empty());
    }

    #[test]
    fn test_slot_list() {
        assert_eq!(SlotList::parse(&json!("[1, 2, 3]")), SlotList::Slots(vec![1, 2, 3]));
        assert_eq!(SlotList::parse(&json!([1, 2])), SlotList::Slots(vec![1, 2]));
        assert_eq!(SlotList::parse(&json!("[1, \"a\"]")), SlotList::NonInteger(2));
        assert_eq!(SlotList::parse(&json!("[1, 2")), SlotList::Malformed);
        assert_eq!(SlotList::parse(&json!("3")), SlotList::Malformed);
        assert_eq!(SlotList::parse(&json!("[1, 2")).len(), 0);
        assert!(!SlotList::parse(&json!([1.5])).is_valid());
    }

    #[test]
    fn test_attributes_value() {
        assert!(matches!(
            AttributesValue::parse(&json!(r#"{"budget": 5}"#)),
            AttributesValue::Object(_)
        ));
        assert_eq!(AttributesValue::parse(&json!("[1]")), AttributesValue::NotObject);
        assert_eq!(AttributesValue::parse(&json!("{budget: 5")), AttributesValue::Invalid);
        assert_eq!(AttributesValue::parse(&json!(12)), AttributesValue::NotObject);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("  ")));
        assert!(is_blank(&json!(0)));
        assert!(is_blank(&json!(0.0)));
        assert!(is_blank(&json!(false)));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!({})));
        assert!(!is_blank(&json!("x")));
        assert!(!is_blank(&json!(1)));
    }

    #[test]
    fn test_coercions() {
        assert_eq!(coerce_number(&json!("2.5")), Some(2.5));
        assert_eq!(coerce_number(&json!("abc")), None);
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_integer(&json!(3.0)), Some(3));
        assert_eq!(coerce_integer(&json!(3.5)), None);
        assert_eq!(coerce_integer(&json!(" 7 ")), Some(7));
        assert_eq!(number_value(4.0), json!(4));
        assert_eq!(number_value(4.5), json!(4.5));
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list(&json!("T1, T2,,")), vec!["T1", "T2"]);
        assert_eq!(parse_id_list(&json!(["T1", 2])), vec!["T1", "2"]);
        assert_eq!(parse_id_list(&json!("[\"T1\",\"T3\"]")), vec!["T1", "T3"]);
        assert_eq!(parse_id_list(&json!("[T1, T2]")), vec!["T1", "T2"]);
        assert!(parse_id_list(&json!(null)).is_empty());
    }

    #[test]
    fn test_skill_list_dedups_in_order() {
        assert_eq!(
            parse_skill_list(&json!("welding, painting, welding")),
            vec!["welding", "painting"]
        );
        assert_eq!(parse_skill_set(&json!("b,a")).len(), 2);
    }

    #[test]
    fn test_row_phases() {
        let explicit = Record::new().with_field("Phase", 3).with_field("PreferredPhases", "1-2");
        assert_eq!(row_phases(&explicit), vec![3]);

        let preferred = Record::new().with_field("PreferredPhases", "1-2");
        assert_eq!(row_phases(&preferred), vec![1, 2]);

        assert!(row_phases(&Record::new()).is_empty());
    }

    #[test]
    fn test_list_like_preserves_form() {
        let items = vec!["a".to_string(), "b".to_string()];
        assert_eq!(list_like(&json!("x"), &items), json!("a,b"));
        assert_eq!(list_like(&json!(["x"]), &items), json!(["a", "b"]));
    }
}
