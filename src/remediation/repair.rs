//! Field repairs: numeric ranges, skill text, blank defaults, and
//! malformed list/JSON cells.

use serde_json::{Map, Value};

use super::RemediationReport;
use crate::config::{EngineConfig, FieldDefaults};
use crate::models::coerce::{
    coerce_integer, coerce_number, list_like, parse_skill_list, render,
    AttributesValue, PhaseSpec, SlotList,
};
use crate::models::{fields, Dataset, EntityKind, Record};

fn label(kind: EntityKind, row: &Record) -> String {
    match row.identity_of(kind) {
        Some(id) => format!("{kind} {id}"),
        None => kind.label().to_string(),
    }
}

/// Clamps `PriorityLevel`, raises short `Duration`, and fixes negative
/// `MaxConcurrent`, wherever the columns appear.
pub(super) fn clamp_ranges(dataset: &mut Dataset, config: &EngineConfig, report: &mut RemediationReport) {
    let (min, max) = (config.priority_min, config.priority_max);

    for (kind, row) in dataset.rows_mut() {
        if let Some(raw) = row.get(fields::PRIORITY_LEVEL) {
            let fixed = match coerce_number(raw) {
                Some(p) if p < min as f64 => Some(min),
                Some(p) if p > max as f64 => Some(max),
                Some(_) => None,
                None => Some(config.default_priority),
            };
            if let Some(fixed) = fixed {
                let old = render(raw);
                row.set(fields::PRIORITY_LEVEL, fixed);
                report.record(format!(
                    "Fixed PriorityLevel {old} -> {fixed} for {}",
                    label(kind, row)
                ));
            }
        }

        if let Some(raw) = row.get(fields::DURATION) {
            if !coerce_number(raw).is_some_and(|d| d >= 1.0) {
                let old = render(raw);
                row.set(fields::DURATION, 1);
                report.record(format!("Fixed Duration {old} -> 1 for {}", label(kind, row)));
            }
        }

        if let Some(raw) = row.get(fields::MAX_CONCURRENT) {
            if coerce_number(raw).is_some_and(|m| m < 0.0) {
                let old = render(raw);
                row.set(fields::MAX_CONCURRENT, 1);
                report.record(format!("Fixed MaxConcurrent {old} -> 1 for {}", label(kind, row)));
            }
        }
    }
}

/// Rewrites worker `Skills` without blank or repeated entries.
pub(super) fn normalize_skills(workers: &mut [Record], report: &mut RemediationReport) {
    for worker in workers.iter_mut() {
        let Some(raw) = worker.get(fields::SKILLS) else {
            continue;
        };
        if !matches!(raw, Value::String(_) | Value::Array(_)) {
            continue;
        }
        let cleaned = list_like(raw, &parse_skill_list(raw));
        if &cleaned != raw {
            worker.set(fields::SKILLS, cleaned);
            report.record(format!(
                "Cleaned skills format for {}",
                label(EntityKind::Worker, worker)
            ));
        }
    }
}

/// Fills blank required fields with configured defaults.
pub(super) fn fill_defaults(dataset: &mut Dataset, defaults: &FieldDefaults, report: &mut RemediationReport) {
    let client_defaults = [
        (fields::GROUP_TAG, Value::from(defaults.group_tag.clone())),
        (fields::ATTRIBUTES_JSON, Value::from(defaults.attributes_json.clone())),
    ];
    let worker_defaults = [
        (fields::WORKER_GROUP, Value::from(defaults.worker_group.clone())),
        (fields::QUALIFICATION_LEVEL, Value::from(defaults.qualification_level)),
    ];
    let task_defaults = [
        (fields::CATEGORY, Value::from(defaults.category.clone())),
        (fields::PREFERRED_PHASES, Value::from(defaults.preferred_phases.clone())),
        (fields::MAX_CONCURRENT, Value::from(defaults.max_concurrent)),
    ];

    for (kind, row) in dataset.rows_mut() {
        let fills: &[(&str, Value)] = match kind {
            EntityKind::Client => &client_defaults,
            EntityKind::Worker => &worker_defaults,
            EntityKind::Task => &task_defaults,
        };
        for (field, value) in fills {
            if row.is_blank(field) {
                row.set(*field, value.clone());
                report.record(format!(
                    "Set default {field} = {} for {}",
                    render(value),
                    label(kind, row)
                ));
            }
        }
    }
}

/// Repairs `AttributesJSON`, `AvailableSlots`, and `PreferredPhases` cells.
pub(super) fn repair_formats(dataset: &mut Dataset, config: &EngineConfig, report: &mut RemediationReport) {
    for (kind, row) in dataset.rows_mut() {
        if let Some(raw) = row.get(fields::ATTRIBUTES_JSON) {
            if let Some((fixed, salvaged)) = repair_attributes(raw) {
                row.set(fields::ATTRIBUTES_JSON, fixed);
                let what = if salvaged {
                    "Fixed malformed AttributesJSON"
                } else {
                    "Reset malformed AttributesJSON to {}"
                };
                report.record(format!("{what} for {}", label(kind, row)));
            }
        }

        if let Some(raw) = row.get(fields::AVAILABLE_SLOTS) {
            if !SlotList::parse(raw).is_valid() {
                let salvaged = salvage_slots(raw);
                let slots = salvaged
                    .clone()
                    .unwrap_or_else(|| vec![1; config.default_slot_count]);
                let fixed = match raw {
                    Value::Array(_) => Value::from(slots),
                    _ => Value::from(Value::from(slots).to_string()),
                };
                let old = render(raw);
                row.set(fields::AVAILABLE_SLOTS, fixed);
                let what = if salvaged.is_some() { "Fixed" } else { "Reset" };
                report.record(format!(
                    "{what} AvailableSlots '{old}' for {}",
                    label(kind, row)
                ));
            }
        }

        if let Some(raw) = row.get(fields::PREFERRED_PHASES) {
            if let Some(fixed) = repair_phases(raw, config.defaults.phase) {
                let old = render(raw);
                row.set(fields::PREFERRED_PHASES, Value::from(fixed));
                report.record(format!(
                    "Fixed PreferredPhases '{old}' for {}",
                    label(kind, row)
                ));
            }
        }
    }
}

/// Returns the replacement cell and whether the original content survived.
fn repair_attributes(raw: &Value) -> Option<(Value, bool)> {
    if let AttributesValue::Object(_) = AttributesValue::parse(raw) {
        return None;
    }
    if let Value::String(text) = raw {
        let requoted = text.replace('\'', "\"");
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&requoted) {
            return Some((Value::from(Value::Object(map).to_string()), true));
        }
    }
    Some((Value::from(Value::Object(Map::new()).to_string()), false))
}

/// Best-effort reading of a broken slot list. Elements that are not
/// integers become 1.
fn salvage_slots(raw: &Value) -> Option<Vec<i64>> {
    let items = match raw {
        Value::Array(items) => items.clone(),
        Value::String(text) => {
            let text = text.trim().replace('\'', "\"");
            if text.is_empty() {
                return None;
            }
            let bracketed = if text.starts_with('[') {
                text.clone()
            } else {
                format!("[{text}]")
            };
            match serde_json::from_str::<Value>(&bracketed) {
                Ok(Value::Array(items)) => items,
                _ => {
                    let inner = text.trim_start_matches('[').trim_end_matches(']');
                    let tokens: Vec<Value> = inner
                        .split(',')
                        .map(|t| t.trim().trim_matches('"'))
                        .filter(|t| !t.is_empty())
                        .map(Value::from)
                        .collect();
                    if tokens.is_empty() {
                        return None;
                    }
                    tokens
                }
            }
        }
        _ => return None,
    };
    Some(
        items
            .iter()
            .map(|item| coerce_integer(item).unwrap_or(1))
            .collect(),
    )
}

/// Rewrites unreadable or non-list `PreferredPhases` text as a JSON list.
fn repair_phases(raw: &Value, fallback: i64) -> Option<String> {
    let spec = PhaseSpec::parse(raw);
    let phases = match (raw, &spec) {
        (Value::String(text), PhaseSpec::Single(_) | PhaseSpec::Range { .. })
            if !text.trim().starts_with('[') =>
        {
            spec.phases()
        }
        (_, PhaseSpec::Malformed) => Vec::new(),
        _ => return None,
    };
    let phases = if phases.is_empty() { vec![fallback] } else { phases };
    Some(Value::from(phases).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset_with(kind: EntityKind, row: Record) -> Dataset {
        let mut dataset = Dataset::default();
        dataset.collection_mut(kind).push(row);
        dataset
    }

    #[test]
    fn test_clamp_priority() {
        let config = EngineConfig::default();
        let mut report = RemediationReport::default();
        let mut dataset = Dataset::new(
            vec![
                Record::new().with_field("ClientID", "C1").with_field("PriorityLevel", 9),
                Record::new().with_field("ClientID", "C2").with_field("PriorityLevel", -1),
                Record::new().with_field("ClientID", "C3").with_field("PriorityLevel", "high"),
                Record::new().with_field("ClientID", "C4").with_field("PriorityLevel", "2"),
            ],
            vec![],
            vec![],
        );
        clamp_ranges(&mut dataset, &config, &mut report);

        let priorities: Vec<Value> = dataset
            .clients
            .iter()
            .map(|c| c.get("PriorityLevel").cloned().unwrap())
            .collect();
        assert_eq!(priorities, vec![json!(5), json!(1), json!(3), json!("2")]);
        assert_eq!(report.applied_fixes.len(), 3);
        assert_eq!(report.applied_fixes[0], "Fixed PriorityLevel 9 -> 5 for client C1");
    }

    #[test]
    fn test_clamp_task_numbers() {
        let mut dataset = dataset_with(
            EntityKind::Task,
            Record::new()
                .with_field("TaskID", "T1")
                .with_field("Duration", 0)
                .with_field("MaxConcurrent", -2),
        );
        let mut report = RemediationReport::default();
        clamp_ranges(&mut dataset, &EngineConfig::default(), &mut report);
        assert_eq!(dataset.tasks[0].get("Duration"), Some(&json!(1)));
        assert_eq!(dataset.tasks[0].get("MaxConcurrent"), Some(&json!(1)));
    }

    #[test]
    fn test_normalize_skills() {
        let mut workers = vec![
            Record::new().with_field("WorkerID", "W1").with_field("Skills", "a, ,b,a"),
            Record::new().with_field("WorkerID", "W2").with_field("Skills", "a,b"),
        ];
        let mut report = RemediationReport::default();
        normalize_skills(&mut workers, &mut report);
        assert_eq!(workers[0].text("Skills"), "a,b");
        assert_eq!(report.applied_fixes.len(), 1);
    }

    #[test]
    fn test_fill_defaults_treats_falsy_as_blank() {
        let mut dataset = dataset_with(
            EntityKind::Worker,
            Record::new()
                .with_field("WorkerID", "W1")
                .with_field("WorkerGroup", "")
                .with_field("QualificationLevel", 0),
        );
        let mut report = RemediationReport::default();
        fill_defaults(&mut dataset, &FieldDefaults::default(), &mut report);
        assert_eq!(dataset.workers[0].text("WorkerGroup"), "default");
        assert_eq!(dataset.workers[0].get("QualificationLevel"), Some(&json!(1)));
    }

    #[test]
    fn test_fill_defaults_adds_missing_columns() {
        let mut dataset = dataset_with(EntityKind::Client, Record::new().with_field("ClientID", "C1"));
        let mut report = RemediationReport::default();
        fill_defaults(&mut dataset, &FieldDefaults::default(), &mut report);
        assert_eq!(dataset.clients[0].text("GroupTag"), "default");
        assert_eq!(dataset.clients[0].text("AttributesJSON"), "{}");
    }

    #[test]
    fn test_repair_attributes() {
        assert_eq!(repair_attributes(&json!("{}")), None);
        assert_eq!(
            repair_attributes(&json!("{'budget': 5}")),
            Some((json!(r#"{"budget":5}"#), true))
        );
        assert_eq!(repair_attributes(&json!("oops")), Some((json!("{}"), false)));
        assert_eq!(repair_attributes(&json!([1])), Some((json!("{}"), false)));
    }

    #[test]
    fn test_salvage_slots() {
        assert_eq!(salvage_slots(&json!("1, 2, 3")), Some(vec![1, 2, 3]));
        assert_eq!(salvage_slots(&json!("['1', 'x']")), Some(vec![1, 1]));
        assert_eq!(salvage_slots(&json!("[1, abc")), Some(vec![1, 1]));
        assert_eq!(salvage_slots(&json!([2, 1.5])), Some(vec![2, 1]));
        assert_eq!(salvage_slots(&json!("")), None);
        assert_eq!(salvage_slots(&json!(null)), None);
    }

    #[test]
    fn test_repair_slots_resets_to_default() {
        let mut dataset = dataset_with(
            EntityKind::Worker,
            Record::new().with_field("WorkerID", "W1").with_field("AvailableSlots", ""),
        );
        let mut report = RemediationReport::default();
        repair_formats(&mut dataset, &EngineConfig::default(), &mut report);
        assert_eq!(dataset.workers[0].text("AvailableSlots"), "[1,1,1]");
    }

    #[test]
    fn test_repair_phases() {
        assert_eq!(repair_phases(&json!("2"), 1), Some("[2]".into()));
        assert_eq!(repair_phases(&json!("1-3"), 1), Some("[1,2,3]".into()));
        assert_eq!(repair_phases(&json!("3-1"), 1), Some("[1]".into()));
        assert_eq!(repair_phases(&json!("soon"), 1), Some("[1]".into()));
        assert_eq!(repair_phases(&json!("[1,"), 1), Some("[1]".into()));
        assert_eq!(repair_phases(&json!("[2,4]"), 1), None);
        assert_eq!(repair_phases(&json!([2, 4]), 1), None);
        assert_eq!(repair_phases(&json!(2), 1), None);
    }
}
