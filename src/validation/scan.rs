//! Row pass: per-row checks and the aggregates the dataset pass needs.

use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::cycle::CoRunGraph;
use super::{Finding, FindingKind};
use crate::config::EngineConfig;
use crate::models::coerce::{
    coerce_number, parse_id_list, parse_skill_set, render, row_phases, AttributesValue, SlotList,
};
use crate::models::{fields, EntityKind, Record};

/// Aggregates collected over the rows accepted by the row pass.
#[derive(Debug, Default)]
pub(super) struct Scan<'a> {
    /// Accepted rows with their kind and identity, in upload order.
    pub accepted: Vec<Accepted<'a>>,
    /// Identities of accepted tasks.
    pub task_ids: HashSet<String>,
    /// Total task duration per phase.
    pub phase_durations: BTreeMap<i64, f64>,
    /// Skill set of each accepted worker.
    pub worker_skills: HashMap<String, BTreeSet<String>>,
    /// Union of all required skills.
    pub required_skills: BTreeSet<String>,
    /// Co-run groups of accepted tasks.
    pub corun: CoRunGraph,
}

#[derive(Debug)]
pub(super) struct Accepted<'a> {
    pub kind: EntityKind,
    pub id: String,
    pub row: &'a Record,
}

pub(super) fn scan_rows<'a>(
    config: &EngineConfig,
    clients: &'a [Record],
    workers: &'a [Record],
    tasks: &'a [Record],
    findings: &mut Vec<Finding>,
) -> Scan<'a> {
    let mut scan = Scan::default();
    let mut seen: HashMap<EntityKind, HashSet<String>> = HashMap::new();

    let collections = [
        (EntityKind::Client, clients),
        (EntityKind::Worker, workers),
        (EntityKind::Task, tasks),
    ];

    for (collection, rows) in collections {
        for row in rows {
            let kind = row.judged_kind(collection);

            let missing = row.missing_columns(kind);
            if !missing.is_empty() {
                let label = row.identity_of(kind).unwrap_or_else(|| "?".into());
                findings.push(
                    Finding::new(
                        FindingKind::MissingColumns,
                        format!(
                            "Missing required columns for {kind} {label}: {}",
                            missing.join(", ")
                        ),
                    )
                    .with_details(json!({ "entity": kind.label(), "missing": missing })),
                );
                continue;
            }
            let id = row.identity_of(kind).unwrap_or_default();

            if !seen.entry(kind).or_default().insert(id.clone()) {
                findings.push(
                    Finding::new(
                        FindingKind::DuplicateId,
                        format!("Duplicate {}: {id}", kind.id_field()),
                    )
                    .with_details(json!({ "entity": kind.label(), "id": id })),
                );
            }

            check_row(config, kind, &id, row, findings);
            scan.collect(kind, id, row);
        }
    }

    scan
}

fn check_row(
    config: &EngineConfig,
    kind: EntityKind,
    id: &str,
    row: &Record,
    findings: &mut Vec<Finding>,
) {
    if let Some(slots) = row.get(fields::AVAILABLE_SLOTS) {
        if !SlotList::parse(slots).is_valid() {
            findings.push(
                Finding::new(
                    FindingKind::MalformedList,
                    format!("AvailableSlots for {kind} {id} is not a list of integers"),
                )
                .with_details(json!({ "entity": kind.label(), "id": id, "value": slots })),
            );
        }
    }

    if let Some(priority) = row.get(fields::PRIORITY_LEVEL) {
        let in_range = coerce_number(priority).is_some_and(|p| config.priority_in_range(p));
        if !in_range {
            findings.push(
                Finding::new(
                    FindingKind::OutOfRange,
                    format!(
                        "PriorityLevel {} out of range [{}, {}] for {kind} {id}",
                        render(priority),
                        config.priority_min,
                        config.priority_max
                    ),
                )
                .with_details(json!({ "entity": kind.label(), "id": id, "field": fields::PRIORITY_LEVEL })),
            );
        }
    }

    if let Some(duration) = row.get(fields::DURATION) {
        let valid = coerce_number(duration).is_some_and(|d| d >= 1.0);
        if !valid {
            findings.push(
                Finding::new(
                    FindingKind::OutOfRange,
                    format!("Duration {} must be at least 1 for {kind} {id}", render(duration)),
                )
                .with_details(json!({ "entity": kind.label(), "id": id, "field": fields::DURATION })),
            );
        }
    }

    if let Some(attributes) = row.get(fields::ATTRIBUTES_JSON) {
        let message = match AttributesValue::parse(attributes) {
            AttributesValue::Object(_) => None,
            AttributesValue::NotObject => Some("AttributesJSON must be a valid JSON object"),
            AttributesValue::Invalid => Some("Invalid AttributesJSON format"),
        };
        if let Some(message) = message {
            findings.push(
                Finding::new(FindingKind::InvalidJson, message)
                    .with_details(json!({ "entity": kind.label(), "id": id })),
            );
        }
    }
}

impl<'a> Scan<'a> {
    fn collect(&mut self, kind: EntityKind, id: String, row: &'a Record) {
        let duration = row
            .get(fields::DURATION)
            .and_then(coerce_number)
            .unwrap_or(0.0);
        for phase in row_phases(row) {
            *self.phase_durations.entry(phase).or_insert(0.0) += duration;
        }

        if let Some(required) = row.get(fields::REQUIRED_SKILLS) {
            self.required_skills.extend(parse_skill_set(required));
        }

        match kind {
            EntityKind::Worker => {
                let skills = row
                    .get(fields::SKILLS)
                    .map(parse_skill_set)
                    .unwrap_or_default();
                self.worker_skills.insert(id.clone(), skills);
            }
            EntityKind::Task => {
                self.task_ids.insert(id.clone());
                if let Some(group) = row.get(fields::CO_RUN_GROUP) {
                    self.corun.insert(id.clone(), parse_id_list(group));
                }
            }
            EntityKind::Client => {}
        }

        self.accepted.push(Accepted { kind, id, row });
    }
}
