//! Dataset pass: checks that relate rows to each other.

use serde_json::json;
use std::collections::BTreeSet;

use super::scan::Scan;
use super::{Finding, FindingKind};
use crate::models::coerce::{coerce_number, parse_id_list, parse_skill_set, render, row_phases, SlotList};
use crate::models::{fields, EntityKind};

/// Every requested task must exist among the accepted tasks.
pub(super) fn referential_integrity(scan: &Scan<'_>, findings: &mut Vec<Finding>) {
    for entry in &scan.accepted {
        let Some(requested) = entry.row.get(fields::REQUESTED_TASK_IDS) else {
            continue;
        };
        let unknown: BTreeSet<String> = parse_id_list(requested)
            .into_iter()
            .filter(|id| !scan.task_ids.contains(id))
            .collect();
        if unknown.is_empty() {
            continue;
        }
        let listed: Vec<&str> = unknown.iter().map(String::as_str).collect();
        findings.push(
            Finding::new(
                FindingKind::UnknownReference,
                format!(
                    "{} {} requests unknown tasks: {}",
                    capitalize(entry.kind.label()),
                    entry.id,
                    listed.join(", ")
                ),
            )
            .with_details(json!({ "entity": entry.kind.label(), "id": entry.id, "unknown": listed })),
        );
    }
}

/// Co-run groups must not form a cycle. Every start task that reaches a
/// cycle gets its own finding.
pub(super) fn circular_dependencies(scan: &Scan<'_>, findings: &mut Vec<Finding>) {
    for start in scan.corun.starts() {
        if let Some(cycle) = scan.corun.find_cycle(start) {
            findings.push(
                Finding::new(
                    FindingKind::CircularDependency,
                    format!(
                        "Circular co-run dependency detected from task {start}: {}",
                        cycle.join(" -> ")
                    ),
                )
                .with_details(json!({ "task": start, "cycle": cycle })),
            );
        }
    }
}

/// A worker needs at least as many slots as its per-phase load.
pub(super) fn overloaded_workers(scan: &Scan<'_>, findings: &mut Vec<Finding>) {
    for entry in &scan.accepted {
        let (Some(slots), Some(max_load)) = (
            entry.row.get(fields::AVAILABLE_SLOTS),
            entry.row.get(fields::MAX_LOAD_PER_PHASE),
        ) else {
            continue;
        };
        let Some(limit) = coerce_number(max_load) else {
            continue;
        };
        let available = SlotList::parse(slots).len();
        if (available as f64) < limit {
            findings.push(
                Finding::new(
                    FindingKind::OverloadedWorker,
                    format!(
                        "Worker {} has {available} available slots but MaxLoadPerPhase {}",
                        entry.id,
                        render(max_load)
                    ),
                )
                .with_details(json!({ "worker": entry.id, "slots": available, "max_load": limit })),
            );
        }
    }
}

/// Total task duration in a phase must fit the slots of the rows working it.
pub(super) fn phase_saturation(scan: &Scan<'_>, findings: &mut Vec<Finding>) {
    // (phases, slot count) per accepted row.
    let capacity: Vec<(Vec<i64>, usize)> = scan
        .accepted
        .iter()
        .map(|entry| {
            let slots = entry
                .row
                .get(fields::AVAILABLE_SLOTS)
                .map_or(0, |value| SlotList::parse(value).len());
            (row_phases(entry.row), slots)
        })
        .collect();

    for (&phase, &duration) in &scan.phase_durations {
        if duration == 0.0 {
            continue;
        }
        let slots: usize = capacity
            .iter()
            .filter(|(phases, _)| phases.contains(&phase))
            .map(|(_, slots)| slots)
            .sum();
        if duration > slots as f64 {
            findings.push(
                Finding::new(
                    FindingKind::PhaseSaturation,
                    format!("Phase {phase} is oversaturated: task duration {duration} exceeds {slots} available slots"),
                )
                .with_details(json!({ "phase": phase, "duration": duration, "slots": slots })),
            );
        }
    }
}

/// Every required skill must be carried by at least one worker.
pub(super) fn skill_coverage(scan: &Scan<'_>, findings: &mut Vec<Finding>) {
    for skill in &scan.required_skills {
        let covered = scan.worker_skills.values().any(|skills| skills.contains(skill));
        if !covered {
            findings.push(
                Finding::new(
                    FindingKind::SkillCoverage,
                    format!("No workers with required skill '{skill}'"),
                )
                .with_details(json!({ "skill": skill })),
            );
        }
    }
}

/// A task cannot run on more workers at once than are qualified for it.
pub(super) fn concurrency_feasibility(scan: &Scan<'_>, findings: &mut Vec<Finding>) {
    for entry in scan.accepted.iter().filter(|e| e.kind == EntityKind::Task) {
        let Some(max_concurrent) = entry.row.get(fields::MAX_CONCURRENT) else {
            continue;
        };
        let Some(limit) = coerce_number(max_concurrent) else {
            continue;
        };
        let required = entry
            .row
            .get(fields::REQUIRED_SKILLS)
            .map(parse_skill_set)
            .unwrap_or_default();
        let qualified = scan
            .worker_skills
            .values()
            .filter(|skills| required.is_subset(skills))
            .count();
        if limit > qualified as f64 {
            findings.push(
                Finding::new(
                    FindingKind::ConcurrencyInfeasible,
                    format!(
                        "MaxConcurrent ({}) exceeds qualified workers ({qualified}) for task {}",
                        render(max_concurrent),
                        entry.id
                    ),
                )
                .with_details(json!({ "task": entry.id, "max_concurrent": limit, "qualified": qualified })),
            );
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
