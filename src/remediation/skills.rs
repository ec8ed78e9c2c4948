//! Skill reconciliation between tasks and workers.

use std::collections::BTreeSet;

use super::RemediationReport;
use crate::models::coerce::{list_like, parse_skill_list, parse_skill_set};
use crate::models::{fields, Dataset, EntityKind};

/// Skills required by rows validation accepts.
pub(super) fn required_skills(dataset: &Dataset) -> BTreeSet<String> {
    dataset
        .rows()
        .filter(|(collection, row)| row.is_accepted(*collection))
        .filter_map(|(_, row)| row.get(fields::REQUIRED_SKILLS))
        .flat_map(parse_skill_set)
        .collect()
}

/// Skills carried by accepted workers. Rows excluded for missing columns
/// cover nothing on re-validation, so they do not count here either.
pub(super) fn available_skills(dataset: &Dataset) -> BTreeSet<String> {
    dataset
        .rows()
        .filter(|(collection, row)| {
            row.judged_kind(*collection) == EntityKind::Worker && row.is_accepted(*collection)
        })
        .filter_map(|(_, row)| row.get(fields::SKILLS))
        .flat_map(parse_skill_set)
        .collect()
}

/// Removes required skills no accepted worker has. A task left with none gets the
/// smallest available skill instead.
pub(super) fn prune_unknown_required_skills(dataset: &mut Dataset, report: &mut RemediationReport) {
    let available = available_skills(dataset);
    let fallback = available.iter().next().cloned();

    for task in dataset.tasks.iter_mut() {
        let Some(raw) = task.get(fields::REQUIRED_SKILLS) else {
            continue;
        };
        let required = parse_skill_list(raw);
        if required.is_empty() {
            continue;
        }
        let (valid, unknown): (Vec<String>, Vec<String>) =
            required.into_iter().partition(|skill| available.contains(skill));
        if unknown.is_empty() {
            continue;
        }

        let id = task.identity_of(EntityKind::Task).unwrap_or_default();
        if !valid.is_empty() {
            let value = list_like(raw, &valid);
            task.set(fields::REQUIRED_SKILLS, value);
            report.record(format!(
                "Removed unknown skills {} from task {id}",
                unknown.join(", ")
            ));
        } else if let Some(skill) = &fallback {
            let value = list_like(raw, std::slice::from_ref(skill));
            task.set(fields::REQUIRED_SKILLS, value);
            report.record(format!(
                "Replaced unknown skills {} with '{skill}' for task {id}",
                unknown.join(", ")
            ));
        }
    }
}

/// Gives every identified worker the required skills nobody has.
pub(super) fn cover_missing_skills(dataset: &mut Dataset, report: &mut RemediationReport) {
    let required = required_skills(dataset);
    let available = available_skills(dataset);
    let missing: Vec<&String> = required.difference(&available).collect();
    if missing.is_empty() {
        return;
    }

    for worker in dataset.workers.iter_mut() {
        let Some(id) = worker.identity_of(EntityKind::Worker) else {
            continue;
        };
        let raw = worker.get(fields::SKILLS).cloned().unwrap_or_default();
        let mut skills = parse_skill_list(&raw);
        let added: Vec<String> = missing
            .iter()
            .filter(|skill| !skills.contains(skill))
            .map(|skill| skill.to_string())
            .collect();
        if added.is_empty() {
            continue;
        }
        skills.extend(added.iter().cloned());
        worker.set(fields::SKILLS, list_like(&raw, &skills));
        report.record(format!(
            "Added missing skills to worker {id}: {}",
            added.join(", ")
        ));
    }
}
