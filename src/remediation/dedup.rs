//! Identity cleanup: duplicate rows and dangling task requests.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::RemediationReport;
use crate::models::coerce::{list_like, parse_id_list, parse_skill_set};
use crate::models::{fields, EntityKind, Record};

/// Keeps the first row of each identity. Rows without an identity are kept.
///
/// Rows are keyed by their judged kind, as validation keys them. Returns
/// the removed identities of rows judged as `collection`.
pub(super) fn drop_duplicates(
    rows: &mut Vec<Record>,
    collection: EntityKind,
    report: &mut RemediationReport,
) -> BTreeSet<String> {
    let mut seen = HashSet::new();
    let mut removed = Vec::new();
    rows.retain(|row| {
        let kind = row.judged_kind(collection);
        match row.identity_of(kind) {
            Some(id) if !seen.insert((kind, id.clone())) => {
                removed.push((kind, id));
                false
            }
            _ => true,
        }
    });

    let mut ids = BTreeSet::new();
    for (kind, id) in removed {
        report.record(format!("Removed duplicate {}: {id}", kind.id_field()));
        if kind == collection {
            ids.insert(id);
        }
    }
    ids
}

fn worker_identity(row: &Record) -> Option<String> {
    match row.judged_kind(EntityKind::Worker) {
        EntityKind::Worker => row.identity_of(EntityKind::Worker),
        _ => None,
    }
}

/// Collapses workers sharing an identity into the single row with the best
/// coverage of `required` skills.
///
/// Ties go to the row with the longer raw `Skills` text, then to the
/// earliest row. The survivor keeps its original position.
pub(super) fn collapse_workers(
    workers: &mut Vec<Record>,
    required: &BTreeSet<String>,
    report: &mut RemediationReport,
) {
    struct Best {
        index: usize,
        coverage: usize,
        text_len: usize,
        rows: usize,
    }

    let mut best: HashMap<String, Best> = HashMap::new();
    let mut order = Vec::new();
    for (index, worker) in workers.iter().enumerate() {
        let Some(id) = worker_identity(worker) else {
            continue;
        };
        let coverage = worker
            .get(fields::SKILLS)
            .map(parse_skill_set)
            .unwrap_or_default()
            .intersection(required)
            .count();
        let text_len = worker.text(fields::SKILLS).len();

        match best.get_mut(&id) {
            None => {
                order.push(id.clone());
                best.insert(
                    id,
                    Best {
                        index,
                        coverage,
                        text_len,
                        rows: 1,
                    },
                );
            }
            Some(current) => {
                current.rows += 1;
                if (coverage, text_len) > (current.coverage, current.text_len) {
                    current.index = index;
                    current.coverage = coverage;
                    current.text_len = text_len;
                }
            }
        }
    }

    let keep: HashSet<usize> = best.values().map(|b| b.index).collect();
    let mut index = 0;
    workers.retain(|worker| {
        let kept = worker_identity(worker).is_none() || keep.contains(&index);
        index += 1;
        kept
    });

    for id in order {
        let rows = best.get(&id).map_or(1, |b| b.rows);
        if rows > 1 {
            report.record(format!(
                "Removed {} duplicate workers with WorkerID: {id}, kept the one with the best skill coverage",
                rows - 1
            ));
            report.removed_worker_ids.push(id);
        }
    }
}

/// Drops requested identities of tasks in `removed` that no surviving row
/// carries. Other references, including unknown ones, are untouched.
pub(super) fn prune_requested_tasks(
    clients: &mut [Record],
    tasks: &[Record],
    removed: &BTreeSet<String>,
    report: &mut RemediationReport,
) {
    let surviving: HashSet<String> = tasks
        .iter()
        .filter(|task| task.judged_kind(EntityKind::Task) == EntityKind::Task)
        .filter_map(|task| task.identity_of(EntityKind::Task))
        .collect();
    let gone: HashSet<&String> = removed.iter().filter(|id| !surviving.contains(*id)).collect();
    if gone.is_empty() {
        return;
    }

    for client in clients.iter_mut() {
        let Some(requested) = client.get(fields::REQUESTED_TASK_IDS) else {
            continue;
        };
        let ids = parse_id_list(requested);
        let (kept, dropped): (Vec<String>, Vec<String>) =
            ids.into_iter().partition(|id| !gone.contains(id));
        if dropped.is_empty() {
            continue;
        }
        let value = list_like(requested, &kept);
        client.set(fields::REQUESTED_TASK_IDS, value);
        report.record(format!(
            "Removed deleted tasks {} from RequestedTaskIDs for client {}",
            dropped.join(", "),
            client.identity_of(EntityKind::Client).unwrap_or_default()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(id: &str, skills: &str) -> Record {
        Record::new().with_field("WorkerID", id).with_field("Skills", skills)
    }

    #[test]
    fn test_drop_duplicates_keeps_first() {
        let mut rows = vec![
            Record::new().with_field("ClientID", "C1").with_field("n", 1),
            Record::new().with_field("ClientID", "C1").with_field("n", 2),
            Record::new().with_field("ClientName", "anonymous"),
        ];
        let mut report = RemediationReport::default();
        let removed = drop_duplicates(&mut rows, EntityKind::Client, &mut report);
        assert_eq!(removed.into_iter().collect::<Vec<_>>(), vec!["C1"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("n"), "1");
        assert_eq!(report.applied_fixes, vec!["Removed duplicate ClientID: C1"]);
    }

    #[test]
    fn test_collapse_prefers_best_coverage() {
        let required: BTreeSet<String> = ["welding", "painting"].iter().map(|s| s.to_string()).collect();
        let mut workers = vec![
            worker("W1", "welding"),
            worker("W2", "x"),
            worker("W1", "welding,painting"),
        ];
        let mut report = RemediationReport::default();
        collapse_workers(&mut workers, &required, &mut report);

        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].text("WorkerID"), "W2");
        assert_eq!(workers[1].text("Skills"), "welding,painting");
        assert_eq!(report.removed_worker_ids, vec!["W1"]);
    }

    #[test]
    fn test_collapse_tie_prefers_longer_skills_text() {
        let required: BTreeSet<String> = ["welding"].iter().map(|s| s.to_string()).collect();
        let mut workers = vec![worker("W1", "welding"), worker("W1", "welding,sanding")];
        let mut report = RemediationReport::default();
        collapse_workers(&mut workers, &required, &mut report);
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].text("Skills"), "welding,sanding");
    }

    #[test]
    fn test_collapse_full_tie_keeps_first() {
        let mut workers = vec![
            worker("W1", "a").with_field("n", 1),
            worker("W1", "b").with_field("n", 2),
        ];
        let mut report = RemediationReport::default();
        collapse_workers(&mut workers, &BTreeSet::new(), &mut report);
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].text("n"), "1");
    }

    #[test]
    fn test_drop_duplicates_uses_judged_kind() {
        // The second row carries a ClientID, so it is keyed as client C1, not task T1.
        let mut rows = vec![
            Record::new().with_field("TaskID", "T1"),
            Record::new().with_field("TaskID", "T1").with_field("ClientID", "C1"),
            Record::new().with_field("TaskID", "T2").with_field("ClientID", "C1"),
        ];
        let mut report = RemediationReport::default();
        let removed = drop_duplicates(&mut rows, EntityKind::Task, &mut report);
        assert_eq!(rows.len(), 2);
        assert!(removed.is_empty());
        assert_eq!(report.applied_fixes, vec!["Removed duplicate ClientID: C1"]);
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_prune_requested_tasks_keeps_form() {
        let tasks = vec![Record::new().with_field("TaskID", "T1")];
        let mut clients = vec![
            Record::new().with_field("ClientID", "C1").with_field("RequestedTaskIDs", "T1,T5"),
            Record::new()
                .with_field("ClientID", "C2")
                .with_field("RequestedTaskIDs", serde_json::json!(["T5", "T1"])),
            Record::new().with_field("ClientID", "C3").with_field("RequestedTaskIDs", "T1"),
        ];
        let mut report = RemediationReport::default();
        prune_requested_tasks(&mut clients, &tasks, &set(&["T5"]), &mut report);

        assert_eq!(clients[0].text("RequestedTaskIDs"), "T1");
        assert_eq!(clients[1].get("RequestedTaskIDs"), Some(&serde_json::json!(["T1"])));
        assert_eq!(report.applied_fixes.len(), 2);
    }

    #[test]
    fn test_prune_requested_tasks_leaves_unknown_and_surviving() {
        let tasks = vec![Record::new().with_field("TaskID", "T1")];
        let mut clients = vec![Record::new()
            .with_field("ClientID", "C1")
            .with_field("RequestedTaskIDs", "T1,T9")];
        let mut report = RemediationReport::default();
        // T1 had a duplicate removed but a row survives; T9 never existed.
        prune_requested_tasks(&mut clients, &tasks, &set(&["T1"]), &mut report);
        assert_eq!(clients[0].text("RequestedTaskIDs"), "T1,T9");
        assert!(report.applied_fixes.is_empty());
    }
}
