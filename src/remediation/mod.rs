//! Automatic remediation.
//!
//! Rewrites a dataset in place so that re-validation reports no row-level
//! problems, and logs every change as a human-readable audit line.
//!
//! # Steps
//! Applied in this order; later steps see the results of earlier ones.
//! 1. Drop duplicate clients and tasks, keeping the first of each identity.
//! 2. Collapse duplicate workers, keeping the row covering the most
//!    required skills.
//! 3. Drop `RequestedTaskIDs` entries whose task step 1 removed and no
//!    surviving row still carries. References to tasks that never existed
//!    are left for the caller.
//! 4. Clamp `PriorityLevel`, raise `Duration` below 1, and fix negative
//!    `MaxConcurrent`.
//! 5. Clean worker `Skills` text.
//! 6. Remove required skills no accepted worker has.
//! 7. Fill blank required fields with defaults.
//! 8. Repair `AttributesJSON`, `AvailableSlots`, and `PreferredPhases`.
//! 9. Give every worker the required skills nobody has.
//!
//! Phase saturation and concurrency are capacity questions, not data
//! errors, and are left to the caller.

mod dedup;
mod repair;
mod skills;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::models::{Dataset, EntityKind};

/// Rows removed per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedCounts {
    pub clients: usize,
    pub workers: usize,
    pub tasks: usize,
}

impl RemovedCounts {
    /// Total rows removed.
    pub fn total(&self) -> usize {
        self.clients + self.workers + self.tasks
    }
}

/// What a remediation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationReport {
    /// Rows removed per collection.
    pub removed_counts: RemovedCounts,
    /// Worker identities whose duplicate rows were collapsed.
    pub removed_worker_ids: Vec<String>,
    /// Audit lines, in the order the changes were made.
    pub applied_fixes: Vec<String>,
}

impl RemediationReport {
    pub(crate) fn record(&mut self, fix: String) {
        debug!(fix = %fix, "applied fix");
        self.applied_fixes.push(fix);
    }

    /// Whether the pass changed anything.
    pub fn is_empty(&self) -> bool {
        self.applied_fixes.is_empty() && self.removed_counts.total() == 0
    }
}

/// Applies the remediation steps.
#[derive(Debug, Clone, Default)]
pub struct Remediator {
    config: EngineConfig,
}

impl Remediator {
    /// Creates a remediator with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a remediator with the given thresholds and defaults.
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Remediates `dataset` in place.
    pub fn remediate(&self, dataset: &mut Dataset) -> RemediationReport {
        let mut report = RemediationReport::default();
        let before = (dataset.clients.len(), dataset.workers.len(), dataset.tasks.len());

        dedup::drop_duplicates(&mut dataset.clients, EntityKind::Client, &mut report);
        let removed_tasks = dedup::drop_duplicates(&mut dataset.tasks, EntityKind::Task, &mut report);
        let required = skills::required_skills(dataset);
        dedup::collapse_workers(&mut dataset.workers, &required, &mut report);
        dedup::prune_requested_tasks(&mut dataset.clients, &dataset.tasks, &removed_tasks, &mut report);

        repair::clamp_ranges(dataset, &self.config, &mut report);
        repair::normalize_skills(&mut dataset.workers, &mut report);
        skills::prune_unknown_required_skills(dataset, &mut report);
        repair::fill_defaults(dataset, &self.config.defaults, &mut report);
        repair::repair_formats(dataset, &self.config, &mut report);
        skills::cover_missing_skills(dataset, &mut report);

        report.removed_counts = RemovedCounts {
            clients: before.0 - dataset.clients.len(),
            workers: before.1 - dataset.workers.len(),
            tasks: before.2 - dataset.tasks.len(),
        };
        info!(
            fixes = report.applied_fixes.len(),
            removed = report.removed_counts.total(),
            "remediation complete"
        );
        report
    }
}

/// Remediates `dataset` in place with default thresholds.
pub fn remediate(dataset: &mut Dataset) -> RemediationReport {
    Remediator::new().remediate(dataset)
}
