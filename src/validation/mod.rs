//! Dataset validation.
//!
//! Judges a dataset in two passes and reports every problem it finds as a
//! [`Finding`]. Validation never fails and never stops early.
//!
//! **Row pass** (per row, upload order, clients then workers then tasks):
//! 1. Required columns (`missing_columns`). A row that fails is excluded
//!    from every later check and aggregate.
//! 2. Duplicate identity within the entity kind (`duplicate_id`)
//! 3. `AvailableSlots` is a list of integers (`malformed_list`)
//! 4. `PriorityLevel` within range (`out_of_range`)
//! 5. `Duration` at least 1 (`out_of_range`)
//! 6. `AttributesJSON` is a JSON object (`invalid_json`)
//!
//! **Dataset pass** (over the rows accepted by the row pass):
//! 1. Requested tasks exist (`unknown_reference`)
//! 2. Co-run groups are acyclic (`circular_dependency`)
//! 3. Workers have enough slots for their load (`overloaded_worker`)
//! 4. Phases have enough slots for their task duration (`phase_saturation`)
//! 5. Every required skill has a worker (`skill_coverage`)
//! 6. Enough qualified workers for each task's concurrency (`concurrency_infeasible`)
//!
//! Findings come out in exactly that order.

mod checks;
pub mod cycle;
mod scan;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::config::EngineConfig;
use crate::models::{Dataset, Record};

pub use cycle::{find_cycle, has_cycle, CoRunGraph};

/// One problem found in a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Category.
    pub kind: FindingKind,
    /// Human-readable description.
    pub message: String,
    /// Structured context (identities, counts). `null` when there is none.
    #[serde(default)]
    pub details: Value,
}

/// Finding categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// A row lacks required columns or has a blank identity.
    MissingColumns,
    /// Two rows of one kind share an identity.
    DuplicateId,
    /// `AvailableSlots` is not a list of integers.
    MalformedList,
    /// A numeric field is outside its valid range or not a number.
    OutOfRange,
    /// `AttributesJSON` is not a JSON object.
    InvalidJson,
    /// A client requests a task that does not exist.
    UnknownReference,
    /// Co-run groups form a cycle.
    CircularDependency,
    /// A worker has fewer slots than its per-phase load.
    OverloadedWorker,
    /// A phase needs more task duration than it has slots.
    PhaseSaturation,
    /// A required skill has no worker.
    SkillCoverage,
    /// A task allows more concurrency than it has qualified workers.
    ConcurrencyInfeasible,
}

impl FindingKind {
    /// All kinds, in report order.
    pub const ALL: [FindingKind; 11] = [
        FindingKind::MissingColumns,
        FindingKind::DuplicateId,
        FindingKind::MalformedList,
        FindingKind::OutOfRange,
        FindingKind::InvalidJson,
        FindingKind::UnknownReference,
        FindingKind::CircularDependency,
        FindingKind::OverloadedWorker,
        FindingKind::PhaseSaturation,
        FindingKind::SkillCoverage,
        FindingKind::ConcurrencyInfeasible,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::MissingColumns => "missing_columns",
            FindingKind::DuplicateId => "duplicate_id",
            FindingKind::MalformedList => "malformed_list",
            FindingKind::OutOfRange => "out_of_range",
            FindingKind::InvalidJson => "invalid_json",
            FindingKind::UnknownReference => "unknown_reference",
            FindingKind::CircularDependency => "circular_dependency",
            FindingKind::OverloadedWorker => "overloaded_worker",
            FindingKind::PhaseSaturation => "phase_saturation",
            FindingKind::SkillCoverage => "skill_coverage",
            FindingKind::ConcurrencyInfeasible => "concurrency_infeasible",
        }
    }

    /// Whether the finding concerns a single row rather than the dataset as a whole.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            FindingKind::MissingColumns
                | FindingKind::DuplicateId
                | FindingKind::MalformedList
                | FindingKind::OutOfRange
                | FindingKind::InvalidJson
        )
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Finding {
    pub(crate) fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub(crate) fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Counts findings per kind.
pub fn tally(findings: &[Finding]) -> BTreeMap<FindingKind, usize> {
    let mut counts = BTreeMap::new();
    for finding in findings {
        *counts.entry(finding.kind).or_insert(0) += 1;
    }
    counts
}

/// Dataset validator.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: EngineConfig,
}

impl Validator {
    /// Creates a validator with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validator with the given thresholds.
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Validates three collections and returns every finding, in report order.
    ///
    /// The input is not modified.
    pub fn validate(&self, clients: &[Record], workers: &[Record], tasks: &[Record]) -> Vec<Finding> {
        let mut findings = Vec::new();

        let scan = scan::scan_rows(&self.config, clients, workers, tasks, &mut findings);
        let row_findings = findings.len();

        checks::referential_integrity(&scan, &mut findings);
        checks::circular_dependencies(&scan, &mut findings);
        checks::overloaded_workers(&scan, &mut findings);
        checks::phase_saturation(&scan, &mut findings);
        checks::skill_coverage(&scan, &mut findings);
        checks::concurrency_feasibility(&scan, &mut findings);

        debug!(
            rows = clients.len() + workers.len() + tasks.len(),
            accepted = scan.accepted.len(),
            row_findings,
            dataset_findings = findings.len() - row_findings,
            "validation complete"
        );
        findings
    }

    /// Validates a whole dataset.
    pub fn validate_dataset(&self, dataset: &Dataset) -> Vec<Finding> {
        self.validate(&dataset.clients, &dataset.workers, &dataset.tasks)
    }
}

/// Validates three collections with default thresholds.
pub fn validate(clients: &[Record], workers: &[Record], tasks: &[Record]) -> Vec<Finding> {
    Validator::new().validate(clients, workers, tasks)
}
