//! Allocation dataset models.
//!
//! An allocation dataset has three collections of spreadsheet-like rows.
//! Rows stay loosely typed so that every malformed cell can be reported
//! and repaired instead of rejected at the door.
//!
//! | Entity | Identity | Notable columns |
//! |--------|----------|-----------------|
//! | Client | `ClientID` | `PriorityLevel`, `RequestedTaskIDs`, `AttributesJSON` |
//! | Worker | `WorkerID` | `Skills`, `AvailableSlots`, `MaxLoadPerPhase` |
//! | Task | `TaskID` | `Duration`, `RequiredSkills`, `PreferredPhases`, `MaxConcurrent` |

pub mod coerce;
mod dataset;
mod record;

pub use dataset::Dataset;
pub use record::{EntityKind, Record};

/// Column names.
pub mod fields {
    pub const CLIENT_ID: &str = "ClientID";
    pub const CLIENT_NAME: &str = "ClientName";
    pub const PRIORITY_LEVEL: &str = "PriorityLevel";
    pub const REQUESTED_TASK_IDS: &str = "RequestedTaskIDs";
    pub const GROUP_TAG: &str = "GroupTag";
    pub const ATTRIBUTES_JSON: &str = "AttributesJSON";

    pub const WORKER_ID: &str = "WorkerID";
    pub const WORKER_NAME: &str = "WorkerName";
    pub const SKILLS: &str = "Skills";
    pub const AVAILABLE_SLOTS: &str = "AvailableSlots";
    pub const MAX_LOAD_PER_PHASE: &str = "MaxLoadPerPhase";
    pub const WORKER_GROUP: &str = "WorkerGroup";
    pub const QUALIFICATION_LEVEL: &str = "QualificationLevel";

    pub const TASK_ID: &str = "TaskID";
    pub const TASK_NAME: &str = "TaskName";
    pub const CATEGORY: &str = "Category";
    pub const DURATION: &str = "Duration";
    pub const REQUIRED_SKILLS: &str = "RequiredSkills";
    pub const PREFERRED_PHASES: &str = "PreferredPhases";
    pub const MAX_CONCURRENT: &str = "MaxConcurrent";

    /// Optional task column listing tasks that must run together.
    pub const CO_RUN_GROUP: &str = "CoRunGroup";
    /// Optional column pinning a row to one phase.
    pub const PHASE: &str = "Phase";
    /// Optional task priority written by priority rules.
    pub const PRIORITY: &str = "Priority";
    /// Optional task column naming the phases a task may run in.
    pub const ALLOWED_PHASES: &str = "AllowedPhases";

    pub const CLIENT_COLUMNS: &[&str] = &[
        CLIENT_ID,
        CLIENT_NAME,
        PRIORITY_LEVEL,
        REQUESTED_TASK_IDS,
        GROUP_TAG,
        ATTRIBUTES_JSON,
    ];

    pub const WORKER_COLUMNS: &[&str] = &[
        WORKER_ID,
        WORKER_NAME,
        SKILLS,
        AVAILABLE_SLOTS,
        MAX_LOAD_PER_PHASE,
        WORKER_GROUP,
        QUALIFICATION_LEVEL,
    ];

    pub const TASK_COLUMNS: &[&str] = &[
        TASK_ID,
        TASK_NAME,
        CATEGORY,
        DURATION,
        REQUIRED_SKILLS,
        PREFERRED_PHASES,
        MAX_CONCURRENT,
    ];
}
