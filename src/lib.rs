//! Dataset certification for task allocation.
//!
//! Checks that a three-collection dataset (clients, workers, tasks) is
//! internally consistent before it is handed to an allocator, repairs what
//! can be repaired conservatively, and applies business rules to it.
//!
//! # Modules
//!
//! - **`models`**: `Record`, `EntityKind`, `Dataset`, and the field coercion
//!   helpers every reader of a field goes through
//! - **`validation`**: Cross-entity checks producing `Finding`s, plus co-run
//!   cycle detection
//! - **`remediation`**: Ordered automatic repairs with an audit log
//! - **`rules`**: `Rule` documents and the engine that applies them
//! - **`session`**: One uploaded dataset with its rules and priority weights
//!
//! # Example
//!
//! ```
//! use u_allocation::{remediate, validate, Dataset};
//!
//! let mut dataset = Dataset::from_json(r#"{
//!     "clients": [
//!         {"ClientID": "C1", "ClientName": "Acme", "PriorityLevel": 7,
//!          "RequestedTaskIDs": "T1", "GroupTag": "a", "AttributesJSON": "{}"}
//!     ]
//! }"#).unwrap();
//!
//! assert!(!validate(&dataset.clients, &dataset.workers, &dataset.tasks).is_empty());
//! remediate(&mut dataset);
//! assert_eq!(dataset.clients[0].get("PriorityLevel"), Some(&serde_json::json!(5)));
//! ```
//!
//! # Architecture
//!
//! Validation, remediation, and rule application are total: malformed
//! input becomes a finding, an audit line, or a zero-change outcome.
//! Only loading configuration, rules, and datasets returns
//! [`AllocationError`].

pub mod config;
pub mod error;
pub mod models;
pub mod remediation;
pub mod rules;
pub mod session;
pub mod validation;

pub use config::{EngineConfig, FieldDefaults};
pub use error::{AllocationError, Result};
pub use models::{Dataset, EntityKind, Record};
pub use remediation::{remediate, RemediationReport, RemovedCounts, Remediator};
pub use rules::{apply_rule, apply_rules, generate_simple_rule, Rule, RuleEngine, RuleOutcome, RuleType};
pub use session::{CorrectionSummary, DatasetSummary, Session, SharedSession, Suggestion};
pub use validation::{find_cycle, has_cycle, validate, Finding, FindingKind, Validator};
