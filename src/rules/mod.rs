//! Business rules.
//!
//! A [`Rule`] is a structured instruction authored elsewhere (a rule
//! editor or a text-to-rule generator) and applied to a dataset by the
//! [`RuleEngine`]. Rule types form a closed set; each has its own
//! parameter shape and handler.
//!
//! | Type | Parameters | Effect |
//! |------|------------|--------|
//! | `priorityRule` | `condition`, `action` | Raise or lower client/task priority |
//! | `loadLimit` | `max_load_per_phase`, `worker_groups` | Cap `MaxLoadPerPhase` |
//! | `coRun` | `task_ids` | Tag tasks with a shared co-run group |
//! | `phaseWindow` | `task_id`, `allowed_phases` | Restrict `PreferredPhases` |
//! | `slotRestriction` | `target_entities`, `min_common_slots` | Recorded only |
//! | `patternMatch` | `pattern`, `action` | Set attributes or shift priority |
//!
//! Applying a rule never fails. Unreadable parameters and unknown
//! actions produce an outcome with zero changes.

mod condition;
mod engine;
mod generator;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{AllocationError, Result};

pub use condition::matches;
pub use engine::{apply_rule, apply_rules, RuleEngine};
pub use generator::generate_simple_rule;

/// Rule types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleType {
    PriorityRule,
    LoadLimit,
    CoRun,
    PhaseWindow,
    SlotRestriction,
    PatternMatch,
}

impl RuleType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::PriorityRule => "priorityRule",
            RuleType::LoadLimit => "loadLimit",
            RuleType::CoRun => "coRun",
            RuleType::PhaseWindow => "phaseWindow",
            RuleType::SlotRestriction => "slotRestriction",
            RuleType::PatternMatch => "patternMatch",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_active() -> bool {
    true
}

/// A business rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique rule identifier.
    #[serde(default)]
    pub id: String,
    /// Short title.
    #[serde(default)]
    pub name: String,
    /// Longer description. Priority rules read it for keywords.
    #[serde(default)]
    pub description: String,
    /// Rule type.
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// Type-specific parameters.
    #[serde(default)]
    pub parameters: Value,
    /// Inactive rules are skipped.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Creation timestamp (RFC 3339), when known.
    #[serde(default)]
    pub created_at: String,
}

impl Rule {
    /// Creates an active rule with no parameters.
    pub fn new(id: impl Into<String>, rule_type: RuleType) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            rule_type,
            parameters: Value::Null,
            is_active: true,
            created_at: String::new(),
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the parameters.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets whether the rule is active.
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Decodes a rule from a JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| AllocationError::invalid_rule(e.to_string()))
    }

    /// Decodes a rule from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Whether the name or description mentions `word` (case-insensitive).
    pub fn mentions(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.name.to_lowercase().contains(&word) || self.description.to_lowercase().contains(&word)
    }
}

/// Result of applying one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    /// Whether the rule was applied.
    pub applied: bool,
    /// Number of values changed.
    pub changes_made: usize,
    /// Human-readable summary.
    pub description: String,
}

impl RuleOutcome {
    pub(crate) fn applied(changes_made: usize, description: impl Into<String>) -> Self {
        Self {
            applied: true,
            changes_made,
            description: description.into(),
        }
    }

    pub(crate) fn skipped(description: impl Into<String>) -> Self {
        Self {
            applied: false,
            changes_made: 0,
            description: description.into(),
        }
    }
}
