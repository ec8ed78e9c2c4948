//! Engine configuration.
//!
//! Every threshold and default the engines rely on lives here so a
//! deployment can tune them from a TOML file. All fields are optional in
//! the file; missing ones take the values below.
//!
//! ```toml
//! priority_max = 5
//! budget_threshold = 50000.0
//!
//! [defaults]
//! group_tag = "unassigned"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, Result};

/// Thresholds and defaults shared by the validator, remediator, and rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lowest valid `PriorityLevel`.
    pub priority_min: i64,
    /// Highest valid `PriorityLevel`.
    pub priority_max: i64,
    /// Priority assigned when a `PriorityLevel` cannot be read as a number.
    pub default_priority: i64,
    /// Upper bound for priorities raised by priority rules.
    pub rule_priority_cap: i64,
    /// Budget above which budget-driven priority rules fire.
    pub budget_threshold: f64,
    /// Priority assigned by budget-driven rules.
    pub budget_priority: i64,
    /// Priority assigned by urgency-driven rules.
    pub urgent_priority: i64,
    /// Load ceiling used by load-limit rules that do not name one.
    pub default_load_limit: f64,
    /// Number of slots written when `AvailableSlots` cannot be salvaged.
    pub default_slot_count: usize,
    /// Values written into blank required fields.
    pub defaults: FieldDefaults,
}

/// Fill values for blank required fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDefaults {
    pub group_tag: String,
    pub attributes_json: String,
    pub worker_group: String,
    pub qualification_level: i64,
    pub category: String,
    pub preferred_phases: String,
    pub max_concurrent: i64,
    /// Phase used when `PreferredPhases` text cannot be repaired.
    pub phase: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            priority_min: 1,
            priority_max: 5,
            default_priority: 3,
            rule_priority_cap: 10,
            budget_threshold: 40_000.0,
            budget_priority: 9,
            urgent_priority: 10,
            default_load_limit: 3.0,
            default_slot_count: 3,
            defaults: FieldDefaults::default(),
        }
    }
}

impl Default for FieldDefaults {
    fn default() -> Self {
        Self {
            group_tag: "default".into(),
            attributes_json: "{}".into(),
            worker_group: "default".into(),
            qualification_level: 1,
            category: "general".into(),
            preferred_phases: "1".into(),
            max_concurrent: 1,
            phase: 1,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML text and checks it for consistency.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    /// Reads a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Whether `value` lies inside the valid `PriorityLevel` range.
    pub fn priority_in_range(&self, value: f64) -> bool {
        value >= self.priority_min as f64 && value <= self.priority_max as f64
    }

    fn check(&self) -> Result<()> {
        if self.priority_min > self.priority_max {
            return Err(AllocationError::config(format!(
                "priority_min ({}) exceeds priority_max ({})",
                self.priority_min, self.priority_max
            )));
        }
        if !self.priority_in_range(self.default_priority as f64) {
            return Err(AllocationError::config(format!(
                "default_priority ({}) is outside [{}, {}]",
                self.default_priority, self.priority_min, self.priority_max
            )));
        }
        if self.rule_priority_cap < self.priority_min {
            return Err(AllocationError::config(
                "rule_priority_cap is below priority_min",
            ));
        }
        if self.default_slot_count == 0 {
            return Err(AllocationError::config("default_slot_count must be positive"));
        }
        Ok(())
    }
}
