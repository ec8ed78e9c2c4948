//! Working session over one uploaded dataset.
//!
//! A [`Session`] owns the dataset currently being certified, the rules
//! authored against it, and the priority weights chosen for allocation.
//! Uploading a new dataset replaces all three. Share a session between
//! threads as a [`SharedSession`]; validation only needs a read lock.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::Dataset;
use crate::remediation::{RemediationReport, Remediator};
use crate::rules::{Rule, RuleEngine, RuleOutcome};
use crate::validation::{tally, Finding, FindingKind, Validator};

/// A session behind a read-write lock.
pub type SharedSession = Arc<RwLock<Session>>;

/// Row counts and the current findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub clients: usize,
    pub workers: usize,
    pub tasks: usize,
    pub rules: usize,
    pub findings: usize,
    pub findings_by_kind: BTreeMap<FindingKind, usize>,
}

/// A proposed correction for one finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub kind: FindingKind,
    pub message: String,
    pub suggestion: String,
}

impl From<&Finding> for Suggestion {
    fn from(finding: &Finding) -> Self {
        Self {
            kind: finding.kind,
            message: finding.message.clone(),
            suggestion: format!("Fix {}: {}", finding.kind, finding.message),
        }
    }
}

/// Outcome of [`Session::apply_corrections`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionSummary {
    /// Findings before remediation.
    pub errors_before: usize,
    /// Findings after remediation.
    pub errors_after: usize,
    /// Findings that went away.
    pub errors_fixed: usize,
    /// What remediation changed; `None` when there was nothing to fix.
    pub report: Option<RemediationReport>,
    /// Findings that remain.
    pub findings: Vec<Finding>,
    /// One-line summary.
    pub summary: String,
}

/// One dataset, its rules, and its priority weights.
#[derive(Debug, Clone, Default)]
pub struct Session {
    dataset: Dataset,
    rules: Vec<Rule>,
    priorities: BTreeMap<String, f64>,
    config: EngineConfig,
}

impl Session {
    /// Starts a session on an uploaded dataset.
    pub fn create(dataset: Dataset) -> Self {
        Self {
            dataset,
            ..Self::default()
        }
    }

    /// Uses the given thresholds for validation, remediation, and rules.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Wraps the session for sharing between threads.
    pub fn shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }

    /// Replaces the dataset as a fresh upload does. Rules and priority
    /// weights are cleared.
    pub fn replace(&mut self, dataset: Dataset) {
        info!(
            rows = dataset.len(),
            dropped_rules = self.rules.len(),
            "dataset replaced"
        );
        self.dataset = dataset;
        self.rules.clear();
        self.priorities.clear();
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn dataset_mut(&mut self) -> &mut Dataset {
        &mut self.dataset
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates the current dataset.
    pub fn validate(&self) -> Vec<Finding> {
        Validator::with_config(self.config.clone()).validate_dataset(&self.dataset)
    }

    /// Row counts and finding totals.
    pub fn summary(&self) -> DatasetSummary {
        let findings = self.validate();
        DatasetSummary {
            clients: self.dataset.clients.len(),
            workers: self.dataset.workers.len(),
            tasks: self.dataset.tasks.len(),
            rules: self.rules.len(),
            findings: findings.len(),
            findings_by_kind: tally(&findings),
        }
    }

    /// One suggestion per current finding.
    pub fn suggest_corrections(&self) -> Vec<Suggestion> {
        self.validate().iter().map(Suggestion::from).collect()
    }

    /// Remediates the dataset and re-validates it.
    ///
    /// Does nothing when the dataset has no findings.
    pub fn apply_corrections(&mut self) -> CorrectionSummary {
        let before = self.validate();
        if before.is_empty() {
            return CorrectionSummary {
                errors_before: 0,
                errors_after: 0,
                errors_fixed: 0,
                report: None,
                findings: Vec::new(),
                summary: "No errors to fix".to_string(),
            };
        }

        let report = Remediator::with_config(self.config.clone()).remediate(&mut self.dataset);
        let after = self.validate();
        let fixed = before.len().saturating_sub(after.len());
        info!(
            before = before.len(),
            after = after.len(),
            fixes = report.applied_fixes.len(),
            "corrections applied"
        );
        CorrectionSummary {
            errors_before: before.len(),
            errors_after: after.len(),
            errors_fixed: fixed,
            summary: format!(
                "Applied {} fixes; {} of {} errors resolved",
                report.applied_fixes.len(),
                fixed,
                before.len()
            ),
            report: Some(report),
            findings: after,
        }
    }

    /// Appends a rule. Rules are kept in the order they were added.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Applies one rule to the dataset without storing it.
    pub fn apply_rule(&mut self, rule: &Rule) -> RuleOutcome {
        RuleEngine::with_config(self.config.clone()).apply(rule, &mut self.dataset)
    }

    /// Applies every active stored rule, in order.
    pub fn apply_rules(&mut self) -> Vec<RuleOutcome> {
        let engine = RuleEngine::with_config(self.config.clone());
        self.rules
            .iter()
            .filter(|rule| rule.is_active)
            .map(|rule| engine.apply(rule, &mut self.dataset))
            .collect()
    }

    /// Stored rules as a JSON array.
    pub fn rules_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.rules)?)
    }

    /// Sets priority weights, scaled to sum to 1 when their total is positive.
    pub fn set_priorities(&mut self, weights: BTreeMap<String, f64>) {
        let total: f64 = weights.values().sum();
        self.priorities = if total > 0.0 {
            weights.into_iter().map(|(name, w)| (name, w / total)).collect()
        } else {
            weights
        };
    }

    pub fn priorities(&self) -> &BTreeMap<String, f64> {
        &self.priorities
    }
}
