//! Rule application.
//!
//! Dispatches each rule to the handler for its type. Handlers decode
//! their parameters into a typed shape first; a rule whose parameters do
//! not decode is reported as not applied rather than partially applied.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::condition::matches;
use super::{Rule, RuleOutcome, RuleType};
use crate::config::EngineConfig;
use crate::models::coerce::{
    coerce_number, is_blank, number_value, parse_id_list, render, row_phases, AttributesValue,
};
use crate::models::{fields, Dataset, EntityKind, Record};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PriorityParams {
    condition: Map<String, Value>,
    action: PriorityAction,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PriorityAction {
    #[serde(rename = "type")]
    kind: String,
    value: f64,
}

impl Default for PriorityAction {
    fn default() -> Self {
        Self {
            kind: String::new(),
            value: 1.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoadLimitParams {
    max_load_per_phase: Option<f64>,
    worker_groups: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CoRunParams {
    task_ids: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhaseWindowParams {
    task_id: Option<Value>,
    allowed_phases: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PatternParams {
    pattern: Map<String, Value>,
    action: PatternAction,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PatternAction {
    #[serde(rename = "type")]
    kind: String,
    attribute: Option<String>,
    value: Value,
    modifier: f64,
}

/// Decodes a rule's parameters; absent parameters decode as the default shape.
fn parameters<T: DeserializeOwned + Default>(rule: &Rule) -> Result<T, serde_json::Error> {
    match &rule.parameters {
        Value::Null => Ok(T::default()),
        value => serde_json::from_value(value.clone()),
    }
}

/// Reads a priority cell: numbers, numeric text, or `Low`/`Medium`/`High`.
fn current_priority(value: Option<&Value>) -> f64 {
    let Some(value) = value else {
        return 3.0;
    };
    if let Some(number) = coerce_number(value) {
        return number;
    }
    match value.as_str().map(str::trim) {
        Some("Low") => 1.0,
        Some("High") => 5.0,
        _ => 3.0,
    }
}

/// Writes `value` into `field` unless it already holds that number.
fn set_number(row: &mut Record, field: &str, value: f64) -> bool {
    let unchanged = row
        .get(field)
        .and_then(coerce_number)
        .is_some_and(|current| current == value);
    if unchanged {
        return false;
    }
    row.set(field, number_value(value));
    true
}

fn attributes(row: &Record) -> Option<Map<String, Value>> {
    row.get(fields::ATTRIBUTES_JSON)
        .map(AttributesValue::parse)
        .and_then(AttributesValue::into_object)
}

/// Applies rules to datasets.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    config: EngineConfig,
}

impl RuleEngine {
    /// Creates an engine with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the given thresholds.
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Applies one rule.
    pub fn apply(&self, rule: &Rule, dataset: &mut Dataset) -> RuleOutcome {
        if !rule.is_active {
            return RuleOutcome::skipped(format!("Rule {} is inactive", rule.id));
        }
        let outcome = match rule.rule_type {
            RuleType::PriorityRule => self.apply_priority(rule, dataset),
            RuleType::LoadLimit => self.apply_load_limit(rule, dataset),
            RuleType::CoRun => self.apply_corun(rule, dataset),
            RuleType::PhaseWindow => self.apply_phase_window(rule, dataset),
            RuleType::SlotRestriction => RuleOutcome::applied(
                0,
                "Slot restriction rule registered (enforced at scheduling time)",
            ),
            RuleType::PatternMatch => self.apply_pattern(rule, dataset),
        };
        info!(
            rule = %rule.id,
            rule_type = %rule.rule_type,
            applied = outcome.applied,
            changes = outcome.changes_made,
            "rule processed"
        );
        outcome
    }

    /// Applies rules in order.
    pub fn apply_all(&self, rules: &[Rule], dataset: &mut Dataset) -> Vec<RuleOutcome> {
        rules.iter().map(|rule| self.apply(rule, dataset)).collect()
    }

    /// Decodes and applies a rule given as raw JSON. A rule that does not
    /// decode changes nothing.
    pub fn apply_value(&self, rule: &Value, dataset: &mut Dataset) -> RuleOutcome {
        match Rule::from_value(rule.clone()) {
            Ok(rule) => self.apply(&rule, dataset),
            Err(err) => {
                warn!(error = %err, "rule could not be decoded");
                RuleOutcome::skipped(format!("Rule could not be decoded: {err}"))
            }
        }
    }

    fn invalid(rule: &Rule, err: serde_json::Error) -> RuleOutcome {
        warn!(rule = %rule.id, error = %err, "rule parameters could not be decoded");
        RuleOutcome::skipped(format!("Invalid parameters for rule {}: {err}", rule.id))
    }

    fn apply_priority(&self, rule: &Rule, dataset: &mut Dataset) -> RuleOutcome {
        if rule.mentions("budget") {
            let target = self.config.budget_priority as f64;
            let mut changes = 0;
            for client in dataset.clients.iter_mut() {
                let budget = attributes(client)
                    .and_then(|attrs| attrs.get("budget").and_then(coerce_number))
                    .unwrap_or(0.0);
                if budget > self.config.budget_threshold && set_number(client, fields::PRIORITY_LEVEL, target) {
                    debug!(client = %client.text(fields::CLIENT_ID), budget, "raised priority for budget");
                    changes += 1;
                }
            }
            return RuleOutcome::applied(
                changes,
                format!("Set PriorityLevel {target} for {changes} clients with budget over {}", self.config.budget_threshold),
            );
        }

        if rule.mentions("urgent") {
            let target = self.config.urgent_priority as f64;
            let mut changes = 0;
            for client in dataset.clients.iter_mut() {
                let urgent = attributes(client)
                    .and_then(|attrs| attrs.get("urgent").cloned())
                    .is_some_and(|flag| !is_blank(&flag));
                if urgent && set_number(client, fields::PRIORITY_LEVEL, target) {
                    debug!(client = %client.text(fields::CLIENT_ID), "raised priority for urgency");
                    changes += 1;
                }
            }
            return RuleOutcome::applied(
                changes,
                format!("Set PriorityLevel {target} for {changes} urgent clients"),
            );
        }

        let params: PriorityParams = match parameters(rule) {
            Ok(params) => params,
            Err(err) => return Self::invalid(rule, err),
        };
        let on_tasks = params.condition.get("entity_type").and_then(Value::as_str) == Some("task");
        let (rows, field) = if on_tasks {
            (&mut dataset.tasks, fields::PRIORITY)
        } else {
            (&mut dataset.clients, fields::PRIORITY_LEVEL)
        };

        let floor = self.config.priority_min as f64;
        let cap = self.config.rule_priority_cap as f64;
        let step = params.action.value;
        let mut changes = 0;
        for row in rows.iter_mut() {
            if !matches(row, &params.condition) {
                continue;
            }
            let current = current_priority(row.get(field));
            let next = match params.action.kind.as_str() {
                "boost_priority" => (current + step).min(cap),
                "lower_priority" => (current - step).max(floor),
                _ => continue,
            };
            if next != current && set_number(row, field, next) {
                changes += 1;
            }
        }
        RuleOutcome::applied(changes, format!("Modified priority for {changes} entities"))
    }

    fn apply_load_limit(&self, rule: &Rule, dataset: &mut Dataset) -> RuleOutcome {
        let params: LoadLimitParams = match parameters(rule) {
            Ok(params) => params,
            Err(err) => return Self::invalid(rule, err),
        };
        let ceiling = params.max_load_per_phase.unwrap_or(self.config.default_load_limit);

        let mut changes = 0;
        for worker in dataset.workers.iter_mut() {
            let in_scope = params.worker_groups.is_empty()
                || params
                    .worker_groups
                    .contains(&worker.text(fields::WORKER_GROUP));
            if !in_scope {
                continue;
            }
            let over = worker
                .get(fields::MAX_LOAD_PER_PHASE)
                .and_then(coerce_number)
                .map_or(true, |load| load > ceiling);
            if over && set_number(worker, fields::MAX_LOAD_PER_PHASE, ceiling) {
                changes += 1;
            }
        }
        RuleOutcome::applied(changes, format!("Applied load limit to {changes} workers"))
    }

    fn apply_corun(&self, rule: &Rule, dataset: &mut Dataset) -> RuleOutcome {
        let params: CoRunParams = match parameters(rule) {
            Ok(params) => params,
            Err(err) => return Self::invalid(rule, err),
        };
        let targets: Vec<String> = params.task_ids.iter().map(render).collect();
        let group = format!("corun_{}", rule.id);

        let mut changes = 0;
        for task in dataset.tasks.iter_mut() {
            let Some(id) = task.identity_of(EntityKind::Task) else {
                continue;
            };
            if !targets.contains(&id) {
                continue;
            }
            let mut members = task
                .get(fields::CO_RUN_GROUP)
                .map(parse_id_list)
                .unwrap_or_default();
            if members.contains(&group) {
                continue;
            }
            members.push(group.clone());
            task.set(fields::CO_RUN_GROUP, members);
            changes += 1;
        }
        RuleOutcome::applied(changes, format!("Added co-run group to {changes} tasks"))
    }

    fn apply_phase_window(&self, rule: &Rule, dataset: &mut Dataset) -> RuleOutcome {
        let params: PhaseWindowParams = match parameters(rule) {
            Ok(params) => params,
            Err(err) => return Self::invalid(rule, err),
        };
        let Some(target) = params.task_id.as_ref().map(render) else {
            return RuleOutcome::applied(0, "Phase window names no task");
        };

        let mut changes = 0;
        for task in dataset.tasks.iter_mut() {
            if task.identity_of(EntityKind::Task).as_deref() != Some(target.as_str()) {
                continue;
            }
            let mut phases: Vec<i64> = row_phases(task)
                .into_iter()
                .filter(|phase| params.allowed_phases.contains(phase))
                .collect();
            if phases.is_empty() {
                phases = params.allowed_phases.iter().take(1).copied().collect();
            }
            task.set(fields::PREFERRED_PHASES, Value::from(phases).to_string());
            changes += 1;
        }
        RuleOutcome::applied(changes, format!("Applied phase window to {changes} tasks"))
    }

    fn apply_pattern(&self, rule: &Rule, dataset: &mut Dataset) -> RuleOutcome {
        let params: PatternParams = match parameters(rule) {
            Ok(params) => params,
            Err(err) => return Self::invalid(rule, err),
        };
        let action = &params.action;
        let (floor, ceiling) = (self.config.priority_min as f64, self.config.priority_max as f64);

        let mut changes = 0;
        for (kind, row) in dataset.rows_mut() {
            if !matches(row, &params.pattern) {
                continue;
            }
            let changed = match action.kind.as_str() {
                "set_attribute" => match &action.attribute {
                    Some(attribute) if !attribute.is_empty() && !action.value.is_null() => {
                        let changed = row.get(attribute) != Some(&action.value);
                        if changed {
                            row.set(attribute.clone(), action.value.clone());
                        }
                        changed
                    }
                    _ => false,
                },
                "modify_priority" => {
                    let field = match kind {
                        EntityKind::Client => fields::PRIORITY_LEVEL,
                        _ => fields::PRIORITY,
                    };
                    if row.contains(field) {
                        let current = current_priority(row.get(field));
                        let next = (current + action.modifier).max(floor).min(ceiling);
                        next != current && set_number(row, field, next)
                    } else {
                        false
                    }
                }
                _ => false,
            };
            if changed {
                changes += 1;
            }
        }
        RuleOutcome::applied(changes, format!("Applied pattern rule to {changes} entities"))
    }
}

/// Applies one rule with default thresholds.
pub fn apply_rule(rule: &Rule, dataset: &mut Dataset) -> RuleOutcome {
    RuleEngine::new().apply(rule, dataset)
}

/// Applies rules in order with default thresholds.
pub fn apply_rules(rules: &[Rule], dataset: &mut Dataset) -> Vec<RuleOutcome> {
    RuleEngine::new().apply_all(rules, dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(id: &str, priority: Value, attributes: &str) -> Record {
        Record::new()
            .with_field("ClientID", id)
            .with_field("PriorityLevel", priority)
            .with_field("AttributesJSON", attributes)
    }

    fn dataset() -> Dataset {
        Dataset::new(
            vec![
                client("C1", json!(3), r#"{"budget": 50000}"#),
                client("C2", json!(2), r#"{"budget": 1000, "urgent": true}"#),
                client("C3", json!("High"), "not json"),
            ],
            vec![
                Record::new()
                    .with_field("WorkerID", "W1")
                    .with_field("WorkerGroup", "night")
                    .with_field("MaxLoadPerPhase", 5),
                Record::new()
                    .with_field("WorkerID", "W2")
                    .with_field("WorkerGroup", "day")
                    .with_field("MaxLoadPerPhase", 2),
            ],
            vec![
                Record::new()
                    .with_field("TaskID", "T1")
                    .with_field("PreferredPhases", "1-4")
                    .with_field("Priority", 3),
                Record::new().with_field("TaskID", "T2").with_field("PreferredPhases", "[5]"),
            ],
        )
    }

    #[test]
    fn test_budget_rule() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::PriorityRule).with_name("High budget priority");
        let outcome = apply_rule(&rule, &mut data);
        assert!(outcome.applied);
        assert_eq!(outcome.changes_made, 1);
        assert_eq!(data.clients[0].get("PriorityLevel"), Some(&json!(9)));
        assert_eq!(data.clients[1].get("PriorityLevel"), Some(&json!(2)));

        // Re-applying changes nothing further.
        assert_eq!(apply_rule(&rule, &mut data).changes_made, 0);
    }

    #[test]
    fn test_urgent_rule() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::PriorityRule).with_description("Urgent clients first");
        let outcome = apply_rule(&rule, &mut data);
        assert_eq!(outcome.changes_made, 1);
        assert_eq!(data.clients[1].get("PriorityLevel"), Some(&json!(10)));
    }

    #[test]
    fn test_generic_boost_with_textual_priority() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::PriorityRule).with_parameters(json!({
            "condition": {"ClientID": "C3"},
            "action": {"type": "boost_priority", "value": 2}
        }));
        let outcome = apply_rule(&rule, &mut data);
        assert_eq!(outcome.changes_made, 1);
        assert_eq!(data.clients[2].get("PriorityLevel"), Some(&json!(7)));
    }

    #[test]
    fn test_generic_boost_is_capped() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::PriorityRule).with_parameters(json!({
            "condition": {"PriorityLevel": {">=": 3}},
            "action": {"type": "boost_priority", "value": 20}
        }));
        apply_rule(&rule, &mut data);
        assert_eq!(data.clients[0].get("PriorityLevel"), Some(&json!(10)));
        assert_eq!(data.clients[1].get("PriorityLevel"), Some(&json!(2)));
    }

    #[test]
    fn test_generic_lower_on_tasks() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::PriorityRule).with_parameters(json!({
            "condition": {"entity_type": "task"},
            "action": {"type": "lower_priority", "value": 5}
        }));
        let outcome = apply_rule(&rule, &mut data);
        // T1 drops from 3 to the floor; T2 had the implicit default 3.
        assert_eq!(outcome.changes_made, 2);
        assert_eq!(data.tasks[0].get("Priority"), Some(&json!(1)));
        assert_eq!(data.tasks[1].get("Priority"), Some(&json!(1)));
    }

    #[test]
    fn test_malformed_parameters_degrade() {
        let mut data = dataset();
        let before = data.clone();
        let rule = Rule::new("r1", RuleType::PriorityRule).with_parameters(json!({
            "condition": "budget > 40000",
            "action": "set_priority"
        }));
        let outcome = apply_rule(&rule, &mut data);
        assert!(!outcome.applied);
        assert_eq!(outcome.changes_made, 0);
        assert_eq!(data, before);
    }

    #[test]
    fn test_undecodable_rule_value() {
        let mut data = dataset();
        let outcome = RuleEngine::new().apply_value(&json!({"type": 42}), &mut data);
        assert!(!outcome.applied);
        assert_eq!(outcome.changes_made, 0);
    }

    #[test]
    fn test_inactive_rule_skipped() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::LoadLimit).with_active(false);
        let outcome = apply_rule(&rule, &mut data);
        assert!(!outcome.applied);
        assert_eq!(data.workers[0].get("MaxLoadPerPhase"), Some(&json!(5)));
    }

    #[test]
    fn test_load_limit() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::LoadLimit)
            .with_parameters(json!({"max_load_per_phase": 3, "worker_groups": ["night"]}));
        let outcome = apply_rule(&rule, &mut data);
        assert_eq!(outcome.changes_made, 1);
        assert_eq!(data.workers[0].get("MaxLoadPerPhase"), Some(&json!(3)));
        assert_eq!(data.workers[1].get("MaxLoadPerPhase"), Some(&json!(2)));
    }

    #[test]
    fn test_load_limit_defaults_to_all_workers() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::LoadLimit).with_parameters(json!({"max_load_per_phase": 1}));
        assert_eq!(apply_rule(&rule, &mut data).changes_made, 2);
    }

    #[test]
    fn test_corun_is_deduplicated() {
        let mut data = dataset();
        let rule = Rule::new("g7", RuleType::CoRun).with_parameters(json!({"task_ids": ["T1", "T2", "T9"]}));
        assert_eq!(apply_rule(&rule, &mut data).changes_made, 2);
        assert_eq!(data.tasks[0].get("CoRunGroup"), Some(&json!(["corun_g7"])));
        assert_eq!(apply_rule(&rule, &mut data).changes_made, 0);
    }

    #[test]
    fn test_phase_window() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::PhaseWindow)
            .with_parameters(json!({"task_id": "T1", "allowed_phases": [2, 3, 7]}));
        let outcome = apply_rule(&rule, &mut data);
        assert_eq!(outcome.changes_made, 1);
        assert_eq!(data.tasks[0].text("PreferredPhases"), "[2,3]");
    }

    #[test]
    fn test_phase_window_falls_back_to_first_allowed() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::PhaseWindow)
            .with_parameters(json!({"task_id": "T2", "allowed_phases": [2, 3]}));
        apply_rule(&rule, &mut data);
        assert_eq!(data.tasks[1].text("PreferredPhases"), "[2]");
    }

    #[test]
    fn test_slot_restriction_is_informational() {
        let mut data = dataset();
        let before = data.clone();
        let outcome = apply_rule(&Rule::new("r1", RuleType::SlotRestriction), &mut data);
        assert!(outcome.applied);
        assert_eq!(outcome.changes_made, 0);
        assert_eq!(data, before);
    }

    #[test]
    fn test_pattern_set_attribute() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::PatternMatch).with_parameters(json!({
            "pattern": {"WorkerGroup": "night"},
            "action": {"type": "set_attribute", "attribute": "Shift", "value": "late"}
        }));
        assert_eq!(apply_rule(&rule, &mut data).changes_made, 1);
        assert_eq!(data.workers[0].text("Shift"), "late");
    }

    #[test]
    fn test_pattern_modify_priority_clamped() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::PatternMatch).with_parameters(json!({
            "pattern": {},
            "action": {"type": "modify_priority", "modifier": 4}
        }));
        let outcome = apply_rule(&rule, &mut data);
        // C1 3->5, C2 2->5, C3 High(5) unchanged, T1 3->5; T2 has no Priority.
        assert_eq!(outcome.changes_made, 3);
        assert_eq!(data.clients[1].get("PriorityLevel"), Some(&json!(5)));
        assert!(!data.tasks[1].contains("Priority"));
    }

    #[test]
    fn test_pattern_modify_priority_with_inverted_bounds() {
        let mut data = dataset();
        let config = EngineConfig {
            priority_min: 5,
            priority_max: 1,
            ..EngineConfig::default()
        };
        let rule = Rule::new("r1", RuleType::PatternMatch).with_parameters(json!({
            "pattern": {"ClientID": "C2"},
            "action": {"type": "modify_priority", "modifier": 1}
        }));
        let outcome = RuleEngine::with_config(config).apply(&rule, &mut data);
        assert!(outcome.applied);
        assert_eq!(data.clients[1].get("PriorityLevel"), Some(&json!(1)));
    }

    #[test]
    fn test_pattern_unknown_action_is_noop() {
        let mut data = dataset();
        let rule = Rule::new("r1", RuleType::PatternMatch)
            .with_parameters(json!({"pattern": {}, "action": {"type": "explode"}}));
        assert_eq!(apply_rule(&rule, &mut data).changes_made, 0);
    }

    #[test]
    fn test_apply_rules_in_order() {
        let mut data = dataset();
        let rules = vec![
            Rule::new("a", RuleType::LoadLimit).with_parameters(json!({"max_load_per_phase": 4})),
            Rule::new("b", RuleType::LoadLimit).with_parameters(json!({"max_load_per_phase": 1})),
        ];
        let outcomes = apply_rules(&rules, &mut data);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].changes_made, 1);
        assert_eq!(outcomes[1].changes_made, 2);
    }
}
