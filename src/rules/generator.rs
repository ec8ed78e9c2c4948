//! Keyword-based rule generation.
//!
//! Recognizes two fixed phrasings and produces a ready-to-apply priority
//! rule. Anything else yields `None`; richer text-to-rule generation is
//! left to the caller.

use chrono::Utc;
use rand::Rng;
use serde_json::json;

use super::{Rule, RuleType};

fn rule_id() -> String {
    format!("priorityRule_{:08x}", rand::rng().random::<u32>())
}

/// Builds a priority rule from a short instruction.
///
/// * mentions "budget" and "40000": clients with a budget over 40000 get
///   priority 9.
/// * mentions "urgent" and "priority": urgent clients get priority 10.
pub fn generate_simple_rule(text: &str) -> Option<Rule> {
    let lower = text.to_lowercase();
    let (name, condition, value) = if lower.contains("budget") && lower.contains("40000") {
        ("High Budget Priority Rule", "budget > 40000", 9)
    } else if lower.contains("urgent") && lower.contains("priority") {
        ("Urgent Client Priority Rule", "urgent == true", 10)
    } else {
        return None;
    };

    let mut rule = Rule::new(rule_id(), RuleType::PriorityRule)
        .with_name(name)
        .with_description(text.trim())
        .with_parameters(json!({
            "condition": condition,
            "action": "set_priority",
            "value": value
        }));
    rule.created_at = Utc::now().to_rfc3339();
    Some(rule)
}
