//! Loosely-typed dataset rows.
//!
//! Rows arrive from spreadsheet uploads, so every cell may be a string, a
//! number, a list, or missing. A [`Record`] keeps the row exactly as it
//! was received; typed views are produced on demand by [`super::coerce`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::coerce::{is_blank, render};
use super::fields;

/// The three entity kinds of an allocation dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A requester of tasks.
    Client,
    /// A skilled worker with phase availability.
    Worker,
    /// A unit of work with duration and skill requirements.
    Task,
}

impl EntityKind {
    /// All kinds, in detection order.
    pub const ALL: [EntityKind; 3] = [EntityKind::Client, EntityKind::Worker, EntityKind::Task];

    /// Name of the identity column for this kind.
    pub fn id_field(self) -> &'static str {
        match self {
            EntityKind::Client => fields::CLIENT_ID,
            EntityKind::Worker => fields::WORKER_ID,
            EntityKind::Task => fields::TASK_ID,
        }
    }

    /// Columns every row of this kind must carry.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            EntityKind::Client => fields::CLIENT_COLUMNS,
            EntityKind::Worker => fields::WORKER_COLUMNS,
            EntityKind::Task => fields::TASK_COLUMNS,
        }
    }

    /// Lowercase label used in messages.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Client => "client",
            EntityKind::Worker => "worker",
            EntityKind::Task => "task",
        }
    }

    /// Detects the kind of a row from the identity column it carries.
    ///
    /// Checks `ClientID`, then `WorkerID`, then `TaskID`.
    pub fn detect(record: &Record) -> Option<EntityKind> {
        Self::ALL
            .into_iter()
            .find(|kind| record.contains(kind.id_field()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One dataset row: a mapping from column name to cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON value, returning `None` unless it is an object.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Sets a field (builder form).
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a field's raw value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Removes a field.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Whether the column is present (even if blank).
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Whether the column is absent or holds a blank value.
    pub fn is_blank(&self, name: &str) -> bool {
        self.get(name).map_or(true, is_blank)
    }

    /// Display text of a field, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.get(name).map(render).unwrap_or_default()
    }

    /// All fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Kind detected from the identity column present.
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::detect(self)
    }

    /// Identity under the detected kind.
    pub fn identity(&self) -> Option<String> {
        self.kind().and_then(|kind| self.identity_of(kind))
    }

    /// Identity under a given kind, as comparable text.
    ///
    /// Numbers are rendered as their JSON text. Blank or non-scalar
    /// identities count as absent.
    pub fn identity_of(&self, kind: EntityKind) -> Option<String> {
        match self.get(kind.id_field())? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Kind a row is judged as when it sits in the `collection` of that kind.
    ///
    /// The identity column present wins; a row with none falls back to its
    /// collection. Validation and remediation both go through this.
    pub fn judged_kind(&self, collection: EntityKind) -> EntityKind {
        self.kind().unwrap_or(collection)
    }

    /// Whether the row carries every required column of its judged kind.
    /// Rows that fail are excluded from validation aggregates.
    pub fn is_accepted(&self, collection: EntityKind) -> bool {
        self.missing_columns(self.judged_kind(collection)).is_empty()
    }

    /// Required columns of `kind` that are absent, plus the identity column
    /// when its value is blank.
    pub fn missing_columns(&self, kind: EntityKind) -> Vec<&'static str> {
        kind.required_columns()
            .iter()
            .copied()
            .filter(|column| {
                if *column == kind.id_field() {
                    self.identity_of(kind).is_none()
                } else {
                    !self.contains(column)
                }
            })
            .collect()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Record {
        Record::from_json(value).unwrap()
    }

    #[test]
    fn test_detect_kind_order() {
        assert_eq!(row(json!({"ClientID": "C1"})).kind(), Some(EntityKind::Client));
        assert_eq!(row(json!({"WorkerID": "W1"})).kind(), Some(EntityKind::Worker));
        assert_eq!(row(json!({"TaskID": "T1"})).kind(), Some(EntityKind::Task));
        // ClientID wins when several identity columns are present.
        assert_eq!(
            row(json!({"TaskID": "T1", "ClientID": "C1"})).kind(),
            Some(EntityKind::Client)
        );
        assert_eq!(row(json!({"Name": "x"})).kind(), None);
    }

    #[test]
    fn test_identity_rendering() {
        assert_eq!(row(json!({"TaskID": " T1 "})).identity(), Some("T1".into()));
        assert_eq!(row(json!({"TaskID": 7})).identity(), Some("7".into()));
        assert_eq!(row(json!({"TaskID": ""})).identity(), None);
        assert_eq!(row(json!({"TaskID": null})).identity(), None);
    }

    #[test]
    fn test_missing_columns() {
        let worker = row(json!({"WorkerID": "W1", "WorkerName": "Ann", "Skills": "x"}));
        let missing = worker.missing_columns(EntityKind::Worker);
        assert_eq!(
            missing,
            vec!["AvailableSlots", "MaxLoadPerPhase", "WorkerGroup", "QualificationLevel"]
        );
    }

    #[test]
    fn test_judged_kind_and_acceptance() {
        let stray = row(json!({"TaskID": "T1", "ClientID": "C1", "TaskName": "x"}));
        assert_eq!(stray.judged_kind(EntityKind::Task), EntityKind::Client);
        assert!(!stray.is_accepted(EntityKind::Task));

        let anonymous = row(json!({"WorkerName": "Ann"}));
        assert_eq!(anonymous.judged_kind(EntityKind::Worker), EntityKind::Worker);

        let worker = row(json!({
            "WorkerID": "W1", "WorkerName": "Ann", "Skills": "x", "AvailableSlots": "[1]",
            "MaxLoadPerPhase": 1, "WorkerGroup": "g", "QualificationLevel": 1
        }));
        assert!(worker.is_accepted(EntityKind::Worker));
        assert!(!row(json!({"WorkerID": "W2", "Skills": "x"})).is_accepted(EntityKind::Worker));
    }

    #[test]
    fn test_blank_identity_is_missing() {
        let client = row(json!({
            "ClientID": "  ", "ClientName": "Acme", "PriorityLevel": 3,
            "RequestedTaskIDs": "T1", "GroupTag": "g", "AttributesJSON": "{}"
        }));
        assert_eq!(client.missing_columns(EntityKind::Client), vec!["ClientID"]);
    }

    #[test]
    fn test_serde_is_transparent() {
        let record = Record::new().with_field("TaskID", "T1").with_field("Duration", 2);
        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(text, r#"{"Duration":2,"TaskID":"T1"}"#);
        let back: Record = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_blank_and_text() {
        let record = row(json!({"A": "", "B": 0, "C": "x", "D": [1, 2]}));
        assert!(record.is_blank("A"));
        assert!(record.is_blank("B"));
        assert!(record.is_blank("missing"));
        assert!(!record.is_blank("C"));
        assert_eq!(record.text("C"), "x");
        assert_eq!(record.text("D"), "[1,2]");
        assert_eq!(record.text("missing"), "");
    }
}
