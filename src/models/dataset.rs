//! The three-collection dataset.

use serde::{Deserialize, Serialize};

use super::{EntityKind, Record};
use crate::error::{AllocationError, Result};

/// Clients, workers, and tasks as uploaded.
///
/// Collections keep upload order; nothing here deduplicates or checks
/// rows. Serializes as `{"clients": [...], "workers": [...], "tasks": [...]}`
/// with missing collections treated as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub clients: Vec<Record>,
    #[serde(default)]
    pub workers: Vec<Record>,
    #[serde(default)]
    pub tasks: Vec<Record>,
}

impl Dataset {
    /// Creates a dataset from its three collections.
    pub fn new(clients: Vec<Record>, workers: Vec<Record>, tasks: Vec<Record>) -> Self {
        Self {
            clients,
            workers,
            tasks,
        }
    }

    /// Parses a dataset document.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(AllocationError::InvalidDataset(
                "expected an object with clients, workers, and tasks".into(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Serializes the dataset as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The collection holding rows of `kind`.
    pub fn collection(&self, kind: EntityKind) -> &[Record] {
        match kind {
            EntityKind::Client => &self.clients,
            EntityKind::Worker => &self.workers,
            EntityKind::Task => &self.tasks,
        }
    }

    /// Mutable access to the collection holding rows of `kind`.
    pub fn collection_mut(&mut self, kind: EntityKind) -> &mut Vec<Record> {
        match kind {
            EntityKind::Client => &mut self.clients,
            EntityKind::Worker => &mut self.workers,
            EntityKind::Task => &mut self.tasks,
        }
    }

    /// Every row, tagged with the collection it belongs to.
    pub fn rows(&self) -> impl Iterator<Item = (EntityKind, &Record)> {
        EntityKind::ALL
            .into_iter()
            .flat_map(move |kind| self.collection(kind).iter().map(move |row| (kind, row)))
    }

    /// Every row, mutably, tagged with the collection it belongs to.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = (EntityKind, &mut Record)> {
        let clients = self.clients.iter_mut().map(|row| (EntityKind::Client, row));
        let workers = self.workers.iter_mut().map(|row| (EntityKind::Worker, row));
        let tasks = self.tasks.iter_mut().map(|row| (EntityKind::Task, row));
        clients.chain(workers).chain(tasks)
    }

    /// Total number of rows.
    pub fn len(&self) -> usize {
        self.clients.len() + self.workers.len() + self.tasks.len()
    }

    /// Whether all collections are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
