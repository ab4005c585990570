//! Serialized event payload published on channels.

use crate::model::task::{now_epoch_ms, Task};
use serde::{Deserialize, Serialize};

/// Event classification carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Completed,
    Deleted,
    Restored,
    /// A subtask's parent changed state; sent to viewers of the subtask.
    ParentUpdated,
    /// A subtask changed state; sent to viewers of the parent.
    SubtaskUpdated,
}

/// One published event.
///
/// Snapshots are full current state, not diffs; `changed_fields` is an
/// advisory hint carried by update events only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub kind: EventKind,
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Task>,
    /// Epoch ms publication timestamp.
    pub occurred_at: i64,
}

impl EventEnvelope {
    /// Builds an envelope around the task's current snapshot.
    pub fn new(kind: EventKind, task: Task) -> Self {
        Self {
            kind,
            task,
            changed_fields: None,
            parent: None,
            occurred_at: now_epoch_ms(),
        }
    }

    pub fn with_changed_fields(mut self, changed_fields: Vec<String>) -> Self {
        self.changed_fields = Some(changed_fields);
        self
    }

    pub fn with_parent(mut self, parent: Task) -> Self {
        self.parent = Some(parent);
        self
    }
}
