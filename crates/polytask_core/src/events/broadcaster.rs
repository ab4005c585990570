//! Lifecycle and hierarchy event fan-out.

use crate::events::bus::EventBus;
use crate::events::envelope::{EventEnvelope, EventKind};
use crate::model::task::{OwnerId, Task, TaskId};
use log::{info, warn};

/// Channel every lifecycle envelope is mirrored to.
pub const GLOBAL_CHANNEL: &str = "tasks.global";

/// Channel scoped to one owner's tasks.
pub fn owner_channel(owner: OwnerId) -> String {
    format!("tasks.owner.{owner}")
}

/// Channel scoped to viewers of one task.
pub fn task_channel(id: TaskId) -> String {
    format!("tasks.task.{id}")
}

/// Publishes task envelopes to owner, global and hierarchy channels.
///
/// Every publish is fire-and-forget: a failed publish is logged and
/// dropped, and never influences the caller-visible outcome of the
/// mutation that triggered it.
pub struct TaskBroadcaster<B: EventBus> {
    bus: B,
}

impl<B: EventBus> TaskBroadcaster<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Read access to the underlying bus, mainly for test observation.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn task_created(&self, task: &Task) {
        self.fan_out_lifecycle(EventEnvelope::new(EventKind::Created, task.clone()));
    }

    pub fn task_updated(&self, task: &Task, changed_fields: &[String]) {
        self.fan_out_lifecycle(
            EventEnvelope::new(EventKind::Updated, task.clone())
                .with_changed_fields(changed_fields.to_vec()),
        );
    }

    pub fn task_completed(&self, task: &Task) {
        self.fan_out_lifecycle(EventEnvelope::new(EventKind::Completed, task.clone()));
    }

    pub fn task_deleted(&self, task: &Task) {
        self.fan_out_lifecycle(EventEnvelope::new(EventKind::Deleted, task.clone()));
    }

    pub fn task_restored(&self, task: &Task) {
        self.fan_out_lifecycle(EventEnvelope::new(EventKind::Restored, task.clone()));
    }

    /// Tells viewers of each direct child that the parent's state moved.
    ///
    /// N children produce N envelopes, each carrying the parent's
    /// current snapshot on the child's task channel.
    pub fn hierarchy_parent_updated(&self, parent: &Task, children: &[Task]) {
        for child in children {
            let envelope = EventEnvelope::new(EventKind::ParentUpdated, parent.clone());
            self.publish(&task_channel(child.uuid), &envelope);
        }
    }

    /// Tells viewers of the parent that one subtask's state moved.
    ///
    /// A root subtask, or one whose parent reference does not resolve
    /// (orphan), publishes nothing; that is an expected state, not an
    /// error.
    pub fn hierarchy_child_updated(&self, subtask: &Task, parent: Option<&Task>) {
        let Some(parent) = parent else {
            info!(
                "event=subtask_broadcast module=events status=skipped task={} reason=no_resolvable_parent",
                subtask.uuid
            );
            return;
        };

        let envelope = EventEnvelope::new(EventKind::SubtaskUpdated, subtask.clone())
            .with_parent(parent.clone());
        self.publish(&owner_channel(parent.owner_uuid), &envelope);
    }

    /// Owner channel plus global channel: exactly two envelopes.
    fn fan_out_lifecycle(&self, envelope: EventEnvelope) {
        self.publish(&owner_channel(envelope.task.owner_uuid), &envelope);
        self.publish(GLOBAL_CHANNEL, &envelope);
    }

    fn publish(&self, channel: &str, envelope: &EventEnvelope) {
        match self.bus.publish(channel, envelope) {
            Ok(()) => {}
            Err(err) => {
                warn!(
                    "event=publish module=events status=error channel={channel} task={} error={err}",
                    envelope.task.uuid
                );
            }
        }
    }
}
