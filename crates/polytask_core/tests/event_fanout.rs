use polytask_core::{
    owner_channel, task_channel, BusError, EventBus, EventEnvelope, EventKind, LocalizedText,
    MemoryEventBus, Task, TaskBroadcaster, GLOBAL_CHANNEL,
};
use uuid::Uuid;

fn named_task(owner: Uuid, name: &str) -> Task {
    let mut fields = LocalizedText::new();
    fields.insert("en".to_string(), name.to_string());
    Task::new(owner, fields)
}

/// Bus double that rejects every publish.
struct FailingBus;

impl EventBus for FailingBus {
    fn publish(&self, _channel: &str, _envelope: &EventEnvelope) -> Result<(), BusError> {
        Err(BusError::Publish("broker unavailable".to_string()))
    }
}

#[test]
fn lifecycle_events_fan_out_to_owner_and_global_channels() {
    let bus = MemoryEventBus::new();
    let broadcaster = TaskBroadcaster::new(&bus);
    let owner = Uuid::new_v4();
    let task = named_task(owner, "Lifecycle");

    broadcaster.task_created(&task);
    broadcaster.task_completed(&task);
    broadcaster.task_deleted(&task);
    broadcaster.task_restored(&task);

    let owner_events = bus.published(&owner_channel(owner));
    let global_events = bus.published(GLOBAL_CHANNEL);
    assert_eq!(owner_events.len(), 4);
    assert_eq!(global_events.len(), 4);
    assert_eq!(bus.total_published(), 8);

    let kinds: Vec<_> = owner_events.iter().map(|envelope| envelope.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Created,
            EventKind::Completed,
            EventKind::Deleted,
            EventKind::Restored
        ]
    );

    for envelope in owner_events.iter().chain(global_events.iter()) {
        assert_eq!(envelope.task.uuid, task.uuid);
        assert!(envelope.changed_fields.is_none());
        assert!(envelope.occurred_at > 0);
    }
}

#[test]
fn updated_event_carries_the_changed_field_hint() {
    let bus = MemoryEventBus::new();
    let broadcaster = TaskBroadcaster::new(&bus);
    let owner = Uuid::new_v4();
    let task = named_task(owner, "Edited");

    broadcaster.task_updated(&task, &["status".to_string(), "due_at".to_string()]);

    let events = bus.published(&owner_channel(owner));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Updated);
    assert_eq!(
        events[0].changed_fields.as_deref(),
        Some(&["status".to_string(), "due_at".to_string()][..])
    );
    assert_eq!(bus.published(GLOBAL_CHANNEL).len(), 1);
}

#[test]
fn parent_update_emits_one_envelope_per_child() {
    let bus = MemoryEventBus::new();
    let broadcaster = TaskBroadcaster::new(&bus);
    let owner = Uuid::new_v4();

    let mut parent = named_task(owner, "Parent");
    parent.status = polytask_core::TaskStatus::InProgress;
    let children: Vec<Task> = (0..3)
        .map(|index| {
            let mut child = named_task(owner, &format!("Child {index}"));
            child.parent_uuid = Some(parent.uuid);
            child
        })
        .collect();

    broadcaster.hierarchy_parent_updated(&parent, &children);

    assert_eq!(bus.total_published(), 3);
    for child in &children {
        let events = bus.published(&task_channel(child.uuid));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::ParentUpdated);
        assert_eq!(events[0].task.uuid, parent.uuid);
        assert_eq!(events[0].task.status, polytask_core::TaskStatus::InProgress);
    }
}

#[test]
fn parent_update_with_no_children_publishes_nothing() {
    let bus = MemoryEventBus::new();
    let broadcaster = TaskBroadcaster::new(&bus);

    let parent = named_task(Uuid::new_v4(), "Childless");
    broadcaster.hierarchy_parent_updated(&parent, &[]);

    assert_eq!(bus.total_published(), 0);
}

#[test]
fn subtask_update_reaches_the_parent_owner_channel_with_both_snapshots() {
    let bus = MemoryEventBus::new();
    let broadcaster = TaskBroadcaster::new(&bus);
    let owner = Uuid::new_v4();

    let parent = named_task(owner, "Parent");
    let mut subtask = named_task(owner, "Sub");
    subtask.parent_uuid = Some(parent.uuid);

    broadcaster.hierarchy_child_updated(&subtask, Some(&parent));

    let events = bus.published(&owner_channel(owner));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::SubtaskUpdated);
    assert_eq!(events[0].task.uuid, subtask.uuid);
    assert_eq!(
        events[0].parent.as_ref().map(|parent| parent.uuid),
        Some(parent.uuid)
    );
    assert_eq!(bus.total_published(), 1);
}

#[test]
fn subtask_update_for_a_root_task_publishes_nothing() {
    let bus = MemoryEventBus::new();
    let broadcaster = TaskBroadcaster::new(&bus);

    let root = named_task(Uuid::new_v4(), "Root");
    broadcaster.hierarchy_child_updated(&root, None);

    assert_eq!(bus.total_published(), 0);
}

#[test]
fn orphaned_subtask_update_publishes_nothing() {
    let bus = MemoryEventBus::new();
    let broadcaster = TaskBroadcaster::new(&bus);

    let mut orphan = named_task(Uuid::new_v4(), "Orphan");
    orphan.parent_uuid = Some(Uuid::new_v4());
    broadcaster.hierarchy_child_updated(&orphan, None);

    assert_eq!(bus.total_published(), 0);
}

#[test]
fn publish_failures_are_swallowed() {
    let broadcaster = TaskBroadcaster::new(FailingBus);
    let task = named_task(Uuid::new_v4(), "Unreachable");

    // None of these may panic or surface an error.
    broadcaster.task_created(&task);
    broadcaster.task_updated(&task, &["status".to_string()]);
    broadcaster.hierarchy_parent_updated(&task, std::slice::from_ref(&task));
    broadcaster.hierarchy_child_updated(&task, Some(&task));
}

#[test]
fn envelopes_serialize_with_snake_case_kinds() {
    let task = named_task(Uuid::new_v4(), "Wire format");
    let envelope = EventEnvelope::new(EventKind::ParentUpdated, task);

    let encoded = serde_json::to_string(&envelope).unwrap();
    assert!(encoded.contains("\"parent_updated\""));

    let decoded: EventEnvelope = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, envelope);
}
