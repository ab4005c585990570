use polytask_core::db::open_db_in_memory;
use polytask_core::{
    Deadline, HierarchyViolation, LocaleConfig, LocalizedText, RepoError, SqliteTaskRepository,
    Task, TaskRepository, TaskValidationError,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn repo(conn: &Connection) -> SqliteTaskRepository<'_> {
    SqliteTaskRepository::try_new(conn, LocaleConfig::default()).unwrap()
}

fn named_task(owner: Uuid, name: &str) -> Task {
    let mut fields = LocalizedText::new();
    fields.insert("en".to_string(), name.to_string());
    Task::new(owner, fields)
}

fn hierarchy_error(err: RepoError) -> HierarchyViolation {
    match err {
        RepoError::Validation(TaskValidationError::Hierarchy(violation)) => violation,
        other => panic!("expected hierarchy violation, got: {other}"),
    }
}

#[test]
fn subtask_creation_links_parent_and_child() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();

    let root = named_task(owner, "A");
    repo.create_task(&root, Deadline::none()).unwrap();

    let mut subtask = named_task(owner, "B");
    subtask.parent_uuid = Some(root.uuid);
    repo.create_task(&subtask, Deadline::none()).unwrap();

    let loaded = repo
        .find_by_id_and_owner(subtask.uuid, owner, false)
        .unwrap()
        .unwrap();
    assert_eq!(loaded.parent_uuid, Some(root.uuid));

    let children = repo.direct_children(root.uuid, false).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].uuid, subtask.uuid);
}

#[test]
fn creating_under_a_subtask_exceeds_the_depth_cap() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();

    let root = named_task(owner, "A");
    repo.create_task(&root, Deadline::none()).unwrap();
    let mut subtask = named_task(owner, "B");
    subtask.parent_uuid = Some(root.uuid);
    repo.create_task(&subtask, Deadline::none()).unwrap();

    let mut grandchild = named_task(owner, "C");
    grandchild.parent_uuid = Some(subtask.uuid);
    let err = repo.create_task(&grandchild, Deadline::none()).unwrap_err();
    assert!(matches!(
        hierarchy_error(err),
        HierarchyViolation::DepthExceeded { parent_uuid } if parent_uuid == subtask.uuid
    ));

    assert!(repo
        .find_by_id_and_owner(grandchild.uuid, owner, true)
        .unwrap()
        .is_none());
}

#[test]
fn self_parenting_is_rejected() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();

    let task = named_task(owner, "B");
    repo.create_task(&task, Deadline::none()).unwrap();

    let err = repo
        .set_parent(task.uuid, owner, Some(task.uuid), Deadline::none())
        .unwrap_err();
    assert!(matches!(
        hierarchy_error(err),
        HierarchyViolation::SelfParent(id) if id == task.uuid
    ));
}

#[test]
fn reparenting_under_a_descendant_reports_the_cycle() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();

    let root = named_task(owner, "A");
    repo.create_task(&root, Deadline::none()).unwrap();
    let mut subtask = named_task(owner, "B");
    subtask.parent_uuid = Some(root.uuid);
    repo.create_task(&subtask, Deadline::none()).unwrap();

    let err = repo
        .set_parent(root.uuid, owner, Some(subtask.uuid), Deadline::none())
        .unwrap_err();
    assert!(matches!(
        hierarchy_error(err),
        HierarchyViolation::CircularReference { task_uuid, parent_uuid }
            if task_uuid == root.uuid && parent_uuid == subtask.uuid
    ));

    // The hierarchy is untouched after the rejected write.
    let loaded_root = repo
        .find_by_id_and_owner(root.uuid, owner, false)
        .unwrap()
        .unwrap();
    assert_eq!(loaded_root.parent_uuid, None);
}

#[test]
fn cross_owner_parenting_is_rejected() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();
    let other_owner = Uuid::new_v4();

    let theirs = named_task(other_owner, "Theirs");
    repo.create_task(&theirs, Deadline::none()).unwrap();
    let mine = named_task(owner, "Mine");
    repo.create_task(&mine, Deadline::none()).unwrap();

    let err = repo
        .set_parent(mine.uuid, owner, Some(theirs.uuid), Deadline::none())
        .unwrap_err();
    assert!(matches!(
        hierarchy_error(err),
        HierarchyViolation::CrossOwner { owner_uuid, parent_owner_uuid }
            if owner_uuid == owner && parent_owner_uuid == other_owner
    ));
}

#[test]
fn attaching_a_task_with_children_exceeds_the_depth_cap() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();

    let parent = named_task(owner, "Parent");
    repo.create_task(&parent, Deadline::none()).unwrap();
    let mut child = named_task(owner, "Child");
    child.parent_uuid = Some(parent.uuid);
    repo.create_task(&child, Deadline::none()).unwrap();

    let other_root = named_task(owner, "Other root");
    repo.create_task(&other_root, Deadline::none()).unwrap();

    // `parent` has a child; giving it a parent would make that child a
    // grandchild.
    let err = repo
        .set_parent(parent.uuid, owner, Some(other_root.uuid), Deadline::none())
        .unwrap_err();
    assert!(matches!(
        hierarchy_error(err),
        HierarchyViolation::DepthExceeded { parent_uuid } if parent_uuid == other_root.uuid
    ));
}

#[test]
fn reparenting_to_a_missing_parent_returns_not_found() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();

    let task = named_task(owner, "Floating");
    repo.create_task(&task, Deadline::none()).unwrap();

    let ghost = Uuid::new_v4();
    let err = repo
        .set_parent(task.uuid, owner, Some(ghost), Deadline::none())
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == ghost));
}

#[test]
fn reparenting_to_a_soft_deleted_parent_returns_not_found() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();

    let parent = named_task(owner, "Was here");
    repo.create_task(&parent, Deadline::none()).unwrap();
    repo.soft_delete_task(parent.uuid, owner, Deadline::none())
        .unwrap();

    let task = named_task(owner, "Orphan to be");
    repo.create_task(&task, Deadline::none()).unwrap();

    let err = repo
        .set_parent(task.uuid, owner, Some(parent.uuid), Deadline::none())
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == parent.uuid));
}

#[test]
fn detaching_a_subtask_makes_it_a_root() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();

    let root = named_task(owner, "Root");
    repo.create_task(&root, Deadline::none()).unwrap();
    let mut subtask = named_task(owner, "Sub");
    subtask.parent_uuid = Some(root.uuid);
    repo.create_task(&subtask, Deadline::none()).unwrap();

    repo.set_parent(subtask.uuid, owner, None, Deadline::none())
        .unwrap();

    let detached = repo
        .find_by_id_and_owner(subtask.uuid, owner, false)
        .unwrap()
        .unwrap();
    assert!(detached.is_root());
    assert!(repo.direct_children(root.uuid, false).unwrap().is_empty());
}

#[test]
fn moving_between_roots_keeps_depth_valid_for_all_tasks() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();

    let first = named_task(owner, "First");
    let second = named_task(owner, "Second");
    repo.create_task(&first, Deadline::none()).unwrap();
    repo.create_task(&second, Deadline::none()).unwrap();
    let mut subtask = named_task(owner, "Mover");
    subtask.parent_uuid = Some(first.uuid);
    repo.create_task(&subtask, Deadline::none()).unwrap();

    repo.set_parent(subtask.uuid, owner, Some(second.uuid), Deadline::none())
        .unwrap();

    // Every task with a parent has a root parent.
    let mut stmt = conn
        .prepare(
            "SELECT COUNT(*)
             FROM tasks child
             INNER JOIN tasks parent ON parent.uuid = child.parent_uuid
             WHERE parent.parent_uuid IS NOT NULL;",
        )
        .unwrap();
    let grandchildren: i64 = stmt.query_row([], |row| row.get(0)).unwrap();
    assert_eq!(grandchildren, 0);

    let children = repo.direct_children(second.uuid, false).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].uuid, subtask.uuid);
}

#[test]
fn direct_children_are_ordered_by_creation() {
    let conn = setup();
    let repo = repo(&conn);
    let owner = Uuid::new_v4();

    let root = named_task(owner, "Root");
    repo.create_task(&root, Deadline::none()).unwrap();

    let mut first = named_task(owner, "First");
    first.uuid = Uuid::parse_str("00000000-0000-4000-8000-000000000001").unwrap();
    first.parent_uuid = Some(root.uuid);
    let mut second = named_task(owner, "Second");
    second.uuid = Uuid::parse_str("00000000-0000-4000-8000-000000000002").unwrap();
    second.parent_uuid = Some(root.uuid);
    repo.create_task(&second, Deadline::none()).unwrap();
    repo.create_task(&first, Deadline::none()).unwrap();

    conn.execute("UPDATE tasks SET created_at = 1234567890000;", [])
        .unwrap();

    let children = repo.direct_children(root.uuid, false).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].uuid, first.uuid);
    assert_eq!(children[1].uuid, second.uuid);
}
