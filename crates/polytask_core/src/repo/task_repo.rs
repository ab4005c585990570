//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD, listing and hierarchy APIs over `tasks` storage.
//! - Enforce hierarchy invariants transactionally on parent-link writes.
//! - Keep SQL details and ordering behavior inside the repository boundary.
//!
//! # Invariants
//! - Hierarchy depth is capped at one level below a root task; the cap is
//!   enforced here for every parent-link change.
//! - The circular-reference check is an independent bounded walk over the
//!   task's direct children. With the cap holding, one level is the entire
//!   descendant set, and the check still catches cross-linking bugs the
//!   cap alone would miss. A parent that is a descendant reports the
//!   cycle, not the depth cap.
//! - Listing order is deterministic: chosen sort key, then `uuid ASC`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::locale::{LocaleConfig, LocalizedText};
use crate::model::task::{
    now_epoch_ms, HierarchyViolation, OwnerId, Task, TaskId, TaskPriority, TaskStatus,
    TaskValidationError,
};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, Row, Transaction, TransactionBehavior,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    owner_uuid,
    name,
    description,
    status,
    priority,
    due_at,
    parent_uuid,
    is_deleted,
    created_at,
    updated_at
FROM tasks";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Localized-field or hierarchy invariant violation.
    Validation(TaskValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Task or parent absent, soft-deleted where active was required, or
    /// not owned by the caller.
    NotFound(TaskId),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Caller-supplied deadline expired or the database stayed busy past
    /// its timeout.
    Timeout,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
            Self::Timeout => write!(f, "task store operation exceeded its deadline"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "task repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "task repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "task repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<HierarchyViolation> for RepoError {
    fn from(value: HierarchyViolation) -> Self {
        Self::Validation(TaskValidationError::Hierarchy(value))
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(err, _) = &value {
            if matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return Self::Timeout;
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Caller-supplied completion bound for store operations.
///
/// Checked at operation entry and again before commit; an expired
/// deadline fails with `RepoError::Timeout` without touching storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No bound; the operation runs to completion.
    pub const fn none() -> Self {
        Self(None)
    }

    /// Absolute completion bound.
    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// Bound relative to now.
    pub fn within(budget: Duration) -> Self {
        Self(Some(Instant::now() + budget))
    }

    pub fn expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    fn check(&self) -> RepoResult<()> {
        if self.expired() {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

/// Parent filter for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentScope {
    /// Roots and subtasks alike.
    #[default]
    Any,
    /// Root tasks only.
    RootsOnly,
    /// Direct children of one task.
    ChildrenOf(TaskId),
}

/// Sort key for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueAt,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// Filter, sort and pagination options for task listings.
///
/// The canonicalized form of this struct is what the cache layer
/// fingerprints; every field participates.
#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub parent: ParentScope,
    /// Inclusive lower bound on `due_at`, epoch ms.
    pub due_from: Option<i64>,
    /// Inclusive upper bound on `due_at`, epoch ms.
    pub due_until: Option<i64>,
    /// Needle matched case-insensitively across all name and description
    /// locale values.
    pub search: Option<String>,
    pub include_deleted: bool,
    pub sort_key: TaskSortKey,
    pub sort_direction: SortDirection,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// One page of task snapshots plus the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPage {
    pub items: Vec<Task>,
    pub total: u64,
}

/// Per-owner aggregate over active tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub priority_low: u64,
    pub priority_medium: u64,
    pub priority_high: u64,
    pub priority_urgent: u64,
    /// Due in the past and not in a terminal status.
    pub overdue: u64,
    pub root_tasks: u64,
    pub subtasks: u64,
    pub completion_percent: f64,
}

/// Repository interface for task store operations.
pub trait TaskRepository {
    /// Persists a new task. Parent-link invariants are checked inside the
    /// insert transaction when the task references a parent.
    fn create_task(&self, task: &Task, deadline: Deadline) -> RepoResult<TaskId>;

    /// Updates name, description, status, priority and due date of an
    /// active task. Parent changes go through `set_parent`.
    fn update_task(&self, task: &Task, deadline: Deadline) -> RepoResult<()>;

    /// Tombstones a task. Idempotent for already-deleted rows.
    fn soft_delete_task(&self, id: TaskId, owner: OwnerId, deadline: Deadline) -> RepoResult<()>;

    /// Clears a task's tombstone.
    fn restore_task(&self, id: TaskId, owner: OwnerId, deadline: Deadline) -> RepoResult<()>;

    /// Re-parents a task (or detaches it with `None`), re-checking every
    /// hierarchy invariant inside the write transaction.
    fn set_parent(
        &self,
        id: TaskId,
        owner: OwnerId,
        parent: Option<TaskId>,
        deadline: Deadline,
    ) -> RepoResult<()>;

    /// Loads one task scoped to its owner.
    fn find_by_id_and_owner(
        &self,
        id: TaskId,
        owner: OwnerId,
        include_deleted: bool,
    ) -> RepoResult<Option<Task>>;

    /// Lists an owner's tasks with filters, sorting and pagination.
    fn list_tasks(
        &self,
        owner: OwnerId,
        query: &TaskListQuery,
        deadline: Deadline,
    ) -> RepoResult<TaskPage>;

    /// Lists direct children of one task, ordered by creation time.
    fn direct_children(&self, id: TaskId, include_deleted: bool) -> RepoResult<Vec<Task>>;

    /// Aggregates statistics over an owner's active tasks.
    fn owner_statistics(&self, owner: OwnerId) -> RepoResult<TaskStatistics>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
    locales: LocaleConfig,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection, locales: LocaleConfig) -> RepoResult<Self> {
        ensure_task_connection_ready(conn)?;
        Ok(Self { conn, locales })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task, deadline: Deadline) -> RepoResult<TaskId> {
        task.validate(&self.locales)?;
        deadline.check()?;

        if let Some(parent_uuid) = task.parent_uuid {
            let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
            validate_parent_link(&tx, task.uuid, task.owner_uuid, parent_uuid)?;
            deadline.check()?;
            insert_task(&tx, task)?;
            tx.commit()?;
        } else {
            insert_task(self.conn, task)?;
        }

        Ok(task.uuid)
    }

    fn update_task(&self, task: &Task, deadline: Deadline) -> RepoResult<()> {
        task.validate(&self.locales)?;
        deadline.check()?;

        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                name = ?1,
                description = ?2,
                status = ?3,
                priority = ?4,
                due_at = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?6
               AND owner_uuid = ?7
               AND is_deleted = 0;",
            params![
                encode_localized(&task.name)?,
                encode_localized(&task.description)?,
                status_to_db(task.status),
                priority_to_db(task.priority),
                task.due_at,
                task.uuid.to_string(),
                task.owner_uuid.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(task.uuid));
        }
        Ok(())
    }

    fn soft_delete_task(&self, id: TaskId, owner: OwnerId, deadline: Deadline) -> RepoResult<()> {
        deadline.check()?;
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                is_deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND owner_uuid = ?2;",
            params![id.to_string(), owner.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn restore_task(&self, id: TaskId, owner: OwnerId, deadline: Deadline) -> RepoResult<()> {
        deadline.check()?;
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                is_deleted = 0,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND owner_uuid = ?2;",
            params![id.to_string(), owner.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn set_parent(
        &self,
        id: TaskId,
        owner: OwnerId,
        parent: Option<TaskId>,
        deadline: Deadline,
    ) -> RepoResult<()> {
        deadline.check()?;

        // The task row and the prospective parent row are both re-read
        // inside one immediate transaction, which serializes two
        // concurrent re-parent requests touching the same rows.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let task = load_task_scoped(&tx, id, owner, false)?.ok_or(RepoError::NotFound(id))?;
        if let Some(parent_uuid) = parent {
            validate_parent_link(&tx, task.uuid, task.owner_uuid, parent_uuid)?;
        }
        deadline.check()?;

        tx.execute(
            "UPDATE tasks
             SET
                parent_uuid = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2
               AND owner_uuid = ?3
               AND is_deleted = 0;",
            params![
                parent.map(|value| value.to_string()),
                id.to_string(),
                owner.to_string(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn find_by_id_and_owner(
        &self,
        id: TaskId,
        owner: OwnerId,
        include_deleted: bool,
    ) -> RepoResult<Option<Task>> {
        load_task_scoped(self.conn, id, owner, include_deleted)
    }

    fn list_tasks(
        &self,
        owner: OwnerId,
        query: &TaskListQuery,
        deadline: Deadline,
    ) -> RepoResult<TaskPage> {
        deadline.check()?;

        let (where_sql, bind_values) = build_list_filter(owner, query);

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM tasks WHERE {where_sql};"),
            params_from_iter(bind_values.clone()),
            |row| row.get(0),
        )?;

        let mut sql = format!(
            "{TASK_SELECT_SQL} WHERE {where_sql} ORDER BY {} {}, uuid ASC",
            sort_expression(query.sort_key),
            direction_sql(query.sort_direction),
        );
        let mut page_values = bind_values;
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            page_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                page_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            page_values.push(Value::Integer(i64::from(query.offset)));
        }
        sql.push(';');

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(page_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_task_row(row)?);
        }

        Ok(TaskPage {
            items,
            total: total.max(0) as u64,
        })
    }

    fn direct_children(&self, id: TaskId, include_deleted: bool) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE parent_uuid = ?1
               AND (?2 = 1 OR is_deleted = 0)
             ORDER BY created_at ASC, uuid ASC;"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        let mut children = Vec::new();
        while let Some(row) = rows.next()? {
            children.push(parse_task_row(row)?);
        }
        Ok(children)
    }

    fn owner_statistics(&self, owner: OwnerId) -> RepoResult<TaskStatistics> {
        let now = now_epoch_ms();
        let row = self.conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(status = 'pending'), 0),
                COALESCE(SUM(status = 'in_progress'), 0),
                COALESCE(SUM(status = 'completed'), 0),
                COALESCE(SUM(status = 'cancelled'), 0),
                COALESCE(SUM(priority = 'low'), 0),
                COALESCE(SUM(priority = 'medium'), 0),
                COALESCE(SUM(priority = 'high'), 0),
                COALESCE(SUM(priority = 'urgent'), 0),
                COALESCE(SUM(
                    due_at IS NOT NULL
                    AND due_at < ?2
                    AND status NOT IN ('completed', 'cancelled')
                ), 0),
                COALESCE(SUM(parent_uuid IS NULL), 0),
                COALESCE(SUM(parent_uuid IS NOT NULL), 0)
             FROM tasks
             WHERE owner_uuid = ?1
               AND is_deleted = 0;",
            params![owner.to_string(), now],
            |row| {
                Ok([
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, i64>(10)?,
                    row.get::<_, i64>(11)?,
                ])
            },
        )?;

        let as_count = |value: i64| value.max(0) as u64;
        let total = as_count(row[0]);
        let completed = as_count(row[3]);
        let completion_percent = if total == 0 {
            0.0
        } else {
            completed as f64 * 100.0 / total as f64
        };

        Ok(TaskStatistics {
            total,
            pending: as_count(row[1]),
            in_progress: as_count(row[2]),
            completed,
            cancelled: as_count(row[4]),
            priority_low: as_count(row[5]),
            priority_medium: as_count(row[6]),
            priority_high: as_count(row[7]),
            priority_urgent: as_count(row[8]),
            overdue: as_count(row[9]),
            root_tasks: as_count(row[10]),
            subtasks: as_count(row[11]),
            completion_percent,
        })
    }
}

/// Checks every parent-link invariant against current persisted state.
///
/// Rejection precedence: self-parent, parent missing, circular reference,
/// depth cap, cross-owner. The circular check runs before the depth check
/// so a parent that is a descendant of the task reports the cycle rather
/// than the depth cap it also violates.
fn validate_parent_link(
    conn: &Connection,
    task_uuid: TaskId,
    owner_uuid: OwnerId,
    parent_uuid: TaskId,
) -> RepoResult<()> {
    if parent_uuid == task_uuid {
        return Err(HierarchyViolation::SelfParent(task_uuid).into());
    }

    let parent = load_task_any_owner(conn, parent_uuid, false)?
        .ok_or(RepoError::NotFound(parent_uuid))?;

    if is_direct_child(conn, task_uuid, parent_uuid)? {
        return Err(HierarchyViolation::CircularReference {
            task_uuid,
            parent_uuid,
        }
        .into());
    }

    if parent.parent_uuid.is_some() || has_active_children(conn, task_uuid)? {
        return Err(HierarchyViolation::DepthExceeded { parent_uuid }.into());
    }

    if parent.owner_uuid != owner_uuid {
        return Err(HierarchyViolation::CrossOwner {
            owner_uuid,
            parent_owner_uuid: parent.owner_uuid,
        }
        .into());
    }

    Ok(())
}

fn is_direct_child(conn: &Connection, task_uuid: TaskId, candidate: TaskId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM tasks
            WHERE parent_uuid = ?1
              AND uuid = ?2
              AND is_deleted = 0
        );",
        params![task_uuid.to_string(), candidate.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn has_active_children(conn: &Connection, task_uuid: TaskId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM tasks
            WHERE parent_uuid = ?1
              AND is_deleted = 0
        );",
        [task_uuid.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn insert_task(conn: &Connection, task: &Task) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO tasks (
            uuid,
            owner_uuid,
            name,
            description,
            status,
            priority,
            due_at,
            parent_uuid,
            is_deleted,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
        params![
            task.uuid.to_string(),
            task.owner_uuid.to_string(),
            encode_localized(&task.name)?,
            encode_localized(&task.description)?,
            status_to_db(task.status),
            priority_to_db(task.priority),
            task.due_at,
            task.parent_uuid.map(|value| value.to_string()),
            bool_to_int(task.is_deleted),
            task.created_at,
            task.updated_at,
        ],
    )?;
    Ok(())
}

fn load_task_scoped(
    conn: &Connection,
    id: TaskId,
    owner: OwnerId,
    include_deleted: bool,
) -> RepoResult<Option<Task>> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL}
         WHERE uuid = ?1
           AND owner_uuid = ?2
           AND (?3 = 1 OR is_deleted = 0);"
    ))?;

    let mut rows = stmt.query(params![
        id.to_string(),
        owner.to_string(),
        bool_to_int(include_deleted),
    ])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_task_row(row)?));
    }
    Ok(None)
}

fn load_task_any_owner(
    conn: &Connection,
    id: TaskId,
    include_deleted: bool,
) -> RepoResult<Option<Task>> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL}
         WHERE uuid = ?1
           AND (?2 = 1 OR is_deleted = 0);"
    ))?;

    let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_task_row(row)?));
    }
    Ok(None)
}

fn build_list_filter(owner: OwnerId, query: &TaskListQuery) -> (String, Vec<Value>) {
    let mut sql = String::from("owner_uuid = ?");
    let mut bind_values = vec![Value::Text(owner.to_string())];

    if !query.include_deleted {
        sql.push_str(" AND is_deleted = 0");
    }

    if let Some(status) = query.status {
        sql.push_str(" AND status = ?");
        bind_values.push(Value::Text(status_to_db(status).to_string()));
    }

    if let Some(priority) = query.priority {
        sql.push_str(" AND priority = ?");
        bind_values.push(Value::Text(priority_to_db(priority).to_string()));
    }

    match query.parent {
        ParentScope::Any => {}
        ParentScope::RootsOnly => sql.push_str(" AND parent_uuid IS NULL"),
        ParentScope::ChildrenOf(parent_uuid) => {
            sql.push_str(" AND parent_uuid = ?");
            bind_values.push(Value::Text(parent_uuid.to_string()));
        }
    }

    if let Some(due_from) = query.due_from {
        sql.push_str(" AND due_at >= ?");
        bind_values.push(Value::Integer(due_from));
    }

    if let Some(due_until) = query.due_until {
        sql.push_str(" AND due_at <= ?");
        bind_values.push(Value::Integer(due_until));
    }

    if let Some(search) = query.search.as_deref().map(str::trim) {
        if !search.is_empty() {
            let needle = format!("%{}%", escape_like(search));
            sql.push_str(
                " AND (EXISTS (SELECT 1 FROM json_each(tasks.name) \
                 WHERE json_each.value LIKE ? ESCAPE '\\') \
                 OR EXISTS (SELECT 1 FROM json_each(tasks.description) \
                 WHERE json_each.value LIKE ? ESCAPE '\\'))",
            );
            bind_values.push(Value::Text(needle.clone()));
            bind_values.push(Value::Text(needle));
        }
    }

    (sql, bind_values)
}

fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn sort_expression(key: TaskSortKey) -> &'static str {
    match key {
        TaskSortKey::CreatedAt => "created_at",
        TaskSortKey::UpdatedAt => "updated_at",
        TaskSortKey::DueAt => "due_at",
        TaskSortKey::Priority => {
            "CASE priority
                WHEN 'low' THEN 0
                WHEN 'medium' THEN 1
                WHEN 'high' THEN 2
                ELSE 3
            END"
        }
    }
}

fn direction_sql(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = parse_uuid(&uuid_text, "tasks.uuid")?;

    let owner_text: String = row.get("owner_uuid")?;
    let owner_uuid = parse_uuid(&owner_text, "tasks.owner_uuid")?;

    let parent_uuid = row
        .get::<_, Option<String>>("parent_uuid")?
        .map(|value| parse_uuid(&value, "tasks.parent_uuid"))
        .transpose()?;

    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in tasks.status"))
    })?;

    let priority_text: String = row.get("priority")?;
    let priority = parse_priority(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in tasks.priority"
        ))
    })?;

    let name_text: String = row.get("name")?;
    let description_text: String = row.get("description")?;

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_deleted value `{other}` in tasks.is_deleted"
            )));
        }
    };

    Ok(Task {
        uuid,
        owner_uuid,
        name: decode_localized(&name_text, "tasks.name")?,
        description: decode_localized(&description_text, "tasks.description")?,
        status,
        priority,
        due_at: row.get("due_at")?,
        parent_uuid,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        is_deleted,
    })
}

fn encode_localized(fields: &LocalizedText) -> RepoResult<String> {
    serde_json::to_string(fields)
        .map_err(|err| RepoError::InvalidData(format!("unencodable locale map: {err}")))
}

fn decode_localized(value: &str, column: &'static str) -> RepoResult<LocalizedText> {
    serde_json::from_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid locale map in {column}")))
}

fn status_to_db(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Completed => "completed",
        TaskStatus::Cancelled => "cancelled",
    }
}

fn parse_status(value: &str) -> Option<TaskStatus> {
    match value {
        "pending" => Some(TaskStatus::Pending),
        "in_progress" => Some(TaskStatus::InProgress),
        "completed" => Some(TaskStatus::Completed),
        "cancelled" => Some(TaskStatus::Cancelled),
        _ => None,
    }
}

fn priority_to_db(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "low",
        TaskPriority::Medium => "medium",
        TaskPriority::High => "high",
        TaskPriority::Urgent => "urgent",
    }
}

fn parse_priority(value: &str) -> Option<TaskPriority> {
    match value {
        "low" => Some(TaskPriority::Low),
        "medium" => Some(TaskPriority::Medium),
        "high" => Some(TaskPriority::High),
        "urgent" => Some(TaskPriority::Urgent),
        _ => None,
    }
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_task_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "tasks")? {
        return Err(RepoError::MissingRequiredTable("tasks"));
    }

    for column in [
        "uuid",
        "owner_uuid",
        "name",
        "description",
        "status",
        "priority",
        "due_at",
        "parent_uuid",
        "is_deleted",
        "created_at",
        "updated_at",
    ] {
        if !table_has_column(conn, "tasks", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "tasks",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
