//! Task use-case service.
//!
//! # Responsibility
//! - Expose create/update/delete/restore/reparent/list/detail/statistics
//!   entry points over injected store, cache and bus collaborators.
//! - Order post-commit side effects: cache invalidation strictly before
//!   event broadcast, so consumers re-querying on an event observe fresh
//!   state.
//!
//! # Invariants
//! - Validation failures return synchronously with zero side effects.
//! - Store failures leave no cache or event side effects behind.
//! - Cache and broadcast failures after a committed mutation are logged
//!   and swallowed; the mutation is still reported as successful.

use crate::cache::{list_fingerprint, CacheBackend, TaskCache};
use crate::events::{EventBus, TaskBroadcaster};
use crate::locale::LocalizedText;
use crate::model::task::{
    OwnerId, Task, TaskDetail, TaskId, TaskPriority, TaskStatus, TaskValidationError,
};
use crate::repo::task_repo::{
    Deadline, RepoError, TaskListQuery, TaskPage, TaskRepository, TaskStatistics,
};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error surfaced to the API layer.
#[derive(Debug)]
pub enum ServiceError {
    /// Locale or hierarchy invariant violation; user-correctable.
    Validation(TaskValidationError),
    /// Task or parent absent, or not owned by the caller.
    NotFound(TaskId),
    /// Store-level failure (transaction, storage, timeout).
    Store(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent task state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Request model for creating one task.
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    pub owner_uuid: OwnerId,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub priority: TaskPriority,
    pub due_at: Option<i64>,
    pub parent_uuid: Option<TaskId>,
}

impl CreateTaskRequest {
    /// Minimal request: a named task with default priority.
    pub fn new(owner_uuid: OwnerId, name: LocalizedText) -> Self {
        Self {
            owner_uuid,
            name,
            description: LocalizedText::new(),
            priority: TaskPriority::Medium,
            due_at: None,
            parent_uuid: None,
        }
    }
}

/// Request model for partially updating one task.
///
/// Parent changes go through `TaskService::reparent`.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskRequest {
    pub name: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Outer `None` leaves the due date unchanged; inner `None` clears it.
    pub due_at: Option<Option<i64>>,
}

/// Task use-case facade wiring store, cache and broadcaster.
///
/// Collaborators are injected explicitly so tests can substitute fakes;
/// there is no ambient service state.
pub struct TaskService<R: TaskRepository, C: CacheBackend, B: EventBus> {
    repo: R,
    cache: TaskCache<C>,
    broadcaster: TaskBroadcaster<B>,
}

impl<R: TaskRepository, C: CacheBackend, B: EventBus> TaskService<R, C, B> {
    pub fn new(repo: R, cache: TaskCache<C>, broadcaster: TaskBroadcaster<B>) -> Self {
        Self {
            repo,
            cache,
            broadcaster,
        }
    }

    /// Creates a task, optionally as a subtask of an existing root.
    pub fn create(
        &self,
        request: CreateTaskRequest,
        deadline: Deadline,
    ) -> Result<Task, ServiceError> {
        let mut task = Task::new(request.owner_uuid, request.name);
        task.description = request.description;
        task.priority = request.priority;
        task.due_at = request.due_at;
        task.parent_uuid = request.parent_uuid;

        self.repo.create_task(&task, deadline)?;
        let created = self.reload(task.uuid, task.owner_uuid, false)?;

        let (parent, children) = self.relations_best_effort(&created);
        self.cache
            .invalidate_for_task(&created, parent.as_ref(), &children);
        self.broadcaster.task_created(&created);
        self.signal_hierarchy(&created, parent.as_ref(), &children);

        info!(
            "event=task_create module=service status=ok task={} owner={}",
            created.uuid, created.owner_uuid
        );
        Ok(created)
    }

    /// Applies a partial update to an active task.
    ///
    /// A status transition into `Completed` broadcasts the completed
    /// event kind; every other effective change broadcasts `updated`
    /// with the advisory changed-field list. A request that changes
    /// nothing is a no-op without side effects.
    pub fn update(
        &self,
        id: TaskId,
        owner: OwnerId,
        request: UpdateTaskRequest,
        deadline: Deadline,
    ) -> Result<Task, ServiceError> {
        let current = self
            .repo
            .find_by_id_and_owner(id, owner, false)?
            .ok_or(ServiceError::NotFound(id))?;

        let (next, changed_fields) = apply_update(&current, request);
        if changed_fields.is_empty() {
            debug!("event=task_update module=service status=noop task={id}");
            return Ok(current);
        }

        self.repo.update_task(&next, deadline)?;
        let updated = self.reload(id, owner, false)?;

        let (parent, children) = self.relations_best_effort(&updated);
        self.cache
            .invalidate_for_task(&updated, parent.as_ref(), &children);

        let became_completed = current.status != TaskStatus::Completed
            && updated.status == TaskStatus::Completed;
        if became_completed {
            self.broadcaster.task_completed(&updated);
        } else {
            self.broadcaster.task_updated(&updated, &changed_fields);
        }
        self.signal_hierarchy(&updated, parent.as_ref(), &children);

        info!(
            "event=task_update module=service status=ok task={id} owner={owner} changed={}",
            changed_fields.join(",")
        );
        Ok(updated)
    }

    /// Marks an active task completed.
    pub fn complete(
        &self,
        id: TaskId,
        owner: OwnerId,
        deadline: Deadline,
    ) -> Result<Task, ServiceError> {
        self.update(
            id,
            owner,
            UpdateTaskRequest {
                status: Some(TaskStatus::Completed),
                ..UpdateTaskRequest::default()
            },
            deadline,
        )
    }

    /// Tombstones an active task. Children stay active as orphans until
    /// restored or re-parented.
    pub fn soft_delete(
        &self,
        id: TaskId,
        owner: OwnerId,
        deadline: Deadline,
    ) -> Result<Task, ServiceError> {
        self.repo
            .find_by_id_and_owner(id, owner, false)?
            .ok_or(ServiceError::NotFound(id))?;

        self.repo.soft_delete_task(id, owner, deadline)?;
        let deleted = self.reload(id, owner, true)?;

        let (parent, children) = self.relations_best_effort(&deleted);
        self.cache
            .invalidate_for_task(&deleted, parent.as_ref(), &children);
        self.broadcaster.task_deleted(&deleted);
        self.signal_hierarchy(&deleted, parent.as_ref(), &children);

        info!("event=task_delete module=service status=ok task={id} owner={owner}");
        Ok(deleted)
    }

    /// Clears a task's tombstone.
    pub fn restore(
        &self,
        id: TaskId,
        owner: OwnerId,
        deadline: Deadline,
    ) -> Result<Task, ServiceError> {
        self.repo
            .find_by_id_and_owner(id, owner, true)?
            .ok_or(ServiceError::NotFound(id))?;

        self.repo.restore_task(id, owner, deadline)?;
        let restored = self.reload(id, owner, false)?;

        let (parent, children) = self.relations_best_effort(&restored);
        self.cache
            .invalidate_for_task(&restored, parent.as_ref(), &children);
        self.broadcaster.task_restored(&restored);
        self.signal_hierarchy(&restored, parent.as_ref(), &children);

        info!("event=task_restore module=service status=ok task={id} owner={owner}");
        Ok(restored)
    }

    /// Moves a task under a new parent, or detaches it with `None`.
    ///
    /// Hierarchy invariants are re-checked by the store inside the write
    /// transaction; the previous parent's cached views are evicted too.
    pub fn reparent(
        &self,
        id: TaskId,
        owner: OwnerId,
        new_parent: Option<TaskId>,
        deadline: Deadline,
    ) -> Result<Task, ServiceError> {
        let current = self
            .repo
            .find_by_id_and_owner(id, owner, false)?
            .ok_or(ServiceError::NotFound(id))?;
        let old_parent = current
            .parent_uuid
            .and_then(|parent_uuid| self.load_best_effort(parent_uuid, owner));

        self.repo.set_parent(id, owner, new_parent, deadline)?;
        let updated = self.reload(id, owner, false)?;

        let (parent, children) = self.relations_best_effort(&updated);
        self.cache
            .invalidate_for_task(&updated, parent.as_ref(), &children);
        if let Some(old_parent) = old_parent.filter(|task| Some(task.uuid) != new_parent) {
            self.cache.invalidate_for_task(&old_parent, None, &[]);
            let remaining = self.children_best_effort(old_parent.uuid);
            self.broadcaster
                .hierarchy_parent_updated(&old_parent, &remaining);
        }

        self.broadcaster
            .task_updated(&updated, &["parent_uuid".to_string()]);
        self.signal_hierarchy(&updated, parent.as_ref(), &children);

        info!("event=task_reparent module=service status=ok task={id} owner={owner}");
        Ok(updated)
    }

    /// Lists an owner's tasks, serving from cache when the fingerprinted
    /// query has a fresh entry.
    pub fn list(
        &self,
        owner: OwnerId,
        query: &TaskListQuery,
        deadline: Deadline,
    ) -> Result<TaskPage, ServiceError> {
        let fingerprint = list_fingerprint(query);
        if let Some(page) = self.cache.get_list(owner, &fingerprint) {
            debug!("event=task_list module=service status=cache_hit owner={owner}");
            return Ok(page);
        }

        let page = self.repo.list_tasks(owner, query, deadline)?;
        self.cache.put_list(owner, &fingerprint, &page);
        Ok(page)
    }

    /// Loads one task with its parent and children relations.
    pub fn get_detail(&self, id: TaskId, owner: OwnerId) -> Result<TaskDetail, ServiceError> {
        if let Some(detail) = self.cache.get_detail(id) {
            // Ownership never changes, so a cached snapshot is
            // authoritative for the owner check.
            if detail.task.owner_uuid != owner {
                return Err(ServiceError::NotFound(id));
            }
            debug!("event=task_detail module=service status=cache_hit task={id}");
            return Ok(detail);
        }

        let task = self
            .repo
            .find_by_id_and_owner(id, owner, false)?
            .ok_or(ServiceError::NotFound(id))?;
        let parent = match task.parent_uuid {
            Some(parent_uuid) => self.repo.find_by_id_and_owner(parent_uuid, owner, false)?,
            None => None,
        };
        let children = self.repo.direct_children(id, false)?;

        let detail = TaskDetail {
            task,
            parent,
            children,
        };
        self.cache.put_detail(&detail);
        Ok(detail)
    }

    /// Aggregates an owner's active-task statistics, cache-first.
    pub fn get_statistics(&self, owner: OwnerId) -> Result<TaskStatistics, ServiceError> {
        if let Some(stats) = self.cache.get_stats(owner) {
            debug!("event=task_stats module=service status=cache_hit owner={owner}");
            return Ok(stats);
        }

        let stats = self.repo.owner_statistics(owner)?;
        self.cache.put_stats(owner, &stats);
        Ok(stats)
    }

    /// Cache backend round-trip probe.
    pub fn cache_healthy(&self) -> bool {
        self.cache.health_check()
    }

    /// Broadcaster access, mainly for test observation of the bus.
    pub fn broadcaster(&self) -> &TaskBroadcaster<B> {
        &self.broadcaster
    }

    fn reload(
        &self,
        id: TaskId,
        owner: OwnerId,
        include_deleted: bool,
    ) -> Result<Task, ServiceError> {
        self.repo
            .find_by_id_and_owner(id, owner, include_deleted)?
            .ok_or(ServiceError::InconsistentState(
                "mutated task not found in read-back",
            ))
    }

    /// Hierarchy fan-out after any committed mutation: parent viewers
    /// learn about the subtask, subtask viewers learn about the parent.
    fn signal_hierarchy(&self, task: &Task, parent: Option<&Task>, children: &[Task]) {
        if !children.is_empty() {
            self.broadcaster.hierarchy_parent_updated(task, children);
        }
        if task.parent_uuid.is_some() || parent.is_some() {
            self.broadcaster.hierarchy_child_updated(task, parent);
        }
    }

    /// Relation loads feeding post-commit side effects must not turn a
    /// committed mutation into a caller-visible failure.
    fn relations_best_effort(&self, task: &Task) -> (Option<Task>, Vec<Task>) {
        let parent = task
            .parent_uuid
            .and_then(|parent_uuid| self.load_best_effort(parent_uuid, task.owner_uuid));
        let children = self.children_best_effort(task.uuid);
        (parent, children)
    }

    fn load_best_effort(&self, id: TaskId, owner: OwnerId) -> Option<Task> {
        match self.repo.find_by_id_and_owner(id, owner, false) {
            Ok(task) => task,
            Err(err) => {
                warn!("event=relation_load module=service status=error task={id} error={err}");
                None
            }
        }
    }

    fn children_best_effort(&self, id: TaskId) -> Vec<Task> {
        match self.repo.direct_children(id, false) {
            Ok(children) => children,
            Err(err) => {
                warn!("event=relation_load module=service status=error task={id} error={err}");
                Vec::new()
            }
        }
    }
}

fn apply_update(current: &Task, request: UpdateTaskRequest) -> (Task, Vec<String>) {
    let mut next = current.clone();
    let mut changed_fields = Vec::new();

    if let Some(name) = request.name {
        if name != next.name {
            changed_fields.push("name".to_string());
        }
        next.name = name;
    }

    if let Some(description) = request.description {
        if description != next.description {
            changed_fields.push("description".to_string());
        }
        next.description = description;
    }

    if let Some(status) = request.status {
        if status != next.status {
            changed_fields.push("status".to_string());
        }
        next.status = status;
    }

    if let Some(priority) = request.priority {
        if priority != next.priority {
            changed_fields.push("priority".to_string());
        }
        next.priority = priority;
    }

    if let Some(due_at) = request.due_at {
        if due_at != next.due_at {
            changed_fields.push("due_at".to_string());
        }
        next.due_at = due_at;
    }

    (next, changed_fields)
}
