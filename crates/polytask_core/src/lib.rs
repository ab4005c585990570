//! Core domain logic for PolyTask.
//! This crate is the single source of truth for task invariants, cached
//! views and event propagation.

pub mod cache;
pub mod db;
pub mod events;
pub mod locale;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use cache::{list_fingerprint, CacheBackend, CacheError, MemoryCacheBackend, TaskCache};
pub use events::{
    owner_channel, task_channel, BusError, EventBus, EventEnvelope, EventKind, MemoryEventBus,
    TaskBroadcaster, GLOBAL_CHANNEL,
};
pub use locale::{completeness, resolve, LocaleCompleteness, LocaleConfig, LocalizedText};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{
    HierarchyViolation, OwnerId, Task, TaskDetail, TaskId, TaskPriority, TaskStatus,
    TaskValidationError,
};
pub use repo::task_repo::{
    Deadline, ParentScope, RepoError, RepoResult, SortDirection, SqliteTaskRepository,
    TaskListQuery, TaskPage, TaskRepository, TaskSortKey, TaskStatistics,
};
pub use service::task_service::{
    CreateTaskRequest, ServiceError, TaskService, UpdateTaskRequest,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
