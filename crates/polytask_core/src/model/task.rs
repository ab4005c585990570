//! Canonical task record and validation taxonomy.
//!
//! # Responsibility
//! - Define the multilingual, hierarchical task record.
//! - Provide lifecycle helpers for soft-delete semantics.
//! - Validate localized fields and surface hierarchy violations.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another task.
//! - `is_deleted` is the source of truth for tombstone state.
//! - `name` must carry a non-empty entry for the default locale.
//! - A task referencing a parent shares the parent's `owner_uuid`.

use crate::locale::{LocaleConfig, LocalizedText};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier for a task.
pub type TaskId = Uuid;

/// Stable identifier for the user owning a task.
pub type OwnerId = Uuid;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not started.
    Pending,
    /// Work is in progress.
    InProgress,
    /// Completed successfully.
    Completed,
    /// No longer actionable.
    Cancelled,
}

impl TaskStatus {
    /// Returns whether this status terminates the task lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Task urgency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Hierarchy rejection cases checked on every parent-link change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyViolation {
    /// Task and candidate parent are the same row.
    SelfParent(TaskId),
    /// Attaching under this parent would exceed the one-level depth cap,
    /// either because the parent is itself a subtask or because the task
    /// being attached has children of its own.
    DepthExceeded { parent_uuid: TaskId },
    /// Candidate parent is a descendant of the task being re-parented.
    CircularReference {
        task_uuid: TaskId,
        parent_uuid: TaskId,
    },
    /// Candidate parent belongs to a different owner.
    CrossOwner {
        owner_uuid: OwnerId,
        parent_owner_uuid: OwnerId,
    },
}

impl Display for HierarchyViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfParent(id) => write!(f, "task cannot be its own parent: {id}"),
            Self::DepthExceeded { parent_uuid } => write!(
                f,
                "attaching under parent {parent_uuid} would exceed the one-level hierarchy depth"
            ),
            Self::CircularReference {
                task_uuid,
                parent_uuid,
            } => write!(
                f,
                "parent {parent_uuid} is a descendant of task {task_uuid}"
            ),
            Self::CrossOwner {
                owner_uuid,
                parent_owner_uuid,
            } => write!(
                f,
                "task owner {owner_uuid} does not match parent owner {parent_owner_uuid}"
            ),
        }
    }
}

/// Validation error raised before any task write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// `name` lacks a non-empty entry for the configured default locale.
    MissingDefaultLocaleName { default_locale: String },
    /// A provided `name` entry is blank after trim.
    EmptyLocalizedName { locale: String },
    /// A locale key is not in the configured supported set.
    UnsupportedLocale { locale: String },
    /// Parent-link invariant violation.
    Hierarchy(HierarchyViolation),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDefaultLocaleName { default_locale } => write!(
                f,
                "task name must contain a non-empty `{default_locale}` entry"
            ),
            Self::EmptyLocalizedName { locale } => {
                write!(f, "task name for locale `{locale}` must not be blank")
            }
            Self::UnsupportedLocale { locale } => {
                write!(f, "locale `{locale}` is not in the supported set")
            }
            Self::Hierarchy(violation) => write!(f, "{violation}"),
        }
    }
}

impl Error for TaskValidationError {}

impl From<HierarchyViolation> for TaskValidationError {
    fn from(value: HierarchyViolation) -> Self {
        Self::Hierarchy(value)
    }
}

/// Canonical domain record for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable global ID used for linking, caching and event payloads.
    pub uuid: TaskId,
    /// Owner with exclusive control over this task.
    pub owner_uuid: OwnerId,
    /// Localized task name. Must resolve in the default locale.
    pub name: LocalizedText,
    /// Localized description. May be entirely absent.
    pub description: LocalizedText,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Optional due timestamp in epoch milliseconds.
    pub due_at: Option<i64>,
    /// Parent task. `None` means root task.
    pub parent_uuid: Option<TaskId>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
    /// Soft delete tombstone; restore clears it.
    pub is_deleted: bool,
}

impl Task {
    /// Creates a new pending task with a generated stable ID.
    pub fn new(owner_uuid: OwnerId, name: LocalizedText) -> Self {
        let now = now_epoch_ms();
        Self {
            uuid: Uuid::new_v4(),
            owner_uuid,
            name,
            description: LocalizedText::new(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            due_at: None,
            parent_uuid: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }

    /// Validates localized fields against the configured locale set.
    ///
    /// Hierarchy invariants need persisted state and are enforced by the
    /// repository inside the write transaction.
    pub fn validate(&self, locales: &LocaleConfig) -> Result<(), TaskValidationError> {
        for locale in self.name.keys().chain(self.description.keys()) {
            if !locales.is_supported(locale) {
                return Err(TaskValidationError::UnsupportedLocale {
                    locale: locale.clone(),
                });
            }
        }

        for (locale, value) in &self.name {
            if value.trim().is_empty() {
                return Err(TaskValidationError::EmptyLocalizedName {
                    locale: locale.clone(),
                });
            }
        }

        match self.name.get(locales.default_locale()) {
            Some(value) if !value.trim().is_empty() => Ok(()),
            _ => Err(TaskValidationError::MissingDefaultLocaleName {
                default_locale: locales.default_locale().to_string(),
            }),
        }
    }

    /// Marks this task as softly deleted (tombstoned).
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }

    /// Clears the soft delete flag.
    pub fn restore(&mut self) {
        self.is_deleted = false;
    }

    /// Returns whether this task should be considered visible/active.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Returns whether this task sits at the root of the hierarchy.
    pub fn is_root(&self) -> bool {
        self.parent_uuid.is_none()
    }
}

/// Fully-materialized task snapshot with loaded relations.
///
/// Used as the cacheable detail view and for event consumers that need
/// hierarchy context without a follow-up query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetail {
    pub task: Task,
    pub parent: Option<Task>,
    pub children: Vec<Task>,
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
