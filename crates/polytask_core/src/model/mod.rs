//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record and its lifecycle helpers.
//! - Define the validation taxonomy enforced before every write.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.
//! - A task with a parent never has children of its own (depth cap).

pub mod task;
