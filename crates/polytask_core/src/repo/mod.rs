//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the task store contract consumed by the service layer.
//! - Isolate SQLite query details and hierarchy-invariant checks.
//!
//! # Invariants
//! - Write paths validate localized fields before SQL mutations.
//! - Parent-link writes re-check hierarchy invariants inside the same
//!   transaction as the write.
//! - Read paths take an explicit `include_deleted` flag; there is no
//!   ambient default scope.

pub mod task_repo;
