//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, cache and broadcaster into mutation/read APIs.
//! - Keep the caller-visible outcome decoupled from post-commit side
//!   effects.

pub mod task_service;
