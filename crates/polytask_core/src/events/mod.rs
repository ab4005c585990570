//! Task lifecycle and hierarchy event propagation.
//!
//! # Responsibility
//! - Define the envelope payload published for every task change.
//! - Define the pub/sub bus contract and an in-process implementation.
//! - Fan lifecycle envelopes out to owner and global channels, and
//!   hierarchy envelopes to parent/subtask viewers.
//!
//! # Invariants
//! - Envelopes carry full current snapshots, so consumers can treat
//!   delivery as idempotent and out-of-order-tolerant.
//! - Publishing is fire-and-forget: failures are logged, never surfaced,
//!   never retried.

mod broadcaster;
mod bus;
mod envelope;

pub use broadcaster::{owner_channel, task_channel, TaskBroadcaster, GLOBAL_CHANNEL};
pub use bus::{BusError, BusResult, EventBus, MemoryEventBus};
pub use envelope::{EventEnvelope, EventKind};
