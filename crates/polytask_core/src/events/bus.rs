//! Publish/subscribe bus contract and in-process implementation.

use crate::events::envelope::EventEnvelope;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};

pub type BusResult<T> = Result<T, BusError>;

/// Publish failure from a bus backend.
///
/// Never escapes the broadcaster; delivery is best-effort by contract.
#[derive(Debug)]
pub enum BusError {
    Publish(String),
}

impl Display for BusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Publish(message) => write!(f, "event publish failure: {message}"),
        }
    }
}

impl Error for BusError {}

/// Bus contract: publish one envelope to one named channel.
///
/// Implementations must not block on subscriber delivery and must not
/// retry; subscribers are expected to re-fetch on suspicion of
/// staleness.
pub trait EventBus {
    fn publish(&self, channel: &str, envelope: &EventEnvelope) -> BusResult<()>;
}

impl<B: EventBus + ?Sized> EventBus for &B {
    fn publish(&self, channel: &str, envelope: &EventEnvelope) -> BusResult<()> {
        (**self).publish(channel, envelope)
    }
}

/// In-process bus recording envelopes per channel.
///
/// Serves single-process deployments and doubles as the observable bus
/// for tests.
#[derive(Default)]
pub struct MemoryEventBus {
    channels: Mutex<BTreeMap<String, Vec<EventEnvelope>>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Envelopes published on one channel, in publication order.
    pub fn published(&self, channel: &str) -> Vec<EventEnvelope> {
        self.lock()
            .map(|channels| channels.get(channel).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Total envelope count across every channel.
    pub fn total_published(&self) -> usize {
        self.lock()
            .map(|channels| channels.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn lock(&self) -> BusResult<MutexGuard<'_, BTreeMap<String, Vec<EventEnvelope>>>> {
        self.channels
            .lock()
            .map_err(|_| BusError::Publish("bus mutex poisoned".to_string()))
    }
}

impl EventBus for MemoryEventBus {
    fn publish(&self, channel: &str, envelope: &EventEnvelope) -> BusResult<()> {
        let mut channels = self.lock()?;
        channels
            .entry(channel.to_string())
            .or_default()
            .push(envelope.clone());
        Ok(())
    }
}
