//! Outbox of things that happened during a tick
//!
//! The world only appends; whoever drives the simulation drains the outbox
//! between ticks. Nothing in here is read back by the simulation itself.

use super::agent::DeactivationReason;
use super::types::{AgentId, BuildingId, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// An agent was squished; `region` is its box at that moment
    Destroyed { agent: AgentId, region: Rect },
    /// A building took `amount` points of damage
    Damaged { building: BuildingId, amount: u32 },
    /// An agent left the simulation
    Deactivated {
        agent: AgentId,
        reason: DeactivationReason,
    },
}

#[derive(Debug, Default, Clone)]
pub struct EventOutbox {
    events: Vec<SimEvent>,
}

impl EventOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Take every pending event, oldest first
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }
}
