//! Look-ahead probing between vehicles and inbound impact handling
//!
//! Each tick a moving vehicle projects its box forward at three distances.
//! A hit on the far probe queues a slow-down; a hit on the near probe also
//! holds the vehicle in place until that probe is clear again.

use log::debug;

use super::agent::Agent;
use super::types::{AgentId, Heading, Rect, PROBE_OFFSETS};

/// What a vehicle needs to know about another vehicle when probing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficSample {
    pub id: AgentId,
    pub bounds: Rect,
    pub heading: Heading,
    /// Stationary, turning or wrecked
    pub holding: bool,
}

impl TrafficSample {
    pub fn of(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            bounds: agent.bounds(),
            heading: agent.heading,
            holding: agent.velocity.is_zero() || agent.turn.is_some() || agent.flags.squished,
        }
    }
}

/// Outcome of a probe pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeHit {
    Clear,
    Far,
    /// Something sits inside the nearest probe; the vehicle must hold
    Near,
}

/// The three forward probes, nearest first
pub fn probe_boxes(agent: &Agent) -> [Rect; 3] {
    let bounds = agent.bounds();
    let (dx, dy) = agent.heading.delta();
    PROBE_OFFSETS.map(|offset| bounds.translate(dx * offset, dy * offset))
}

/// Probe `traffic` ahead of `agent`. Vehicles heading the opposite way in
/// another lane are ignored unless they are holding position.
pub fn probe_traffic(agent: &Agent, traffic: &[TrafficSample]) -> ProbeHit {
    let [near, _, far] = probe_boxes(agent);
    let mut hit = ProbeHit::Clear;

    for other in traffic {
        if other.id == agent.id {
            continue;
        }
        if other.heading == agent.heading.opposite() && !other.holding {
            continue;
        }
        if near.intersects(&other.bounds) {
            return ProbeHit::Near;
        }
        if far.intersects(&other.bounds) {
            hit = ProbeHit::Far;
        }
    }
    hit
}

/// Run the probes for a vehicle that is not already slowing and update its
/// flags. The hold is released as soon as the near probe is clear.
pub fn avoid_traffic(agent: &mut Agent, traffic: &[TrafficSample]) {
    if agent.flags.slow_down_queued {
        return;
    }
    match probe_traffic(agent, traffic) {
        ProbeHit::Clear => {
            agent.flags.stopped_for_vehicle = false;
        }
        ProbeHit::Far => {
            agent.flags.slow_down_queued = true;
            agent.flags.stopped_for_vehicle = false;
        }
        ProbeHit::Near => {
            agent.flags.slow_down_queued = true;
            if !agent.flags.stopped_for_vehicle {
                debug!("vehicle {:?} holding for traffic", agent.id);
            }
            agent.flags.stopped_for_vehicle = true;
        }
    }
}

/// Agents whose box overlaps `region`
pub fn agents_in_region<'a>(
    agents: &'a mut [Agent],
    region: &'a Rect,
) -> impl Iterator<Item = &'a mut Agent> + 'a {
    agents
        .iter_mut()
        .filter(move |agent| agent.active && agent.bounds().intersects(region))
}
