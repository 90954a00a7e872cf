//! Read-only render snapshot
//!
//! A flat list of drawable items, each with a depth key. Roads sit on the
//! ground layer; buildings and agents are layered above them by the bottom
//! edge of their box, so things lower on screen draw later.

use ordered_float::OrderedFloat;

use super::agent::{Agent, AgentKind, NavState, TurnPhase, VehicleStyle};
use super::generator::CityMap;
use super::road::{BuildingStyle, RoadKind};
use super::types::{AgentId, BuildingId, Heading, Rect, RoadId};

/// Sprite selection hint for an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteState {
    Walking { frame: u8 },
    Driving(VehicleStyle),
    Wreck(VehicleStyle),
    Squished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawItem {
    Road {
        id: RoadId,
        kind: RoadKind,
        bounds: Rect,
        opacity: f32,
    },
    Building {
        id: BuildingId,
        style: BuildingStyle,
        bounds: Rect,
        facing_up: bool,
        damage: u32,
        exploded: bool,
    },
    Agent {
        id: AgentId,
        kind: AgentKind,
        bounds: Rect,
        heading: Heading,
        /// Sprite rotation in radians, clockwise from facing right
        rotation: f32,
        state: NavState,
        sprite: SpriteState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawEntry {
    pub depth: OrderedFloat<f32>,
    pub item: DrawItem,
}

/// Everything a renderer needs for one frame, sorted by depth
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub entries: Vec<DrawEntry>,
    pub elapsed_ms: u64,
}

impl Snapshot {
    pub fn capture(map: &CityMap, agents: &[Agent], elapsed_ms: u64) -> Self {
        let world_height = map.world_bounds().h as f32;
        let layered =
            |bounds: &Rect| OrderedFloat(1.0 + bounds.bottom() as f32 / (world_height + 100.0));

        let capacity = map.roads.len() + map.buildings.len() + agents.len();
        let mut entries = Vec::with_capacity(capacity);
        for road in &map.roads {
            entries.push(DrawEntry {
                depth: OrderedFloat(0.0),
                item: DrawItem::Road {
                    id: road.id,
                    kind: road.kind,
                    bounds: road.bounds,
                    opacity: road.opacity,
                },
            });
        }
        for building in &map.buildings {
            entries.push(DrawEntry {
                depth: layered(&building.bounds),
                item: DrawItem::Building {
                    id: building.id,
                    style: building.style,
                    bounds: building.bounds,
                    facing_up: building.facing_up,
                    damage: building.damage,
                    exploded: building.is_exploded(),
                },
            });
        }
        for agent in agents.iter().filter(|a| a.active) {
            let bounds = agent.bounds();
            entries.push(DrawEntry {
                depth: layered(&bounds),
                item: DrawItem::Agent {
                    id: agent.id,
                    kind: agent.kind,
                    bounds,
                    heading: agent.heading,
                    rotation: rotation(agent),
                    state: agent.nav_state(),
                    sprite: sprite(agent),
                },
            });
        }

        entries.sort_by_key(|entry| entry.depth);
        Self {
            entries,
            elapsed_ms,
        }
    }

    pub fn agents(&self) -> impl Iterator<Item = &DrawEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.item, DrawItem::Agent { .. }))
    }

    pub fn roads(&self) -> impl Iterator<Item = &DrawEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.item, DrawItem::Road { .. }))
    }
}

fn rotation(agent: &Agent) -> f32 {
    match agent.turn {
        Some(turn) => match turn.phase {
            TurnPhase::Approach => turn.from.angle(),
            TurnPhase::Rotate { radians_turned, .. } => turn.from.angle() + radians_turned,
        },
        None => agent.heading.angle(),
    }
}

fn sprite(agent: &Agent) -> SpriteState {
    match (agent.style, agent.flags.squished) {
        (Some(style), false) => SpriteState::Driving(style),
        (Some(style), true) => SpriteState::Wreck(style),
        (None, true) => SpriteState::Squished,
        (None, false) => SpriteState::Walking {
            frame: agent.walk_frame,
        },
    }
}
