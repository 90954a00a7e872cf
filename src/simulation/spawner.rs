//! Admission control for agents
//!
//! Every spawn period the spawner scans the roads that touch the edge of the
//! map and rolls once per node: sidewalk nodes produce pedestrians that walk
//! in from just outside the map, inward lane nodes produce vehicles. Right
//! after generation every node of every road entity gets the same roll to
//! seed the city. Both passes respect the population caps, counting spawns
//! as they are issued.

use log::debug;
use rand::Rng;

use super::agent::{Agent, AgentKind, NodeAssignment, VehicleStyle};
use super::config::SimConfig;
use super::generator::CityMap;
use super::node_table::{IntersectionNode, NodeRole, Orientation, RoadNode};
use super::road::{RoadEntity, RoadKind};
use super::types::{
    AgentId, GridCoord, Heading, Rect, Vec2, Velocity, EDGE_SPAWN_CLEARANCE, MAX_VEHICLE_SPEED,
    PEDESTRIAN_FOOT_OFFSET, PEDESTRIAN_SIZE, PEDESTRIAN_SPEED, ROAD_UNIT,
};

/// A pending spawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    pub kind: AgentKind,
    /// Walk point for pedestrians, centre for vehicles
    pub anchor: Vec2,
    pub heading: Heading,
    pub speed: i32,
    pub node: NodeAssignment,
    /// Seeded at start-up rather than from the map edge
    pub initial: bool,
}

impl SpawnRequest {
    pub fn cell(&self) -> GridCoord {
        self.node.cell
    }

    pub fn into_agent<R: Rng + ?Sized>(self, id: AgentId, rng: &mut R) -> Agent {
        let cell = self.cell();
        let mut agent = match self.kind {
            AgentKind::Vehicle => Agent::vehicle(
                id,
                VehicleStyle::random(rng),
                self.anchor,
                self.heading,
                self.speed,
                cell,
                cell,
            ),
            AgentKind::Pedestrian => Agent::pedestrian(
                id,
                self.anchor,
                Velocity::along(self.heading, self.speed),
                self.heading,
                cell,
                cell,
            ),
        };
        agent.lane = match self.node.role {
            NodeRole::Road(RoadNode::Lane { lane, .. })
            | NodeRole::Intersection(IntersectionNode::Stop { lane, .. }) => lane,
            _ => 0,
        };
        agent.node = Some(self.node);
        agent
    }
}

/// Why a spawn was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnRejection {
    OffRoad,
    Overlap,
    TooCloseToEdge,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpawnStats {
    pub pedestrians_spawned: usize,
    pub vehicles_spawned: usize,
    pub rejected: usize,
    pub retired: usize,
}

#[derive(Debug, Clone)]
pub struct Spawner {
    period_ms: u32,
    elapsed_ms: u32,
    chance: u32,
    pub max_pedestrians: usize,
    pub max_vehicles: usize,
    pub stats: SpawnStats,
}

impl Spawner {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            period_ms: config.spawn_period_ms,
            elapsed_ms: 0,
            chance: config.spawn_chance.max(1),
            max_pedestrians: config.max_pedestrians,
            max_vehicles: config.max_vehicles,
            stats: SpawnStats::default(),
        }
    }

    /// Advance the spawn timer; true when a boundary scan is due
    pub fn tick(&mut self, delta_ms: u32) -> bool {
        self.elapsed_ms = self.elapsed_ms.saturating_add(delta_ms);
        if self.elapsed_ms >= self.period_ms {
            self.elapsed_ms = 0;
            true
        } else {
            false
        }
    }

    fn fires<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.random_range(0..self.chance) == 0
    }

    /// Roll every node of every road that touches the map edge
    pub fn boundary_requests<R: Rng + ?Sized>(
        &self,
        map: &CityMap,
        rng: &mut R,
        mut pedestrians: usize,
        mut vehicles: usize,
    ) -> Vec<SpawnRequest> {
        let world = map.world_bounds();
        let mut requests = Vec::new();

        for road in &map.roads {
            let Some(inward) = inward_heading(road, map.rows(), map.cols()) else {
                continue;
            };
            for role in road.roles() {
                if !self.fires(rng) {
                    continue;
                }
                let Some(anchor) = road.anchor(role) else {
                    continue;
                };
                let node = NodeAssignment {
                    cell: road.coord,
                    role,
                };
                match role {
                    NodeRole::Road(RoadNode::Walk(_)) if pedestrians < self.max_pedestrians => {
                        pedestrians += 1;
                        requests.push(SpawnRequest {
                            kind: AgentKind::Pedestrian,
                            anchor: outside_edge(anchor, inward, world),
                            heading: inward,
                            speed: PEDESTRIAN_SPEED,
                            node,
                            initial: false,
                        });
                    }
                    NodeRole::Road(RoadNode::Lane { heading, .. })
                        if heading == inward && vehicles < self.max_vehicles =>
                    {
                        vehicles += 1;
                        requests.push(SpawnRequest {
                            kind: AgentKind::Vehicle,
                            anchor,
                            heading,
                            speed: MAX_VEHICLE_SPEED,
                            node,
                            initial: false,
                        });
                    }
                    _ => {}
                }
            }
        }
        requests
    }

    /// Roll every node of every road entity once, for the start-up population
    pub fn initial_requests<R: Rng + ?Sized>(
        &self,
        map: &CityMap,
        rng: &mut R,
        mut pedestrians: usize,
        mut vehicles: usize,
    ) -> Vec<SpawnRequest> {
        let mut requests = Vec::new();

        for road in &map.roads {
            for role in road.roles() {
                if !self.fires(rng) {
                    continue;
                }
                let Some(anchor) = road.anchor(role) else {
                    continue;
                };
                let node = NodeAssignment {
                    cell: road.coord,
                    role,
                };
                let (kind, heading, speed) = match role {
                    NodeRole::Road(RoadNode::Walk(_)) => {
                        (AgentKind::Pedestrian, default_heading(road), 0)
                    }
                    NodeRole::Intersection(IntersectionNode::Walk(_)) => {
                        (AgentKind::Pedestrian, Heading::Right, 0)
                    }
                    NodeRole::Road(RoadNode::Lane { heading, .. })
                    | NodeRole::Intersection(IntersectionNode::Stop { heading, .. }) => {
                        (AgentKind::Vehicle, heading, MAX_VEHICLE_SPEED)
                    }
                };

                match kind {
                    AgentKind::Pedestrian if pedestrians < self.max_pedestrians => pedestrians += 1,
                    AgentKind::Vehicle if vehicles < self.max_vehicles => vehicles += 1,
                    _ => continue,
                }
                requests.push(SpawnRequest {
                    kind,
                    anchor,
                    heading,
                    speed,
                    node,
                    initial: true,
                });
            }
        }
        requests
    }
}

/// Heading that leads from an edge road into the map, if the road is on the
/// edge and runs across it
pub fn inward_heading(road: &RoadEntity, rows: usize, cols: usize) -> Option<Heading> {
    match road.kind {
        RoadKind::Road(Orientation::Horizontal) if road.coord.col == 0 => Some(Heading::Right),
        RoadKind::Road(Orientation::Horizontal) if road.coord.col + ROAD_UNIT >= cols => {
            Some(Heading::Left)
        }
        RoadKind::Road(Orientation::Vertical) if road.coord.row == 0 => Some(Heading::Down),
        RoadKind::Road(Orientation::Vertical) if road.coord.row + 1 == rows => Some(Heading::Up),
        _ => None,
    }
}

fn default_heading(road: &RoadEntity) -> Heading {
    match road.orientation() {
        Some(Orientation::Vertical) => Heading::Down,
        _ => Heading::Right,
    }
}

/// Walk point that places a pedestrian's box just outside the map edge it is
/// walking in from
fn outside_edge(anchor: Vec2, inward: Heading, world: Rect) -> Vec2 {
    let (fx, fy) = PEDESTRIAN_FOOT_OFFSET;
    let size = PEDESTRIAN_SIZE as f32;
    match inward {
        Heading::Right => Vec2::new(world.left() as f32 - size + fx as f32, anchor.y),
        Heading::Left => Vec2::new(world.right() as f32 + fx as f32, anchor.y),
        Heading::Down => Vec2::new(anchor.x, world.top() as f32 - size + fy as f32),
        Heading::Up => Vec2::new(anchor.x, world.bottom() as f32 + fy as f32),
    }
}

/// Check a freshly built agent against the entity it was placed on and the
/// vehicles already on the map
pub fn check_spawn(
    agent: &Agent,
    initial: bool,
    entity: &RoadEntity,
    world: Rect,
    others: &[Agent],
) -> Result<(), SpawnRejection> {
    match agent.kind {
        AgentKind::Vehicle => {
            let body = agent.collision_box();
            if !body.intersects(&entity.bounds) {
                return Err(SpawnRejection::OffRoad);
            }
            let overlap = others.iter().any(|other| {
                other.active
                    && other.id != agent.id
                    && other.is_vehicle()
                    && other.collision_box().intersects(&body)
            });
            if overlap {
                return Err(SpawnRejection::Overlap);
            }
            if initial {
                let inner = Rect::new(
                    world.x + EDGE_SPAWN_CLEARANCE,
                    world.y + EDGE_SPAWN_CLEARANCE,
                    world.w - 2 * EDGE_SPAWN_CLEARANCE,
                    world.h - 2 * EDGE_SPAWN_CLEARANCE,
                );
                if !inner.contains(&agent.bounds()) {
                    return Err(SpawnRejection::TooCloseToEdge);
                }
            }
        }
        AgentKind::Pedestrian => {
            if initial && !agent.collision_box().intersects(&entity.bounds) {
                debug!("pedestrian {:?} placed off its road", agent.id);
                return Err(SpawnRejection::OffRoad);
            }
        }
    }
    Ok(())
}
