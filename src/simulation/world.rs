//! Main simulation world that ties everything together
//!
//! `SimWorld` owns the generated map, the agent list, the spawner, the seeded
//! random source and the event outbox. One `tick` advances every agent, then
//! retires strays, then runs the spawner, then sweeps out inactive agents.

use anyhow::{Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::agent::{Agent, AgentKind, DeactivationReason, NodeAssignment, VehicleStyle};
use super::collision::{agents_in_region, TrafficSample};
use super::config::SimConfig;
use super::events::{EventOutbox, SimEvent};
use super::generator::{generate_with_rng, CityMap};
use super::navigation::{
    lane_assignment, update_pedestrian, update_vehicle, AgentUpdateResult, NavContext,
};
use super::node_table::{IntersectionShape, NodeRole, Orientation, RoadNode, Sidewalk};
use super::road::RoadKind;
use super::road_graph::RoadGraph;
use super::snapshot::{DrawItem, Snapshot, SpriteState};
use super::spawner::{check_spawn, SpawnRequest, SpawnStats, Spawner};
use super::types::{
    AgentId, GridCoord, Heading, Rect, SimId, Vec2, COLUMN_WIDTH, MAX_VEHICLE_SPEED, ROAD_UNIT,
    ROW_HEIGHT,
};

pub struct SimWorld {
    pub config: SimConfig,
    pub map: CityMap,
    pub graph: RoadGraph,
    agents: Vec<Agent>,
    pub spawner: Spawner,
    rng: StdRng,
    outbox: EventOutbox,
    next_id: usize,
    elapsed_ms: u64,
    tick_count: u64,
}

impl SimWorld {
    /// Generate a city from `config` and seed it with its initial population
    pub fn generate(config: SimConfig) -> Result<Self> {
        config.validate().context("invalid simulation config")?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let map = generate_with_rng(config.rows, config.cols, &mut rng).with_context(|| {
            format!(
                "failed to generate {}x{} city with seed {}",
                config.rows, config.cols, config.seed
            )
        })?;

        let mut world = Self::with_rng(config, map, rng);
        info!(
            "Generated {}x{} city: {} roads ({} intersections), {} buildings, {} road components",
            world.map.rows(),
            world.map.cols(),
            world.map.roads.len(),
            world.map.intersection_count(),
            world.map.buildings.len(),
            world.graph.component_count()
        );

        if world.config.initial_population {
            world.populate_initial();
        }
        Ok(world)
    }

    /// Create a world with the default configuration and the given seed
    pub fn new_with_seed(seed: u64) -> Result<Self> {
        Self::generate(SimConfig::with_seed(seed))
    }

    /// Wrap a hand-built map. No agents are placed.
    pub fn from_map(config: SimConfig, map: CityMap) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self::with_rng(config, map, rng)
    }

    fn with_rng(config: SimConfig, map: CityMap, rng: StdRng) -> Self {
        let graph = RoadGraph::build(&map);
        let spawner = Spawner::new(&config);
        Self {
            config,
            map,
            graph,
            agents: Vec::new(),
            spawner,
            rng,
            outbox: EventOutbox::new(),
            next_id: 0,
            elapsed_ms: 0,
            tick_count: 0,
        }
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Roll every node of every road entity once
    pub fn populate_initial(&mut self) {
        let pedestrians = self.pedestrian_count();
        let vehicles = self.vehicle_count();
        let requests =
            self.spawner
                .initial_requests(&self.map, &mut self.rng, pedestrians, vehicles);
        for request in requests {
            self.spawn(request);
        }
        debug!(
            "Initial population: {} pedestrians, {} vehicles",
            self.pedestrian_count(),
            self.vehicle_count()
        );
    }

    /// Build, validate and insert an agent. Rejected spawns never enter the
    /// agent list; they only leave a `Deactivated` event behind.
    pub fn spawn(&mut self, request: SpawnRequest) -> Option<AgentId> {
        let id = AgentId(self.next_sim_id());
        let agent = request.into_agent(id, &mut self.rng);

        let Some(entity) = self.map.road_at(request.cell()) else {
            debug!("spawn request at {} has no road", request.cell());
            return None;
        };
        let world = self.map.world_bounds();
        if let Err(rejection) = check_spawn(&agent, request.initial, entity, world, &self.agents)
        {
            debug!(
                "Rejected {:?} spawn at {}: {:?}",
                agent.kind,
                request.cell(),
                rejection
            );
            self.spawner.stats.rejected += 1;
            self.outbox.push(SimEvent::Deactivated {
                agent: id,
                reason: DeactivationReason::SpawnRejected,
            });
            return None;
        }

        match agent.kind {
            AgentKind::Pedestrian => self.spawner.stats.pedestrians_spawned += 1,
            AgentKind::Vehicle => self.spawner.stats.vehicles_spawned += 1,
        }
        self.agents.push(agent);
        Some(id)
    }

    /// Spawn a vehicle on the lane node of the road at `cell`, subject to the
    /// usual validation
    pub fn place_vehicle(
        &mut self,
        cell: GridCoord,
        heading: Heading,
        lane: usize,
        speed: i32,
    ) -> Option<AgentId> {
        let node = lane_assignment(&self.map, cell, heading, lane)?;
        let anchor = self.map.road_at(cell)?.anchor(node.role)?;
        self.spawn(SpawnRequest {
            kind: AgentKind::Vehicle,
            anchor,
            heading,
            speed,
            node,
            initial: false,
        })
    }

    /// Put a vehicle centred on `center` without any spawn validation
    pub fn place_vehicle_at(
        &mut self,
        center: Vec2,
        heading: Heading,
        speed: i32,
        cell: GridCoord,
    ) -> AgentId {
        let id = AgentId(self.next_sim_id());
        let mut agent = Agent::vehicle(
            id,
            VehicleStyle::random(&mut self.rng),
            center,
            heading,
            speed,
            cell,
            cell,
        );
        agent.node = lane_assignment(&self.map, cell, heading, 0);
        self.spawner.stats.vehicles_spawned += 1;
        self.agents.push(agent);
        id
    }

    /// Spawn a standing pedestrian on the near sidewalk of the road at `cell`.
    /// Returns `None` at the pedestrian cap or when the cell has no sidewalk.
    pub fn try_spawn_pedestrian(&mut self, cell: GridCoord) -> Option<AgentId> {
        if self.pedestrian_count() >= self.spawner.max_pedestrians {
            return None;
        }
        let road = self.map.road_at(cell)?;
        let role = NodeRole::Road(RoadNode::Walk(Sidewalk::Near));
        let anchor = road.anchor(role)?;
        let heading = match road.orientation() {
            Some(Orientation::Vertical) => Heading::Down,
            _ => Heading::Right,
        };
        let node = NodeAssignment {
            cell: road.coord,
            role,
        };
        self.spawn(SpawnRequest {
            kind: AgentKind::Pedestrian,
            anchor,
            heading,
            speed: 0,
            node,
            initial: true,
        })
    }

    /// Advance the simulation by `delta_ms` of simulated time
    pub fn tick(&mut self, delta_ms: u32) {
        for road in &mut self.map.roads {
            road.fade_in(delta_ms);
        }

        self.update_agents(delta_ms);
        self.retire_strays();

        if self.spawner.tick(delta_ms) {
            self.spawn_at_boundary();
        }

        self.cleanup();
        self.elapsed_ms += u64::from(delta_ms);
        self.tick_count += 1;
    }

    fn update_agents(&mut self, delta_ms: u32) {
        let ctx = NavContext {
            map: &self.map,
            graph: &self.graph,
            delta_ms,
        };

        for index in 0..self.agents.len() {
            if !self.agents[index].active {
                continue;
            }

            let result = if self.agents[index].flags.squished {
                if self.agents[index].advance_crash(delta_ms) {
                    Ok(AgentUpdateResult::Deactivate(DeactivationReason::Crashed))
                } else {
                    Ok(AgentUpdateResult::Continue)
                }
            } else if self.agents[index].is_vehicle() {
                let traffic: Vec<TrafficSample> = self
                    .agents
                    .iter()
                    .enumerate()
                    .filter(|(i, other)| *i != index && other.active && other.is_vehicle())
                    .map(|(_, other)| TrafficSample::of(other))
                    .collect();
                update_vehicle(&mut self.agents[index], &ctx, &traffic)
            } else {
                update_pedestrian(&mut self.agents[index], &ctx, &mut self.rng)
            };

            let agent = &mut self.agents[index];
            match result {
                Ok(AgentUpdateResult::Continue) => {}
                Ok(AgentUpdateResult::Deactivate(reason)) => {
                    retire(agent, reason, &mut self.outbox, &mut self.spawner.stats);
                }
                Err(err) => {
                    debug!("Agent {:?} update failed: {}", agent.id, err);
                    retire(
                        agent,
                        DeactivationReason::InvalidState,
                        &mut self.outbox,
                        &mut self.spawner.stats,
                    );
                }
            }
        }
    }

    /// Retire agents that left the map or drifted off every road
    fn retire_strays(&mut self) {
        let world = self.map.world_bounds();
        let margin = self.config.bounds_margin;

        for agent in self.agents.iter_mut().filter(|agent| agent.active) {
            let bounds = agent.bounds();
            let outside = bounds.left() < world.left() - margin
                || bounds.left() > world.right() + margin
                || bounds.top() < world.top() - margin
                || bounds.top() > world.bottom() + margin;
            if outside {
                retire(
                    agent,
                    DeactivationReason::OutOfBounds,
                    &mut self.outbox,
                    &mut self.spawner.stats,
                );
                continue;
            }

            if world.contains(&bounds)
                && !self.map.roads.iter().any(|road| road.bounds.intersects(&bounds))
            {
                debug!("Agent {:?} drifted off the road network", agent.id);
                retire(
                    agent,
                    DeactivationReason::OffNetwork,
                    &mut self.outbox,
                    &mut self.spawner.stats,
                );
            }
        }
    }

    fn spawn_at_boundary(&mut self) {
        let pedestrians = self.pedestrian_count();
        let vehicles = self.vehicle_count();
        let requests =
            self.spawner
                .boundary_requests(&self.map, &mut self.rng, pedestrians, vehicles);
        for request in requests {
            self.spawn(request);
        }
    }

    /// Drop inactive agents, walking backwards so indices stay valid
    fn cleanup(&mut self) {
        for index in (0..self.agents.len()).rev() {
            if !self.agents[index].active {
                self.agents.remove(index);
            }
        }
    }

    /// Apply an external impact to everything inside `region`. Agents in the
    /// region are squished and buildings take `damage`. Returns the union of
    /// every affected box; empty when nothing was hit.
    pub fn collision_signal(&mut self, region: Rect, damage: u32) -> Rect {
        let mut affected = Rect::default();

        for agent in agents_in_region(&mut self.agents, &region) {
            if !agent.squish() {
                continue;
            }
            let bounds = agent.bounds();
            affected = affected.union(&bounds);
            self.outbox.push(SimEvent::Destroyed {
                agent: agent.id,
                region: bounds,
            });
            if agent.is_pedestrian() {
                retire(
                    agent,
                    DeactivationReason::Squished,
                    &mut self.outbox,
                    &mut self.spawner.stats,
                );
            }
        }

        if damage > 0 {
            for building in self
                .map
                .buildings
                .iter_mut()
                .filter(|building| building.bounds.intersects(&region))
            {
                let taken = building.apply_damage(damage);
                if taken > 0 {
                    affected = affected.union(&building.bounds);
                    self.outbox.push(SimEvent::Damaged {
                        building: building.id,
                        amount: taken,
                    });
                }
            }
        }
        affected
    }

    /// Retire one agent from outside the tick. Returns false when it was
    /// unknown or already inactive.
    pub fn retire_agent(&mut self, id: AgentId, reason: DeactivationReason) -> bool {
        match self.agents.iter_mut().find(|agent| agent.id == id) {
            Some(agent) if agent.active => {
                retire(agent, reason, &mut self.outbox, &mut self.spawner.stats);
                true
            }
            _ => false,
        }
    }

    /// Take every event emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.outbox.drain()
    }

    pub fn pending_events(&self) -> usize {
        self.outbox.len()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.map, &self.agents, self.elapsed_ms)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn pedestrian_count(&self) -> usize {
        self.agents
            .iter()
            .filter(|agent| agent.active && agent.is_pedestrian())
            .count()
    }

    pub fn vehicle_count(&self) -> usize {
        self.agents
            .iter()
            .filter(|agent| agent.active && agent.is_vehicle())
            .count()
    }

    pub fn stats(&self) -> SpawnStats {
        self.spawner.stats
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Print a summary of the current world state to stdout
    pub fn print_summary(&self) {
        let stats = self.spawner.stats;
        println!("=== City Traffic Summary ===");
        println!(
            "Time: {:.2}s ({} ticks)",
            self.elapsed_ms as f64 / 1000.0,
            self.tick_count
        );
        println!(
            "Grid: {}x{}, roads: {} ({} intersections), buildings: {}",
            self.map.rows(),
            self.map.cols(),
            self.map.roads.len(),
            self.map.intersection_count(),
            self.map.buildings.len()
        );
        println!(
            "Pedestrians: {}/{}",
            self.pedestrian_count(),
            self.spawner.max_pedestrians
        );
        println!(
            "Vehicles: {}/{}",
            self.vehicle_count(),
            self.spawner.max_vehicles
        );
        println!(
            "Spawned: {} pedestrians, {} vehicles; rejected: {}; retired: {}",
            stats.pedestrians_spawned, stats.vehicles_spawned, stats.rejected, stats.retired
        );
        println!();

        let vehicles: Vec<&Agent> = self
            .agents
            .iter()
            .filter(|agent| agent.active && agent.is_vehicle())
            .collect();
        if !vehicles.is_empty() {
            println!("--- Active Vehicles ---");
            for vehicle in vehicles {
                let center = vehicle.center();
                println!(
                    "  Vehicle {}: pos=({:.0}, {:.0}) heading={:?} speed={}/{} state={:?}",
                    vehicle.id.0 .0,
                    center.x,
                    center.y,
                    vehicle.heading,
                    vehicle.velocity.magnitude(),
                    MAX_VEHICLE_SPEED,
                    vehicle.nav_state()
                );
            }
            println!();
        }
    }

    /// Print an ASCII map of the grid with agents drawn over it
    pub fn draw_map(&self) {
        let rows = self.map.rows();
        let cols = self.map.cols();
        let mut grid = vec![vec!['.'; cols]; rows];

        let mut fill = |bounds: &Rect, span: usize, symbol: char| {
            let row = (bounds.y / ROW_HEIGHT) as usize;
            let col = (bounds.x / COLUMN_WIDTH) as usize;
            if let Some(line) = grid.get_mut(row) {
                for cell in line.iter_mut().skip(col).take(span) {
                    *cell = symbol;
                }
            }
        };

        // Snapshot order puts agents lower on screen over those above them
        let snapshot = self.snapshot();
        for entry in &snapshot.entries {
            match entry.item {
                DrawItem::Road { kind, bounds, .. } => {
                    let symbol = match kind {
                        RoadKind::Road(Orientation::Horizontal) => '=',
                        RoadKind::Road(Orientation::Vertical) => '|',
                        RoadKind::Intersection(variant)
                            if variant.shape == IntersectionShape::FourWay =>
                        {
                            '+'
                        }
                        RoadKind::Intersection(_) => 'T',
                    };
                    fill(&bounds, ROAD_UNIT, symbol);
                }
                DrawItem::Building {
                    bounds, exploded, ..
                } => {
                    let span = (bounds.w / COLUMN_WIDTH).max(1) as usize;
                    fill(&bounds, span, if exploded { 'x' } else { '#' });
                }
                DrawItem::Agent { bounds, sprite, .. } => {
                    let center = bounds.center();
                    if center.x < 0.0 || center.y < 0.0 {
                        continue;
                    }
                    let cell = Rect::point(Vec2::new(
                        (center.x / COLUMN_WIDTH as f32).floor() * COLUMN_WIDTH as f32,
                        (center.y / ROW_HEIGHT as f32).floor() * ROW_HEIGHT as f32,
                    ));
                    let symbol = match sprite {
                        SpriteState::Walking { .. } => 'p',
                        SpriteState::Driving(_) => 'v',
                        SpriteState::Wreck(_) | SpriteState::Squished => '*',
                    };
                    fill(&cell, 1, symbol);
                }
            }
        }

        println!("\n=== City Map ===");
        println!(
            "Legend: = horizontal road, | vertical road, + 4-way, T 3-way, # building, x exploded building, p pedestrian, v vehicle, * wreck"
        );
        println!();
        for line in &grid {
            let line: String = line.iter().collect();
            println!("{}", line);
        }
        println!();
    }
}

fn retire(
    agent: &mut Agent,
    reason: DeactivationReason,
    outbox: &mut EventOutbox,
    stats: &mut SpawnStats,
) {
    if !agent.active {
        return;
    }
    agent.deactivate();
    stats.retired += 1;
    outbox.push(SimEvent::Deactivated {
        agent: agent.id,
        reason,
    });
}
