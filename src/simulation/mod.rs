//! Standalone city traffic simulation
//!
//! Procedural city generation plus the per-tick movement of pedestrians and
//! vehicles over the generated road grid. Nothing here draws; renderers read
//! a `Snapshot` and drain the event outbox between ticks.

mod agent;
mod collision;
mod config;
mod error;
mod events;
mod generator;
mod grid;
mod intersection;
mod navigation;
mod node_table;
mod road;
mod road_graph;
mod snapshot;
mod spawner;
mod types;
mod world;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use agent::{
    Agent, AgentFlags, AgentKind, Crossing, DeactivationReason, NavState, NodeAssignment,
    TurnPhase, TurnState, VehicleStyle,
};
#[allow(unused_imports)]
pub use collision::{probe_boxes, probe_traffic, ProbeHit, TrafficSample};
#[allow(unused_imports)]
pub use config::{SimConfig, DEFAULT_COLS, DEFAULT_ROWS, DEFAULT_TICK_MS};
#[allow(unused_imports)]
pub use error::{SimError, SimResult};
#[allow(unused_imports)]
pub use events::{EventOutbox, SimEvent};
#[allow(unused_imports)]
pub use generator::{generate, generate_with_rng, CityMap, SpawnNode};
#[allow(unused_imports)]
pub use grid::{CellRef, Grid};
#[allow(unused_imports)]
pub use navigation::{lane_assignment, AgentUpdateResult};
#[allow(unused_imports)]
pub use node_table::{
    lane_offset, Corner, CrossingKind, IntersectionNode, IntersectionShape, IntersectionVariant,
    NodeRole, Orientation, RoadNode, RoadWidth, Sidewalk, MAX_LANES,
};
#[allow(unused_imports)]
pub use road::{Building, BuildingStyle, RoadEntity, RoadKind};
#[allow(unused_imports)]
pub use road_graph::RoadGraph;
#[allow(unused_imports)]
pub use snapshot::{DrawEntry, DrawItem, Snapshot, SpriteState};
#[allow(unused_imports)]
pub use spawner::{inward_heading, SpawnRejection, SpawnRequest, SpawnStats, Spawner};
#[allow(unused_imports)]
pub use types::{
    AgentId, BuildingId, GridCoord, Heading, Rect, RoadId, SimId, Vec2, Velocity, COLUMN_WIDTH,
    ENTITY_SIZE, MAX_PEDESTRIANS, MAX_VEHICLES, MAX_VEHICLE_SPEED, OUT_OF_BOUNDS_MARGIN,
    PEDESTRIAN_SIZE, ROAD_UNIT, ROW_HEIGHT, VEHICLE_SIZE,
};
pub use world::SimWorld;
