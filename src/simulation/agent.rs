//! Pedestrians and vehicles
//!
//! An agent is a bundle of position, discrete velocity, a start and target
//! grid cell, the node it is keyed to and a set of behaviour flags. Its
//! navigation state is never stored; it is derived from the flags so the two
//! cannot drift apart.

use rand::Rng;

use super::node_table::{Corner, NodeRole};
use super::types::{
    AgentId, GridCoord, Heading, Rect, Vec2, Velocity, CRASH_DURATION_MS, MAX_VEHICLE_SPEED,
    PEDESTRIAN_FOOT_OFFSET, PEDESTRIAN_SIZE, SLOW_DOWN_COOLDOWN_MS, SPEED_UP_COOLDOWN_MS,
    VEHICLE_COLLISION_INSET, VEHICLE_SIZE, WALK_FRAMES, WALK_STEP_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Pedestrian,
    Vehicle,
}

/// Body style of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleStyle {
    BlackSuv,
    RedSuv,
    SilverSuv,
    WhiteSuv,
    BlueCar,
    RedCar,
}

impl VehicleStyle {
    pub const ALL: [VehicleStyle; 6] = [
        VehicleStyle::BlackSuv,
        VehicleStyle::RedSuv,
        VehicleStyle::SilverSuv,
        VehicleStyle::WhiteSuv,
        VehicleStyle::BlueCar,
        VehicleStyle::RedCar,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> VehicleStyle {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// Composite navigation state, derived from an agent's flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavState {
    Traveling,
    ApproachingIntersection,
    StoppedAtIntersection,
    Turning,
    CrossingIntersection,
    Destroyed,
}

/// Why an agent left the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeactivationReason {
    OutOfBounds,
    OffNetwork,
    Squished,
    Crashed,
    DeadEnd,
    SpawnRejected,
    InvalidState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnPhase {
    /// Still driving along the old heading toward the pivot
    Approach,
    /// Sweeping around the pivot
    Rotate {
        radius: f32,
        start_angle: f32,
        radians_turned: f32,
    },
}

/// An in-progress right turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnState {
    /// Heading before the turn
    pub from: Heading,
    /// World-space pivot point
    pub pivot: Vec2,
    pub lane: usize,
    pub phase: TurnPhase,
}

/// A pedestrian walking from one intersection corner to another
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub from: Corner,
    pub to: Corner,
    /// World-space anchor of `to`
    pub target: Vec2,
}

/// The anchor an agent is keyed to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeAssignment {
    pub cell: GridCoord,
    pub role: NodeRole,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentFlags {
    pub slow_down_queued: bool,
    pub speed_up_queued: bool,
    pub approaching_intersection: bool,
    pub stopped_for_intersection: bool,
    pub stopped_for_vehicle: bool,
    /// Pedestrian has reached the waypoint of its current intersection
    pub node_reached: bool,
    pub squished: bool,
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub kind: AgentKind,
    /// `Some` for vehicles
    pub style: Option<VehicleStyle>,
    /// Top-left corner of the sprite box
    pub position: Vec2,
    pub velocity: Velocity,
    /// Direction of travel; kept while the velocity is zero
    pub heading: Heading,
    /// Lane index for vehicles; 0 is the curb lane
    pub lane: usize,
    pub start: GridCoord,
    pub target: GridCoord,
    pub node: Option<NodeAssignment>,
    pub flags: AgentFlags,
    pub turn: Option<TurnState>,
    pub crossing: Option<Crossing>,
    pub active: bool,
    /// Walk cycle frame in `0..WALK_FRAMES`
    pub walk_frame: u8,
    walk_elapsed_ms: u32,
    slow_down_elapsed_ms: u32,
    speed_up_elapsed_ms: u32,
    /// Remaining time before stop points are honoured again
    recheck_ms: u32,
    crash_elapsed_ms: u32,
}

impl Agent {
    fn new(
        id: AgentId,
        kind: AgentKind,
        position: Vec2,
        velocity: Velocity,
        heading: Heading,
        start: GridCoord,
        target: GridCoord,
    ) -> Self {
        Self {
            id,
            kind,
            style: None,
            position,
            velocity,
            heading,
            lane: 0,
            start,
            target,
            node: None,
            flags: AgentFlags::default(),
            turn: None,
            crossing: None,
            active: true,
            walk_frame: 0,
            walk_elapsed_ms: 0,
            slow_down_elapsed_ms: 0,
            speed_up_elapsed_ms: 0,
            recheck_ms: 0,
            crash_elapsed_ms: 0,
        }
    }

    /// A vehicle centred on `anchor` driving `speed` units per tick
    pub fn vehicle(
        id: AgentId,
        style: VehicleStyle,
        anchor: Vec2,
        heading: Heading,
        speed: i32,
        start: GridCoord,
        target: GridCoord,
    ) -> Self {
        let half = VEHICLE_SIZE as f32 / 2.0;
        let mut agent = Self::new(
            id,
            AgentKind::Vehicle,
            Vec2::new(anchor.x - half, anchor.y - half),
            Velocity::along(heading, speed.clamp(0, MAX_VEHICLE_SPEED)),
            heading,
            start,
            target,
        );
        agent.style = Some(style);
        agent
    }

    /// A pedestrian whose feet stand on `anchor`
    pub fn pedestrian(
        id: AgentId,
        anchor: Vec2,
        velocity: Velocity,
        heading: Heading,
        start: GridCoord,
        target: GridCoord,
    ) -> Self {
        let (fx, fy) = PEDESTRIAN_FOOT_OFFSET;
        Self::new(
            id,
            AgentKind::Pedestrian,
            Vec2::new(anchor.x - fx as f32, anchor.y - fy as f32),
            velocity,
            heading,
            start,
            target,
        )
    }

    pub fn is_vehicle(&self) -> bool {
        self.kind == AgentKind::Vehicle
    }

    pub fn is_pedestrian(&self) -> bool {
        self.kind == AgentKind::Pedestrian
    }

    /// Sprite box in world units
    pub fn bounds(&self) -> Rect {
        let size = match self.kind {
            AgentKind::Vehicle => VEHICLE_SIZE,
            AgentKind::Pedestrian => PEDESTRIAN_SIZE,
        };
        Rect::new(
            self.position.x.round() as i32,
            self.position.y.round() as i32,
            size,
            size,
        )
    }

    /// Vehicle body box used for spawn validation and vehicle overlap
    pub fn collision_box(&self) -> Rect {
        let bounds = self.bounds();
        match self.kind {
            AgentKind::Vehicle => Rect::new(
                bounds.x + VEHICLE_COLLISION_INSET,
                bounds.y + VEHICLE_COLLISION_INSET,
                bounds.w - 2 * VEHICLE_COLLISION_INSET,
                bounds.h - 2 * VEHICLE_COLLISION_INSET,
            ),
            AgentKind::Pedestrian => self.foot_box(),
        }
    }

    /// Point the pedestrian walks on
    pub fn walk_point(&self) -> Vec2 {
        let (fx, fy) = PEDESTRIAN_FOOT_OFFSET;
        Vec2::new(self.position.x + fx as f32, self.position.y + fy as f32)
    }

    /// Small box around the feet used to detect waypoint arrival
    pub fn foot_box(&self) -> Rect {
        let feet = self.walk_point();
        Rect::new(feet.x.round() as i32 - 4, feet.y.round() as i32 - 4, 8, 9)
    }

    /// Move so the walk point sits on `point`
    pub fn set_walk_point(&mut self, point: Vec2) {
        let (fx, fy) = PEDESTRIAN_FOOT_OFFSET;
        self.position = Vec2::new(point.x - fx as f32, point.y - fy as f32);
    }

    fn half_size(&self) -> f32 {
        match self.kind {
            AgentKind::Vehicle => VEHICLE_SIZE as f32 / 2.0,
            AgentKind::Pedestrian => PEDESTRIAN_SIZE as f32 / 2.0,
        }
    }

    pub fn center(&self) -> Vec2 {
        let half = self.half_size();
        Vec2::new(self.position.x + half, self.position.y + half)
    }

    pub fn set_center(&mut self, center: Vec2) {
        let half = self.half_size();
        self.position = Vec2::new(center.x - half, center.y - half);
    }

    /// Derived navigation state, in priority order
    pub fn nav_state(&self) -> NavState {
        if self.flags.squished {
            NavState::Destroyed
        } else if self.turn.is_some() {
            NavState::Turning
        } else if self.crossing.is_some() {
            NavState::CrossingIntersection
        } else if self.flags.stopped_for_intersection {
            NavState::StoppedAtIntersection
        } else if self.flags.approaching_intersection {
            NavState::ApproachingIntersection
        } else {
            NavState::Traveling
        }
    }

    /// Retire the agent. Repeated calls are harmless.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.velocity = Velocity::ZERO;
    }

    /// Mark the agent destroyed by an impact. Returns false when it already was.
    pub fn squish(&mut self) -> bool {
        if self.flags.squished || !self.active {
            return false;
        }
        self.flags.squished = true;
        self.velocity = Velocity::ZERO;
        self.turn = None;
        self.crossing = None;
        true
    }

    /// Advance the wreck timer; true once the crash has played out
    pub fn advance_crash(&mut self, delta_ms: u32) -> bool {
        self.crash_elapsed_ms = self.crash_elapsed_ms.saturating_add(delta_ms);
        self.crash_elapsed_ms >= CRASH_DURATION_MS
    }

    pub fn step(&mut self) {
        self.position.x += self.velocity.x as f32;
        self.position.y += self.velocity.y as f32;
    }

    /// Advance the walk cycle; true when the pedestrian takes a step this tick
    pub fn advance_walk(&mut self, delta_ms: u32) -> bool {
        self.walk_elapsed_ms = self.walk_elapsed_ms.saturating_add(delta_ms);
        if self.walk_elapsed_ms < WALK_STEP_MS {
            return false;
        }
        self.walk_elapsed_ms = 0;
        self.walk_frame = (self.walk_frame + 1) % WALK_FRAMES;
        true
    }

    /// Ignore stop points for `ms`
    pub fn hold_recheck(&mut self, ms: u32) {
        self.recheck_ms = ms;
    }

    /// Whether stop points and target advancement are honoured this tick
    pub fn can_check_intersection(&self) -> bool {
        self.recheck_ms == 0
    }

    pub fn run_timers(&mut self, delta_ms: u32) {
        self.recheck_ms = self.recheck_ms.saturating_sub(delta_ms);
    }

    /// Apply queued speed changes. A slow-down removes one unit of speed once
    /// its 150 ms gate opens and never brings a moving vehicle below one unit;
    /// a speed-up adds one unit per 200 ms until full speed. A queued
    /// slow-down cancels any queued speed-up.
    pub fn apply_speed_changes(&mut self, delta_ms: u32) {
        let speed = self.velocity.magnitude();
        if speed <= 1 {
            self.flags.slow_down_queued = false;
        }

        if self.flags.slow_down_queued {
            self.flags.speed_up_queued = false;
            self.speed_up_elapsed_ms = 0;
            if self.slow_down_elapsed_ms < SLOW_DOWN_COOLDOWN_MS {
                self.slow_down_elapsed_ms = self.slow_down_elapsed_ms.saturating_add(delta_ms);
            } else {
                self.velocity = Velocity::along(self.heading, speed - 1);
                self.flags.slow_down_queued = false;
                self.slow_down_elapsed_ms = 0;
            }
        } else if self.flags.speed_up_queued {
            if speed >= MAX_VEHICLE_SPEED {
                self.flags.speed_up_queued = false;
                self.speed_up_elapsed_ms = 0;
            } else if self.speed_up_elapsed_ms < SPEED_UP_COOLDOWN_MS {
                self.speed_up_elapsed_ms = self.speed_up_elapsed_ms.saturating_add(delta_ms);
            } else {
                self.velocity = Velocity::along(self.heading, speed + 1);
                self.speed_up_elapsed_ms = 0;
                if speed + 1 >= MAX_VEHICLE_SPEED {
                    self.flags.speed_up_queued = false;
                }
            }
        }
    }
}
