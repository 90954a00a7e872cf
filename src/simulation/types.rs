//! Core types for the city simulation
//!
//! Identifiers, integer grid coordinates, world-space geometry and the
//! tuning constants shared by the generator, the agents and the spawner.

use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::ops::{Add, Sub};

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for agent IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub SimId);

/// Index of a road or intersection in `CityMap::roads`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoadId(pub usize);

/// Index of a building in `CityMap::buildings`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildingId(pub usize);

/// A (row, column) cell of the city grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub row: usize,
    pub col: usize,
}

impl GridCoord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Offset by a signed number of rows and columns. Returns `None` when the
    /// result would be negative; the upper bound is checked by the grid.
    pub fn offset(&self, d_row: isize, d_col: isize) -> Option<GridCoord> {
        let row = self.row.checked_add_signed(d_row)?;
        let col = self.col.checked_add_signed(d_col)?;
        Some(GridCoord { row, col })
    }

    /// Top-left corner of this cell in world units
    pub fn world_origin(&self) -> Vec2 {
        Vec2::new(
            (self.col as i32 * COLUMN_WIDTH) as f32,
            (self.row as i32 * ROW_HEIGHT) as f32,
        )
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A 2D point or offset in world units (x grows right, y grows down)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn length(&self) -> f32 {
        self.distance(&Vec2::default())
    }

    /// Angle of this vector measured clockwise from +x (screen coordinates)
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// An axis-aligned integer rectangle in world units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// The 1x1 rectangle used to hit-test an anchor point
    pub fn point(p: Vec2) -> Self {
        Self::new(p.x.round() as i32, p.y.round() as i32, 1, 1)
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.x as f32 + self.w as f32 / 2.0,
            self.y as f32 + self.h as f32 / 2.0,
        )
    }

    /// Half-open overlap test; rectangles that only share an edge do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        other.left() < self.right()
            && self.left() < other.right()
            && other.top() < self.bottom()
            && self.top() < other.bottom()
    }

    /// True when `other` lies completely inside this rectangle
    pub fn contains(&self, other: &Rect) -> bool {
        self.left() <= other.left()
            && other.right() <= self.right()
            && self.top() <= other.top()
            && other.bottom() <= self.bottom()
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Smallest rectangle covering both; an empty rectangle is ignored
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }
}

/// One of the four grid directions. Sides of an entity are named by the
/// direction that points out of them (the `Left` side faces `Heading::Left`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heading {
    Up,
    Down,
    Left,
    Right,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::Up, Heading::Down, Heading::Left, Heading::Right];

    /// Unit step as (dx, dy)
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Heading::Up => (0, -1),
            Heading::Down => (0, 1),
            Heading::Left => (-1, 0),
            Heading::Right => (1, 0),
        }
    }

    pub fn opposite(&self) -> Heading {
        match self {
            Heading::Up => Heading::Down,
            Heading::Down => Heading::Up,
            Heading::Left => Heading::Right,
            Heading::Right => Heading::Left,
        }
    }

    /// The heading after a 90 degree clockwise (right) turn
    pub fn turn_right(&self) -> Heading {
        match self {
            Heading::Right => Heading::Down,
            Heading::Down => Heading::Left,
            Heading::Left => Heading::Up,
            Heading::Up => Heading::Right,
        }
    }

    pub fn is_horizontal(&self) -> bool {
        matches!(self, Heading::Left | Heading::Right)
    }

    /// Sprite rotation in radians, clockwise from facing right
    pub fn angle(&self) -> f32 {
        match self {
            Heading::Right => 0.0,
            Heading::Down => FRAC_PI_2,
            Heading::Left => PI,
            Heading::Up => -FRAC_PI_2,
        }
    }

    /// Heading of a non-zero axis-aligned velocity
    pub fn from_velocity(velocity: Velocity) -> Option<Heading> {
        match (velocity.x.signum(), velocity.y.signum()) {
            (1, 0) => Some(Heading::Right),
            (-1, 0) => Some(Heading::Left),
            (0, 1) => Some(Heading::Down),
            (0, -1) => Some(Heading::Up),
            _ => None,
        }
    }
}

/// Discrete per-tick velocity in world units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Velocity {
    pub x: i32,
    pub y: i32,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// `speed` units per tick along `heading`
    pub fn along(heading: Heading, speed: i32) -> Self {
        let (dx, dy) = heading.delta();
        Self::new(dx * speed, dy * speed)
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Manhattan magnitude; equals the speed for axis-aligned motion
    pub fn magnitude(&self) -> i32 {
        self.x.abs() + self.y.abs()
    }
}

/// Width of one grid column in world units
pub const COLUMN_WIDTH: i32 = 20;

/// Height of one grid row in world units
pub const ROW_HEIGHT: i32 = 80;

/// Number of columns spanned by one road or intersection
pub const ROAD_UNIT: usize = 4;

/// Side length of a road or intersection bounding box (slightly larger than a
/// 80x80 unit so neighbouring entities overlap by two units)
pub const ENTITY_SIZE: i32 = 82;

/// Side length of a vehicle bounding box
pub const VEHICLE_SIZE: i32 = 26;

/// Inset of the vehicle collision box from its bounding box
pub const VEHICLE_COLLISION_INSET: i32 = 5;

/// Side length of a pedestrian bounding box
pub const PEDESTRIAN_SIZE: i32 = 20;

/// Offset of the pedestrian's walk point (feet) from the top-left of its box
pub const PEDESTRIAN_FOOT_OFFSET: (i32, i32) = (10, 15);

/// Maximum per-axis vehicle speed in units per tick
pub const MAX_VEHICLE_SPEED: i32 = 3;

/// Pedestrian speed in units per walk step
pub const PEDESTRIAN_SPEED: i32 = 1;

/// Simulated milliseconds between pedestrian walk steps
pub const WALK_STEP_MS: u32 = 125;

/// Frames in a pedestrian walk cycle
pub const WALK_FRAMES: u8 = 4;

/// Cooldown before a queued slow-down is applied
pub const SLOW_DOWN_COOLDOWN_MS: u32 = 150;

/// Cooldown between speed-up increments
pub const SPEED_UP_COOLDOWN_MS: u32 = 200;

/// Time a released vehicle ignores intersection stop points
pub const INTERSECTION_RECHECK_MS: u32 = 500;

/// Time a squished vehicle stays on the map as a wreck
pub const CRASH_DURATION_MS: u32 = 400;

/// Look-ahead probe offsets along the heading (near, middle, far)
pub const PROBE_OFFSETS: [i32; 3] = [5, 15, 35];

/// Heading change per tick while a vehicle turns
pub const TURN_STEP_RADIANS: f32 = PI / 100.0;

/// Time a freshly generated road takes to fade in
pub const ROAD_FADE_IN_MS: u32 = 1000;

/// Period of the boundary spawner
pub const SPAWN_PERIOD_MS: u32 = 3000;

/// Concurrent pedestrian cap
pub const MAX_PEDESTRIANS: usize = 20;

/// Concurrent vehicle cap
pub const MAX_VEHICLES: usize = 15;

/// Each candidate spawn node fires with probability 1 / SPAWN_CHANCE
pub const SPAWN_CHANCE: u32 = 10;

/// How far past the world edge an agent may travel before it is retired
pub const OUT_OF_BOUNDS_MARGIN: i32 = 30;

/// Initially placed vehicles closer than this to the world edge are rejected
pub const EDGE_SPAWN_CLEARANCE: i32 = 10;

/// Damage at which a building counts as exploded
pub const BUILDING_EXPLODE_DAMAGE: u32 = 3;

/// Damage cap for a building
pub const MAX_BUILDING_DAMAGE: u32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_touching_edges_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&b.translate(-1, 0)));
    }

    #[test]
    fn test_rect_union_ignores_empty() {
        let a = Rect::new(5, 5, 10, 10);
        assert_eq!(Rect::default().union(&a), a);
        assert_eq!(a.union(&Rect::new(0, 20, 2, 2)), Rect::new(0, 5, 15, 17));
    }

    #[test]
    fn test_right_turns_cycle() {
        let mut heading = Heading::Right;
        for _ in 0..4 {
            heading = heading.turn_right();
        }
        assert_eq!(heading, Heading::Right);
        assert_eq!(Heading::Up.turn_right(), Heading::Right);
        assert_eq!(Heading::Right.turn_right(), Heading::Down);
    }

    #[test]
    fn test_heading_from_velocity() {
        assert_eq!(Heading::from_velocity(Velocity::new(3, 0)), Some(Heading::Right));
        assert_eq!(Heading::from_velocity(Velocity::new(0, -2)), Some(Heading::Up));
        assert_eq!(Heading::from_velocity(Velocity::ZERO), None);
    }

    #[test]
    fn test_grid_coord_offset_rejects_negative() {
        let coord = GridCoord::new(0, 4);
        assert_eq!(coord.offset(0, -4), Some(GridCoord::new(0, 0)));
        assert_eq!(coord.offset(-1, 0), None);
    }
}
