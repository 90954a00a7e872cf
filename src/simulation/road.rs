//! Placed map entities: roads, intersections and buildings

use super::error::{SimError, SimResult};
use super::node_table::{
    intersection_nodes, road_nodes, IntersectionNode, IntersectionVariant, NodeRole, Orientation,
    RoadNode, RoadWidth,
};
use super::types::{
    BuildingId, GridCoord, Heading, Rect, RoadId, Vec2, BUILDING_EXPLODE_DAMAGE, COLUMN_WIDTH,
    ENTITY_SIZE, MAX_BUILDING_DAMAGE, ROAD_FADE_IN_MS, ROW_HEIGHT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoadKind {
    Road(Orientation),
    Intersection(IntersectionVariant),
}

/// A road segment or intersection occupying one road unit of the grid
#[derive(Debug, Clone)]
pub struct RoadEntity {
    pub id: RoadId,
    /// Top-left grid cell
    pub coord: GridCoord,
    /// Lane width class; the horizontal width for intersections
    pub width: RoadWidth,
    pub kind: RoadKind,
    /// World-space bounding box
    pub bounds: Rect,
    /// Fade-in opacity in [0, 1], only read by renderers
    pub opacity: f32,
    nodes: Vec<Option<Vec2>>,
}

impl RoadEntity {
    pub fn new(id: RoadId, coord: GridCoord, width: RoadWidth, kind: RoadKind) -> Self {
        let nodes = match kind {
            RoadKind::Road(orientation) => road_nodes(width, orientation).to_vec(),
            RoadKind::Intersection(variant) => intersection_nodes(variant).to_vec(),
        };
        let origin = coord.world_origin();
        Self {
            id,
            coord,
            width,
            kind,
            bounds: Rect::new(
                origin.x as i32,
                origin.y as i32,
                ENTITY_SIZE,
                ENTITY_SIZE,
            ),
            opacity: 0.0,
            nodes,
        }
    }

    pub fn is_intersection(&self) -> bool {
        matches!(self.kind, RoadKind::Intersection(_))
    }

    pub fn orientation(&self) -> Option<Orientation> {
        match self.kind {
            RoadKind::Road(orientation) => Some(orientation),
            RoadKind::Intersection(_) => None,
        }
    }

    pub fn variant(&self) -> Option<IntersectionVariant> {
        match self.kind {
            RoadKind::Intersection(variant) => Some(variant),
            RoadKind::Road(_) => None,
        }
    }

    /// World-space top-left corner
    pub fn origin(&self) -> Vec2 {
        self.coord.world_origin()
    }

    /// Whether the side facing `side` joins a neighbouring road
    pub fn connects(&self, side: Heading) -> bool {
        match self.kind {
            RoadKind::Road(orientation) => orientation.carries(side),
            RoadKind::Intersection(variant) => variant.shape.connects(side),
        }
    }

    fn slot(&self, role: NodeRole) -> Option<usize> {
        match (self.kind, role) {
            (RoadKind::Road(orientation), NodeRole::Road(node)) => node.slot(orientation),
            (RoadKind::Intersection(_), NodeRole::Intersection(node)) => node.slot(),
            _ => None,
        }
    }

    /// World-space anchor for `role`, or `None` when this entity does not
    /// define it
    pub fn anchor(&self, role: NodeRole) -> Option<Vec2> {
        let local = self.slot(role).and_then(|slot| self.nodes.get(slot).copied().flatten())?;
        Some(self.origin() + local)
    }

    pub fn require_anchor(&self, role: NodeRole) -> SimResult<Vec2> {
        self.anchor(role).ok_or_else(|| {
            SimError::InvalidAgentState(format!("{:?} is not defined on entity at {}", role, self.coord))
        })
    }

    /// Every role with a defined anchor on this entity
    pub fn roles(&self) -> Vec<NodeRole> {
        let candidates: Vec<NodeRole> = match self.kind {
            RoadKind::Road(orientation) => RoadNode::all(orientation)
                .into_iter()
                .map(NodeRole::Road)
                .collect(),
            RoadKind::Intersection(_) => IntersectionNode::all()
                .into_iter()
                .map(NodeRole::Intersection)
                .collect(),
        };
        candidates
            .into_iter()
            .filter(|role| self.anchor(*role).is_some())
            .collect()
    }

    /// Advance the fade-in
    pub fn fade_in(&mut self, delta_ms: u32) {
        if self.opacity < 1.0 {
            self.opacity = (self.opacity + delta_ms as f32 / ROAD_FADE_IN_MS as f32).min(1.0);
        }
    }
}

/// Facade sprite of a building; `DoubleWide` spans two columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildingStyle {
    RedSlim,
    YellowSlim,
    FancySlim,
    GreyTwoStory,
    YellowTwoStory,
    DoubleWide,
}

impl BuildingStyle {
    pub const ALL: [BuildingStyle; 6] = [
        BuildingStyle::RedSlim,
        BuildingStyle::YellowSlim,
        BuildingStyle::FancySlim,
        BuildingStyle::GreyTwoStory,
        BuildingStyle::YellowTwoStory,
        BuildingStyle::DoubleWide,
    ];

    pub fn from_index(index: usize) -> BuildingStyle {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn span(&self) -> usize {
        match self {
            BuildingStyle::DoubleWide => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Building {
    pub id: BuildingId,
    pub coord: GridCoord,
    pub style: BuildingStyle,
    /// True when the road it fronts is above it
    pub facing_up: bool,
    pub bounds: Rect,
    pub damage: u32,
}

impl Building {
    pub fn new(id: BuildingId, coord: GridCoord, style: BuildingStyle, facing_up: bool) -> Self {
        let origin = coord.world_origin();
        Self {
            id,
            coord,
            style,
            facing_up,
            bounds: Rect::new(
                origin.x as i32,
                origin.y as i32,
                COLUMN_WIDTH * style.span() as i32,
                ROW_HEIGHT,
            ),
            damage: 0,
        }
    }

    pub fn span(&self) -> usize {
        self.style.span()
    }

    /// Apply damage up to the cap; returns the amount actually taken
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let before = self.damage;
        self.damage = (self.damage + amount).min(MAX_BUILDING_DAMAGE);
        self.damage - before
    }

    pub fn is_exploded(&self) -> bool {
        self.damage >= BUILDING_EXPLODE_DAMAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::node_table::{IntersectionShape, Sidewalk};

    #[test]
    fn test_anchor_is_offset_by_origin() {
        let road = RoadEntity::new(
            RoadId(0),
            GridCoord::new(1, 8),
            RoadWidth::TwoLane,
            RoadKind::Road(Orientation::Horizontal),
        );
        let walk = road.anchor(NodeRole::Road(RoadNode::Walk(Sidewalk::Near))).unwrap();
        assert_eq!(walk, Vec2::new(160.0, 100.0));
        assert_eq!(road.bounds, Rect::new(160, 80, 82, 82));
    }

    #[test]
    fn test_roles_skip_missing_arms() {
        let variant = IntersectionVariant {
            horizontal: RoadWidth::TwoLane,
            vertical: RoadWidth::TwoLane,
            shape: IntersectionShape::ThreeWayNoLeft,
        };
        let cross = RoadEntity::new(
            RoadId(0),
            GridCoord::new(0, 0),
            RoadWidth::TwoLane,
            RoadKind::Intersection(variant),
        );
        let from_left = NodeRole::Intersection(IntersectionNode::Stop {
            heading: Heading::Right,
            lane: 0,
        });
        assert!(cross.anchor(from_left).is_none());
        assert!(cross.require_anchor(from_left).is_err());
        assert!(!cross.roles().contains(&from_left));
        // four corners plus the three connected arms of a two-lane cross
        assert_eq!(cross.roles().len(), 7);
        assert!(!cross.connects(Heading::Left));
    }

    #[test]
    fn test_road_roles_do_not_resolve_on_intersections() {
        let variant = IntersectionVariant {
            horizontal: RoadWidth::FourLane,
            vertical: RoadWidth::FourLane,
            shape: IntersectionShape::FourWay,
        };
        let cross = RoadEntity::new(
            RoadId(0),
            GridCoord::new(0, 0),
            RoadWidth::FourLane,
            RoadKind::Intersection(variant),
        );
        assert!(cross
            .anchor(NodeRole::Road(RoadNode::Walk(Sidewalk::Far)))
            .is_none());
        assert_eq!(cross.roles().len(), 12);
    }

    #[test]
    fn test_building_damage_is_capped() {
        let mut building = Building::new(
            BuildingId(0),
            GridCoord::new(1, 0),
            BuildingStyle::DoubleWide,
            true,
        );
        assert_eq!(building.bounds.w, 40);
        assert_eq!(building.apply_damage(3), 3);
        assert!(building.is_exploded());
        assert_eq!(building.apply_damage(3), 1);
        assert_eq!(building.apply_damage(1), 0);
    }
}
