//! Node tables for roads and intersections
//!
//! Every road entity carries a fixed set of local anchor points measured from
//! its top-left corner: sidewalk waypoints and lane centres for roads, corner
//! waypoints and stop points for intersections. Anchors are addressed through
//! tagged roles instead of raw slot numbers; a slot that a variant does not
//! use is `None` and can never be dereferenced by accident.

use super::types::{Heading, Vec2};

/// Anchor slots on a road
pub const ROAD_NODE_COUNT: usize = 6;

/// Anchor slots on an intersection
pub const INTERSECTION_NODE_COUNT: usize = 12;

/// Most lanes a road carries in one direction
pub const MAX_LANES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoadWidth {
    TwoLane,
    FourLane,
}

impl RoadWidth {
    /// Lanes per direction of travel
    pub fn lanes(&self) -> usize {
        match self {
            RoadWidth::TwoLane => 1,
            RoadWidth::FourLane => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Whether traffic on this orientation moves along `heading`
    pub fn carries(&self, heading: Heading) -> bool {
        match self {
            Orientation::Horizontal => heading.is_horizontal(),
            Orientation::Vertical => !heading.is_horizontal(),
        }
    }
}

/// Which sides of an intersection connect to a road. Top and bottom always
/// connect; three-way intersections drop the left or the right arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntersectionShape {
    FourWay,
    ThreeWayNoLeft,
    ThreeWayNoRight,
}

impl IntersectionShape {
    pub fn connects(&self, side: Heading) -> bool {
        !matches!(
            (self, side),
            (IntersectionShape::ThreeWayNoLeft, Heading::Left)
                | (IntersectionShape::ThreeWayNoRight, Heading::Right)
        )
    }
}

/// Explicit key for an intersection: the width of the horizontal road it
/// joins, the width of the vertical road it joins, and its shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntersectionVariant {
    pub horizontal: RoadWidth,
    pub vertical: RoadWidth,
    pub shape: IntersectionShape,
}

impl IntersectionVariant {
    /// Width of the road carrying traffic in `heading`
    pub fn width_for(&self, heading: Heading) -> RoadWidth {
        if heading.is_horizontal() {
            self.horizontal
        } else {
            self.vertical
        }
    }

    /// Every variant the generator can produce
    pub fn all() -> Vec<IntersectionVariant> {
        let widths = [RoadWidth::TwoLane, RoadWidth::FourLane];
        let shapes = [
            IntersectionShape::FourWay,
            IntersectionShape::ThreeWayNoLeft,
            IntersectionShape::ThreeWayNoRight,
        ];
        let mut variants = Vec::new();
        for horizontal in widths {
            for vertical in widths {
                for shape in shapes {
                    variants.push(IntersectionVariant {
                        horizontal,
                        vertical,
                        shape,
                    });
                }
            }
        }
        variants
    }
}

/// Sidewalk of a road: `Near` runs along the top (horizontal) or left
/// (vertical) edge, `Far` along the bottom or right edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sidewalk {
    Near,
    Far,
}

/// Pedestrian corner of an intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopRight,
    BottomRight,
    TopLeft,
    BottomLeft,
}

/// How a pedestrian crosses from one corner to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingKind {
    /// Across the horizontal road (top corner to bottom corner)
    Vertical,
    /// Across the vertical road (left corner to right corner)
    Horizontal,
    Diagonal,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopRight,
        Corner::BottomRight,
        Corner::TopLeft,
        Corner::BottomLeft,
    ];

    pub fn across(&self, kind: CrossingKind) -> Corner {
        use Corner::*;
        match (kind, *self) {
            (CrossingKind::Vertical, TopRight) => BottomRight,
            (CrossingKind::Vertical, BottomRight) => TopRight,
            (CrossingKind::Vertical, TopLeft) => BottomLeft,
            (CrossingKind::Vertical, BottomLeft) => TopLeft,
            (CrossingKind::Horizontal, TopRight) => TopLeft,
            (CrossingKind::Horizontal, TopLeft) => TopRight,
            (CrossingKind::Horizontal, BottomRight) => BottomLeft,
            (CrossingKind::Horizontal, BottomLeft) => BottomRight,
            (CrossingKind::Diagonal, TopRight) => BottomLeft,
            (CrossingKind::Diagonal, BottomLeft) => TopRight,
            (CrossingKind::Diagonal, TopLeft) => BottomRight,
            (CrossingKind::Diagonal, BottomRight) => TopLeft,
        }
    }

    /// The two arms a pedestrian standing on this corner can walk onto
    pub fn exits(&self) -> [Heading; 2] {
        match self {
            Corner::TopRight => [Heading::Up, Heading::Right],
            Corner::BottomRight => [Heading::Down, Heading::Right],
            Corner::TopLeft => [Heading::Up, Heading::Left],
            Corner::BottomLeft => [Heading::Down, Heading::Left],
        }
    }

    /// Corner a right-turning vehicle pivots around, keyed by its heading
    /// before the turn
    pub fn pivot_for(heading: Heading) -> Corner {
        match heading {
            Heading::Right => Corner::BottomLeft,
            Heading::Down => Corner::TopLeft,
            Heading::Left => Corner::TopRight,
            Heading::Up => Corner::BottomRight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoadNode {
    Walk(Sidewalk),
    /// Lane centre for traffic moving in `heading`; lane 0 is the curb lane
    Lane { heading: Heading, lane: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntersectionNode {
    Walk(Corner),
    /// Stop point for traffic entering while moving in `heading`
    Stop { heading: Heading, lane: usize },
}

/// A tagged anchor role on either kind of road entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Road(RoadNode),
    Intersection(IntersectionNode),
}

impl RoadNode {
    /// Slot in the road table for this role on a road of `orientation`
    pub fn slot(&self, orientation: Orientation) -> Option<usize> {
        match *self {
            RoadNode::Walk(Sidewalk::Far) => Some(0),
            RoadNode::Walk(Sidewalk::Near) => Some(1),
            RoadNode::Lane { heading, lane } => {
                if lane >= MAX_LANES || !orientation.carries(heading) {
                    return None;
                }
                match heading {
                    Heading::Right | Heading::Up => Some(2 + lane),
                    Heading::Left | Heading::Down => Some(4 + lane),
                }
            }
        }
    }

    /// Every role, in slot order for a road of `orientation`
    pub fn all(orientation: Orientation) -> Vec<RoadNode> {
        let (forward, backward) = match orientation {
            Orientation::Horizontal => (Heading::Right, Heading::Left),
            Orientation::Vertical => (Heading::Up, Heading::Down),
        };
        let mut roles = vec![RoadNode::Walk(Sidewalk::Far), RoadNode::Walk(Sidewalk::Near)];
        for heading in [forward, backward] {
            for lane in 0..MAX_LANES {
                roles.push(RoadNode::Lane { heading, lane });
            }
        }
        roles
    }
}

impl IntersectionNode {
    pub fn slot(&self) -> Option<usize> {
        match *self {
            IntersectionNode::Walk(corner) => Some(match corner {
                Corner::TopRight => 0,
                Corner::BottomRight => 1,
                Corner::TopLeft => 2,
                Corner::BottomLeft => 3,
            }),
            IntersectionNode::Stop { heading, lane } => {
                if lane >= MAX_LANES {
                    return None;
                }
                let base = match heading {
                    Heading::Down => 4,
                    Heading::Up => 6,
                    Heading::Right => 8,
                    Heading::Left => 10,
                };
                Some(base + lane)
            }
        }
    }

    /// Every role, in slot order
    pub fn all() -> Vec<IntersectionNode> {
        let mut roles: Vec<IntersectionNode> =
            Corner::ALL.iter().map(|c| IntersectionNode::Walk(*c)).collect();
        for heading in [Heading::Down, Heading::Up, Heading::Right, Heading::Left] {
            for lane in 0..MAX_LANES {
                roles.push(IntersectionNode::Stop { heading, lane });
            }
        }
        roles
    }
}

type Slot = Option<(i32, i32)>;

// Horizontal roads; vertical roads use the same offsets with x and y swapped.
// Order: far walk, near walk, forward lanes 0/1, backward lanes 0/1.
const ROAD_TWO_LANE: [Slot; ROAD_NODE_COUNT] =
    [Some((0, 56)), Some((0, 20)), Some((0, 45)), None, Some((0, 30)), None];

const ROAD_FOUR_LANE: [Slot; ROAD_NODE_COUNT] = [
    Some((0, 69)),
    Some((0, 7)),
    Some((0, 58)),
    Some((0, 46)),
    Some((0, 17)),
    Some((0, 31)),
];

// Intersection footprints keyed by (horizontal, vertical) width.
// Order: corners TR, BR, TL, BL; stops down 0/1, up 0/1, right 0/1, left 0/1.
const CROSS_2X2: [Slot; INTERSECTION_NODE_COUNT] = [
    Some((56, 18)),
    Some((56, 58)),
    Some((17, 18)),
    Some((17, 58)),
    Some((30, 4)),
    None,
    Some((45, 71)),
    None,
    Some((3, 45)),
    None,
    Some((71, 30)),
    None,
];

const CROSS_2X4: [Slot; INTERSECTION_NODE_COUNT] = [
    Some((69, 20)),
    Some((69, 56)),
    Some((7, 20)),
    Some((7, 56)),
    Some((17, 4)),
    Some((30, 4)),
    Some((58, 71)),
    Some((45, 71)),
    Some((-7, 45)),
    None,
    Some((84, 30)),
    None,
];

const CROSS_4X2: [Slot; INTERSECTION_NODE_COUNT] = [
    Some((56, 7)),
    Some((56, 69)),
    Some((17, 7)),
    Some((17, 69)),
    Some((30, -7)),
    None,
    Some((45, 84)),
    None,
    Some((3, 58)),
    Some((3, 46)),
    Some((71, 17)),
    Some((71, 31)),
];

const CROSS_4X4: [Slot; INTERSECTION_NODE_COUNT] = [
    Some((69, 7)),
    Some((69, 69)),
    Some((7, 7)),
    Some((7, 69)),
    Some((17, -7)),
    Some((30, -7)),
    Some((58, 84)),
    Some((45, 84)),
    Some((-7, 58)),
    Some((-7, 46)),
    Some((84, 17)),
    Some((84, 31)),
];

fn to_vec(slot: Slot) -> Option<Vec2> {
    slot.map(|(x, y)| Vec2::new(x as f32, y as f32))
}

/// Local anchors of a road
pub fn road_nodes(width: RoadWidth, orientation: Orientation) -> [Option<Vec2>; ROAD_NODE_COUNT] {
    let table = match width {
        RoadWidth::TwoLane => ROAD_TWO_LANE,
        RoadWidth::FourLane => ROAD_FOUR_LANE,
    };
    table.map(|slot| {
        let slot = match orientation {
            Orientation::Horizontal => slot,
            Orientation::Vertical => slot.map(|(x, y)| (y, x)),
        };
        to_vec(slot)
    })
}

/// Local anchors of an intersection. Stop points on a missing arm are `None`.
pub fn intersection_nodes(variant: IntersectionVariant) -> [Option<Vec2>; INTERSECTION_NODE_COUNT] {
    let table = match (variant.horizontal, variant.vertical) {
        (RoadWidth::TwoLane, RoadWidth::TwoLane) => CROSS_2X2,
        (RoadWidth::TwoLane, RoadWidth::FourLane) => CROSS_2X4,
        (RoadWidth::FourLane, RoadWidth::TwoLane) => CROSS_4X2,
        (RoadWidth::FourLane, RoadWidth::FourLane) => CROSS_4X4,
    };
    let mut nodes = table.map(to_vec);
    for role in IntersectionNode::all() {
        if let IntersectionNode::Stop { heading, .. } = role {
            // Traffic moving in `heading` enters through the opposite side.
            if !variant.shape.connects(heading.opposite()) {
                if let Some(slot) = role.slot() {
                    nodes[slot] = None;
                }
            }
        }
    }
    nodes
}

/// Cross-axis offset of a lane centre: y for horizontal traffic, x for
/// vertical traffic
pub fn lane_offset(width: RoadWidth, heading: Heading, lane: usize) -> Option<f32> {
    let orientation = if heading.is_horizontal() {
        Orientation::Horizontal
    } else {
        Orientation::Vertical
    };
    let slot = RoadNode::Lane { heading, lane }.slot(orientation)?;
    let anchor = road_nodes(width, orientation)[slot]?;
    Some(match orientation {
        Orientation::Horizontal => anchor.y,
        Orientation::Vertical => anchor.x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_has_corners_and_connected_stops() {
        for variant in IntersectionVariant::all() {
            let nodes = intersection_nodes(variant);
            for corner in Corner::ALL {
                let slot = IntersectionNode::Walk(corner).slot().unwrap();
                assert!(nodes[slot].is_some(), "{:?} missing {:?}", variant, corner);
            }
            for heading in Heading::ALL {
                let stop = IntersectionNode::Stop { heading, lane: 0 }.slot().unwrap();
                let connected = variant.shape.connects(heading.opposite());
                assert_eq!(nodes[stop].is_some(), connected, "{:?} {:?}", variant, heading);
            }
        }
    }

    #[test]
    fn test_stop_points_line_up_with_lanes() {
        for variant in IntersectionVariant::all() {
            let nodes = intersection_nodes(variant);
            for heading in Heading::ALL {
                let width = variant.width_for(heading);
                for lane in 0..width.lanes() {
                    let slot = IntersectionNode::Stop { heading, lane }.slot().unwrap();
                    let Some(stop) = nodes[slot] else { continue };
                    let offset = lane_offset(width, heading, lane).unwrap();
                    let cross = if heading.is_horizontal() { stop.y } else { stop.x };
                    assert!((cross - offset).abs() <= 1.0, "{:?} {:?} {}", variant, heading, lane);
                }
            }
        }
    }

    #[test]
    fn test_two_lane_roads_leave_inner_lane_slots_empty() {
        let nodes = road_nodes(RoadWidth::TwoLane, Orientation::Vertical);
        let inner = RoadNode::Lane { heading: Heading::Up, lane: 1 }
            .slot(Orientation::Vertical)
            .unwrap();
        assert!(nodes[inner].is_none());
        assert_eq!(nodes[1], Some(Vec2::new(20.0, 0.0)));
    }

    #[test]
    fn test_lane_roles_reject_cross_traffic() {
        let role = RoadNode::Lane { heading: Heading::Down, lane: 0 };
        assert_eq!(role.slot(Orientation::Horizontal), None);
        assert_eq!(role.slot(Orientation::Vertical), Some(4));
    }

    #[test]
    fn test_lane_offsets_follow_right_hand_traffic() {
        assert_eq!(lane_offset(RoadWidth::TwoLane, Heading::Right, 0), Some(45.0));
        assert_eq!(lane_offset(RoadWidth::TwoLane, Heading::Left, 0), Some(30.0));
        assert_eq!(lane_offset(RoadWidth::FourLane, Heading::Down, 1), Some(31.0));
        assert_eq!(lane_offset(RoadWidth::TwoLane, Heading::Up, 1), None);
    }

    #[test]
    fn test_crossings_return_to_start() {
        for corner in Corner::ALL {
            for kind in [CrossingKind::Vertical, CrossingKind::Horizontal, CrossingKind::Diagonal] {
                assert_eq!(corner.across(kind).across(kind), corner);
                assert_ne!(corner.across(kind), corner);
            }
        }
    }
}
