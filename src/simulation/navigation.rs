//! Per-tick pathing for vehicles and pedestrians
//!
//! Vehicles follow their lane from road to road, probing for traffic and
//! handing over to the intersection logic when they reach a stop point.
//! Pedestrians walk the sidewalks one unit per walk step; at an intersection
//! corner they either cross to another corner or walk off along one of the
//! corner's two arms.

use log::debug;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::agent::{Agent, Crossing, DeactivationReason, NodeAssignment};
use super::collision::{avoid_traffic, TrafficSample};
use super::error::{SimError, SimResult};
use super::generator::CityMap;
use super::intersection::{advance_turn, check_approach, check_stop, release_vehicle};
use super::node_table::{
    Corner, CrossingKind, IntersectionNode, NodeRole, Orientation, RoadNode, Sidewalk,
};
use super::road::RoadEntity;
use super::road_graph::RoadGraph;
use super::types::{GridCoord, Heading, Rect, Vec2, Velocity, PEDESTRIAN_SPEED};

/// Result of an agent update indicating what the world should do with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentUpdateResult {
    Continue,
    Deactivate(DeactivationReason),
}

/// Read-only state shared by every agent update within a tick
pub struct NavContext<'a> {
    pub map: &'a CityMap,
    pub graph: &'a RoadGraph,
    pub delta_ms: u32,
}

/// The lane (on roads) or stop point (on intersections) for `heading` and
/// `lane` at `cell`, falling back to the curb lane. `None` when the entity
/// defines neither.
pub fn lane_assignment(
    map: &CityMap,
    cell: GridCoord,
    heading: Heading,
    lane: usize,
) -> Option<NodeAssignment> {
    let road = map.road_at(cell)?;
    let role_for = |lane| {
        if road.is_intersection() {
            NodeRole::Intersection(IntersectionNode::Stop { heading, lane })
        } else {
            NodeRole::Road(RoadNode::Lane { heading, lane })
        }
    };
    [lane, 0]
        .into_iter()
        .map(role_for)
        .find(|role| road.anchor(*role).is_some())
        .map(|role| NodeAssignment {
            cell: road.coord,
            role,
        })
}

/// The sidewalk of `road` closest to `point`
fn sidewalk_assignment(road: &RoadEntity, point: Vec2) -> Option<NodeAssignment> {
    let orientation = road.orientation()?;
    [Sidewalk::Near, Sidewalk::Far]
        .into_iter()
        .map(|side| NodeRole::Road(RoadNode::Walk(side)))
        .filter_map(|role| road.anchor(role).map(|anchor| (role, anchor)))
        .min_by(|(_, a), (_, b)| {
            let da = cross_distance(orientation, *a, point);
            let db = cross_distance(orientation, *b, point);
            da.total_cmp(&db)
        })
        .map(|(role, _)| NodeAssignment {
            cell: road.coord,
            role,
        })
}

fn cross_distance(orientation: Orientation, anchor: Vec2, point: Vec2) -> f32 {
    match orientation {
        Orientation::Horizontal => (anchor.y - point.y).abs(),
        Orientation::Vertical => (anchor.x - point.x).abs(),
    }
}

fn target_entity<'a>(agent: &Agent, map: &'a CityMap) -> SimResult<&'a RoadEntity> {
    map.road_at(agent.target).ok_or_else(|| {
        SimError::InvalidAgentState(format!(
            "agent {:?} targets non-road cell {}",
            agent.id, agent.target
        ))
    })
}

/// Advance one vehicle by one tick
pub fn update_vehicle(
    agent: &mut Agent,
    ctx: &NavContext,
    traffic: &[TrafficSample],
) -> SimResult<AgentUpdateResult> {
    agent.run_timers(ctx.delta_ms);

    if agent.flags.stopped_for_intersection {
        return release_vehicle(agent, ctx.map);
    }
    if agent.turn.is_some() {
        return advance_turn(agent, ctx.map);
    }

    agent.apply_speed_changes(ctx.delta_ms);
    if !agent.flags.stopped_for_vehicle {
        agent.step();
    }

    // Move the target one cell ahead once the vehicle reaches a road target
    let target = target_entity(agent, ctx.map)?;
    if !target.is_intersection()
        && agent.can_check_intersection()
        && agent.bounds().intersects(&target.bounds)
    {
        let next = ctx
            .map
            .grid
            .step(agent.target, agent.heading)
            .filter(|cell| ctx.map.road_at(*cell).is_some());
        if let Some(next) = next {
            agent.start = agent.target;
            agent.target = next;
            agent.node = lane_assignment(ctx.map, next, agent.heading, agent.lane);
            if agent.node.is_none() {
                debug!("vehicle {:?} has no lane node at {}", agent.id, next);
            }
        }
    }

    avoid_traffic(agent, traffic);

    let target = target_entity(agent, ctx.map)?;
    if target.is_intersection() && agent.can_check_intersection() {
        check_approach(agent, target);
        check_stop(agent, target);
    }
    Ok(AgentUpdateResult::Continue)
}

/// Advance one pedestrian by one tick
pub fn update_pedestrian<R: Rng + ?Sized>(
    agent: &mut Agent,
    ctx: &NavContext,
    rng: &mut R,
) -> SimResult<AgentUpdateResult> {
    if agent.advance_walk(ctx.delta_ms) {
        if let Some(crossing) = agent.crossing {
            steer_toward(agent, crossing.target);
        }
        agent.step();
    }

    let target = target_entity(agent, ctx.map)?;

    if let Some(crossing) = agent.crossing {
        if agent.foot_box().intersects(&Rect::point(crossing.target)) {
            agent.crossing = None;
            agent.set_walk_point(crossing.target);
            agent.velocity = Velocity::ZERO;
            agent.node = Some(NodeAssignment {
                cell: target.coord,
                role: NodeRole::Intersection(IntersectionNode::Walk(crossing.to)),
            });
            leave_corner(agent, ctx, target, crossing.to, rng)?;
        }
    } else if target.is_intersection() {
        if !agent.flags.node_reached {
            if let Some(corner) = reached_corner(agent, target) {
                arrive_at_corner(agent, ctx, target, corner, rng)?;
            }
        }
    } else {
        agent.flags.node_reached = false;
        if agent.velocity.is_zero() {
            pick_road_exit(agent, ctx, target, rng);
        }
    }

    // Hand over to the next entity once this one is underfoot
    let waiting_for_corner = target.is_intersection() && !agent.flags.node_reached;
    if agent.crossing.is_none()
        && !waiting_for_corner
        && !agent.velocity.is_zero()
        && agent.bounds().intersects(&target.bounds)
    {
        if let Some(next) = ctx
            .graph
            .exit_toward(target.id, agent.heading)
            .and_then(|id| ctx.map.road(id))
        {
            agent.start = target.coord;
            agent.target = next.coord;
            if let Some(node) = sidewalk_assignment(next, agent.walk_point()) {
                agent.node = Some(node);
            }
        }
    }

    Ok(AgentUpdateResult::Continue)
}

fn reached_corner(agent: &Agent, cross: &RoadEntity) -> Option<Corner> {
    let feet = agent.foot_box();
    Corner::ALL.into_iter().find(|corner| {
        cross
            .anchor(NodeRole::Intersection(IntersectionNode::Walk(*corner)))
            .is_some_and(|anchor| feet.intersects(&Rect::point(anchor)))
    })
}

/// Lock onto a corner and decide what to do next: one time in four walk off
/// along an arm, otherwise cross vertically, horizontally or diagonally
fn arrive_at_corner<R: Rng + ?Sized>(
    agent: &mut Agent,
    ctx: &NavContext,
    cross: &RoadEntity,
    corner: Corner,
    rng: &mut R,
) -> SimResult<()> {
    let role = NodeRole::Intersection(IntersectionNode::Walk(corner));
    let anchor = cross.require_anchor(role)?;
    agent.set_walk_point(anchor);
    agent.velocity = Velocity::ZERO;
    agent.flags.node_reached = true;
    agent.node = Some(NodeAssignment {
        cell: cross.coord,
        role,
    });

    match rng.random_range(0..4) {
        0 => leave_corner(agent, ctx, cross, corner, rng),
        1 => start_crossing(agent, cross, corner, CrossingKind::Vertical),
        2 => start_crossing(agent, cross, corner, CrossingKind::Horizontal),
        _ => start_crossing(agent, cross, corner, CrossingKind::Diagonal),
    }
}

/// Walk off along one of the corner's arms, preferring one that does not
/// lead back where the pedestrian came from. Crosses diagonally when the
/// corner has no open arm.
fn leave_corner<R: Rng + ?Sized>(
    agent: &mut Agent,
    ctx: &NavContext,
    cross: &RoadEntity,
    corner: Corner,
    rng: &mut R,
) -> SimResult<()> {
    let open: Vec<(Heading, GridCoord)> = corner
        .exits()
        .into_iter()
        .filter_map(|heading| {
            let next = ctx.graph.exit_toward(cross.id, heading)?;
            Some((heading, ctx.map.road(next)?.coord))
        })
        .collect();
    let onward: Vec<Heading> = open
        .iter()
        .filter(|(_, coord)| *coord != agent.start)
        .map(|(heading, _)| *heading)
        .collect();
    let any: Vec<Heading> = open.iter().map(|(heading, _)| *heading).collect();

    let choice = onward.choose(rng).or_else(|| any.choose(rng)).copied();
    match choice {
        Some(heading) => {
            agent.heading = heading;
            agent.velocity = Velocity::along(heading, PEDESTRIAN_SPEED);
            Ok(())
        }
        None => start_crossing(agent, cross, corner, CrossingKind::Diagonal),
    }
}

fn start_crossing(
    agent: &mut Agent,
    cross: &RoadEntity,
    from: Corner,
    kind: CrossingKind,
) -> SimResult<()> {
    let to = from.across(kind);
    let target = cross.require_anchor(NodeRole::Intersection(IntersectionNode::Walk(to)))?;
    agent.crossing = Some(Crossing { from, to, target });
    steer_toward(agent, target);
    Ok(())
}

/// Unit step on each axis that still separates the feet from `target`
fn steer_toward(agent: &mut Agent, target: Vec2) {
    let feet = agent.walk_point();
    let axis = |delta: f32| {
        if delta.abs() < 1.0 {
            0
        } else {
            delta.signum() as i32 * PEDESTRIAN_SPEED
        }
    };
    agent.velocity = Velocity::new(axis(target.x - feet.x), axis(target.y - feet.y));
}

/// Pick a direction for a pedestrian standing still on a road
fn pick_road_exit<R: Rng + ?Sized>(
    agent: &mut Agent,
    ctx: &NavContext,
    road: &RoadEntity,
    rng: &mut R,
) {
    let exits = ctx.graph.exits(road.id);
    let onward: Vec<Heading> = exits
        .iter()
        .filter(|(_, id)| ctx.map.road(*id).is_some_and(|r| r.coord != agent.start))
        .map(|(heading, _)| *heading)
        .collect();
    let any: Vec<Heading> = exits.iter().map(|(heading, _)| *heading).collect();

    let heading = onward
        .choose(rng)
        .or_else(|| any.choose(rng))
        .copied()
        .unwrap_or(match road.orientation() {
            Some(Orientation::Vertical) => Heading::Down,
            _ => Heading::Right,
        });
    agent.heading = heading;
    agent.velocity = Velocity::along(heading, PEDESTRIAN_SPEED);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::node_table::{IntersectionShape, IntersectionVariant, RoadWidth};
    use crate::simulation::road::RoadKind;
    use crate::simulation::types::{AgentId, SimId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn plus_map() -> CityMap {
        let mut map = CityMap::empty(3, 12);
        let horizontal = RoadKind::Road(Orientation::Horizontal);
        let vertical = RoadKind::Road(Orientation::Vertical);
        map.add_road(GridCoord::new(1, 0), RoadWidth::TwoLane, horizontal)
            .unwrap();
        map.add_road(
            GridCoord::new(1, 4),
            RoadWidth::TwoLane,
            RoadKind::Intersection(IntersectionVariant {
                horizontal: RoadWidth::TwoLane,
                vertical: RoadWidth::TwoLane,
                shape: IntersectionShape::FourWay,
            }),
        )
        .unwrap();
        map.add_road(GridCoord::new(1, 8), RoadWidth::TwoLane, horizontal)
            .unwrap();
        map.add_road(GridCoord::new(0, 4), RoadWidth::TwoLane, vertical)
            .unwrap();
        map.add_road(GridCoord::new(2, 4), RoadWidth::TwoLane, vertical)
            .unwrap();
        map
    }

    #[test]
    fn test_lane_assignment_falls_back_to_curb_lane() {
        let map = plus_map();
        let node = lane_assignment(&map, GridCoord::new(1, 8), Heading::Right, 1).unwrap();
        assert_eq!(
            node.role,
            NodeRole::Road(RoadNode::Lane {
                heading: Heading::Right,
                lane: 0
            })
        );
        let stop = lane_assignment(&map, GridCoord::new(1, 4), Heading::Down, 0).unwrap();
        assert!(matches!(stop.role, NodeRole::Intersection(IntersectionNode::Stop { .. })));
        assert!(lane_assignment(&map, GridCoord::new(0, 0), Heading::Right, 0).is_none());
    }

    #[test]
    fn test_pedestrian_reaches_corner_and_moves_on() {
        let map = plus_map();
        let graph = RoadGraph::build(&map);
        let ctx = NavContext {
            map: &map,
            graph: &graph,
            delta_ms: 16,
        };
        let mut rng = StdRng::seed_from_u64(7);

        // Near sidewalk of the left road, a few units short of the corner
        let road = map.road_at(GridCoord::new(1, 0)).unwrap();
        let walk = road
            .anchor(NodeRole::Road(RoadNode::Walk(Sidewalk::Near)))
            .unwrap();
        let mut agent = Agent::pedestrian(
            AgentId(SimId(1)),
            Vec2::new(60.0, walk.y),
            Velocity::new(1, 0),
            Heading::Right,
            GridCoord::new(1, 0),
            GridCoord::new(1, 4),
        );

        let mut reached = false;
        for _ in 0..2000 {
            update_pedestrian(&mut agent, &ctx, &mut rng).unwrap();
            if agent.flags.node_reached {
                reached = true;
            }
            if let Some(node) = agent.node {
                let entity = map.road_at(node.cell).unwrap();
                assert!(entity.anchor(node.role).is_some());
            }
            assert!(map.road_at(agent.target).is_some());
        }
        assert!(reached);
    }

    #[test]
    fn test_steer_toward_moves_on_both_axes() {
        let mut agent = Agent::pedestrian(
            AgentId(SimId(1)),
            Vec2::new(0.0, 0.0),
            Velocity::ZERO,
            Heading::Right,
            GridCoord::new(0, 0),
            GridCoord::new(0, 0),
        );
        steer_toward(&mut agent, Vec2::new(10.0, -10.0));
        assert_eq!(agent.velocity, Velocity::new(1, -1));
        steer_toward(&mut agent, Vec2::new(0.5, 5.0));
        assert_eq!(agent.velocity, Velocity::new(0, 1));
    }
}
