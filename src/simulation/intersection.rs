//! Intersection arbitration for vehicles
//!
//! A vehicle approaching an intersection slows down, stops on the stop point
//! of its lane and is released on the following tick. On release it drives
//! straight on when the cell ahead holds a road the intersection connects
//! to; otherwise it turns right around the corner pivot. An exit that leads
//! off the grid is always taken and the bounds check retires the vehicle
//! later. When neither way is open inside the map the vehicle is retired.

use std::f32::consts::FRAC_PI_2;

use log::debug;

use super::agent::{Agent, DeactivationReason, NodeAssignment, TurnPhase, TurnState};
use super::collision::probe_boxes;
use super::error::{SimError, SimResult};
use super::generator::CityMap;
use super::navigation::{lane_assignment, AgentUpdateResult};
use super::node_table::{lane_offset, Corner, IntersectionNode, NodeRole, MAX_LANES};
use super::road::RoadEntity;
use super::types::{
    Heading, Rect, Vec2, Velocity, INTERSECTION_RECHECK_MS, TURN_STEP_RADIANS,
};

/// Flag the intersection ahead once the middle or far probe reaches it and
/// queue a slow-down
pub fn check_approach(agent: &mut Agent, cross: &RoadEntity) {
    let [_, mid, far] = probe_boxes(agent);
    if mid.intersects(&cross.bounds) || far.intersects(&cross.bounds) {
        agent.flags.approaching_intersection = true;
        agent.flags.slow_down_queued = true;
    }
}

/// Stop the vehicle if its box covers a stop point for its heading. The
/// vehicle's own lane is tested first.
pub fn check_stop(agent: &mut Agent, cross: &RoadEntity) -> bool {
    let bounds = agent.bounds();
    let mut lanes: Vec<usize> = (0..MAX_LANES).collect();
    lanes.sort_by_key(|lane| *lane != agent.lane);

    for lane in lanes {
        let role = NodeRole::Intersection(IntersectionNode::Stop {
            heading: agent.heading,
            lane,
        });
        let Some(anchor) = cross.anchor(role) else {
            continue;
        };
        if bounds.intersects(&Rect::point(anchor)) {
            agent.velocity = Velocity::ZERO;
            agent.flags.stopped_for_intersection = true;
            agent.flags.approaching_intersection = false;
            agent.flags.slow_down_queued = false;
            agent.flags.speed_up_queued = false;
            agent.flags.stopped_for_vehicle = false;
            agent.lane = lane;
            agent.node = Some(NodeAssignment {
                cell: cross.coord,
                role,
            });
            return true;
        }
    }
    false
}

/// Resolve a stopped vehicle: straight on, right turn or retirement
pub fn release_vehicle(agent: &mut Agent, map: &CityMap) -> SimResult<AgentUpdateResult> {
    agent.flags.stopped_for_intersection = false;
    agent.flags.approaching_intersection = false;

    let cross = map
        .road_at(agent.target)
        .filter(|road| road.is_intersection())
        .ok_or_else(|| {
            SimError::InvalidAgentState(format!(
                "vehicle {:?} stopped away from an intersection at {}",
                agent.id, agent.target
            ))
        })?;
    let heading = agent.heading;

    if cross.connects(heading) {
        match map.grid.step(cross.coord, heading) {
            Some(next) if map.road_at(next).is_some() => {
                agent.start = cross.coord;
                agent.target = next;
                agent.node = lane_assignment(map, next, heading, agent.lane);
                drive_on(agent, heading);
                return Ok(AgentUpdateResult::Continue);
            }
            None => {
                // Leaving the grid; the bounds check retires it.
                agent.start = cross.coord;
                drive_on(agent, heading);
                return Ok(AgentUpdateResult::Continue);
            }
            Some(_) => {}
        }
    }

    let right = heading.turn_right();
    let exit = if cross.connects(right) {
        match map.grid.step(cross.coord, right) {
            Some(next) if map.road_at(next).is_some() => Some(next),
            // Turning off the grid keeps the intersection as target
            None => Some(cross.coord),
            Some(_) => None,
        }
    } else {
        None
    };
    let Some(next) = exit else {
        debug!(
            "vehicle {:?} has no way through intersection {}",
            agent.id, cross.coord
        );
        return Ok(AgentUpdateResult::Deactivate(DeactivationReason::DeadEnd));
    };

    let pivot = cross.require_anchor(NodeRole::Intersection(IntersectionNode::Walk(
        Corner::pivot_for(heading),
    )))?;
    agent.turn = Some(TurnState {
        from: heading,
        pivot,
        lane: agent.lane,
        phase: TurnPhase::Approach,
    });
    agent.heading = right;
    agent.velocity = Velocity::along(right, 1);
    agent.flags.speed_up_queued = false;
    agent.flags.slow_down_queued = false;
    agent.start = cross.coord;
    agent.target = next;
    agent.hold_recheck(INTERSECTION_RECHECK_MS);
    Ok(AgentUpdateResult::Continue)
}

fn drive_on(agent: &mut Agent, heading: Heading) {
    agent.velocity = Velocity::along(heading, 1);
    agent.flags.speed_up_queued = true;
    agent.flags.slow_down_queued = false;
    agent.hold_recheck(INTERSECTION_RECHECK_MS);
}

/// One tick of a right turn. The vehicle first creeps along its old heading
/// until it draws level with the pivot, then sweeps a quarter circle around
/// it in fixed angular steps.
pub fn advance_turn(agent: &mut Agent, map: &CityMap) -> SimResult<AgentUpdateResult> {
    let Some(mut turn) = agent.turn.take() else {
        return Ok(AgentUpdateResult::Continue);
    };

    match turn.phase {
        TurnPhase::Approach => {
            let (dx, dy) = turn.from.delta();
            agent.position.x += dx as f32;
            agent.position.y += dy as f32;
            let offset = agent.center() - turn.pivot;
            if offset.x * dx as f32 + offset.y * dy as f32 >= 0.0 {
                turn.phase = TurnPhase::Rotate {
                    radius: offset.length(),
                    start_angle: offset.angle(),
                    radians_turned: 0.0,
                };
            }
        }
        TurnPhase::Rotate {
            radius,
            start_angle,
            radians_turned,
        } => {
            let turned = radians_turned + TURN_STEP_RADIANS;
            if turned >= FRAC_PI_2 {
                finish_turn(agent, map, &turn)?;
                return Ok(AgentUpdateResult::Continue);
            }
            let angle = start_angle + turned;
            agent.set_center(turn.pivot + Vec2::new(radius * angle.cos(), radius * angle.sin()));
            turn.phase = TurnPhase::Rotate {
                radius,
                start_angle,
                radians_turned: turned,
            };
        }
    }

    agent.turn = Some(turn);
    Ok(AgentUpdateResult::Continue)
}

/// Snap onto the lane of the new heading and pick up speed again. Falls back
/// to the curb lane when the new road has fewer lanes.
fn finish_turn(agent: &mut Agent, map: &CityMap, turn: &TurnState) -> SimResult<()> {
    let cross = map.road_at(agent.start).ok_or_else(|| {
        SimError::InvalidAgentState(format!("turn from empty cell {}", agent.start))
    })?;
    let variant = cross.variant().ok_or_else(|| {
        SimError::InvalidAgentState(format!("turn from a road at {}", agent.start))
    })?;

    let heading = agent.heading;
    let width = variant.width_for(heading);
    let (lane, offset) = match lane_offset(width, heading, turn.lane) {
        Some(offset) => (turn.lane, offset),
        None => {
            let offset = lane_offset(width, heading, 0).ok_or_else(|| {
                SimError::InvalidAgentState(format!("no curb lane for {:?}", heading))
            })?;
            (0, offset)
        }
    };

    let origin = cross.origin();
    let mut center = agent.center();
    if heading.is_horizontal() {
        center.y = origin.y + offset;
    } else {
        center.x = origin.x + offset;
    }
    agent.set_center(center);
    agent.lane = lane;
    agent.velocity = Velocity::along(heading, 1);
    agent.flags.speed_up_queued = true;
    agent.node = lane_assignment(map, agent.target, heading, lane);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::agent::VehicleStyle;
    use crate::simulation::node_table::{
        IntersectionShape, IntersectionVariant, Orientation, RoadWidth,
    };
    use crate::simulation::road::RoadKind;
    use crate::simulation::types::{AgentId, GridCoord, SimId};

    /// A two-lane crossing at (0, 4) with roads left, right and below
    fn crossroads(shape: IntersectionShape) -> CityMap {
        let mut map = CityMap::empty(2, 12);
        let horizontal = RoadKind::Road(Orientation::Horizontal);
        map.add_road(GridCoord::new(0, 0), RoadWidth::TwoLane, horizontal)
            .unwrap();
        map.add_road(
            GridCoord::new(0, 4),
            RoadWidth::TwoLane,
            RoadKind::Intersection(IntersectionVariant {
                horizontal: RoadWidth::TwoLane,
                vertical: RoadWidth::TwoLane,
                shape,
            }),
        )
        .unwrap();
        if shape != IntersectionShape::ThreeWayNoRight {
            map.add_road(GridCoord::new(0, 8), RoadWidth::TwoLane, horizontal)
                .unwrap();
        }
        map.add_road(
            GridCoord::new(1, 4),
            RoadWidth::TwoLane,
            RoadKind::Road(Orientation::Vertical),
        )
        .unwrap();
        map
    }

    fn stopped_car(map: &CityMap) -> Agent {
        let cross = map.road_at(GridCoord::new(0, 4)).unwrap();
        let role = NodeRole::Intersection(IntersectionNode::Stop {
            heading: Heading::Right,
            lane: 0,
        });
        let anchor = cross.anchor(role).unwrap();
        let mut agent = Agent::vehicle(
            AgentId(SimId(1)),
            VehicleStyle::WhiteSuv,
            anchor,
            Heading::Right,
            1,
            GridCoord::new(0, 0),
            GridCoord::new(0, 4),
        );
        assert!(check_stop(&mut agent, cross));
        agent
    }

    #[test]
    fn test_release_goes_straight_when_road_ahead() {
        let map = crossroads(IntersectionShape::FourWay);
        let mut agent = stopped_car(&map);
        assert!(agent.velocity.is_zero());

        let result = release_vehicle(&mut agent, &map).unwrap();
        assert!(matches!(result, AgentUpdateResult::Continue));
        assert_eq!(agent.target, GridCoord::new(0, 8));
        assert_eq!(agent.velocity, Velocity::new(1, 0));
        assert!(agent.flags.speed_up_queued);
        assert!(!agent.can_check_intersection());
    }

    #[test]
    fn test_release_turns_right_into_side_road() {
        let map = crossroads(IntersectionShape::ThreeWayNoRight);
        let mut agent = stopped_car(&map);
        release_vehicle(&mut agent, &map).unwrap();
        assert_eq!(agent.target, GridCoord::new(1, 4));
        assert_eq!(agent.heading, Heading::Down);
        assert!(agent.turn.is_some());

        let mut ticks = 0;
        while agent.turn.is_some() && ticks < 500 {
            advance_turn(&mut agent, &map).unwrap();
            ticks += 1;
        }
        assert!(agent.turn.is_none());
        // Snapped onto the down lane of the vertical road
        assert_eq!(agent.center().x, 80.0 + 30.0);
        assert_eq!(agent.velocity, Velocity::new(0, 1));
        let node = agent.node.unwrap();
        assert_eq!(node.cell, GridCoord::new(1, 4));
        assert!(map.road_at(node.cell).unwrap().anchor(node.role).is_some());
    }

    /// A no-right crossing at (0, 4) with the single road leading into it
    fn edge_crossing(rows: usize) -> CityMap {
        let mut map = CityMap::empty(rows, 8);
        map.add_road(
            GridCoord::new(0, 0),
            RoadWidth::TwoLane,
            RoadKind::Road(Orientation::Horizontal),
        )
        .unwrap();
        map.add_road(
            GridCoord::new(0, 4),
            RoadWidth::TwoLane,
            RoadKind::Intersection(IntersectionVariant {
                horizontal: RoadWidth::TwoLane,
                vertical: RoadWidth::TwoLane,
                shape: IntersectionShape::ThreeWayNoRight,
            }),
        )
        .unwrap();
        map
    }

    #[test]
    fn test_release_without_exit_retires_vehicle() {
        // The side road below is missing but the cell is on the grid
        let map = edge_crossing(2);
        let mut agent = stopped_car(&map);
        let result = release_vehicle(&mut agent, &map).unwrap();
        assert!(matches!(
            result,
            AgentUpdateResult::Deactivate(DeactivationReason::DeadEnd)
        ));
    }

    #[test]
    fn test_release_turns_off_the_grid() {
        let map = edge_crossing(1);
        let mut agent = stopped_car(&map);
        let result = release_vehicle(&mut agent, &map).unwrap();
        assert!(matches!(result, AgentUpdateResult::Continue));
        assert_eq!(agent.heading, Heading::Down);
        assert_eq!(agent.target, GridCoord::new(0, 4));
        assert!(agent.turn.is_some());

        let mut ticks = 0;
        while agent.turn.is_some() && ticks < 500 {
            advance_turn(&mut agent, &map).unwrap();
            ticks += 1;
        }
        assert!(agent.turn.is_none());
        assert_eq!(agent.velocity, Velocity::new(0, 1));
    }
}
